//! Backend capability tables
//!
//! Each backend declares once, statically, which canvas operations it can
//! honour. Callers consult the table before asking for something a backend
//! cannot do; setters for capabilities a backend advertises as unsupported
//! are no-ops on that backend.

use std::fmt;

/// Backend families; GL contexts can only be shared inside one family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendFamily {
    /// Retained-mode toolkit widgets (GTK)
    Gtk,
    /// Direct window-system calls (X11/GLX, Win32/WGL)
    Native,
    /// Immediate-mode game toolkit windows (GLFW)
    Game,
}

impl BackendFamily {
    /// Lower-case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendFamily::Gtk => "gtk",
            BackendFamily::Native => "native",
            BackendFamily::Game => "game",
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static set of operations a backend supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Window title can be set
    pub title: bool,
    /// Canvas size can be set
    pub size: bool,
    /// Canvas position can be set
    pub position: bool,
    /// Canvas can be shown/hidden
    pub show: bool,
    /// Swap interval can be controlled
    pub vsync: bool,
    /// Resizability can be chosen
    pub resizable: bool,
    /// Window decorations can be switched off
    pub decorate: bool,
    /// Fullscreen is supported
    pub fullscreen: bool,
    /// GL contexts can be shared between canvases
    pub context: bool,
    /// More than one canvas can be open at a time
    pub multi_window: bool,
    /// Mouse wheel events are delivered
    pub scroll: bool,
    /// Canvases can be embedded in a parent
    pub parent: bool,
}

impl Capabilities {
    /// Every capability enabled
    pub const ALL: Capabilities = Capabilities {
        title: true,
        size: true,
        position: true,
        show: true,
        vsync: true,
        resizable: true,
        decorate: true,
        fullscreen: true,
        context: true,
        multi_window: true,
        scroll: true,
        parent: true,
    };

    /// Native window-system backends
    pub const NATIVE: Capabilities = Capabilities {
        parent: false,
        ..Capabilities::ALL
    };

    /// GTK toolkit backend
    pub const GTK: Capabilities = Capabilities {
        vsync: false,
        context: false,
        parent: false,
        ..Capabilities::ALL
    };

    /// Game-toolkit backend
    pub const GAME: Capabilities = Capabilities {
        decorate: false,
        context: false,
        multi_window: false,
        scroll: false,
        parent: false,
        ..Capabilities::ALL
    };

    /// Table for a backend family
    pub fn for_family(family: BackendFamily) -> &'static Capabilities {
        match family {
            BackendFamily::Gtk => &Capabilities::GTK,
            BackendFamily::Native => &Capabilities::NATIVE,
            BackendFamily::Game => &Capabilities::GAME,
        }
    }

    /// Names of the supported capabilities, in declaration order
    pub fn supported(&self) -> Vec<&'static str> {
        [
            ("title", self.title),
            ("size", self.size),
            ("position", self.position),
            ("show", self.show),
            ("vsync", self.vsync),
            ("resizable", self.resizable),
            ("decorate", self.decorate),
            ("fullscreen", self.fullscreen),
            ("context", self.context),
            ("multi_window", self.multi_window),
            ("scroll", self.scroll),
            ("parent", self.parent),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}
