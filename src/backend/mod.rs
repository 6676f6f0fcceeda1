//! Backend module
//!
//! This module holds the contract every backend satisfies and the drivers
//! that satisfy it:
//! - `ApplicationBackend`, `CanvasBackend` and `TimerBackend`, the
//!   object-safe contract selected at startup by platform name
//! - `Platform`, `NativeWindow` and `NativeContext`, the seam a window-system
//!   driver implements; `Application<P>` and `Canvas<P>` build the contract
//!   on top of it
//! - Timer scheduling on calloop (`event_loop`)
//! - Native event models (`xorg`, `win32`, `gtk`, `game`) with their drivers
//! - An in-process `headless` driver for any model

pub mod event_loop;
pub mod game;
pub mod gtk;
pub mod headless;
pub mod win32;
pub mod xorg;

pub use event_loop::{Scheduler, Timer};

use std::any::Any;
use std::rc::Weak;
use std::time::Duration;

use log::info;

use crate::canvas::{CanvasId, CanvasState};
use crate::capability::{BackendFamily, Capabilities};
use crate::config::{CanvasConfig, Fullscreen, GlConfig, GlField, LoopConfig};
use crate::error::{Error, Result};
use crate::event::{EventHandler, Modifiers};
use crate::geometry::{FrameExtents, Monitor};
use crate::input::EventModel;

/// Callback run by a timer
pub type TimerCallback = Box<dyn FnMut() -> anyhow::Result<()>>;

/// Application-level contract
pub trait ApplicationBackend {
    /// Backend identifier
    fn name(&self) -> &str;

    fn family(&self) -> BackendFamily;

    fn capabilities(&self) -> &'static Capabilities;

    /// One non-blocking sweep over every live canvas, then due timers
    fn process_events(&self) -> Result<()>;

    /// Sweep until no open canvas remains, then `quit`
    fn run(&self) -> Result<()>;

    /// Close every open canvas and stop every timer; idempotent
    fn quit(&self);

    fn create_canvas(
        &self,
        config: CanvasConfig,
        handler: Weak<dyn EventHandler>,
    ) -> Result<Box<dyn CanvasBackend>>;

    fn create_timer(&self, callback: TimerCallback) -> Box<dyn TimerBackend>;

    /// Backend-specific interop object
    fn native_handle(&self) -> &dyn Any;
}

/// Canvas-level contract
///
/// Sizes and positions are client-area values. Operations on a closed
/// canvas fail with `CanvasClosed`, except `close` which is a no-op.
pub trait CanvasBackend {
    fn id(&self) -> CanvasId;

    fn state(&self) -> CanvasState;

    fn set_title(&self, title: &str) -> Result<()>;

    fn set_size(&self, width: u32, height: u32) -> Result<()>;

    fn set_position(&self, x: i32, y: i32) -> Result<()>;

    fn set_visible(&self, visible: bool) -> Result<()>;

    fn set_fullscreen(&self, fullscreen: Fullscreen) -> Result<()>;

    fn size(&self) -> Result<(u32, u32)>;

    fn position(&self) -> Result<(i32, i32)>;

    fn is_fullscreen(&self) -> Result<bool>;

    fn client_to_window(&self, width: u32, height: u32) -> Result<(u32, u32)>;

    fn client_to_window_pos(&self, x: i32, y: i32) -> Result<(i32, i32)>;

    /// Bind the canvas context on the calling thread
    fn set_current(&self) -> Result<()>;

    /// Binds the context, then swaps
    fn swap_buffers(&self) -> Result<()>;

    /// Request a paint on the next sweep
    fn update(&self) -> Result<()>;

    fn close(&self) -> Result<()>;
}

/// Timer contract
pub trait TimerBackend {
    fn start(&self, interval: Duration) -> Result<()>;

    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// What a driver needs to create one canvas surface
#[derive(Debug, Clone)]
pub struct SurfaceRequest<'a> {
    pub title: &'a str,
    /// Client size
    pub size: (u32, u32),
    /// Client origin
    pub position: Option<(i32, i32)>,
    pub resizable: bool,
    pub decorated: bool,
    pub vsync: bool,
    /// GL configuration with unsupported fields already reset
    pub gl: &'a GlConfig,
}

/// Window-system driver
pub trait Platform: 'static {
    type Model: EventModel;
    type Window: NativeWindow<Event = <Self::Model as EventModel>::Event>;
    type Context: NativeContext;

    fn name(&self) -> &str;

    fn family(&self) -> BackendFamily {
        <Self::Model as EventModel>::FAMILY
    }

    fn capabilities(&self) -> &'static Capabilities {
        Capabilities::for_family(self.family())
    }

    /// Connected monitors, primary first
    fn monitors(&self) -> Vec<Monitor>;

    /// Create a hidden window and its context; `share` is the context to
    /// share objects with
    fn create_surface(
        &self,
        request: &SurfaceRequest<'_>,
        share: Option<&Self::Context>,
    ) -> Result<(Self::Window, Self::Context)>;

    /// Live keyboard modifier state
    fn modifiers(&self) -> Modifiers;

    /// One non-blocking iteration of a toolkit main loop, if any
    fn pump(&self) -> Result<()> {
        Ok(())
    }

    /// GL configuration fields this platform cannot honour
    fn ignored_gl_fields(&self) -> &'static [GlField] {
        &[]
    }

    fn native_handle(&self) -> &dyn Any;
}

/// A native window owned by one canvas
///
/// Setters take outer (window-rectangle) geometry; getters report the
/// client area.
pub trait NativeWindow: 'static {
    type Event;

    /// Current decoration thickness
    fn frame_extents(&self) -> FrameExtents;

    fn set_title(&self, title: &str) -> Result<()>;

    fn set_outer_size(&self, size: (u32, u32)) -> Result<()>;

    fn set_outer_position(&self, position: (i32, i32)) -> Result<()>;

    fn inner_size(&self) -> (u32, u32);

    /// Client origin in screen coordinates
    fn inner_position(&self) -> (i32, i32);

    fn set_visible(&self, visible: bool) -> Result<()>;

    /// Enter fullscreen on `monitor`, or leave it with `None`
    fn set_fullscreen(&self, monitor: Option<&Monitor>) -> Result<()>;

    /// Pin the client size, or release the pin with `None`
    fn set_fixed_size(&self, size: Option<(u32, u32)>) -> Result<()>;

    /// Move every pending native event into `out` without blocking
    fn drain_events(&self, out: &mut Vec<Self::Event>);
}

/// A native GL context; dropping it destroys the native handle
pub trait NativeContext: 'static {
    fn make_current(&self) -> Result<()>;

    fn swap_buffers(&self) -> Result<()>;

    fn release_current(&self);
}

/// Backend picked when none is configured
pub fn default_name() -> &'static str {
    if cfg!(any(
        all(feature = "x11", target_os = "linux"),
        target_os = "windows"
    )) {
        "native"
    } else {
        "headless"
    }
}

/// Open a backend by platform identifier with default loop settings
pub fn open(name: &str) -> Result<Box<dyn ApplicationBackend>> {
    open_with(name, LoopConfig::default())
}

/// Open a backend by platform identifier
///
/// Identifiers: `native`, `x11`, `win32`, `gtk`, `game` (or `glfw`), and
/// `headless` with an optional `:model` suffix.
pub fn open_with(name: &str, loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    let (base, variant) = match name.split_once(':') {
        Some((base, variant)) => (base, Some(variant)),
        None => (name, None),
    };
    let backend = match (base, variant) {
        ("headless", model) => headless::open(model.unwrap_or("xorg"), loop_config)?,
        ("native", None) => open_native(loop_config)?,
        ("x11", None) => open_x11(loop_config)?,
        ("win32", None) => open_win32(loop_config)?,
        ("gtk", None) => open_gtk(loop_config)?,
        ("game" | "glfw", None) => open_game(loop_config)?,
        _ => {
            return Err(Error::UnsupportedPlatform(format!(
                "unknown backend '{name}'"
            )))
        }
    };
    info!(
        "Opened {} backend ({} family)",
        backend.name(),
        backend.family()
    );
    Ok(backend)
}

fn not_compiled(name: &str, needs: &str) -> Error {
    Error::UnsupportedPlatform(format!("{name} backend requires {needs}"))
}

fn open_native(loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    if cfg!(target_os = "windows") {
        open_win32(loop_config)
    } else {
        open_x11(loop_config)
    }
}

#[cfg(all(feature = "x11", target_os = "linux"))]
fn open_x11(loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Ok(Box::new(xorg::open(loop_config)?))
}

#[cfg(not(all(feature = "x11", target_os = "linux")))]
fn open_x11(_loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Err(not_compiled("x11", "Linux and the `x11` feature"))
}

#[cfg(target_os = "windows")]
fn open_win32(loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Ok(Box::new(win32::open(loop_config)?))
}

#[cfg(not(target_os = "windows"))]
fn open_win32(_loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Err(not_compiled("win32", "Windows"))
}

#[cfg(feature = "gtk")]
fn open_gtk(loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Ok(Box::new(gtk::open(loop_config)?))
}

#[cfg(not(feature = "gtk"))]
fn open_gtk(_loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Err(not_compiled("gtk", "the `gtk` feature"))
}

#[cfg(feature = "glfw")]
fn open_game(loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Ok(Box::new(game::open(loop_config)?))
}

#[cfg(not(feature = "glfw"))]
fn open_game(_loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Err(not_compiled("game", "the `glfw` feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_headless_models() {
        for (name, family) in [
            ("headless", BackendFamily::Native),
            ("headless:win32", BackendFamily::Native),
            ("headless:gtk", BackendFamily::Gtk),
            ("headless:game", BackendFamily::Game),
        ] {
            let backend = open(name).unwrap();
            assert_eq!(backend.family(), family);
            assert_eq!(backend.capabilities(), Capabilities::for_family(family));
        }
    }

    #[test]
    fn test_unknown_backend() {
        assert!(matches!(
            open("wayland"),
            Err(Error::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            open("headless:cocoa"),
            Err(Error::UnsupportedPlatform(_))
        ));
        assert!(matches!(open("gtk:extra"), Err(Error::UnsupportedPlatform(_))));
    }

    #[cfg(not(feature = "glfw"))]
    #[test]
    fn test_uncompiled_driver() {
        let err = open("game").err().unwrap();
        assert!(err.to_string().contains("glfw"));
    }
}
