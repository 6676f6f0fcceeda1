//! Canvas state machine
//!
//! A `Canvas` owns one native window and the render context bound to it.
//! It moves through `Created -> (Mapped <-> Unmapped) -> Closed`; closing
//! drops both native resources, removes the canvas from the application
//! registry and delivers `Close` exactly once.
//!
//! Geometry is expressed in client-area coordinates and converted through
//! the window's current frame extents in both directions. Native resize
//! and expose notifications are coalesced per sweep: a `Resize` is reported
//! only when the client size actually changed and is followed by a full
//! repaint, and all damage of a sweep is delivered as one `Paint`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::app::AppShared;
use crate::backend::{CanvasBackend, NativeWindow, Platform, SurfaceRequest};
use crate::config::{CanvasConfig, Fullscreen};
use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::event::{CanvasEvent, EventHandler, Region};
use crate::geometry::Monitor;
use crate::input::Translator;

/// Unique identifier for canvases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct CanvasId(pub u64);

impl CanvasId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        CanvasId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canvas-{}", self.0)
    }
}

/// Canvas lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasState {
    /// Window and context exist, never shown
    Created,
    Mapped,
    Unmapped,
    /// Terminal
    Closed,
}

/// Accumulated damage of one sweep
#[derive(Debug, Clone, Copy, PartialEq)]
enum Damage {
    Clean,
    Full,
    Partial(Region),
}

impl Damage {
    fn add(&mut self, region: Option<Region>) {
        *self = match (*self, region) {
            (Damage::Full, _) | (_, None) => Damage::Full,
            (Damage::Clean, Some(region)) => Damage::Partial(region),
            (Damage::Partial(a), Some(b)) => Damage::Partial(a.union(&b)),
        };
    }

    /// Take the pending paint, if any
    fn take(&mut self) -> Option<Option<Region>> {
        match std::mem::replace(self, Damage::Clean) {
            Damage::Clean => None,
            Damage::Full => Some(None),
            Damage::Partial(region) => Some(Some(region)),
        }
    }
}

/// Client geometry to restore when leaving fullscreen
#[derive(Debug, Clone, Copy)]
struct Windowed {
    size: (u32, u32),
    position: (i32, i32),
}

/// Native resources; the context is dropped before its window
struct Surface<P: Platform> {
    context: RenderContext<P::Context>,
    window: P::Window,
}

struct CanvasCore<P: Platform> {
    state: CanvasState,
    /// `None` once closed
    surface: Option<Surface<P>>,
    translator: Translator<P::Model>,
    resizable: bool,
    /// Set while fullscreen
    windowed: Option<Windowed>,
    /// Last size delivered in a `Resize`
    reported_size: Option<(u32, u32)>,
    /// Compare the native size against `reported_size` at the end of the
    /// next sweep
    resize_pending: bool,
    damage: Damage,
}

impl<P: Platform> CanvasCore<P> {
    fn surface(&self) -> Result<&Surface<P>> {
        self.surface.as_ref().ok_or(Error::CanvasClosed)
    }

    fn window(&self) -> Result<&P::Window> {
        self.surface().map(|s| &s.window)
    }

    /// Drop redundant geometry notifications and fold damage into one paint
    ///
    /// Returns the events to deliver and whether the window asked to close.
    fn coalesce(&mut self, events: Vec<CanvasEvent>, scroll: bool) -> (Vec<CanvasEvent>, bool) {
        let mut out = Vec::with_capacity(events.len() + 2);
        let mut close = false;
        for event in events {
            match event {
                CanvasEvent::Resize { size } => {
                    // Minimized
                    if size.0 == 0 || size.1 == 0 {
                        continue;
                    }
                    if self.reported_size != Some(size) {
                        self.reported_size = Some(size);
                        self.damage.add(None);
                        out.push(CanvasEvent::Resize { size });
                    }
                }
                CanvasEvent::Paint { region } => self.damage.add(region),
                CanvasEvent::MouseWheel { .. } if !scroll => {}
                CanvasEvent::Close => {
                    close = true;
                    break;
                }
                event => out.push(event),
            }
        }

        if std::mem::take(&mut self.resize_pending) {
            let size = self.surface.as_ref().map(|s| s.window.inner_size());
            if let Some(size) = size.filter(|s| s.0 > 0 && s.1 > 0) {
                if self.reported_size != Some(size) {
                    self.reported_size = Some(size);
                    self.damage.add(None);
                    out.push(CanvasEvent::Resize { size });
                }
            }
        }
        if !close && self.state == CanvasState::Mapped {
            if let Some(region) = self.damage.take() {
                out.push(CanvasEvent::Paint { region });
            }
        }
        (out, close)
    }
}

pub(crate) struct CanvasInner<P: Platform> {
    id: CanvasId,
    app: Rc<AppShared<P>>,
    handler: Weak<dyn EventHandler>,
    core: RefCell<CanvasCore<P>>,
}

impl<P: Platform> CanvasInner<P> {
    pub(crate) fn id(&self) -> CanvasId {
        self.id
    }

    pub(crate) fn state(&self) -> CanvasState {
        self.core
            .try_borrow()
            .map(|core| core.state)
            .unwrap_or(CanvasState::Closed)
    }

    /// Not yet closed; a canvas busy in a callback counts as open
    pub(crate) fn is_open(&self) -> bool {
        self.core
            .try_borrow()
            .map_or(true, |core| core.state != CanvasState::Closed)
    }

    fn deliver(&self, event: &CanvasEvent) {
        if let Some(handler) = self.handler.upgrade() {
            handler.on_event(self.id, event);
        }
    }

    /// Run `f` on the open canvas
    fn with_core<R>(&self, f: impl FnOnce(&mut CanvasCore<P>) -> Result<R>) -> Result<R> {
        let mut core = self
            .core
            .try_borrow_mut()
            .map_err(|_| Error::invalid(format!("{} is busy", self.id)))?;
        if core.state == CanvasState::Closed {
            return Err(Error::CanvasClosed);
        }
        f(&mut core)
    }

    fn with_core_ref<R>(&self, f: impl FnOnce(&CanvasCore<P>) -> Result<R>) -> Result<R> {
        let core = self
            .core
            .try_borrow()
            .map_err(|_| Error::invalid(format!("{} is busy", self.id)))?;
        if core.state == CanvasState::Closed {
            return Err(Error::CanvasClosed);
        }
        f(&core)
    }

    /// Whether a capability is present; logs the skipped request otherwise
    fn supports(&self, capable: bool, what: &str) -> bool {
        if !capable {
            warn!(
                "{} backend does not support {}, ignoring request on {}",
                self.app.platform.name(),
                what,
                self.id
            );
        }
        capable
    }

    /// Drain, translate and deliver this canvas's native events
    pub(crate) fn sweep(&self) -> Result<()> {
        let scroll = self.app.platform.capabilities().scroll;
        let (events, close) = {
            let Ok(mut core) = self.core.try_borrow_mut() else {
                debug!("Skipping sweep of busy {}", self.id);
                return Ok(());
            };
            if core.state == CanvasState::Closed {
                return Ok(());
            }
            let core = &mut *core;
            let Some(surface) = core.surface.as_ref() else {
                return Ok(());
            };

            let mut native = Vec::new();
            surface.window.drain_events(&mut native);
            let platform = &self.app.platform;
            let live = || platform.modifiers();
            let mut translated = Vec::with_capacity(native.len());
            for event in native {
                core.translator.translate(event, &live, &mut translated);
            }
            core.translator.finish(&mut translated);
            core.coalesce(translated, scroll)
        };

        for event in &events {
            if self.state() == CanvasState::Closed {
                return Ok(());
            }
            self.deliver(event);
        }
        if close {
            debug!("{} close requested by the window system", self.id);
            self.close();
        }
        Ok(())
    }

    /// Close the canvas; idempotent
    pub(crate) fn close(&self) {
        let surface = match self.core.try_borrow_mut() {
            Ok(mut core) => {
                if core.state == CanvasState::Closed {
                    return;
                }
                core.state = CanvasState::Closed;
                core.surface.take()
            }
            Err(_) => {
                warn!("Cannot close busy {}", self.id);
                return;
            }
        };
        drop(surface);
        self.app.unregister(self.id);
        info!("Closed {}", self.id);
        self.deliver(&CanvasEvent::Close);
    }
}

impl<P: Platform> Drop for CanvasInner<P> {
    fn drop(&mut self) {
        self.close();
    }
}

fn monitor_for<P: Platform>(platform: &P, index: usize) -> Result<Monitor> {
    platform
        .monitors()
        .into_iter()
        .nth(index)
        .ok_or_else(|| Error::invalid(format!("no monitor {index}")))
}

/// An on-screen GPU-drawable surface
///
/// Clones refer to the same canvas. Dropping the last clone closes it.
pub struct Canvas<P: Platform> {
    inner: Rc<CanvasInner<P>>,
}

impl<P: Platform> Clone for Canvas<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Non-owning canvas reference
pub struct WeakCanvas<P: Platform> {
    inner: Weak<CanvasInner<P>>,
}

impl<P: Platform> WeakCanvas<P> {
    pub fn upgrade(&self) -> Option<Canvas<P>> {
        self.inner.upgrade().map(|inner| Canvas { inner })
    }
}

impl<P: Platform> Clone for WeakCanvas<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Platform> Canvas<P> {
    /// Create the native window and context and register the canvas
    ///
    /// On success `Initialize` has been delivered with the new context
    /// current. On failure nothing is registered and the ownership token
    /// stays as it was.
    pub(crate) fn new(
        app: &Rc<AppShared<P>>,
        config: CanvasConfig,
        handler: Weak<dyn EventHandler>,
    ) -> Result<Self> {
        let platform = &app.platform;
        let caps = platform.capabilities();
        let family = platform.family();

        if !caps.multi_window && app.has_open_canvas() {
            return Err(Error::invalid(format!(
                "{} backend supports a single canvas",
                platform.name()
            )));
        }
        if config.parent.is_some() && !caps.parent {
            warn!("{} backend cannot embed canvases, ignoring parent", platform.name());
        }
        if !config.decorated && !caps.decorate {
            warn!("{} backend always decorates windows", platform.name());
        }
        let decorated = config.decorated || !caps.decorate;
        let resizable = config.resizable || !caps.resizable;
        if config.wants_vsync() && !caps.vsync {
            debug!("{} backend has no swap interval control", platform.name());
        }

        let gl = config.context.config().sanitized(platform.ignored_gl_fields());
        let request = SurfaceRequest {
            title: &config.title,
            size: config.size,
            position: config.position.filter(|_| caps.position),
            resizable,
            decorated,
            vsync: config.wants_vsync() && caps.vsync,
            gl: &gl,
        };
        let (window, context) = RenderContext::establish(&config.context, family, caps, |share| {
            platform.create_surface(&request, share)
        })?;

        if !resizable {
            window.set_fixed_size(Some(config.size))?;
        }
        context.make_current()?;

        let mut windowed = None;
        if config.fullscreen.is_on() && caps.fullscreen {
            let index = config.fullscreen.monitor_index().unwrap_or(0);
            let monitor = monitor_for(platform, index)?;
            windowed = Some(Windowed {
                size: window.inner_size(),
                position: window.inner_position(),
            });
            window.set_fullscreen(Some(&monitor))?;
        }
        let state = if config.show && caps.show {
            window.set_visible(true)?;
            CanvasState::Mapped
        } else {
            CanvasState::Created
        };

        let inner = Rc::new(CanvasInner {
            id: CanvasId::new(),
            app: app.clone(),
            handler,
            core: RefCell::new(CanvasCore {
                state,
                surface: Some(Surface { context, window }),
                translator: Translator::new(),
                resizable,
                windowed,
                reported_size: None,
                resize_pending: state == CanvasState::Mapped,
                damage: if state == CanvasState::Mapped {
                    Damage::Full
                } else {
                    Damage::Clean
                },
            }),
        });
        app.register(&inner);
        info!(
            "Created {} '{}' {}x{} on {}",
            inner.id,
            config.title,
            config.size.0,
            config.size.1,
            platform.name()
        );
        inner.deliver(&CanvasEvent::Initialize);
        Ok(Canvas { inner })
    }

    pub(crate) fn from_inner(inner: Rc<CanvasInner<P>>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> CanvasId {
        self.inner.id
    }

    pub fn state(&self) -> CanvasState {
        self.inner.state()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CanvasState::Closed
    }

    pub fn downgrade(&self) -> WeakCanvas<P> {
        WeakCanvas {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.inner.with_core(|core| {
            if !self.inner.supports(self.inner.app.platform.capabilities().title, "titles") {
                return Ok(());
            }
            core.window()?.set_title(title)
        })
    }

    /// Resize the client area
    ///
    /// Fails with `InvalidOperation` while fullscreen. A non-resizable
    /// canvas is re-pinned to the new size.
    pub fn set_size(&self, width: u32, height: u32) -> Result<()> {
        self.inner.with_core(|core| {
            if core.windowed.is_some() {
                return Err(Error::invalid("cannot resize a fullscreen canvas"));
            }
            if width == 0 || height == 0 {
                return Err(Error::invalid(format!("invalid size {width}x{height}")));
            }
            if !self.inner.supports(self.inner.app.platform.capabilities().size, "resizing") {
                return Ok(());
            }
            let window = core.window()?;
            if !core.resizable {
                window.set_fixed_size(Some((width, height)))?;
            }
            let outer = window.frame_extents().client_to_window(width, height);
            window.set_outer_size(outer)?;
            debug!("{} client size set to {}x{} (outer {:?})", self.inner.id, width, height, outer);
            core.resize_pending = true;
            Ok(())
        })
    }

    /// Move the client origin
    pub fn set_position(&self, x: i32, y: i32) -> Result<()> {
        self.inner.with_core(|core| {
            if core.windowed.is_some() {
                return Err(Error::invalid("cannot move a fullscreen canvas"));
            }
            if !self.inner.supports(self.inner.app.platform.capabilities().position, "positioning") {
                return Ok(());
            }
            let window = core.window()?;
            let outer = window.frame_extents().client_to_window_pos(x, y);
            window.set_outer_position(outer)
        })
    }

    pub fn set_visible(&self, visible: bool) -> Result<()> {
        self.inner.with_core(|core| {
            if !self.inner.supports(self.inner.app.platform.capabilities().show, "visibility changes") {
                return Ok(());
            }
            core.window()?.set_visible(visible)?;
            match (core.state, visible) {
                (CanvasState::Mapped, true) => {}
                (_, true) => {
                    core.state = CanvasState::Mapped;
                    core.resize_pending = true;
                    core.damage.add(None);
                }
                (CanvasState::Created, false) => {}
                (_, false) => core.state = CanvasState::Unmapped,
            }
            Ok(())
        })
    }

    /// Enter fullscreen on a monitor or return to the windowed geometry
    ///
    /// The size change is reported by the next `Resize`.
    pub fn set_fullscreen(&self, fullscreen: Fullscreen) -> Result<()> {
        self.inner.with_core(|core| {
            if !self.inner.supports(self.inner.app.platform.capabilities().fullscreen, "fullscreen") {
                return Ok(());
            }
            let window = core.window()?;
            match fullscreen.monitor_index() {
                Some(index) => {
                    let monitor = monitor_for(&self.inner.app.platform, index)?;
                    let windowed = core.windowed.unwrap_or(Windowed {
                        size: window.inner_size(),
                        position: window.inner_position(),
                    });
                    window.set_fullscreen(Some(&monitor))?;
                    debug!("{} fullscreen on {}", self.inner.id, monitor.name);
                    core.windowed = Some(windowed);
                }
                None => {
                    let Some(windowed) = core.windowed else {
                        return Ok(());
                    };
                    window.set_fullscreen(None)?;
                    let extents = window.frame_extents();
                    let (w, h) = windowed.size;
                    let (x, y) = windowed.position;
                    window.set_outer_size(extents.client_to_window(w, h))?;
                    window.set_outer_position(extents.client_to_window_pos(x, y))?;
                    debug!("{} left fullscreen, restored {}x{} at ({}, {})", self.inner.id, w, h, x, y);
                    core.windowed = None;
                }
            }
            core.resize_pending = true;
            Ok(())
        })
    }

    /// Client size
    pub fn size(&self) -> Result<(u32, u32)> {
        self.inner.with_core_ref(|core| Ok(core.window()?.inner_size()))
    }

    /// Client origin in screen coordinates
    pub fn position(&self) -> Result<(i32, i32)> {
        self.inner.with_core_ref(|core| Ok(core.window()?.inner_position()))
    }

    pub fn is_fullscreen(&self) -> Result<bool> {
        self.inner.with_core_ref(|core| Ok(core.windowed.is_some()))
    }

    pub fn is_visible(&self) -> bool {
        self.state() == CanvasState::Mapped
    }

    /// Window-rectangle size for a client size under the current decorations
    pub fn client_to_window(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        self.inner
            .with_core_ref(|core| Ok(core.window()?.frame_extents().client_to_window(width, height)))
    }

    /// Window-rectangle origin for a client origin
    pub fn client_to_window_pos(&self, x: i32, y: i32) -> Result<(i32, i32)> {
        self.inner
            .with_core_ref(|core| Ok(core.window()?.frame_extents().client_to_window_pos(x, y)))
    }

    /// Bind the render context on the calling thread
    pub fn set_current(&self) -> Result<()> {
        self.inner
            .with_core_ref(|core| core.surface()?.context.make_current())
    }

    pub fn swap_buffers(&self) -> Result<()> {
        self.inner
            .with_core_ref(|core| core.surface()?.context.swap_buffers())
    }

    /// Request a full repaint on the next sweep
    pub fn update(&self) -> Result<()> {
        self.inner.with_core(|core| {
            core.damage.add(None);
            Ok(())
        })
    }

    /// Close the canvas; closing again is a no-op
    pub fn close(&self) -> Result<()> {
        self.inner.close();
        Ok(())
    }

    /// Borrow the native window
    ///
    /// The canvas is borrowed for the duration of `f`; calling back into it
    /// from `f` fails with `InvalidOperation`.
    pub fn with_native<R>(&self, f: impl FnOnce(&P::Window) -> R) -> Result<R> {
        self.inner.with_core_ref(|core| Ok(f(core.window()?)))
    }

    /// Borrow the render context
    pub fn with_context<R>(&self, f: impl FnOnce(&RenderContext<P::Context>) -> R) -> Result<R> {
        self.inner
            .with_core_ref(|core| Ok(f(&core.surface()?.context)))
    }
}

impl<P: Platform> fmt::Debug for Canvas<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<P: Platform> CanvasBackend for Canvas<P> {
    fn id(&self) -> CanvasId {
        Canvas::id(self)
    }

    fn state(&self) -> CanvasState {
        Canvas::state(self)
    }

    fn set_title(&self, title: &str) -> Result<()> {
        Canvas::set_title(self, title)
    }

    fn set_size(&self, width: u32, height: u32) -> Result<()> {
        Canvas::set_size(self, width, height)
    }

    fn set_position(&self, x: i32, y: i32) -> Result<()> {
        Canvas::set_position(self, x, y)
    }

    fn set_visible(&self, visible: bool) -> Result<()> {
        Canvas::set_visible(self, visible)
    }

    fn set_fullscreen(&self, fullscreen: Fullscreen) -> Result<()> {
        Canvas::set_fullscreen(self, fullscreen)
    }

    fn size(&self) -> Result<(u32, u32)> {
        Canvas::size(self)
    }

    fn position(&self) -> Result<(i32, i32)> {
        Canvas::position(self)
    }

    fn is_fullscreen(&self) -> Result<bool> {
        Canvas::is_fullscreen(self)
    }

    fn client_to_window(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        Canvas::client_to_window(self, width, height)
    }

    fn client_to_window_pos(&self, x: i32, y: i32) -> Result<(i32, i32)> {
        Canvas::client_to_window_pos(self, x, y)
    }

    fn set_current(&self) -> Result<()> {
        Canvas::set_current(self)
    }

    fn swap_buffers(&self) -> Result<()> {
        Canvas::swap_buffers(self)
    }

    fn update(&self) -> Result<()> {
        Canvas::update(self)
    }

    fn close(&self) -> Result<()> {
        Canvas::close(self)
    }
}
