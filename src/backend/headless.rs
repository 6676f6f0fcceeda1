//! In-process headless driver
//!
//! Simulates a window manager and GL driver for any native event model:
//! windows have decoration extents and monitors to go fullscreen on,
//! geometry changes queue the model's own configure/expose events, and
//! contexts in one share group see the same object namespace. Tests inject
//! native events with `HeadlessWindow::inject`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::app::Application;
use crate::backend::game::input::{GameEvent, GameModel};
use crate::backend::gtk::input::{GtkEvent, GtkModel};
use crate::backend::win32::input::{self as win32, Win32Message, Win32Model};
use crate::backend::xorg::input::{XorgEvent, XorgModel};
use crate::backend::{ApplicationBackend, NativeContext, NativeWindow, Platform, SurfaceRequest};
use crate::config::{GlField, LoopConfig};
use crate::error::{Error, Result};
use crate::event::Modifiers;
use crate::geometry::{FrameExtents, Monitor};
use crate::input::EventModel;

thread_local! {
    static BOUND: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Models the headless driver can synthesize window-manager events for
pub trait HeadlessModel: EventModel {
    /// Client area changed size
    fn configure(size: (u32, u32)) -> Self::Event;

    /// Whole client area of `size` needs redrawing
    fn expose(size: (u32, u32)) -> Self::Event;

    /// User asked to close the window
    fn close_request() -> Self::Event;

    /// Keyboard focus moved to another window
    fn focus_out() -> Self::Event;

    /// GL fields the real driver of this model ignores
    fn ignored_gl_fields() -> &'static [GlField] {
        &[]
    }
}

impl HeadlessModel for XorgModel {
    fn configure((width, height): (u32, u32)) -> XorgEvent {
        XorgEvent::Configure { width, height }
    }

    fn expose((width, height): (u32, u32)) -> XorgEvent {
        XorgEvent::Expose {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    fn close_request() -> XorgEvent {
        XorgEvent::DeleteWindow
    }

    fn focus_out() -> XorgEvent {
        XorgEvent::FocusOut
    }
}

impl HeadlessModel for Win32Model {
    fn configure((width, height): (u32, u32)) -> Win32Message {
        Win32Message::new(win32::WM_SIZE, 0, win32::make_lparam(width as i32, height as i32))
    }

    fn expose(_: (u32, u32)) -> Win32Message {
        Win32Message::new(win32::WM_PAINT, 0, 0)
    }

    fn close_request() -> Win32Message {
        Win32Message::new(win32::WM_CLOSE, 0, 0)
    }

    fn focus_out() -> Win32Message {
        Win32Message::new(win32::WM_KILLFOCUS, 0, 0)
    }

    fn ignored_gl_fields() -> &'static [GlField] {
        crate::backend::win32::IGNORED_GL_FIELDS
    }
}

impl HeadlessModel for GtkModel {
    fn configure((width, height): (u32, u32)) -> GtkEvent {
        GtkEvent::Configure { width, height }
    }

    fn expose(_: (u32, u32)) -> GtkEvent {
        GtkEvent::Draw { region: None }
    }

    fn close_request() -> GtkEvent {
        GtkEvent::Delete
    }

    fn focus_out() -> GtkEvent {
        GtkEvent::FocusOut
    }

    fn ignored_gl_fields() -> &'static [GlField] {
        crate::backend::gtk::IGNORED_GL_FIELDS
    }
}

impl HeadlessModel for GameModel {
    fn configure((width, height): (u32, u32)) -> GameEvent {
        GameEvent::FramebufferSize {
            width: width as i32,
            height: height as i32,
        }
    }

    fn expose(_: (u32, u32)) -> GameEvent {
        GameEvent::Refresh
    }

    fn close_request() -> GameEvent {
        GameEvent::Close
    }

    fn focus_out() -> GameEvent {
        GameEvent::Focus(false)
    }
}

fn boxed<M: HeadlessModel>(loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    Ok(Box::new(Application::with_config(
        HeadlessPlatform::<M>::new(),
        loop_config,
    )?))
}

/// Open a headless backend for the named model
pub fn open(model: &str, loop_config: LoopConfig) -> Result<Box<dyn ApplicationBackend>> {
    let backend: Box<dyn ApplicationBackend> = match model {
        "xorg" | "x11" | "native" => boxed::<XorgModel>(loop_config)?,
        "win32" => boxed::<Win32Model>(loop_config)?,
        "gtk" => boxed::<GtkModel>(loop_config)?,
        "game" | "glfw" => boxed::<GameModel>(loop_config)?,
        other => {
            return Err(Error::UnsupportedPlatform(format!(
                "no headless event model '{other}'"
            )))
        }
    };
    Ok(backend)
}

const SAMPLE_COUNTS: [u8; 6] = [0, 1, 2, 4, 8, 16];
const MAX_VERSION: (u8, u8) = (4, 6);

/// Simulated window system
pub struct HeadlessPlatform<M: HeadlessModel> {
    name: String,
    monitors: Vec<Monitor>,
    extents: FrameExtents,
    modifiers: Cell<Modifiers>,
    next_origin: Cell<i32>,
    _model: PhantomData<fn() -> M>,
}

impl<M: HeadlessModel> HeadlessPlatform<M> {
    pub fn new() -> Self {
        Self {
            name: format!("headless:{}", M::NAME),
            monitors: vec![
                Monitor::new("HEADLESS-1", (0, 0), (1920, 1080)),
                Monitor::new("HEADLESS-2", (1920, 0), (1280, 1024)),
            ],
            extents: FrameExtents::new(4, 28, 4, 4),
            modifiers: Cell::new(Modifiers::empty()),
            next_origin: Cell::new(40),
            _model: PhantomData,
        }
    }

    pub fn with_monitors(mut self, monitors: Vec<Monitor>) -> Self {
        self.monitors = monitors;
        self
    }

    /// Decorations drawn around decorated windows
    pub fn with_frame_extents(mut self, extents: FrameExtents) -> Self {
        self.extents = extents;
        self
    }

    /// Simulate modifier keys being held
    pub fn set_keyboard_modifiers(&self, modifiers: Modifiers) {
        self.modifiers.set(modifiers);
    }

    fn check_gl(request: &SurfaceRequest<'_>) -> Result<()> {
        let gl = request.gl;
        if !SAMPLE_COUNTS.contains(&gl.samples) {
            return Err(Error::ContextCreationFailed(format!(
                "no visual with {} samples",
                gl.samples
            )));
        }
        if gl.stereo {
            return Err(Error::ContextCreationFailed(
                "no stereo visual available".to_string(),
            ));
        }
        if gl.version() > MAX_VERSION {
            return Err(Error::ContextCreationFailed(format!(
                "GL {}.{} not available (max {}.{})",
                gl.major_version, gl.minor_version, MAX_VERSION.0, MAX_VERSION.1
            )));
        }
        Ok(())
    }
}

impl<M: HeadlessModel> Default for HeadlessPlatform<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: HeadlessModel> Platform for HeadlessPlatform<M> {
    type Model = M;
    type Window = HeadlessWindow<M>;
    type Context = HeadlessContext;

    fn name(&self) -> &str {
        &self.name
    }

    fn monitors(&self) -> Vec<Monitor> {
        self.monitors.clone()
    }

    fn create_surface(
        &self,
        request: &SurfaceRequest<'_>,
        share: Option<&HeadlessContext>,
    ) -> Result<(HeadlessWindow<M>, HeadlessContext)> {
        let (width, height) = request.size;
        if width == 0 || height == 0 {
            return Err(Error::WindowCreationFailed(format!(
                "invalid size {width}x{height}"
            )));
        }
        Self::check_gl(request)?;

        let position = request.position.unwrap_or_else(|| {
            let origin = self.next_origin.get();
            self.next_origin.set(origin + 30);
            (origin, origin)
        });
        let extents = if request.decorated {
            self.extents
        } else {
            FrameExtents::NONE
        };
        let window = HeadlessWindow {
            sim: RefCell::new(WindowSim {
                title: request.title.to_string(),
                position,
                size: request.size,
                extents,
                visible: false,
                fullscreen: None,
                fixed: None,
            }),
            queue: RefCell::new(VecDeque::new()),
        };
        let context = HeadlessContext::new(share, u32::from(request.vsync));
        Ok((window, context))
    }

    fn modifiers(&self) -> Modifiers {
        self.modifiers.get()
    }

    fn ignored_gl_fields(&self) -> &'static [GlField] {
        M::ignored_gl_fields()
    }

    fn native_handle(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct WindowSim {
    title: String,
    /// Client origin
    position: (i32, i32),
    /// Client size
    size: (u32, u32),
    extents: FrameExtents,
    visible: bool,
    fullscreen: Option<Monitor>,
    fixed: Option<(u32, u32)>,
}

impl WindowSim {
    fn extents(&self) -> FrameExtents {
        if self.fullscreen.is_some() {
            FrameExtents::NONE
        } else {
            self.extents
        }
    }
}

/// Simulated native window
pub struct HeadlessWindow<M: HeadlessModel> {
    sim: RefCell<WindowSim>,
    queue: RefCell<VecDeque<M::Event>>,
}

impl<M: HeadlessModel> HeadlessWindow<M> {
    /// Queue a native event as if the window system delivered it
    pub fn inject(&self, event: M::Event) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Simulate the user clicking the close button
    pub fn request_close(&self) {
        self.inject(M::close_request());
    }

    /// Simulate another window taking keyboard focus
    pub fn lose_focus(&self) {
        self.inject(M::focus_out());
    }

    /// Simulate the window system asking for a redraw
    pub fn expose(&self) {
        let size = self.sim.borrow().size;
        self.inject(M::expose(size));
    }

    /// Simulate the user resizing the window to a client size
    pub fn user_resize(&self, size: (u32, u32)) {
        let changed = {
            let mut sim = self.sim.borrow_mut();
            let size = sim.fixed.unwrap_or(size);
            let changed = sim.size != size;
            sim.size = size;
            changed
        };
        if changed {
            self.configure();
        }
    }

    pub fn title(&self) -> String {
        self.sim.borrow().title.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.sim.borrow().visible
    }

    pub fn is_fullscreen(&self) -> bool {
        self.sim.borrow().fullscreen.is_some()
    }

    pub fn fixed_size(&self) -> Option<(u32, u32)> {
        self.sim.borrow().fixed
    }

    /// Outer rectangle as (x, y, width, height)
    pub fn outer_rect(&self) -> (i32, i32, u32, u32) {
        let sim = self.sim.borrow();
        let extents = sim.extents();
        let (x, y) = extents.client_to_window_pos(sim.position.0, sim.position.1);
        let (w, h) = extents.client_to_window(sim.size.0, sim.size.1);
        (x, y, w, h)
    }

    pub fn pending_events(&self) -> usize {
        self.queue.borrow().len()
    }

    fn configure(&self) {
        let size = self.sim.borrow().size;
        self.inject(M::configure(size));
    }
}

impl<M: HeadlessModel> NativeWindow for HeadlessWindow<M> {
    type Event = M::Event;

    fn frame_extents(&self) -> FrameExtents {
        self.sim.borrow().extents()
    }

    fn set_title(&self, title: &str) -> Result<()> {
        self.sim.borrow_mut().title = title.to_string();
        Ok(())
    }

    fn set_outer_size(&self, (width, height): (u32, u32)) -> Result<()> {
        let changed = {
            let mut sim = self.sim.borrow_mut();
            let requested = sim.extents().window_to_client(width, height);
            let size = sim.fixed.unwrap_or(requested);
            if size.0 == 0 || size.1 == 0 {
                return Err(Error::Native(format!("invalid window size {width}x{height}")));
            }
            let changed = sim.size != size;
            sim.size = size;
            changed
        };
        if changed {
            self.configure();
        }
        Ok(())
    }

    fn set_outer_position(&self, (x, y): (i32, i32)) -> Result<()> {
        let mut sim = self.sim.borrow_mut();
        sim.position = sim.extents().window_to_client_pos(x, y);
        Ok(())
    }

    fn inner_size(&self) -> (u32, u32) {
        self.sim.borrow().size
    }

    fn inner_position(&self) -> (i32, i32) {
        self.sim.borrow().position
    }

    fn set_visible(&self, visible: bool) -> Result<()> {
        let mapped = {
            let mut sim = self.sim.borrow_mut();
            let mapped = visible && !sim.visible;
            sim.visible = visible;
            mapped
        };
        if mapped {
            self.configure();
            self.expose();
        }
        Ok(())
    }

    fn set_fullscreen(&self, monitor: Option<&Monitor>) -> Result<()> {
        {
            let mut sim = self.sim.borrow_mut();
            match monitor {
                Some(monitor) => {
                    sim.position = monitor.position;
                    sim.size = monitor.size;
                    sim.fullscreen = Some(monitor.clone());
                }
                None => sim.fullscreen = None,
            }
        }
        self.configure();
        Ok(())
    }

    fn set_fixed_size(&self, size: Option<(u32, u32)>) -> Result<()> {
        let changed = {
            let mut sim = self.sim.borrow_mut();
            sim.fixed = size;
            match size {
                Some(size) if sim.fullscreen.is_none() && sim.size != size => {
                    sim.size = size;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.configure();
        }
        Ok(())
    }

    fn drain_events(&self, out: &mut Vec<M::Event>) {
        out.extend(self.queue.borrow_mut().drain(..));
    }
}

#[derive(Debug, Default)]
struct ObjectSpace {
    next: u32,
    live: HashSet<u32>,
}

/// Software stand-in for a GL context
///
/// Contexts created against a share context see the same object names.
pub struct HeadlessContext {
    serial: u64,
    objects: Rc<RefCell<ObjectSpace>>,
    swaps: Cell<u64>,
    swap_interval: u32,
}

impl HeadlessContext {
    fn new(share: Option<&HeadlessContext>, swap_interval: u32) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let objects = share
            .map(|s| s.objects.clone())
            .unwrap_or_default();
        Self {
            serial: COUNTER.fetch_add(1, Ordering::Relaxed),
            objects,
            swaps: Cell::new(0),
            swap_interval,
        }
    }

    fn is_bound(&self) -> bool {
        BOUND.with(|b| b.get()) == Some(self.serial)
    }

    fn require_current(&self, what: &str) -> Result<()> {
        if self.is_bound() {
            Ok(())
        } else {
            Err(Error::Native(format!("{what} without a current context")))
        }
    }

    /// Create a GL object (texture, buffer, ...) and return its name
    pub fn gen_object(&self) -> Result<u32> {
        self.require_current("gen_object")?;
        let mut objects = self.objects.borrow_mut();
        objects.next += 1;
        let name = objects.next;
        objects.live.insert(name);
        Ok(name)
    }

    /// Whether an object name is valid in this context
    pub fn has_object(&self, name: u32) -> Result<bool> {
        self.require_current("has_object")?;
        Ok(self.objects.borrow().live.contains(&name))
    }

    pub fn delete_object(&self, name: u32) -> Result<bool> {
        self.require_current("delete_object")?;
        Ok(self.objects.borrow_mut().live.remove(&name))
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps.get()
    }

    pub fn swap_interval(&self) -> u32 {
        self.swap_interval
    }

    /// Whether both contexts see the same objects
    pub fn shares_objects_with(&self, other: &HeadlessContext) -> bool {
        Rc::ptr_eq(&self.objects, &other.objects)
    }
}

impl NativeContext for HeadlessContext {
    fn make_current(&self) -> Result<()> {
        BOUND.with(|b| b.set(Some(self.serial)));
        Ok(())
    }

    fn swap_buffers(&self) -> Result<()> {
        self.require_current("swap_buffers")?;
        self.swaps.set(self.swaps.get() + 1);
        Ok(())
    }

    fn release_current(&self) {
        if self.is_bound() {
            BOUND.with(|b| b.set(None));
        }
    }
}

impl Drop for HeadlessContext {
    fn drop(&mut self) {
        self.release_current();
        debug!(
            "Destroyed headless context {} ({} shared reference(s) left)",
            self.serial,
            Rc::strong_count(&self.objects) - 1
        );
    }
}
