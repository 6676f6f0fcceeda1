//! Xlib display connection, windows and the X11 platform

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::{c_char, c_int, c_long, c_uchar, c_uint, c_ulong};
use std::ptr;
use std::rc::Rc;

use log::{debug, info, warn};
use x11_dl::{glx, xinerama, xlib};

use super::context::{self, GlxContext};
use super::input::{XorgEvent, XorgModel};
use super::placement::Placement;
use crate::backend::{NativeWindow, Platform, SurfaceRequest};
use crate::error::{Error, Result};
use crate::event::Modifiers;
use crate::geometry::{FrameExtents, Monitor};

const EVENT_MASK: c_long = xlib::KeyPressMask
    | xlib::KeyReleaseMask
    | xlib::ButtonPressMask
    | xlib::ButtonReleaseMask
    | xlib::PointerMotionMask
    | xlib::StructureNotifyMask
    | xlib::FocusChangeMask
    | xlib::ExposureMask;

const NET_WM_STATE_REMOVE: c_long = 0;
const NET_WM_STATE_ADD: c_long = 1;
const MWM_HINTS_DECORATIONS: c_ulong = 1 << 1;

struct Atoms {
    wm_protocols: xlib::Atom,
    wm_delete_window: xlib::Atom,
    net_wm_state: xlib::Atom,
    net_wm_state_fullscreen: xlib::Atom,
    net_frame_extents: xlib::Atom,
    net_wm_bypass_compositor: xlib::Atom,
    motif_wm_hints: xlib::Atom,
}

/// Shared Xlib connection
///
/// Events for every window arrive on the one connection; `pump` sorts them
/// into per-window queues.
pub(super) struct XDisplay {
    pub(super) xlib: xlib::Xlib,
    pub(super) glx: glx::Glx,
    xinerama: Option<xinerama::Xlib>,
    pub(super) display: *mut xlib::Display,
    pub(super) screen: c_int,
    root: xlib::Window,
    atoms: Atoms,
    queues: RefCell<HashMap<xlib::Window, VecDeque<XorgEvent>>>,
}

impl XDisplay {
    fn open() -> Result<Rc<Self>> {
        let xlib = xlib::Xlib::open().map_err(|e| Error::UnsupportedPlatform(e.to_string()))?;
        let glx = glx::Glx::open().map_err(|e| Error::UnsupportedPlatform(e.to_string()))?;
        let xinerama = xinerama::Xlib::open().ok();

        let display = unsafe { (xlib.XOpenDisplay)(ptr::null()) };
        if display.is_null() {
            return Err(Error::UnsupportedPlatform(
                "cannot open X display".to_string(),
            ));
        }
        let screen = unsafe { (xlib.XDefaultScreen)(display) };
        let root = unsafe { (xlib.XRootWindow)(display, screen) };

        let intern = |name: &str| -> xlib::Atom {
            let name = CString::new(name).unwrap_or_default();
            unsafe { (xlib.XInternAtom)(display, name.as_ptr(), xlib::False) }
        };
        let atoms = Atoms {
            wm_protocols: intern("WM_PROTOCOLS"),
            wm_delete_window: intern("WM_DELETE_WINDOW"),
            net_wm_state: intern("_NET_WM_STATE"),
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN"),
            net_frame_extents: intern("_NET_FRAME_EXTENTS"),
            net_wm_bypass_compositor: intern("_NET_WM_BYPASS_COMPOSITOR"),
            motif_wm_hints: intern("_MOTIF_WM_HINTS"),
        };

        // Repeats then arrive as press/press/.../release
        let mut supported = xlib::False;
        unsafe { (xlib.XkbSetDetectableAutoRepeat)(display, xlib::True, &mut supported) };
        if supported == xlib::False {
            warn!("X server lacks detectable auto-repeat");
        }

        Ok(Rc::new(Self {
            xlib,
            glx,
            xinerama,
            display,
            screen,
            root,
            atoms,
            queues: RefCell::new(HashMap::new()),
        }))
    }

    /// Move every pending X event into its window's queue
    fn pump(&self) {
        let mut queues = self.queues.borrow_mut();
        unsafe {
            while (self.xlib.XPending)(self.display) > 0 {
                let mut event: xlib::XEvent = mem::zeroed();
                (self.xlib.XNextEvent)(self.display, &mut event);
                let window = event.any.window;
                let Some(queue) = queues.get_mut(&window) else {
                    continue;
                };
                if let Some(event) = self.decode(&mut event) {
                    queue.push_back(event);
                }
            }
        }
    }

    unsafe fn decode(&self, event: &mut xlib::XEvent) -> Option<XorgEvent> {
        match event.get_type() {
            kind @ (xlib::KeyPress | xlib::KeyRelease) => {
                let mut buf = [0 as c_char; 32];
                let mut keysym: xlib::KeySym = 0;
                let len = (self.xlib.XLookupString)(
                    &mut event.key,
                    buf.as_mut_ptr(),
                    buf.len() as c_int,
                    &mut keysym,
                    ptr::null_mut(),
                );
                let bytes: Vec<u8> = buf[..len.max(0) as usize]
                    .iter()
                    .map(|b| *b as u8)
                    .collect();
                Some(XorgEvent::Key {
                    pressed: kind == xlib::KeyPress,
                    keycode: event.key.keycode,
                    keysym: keysym as u32,
                    state: event.key.state,
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
            kind @ (xlib::ButtonPress | xlib::ButtonRelease) => Some(XorgEvent::Button {
                pressed: kind == xlib::ButtonPress,
                button: event.button.button,
                x: event.button.x,
                y: event.button.y,
                state: event.button.state,
            }),
            xlib::MotionNotify => Some(XorgEvent::Motion {
                x: event.motion.x,
                y: event.motion.y,
                state: event.motion.state,
            }),
            xlib::ConfigureNotify => Some(XorgEvent::Configure {
                width: event.configure.width.max(0) as u32,
                height: event.configure.height.max(0) as u32,
            }),
            xlib::Expose => Some(XorgEvent::Expose {
                x: event.expose.x,
                y: event.expose.y,
                width: event.expose.width.max(0) as u32,
                height: event.expose.height.max(0) as u32,
            }),
            xlib::ClientMessage => {
                let message = event.client_message;
                let is_delete = message.message_type == self.atoms.wm_protocols
                    && message.data.get_long(0) as xlib::Atom == self.atoms.wm_delete_window;
                is_delete.then_some(XorgEvent::DeleteWindow)
            }
            // Grab-driven focus changes keep the keyboard in this window
            xlib::FocusOut if event.focus_change.mode == xlib::NotifyNormal => {
                Some(XorgEvent::FocusOut)
            }
            _ => None,
        }
    }

    fn monitors(&self) -> Vec<Monitor> {
        if let Some(xinerama) = &self.xinerama {
            unsafe {
                if (xinerama.XineramaIsActive)(self.display) != 0 {
                    let mut count = 0;
                    let screens = (xinerama.XineramaQueryScreens)(self.display, &mut count);
                    if !screens.is_null() {
                        let monitors = std::slice::from_raw_parts(screens, count.max(0) as usize)
                            .iter()
                            .map(|s| {
                                Monitor::new(
                                    format!("XINERAMA-{}", s.screen_number),
                                    (s.x_org as i32, s.y_org as i32),
                                    (s.width.max(0) as u32, s.height.max(0) as u32),
                                )
                            })
                            .collect();
                        (self.xlib.XFree)(screens.cast());
                        return monitors;
                    }
                }
            }
        }
        let (width, height) = unsafe {
            (
                (self.xlib.XDisplayWidth)(self.display, self.screen),
                (self.xlib.XDisplayHeight)(self.display, self.screen),
            )
        };
        vec![Monitor::new(
            format!("SCREEN-{}", self.screen),
            (0, 0),
            (width.max(0) as u32, height.max(0) as u32),
        )]
    }

    fn query_modifiers(&self) -> Modifiers {
        let mut root = 0;
        let mut child = 0;
        let (mut rx, mut ry, mut wx, mut wy) = (0, 0, 0, 0);
        let mut mask: c_uint = 0;
        unsafe {
            (self.xlib.XQueryPointer)(
                self.display,
                self.root,
                &mut root,
                &mut child,
                &mut rx,
                &mut ry,
                &mut wx,
                &mut wy,
                &mut mask,
            );
        }
        super::input::modifiers(mask)
    }

    fn flush(&self) {
        unsafe { (self.xlib.XFlush)(self.display) };
    }
}

impl Drop for XDisplay {
    fn drop(&mut self) {
        unsafe { (self.xlib.XCloseDisplay)(self.display) };
        debug!("Closed X display");
    }
}

/// X11 + GLX platform
pub struct XorgPlatform {
    display: Rc<XDisplay>,
}

impl XorgPlatform {
    pub fn connect() -> Result<Self> {
        let display = XDisplay::open()?;
        let name = unsafe { CStr::from_ptr((display.xlib.XDisplayString)(display.display)) };
        info!("Connected to X display {}", name.to_string_lossy());
        Ok(Self { display })
    }
}

impl Platform for XorgPlatform {
    type Model = XorgModel;
    type Window = XorgWindow;
    type Context = GlxContext;

    fn name(&self) -> &str {
        "x11"
    }

    fn monitors(&self) -> Vec<Monitor> {
        self.display.monitors()
    }

    fn create_surface(
        &self,
        request: &SurfaceRequest<'_>,
        share: Option<&GlxContext>,
    ) -> Result<(XorgWindow, GlxContext)> {
        let config = context::FbConfig::choose(&self.display, request.gl)?;
        let window = XorgWindow::create(&self.display, request, &config)?;
        let context = GlxContext::create(&self.display, &config, window.window, request, share)?;
        Ok((window, context))
    }

    fn modifiers(&self) -> Modifiers {
        self.display.query_modifiers()
    }

    fn pump(&self) -> Result<()> {
        self.display.pump();
        Ok(())
    }

    fn native_handle(&self) -> &dyn Any {
        self
    }
}

/// One top-level X window
pub struct XorgWindow {
    display: Rc<XDisplay>,
    pub(super) window: xlib::Window,
    colormap: xlib::Colormap,
    decorated: bool,
    fullscreen: Cell<bool>,
    placement: Cell<Placement>,
}

impl XorgWindow {
    fn create(
        display: &Rc<XDisplay>,
        request: &SurfaceRequest<'_>,
        config: &context::FbConfig,
    ) -> Result<Self> {
        let xlib = &display.xlib;
        let visual = config.visual();
        let (width, height) = request.size;
        let (x, y) = request.position.unwrap_or((0, 0));

        let window = unsafe {
            let colormap = (xlib.XCreateColormap)(
                display.display,
                display.root,
                (*visual).visual,
                xlib::AllocNone,
            );
            let mut attributes: xlib::XSetWindowAttributes = mem::zeroed();
            attributes.colormap = colormap;
            attributes.event_mask = EVENT_MASK;
            let window = (xlib.XCreateWindow)(
                display.display,
                display.root,
                x,
                y,
                width,
                height,
                0,
                (*visual).depth,
                xlib::InputOutput as c_uint,
                (*visual).visual,
                xlib::CWColormap | xlib::CWEventMask,
                &mut attributes,
            );
            if window == 0 {
                (xlib.XFreeColormap)(display.display, colormap);
                return Err(Error::WindowCreationFailed(
                    "XCreateWindow failed".to_string(),
                ));
            }
            XorgWindow {
                display: display.clone(),
                window,
                colormap,
                decorated: request.decorated,
                fullscreen: Cell::new(false),
                placement: Cell::new(Placement::request(request.position)),
            }
        };

        let mut protocols = [display.atoms.wm_delete_window];
        unsafe {
            (xlib.XSetWMProtocols)(display.display, window.window, protocols.as_mut_ptr(), 1);
        }
        window.set_title(request.title)?;
        if !request.decorated {
            window.set_motif_decorations(false);
        }
        if request.position.is_some() {
            // Client origin for now; re-placed once the frame is known
            window.move_window(x, y);
        }
        display.queues.borrow_mut().insert(window.window, VecDeque::new());
        debug!("Created X window 0x{:x}", window.window);
        Ok(window)
    }

    fn move_window(&self, x: i32, y: i32) {
        unsafe { (self.display.xlib.XMoveWindow)(self.display.display, self.window, x, y) };
        self.display.flush();
    }

    /// Finish a creation-time placement once the frame extents are known
    fn settle_placement(&self) {
        let mut placement = self.placement.get();
        if !placement.is_pending() {
            return;
        }
        let extents = if self.decorated {
            self.read_frame_extents()
        } else {
            Some(FrameExtents::NONE)
        };
        if let Some((x, y)) = placement.resolve(extents) {
            self.move_window(x, y);
        }
        self.placement.set(placement);
    }

    fn cancel_placement(&self) {
        let mut placement = self.placement.get();
        placement.cancel();
        self.placement.set(placement);
    }

    fn set_motif_decorations(&self, on: bool) {
        let hints: [c_ulong; 5] = [MWM_HINTS_DECORATIONS, 0, on as c_ulong, 0, 0];
        unsafe {
            (self.display.xlib.XChangeProperty)(
                self.display.display,
                self.window,
                self.display.atoms.motif_wm_hints,
                self.display.atoms.motif_wm_hints,
                32,
                xlib::PropModeReplace,
                hints.as_ptr() as *const c_uchar,
                hints.len() as c_int,
            );
        }
    }

    fn set_cardinal(&self, property: xlib::Atom, value: c_ulong) {
        let value = [value];
        unsafe {
            (self.display.xlib.XChangeProperty)(
                self.display.display,
                self.window,
                property,
                xlib::XA_CARDINAL,
                32,
                xlib::PropModeReplace,
                value.as_ptr() as *const c_uchar,
                1,
            );
        }
    }

    fn send_wm_state(&self, add: bool) {
        let atoms = &self.display.atoms;
        unsafe {
            let mut event: xlib::XEvent = mem::zeroed();
            event.client_message.type_ = xlib::ClientMessage;
            event.client_message.window = self.window;
            event.client_message.message_type = atoms.net_wm_state;
            event.client_message.format = 32;
            let action = if add { NET_WM_STATE_ADD } else { NET_WM_STATE_REMOVE };
            event.client_message.data.set_long(0, action);
            event.client_message.data.set_long(1, atoms.net_wm_state_fullscreen as c_long);
            event.client_message.data.set_long(2, 0);
            event.client_message.data.set_long(3, 1);
            (self.display.xlib.XSendEvent)(
                self.display.display,
                self.display.root,
                xlib::False,
                xlib::SubstructureRedirectMask | xlib::SubstructureNotifyMask,
                &mut event,
            );
        }
    }

    fn set_size_hints(&self, size: Option<(u32, u32)>) {
        unsafe {
            let mut hints: xlib::XSizeHints = mem::zeroed();
            if let Some((width, height)) = size {
                hints.flags = xlib::PMinSize | xlib::PMaxSize;
                hints.min_width = width as c_int;
                hints.max_width = width as c_int;
                hints.min_height = height as c_int;
                hints.max_height = height as c_int;
            }
            (self.display.xlib.XSetWMNormalHints)(self.display.display, self.window, &mut hints);
        }
    }

    /// `_NET_FRAME_EXTENTS` as published by the window manager
    fn read_frame_extents(&self) -> Option<FrameExtents> {
        let mut actual_type = 0;
        let mut actual_format = 0;
        let mut items: c_ulong = 0;
        let mut after: c_ulong = 0;
        let mut data: *mut c_uchar = ptr::null_mut();
        unsafe {
            let status = (self.display.xlib.XGetWindowProperty)(
                self.display.display,
                self.window,
                self.display.atoms.net_frame_extents,
                0,
                4,
                xlib::False,
                xlib::XA_CARDINAL,
                &mut actual_type,
                &mut actual_format,
                &mut items,
                &mut after,
                &mut data,
            );
            if status != xlib::Success as c_int || data.is_null() {
                return None;
            }
            let extents = (items == 4 && actual_format == 32).then(|| {
                let values = std::slice::from_raw_parts(data as *const c_long, 4);
                // left, right, top, bottom
                FrameExtents::new(
                    values[0].max(0) as u32,
                    values[2].max(0) as u32,
                    values[1].max(0) as u32,
                    values[3].max(0) as u32,
                )
            });
            (self.display.xlib.XFree)(data.cast());
            extents
        }
    }
}

impl NativeWindow for XorgWindow {
    type Event = XorgEvent;

    fn frame_extents(&self) -> FrameExtents {
        if self.fullscreen.get() || !self.decorated {
            return FrameExtents::NONE;
        }
        self.read_frame_extents().unwrap_or(FrameExtents::NONE)
    }

    fn set_title(&self, title: &str) -> Result<()> {
        let title = CString::new(title).map_err(|e| Error::invalid(e.to_string()))?;
        unsafe { (self.display.xlib.XStoreName)(self.display.display, self.window, title.as_ptr()) };
        self.display.flush();
        Ok(())
    }

    fn set_outer_size(&self, (width, height): (u32, u32)) -> Result<()> {
        // XResizeWindow sizes the client window
        let (width, height) = self.frame_extents().window_to_client(width, height);
        if width == 0 || height == 0 {
            return Err(Error::invalid("window size smaller than its frame"));
        }
        unsafe { (self.display.xlib.XResizeWindow)(self.display.display, self.window, width, height) };
        self.display.flush();
        Ok(())
    }

    fn set_outer_position(&self, (x, y): (i32, i32)) -> Result<()> {
        self.cancel_placement();
        self.move_window(x, y);
        Ok(())
    }

    fn inner_size(&self) -> (u32, u32) {
        unsafe {
            let mut attributes: xlib::XWindowAttributes = mem::zeroed();
            (self.display.xlib.XGetWindowAttributes)(self.display.display, self.window, &mut attributes);
            (attributes.width.max(0) as u32, attributes.height.max(0) as u32)
        }
    }

    fn inner_position(&self) -> (i32, i32) {
        // Relative to the root, not to a reparenting frame
        let (mut x, mut y) = (0, 0);
        let mut child = 0;
        unsafe {
            (self.display.xlib.XTranslateCoordinates)(
                self.display.display,
                self.window,
                self.display.root,
                0,
                0,
                &mut x,
                &mut y,
                &mut child,
            );
        }
        (x, y)
    }

    fn set_visible(&self, visible: bool) -> Result<()> {
        unsafe {
            if visible {
                (self.display.xlib.XMapWindow)(self.display.display, self.window);
            } else {
                (self.display.xlib.XUnmapWindow)(self.display.display, self.window);
            }
        }
        self.display.flush();
        Ok(())
    }

    fn set_fullscreen(&self, monitor: Option<&Monitor>) -> Result<()> {
        if let Some(monitor) = monitor {
            // The window manager fullscreens on the monitor holding the window
            self.set_outer_position(monitor.position)?;
        }
        let on = monitor.is_some();
        self.cancel_placement();
        self.send_wm_state(on);
        self.set_cardinal(self.display.atoms.net_wm_bypass_compositor, on as c_ulong);
        self.fullscreen.set(on);
        self.display.flush();
        Ok(())
    }

    fn set_fixed_size(&self, size: Option<(u32, u32)>) -> Result<()> {
        self.set_size_hints(size);
        if let Some((width, height)) = size {
            unsafe {
                (self.display.xlib.XResizeWindow)(self.display.display, self.window, width, height)
            };
        }
        self.display.flush();
        Ok(())
    }

    fn drain_events(&self, out: &mut Vec<XorgEvent>) {
        let start = out.len();
        if let Some(queue) = self.display.queues.borrow_mut().get_mut(&self.window) {
            out.extend(queue.drain(..));
        }
        // Reparenting and framing show up as configure notifications
        if out[start..]
            .iter()
            .any(|e| matches!(e, XorgEvent::Configure { .. }))
        {
            self.settle_placement();
        }
    }
}

impl Drop for XorgWindow {
    fn drop(&mut self) {
        self.display.queues.borrow_mut().remove(&self.window);
        unsafe {
            (self.display.xlib.XDestroyWindow)(self.display.display, self.window);
            (self.display.xlib.XFreeColormap)(self.display.display, self.colormap);
        }
        self.display.flush();
        debug!("Destroyed X window 0x{:x}", self.window);
    }
}
