//! GTK windows and GL areas
//!
//! Widget signals push `GtkEvent`s into a per-window queue while the GTK
//! main loop is pumped. Rendering happens outside the `render` signal: the
//! context binds the area's framebuffer, and a swap queues a redraw that
//! composites it.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use gtk::glib::translate::IntoGlib;
use gtk::prelude::*;
use gtk::{gdk, glib};
use log::{debug, info, warn};

use super::input::{ButtonKind, GtkEvent, GtkModel, ScrollDirection};
use super::present::PresentGate;
use crate::backend::{NativeContext, NativeWindow, Platform, SurfaceRequest};
use crate::error::{Error, Result};
use crate::event::Modifiers;
use crate::geometry::{FrameExtents, Monitor};

type Queue = Rc<RefCell<VecDeque<GtkEvent>>>;

fn push(queue: &Queue, event: GtkEvent) {
    match queue.try_borrow_mut() {
        Ok(mut queue) => queue.push_back(event),
        Err(_) => warn!("Dropped GTK event {:?} while its queue was busy", event),
    }
}

fn button_kind(event_type: gdk::EventType) -> Option<ButtonKind> {
    Some(match event_type {
        gdk::EventType::ButtonPress => ButtonKind::Press,
        gdk::EventType::DoubleButtonPress => ButtonKind::DoublePress,
        gdk::EventType::TripleButtonPress => ButtonKind::TriplePress,
        gdk::EventType::ButtonRelease => ButtonKind::Release,
        _ => return None,
    })
}

fn scroll_direction(event: &gdk::EventScroll) -> Option<ScrollDirection> {
    Some(match event.direction() {
        gdk::ScrollDirection::Up => ScrollDirection::Up,
        gdk::ScrollDirection::Down => ScrollDirection::Down,
        gdk::ScrollDirection::Left => ScrollDirection::Left,
        gdk::ScrollDirection::Right => ScrollDirection::Right,
        gdk::ScrollDirection::Smooth => {
            let (dx, dy) = event.delta();
            ScrollDirection::Smooth { dx, dy }
        }
        _ => return None,
    })
}

/// GTK toolkit platform
pub struct GtkPlatform {
    display: gdk::Display,
}

impl GtkPlatform {
    pub fn init() -> Result<Self> {
        gtk::init().map_err(|e| Error::UnsupportedPlatform(format!("GTK init failed: {e}")))?;
        let display = gdk::Display::default()
            .ok_or_else(|| Error::UnsupportedPlatform("GTK has no default display".to_string()))?;
        info!("Initialized GTK on display {}", display.name());
        Ok(Self { display })
    }
}

impl Platform for GtkPlatform {
    type Model = GtkModel;
    type Window = GtkWindow;
    type Context = GtkContext;

    fn name(&self) -> &str {
        "gtk"
    }

    fn monitors(&self) -> Vec<Monitor> {
        let mut monitors: Vec<(bool, Monitor)> = (0..self.display.n_monitors())
            .filter_map(|i| self.display.monitor(i))
            .enumerate()
            .map(|(i, m)| {
                let geometry = m.geometry();
                let name = m
                    .model()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("monitor-{i}"));
                (
                    m.is_primary(),
                    Monitor::new(
                        name,
                        (geometry.x(), geometry.y()),
                        (geometry.width().max(0) as u32, geometry.height().max(0) as u32),
                    ),
                )
            })
            .collect();
        monitors.sort_by_key(|(primary, _)| !*primary);
        monitors.into_iter().map(|(_, m)| m).collect()
    }

    /// GDK contexts are never shared across canvases, so `share` is unused
    fn create_surface(
        &self,
        request: &SurfaceRequest<'_>,
        _share: Option<&GtkContext>,
    ) -> Result<(GtkWindow, GtkContext)> {
        let window = GtkWindow::create(request)?;
        let context = GtkContext {
            area: window.area.clone(),
            gate: window.gate.clone(),
        };
        Ok((window, context))
    }

    fn modifiers(&self) -> Modifiers {
        gdk::Keymap::for_display(&self.display)
            .map(|keymap| super::input::modifiers(keymap.modifier_state()))
            .unwrap_or_else(Modifiers::empty)
    }

    fn pump(&self) -> Result<()> {
        while gtk::events_pending() {
            gtk::main_iteration_do(false);
        }
        Ok(())
    }

    fn ignored_gl_fields(&self) -> &'static [crate::config::GlField] {
        super::IGNORED_GL_FIELDS
    }

    fn native_handle(&self) -> &dyn Any {
        &self.display
    }
}

/// Top-level window with its GL area
pub struct GtkWindow {
    window: gtk::Window,
    area: gtk::GLArea,
    queue: Queue,
    gate: PresentGate,
    // Kept alive for the commit signal
    _im: gtk::IMContextSimple,
}

impl GtkWindow {
    fn create(request: &SurfaceRequest<'_>) -> Result<Self> {
        let queue: Queue = Rc::default();
        let window = gtk::Window::new(gtk::WindowType::Toplevel);
        window.set_title(request.title);
        window.set_decorated(request.decorated);
        let (width, height) = request.size;
        window.set_default_size(width as i32, height as i32);
        if let Some((x, y)) = request.position {
            window.move_(x, y);
        }

        let area = gtk::GLArea::new();
        let (major, minor) = request.gl.version();
        area.set_required_version(major as i32, minor as i32);
        area.set_has_depth_buffer(request.gl.depth_size > 0);
        area.set_has_stencil_buffer(request.gl.stencil_size > 0);
        area.set_has_alpha(request.gl.alpha_size > 0);
        area.set_auto_render(false);
        area.set_can_focus(true);
        area.add_events(
            gdk::EventMask::POINTER_MOTION_MASK
                | gdk::EventMask::BUTTON_PRESS_MASK
                | gdk::EventMask::BUTTON_RELEASE_MASK
                | gdk::EventMask::SCROLL_MASK
                | gdk::EventMask::SMOOTH_SCROLL_MASK,
        );
        window.add(&area);

        let im = gtk::IMContextSimple::new();
        let gate = PresentGate::new();
        Self::connect(&window, &area, &im, &queue, &gate);

        area.realize();
        if let Some(e) = area.error() {
            unsafe { window.destroy() };
            return Err(Error::ContextCreationFailed(e.to_string()));
        }
        if area.context().is_none() {
            unsafe { window.destroy() };
            return Err(Error::ContextCreationFailed(
                "GL area has no context".to_string(),
            ));
        }
        im.set_client_window(window.window().as_ref());
        debug!("Created GTK window '{}'", request.title);

        Ok(Self {
            window,
            area,
            queue,
            gate,
            _im: im,
        })
    }

    fn connect(
        window: &gtk::Window,
        area: &gtk::GLArea,
        im: &gtk::IMContextSimple,
        queue: &Queue,
        gate: &PresentGate,
    ) {
        let q = queue.clone();
        im.connect_commit(move |_, text| push(&q, GtkEvent::Commit(text.to_string())));

        let key = |pressed: bool, im: gtk::IMContextSimple, q: Queue| {
            move |_: &gtk::Window, event: &gdk::EventKey| {
                im.filter_keypress(event);
                push(
                    &q,
                    GtkEvent::Key {
                        pressed,
                        keyval: event.keyval().into_glib(),
                        hardware_keycode: event.hardware_keycode(),
                        state: event.state().bits(),
                    },
                );
                glib::Propagation::Stop
            }
        };
        window.connect_key_press_event(key(true, im.clone(), queue.clone()));
        window.connect_key_release_event(key(false, im.clone(), queue.clone()));

        let button = |q: Queue| {
            move |_: &gtk::GLArea, event: &gdk::EventButton| {
                if let Some(kind) = button_kind(event.event_type()) {
                    let (x, y) = event.position();
                    push(
                        &q,
                        GtkEvent::Button {
                            kind,
                            button: event.button(),
                            x,
                            y,
                            state: event.state().bits(),
                        },
                    );
                }
                glib::Propagation::Stop
            }
        };
        area.connect_button_press_event(button(queue.clone()));
        area.connect_button_release_event(button(queue.clone()));

        let q = queue.clone();
        area.connect_motion_notify_event(move |_, event| {
            let (x, y) = event.position();
            push(
                &q,
                GtkEvent::Motion {
                    x,
                    y,
                    state: event.state().bits(),
                },
            );
            glib::Propagation::Stop
        });

        let q = queue.clone();
        area.connect_scroll_event(move |_, event| {
            if let Some(direction) = scroll_direction(event) {
                let (x, y) = event.position();
                push(
                    &q,
                    GtkEvent::Scroll {
                        x,
                        y,
                        direction,
                        state: event.state().bits(),
                    },
                );
            }
            glib::Propagation::Stop
        });

        let q = queue.clone();
        area.connect_resize(move |_, width, height| {
            push(
                &q,
                GtkEvent::Configure {
                    width: width.max(0) as u32,
                    height: height.max(0) as u32,
                },
            );
        });

        let q = queue.clone();
        let gate = gate.clone();
        area.connect_render(move |_, _| {
            if gate.admit_render() {
                push(&q, GtkEvent::Draw { region: None });
            }
            glib::Propagation::Stop
        });

        let q = queue.clone();
        window.connect_focus_out_event(move |_, _| {
            push(&q, GtkEvent::FocusOut);
            glib::Propagation::Proceed
        });

        let q = queue.clone();
        window.connect_delete_event(move |_, _| {
            push(&q, GtkEvent::Delete);
            glib::Propagation::Stop
        });
    }

    pub fn gtk_window(&self) -> &gtk::Window {
        &self.window
    }

    pub fn gl_area(&self) -> &gtk::GLArea {
        &self.area
    }
}

impl NativeWindow for GtkWindow {
    type Event = GtkEvent;

    fn frame_extents(&self) -> FrameExtents {
        let Some(gdk_window) = self.window.window() else {
            return FrameExtents::NONE;
        };
        let frame = gdk_window.frame_extents();
        let (cx, cy) = gdk_window.root_coords(0, 0);
        let (width, height) = (gdk_window.width(), gdk_window.height());
        let left = cx - frame.x();
        let top = cy - frame.y();
        let right = frame.width() - width - left;
        let bottom = frame.height() - height - top;
        FrameExtents::new(
            left.max(0) as u32,
            top.max(0) as u32,
            right.max(0) as u32,
            bottom.max(0) as u32,
        )
    }

    fn set_title(&self, title: &str) -> Result<()> {
        self.window.set_title(title);
        Ok(())
    }

    /// GTK sizes toplevels by their content, so the frame is taken back off
    fn set_outer_size(&self, (width, height): (u32, u32)) -> Result<()> {
        let (width, height) = self.frame_extents().window_to_client(width, height);
        self.window.resize(width.max(1) as i32, height.max(1) as i32);
        Ok(())
    }

    fn set_outer_position(&self, (x, y): (i32, i32)) -> Result<()> {
        self.window.move_(x, y);
        Ok(())
    }

    fn inner_size(&self) -> (u32, u32) {
        let (width, height) = self.window.size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    fn inner_position(&self) -> (i32, i32) {
        self.window
            .window()
            .map(|w| w.root_coords(0, 0))
            .unwrap_or_else(|| self.window.position())
    }

    fn set_visible(&self, visible: bool) -> Result<()> {
        if visible {
            self.window.show_all();
            self.area.grab_focus();
        } else {
            self.window.hide();
        }
        Ok(())
    }

    fn set_fullscreen(&self, monitor: Option<&Monitor>) -> Result<()> {
        match monitor {
            Some(monitor) => {
                self.window.move_(monitor.position.0, monitor.position.1);
                self.window.fullscreen();
            }
            None => self.window.unfullscreen(),
        }
        Ok(())
    }

    fn set_fixed_size(&self, size: Option<(u32, u32)>) -> Result<()> {
        match size {
            Some((width, height)) => {
                self.area.set_size_request(width as i32, height as i32);
                self.window.set_resizable(false);
                self.window.resize(width as i32, height as i32);
            }
            None => {
                self.area.set_size_request(-1, -1);
                self.window.set_resizable(true);
            }
        }
        Ok(())
    }

    fn drain_events(&self, out: &mut Vec<GtkEvent>) {
        if let Ok(mut queue) = self.queue.try_borrow_mut() {
            out.extend(queue.drain(..));
        }
    }
}

impl Drop for GtkWindow {
    fn drop(&mut self) {
        unsafe { self.window.destroy() };
        debug!("Destroyed GTK window");
    }
}

/// The GDK context owned by a canvas's GL area
pub struct GtkContext {
    area: gtk::GLArea,
    gate: PresentGate,
}

impl GtkContext {
    pub fn gl_context(&self) -> Option<gdk::GLContext> {
        self.area.context()
    }
}

impl NativeContext for GtkContext {
    fn make_current(&self) -> Result<()> {
        self.area.make_current();
        if let Some(e) = self.area.error() {
            return Err(Error::Native(e.to_string()));
        }
        self.area.attach_buffers();
        Ok(())
    }

    /// The area's framebuffer is composited on the next frame
    fn swap_buffers(&self) -> Result<()> {
        self.gate.present();
        self.area.queue_draw();
        Ok(())
    }

    fn release_current(&self) {
        if gdk::GLContext::current().is_some() && gdk::GLContext::current() == self.area.context() {
            gdk::GLContext::clear_current();
        }
    }
}
