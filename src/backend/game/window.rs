//! GLFW windows and contexts

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use glfw::{Context, WindowEvent, WindowHint, WindowMode};
use log::{debug, error, info};

use super::input::{GameEvent, GameModel};
use crate::backend::{NativeContext, NativeWindow, Platform, SurfaceRequest};
use crate::config::GlConfig;
use crate::error::{Error, Result};
use crate::event::Modifiers;
use crate::geometry::{FrameExtents, Monitor};

fn bits(size: u8) -> Option<u32> {
    Some(size as u32)
}

fn window_hints(glfw: &mut glfw::Glfw, request: &SurfaceRequest<'_>) {
    let gl: &GlConfig = request.gl;
    glfw.default_window_hints();
    let (major, minor) = gl.version();
    glfw.window_hint(WindowHint::ContextVersion(major as u32, minor as u32));
    glfw.window_hint(WindowHint::DoubleBuffer(gl.double_buffer));
    glfw.window_hint(WindowHint::Stereo(gl.stereo));
    glfw.window_hint(WindowHint::RedBits(bits(gl.red_size)));
    glfw.window_hint(WindowHint::GreenBits(bits(gl.green_size)));
    glfw.window_hint(WindowHint::BlueBits(bits(gl.blue_size)));
    glfw.window_hint(WindowHint::AlphaBits(bits(gl.alpha_size)));
    glfw.window_hint(WindowHint::DepthBits(bits(gl.depth_size)));
    glfw.window_hint(WindowHint::StencilBits(bits(gl.stencil_size)));
    glfw.window_hint(WindowHint::AccumRedBits(bits(gl.accum_red_size)));
    glfw.window_hint(WindowHint::AccumGreenBits(bits(gl.accum_green_size)));
    glfw.window_hint(WindowHint::AccumBlueBits(bits(gl.accum_blue_size)));
    glfw.window_hint(WindowHint::AccumAlphaBits(bits(gl.accum_alpha_size)));
    glfw.window_hint(WindowHint::AuxBuffers(bits(gl.aux_buffers)));
    glfw.window_hint(WindowHint::Samples((gl.samples > 0).then_some(gl.samples as u32)));
    glfw.window_hint(WindowHint::Visible(false));
    glfw.window_hint(WindowHint::Resizable(request.resizable));
    glfw.window_hint(WindowHint::Decorated(request.decorated));
}

fn translate(event: WindowEvent) -> Option<GameEvent> {
    Some(match event {
        WindowEvent::Key(key, scancode, action, mods) => GameEvent::Key {
            key: key as i32,
            scancode,
            action: action as i32,
            mods: mods.bits() as i32,
        },
        WindowEvent::Char(c) => GameEvent::Char(c),
        WindowEvent::MouseButton(button, action, mods) => GameEvent::MouseButton {
            button: button as i32,
            action: action as i32,
            mods: mods.bits() as i32,
        },
        WindowEvent::CursorPos(x, y) => GameEvent::CursorPos { x, y },
        WindowEvent::Scroll(dx, dy) => GameEvent::Scroll { dx, dy },
        WindowEvent::FramebufferSize(width, height) => GameEvent::FramebufferSize { width, height },
        WindowEvent::Refresh => GameEvent::Refresh,
        WindowEvent::Close => GameEvent::Close,
        WindowEvent::Focus(focused) => GameEvent::Focus(focused),
        _ => return None,
    })
}

/// GLFW platform
pub struct GamePlatform {
    glfw: RefCell<glfw::Glfw>,
}

impl GamePlatform {
    pub fn init() -> Result<Self> {
        let glfw = glfw::init(|e: glfw::Error, description: String| {
            error!("GLFW error {:?}: {}", e, description)
        })
        .map_err(|e| Error::UnsupportedPlatform(format!("GLFW init failed: {e:?}")))?;
        info!("Initialized GLFW {}", glfw::get_version_string());
        Ok(Self {
            glfw: RefCell::new(glfw),
        })
    }

    fn glfw(&self) -> Result<std::cell::RefMut<'_, glfw::Glfw>> {
        self.glfw
            .try_borrow_mut()
            .map_err(|_| Error::invalid("GLFW is busy"))
    }
}

impl Platform for GamePlatform {
    type Model = GameModel;
    type Window = GameWindow;
    type Context = GameContext;

    fn name(&self) -> &str {
        "game"
    }

    fn monitors(&self) -> Vec<Monitor> {
        let Ok(mut glfw) = self.glfw() else {
            return Vec::new();
        };
        glfw.with_connected_monitors(|_, monitors| {
            monitors
                .iter()
                .enumerate()
                .filter_map(|(i, m)| {
                    let mode = m.get_video_mode()?;
                    let name = m.get_name().unwrap_or_else(|| format!("monitor-{i}"));
                    Some(Monitor::new(name, m.get_pos(), (mode.width, mode.height)))
                })
                .collect()
        })
    }

    /// GLFW contexts are never shared across canvases, so `share` is unused
    fn create_surface(
        &self,
        request: &SurfaceRequest<'_>,
        _share: Option<&GameContext>,
    ) -> Result<(GameWindow, GameContext)> {
        let mut glfw = self.glfw()?;
        window_hints(&mut glfw, request);
        let (width, height) = request.size;
        let (mut window, events) = glfw
            .create_window(width, height, request.title, WindowMode::Windowed)
            .ok_or_else(|| {
                Error::ContextCreationFailed(format!(
                    "GLFW could not create a window with {:?}",
                    request.gl
                ))
            })?;
        window.set_all_polling(true);
        if let Some((x, y)) = request.position {
            window.set_pos(x, y);
        }
        if request.vsync {
            window.make_current();
            glfw.set_swap_interval(glfw::SwapInterval::Sync(1));
        }
        debug!("Created GLFW window '{}'", request.title);

        let window = Rc::new(RefCell::new(window));
        let context = GameContext {
            window: window.clone(),
        };
        Ok((
            GameWindow {
                glfw: (*glfw).clone(),
                window,
                events,
            },
            context,
        ))
    }

    /// GLFW reports modifiers only on events; the model reads them there
    fn modifiers(&self) -> Modifiers {
        Modifiers::empty()
    }

    fn pump(&self) -> Result<()> {
        self.glfw()?.poll_events();
        Ok(())
    }

    fn native_handle(&self) -> &dyn Any {
        &self.glfw
    }
}

/// The single GLFW window of a canvas
pub struct GameWindow {
    glfw: glfw::Glfw,
    window: Rc<RefCell<glfw::PWindow>>,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
}

impl GameWindow {
    fn with<T>(&self, f: impl FnOnce(&mut glfw::PWindow) -> T) -> Result<T> {
        let mut window = self
            .window
            .try_borrow_mut()
            .map_err(|_| Error::invalid("GLFW window is busy"))?;
        Ok(f(&mut window))
    }
}

impl NativeWindow for GameWindow {
    type Event = GameEvent;

    fn frame_extents(&self) -> FrameExtents {
        self.with(|w| {
            let (left, top, right, bottom) = w.get_frame_size();
            FrameExtents::new(
                left.max(0) as u32,
                top.max(0) as u32,
                right.max(0) as u32,
                bottom.max(0) as u32,
            )
        })
        .unwrap_or(FrameExtents::NONE)
    }

    fn set_title(&self, title: &str) -> Result<()> {
        self.with(|w| w.set_title(title))
    }

    fn set_outer_size(&self, (width, height): (u32, u32)) -> Result<()> {
        let (width, height) = self.frame_extents().window_to_client(width, height);
        self.with(|w| w.set_size(width as i32, height as i32))
    }

    fn set_outer_position(&self, (x, y): (i32, i32)) -> Result<()> {
        let (x, y) = self.frame_extents().window_to_client_pos(x, y);
        self.with(|w| w.set_pos(x, y))
    }

    fn inner_size(&self) -> (u32, u32) {
        self.with(|w| {
            let (width, height) = w.get_size();
            (width.max(0) as u32, height.max(0) as u32)
        })
        .unwrap_or((0, 0))
    }

    fn inner_position(&self) -> (i32, i32) {
        self.with(|w| w.get_pos()).unwrap_or((0, 0))
    }

    fn set_visible(&self, visible: bool) -> Result<()> {
        self.with(|w| if visible { w.show() } else { w.hide() })
    }

    fn set_fullscreen(&self, monitor: Option<&Monitor>) -> Result<()> {
        let mut glfw = self.glfw.clone();
        let mut window = self
            .window
            .try_borrow_mut()
            .map_err(|_| Error::invalid("GLFW window is busy"))?;
        match monitor {
            Some(target) => glfw.with_connected_monitors(|_, monitors| {
                let found = monitors.iter().find(|m| m.get_pos() == target.position);
                match found {
                    Some(m) => {
                        let (x, y) = target.position;
                        let (w, h) = target.size;
                        window.set_monitor(WindowMode::FullScreen(m), x, y, w, h, None);
                        Ok(())
                    }
                    None => Err(Error::invalid(format!("monitor {} is gone", target.name))),
                }
            }),
            None => {
                let (x, y) = window.get_pos();
                let (w, h) = window.get_size();
                window.set_monitor(
                    WindowMode::Windowed,
                    x,
                    y,
                    w.max(1) as u32,
                    h.max(1) as u32,
                    None,
                );
                Ok(())
            }
        }
    }

    fn set_fixed_size(&self, size: Option<(u32, u32)>) -> Result<()> {
        self.with(|w| match size {
            Some((width, height)) => {
                w.set_size_limits(Some(width), Some(height), Some(width), Some(height));
                w.set_size(width as i32, height as i32);
            }
            None => w.set_size_limits(None, None, None, None),
        })
    }

    fn drain_events(&self, out: &mut Vec<GameEvent>) {
        let mut close = false;
        for (_, event) in glfw::flush_messages(&self.events) {
            if matches!(event, WindowEvent::Close) {
                close = true;
            }
            out.extend(translate(event));
        }
        // Closing is the canvas's decision
        if close {
            let _ = self.with(|w| w.set_should_close(false));
        }
    }
}

/// Context of a GLFW window
pub struct GameContext {
    window: Rc<RefCell<glfw::PWindow>>,
}

impl GameContext {
    fn with<T>(&self, f: impl FnOnce(&mut glfw::PWindow) -> T) -> Result<T> {
        let mut window = self
            .window
            .try_borrow_mut()
            .map_err(|_| Error::invalid("GLFW window is busy"))?;
        Ok(f(&mut window))
    }
}

impl NativeContext for GameContext {
    fn make_current(&self) -> Result<()> {
        self.with(|w| w.make_current())
    }

    fn swap_buffers(&self) -> Result<()> {
        self.with(|w| w.swap_buffers())
    }

    fn release_current(&self) {
        let _ = self.with(|w| {
            if w.is_current() {
                glfw::make_context_current(None);
            }
        });
    }
}

impl Drop for GameContext {
    fn drop(&mut self) {
        self.release_current();
    }
}
