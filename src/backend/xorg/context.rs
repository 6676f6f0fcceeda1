//! GLX framebuffer configs and contexts

use std::mem;
use std::os::raw::{c_int, c_uchar};
use std::ptr;
use std::rc::Rc;

use log::{debug, warn};
use x11_dl::{glx, xlib};

use super::window::XDisplay;
use crate::backend::{NativeContext, SurfaceRequest};
use crate::config::GlConfig;
use crate::error::{Error, Result};

const GLX_CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
const GLX_CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;

type CreateContextAttribs = unsafe extern "C" fn(
    *mut xlib::Display,
    glx::GLXFBConfig,
    glx::GLXContext,
    xlib::Bool,
    *const c_int,
) -> glx::GLXContext;

type SwapIntervalExt = unsafe extern "C" fn(*mut xlib::Display, glx::GLXDrawable, c_int);

/// Attribute list for `glXChooseFBConfig`
fn fb_attributes(gl: &GlConfig) -> Vec<c_int> {
    let mut attrs = vec![
        glx::GLX_X_RENDERABLE,
        1,
        glx::GLX_DRAWABLE_TYPE,
        glx::GLX_WINDOW_BIT,
        glx::GLX_RENDER_TYPE,
        glx::GLX_RGBA_BIT,
        glx::GLX_DOUBLEBUFFER,
        gl.double_buffer as c_int,
        glx::GLX_STEREO,
        gl.stereo as c_int,
        glx::GLX_RED_SIZE,
        gl.red_size as c_int,
        glx::GLX_GREEN_SIZE,
        gl.green_size as c_int,
        glx::GLX_BLUE_SIZE,
        gl.blue_size as c_int,
        glx::GLX_ALPHA_SIZE,
        gl.alpha_size as c_int,
        glx::GLX_DEPTH_SIZE,
        gl.depth_size as c_int,
        glx::GLX_STENCIL_SIZE,
        gl.stencil_size as c_int,
        glx::GLX_ACCUM_RED_SIZE,
        gl.accum_red_size as c_int,
        glx::GLX_ACCUM_GREEN_SIZE,
        gl.accum_green_size as c_int,
        glx::GLX_ACCUM_BLUE_SIZE,
        gl.accum_blue_size as c_int,
        glx::GLX_ACCUM_ALPHA_SIZE,
        gl.accum_alpha_size as c_int,
        glx::GLX_AUX_BUFFERS,
        gl.aux_buffers as c_int,
    ];
    if gl.samples > 0 {
        attrs.extend([
            glx::GLX_SAMPLE_BUFFERS,
            1,
            glx::GLX_SAMPLES,
            gl.samples as c_int,
        ]);
    }
    attrs.push(0);
    attrs
}

/// A chosen framebuffer config and its visual
pub(super) struct FbConfig {
    display: Rc<XDisplay>,
    configs: *mut glx::GLXFBConfig,
    visual: *mut xlib::XVisualInfo,
}

impl FbConfig {
    pub(super) fn choose(display: &Rc<XDisplay>, gl: &GlConfig) -> Result<Self> {
        let attrs = fb_attributes(gl);
        let mut count = 0;
        let configs = unsafe {
            (display.glx.glXChooseFBConfig)(display.display, display.screen, attrs.as_ptr(), &mut count)
        };
        if configs.is_null() || count == 0 {
            return Err(Error::ContextCreationFailed(format!(
                "no GLX framebuffer config matches {:?}",
                gl
            )));
        }
        let visual = unsafe { (display.glx.glXGetVisualFromFBConfig)(display.display, *configs) };
        let config = FbConfig {
            display: display.clone(),
            configs,
            visual,
        };
        if visual.is_null() {
            return Err(Error::ContextCreationFailed(
                "GLX config has no X visual".to_string(),
            ));
        }
        debug!("Chose GLX config out of {} candidate(s)", count);
        Ok(config)
    }

    fn config(&self) -> glx::GLXFBConfig {
        unsafe { *self.configs }
    }

    pub(super) fn visual(&self) -> *mut xlib::XVisualInfo {
        self.visual
    }
}

impl Drop for FbConfig {
    fn drop(&mut self) {
        unsafe {
            if !self.visual.is_null() {
                (self.display.xlib.XFree)(self.visual.cast());
            }
            (self.display.xlib.XFree)(self.configs.cast());
        }
    }
}

/// GLX context bound to one window
pub struct GlxContext {
    display: Rc<XDisplay>,
    context: glx::GLXContext,
    drawable: glx::GLXDrawable,
}

impl GlxContext {
    pub(super) fn create(
        display: &Rc<XDisplay>,
        config: &FbConfig,
        window: xlib::Window,
        request: &SurfaceRequest<'_>,
        share: Option<&GlxContext>,
    ) -> Result<Self> {
        let share_context = share.map_or(ptr::null_mut(), |s| s.context);
        let version = request.gl.version();
        let context = unsafe {
            if version > (2, 1) {
                let create: CreateContextAttribs = load(display, b"glXCreateContextAttribsARB\0")
                    .ok_or_else(|| {
                        Error::ContextCreationFailed(
                            "glXCreateContextAttribsARB unavailable".to_string(),
                        )
                    })?;
                let attrs = [
                    GLX_CONTEXT_MAJOR_VERSION_ARB,
                    version.0 as c_int,
                    GLX_CONTEXT_MINOR_VERSION_ARB,
                    version.1 as c_int,
                    0,
                ];
                create(display.display, config.config(), share_context, xlib::True, attrs.as_ptr())
            } else {
                (display.glx.glXCreateNewContext)(
                    display.display,
                    config.config(),
                    glx::GLX_RGBA_TYPE,
                    share_context,
                    xlib::True,
                )
            }
        };
        if context.is_null() {
            return Err(Error::ContextCreationFailed(format!(
                "GLX refused a {}.{} context",
                version.0, version.1
            )));
        }
        let context = GlxContext {
            display: display.clone(),
            context,
            drawable: window,
        };

        if request.vsync {
            match unsafe { load::<SwapIntervalExt>(display, b"glXSwapIntervalEXT\0") } {
                Some(swap_interval) => unsafe { swap_interval(display.display, window, 1) },
                None => warn!("glXSwapIntervalEXT unavailable, vsync not applied"),
            }
        }
        debug!("Created GLX context (shared: {})", share.is_some());
        Ok(context)
    }

    pub fn raw(&self) -> glx::GLXContext {
        self.context
    }
}

/// Look up a GLX extension entry point
///
/// `T` must be the function pointer type of the named symbol.
unsafe fn load<T: Copy>(display: &XDisplay, name: &[u8]) -> Option<T> {
    let f = (display.glx.glXGetProcAddress)(name.as_ptr() as *const c_uchar)?;
    Some(mem::transmute_copy(&f))
}

impl NativeContext for GlxContext {
    fn make_current(&self) -> Result<()> {
        let ok = unsafe {
            (self.display.glx.glXMakeCurrent)(self.display.display, self.drawable, self.context)
        };
        if ok == xlib::False {
            return Err(Error::Native("glXMakeCurrent failed".to_string()));
        }
        Ok(())
    }

    fn swap_buffers(&self) -> Result<()> {
        unsafe { (self.display.glx.glXSwapBuffers)(self.display.display, self.drawable) };
        Ok(())
    }

    fn release_current(&self) {
        unsafe {
            if (self.display.glx.glXGetCurrentContext)() == self.context {
                (self.display.glx.glXMakeCurrent)(self.display.display, 0, ptr::null_mut());
            }
        }
    }
}

impl Drop for GlxContext {
    fn drop(&mut self) {
        self.release_current();
        unsafe { (self.display.glx.glXDestroyContext)(self.display.display, self.context) };
        debug!("Destroyed GLX context");
    }
}
