//! WGL pixel formats and contexts

use std::mem;

use log::{debug, warn};
use windows::core::PCSTR;
use windows::Win32::Foundation::{BOOL, HWND};
use windows::Win32::Graphics::Gdi::{GetDC, ReleaseDC, HDC};
use windows::Win32::Graphics::OpenGL::{
    ChoosePixelFormat, SetPixelFormat, SwapBuffers, wglCreateContext, wglDeleteContext,
    wglGetCurrentContext, wglGetProcAddress, wglMakeCurrent, wglShareLists, HGLRC,
    PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW, PFD_STEREO, PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA,
    PIXELFORMATDESCRIPTOR,
};

use crate::backend::{NativeContext, SurfaceRequest};
use crate::config::GlConfig;
use crate::error::{Error, Result};

const WGL_CONTEXT_MAJOR_VERSION_ARB: i32 = 0x2091;
const WGL_CONTEXT_MINOR_VERSION_ARB: i32 = 0x2092;

type CreateContextAttribs = unsafe extern "system" fn(HDC, HGLRC, *const i32) -> HGLRC;
type SwapIntervalExt = unsafe extern "system" fn(i32) -> BOOL;

fn pixel_format(gl: &GlConfig) -> PIXELFORMATDESCRIPTOR {
    let mut flags = PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL;
    if gl.double_buffer {
        flags = flags | PFD_DOUBLEBUFFER;
    }
    if gl.stereo {
        flags = flags | PFD_STEREO;
    }
    PIXELFORMATDESCRIPTOR {
        nSize: mem::size_of::<PIXELFORMATDESCRIPTOR>() as u16,
        nVersion: 1,
        dwFlags: flags,
        iPixelType: PFD_TYPE_RGBA,
        cColorBits: gl.red_size.saturating_add(gl.green_size).saturating_add(gl.blue_size),
        cRedBits: gl.red_size,
        cGreenBits: gl.green_size,
        cBlueBits: gl.blue_size,
        cAlphaBits: gl.alpha_size,
        cAccumBits: [gl.accum_green_size, gl.accum_blue_size, gl.accum_alpha_size]
            .into_iter()
            .fold(gl.accum_red_size, u8::saturating_add),
        cAccumRedBits: gl.accum_red_size,
        cAccumGreenBits: gl.accum_green_size,
        cAccumBlueBits: gl.accum_blue_size,
        cAccumAlphaBits: gl.accum_alpha_size,
        cDepthBits: gl.depth_size,
        cStencilBits: gl.stencil_size,
        cAuxBuffers: gl.aux_buffers,
        ..Default::default()
    }
}

/// Look up a WGL extension entry point; a context must be current
///
/// `T` must be the function pointer type of the named symbol.
unsafe fn load<T: Copy>(name: &[u8]) -> Option<T> {
    let f = wglGetProcAddress(PCSTR(name.as_ptr()))?;
    Some(mem::transmute_copy(&f))
}

/// WGL context on a window's own device context
pub struct WglContext {
    hwnd: HWND,
    hdc: HDC,
    context: HGLRC,
}

impl WglContext {
    pub(super) fn create(
        hwnd: HWND,
        request: &SurfaceRequest<'_>,
        share: Option<&WglContext>,
    ) -> Result<Self> {
        let failed = |what: &str, e: windows::core::Error| {
            Error::ContextCreationFailed(format!("{what}: {e}"))
        };
        let hdc = unsafe { GetDC(hwnd) };
        if hdc.is_invalid() {
            return Err(Error::ContextCreationFailed(
                "window has no device context".to_string(),
            ));
        }
        // From here on Drop releases the DC and deletes the context
        let mut context = WglContext {
            hwnd,
            hdc,
            context: HGLRC::default(),
        };

        let pfd = pixel_format(request.gl);
        let format = unsafe { ChoosePixelFormat(hdc, &pfd) };
        if format == 0 {
            return Err(Error::ContextCreationFailed(format!(
                "no pixel format matches {:?}",
                request.gl
            )));
        }
        unsafe { SetPixelFormat(hdc, format, &pfd) }.map_err(|e| failed("SetPixelFormat", e))?;

        context.context =
            unsafe { wglCreateContext(hdc) }.map_err(|e| failed("wglCreateContext", e))?;

        let version = request.gl.version();
        if version > (2, 1) {
            context.upgrade(version, share)?;
        } else if let Some(share) = share {
            unsafe { wglShareLists(share.context, context.context) }
                .map_err(|e| failed("wglShareLists", e))?;
        }

        if request.vsync {
            context.make_current()?;
            match unsafe { load::<SwapIntervalExt>(b"wglSwapIntervalEXT\0") } {
                Some(swap_interval) => {
                    unsafe { swap_interval(1) };
                }
                None => warn!("wglSwapIntervalEXT unavailable, vsync not applied"),
            }
        }
        debug!("Created WGL context (shared: {})", share.is_some());
        Ok(context)
    }

    /// Replace the legacy context with a versioned one
    fn upgrade(&mut self, (major, minor): (u8, u8), share: Option<&WglContext>) -> Result<()> {
        self.make_current()?;
        let create = unsafe { load::<CreateContextAttribs>(b"wglCreateContextAttribsARB\0") }
            .ok_or_else(|| {
                Error::ContextCreationFailed("wglCreateContextAttribsARB unavailable".to_string())
            })?;
        let attrs = [
            WGL_CONTEXT_MAJOR_VERSION_ARB,
            major as i32,
            WGL_CONTEXT_MINOR_VERSION_ARB,
            minor as i32,
            0,
        ];
        let share_context = share.map_or(HGLRC::default(), |s| s.context);
        let versioned = unsafe { create(self.hdc, share_context, attrs.as_ptr()) };
        if versioned.is_invalid() {
            return Err(Error::ContextCreationFailed(format!(
                "WGL refused a {major}.{minor} context"
            )));
        }
        self.release_current();
        let legacy = mem::replace(&mut self.context, versioned);
        if let Err(e) = unsafe { wglDeleteContext(legacy) } {
            warn!("wglDeleteContext failed: {}", e);
        }
        Ok(())
    }

    pub fn raw(&self) -> HGLRC {
        self.context
    }
}

impl NativeContext for WglContext {
    fn make_current(&self) -> Result<()> {
        unsafe { wglMakeCurrent(self.hdc, self.context) }
            .map_err(|e| Error::Native(format!("wglMakeCurrent failed: {e}")))
    }

    fn swap_buffers(&self) -> Result<()> {
        unsafe { SwapBuffers(self.hdc) }.map_err(|e| Error::Native(e.to_string()))
    }

    fn release_current(&self) {
        unsafe {
            if !self.context.is_invalid() && wglGetCurrentContext() == self.context {
                let _ = wglMakeCurrent(HDC::default(), HGLRC::default());
            }
        }
    }
}

impl Drop for WglContext {
    fn drop(&mut self) {
        self.release_current();
        unsafe {
            if !self.context.is_invalid() {
                if let Err(e) = wglDeleteContext(self.context) {
                    warn!("wglDeleteContext failed: {}", e);
                }
            }
            ReleaseDC(self.hwnd, self.hdc);
        }
        debug!("Destroyed WGL context");
    }
}
