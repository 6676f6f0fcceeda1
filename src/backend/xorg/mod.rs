//! Native X11 backend
//!
//! Xlib and GLX are loaded at run time through `x11-dl`, so the binary has
//! no link-time dependency on them. The event model is always compiled;
//! the driver needs the `x11` feature on Linux.

pub mod input;
pub mod placement;

#[cfg(all(feature = "x11", target_os = "linux"))]
mod context;
#[cfg(all(feature = "x11", target_os = "linux"))]
mod window;

pub use input::{XorgEvent, XorgModel};

#[cfg(all(feature = "x11", target_os = "linux"))]
pub use context::GlxContext;
#[cfg(all(feature = "x11", target_os = "linux"))]
pub use window::{XorgPlatform, XorgWindow};

/// Connect to the X server named by `DISPLAY`
#[cfg(all(feature = "x11", target_os = "linux"))]
pub fn open(
    loop_config: crate::config::LoopConfig,
) -> crate::error::Result<crate::app::Application<XorgPlatform>> {
    crate::app::Application::with_config(XorgPlatform::connect()?, loop_config)
}
