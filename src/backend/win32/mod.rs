//! Native Win32 backend
//!
//! The message model is always compiled; the driver (window procedure,
//! WGL contexts) only on Windows targets.

pub mod input;

#[cfg(target_os = "windows")]
mod context;
#[cfg(target_os = "windows")]
mod window;

pub use input::{Win32Message, Win32Model};

#[cfg(target_os = "windows")]
pub use context::WglContext;
#[cfg(target_os = "windows")]
pub use window::{Win32Platform, Win32Window};

use crate::config::GlField;

/// Legacy pixel formats cannot request multisampling
pub const IGNORED_GL_FIELDS: &[GlField] = &[GlField::Samples];

/// Register the window class for this process
#[cfg(target_os = "windows")]
pub fn open(
    loop_config: crate::config::LoopConfig,
) -> crate::error::Result<crate::app::Application<Win32Platform>> {
    crate::app::Application::with_config(Win32Platform::register()?, loop_config)
}
