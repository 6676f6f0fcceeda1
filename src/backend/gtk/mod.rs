//! GTK toolkit backend
//!
//! Each canvas is a top-level `gtk::Window` holding a `gtk::GLArea`. The
//! event model is always compiled; the driver needs the `gtk` feature.

pub mod input;
pub mod present;

#[cfg(feature = "gtk")]
mod window;

pub use input::{GtkEvent, GtkModel};

#[cfg(feature = "gtk")]
pub use window::{GtkContext, GtkPlatform, GtkWindow};

use crate::config::GlField;

/// The GL area only lets callers pick depth, stencil, alpha and version
pub const IGNORED_GL_FIELDS: &[GlField] = &[
    GlField::DoubleBuffer,
    GlField::Stereo,
    GlField::Samples,
    GlField::ColorSizes,
    GlField::AccumSizes,
    GlField::AuxBuffers,
    GlField::Vsync,
];

/// Initialize GTK on the calling thread
#[cfg(feature = "gtk")]
pub fn open(
    loop_config: crate::config::LoopConfig,
) -> crate::error::Result<crate::app::Application<GtkPlatform>> {
    crate::app::Application::with_config(GtkPlatform::init()?, loop_config)
}
