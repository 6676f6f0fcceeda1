//! Game-toolkit backend
//!
//! One GLFW window per application; GLFW owns the context and the event
//! queue. The event model is always compiled; the driver needs the `glfw`
//! feature.

pub mod input;

#[cfg(feature = "glfw")]
mod window;

pub use input::{GameEvent, GameModel};

#[cfg(feature = "glfw")]
pub use window::{GameContext, GamePlatform, GameWindow};

/// Initialize GLFW
#[cfg(feature = "glfw")]
pub fn open(
    loop_config: crate::config::LoopConfig,
) -> crate::error::Result<crate::app::Application<GamePlatform>> {
    crate::app::Application::with_config(GamePlatform::init()?, loop_config)
}
