//! glcanvas - one GPU-drawable canvas over several windowing backends
//!
//! A canvas is a window with a GL context attached. The same contract is
//! implemented by a GTK toolkit backend, native X11/GLX and Win32/WGL
//! backends, and a GLFW game-toolkit backend, each of which translates its
//! native events into one canonical event vocabulary.
//!
//! # Architecture
//!
//! - **Backend contract**: `ApplicationBackend`, `CanvasBackend`,
//!   `TimerBackend`, with a static capability table per backend family
//! - **Context manager**: GL context ownership tokens and share groups
//! - **Canvas state machine**: lifecycle, client/window geometry, fullscreen
//! - **Event translation**: per-backend native event models
//! - **Event loop**: non-blocking sweeps plus calloop interval timers
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use glcanvas::{backend, event, CanvasConfig, CanvasEvent, CanvasId};
//!
//! let app = backend::open("headless")?;
//! let handler = Rc::new(|id: CanvasId, event: &CanvasEvent| {
//!     println!("{id}: {}", event.kind());
//! });
//! let canvas = app.create_canvas(CanvasConfig::default(), event::downgrade(&handler))?;
//! app.process_events()?;
//! canvas.close()?;
//! # Ok::<(), glcanvas::Error>(())
//! ```

pub mod app;
pub mod backend;
pub mod canvas;
pub mod capability;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod geometry;
pub mod input;

pub use app::Application;
pub use backend::{ApplicationBackend, CanvasBackend, TimerBackend};
pub use canvas::{Canvas, CanvasId, CanvasState};
pub use capability::{BackendFamily, Capabilities};
pub use config::{AppConfig, CanvasConfig, Fullscreen, GlConfig};
pub use context::{GlContext, RenderContext};
pub use error::{Error, Result};
pub use event::{CanvasEvent, EventHandler, Key, Modifiers, MouseButton, Region};
pub use geometry::{FrameExtents, Monitor};
