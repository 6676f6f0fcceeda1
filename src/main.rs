//! glcanvas demo
//!
//! Opens the configured backend, creates one canvas and repaints it from a
//! timer until the window is closed, Escape is pressed, or the configured
//! frame limit is reached.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, trace, warn};

use glcanvas::{backend, event, AppConfig, CanvasBackend, CanvasEvent, CanvasId, EventHandler, Key};

/// Event handler driving the demo canvas
struct Demo {
    canvas: RefCell<Option<Weak<dyn CanvasBackend>>>,
    frames: Cell<u64>,
    max_frames: Option<u64>,
}

impl Demo {
    fn canvas(&self) -> Option<Rc<dyn CanvasBackend>> {
        self.canvas.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn close(&self) {
        if let Some(canvas) = self.canvas() {
            if let Err(e) = canvas.close() {
                warn!("Failed to close canvas: {}", e);
            }
        }
    }

    fn paint(&self) {
        let Some(canvas) = self.canvas() else {
            return;
        };
        if let Err(e) = canvas.swap_buffers() {
            warn!("Swap failed: {}", e);
            return;
        }
        let frames = self.frames.get() + 1;
        self.frames.set(frames);
        trace!("Frame {}", frames);
        if self.max_frames.is_some_and(|max| frames >= max) {
            info!("Reached {} frames", frames);
            self.close();
        }
    }
}

impl EventHandler for Demo {
    fn on_event(&self, id: CanvasId, event: &CanvasEvent) {
        match event {
            CanvasEvent::Initialize => info!("{} initialized", id),
            CanvasEvent::Resize { size } => debug!("{} resized to {}x{}", id, size.0, size.1),
            CanvasEvent::Paint { .. } => self.paint(),
            CanvasEvent::KeyPress {
                key: Some(Key::Escape),
                ..
            } => self.close(),
            CanvasEvent::Close => info!("{} closed after {} frames", id, self.frames.get()),
            other => trace!("{}: {:?}", id, other),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => AppConfig::default(),
    };

    let filter = config.log.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    info!("Starting glcanvas demo on '{}'", config.backend);
    let app = backend::open_with(&config.backend, config.event_loop.clone())?;
    info!(
        "Capabilities: {}",
        app.capabilities().supported().join(", ")
    );

    let demo = Rc::new(Demo {
        canvas: RefCell::new(None),
        frames: Cell::new(0),
        max_frames: config.demo.max_frames,
    });
    let canvas: Rc<dyn CanvasBackend> =
        Rc::from(app.create_canvas(config.canvas.clone(), event::downgrade(&demo))?);
    *demo.canvas.borrow_mut() = Some(Rc::downgrade(&canvas));

    let weak = Rc::downgrade(&canvas);
    let timer = app.create_timer(Box::new(move || {
        if let Some(canvas) = weak.upgrade() {
            canvas.update()?;
        }
        Ok(())
    }));
    timer.start(Duration::from_millis(config.demo.interval_ms))?;

    app.run()?;
    info!("Demo finished");
    Ok(())
}
