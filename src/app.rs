//! Application: canvas registry, timers and the cooperative loop
//!
//! One `Application` exists per backend instance. It owns the platform
//! driver, the registry of live canvases and the timer scheduler; canvases
//! hold a reference back to this shared state instead of reaching for
//! globals. Everything runs on the thread that created the application.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, info};

use crate::backend::{
    ApplicationBackend, CanvasBackend, Platform, Scheduler, Timer, TimerBackend, TimerCallback,
};
use crate::canvas::{Canvas, CanvasId, CanvasInner};
use crate::capability::{BackendFamily, Capabilities};
use crate::config::{CanvasConfig, LoopConfig};
use crate::error::{Error, Result};
use crate::event::EventHandler;

/// State shared between an application and its canvases
pub(crate) struct AppShared<P: Platform> {
    pub(crate) platform: P,
    canvases: RefCell<BTreeMap<CanvasId, Weak<CanvasInner<P>>>>,
    scheduler: Rc<Scheduler>,
    loop_config: LoopConfig,
    running: Cell<bool>,
}

impl<P: Platform> AppShared<P> {
    pub(crate) fn register(&self, canvas: &Rc<CanvasInner<P>>) {
        self.canvases
            .borrow_mut()
            .insert(canvas.id(), Rc::downgrade(canvas));
    }

    pub(crate) fn unregister(&self, id: CanvasId) {
        match self.canvases.try_borrow_mut() {
            Ok(mut canvases) => {
                canvases.remove(&id);
            }
            Err(_) => debug!("Registry busy, {} is pruned on the next sweep", id),
        }
    }

    pub(crate) fn has_open_canvas(&self) -> bool {
        self.canvases
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .any(|canvas| canvas.is_open())
    }

    /// Live canvases, oldest first
    fn live(&self) -> Vec<Rc<CanvasInner<P>>> {
        let mut canvases = self.canvases.borrow_mut();
        canvases.retain(|_, canvas| canvas.strong_count() > 0);
        canvases.values().filter_map(Weak::upgrade).collect()
    }

    /// One pass: toolkit pump, every canvas, then timers
    fn sweep(&self, timeout: Duration) -> Result<()> {
        self.platform.pump()?;
        for canvas in self.live() {
            canvas.sweep()?;
        }
        self.scheduler.tick(timeout)
    }
}

/// An application over one platform driver
pub struct Application<P: Platform> {
    shared: Rc<AppShared<P>>,
}

impl<P: Platform> Application<P> {
    /// Create an application with the default loop settings
    pub fn new(platform: P) -> Result<Self> {
        Self::with_config(platform, LoopConfig::default())
    }

    pub fn with_config(platform: P, loop_config: LoopConfig) -> Result<Self> {
        let scheduler = Scheduler::new()?;
        info!(
            "Initialized {} application ({} family)",
            platform.name(),
            platform.family()
        );
        Ok(Self {
            shared: Rc::new(AppShared {
                platform,
                canvases: RefCell::new(BTreeMap::new()),
                scheduler,
                loop_config,
                running: Cell::new(false),
            }),
        })
    }

    pub fn platform(&self) -> &P {
        &self.shared.platform
    }

    pub fn name(&self) -> &str {
        self.shared.platform.name()
    }

    pub fn family(&self) -> BackendFamily {
        self.shared.platform.family()
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.shared.platform.capabilities()
    }

    /// Create a canvas delivering its events to `handler`
    pub fn create_canvas(
        &self,
        config: CanvasConfig,
        handler: Weak<dyn EventHandler>,
    ) -> Result<Canvas<P>> {
        Canvas::new(&self.shared, config, handler)
    }

    /// Create a stopped timer driven by this application's loop
    pub fn create_timer(&self, callback: TimerCallback) -> Timer {
        self.shared.scheduler.create_timer(callback)
    }

    /// Live canvases, oldest first
    pub fn canvases(&self) -> Vec<Canvas<P>> {
        self.shared
            .live()
            .into_iter()
            .map(Canvas::from_inner)
            .collect()
    }

    pub fn has_open_canvas(&self) -> bool {
        self.shared.has_open_canvas()
    }

    /// One non-blocking sweep over every live canvas, then due timers
    pub fn process_events(&self) -> Result<()> {
        self.shared.sweep(Duration::ZERO)
    }

    /// Sweep until no open canvas remains, then quit
    pub fn run(&self) -> Result<()> {
        if self.shared.running.replace(true) {
            return Err(Error::invalid("event loop is already running"));
        }
        info!("Starting {} event loop", self.name());
        let result = self.run_loop();
        self.shared.running.set(false);
        self.quit();
        info!("{} event loop finished", self.name());
        result
    }

    fn run_loop(&self) -> Result<()> {
        let idle = self.shared.loop_config.idle_wait();
        while self.has_open_canvas() {
            self.shared.sweep(idle)?;
        }
        Ok(())
    }

    /// Close every open canvas and stop every timer; idempotent
    pub fn quit(&self) {
        let canvases = self.shared.live();
        if !canvases.is_empty() {
            info!("Closing {} open canvas(es)", canvases.len());
        }
        for canvas in &canvases {
            canvas.close();
        }
        drop(canvases);
        self.shared.scheduler.shutdown();
    }
}

impl<P: Platform> ApplicationBackend for Application<P> {
    fn name(&self) -> &str {
        Application::name(self)
    }

    fn family(&self) -> BackendFamily {
        Application::family(self)
    }

    fn capabilities(&self) -> &'static Capabilities {
        Application::capabilities(self)
    }

    fn process_events(&self) -> Result<()> {
        Application::process_events(self)
    }

    fn run(&self) -> Result<()> {
        Application::run(self)
    }

    fn quit(&self) {
        Application::quit(self)
    }

    fn create_canvas(
        &self,
        config: CanvasConfig,
        handler: Weak<dyn EventHandler>,
    ) -> Result<Box<dyn CanvasBackend>> {
        let canvas = Application::create_canvas(self, config, handler)?;
        Ok(Box::new(canvas))
    }

    fn create_timer(&self, callback: TimerCallback) -> Box<dyn TimerBackend> {
        Box::new(Application::create_timer(self, callback))
    }

    fn native_handle(&self) -> &dyn Any {
        self.shared.platform.native_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessPlatform;
    use crate::backend::xorg::input::XorgModel;
    use crate::event::{downgrade, no_handler, CanvasEvent};
    use std::time::Instant;

    fn app() -> Application<HeadlessPlatform<XorgModel>> {
        Application::new(HeadlessPlatform::new()).unwrap()
    }

    #[test]
    fn test_registry_tracks_live_canvases() {
        let app = app();
        let a = app.create_canvas(CanvasConfig::default(), no_handler()).unwrap();
        let b = app.create_canvas(CanvasConfig::default(), no_handler()).unwrap();
        assert_eq!(app.canvases().len(), 2);
        a.close().unwrap();
        assert_eq!(app.canvases().len(), 1);
        drop(b);
        assert!(!app.has_open_canvas());
    }

    #[test]
    fn test_closed_canvas_left_in_busy_registry_is_not_open() {
        let app = app();
        let canvas = app.create_canvas(CanvasConfig::default(), no_handler()).unwrap();
        {
            // Close while the registry is borrowed, so the entry stays behind
            let _registry = app.shared.canvases.borrow();
            canvas.close().unwrap();
        }
        assert_eq!(app.shared.canvases.borrow().len(), 1);
        assert!(!app.has_open_canvas());
        app.run().unwrap();
        assert!(canvas.is_closed());
    }

    #[test]
    fn test_failed_construction_is_not_registered() {
        let app = app();
        let config = CanvasConfig {
            size: (0, 10),
            ..CanvasConfig::default()
        };
        assert!(app.create_canvas(config, no_handler()).is_err());
        assert!(app.canvases().is_empty());
    }

    #[test]
    fn test_quit_closes_canvases_and_timers() {
        let app = app();
        let closes = Rc::new(Cell::new(0));
        let handler = {
            let closes = closes.clone();
            Rc::new(move |_: CanvasId, event: &CanvasEvent| {
                if *event == CanvasEvent::Close {
                    closes.set(closes.get() + 1);
                }
            })
        };
        let canvas = app
            .create_canvas(CanvasConfig::default(), downgrade(&handler))
            .unwrap();
        let timer = app.create_timer(Box::new(|| -> anyhow::Result<()> { Ok(()) }));
        timer.start(Duration::from_millis(5)).unwrap();

        app.quit();
        app.quit();
        assert!(canvas.is_closed());
        assert!(!timer.is_running());
        assert!(timer.start(Duration::from_millis(5)).is_err());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_run_returns_once_canvases_close() {
        let app = app();
        let canvas = app.create_canvas(CanvasConfig::default(), no_handler()).unwrap();
        let weak = canvas.downgrade();
        let ticks = Rc::new(Cell::new(0u32));
        let timer = {
            let ticks = ticks.clone();
            app.create_timer(Box::new(move || -> anyhow::Result<()> {
                ticks.set(ticks.get() + 1);
                if ticks.get() == 3 {
                    if let Some(canvas) = weak.upgrade() {
                        canvas.close()?;
                    }
                }
                Ok(())
            }))
        };
        timer.start(Duration::from_millis(2)).unwrap();

        let started = Instant::now();
        app.run().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(ticks.get(), 3);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_run_without_canvases_returns_immediately() {
        let app = app();
        app.run().unwrap();
    }

    #[test]
    fn test_native_handle_is_the_platform() {
        let app = app();
        let backend: &dyn ApplicationBackend = &app;
        assert!(backend
            .native_handle()
            .downcast_ref::<HeadlessPlatform<XorgModel>>()
            .is_some());
    }
}
