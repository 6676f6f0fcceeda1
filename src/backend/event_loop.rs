//! Timer scheduling on calloop
//!
//! Every application owns one calloop event loop that carries nothing but
//! timer sources. A sweep dispatches it; sources that expire push their id
//! and arm generation into the dispatch data and reschedule themselves at
//! `deadline + interval`. User callbacks run after dispatch returns, so they
//! are free to start and stop timers, including their own; an expiry whose
//! timer was re-armed or stopped in the meantime is dropped.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use calloop::timer::{TimeoutAction, Timer as TimerSource};
use calloop::{EventLoop as CalLoop, LoopHandle, RegistrationToken};
use log::{debug, error, warn};

use crate::backend::{TimerBackend, TimerCallback};
use crate::error::{Error, Result};

/// Unique identifier for timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl TimerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TimerId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Expired timer and the arm generation it expired under
type Expiry = (TimerId, u64);

struct TimerEntry {
    id: TimerId,
    callback: RefCell<TimerCallback>,
    interval: Cell<Duration>,
    /// `None` means never
    next_fire: Cell<Option<Instant>>,
    token: RefCell<Option<RegistrationToken>>,
    /// Bumped on every start and stop
    generation: Cell<u64>,
    registered: Cell<bool>,
}

impl TimerEntry {
    fn is_running(&self) -> bool {
        self.token.borrow().is_some()
    }

    fn bump(&self) -> u64 {
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        generation
    }
}

/// Timer registry and the calloop loop driving it
pub struct Scheduler {
    /// Calloop event loop; dispatch data collects expired timers
    event_loop: RefCell<CalLoop<'static, Vec<Expiry>>>,
    handle: LoopHandle<'static, Vec<Expiry>>,
    timers: RefCell<BTreeMap<TimerId, Rc<TimerEntry>>>,
    ticking: Cell<bool>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Result<Rc<Self>> {
        let event_loop = CalLoop::try_new().map_err(|e| Error::Native(e.to_string()))?;
        let handle = event_loop.handle();
        Ok(Rc::new(Self {
            event_loop: RefCell::new(event_loop),
            handle,
            timers: RefCell::new(BTreeMap::new()),
            ticking: Cell::new(false),
        }))
    }

    /// Register a callback; the timer starts stopped
    pub fn create_timer(self: &Rc<Self>, callback: TimerCallback) -> Timer {
        let entry = Rc::new(TimerEntry {
            id: TimerId::new(),
            callback: RefCell::new(callback),
            interval: Cell::new(Duration::ZERO),
            next_fire: Cell::new(None),
            token: RefCell::new(None),
            generation: Cell::new(0),
            registered: Cell::new(true),
        });
        self.timers.borrow_mut().insert(entry.id, entry.clone());
        debug!("Registered {}", entry.id);
        Timer {
            entry,
            scheduler: Rc::downgrade(self),
        }
    }

    /// Number of registered timers
    pub fn len(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers
            .borrow()
            .values()
            .filter_map(|t| t.next_fire.get())
            .min()
    }

    /// Dispatch the loop for at most `timeout`, then run due callbacks
    ///
    /// A failing callback is logged and the remaining ones still run.
    pub fn tick(&self, timeout: Duration) -> Result<()> {
        if self.ticking.get() {
            warn!("Nested timer tick ignored");
            return Ok(());
        }

        let mut expired = Vec::new();
        {
            let mut event_loop = self
                .event_loop
                .try_borrow_mut()
                .map_err(|_| Error::invalid("timer loop is already dispatching"))?;
            event_loop
                .dispatch(Some(timeout), &mut expired)
                .map_err(|e| Error::Native(e.to_string()))?;
        }

        self.ticking.set(true);
        for (id, generation) in expired {
            let entry = self.timers.borrow().get(&id).cloned();
            let Some(entry) = entry else { continue };
            // Stopped or re-armed by an earlier callback in this sweep
            if !entry.is_running() || entry.generation.get() != generation {
                continue;
            }
            let result = match entry.callback.try_borrow_mut() {
                Ok(mut callback) => (&mut **callback)(),
                Err(_) => {
                    error!("{} callback re-entered", id);
                    continue;
                }
            };
            if let Err(e) = result {
                error!("{} callback failed: {:#}", id, e);
            }
        }
        self.ticking.set(false);
        Ok(())
    }

    /// Stop and unregister every timer
    pub fn shutdown(&self) {
        let timers = std::mem::take(&mut *self.timers.borrow_mut());
        for entry in timers.values() {
            self.disarm(entry);
            entry.registered.set(false);
        }
        if !timers.is_empty() {
            debug!("Unregistered {} timer(s)", timers.len());
        }
    }

    fn arm(&self, entry: &Rc<TimerEntry>, interval: Duration) -> Result<()> {
        self.disarm(entry);

        let first = Instant::now() + interval;
        let id = entry.id;
        let generation = entry.bump();
        let weak = Rc::downgrade(entry);
        let token = self
            .handle
            .insert_source(
                TimerSource::from_deadline(first),
                move |deadline, _, expired: &mut Vec<Expiry>| {
                    expired.push((id, generation));
                    let next = deadline + interval;
                    if let Some(entry) = weak.upgrade() {
                        entry.next_fire.set(Some(next));
                    }
                    TimeoutAction::ToInstant(next)
                },
            )
            .map_err(|e| Error::Native(e.error.to_string()))?;

        entry.interval.set(interval);
        entry.next_fire.set(Some(first));
        *entry.token.borrow_mut() = Some(token);
        debug!("Started {} every {:?}", id, interval);
        Ok(())
    }

    fn disarm(&self, entry: &TimerEntry) {
        entry.bump();
        let token = entry.token.borrow_mut().take();
        if let Some(token) = token {
            self.handle.remove(token);
            debug!("Stopped {}", entry.id);
        }
        entry.next_fire.set(None);
    }

    fn unregister(&self, id: TimerId) {
        if let Some(entry) = self.timers.borrow_mut().remove(&id) {
            entry.registered.set(false);
        }
    }
}

/// Handle to one registered timer
///
/// Dropping the handle stops and unregisters the timer.
pub struct Timer {
    entry: Rc<TimerEntry>,
    scheduler: Weak<Scheduler>,
}

impl Timer {
    pub fn id(&self) -> TimerId {
        self.entry.id
    }

    /// Arm the timer; the first firing is `interval` from now
    pub fn start(&self, interval: Duration) -> Result<()> {
        let scheduler = self
            .scheduler
            .upgrade()
            .filter(|_| self.entry.registered.get())
            .ok_or_else(|| Error::invalid(format!("{} is no longer registered", self.entry.id)))?;
        scheduler.arm(&self.entry, interval)
    }

    /// Disarm the timer; no further firings happen
    pub fn stop(&self) {
        match self.scheduler.upgrade() {
            Some(scheduler) => scheduler.disarm(&self.entry),
            None => self.entry.next_fire.set(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.entry.is_running()
    }

    pub fn interval(&self) -> Duration {
        self.entry.interval.get()
    }

    /// Next scheduled firing; `None` when stopped
    pub fn next_fire(&self) -> Option<Instant> {
        self.entry.next_fire.get()
    }
}

impl TimerBackend for Timer {
    fn start(&self, interval: Duration) -> Result<()> {
        Timer::start(self, interval)
    }

    fn stop(&self) {
        Timer::stop(self)
    }

    fn is_running(&self) -> bool {
        Timer::is_running(self)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.disarm(&self.entry);
            scheduler.unregister(self.entry.id);
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.entry.id)
            .field("interval", &self.entry.interval.get())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, TimerCallback) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (
            count,
            Box::new(move || {
                c.set(c.get() + 1);
                Ok(())
            }),
        )
    }

    #[test]
    fn test_scheduler_new() {
        let scheduler = Scheduler::new().unwrap();
        assert!(scheduler.is_empty());
        assert!(scheduler.tick(Duration::ZERO).is_ok());
    }

    #[test]
    fn test_timer_fires_and_stops() {
        let scheduler = Scheduler::new().unwrap();
        let (count, callback) = counter();
        let timer = scheduler.create_timer(callback);
        assert!(!timer.is_running());
        assert_eq!(timer.next_fire(), None);

        timer.start(Duration::from_millis(5)).unwrap();
        assert!(timer.is_running());
        assert!(timer.next_fire().is_some());

        let until = Instant::now() + Duration::from_millis(60);
        while count.get() == 0 && Instant::now() < until {
            scheduler.tick(Duration::from_millis(5)).unwrap();
        }
        assert!(count.get() >= 1);

        timer.stop();
        assert_eq!(timer.next_fire(), None);
        let fired = count.get();
        for _ in 0..5 {
            scheduler.tick(Duration::from_millis(5)).unwrap();
        }
        assert_eq!(count.get(), fired);
    }

    #[test]
    fn test_failing_callback_does_not_stop_others() {
        let scheduler = Scheduler::new().unwrap();
        let failing = scheduler.create_timer(Box::new(|| -> anyhow::Result<()> { anyhow::bail!("boom") }));
        let (count, callback) = counter();
        let healthy = scheduler.create_timer(callback);
        failing.start(Duration::ZERO).unwrap();
        healthy.start(Duration::ZERO).unwrap();

        for _ in 0..3 {
            scheduler.tick(Duration::from_millis(1)).unwrap();
        }
        assert!(count.get() >= 1);
        assert!(failing.is_running());
    }

    #[test]
    fn test_rearm_drops_pending_expiry() {
        // Both timers are due in the same sweep and each pushes the other a
        // minute out, so whichever runs first must suppress the other
        let scheduler = Scheduler::new().unwrap();
        let fired = Rc::new(Cell::new(0u32));
        let slots: [Rc<RefCell<Option<Rc<Timer>>>>; 2] = Default::default();
        let timers: Vec<Rc<Timer>> = (0..2)
            .map(|i| {
                let other = slots[1 - i].clone();
                let fired = fired.clone();
                Rc::new(scheduler.create_timer(Box::new(move || {
                    fired.set(fired.get() + 1);
                    if let Some(other) = other.borrow().as_ref() {
                        other.start(Duration::from_secs(60))?;
                    }
                    Ok(())
                })))
            })
            .collect();
        for (slot, timer) in slots.iter().zip(&timers) {
            *slot.borrow_mut() = Some(timer.clone());
        }

        timers[0].start(Duration::from_millis(1)).unwrap();
        timers[1].start(Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        scheduler.tick(Duration::ZERO).unwrap();

        assert_eq!(fired.get(), 1);
        let later = Instant::now() + Duration::from_secs(59);
        assert!(timers.iter().any(|t| t.next_fire().is_some_and(|n| n > later)));
        for slot in &slots {
            slot.borrow_mut().take();
        }
    }

    #[test]
    fn test_stop_then_start_in_same_sweep() {
        let scheduler = Scheduler::new().unwrap();
        let (count, callback) = counter();
        let timer = scheduler.create_timer(callback);
        timer.start(Duration::ZERO).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        timer.stop();
        timer.start(Duration::from_secs(60)).unwrap();
        scheduler.tick(Duration::ZERO).unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_shutdown_unregisters() {
        let scheduler = Scheduler::new().unwrap();
        let (_, callback) = counter();
        let timer = scheduler.create_timer(callback);
        timer.start(Duration::from_millis(1)).unwrap();
        assert_eq!(scheduler.len(), 1);

        scheduler.shutdown();
        assert!(scheduler.is_empty());
        assert!(!timer.is_running());
        assert!(matches!(
            timer.start(Duration::from_millis(1)),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_drop_unregisters() {
        let scheduler = Scheduler::new().unwrap();
        let (_, callback) = counter();
        let timer = scheduler.create_timer(callback);
        timer.start(Duration::from_millis(1)).unwrap();
        drop(timer);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }
}
