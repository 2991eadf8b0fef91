//! Fixed-interval callback trigger built on counter overflows
//!
//! [`PeriodicScheduler::on_overflow`] is the interrupt handler body: it is
//! invoked once per raw counter overflow and fires the registered callback
//! whenever a full interval of overflows has accumulated.
//!
//! Two rules keep the cadence stable:
//!
//! - When the callback fires, `interval` is subtracted from the tick count
//!   rather than resetting it, so overflows that arrive while the callback
//!   runs still count toward the next period and the cadence does not drift.
//! - The callback never nests. Overflows delivered while it is running are
//!   counted but do not fire it again; the backlog is consumed by the first
//!   overflow after the callback returns. Each overflow fires the callback
//!   at most once, so a slow callback never causes a burst of invocations.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, trace, warn};

use super::timer::{HardwareCounter, SimulatedCounter, TimerConfig};

/// Callback invoked once per elapsed period.
pub type TickCallback = Box<dyn FnMut() + Send>;

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Interval and callback set, overflow interrupt disabled.
    Configured,
    /// Overflow interrupt enabled.
    Running,
    /// The callback is executing.
    InCallback,
}

/// Owned timer state: one per device timer.
pub struct PeriodicScheduler<C: HardwareCounter = SimulatedCounter> {
    counter: C,
    timer: TimerConfig,
    reload: AtomicU8,
    tick_count: AtomicU32,
    interval: AtomicU32,
    in_callback: AtomicBool,
    callback: Mutex<TickCallback>,
    fired: AtomicU64,
    deferred: AtomicU64,
}

impl PeriodicScheduler<SimulatedCounter> {
    /// Scheduler over a [`SimulatedCounter`].
    pub fn simulated<F>(timer: TimerConfig, period_secs: f64, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::new(SimulatedCounter::new(), timer, period_secs, callback)
    }
}

impl<C: HardwareCounter> PeriodicScheduler<C> {
    /// Create a scheduler in the `Configured` state.
    pub fn new<F>(counter: C, timer: TimerConfig, period_secs: f64, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let scheduler = Self {
            counter,
            timer,
            reload: AtomicU8::new(timer.reload_value()),
            tick_count: AtomicU32::new(0),
            interval: AtomicU32::new(1),
            in_callback: AtomicBool::new(false),
            callback: Mutex::new(Box::new(|| {})),
            fired: AtomicU64::new(0),
            deferred: AtomicU64::new(0),
        };
        scheduler.configure(period_secs, callback);
        scheduler
    }

    /// Set the period and callback, and stop overflow delivery.
    ///
    /// Must be called from mainline code, never from inside the callback.
    pub fn configure<F>(&self, period_secs: f64, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.counter.set_overflow_interrupt(false);

        if self.timer.is_clamped() {
            warn!(
                "Timer resolution {}s not representable at {}Hz/{}: using {} counts per overflow",
                self.timer.resolution_secs,
                self.timer.clock_hz,
                self.timer.prescaler,
                self.timer.counts_per_overflow()
            );
        }
        let interval = self.timer.ticks_for_period(period_secs);
        self.reload.store(self.timer.reload_value(), Ordering::Release);
        self.interval.store(interval, Ordering::Release);
        self.tick_count.store(0, Ordering::Release);
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Box::new(callback);

        debug!(
            "Scheduler configured: period {}s = {} ticks of {:?} (reload {})",
            period_secs,
            interval,
            self.timer.overflow_period(),
            self.timer.reload_value()
        );
    }

    /// Prime the counter and enable overflow delivery.
    pub fn start(&self) {
        self.tick_count.store(0, Ordering::Release);
        self.in_callback.store(false, Ordering::Release);
        self.counter.prime(self.reload.load(Ordering::Acquire));
        self.counter.set_overflow_interrupt(true);
        info!("Scheduler started ({} ticks per period)", self.interval());
    }

    /// Interrupt handler body, called once per raw counter overflow.
    ///
    /// Returns whether the callback was invoked by this overflow.
    pub fn on_overflow(&self) -> bool {
        self.counter.prime(self.reload.load(Ordering::Acquire));
        let ticks = self.tick_count.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        let interval = self.interval.load(Ordering::Acquire);

        if ticks < interval {
            return false;
        }

        if self
            .in_callback
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.deferred.fetch_add(1, Ordering::AcqRel);
            trace!("Period elapsed during callback, {} ticks pending", ticks);
            return false;
        }

        self.tick_count.fetch_sub(interval, Ordering::AcqRel);
        {
            let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
            (callback)();
        }
        self.fired.fetch_add(1, Ordering::AcqRel);
        self.in_callback.store(false, Ordering::Release);
        true
    }

    pub fn state(&self) -> SchedulerState {
        if self.in_callback.load(Ordering::Acquire) {
            SchedulerState::InCallback
        } else if self.counter.overflow_interrupt_enabled() {
            SchedulerState::Running
        } else {
            SchedulerState::Configured
        }
    }

    /// Whether overflow events are currently delivered.
    pub fn is_running(&self) -> bool {
        self.counter.overflow_interrupt_enabled()
    }

    /// Overflows accumulated toward the next period.
    pub fn tick_count(&self) -> u32 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// Overflows per period.
    pub fn interval(&self) -> u32 {
        self.interval.load(Ordering::Acquire)
    }

    /// Callback invocations since creation.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Acquire)
    }

    /// Overflows that reached the threshold while the callback was running.
    pub fn deferred_count(&self) -> u64 {
        self.deferred.load(Ordering::Acquire)
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    pub fn timer(&self) -> &TimerConfig {
        &self.timer
    }
}
