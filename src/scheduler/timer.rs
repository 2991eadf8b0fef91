//! Hardware counter model and timer resolution arithmetic
//!
//! The sampling timer is an 8-bit up-counter clocked from the CPU clock
//! through a prescaler. It is primed with a reload value so that it overflows
//! once per `resolution_secs`; the scheduler counts these overflows (ticks)
//! to build the much longer sampling period.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use crate::{RecorderError, Result};

/// Number of distinct values of the 8-bit counter.
pub const COUNTER_RANGE: u32 = 256;

/// Clock, prescaler and overflow resolution of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Input clock frequency in Hz.
    pub clock_hz: u32,
    /// Clock divider feeding the counter.
    pub prescaler: u32,
    /// Desired time between counter overflows, in seconds.
    pub resolution_secs: f64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { clock_hz: 16_000_000, prescaler: 64, resolution_secs: 0.001 }
    }
}

impl TimerConfig {
    /// Counter increments between two overflows, clamped to what an 8-bit
    /// counter can represent.
    pub fn counts_per_overflow(&self) -> u32 {
        self.requested_counts().clamp(1, COUNTER_RANGE)
    }

    /// Whether the requested resolution falls outside the counter range and
    /// was clamped.
    pub fn is_clamped(&self) -> bool {
        self.requested_counts() != self.counts_per_overflow()
    }

    fn requested_counts(&self) -> u32 {
        if self.prescaler == 0 {
            return COUNTER_RANGE;
        }
        let counts = f64::from(self.clock_hz) * self.resolution_secs / f64::from(self.prescaler);
        counts as u32
    }

    /// Value loaded into the counter so it overflows after
    /// [`counts_per_overflow`](Self::counts_per_overflow) increments.
    pub fn reload_value(&self) -> u8 {
        (COUNTER_RANGE - self.counts_per_overflow()) as u8
    }

    /// Real time between overflows after rounding to whole counts.
    pub fn overflow_period(&self) -> Duration {
        if self.clock_hz == 0 {
            return Duration::from_secs_f64(self.resolution_secs.max(0.0));
        }
        let counts = u128::from(self.counts_per_overflow()) * u128::from(self.prescaler.max(1));
        let nanos = counts * 1_000_000_000 / u128::from(self.clock_hz);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Overflows making up `period_secs`, at least one.
    pub fn ticks_for_period(&self, period_secs: f64) -> u32 {
        let overflow = self.overflow_period().as_secs_f64();
        if overflow <= 0.0 {
            return 1;
        }
        ((period_secs / overflow).round() as u32).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.clock_hz == 0 {
            return Err(RecorderError::config("timer clock_hz must be non-zero"));
        }
        if self.prescaler == 0 {
            return Err(RecorderError::config("timer prescaler must be non-zero"));
        }
        if !(self.resolution_secs.is_finite() && self.resolution_secs > 0.0) {
            return Err(RecorderError::config("timer resolution_secs must be positive"));
        }
        Ok(())
    }
}

/// Free-running counter with an overflow interrupt.
pub trait HardwareCounter: Send + Sync {
    /// Load the counter so the next overflow happens one resolution later.
    fn prime(&self, reload: u8);

    /// Enable or disable the overflow interrupt.
    fn set_overflow_interrupt(&self, enabled: bool);

    fn overflow_interrupt_enabled(&self) -> bool;
}

/// Counter model for hosts without the real peripheral.
#[derive(Debug, Default)]
pub struct SimulatedCounter {
    value: AtomicU8,
    interrupt_enabled: AtomicBool,
    primes: AtomicU64,
}

impl SimulatedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value primed into the counter.
    pub fn value(&self) -> u8 {
        self.value.load(Ordering::Acquire)
    }

    /// How many times the counter has been primed.
    pub fn prime_count(&self) -> u64 {
        self.primes.load(Ordering::Acquire)
    }
}

impl HardwareCounter for SimulatedCounter {
    fn prime(&self, reload: u8) {
        self.value.store(reload, Ordering::Release);
        self.primes.fetch_add(1, Ordering::AcqRel);
    }

    fn set_overflow_interrupt(&self, enabled: bool) {
        self.interrupt_enabled.store(enabled, Ordering::Release);
    }

    fn overflow_interrupt_enabled(&self) -> bool {
        self.interrupt_enabled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timer_overflows_every_millisecond() {
        let timer = TimerConfig::default();
        assert_eq!(timer.counts_per_overflow(), 250);
        assert!(!timer.is_clamped());
        assert_eq!(timer.reload_value(), 6);
        assert_eq!(timer.overflow_period(), Duration::from_millis(1));
    }

    #[test]
    fn period_converts_to_ticks() {
        let timer = TimerConfig::default();
        assert_eq!(timer.ticks_for_period(0.004), 4);
        assert_eq!(timer.ticks_for_period(1.0 / 500.0), 2);
        assert_eq!(timer.ticks_for_period(0.0104), 10);
        assert_eq!(timer.ticks_for_period(0.0), 1);
    }

    #[test]
    fn unrepresentable_resolution_is_clamped() {
        let timer = TimerConfig { resolution_secs: 0.01, ..TimerConfig::default() };
        assert_eq!(timer.counts_per_overflow(), COUNTER_RANGE);
        assert!(timer.is_clamped());
        assert_eq!(timer.reload_value(), 0);
        assert_eq!(timer.overflow_period(), Duration::from_micros(1024));
    }

    #[test]
    fn validation_rejects_zero_fields() {
        assert!(TimerConfig::default().validate().is_ok());
        assert!(TimerConfig { clock_hz: 0, ..TimerConfig::default() }.validate().is_err());
        assert!(TimerConfig { prescaler: 0, ..TimerConfig::default() }.validate().is_err());
        let negative = TimerConfig { resolution_secs: -1.0, ..TimerConfig::default() };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn simulated_counter_tracks_priming() {
        let counter = SimulatedCounter::new();
        assert!(!counter.overflow_interrupt_enabled());

        counter.prime(6);
        counter.prime(6);
        counter.set_overflow_interrupt(true);

        assert_eq!(counter.value(), 6);
        assert_eq!(counter.prime_count(), 2);
        assert!(counter.overflow_interrupt_enabled());
    }
}
