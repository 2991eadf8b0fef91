//! Periodic sampling scheduler
//!
//! Turns a coarse hardware counter into a fixed-interval callback that does
//! not drift with callback execution time.

pub mod driver;
pub mod periodic;
pub mod timer;

pub use driver::TickDriver;
pub use periodic::{PeriodicScheduler, SchedulerState, TickCallback};
pub use timer::{HardwareCounter, SimulatedCounter, TimerConfig};
