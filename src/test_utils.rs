//! Test utilities: deterministic sample sources and recorded session bytes
//!
//! Shared by unit tests and benchmarks so both exercise the same frame
//! contents.

#![cfg(any(test, feature = "benchmark"))]

use crate::recorder::{Sample, SampleSource};
use crate::session::{DeltaTime, FrameLayout, Session, SessionHeader};
use crate::storage::MemoryStorage;

/// Payload for sample `index`: byte `i` is `index + i`, wrapping.
pub fn ramp_payload(layout: FrameLayout, index: u32) -> Vec<u8> {
    (0..layout.payload_len()).map(|i| (index as usize + i) as u8).collect()
}

/// Source producing ramp payloads with a fixed delta-time step.
#[derive(Debug, Clone)]
pub struct RampSource {
    layout: FrameLayout,
    delta_step: u32,
    next: u32,
}

impl RampSource {
    pub fn new(layout: FrameLayout, delta_step: u32) -> Self {
        Self { layout, delta_step, next: 0 }
    }
}

impl SampleSource for RampSource {
    fn sample(&mut self) -> Option<Sample> {
        let index = self.next;
        self.next = self.next.wrapping_add(1);
        Some(Sample {
            payload: ramp_payload(self.layout, index),
            delta_time: DeltaTime::new(index.wrapping_mul(self.delta_step)),
        })
    }
}

/// Source that never has a sample ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleSource;

impl SampleSource for IdleSource {
    fn sample(&mut self) -> Option<Sample> {
        None
    }
}

/// Bytes of a session holding `frames` ramp frames.
///
/// Panics if any step of recording fails.
pub fn recorded_session(header: SessionHeader, sample_width: usize, frames: u32) -> Vec<u8> {
    let storage = MemoryStorage::new();
    let layout =
        FrameLayout::new(header.channel_count, sample_width).expect("Invalid frame layout");
    let mut source = RampSource::new(layout, 4);

    let mut session =
        Session::open(&storage, header, sample_width, 0).expect("Failed to open session");
    for _ in 0..frames {
        let sample = source.sample().expect("Ramp source always has a sample");
        session.append_frame(&sample.payload, sample.delta_time).expect("Failed to append frame");
    }
    session.close();

    storage.contents("ecgses.000").expect("Session file missing")
}
