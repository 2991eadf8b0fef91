//! Recorder: sampling source, scheduler and session wired together
//!
//! The recorder opens a session, registers a sampling callback with the
//! periodic scheduler and spawns the tick driver. On every elapsed period the
//! callback pulls one time slice from the [`SampleSource`] and appends it as a
//! frame. A failed frame write is logged and counted; sampling continues.

use futures::Stream;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::scheduler::{HardwareCounter, PeriodicScheduler, TickDriver};
use crate::session::{DeltaTime, Session};
use crate::storage::Storage;
use crate::Result;

/// One time slice across all channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Raw sample bytes for every channel, already in wire order.
    pub payload: Vec<u8>,
    pub delta_time: DeltaTime,
}

/// Device data source read once per sampling period.
pub trait SampleSource: Send + 'static {
    /// Next time slice, or `None` when the device has nothing ready; the
    /// period is then skipped without writing a frame.
    fn sample(&mut self) -> Option<Sample>;
}

impl<F> SampleSource for F
where
    F: FnMut() -> Option<Sample> + Send + 'static,
{
    fn sample(&mut self) -> Option<Sample> {
        self()
    }
}

/// Snapshot of recording progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStatus {
    pub file_name: String,
    pub frames_written: u64,
    pub write_failures: u64,
    /// Periods where the source had no sample ready.
    pub skipped_samples: u64,
    pub last_delta_time: Option<DeltaTime>,
    /// Suffix the next session's filename search should start from.
    pub next_suffix: u16,
    pub recording: bool,
}

/// A running recording.
///
/// Dropping the recorder stops it the same way [`Recorder::stop`] does.
pub struct Recorder {
    scheduler: Arc<PeriodicScheduler>,
    session: Arc<Mutex<Option<Session>>>,
    status_tx: Arc<watch::Sender<RecorderStatus>>,
    status: watch::Receiver<RecorderStatus>,
    cancel: CancellationToken,
}

impl Recorder {
    /// Open a session on `storage` and start sampling `source`.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Configuration errors, plus every error of [`Session::open`]. Nothing
    /// is scheduled when the session cannot be opened.
    pub fn start<S, Src>(
        config: &RecorderConfig,
        storage: &S,
        source: Src,
        timestamp: u64,
        base_suffix: u16,
    ) -> Result<Self>
    where
        S: Storage + ?Sized,
        Src: SampleSource,
    {
        config.validate()?;
        let header = config.header(timestamp);
        let session = Session::open(storage, header, config.sample_width, base_suffix)?;

        let (status_tx, status) = watch::channel(RecorderStatus {
            file_name: session.name().to_string(),
            next_suffix: session.next_suffix(),
            recording: true,
            ..RecorderStatus::default()
        });
        let status_tx = Arc::new(status_tx);
        let session = Arc::new(Mutex::new(Some(session)));

        let callback = sampling_callback(Arc::clone(&session), source, Arc::clone(&status_tx));
        let scheduler = Arc::new(PeriodicScheduler::simulated(
            config.timer,
            config.sampling_period_secs(),
            callback,
        ));
        scheduler.start();
        let cancel = TickDriver::spawn(Arc::clone(&scheduler));

        info!(
            "Recording {} at {}Hz ({} ticks per sample)",
            status.borrow().file_name,
            config.sample_frequency,
            scheduler.interval()
        );

        Ok(Self { scheduler, session, status_tx, status, cancel })
    }

    /// Current status snapshot.
    pub fn status(&self) -> RecorderStatus {
        self.status.borrow().clone()
    }

    /// Status changes as a stream, starting with the current value.
    pub fn status_updates(&self) -> impl Stream<Item = RecorderStatus> + use<> {
        WatchStream::new(self.status.clone())
    }

    pub fn scheduler(&self) -> &PeriodicScheduler {
        &self.scheduler
    }

    /// Stop sampling, close the session and return the final status.
    pub fn stop(mut self) -> RecorderStatus {
        self.shutdown();
        self.status()
    }

    fn shutdown(&mut self) {
        self.scheduler.counter().set_overflow_interrupt(false);
        self.cancel.cancel();

        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(session) = session {
            debug!("Closing session {}", session.name());
            session.close();
            self.status_tx.send_modify(|status| status.recording = false);
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sampling_callback<Src: SampleSource>(
    session: Arc<Mutex<Option<Session>>>,
    mut source: Src,
    status: Arc<watch::Sender<RecorderStatus>>,
) -> impl FnMut() + Send + 'static {
    move || {
        let Some(sample) = source.sample() else {
            status.send_modify(|s| s.skipped_samples += 1);
            return;
        };

        let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(session) = guard.as_mut() else {
            return;
        };

        match session.append_frame(&sample.payload, sample.delta_time) {
            Ok(()) => {
                let frames_written = session.frames_written();
                status.send_modify(|s| {
                    s.frames_written = frames_written;
                    s.last_delta_time = Some(sample.delta_time);
                });
            }
            Err(e) => {
                warn!("Frame not recorded: {}", e);
                status.send_modify(|s| s.write_failures += 1);
            }
        }
    }
}
