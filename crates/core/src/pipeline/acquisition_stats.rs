use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared between the acquisition worker and its controller.
#[derive(Debug, Default)]
pub struct AcquisitionStats {
    ticks: AtomicUsize,
    delivered: AtomicUsize,
    empty_frames: AtomicUsize,
    capture_errors: AtomicUsize,
    detection_failures: AtomicUsize,
}

impl AcquisitionStats {
    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_frame(&self) {
        self.empty_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_capture_error(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_detection_failure(&self) {
        self.detection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.delivered,
            &self.empty_frames,
            &self.capture_errors,
            &self.detection_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            empty_frames: self.empty_frames.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            detection_failures: self.detection_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: usize,
    pub delivered: usize,
    pub empty_frames: usize,
    pub capture_errors: usize,
    pub detection_failures: usize,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks, {} delivered, {} empty, {} capture errors, {} detection failures",
            self.ticks, self.delivered, self.empty_frames, self.capture_errors, self.detection_failures
        )
    }
}
