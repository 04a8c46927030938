use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

/// Result of running the selected detector on one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionOutcome {
    /// No detector selected; the frame goes out unannotated.
    PassThrough,
    Detected(Vec<Detection>),
    /// The detector failed; already logged, counts as zero detections.
    Failed,
}

impl DetectionOutcome {
    pub fn detections(&self) -> &[Detection] {
        match self {
            DetectionOutcome::Detected(d) => d,
            _ => &[],
        }
    }
}

/// Runs `detector`, absorbing both returned errors and panics.
///
/// Panics are only containable with the unwind strategy; the workspace
/// release profile keeps `panic = "unwind"` for this.
pub fn detect_guarded(detector: &mut dyn FaceDetector, frame: &Frame, name: &str) -> DetectionOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(frame))) {
        Ok(Ok(detections)) => DetectionOutcome::Detected(detections),
        Ok(Err(e)) => {
            log::warn!("{name} detection failed on frame {}: {e}", frame.index());
            DetectionOutcome::Failed
        }
        Err(payload) => {
            log::warn!(
                "{name} detector panicked on frame {}: {}",
                frame.index(),
                panic_message(payload.as_ref())
            );
            DetectionOutcome::Failed
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
