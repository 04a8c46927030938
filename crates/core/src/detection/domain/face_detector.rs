use crate::detection::domain::detection::Detection;
use crate::detection::domain::errors::DetectionError;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Implementations may keep per-instance state (memoized sizes, native
/// handles), hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError>;
}
