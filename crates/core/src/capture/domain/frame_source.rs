use crate::capture::domain::capture_backend::CaptureBackend;
use crate::shared::frame::Frame;

/// The capture device could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("camera {index} could not be opened with the {backend} backend")]
    OpenFailed { index: u32, backend: CaptureBackend },

    #[error("capture backend error: {0}")]
    Backend(String),

    #[error("camera capture unavailable in this build: {0}")]
    Unsupported(String),
}

/// One frame could not be pulled from the device.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Read attempted on a closed source. Indicates a sequencing bug.
    #[error("capture device is not open")]
    NotOpen,

    /// The device returned no pixels. Transient; skip the tick.
    #[error("empty frame grabbed")]
    EmptyFrame,

    #[error("capture failed: {0}")]
    Device(String),
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for DeviceError {
    fn from(e: opencv::Error) -> Self {
        DeviceError::Backend(e.to_string())
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for CaptureError {
    fn from(e: opencv::Error) -> Self {
        CaptureError::Device(e.to_string())
    }
}

/// Owns a capture-device handle and pulls frames synchronously.
///
/// `open` fails explicitly rather than leaving a half-open handle, and
/// `read_frame` never returns a zero-size frame.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), DeviceError>;

    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Idempotent; safe on an already closed source.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Human-readable identity for log lines.
    fn describe(&self) -> String {
        "frame source".to_string()
    }
}
