use std::path::PathBuf;

/// A detector model could not be made ready.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to load model {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("model backend unavailable in this build: {0}")]
    Unsupported(String),

    #[error("{0} detector is not configured")]
    Unavailable(String),
}

/// Failure inside a single detector call.
///
/// Never escapes the acquisition loop; see
/// [`crate::pipeline::detection_guard::detect_guarded`].
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected output layout: {columns} columns, need at least {expected}")]
    Schema { columns: usize, expected: usize },
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for DetectionError {
    fn from(e: opencv::Error) -> Self {
        DetectionError::Inference(e.to_string())
    }
}
