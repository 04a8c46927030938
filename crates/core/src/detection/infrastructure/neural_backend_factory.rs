use std::fmt;
use std::str::FromStr;

use crate::detection::domain::errors::ModelLoadError;
use crate::detection::domain::neural_backend::NeuralBackend;
use crate::detection::infrastructure::neural_detector::{NeuralConfig, NeuralDetector};
use crate::detection::infrastructure::onnx_yunet_backend::OnnxYunetBackend;

/// Runtime used to execute the neural face model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NeuralBackendKind {
    /// ONNX Runtime with Rust-side decoding.
    #[default]
    Onnx,
    /// OpenCV DNN `FaceDetectorYN`.
    OpenCv,
}

impl fmt::Display for NeuralBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeuralBackendKind::Onnx => f.write_str("onnx"),
            NeuralBackendKind::OpenCv => f.write_str("opencv"),
        }
    }
}

impl FromStr for NeuralBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" | "ort" => Ok(NeuralBackendKind::Onnx),
            "opencv" | "cv" => Ok(NeuralBackendKind::OpenCv),
            other => Err(format!("unknown neural backend '{other}'")),
        }
    }
}

pub fn create_neural_backend(
    kind: NeuralBackendKind,
    config: &NeuralConfig,
) -> Result<Box<dyn NeuralBackend>, ModelLoadError> {
    log::info!("Using {kind} backend for neural detection");
    match kind {
        NeuralBackendKind::Onnx => Ok(Box::new(OnnxYunetBackend::new(config)?)),
        #[cfg(feature = "opencv")]
        NeuralBackendKind::OpenCv => Ok(Box::new(
            super::opencv_yunet_backend::OpenCvYunetBackend::new(config)?,
        )),
        #[cfg(not(feature = "opencv"))]
        NeuralBackendKind::OpenCv => Err(ModelLoadError::Unsupported(
            "the OpenCV neural backend needs the `opencv` feature".to_string(),
        )),
    }
}

/// Builds a ready neural detector from its fixed configuration.
pub fn create_neural_detector(
    kind: NeuralBackendKind,
    config: &NeuralConfig,
) -> Result<NeuralDetector, ModelLoadError> {
    let backend = create_neural_backend(kind, config)?;
    Ok(NeuralDetector::new(backend, config.score_threshold))
}
