use ndarray::Array2;
use opencv::core::{Mat, Ptr, Size};
use opencv::dnn::{DNN_BACKEND_DEFAULT, DNN_TARGET_CPU};
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::*;

use crate::detection::domain::errors::{DetectionError, ModelLoadError};
use crate::detection::domain::neural_backend::NeuralBackend;
use crate::detection::infrastructure::neural_detector::NeuralConfig;
use crate::shared::frame::Frame;
use crate::shared::opencv_mat::frame_to_bgr_mat;

/// YuNet through OpenCV's `FaceDetectorYN`, which decodes and suppresses
/// natively and emits rows directly.
pub struct OpenCvYunetBackend {
    detector: Ptr<FaceDetectorYN>,
    input_size: (u32, u32),
}

// Safety: one owner at a time, accessed through `&mut self` only.
unsafe impl Send for OpenCvYunetBackend {}

impl OpenCvYunetBackend {
    pub fn new(config: &NeuralConfig) -> Result<Self, ModelLoadError> {
        let path = &config.model_path;
        if !path.is_file() {
            return Err(ModelLoadError::NotFound { path: path.clone() });
        }
        let invalid = |reason: String| ModelLoadError::Invalid {
            path: path.clone(),
            reason,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| invalid("path is not valid UTF-8".to_string()))?;
        let detector = FaceDetectorYN::create(
            path_str,
            "",
            Size::new(config.input_width as i32, config.input_height as i32),
            config.model_score_threshold,
            config.nms_threshold,
            config.top_k as i32,
            DNN_BACKEND_DEFAULT,
            DNN_TARGET_CPU,
        )
        .map_err(|e| invalid(e.to_string()))?;
        log::info!("Loaded YuNet model {} with OpenCV DNN", path.display());
        Ok(Self {
            detector,
            input_size: (config.input_width, config.input_height),
        })
    }
}

impl NeuralBackend for OpenCvYunetBackend {
    fn set_input_size(&mut self, width: u32, height: u32) {
        if self.input_size == (width, height) {
            return;
        }
        match self
            .detector
            .set_input_size(Size::new(width as i32, height as i32))
        {
            Ok(()) => self.input_size = (width, height),
            Err(e) => log::warn!("Failed to set YuNet input size {width}x{height}: {e}"),
        }
    }

    fn infer(&mut self, frame: &Frame) -> Result<Array2<f32>, DetectionError> {
        let input = frame_to_bgr_mat(frame)?;
        let mut faces = Mat::default();
        self.detector.detect(&input, &mut faces)?;

        let rows = faces.rows().max(0) as usize;
        let cols = faces.cols().max(0) as usize;
        let mut out = Array2::<f32>::zeros((rows, cols));
        for r in 0..rows {
            for c in 0..cols {
                out[[r, c]] = *faces.at_2d::<f32>(r as i32, c as i32)?;
            }
        }
        Ok(out)
    }
}
