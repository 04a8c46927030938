use std::path::{Path, PathBuf};

use crate::detection::domain::cascade_model::{CascadeLoader, CascadeModel, MultiScaleParams};
use crate::detection::domain::detection::Detection;
use crate::detection::domain::errors::{DetectionError, ModelLoadError};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::{
    CASCADE_MIN_FACE_RATIO, CASCADE_MIN_NEIGHBORS, CASCADE_SCALE_FACTOR,
};
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_face_ratio: f32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: CASCADE_SCALE_FACTOR,
            min_neighbors: CASCADE_MIN_NEIGHBORS,
            min_face_ratio: CASCADE_MIN_FACE_RATIO,
        }
    }
}

/// Haar/LBP sliding-window detector.
///
/// Haar and LBP differ only in the model file handed to [`configure`];
/// one instance is shared and reloaded on selection. Without a model
/// loaded, `detect` finds nothing.
///
/// [`configure`]: CascadeDetector::configure
pub struct CascadeDetector {
    loader: Box<dyn CascadeLoader>,
    model: Option<Box<dyn CascadeModel>>,
    model_path: Option<PathBuf>,
    params: CascadeParams,
    /// Memoized after the first non-zero computation.
    min_face_size: Option<u32>,
}

impl CascadeDetector {
    pub fn new(loader: Box<dyn CascadeLoader>, params: CascadeParams) -> Self {
        Self {
            loader,
            model: None,
            model_path: None,
            params,
            min_face_size: None,
        }
    }

    /// Loads a serialized cascade. On failure the previous model stays active.
    pub fn configure(&mut self, path: &Path) -> Result<(), ModelLoadError> {
        if !path.is_file() {
            return Err(ModelLoadError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let model = self.loader.load(path)?;
        self.model = Some(model);
        self.model_path = Some(path.to_path_buf());
        log::info!("Loaded cascade model {}", path.display());
        Ok(())
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Minimum face side for a frame of `frame_height` rows.
    fn min_face_size(&mut self, frame_height: u32) -> u32 {
        if let Some(size) = self.min_face_size {
            return size;
        }
        let size = (frame_height as f32 * self.params.min_face_ratio).round() as u32;
        if size > 0 {
            self.min_face_size = Some(size);
        }
        size
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        if self.model.is_none() {
            log::trace!("No cascade model loaded, skipping detection");
            return Ok(Vec::new());
        }

        let gray = frame.to_gray_image();
        let equalized = imageproc::contrast::equalize_histogram(&gray);
        let params = MultiScaleParams {
            scale_factor: self.params.scale_factor,
            min_neighbors: self.params.min_neighbors,
            min_size: self.min_face_size(frame.height()),
        };

        let Some(model) = self.model.as_mut() else {
            return Ok(Vec::new());
        };
        let boxes = model.detect_multi_scale(&equalized, &params)?;
        Ok(boxes.into_iter().map(Detection::cascade).collect())
    }
}
