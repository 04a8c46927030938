use std::path::Path;

use image::GrayImage;
use opencv::core::{Rect, Size, Vector};
use opencv::objdetect::{self, CascadeClassifier};
use opencv::prelude::*;

use crate::detection::domain::cascade_model::{CascadeLoader, CascadeModel, MultiScaleParams};
use crate::detection::domain::detection::BoundingBox;
use crate::detection::domain::errors::{DetectionError, ModelLoadError};
use crate::shared::opencv_mat::gray_to_mat;

/// Loads Haar/LBP XML cascades with OpenCV.
pub struct OpenCvCascadeLoader;

impl CascadeLoader for OpenCvCascadeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn CascadeModel>, ModelLoadError> {
        let invalid = |reason: String| ModelLoadError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| invalid("path is not valid UTF-8".to_string()))?;
        let classifier = CascadeClassifier::new(path_str).map_err(|e| invalid(e.to_string()))?;
        if classifier.empty().map_err(|e| invalid(e.to_string()))? {
            return Err(invalid("file did not contain a cascade".to_string()));
        }
        Ok(Box::new(OpenCvCascade { classifier }))
    }
}

struct OpenCvCascade {
    classifier: CascadeClassifier,
}

// Safety: the classifier is only touched through `&mut self` behind the
// selector's lock.
unsafe impl Send for OpenCvCascade {}

impl CascadeModel for OpenCvCascade {
    fn detect_multi_scale(
        &mut self,
        gray: &GrayImage,
        params: &MultiScaleParams,
    ) -> Result<Vec<BoundingBox>, DetectionError> {
        let mat = gray_to_mat(gray)?;
        let mut faces = Vector::<Rect>::new();
        let min = params.min_size as i32;
        self.classifier.detect_multi_scale(
            &mat,
            &mut faces,
            params.scale_factor,
            params.min_neighbors,
            objdetect::CASCADE_SCALE_IMAGE,
            Size::new(min, min),
            Size::default(),
        )?;
        Ok(faces
            .iter()
            .map(|r| BoundingBox::new(r.x as f32, r.y as f32, r.width as f32, r.height as f32))
            .collect())
    }
}
