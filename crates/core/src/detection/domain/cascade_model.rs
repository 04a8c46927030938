use std::path::Path;

use image::GrayImage;

use crate::detection::domain::detection::BoundingBox;
use crate::detection::domain::errors::{DetectionError, ModelLoadError};

/// Parameters for one multi-scale sliding-window pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultiScaleParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    /// Smallest window searched, in pixels (square).
    pub min_size: u32,
}

/// A loaded cascade classifier (Haar or LBP features).
pub trait CascadeModel: Send {
    /// Runs detection on an already equalized grayscale image.
    fn detect_multi_scale(
        &mut self,
        gray: &GrayImage,
        params: &MultiScaleParams,
    ) -> Result<Vec<BoundingBox>, DetectionError>;
}

/// Deserializes cascade model files into [`CascadeModel`]s.
pub trait CascadeLoader: Send {
    fn load(&self, path: &Path) -> Result<Box<dyn CascadeModel>, ModelLoadError>;
}

/// Loader used when no native cascade backend is compiled in.
pub struct UnsupportedCascadeLoader;

impl CascadeLoader for UnsupportedCascadeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn CascadeModel>, ModelLoadError> {
        Err(ModelLoadError::Unsupported(format!(
            "cannot load {}: cascade classifiers require the `opencv` feature",
            path.display()
        )))
    }
}
