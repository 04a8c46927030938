use crate::detection::domain::cascade_model::CascadeLoader;

/// Returns the cascade loader available in this build.
pub fn default_cascade_loader() -> Box<dyn CascadeLoader> {
    #[cfg(feature = "opencv")]
    {
        Box::new(super::opencv_cascade::OpenCvCascadeLoader)
    }
    #[cfg(not(feature = "opencv"))]
    {
        log::debug!("Built without OpenCV; cascade models cannot be loaded");
        Box::new(crate::detection::domain::cascade_model::UnsupportedCascadeLoader)
    }
}
