use crate::capture::domain::capture_backend::CaptureBackend;
use crate::capture::domain::frame_source::{DeviceError, FrameSource};

/// Creates the camera source for `index`, if this build can capture.
#[cfg(feature = "opencv")]
pub fn create_camera(
    index: u32,
    backend: CaptureBackend,
) -> Result<Box<dyn FrameSource>, DeviceError> {
    Ok(Box::new(
        super::opencv_camera::OpenCvCamera::new(index, backend),
    ))
}

#[cfg(not(feature = "opencv"))]
pub fn create_camera(
    index: u32,
    backend: CaptureBackend,
) -> Result<Box<dyn FrameSource>, DeviceError> {
    Err(DeviceError::Unsupported(format!(
        "camera {index} ({backend}) needs the `opencv` feature"
    )))
}

/// Opens the device, grabs one frame and closes it again.
///
/// Returns the frame dimensions and channel count.
pub fn probe(source: &mut dyn FrameSource) -> Result<(u32, u32, u8), Box<dyn std::error::Error>> {
    source.open()?;
    let result = source.read_frame();
    source.close();
    let frame = result?;
    Ok((frame.width(), frame.height(), frame.channels()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::infrastructure::synthetic_source::SyntheticSource;

    #[test]
    fn test_probe_reports_size_and_closes() {
        let mut source = SyntheticSource::new(64, 48);
        let size = probe(&mut source).unwrap();
        assert_eq!(size, (64, 48, 3));
        assert!(!source.is_open());
    }

    #[test]
    fn test_probe_surfaces_empty_frame() {
        let mut source = SyntheticSource::new(8, 8).with_empty_every(1);
        assert!(probe(&mut source).is_err());
        assert!(!source.is_open());
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_camera_unsupported_without_opencv() {
        let err = create_camera(0, CaptureBackend::Any).err().unwrap();
        assert!(matches!(err, DeviceError::Unsupported(_)));
    }
}
