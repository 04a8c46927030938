use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use crate::capture::domain::capture_backend::CaptureBackend;
use crate::capture::domain::frame_source::{CaptureError, DeviceError, FrameSource};
use crate::shared::frame::Frame;
use crate::shared::opencv_mat::mat_to_frame;

/// Camera device read through OpenCV `VideoCapture`.
pub struct OpenCvCamera {
    index: u32,
    backend: CaptureBackend,
    capture: Option<VideoCapture>,
    frames_read: usize,
}

// Safety: the capture handle is owned by one thread at a time; the
// acquisition loop moves the whole source into its worker.
unsafe impl Send for OpenCvCamera {}

impl OpenCvCamera {
    pub fn new(index: u32, backend: CaptureBackend) -> Self {
        Self {
            index,
            backend,
            capture: None,
            frames_read: 0,
        }
    }
}

fn api_preference(backend: CaptureBackend) -> i32 {
    match backend {
        CaptureBackend::Any => videoio::CAP_ANY,
        CaptureBackend::DirectShow => videoio::CAP_DSHOW,
        CaptureBackend::MediaFoundation => videoio::CAP_MSMF,
        CaptureBackend::V4l2 => videoio::CAP_V4L2,
        CaptureBackend::AvFoundation => videoio::CAP_AVFOUNDATION,
        CaptureBackend::GStreamer => videoio::CAP_GSTREAMER,
        CaptureBackend::Ffmpeg => videoio::CAP_FFMPEG,
    }
}

impl FrameSource for OpenCvCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.capture.is_some() {
            return Ok(());
        }
        let mut capture = VideoCapture::new(self.index as i32, api_preference(self.backend))?;
        if !capture.is_opened()? {
            let _ = capture.release();
            return Err(DeviceError::OpenFailed {
                index: self.index,
                backend: self.backend,
            });
        }
        log::info!("Opened camera {} ({} backend)", self.index, self.backend);
        self.capture = Some(capture);
        self.frames_read = 0;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let capture = self.capture.as_mut().ok_or(CaptureError::NotOpen)?;
        let mut mat = Mat::default();
        if !capture.read(&mut mat)? {
            return Err(CaptureError::EmptyFrame);
        }
        let frame = mat_to_frame(&mat, self.frames_read)?.ok_or(CaptureError::EmptyFrame)?;
        self.frames_read += 1;
        log::trace!("Grabbed frame {}x{}", frame.width(), frame.height());
        Ok(frame)
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                log::warn!("Failed to release camera {}: {e}", self.index);
            }
            log::info!("Closed camera {} after {} frames", self.index, self.frames_read);
        }
    }

    fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    fn describe(&self) -> String {
        format!("camera {} ({})", self.index, self.backend)
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        self.close();
    }
}
