use crate::capture::domain::frame_source::{CaptureError, DeviceError, FrameSource};
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// Every byte set to the given value.
    Solid(u8),
    /// A bright vertical bar sweeping across a dark background.
    SweepingBar,
}

/// Deterministic in-process frame generator, standing in for a camera.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    channels: u8,
    pattern: Pattern,
    /// Every n-th read yields [`CaptureError::EmptyFrame`].
    empty_every: Option<usize>,
    open: bool,
    reads: usize,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            channels: 3,
            pattern: Pattern::Solid(0),
            empty_every: None,
            open: false,
            reads: 0,
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn grayscale(mut self) -> Self {
        self.channels = 1;
        self
    }

    pub fn with_empty_every(mut self, n: usize) -> Self {
        self.empty_every = (n > 0).then_some(n);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    fn render(&self, index: usize) -> Frame {
        let (w, h, c) = (self.width as usize, self.height as usize, self.channels as usize);
        let data = match self.pattern {
            Pattern::Solid(value) => vec![value; w * h * c],
            Pattern::SweepingBar => {
                let bar_width = (w / 10).max(1);
                let bar_x = (index * 4) % w.max(1);
                let mut data = vec![32u8; w * h * c];
                for y in 0..h {
                    for x in bar_x..(bar_x + bar_width).min(w) {
                        let offset = (y * w + x) * c;
                        data[offset..offset + c].fill(220);
                    }
                }
                data
            }
        };
        Frame::new(data, self.width, self.height, self.channels, index)
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.width == 0 || self.height == 0 {
            return Err(DeviceError::Backend(format!(
                "invalid synthetic frame size {}x{}",
                self.width, self.height
            )));
        }
        self.open = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.open {
            return Err(CaptureError::NotOpen);
        }
        let index = self.reads;
        self.reads += 1;
        if self.empty_every.is_some_and(|n| (index + 1) % n == 0) {
            return Err(CaptureError::EmptyFrame);
        }
        Ok(self.render(index))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{} source", self.width, self.height)
    }
}
