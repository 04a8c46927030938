use image::{GrayImage, RgbImage};
use ndarray::ArrayView3;

/// A single camera frame: contiguous bytes in row-major order, either RGB
/// (3 channels) or grayscale (1 channel).
///
/// Device-specific pixel layouts (BGR, padded strides) are converted at the
/// capture boundary; everything downstream sees packed RGB or luma.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn from_gray_image(image: GrayImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 1, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_grayscale(&self) -> bool {
        self.channels == 1
    }

    /// True when the frame has no pixels. Sources never hand these out.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Luma view of the frame. RGB frames are converted with the Rec. 601
    /// weights used by `image::imageops::grayscale`.
    pub fn to_gray_image(&self) -> GrayImage {
        if self.is_grayscale() {
            return GrayImage::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| GrayImage::new(self.width, self.height));
        }
        image::imageops::grayscale(&self.to_rgb_image())
    }

    /// Returns a single-channel copy of this frame with the same index.
    pub fn to_grayscale(&self) -> Frame {
        if self.is_grayscale() {
            return self.clone();
        }
        Frame::from_gray_image(self.to_gray_image(), self.index)
    }

    /// Consumes the frame into an RGB image, promoting grayscale by
    /// replicating the luma channel.
    pub fn into_rgb_image(self) -> RgbImage {
        let (width, height) = (self.width, self.height);
        let data = if self.is_grayscale() {
            self.data.iter().flat_map(|&v| [v, v, v]).collect()
        } else {
            self.data
        };
        RgbImage::from_raw(width, height, data).unwrap_or_else(|| RgbImage::new(width, height))
    }

    fn to_rgb_image(&self) -> RgbImage {
        self.clone().into_rgb_image()
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
