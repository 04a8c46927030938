use ndarray::Array2;

use crate::detection::domain::errors::DetectionError;
use crate::shared::frame::Frame;

/// Single-pass neural face model.
///
/// `infer` returns one row per candidate surviving the backend's own score
/// threshold and overlap suppression, laid out as
/// `[x, y, w, h, x_re, y_re, x_le, y_le, x_nt, y_nt, x_rcm, y_rcm, x_lcm, y_lcm, score]`
/// in the coordinate space of the last `set_input_size` call.
pub trait NeuralBackend: Send {
    fn set_input_size(&mut self, width: u32, height: u32);

    fn infer(&mut self, frame: &Frame) -> Result<Array2<f32>, DetectionError>;
}
