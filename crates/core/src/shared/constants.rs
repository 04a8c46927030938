use std::time::Duration;

/// Fixed acquisition period (~30 Hz).
pub const TICK_PERIOD: Duration = Duration::from_millis(33);

pub const DEFAULT_DEVICE_INDEX: u32 = 0;

pub const HAAR_MODEL_PATH: &str = "resources/haarcascades/haarcascade_frontalface_alt.xml";
pub const LBP_MODEL_PATH: &str = "resources/lbpcascades/lbpcascade_frontalface.xml";
pub const NEURAL_MODEL_PATH: &str = "resources/yunet/face_detection_yunet_2023mar_int8bq.onnx";

// Cascade detection
pub const CASCADE_SCALE_FACTOR: f64 = 1.1;
pub const CASCADE_MIN_NEIGHBORS: i32 = 2;
/// Smallest face searched for, as a fraction of frame height.
pub const CASCADE_MIN_FACE_RATIO: f32 = 0.2;

// Neural detection
pub const NEURAL_INPUT_WIDTH: u32 = 320;
pub const NEURAL_INPUT_HEIGHT: u32 = 320;
/// Threshold applied inside the model backend before rows are emitted.
pub const NEURAL_MODEL_SCORE_THRESHOLD: f32 = 0.9;
/// Threshold applied to emitted rows before they become detections.
pub const NEURAL_SCORE_THRESHOLD: f32 = 0.6;
pub const NEURAL_NMS_THRESHOLD: f32 = 0.3;
pub const NEURAL_TOP_K: usize = 500;

/// Columns in one neural output row: box (4), five landmarks (10), score (1).
pub const NEURAL_ROW_COLUMNS: usize = 15;
pub const NEURAL_LANDMARK_COUNT: usize = 5;
