use std::path::PathBuf;

use ndarray::{Array2, ArrayView1};

use crate::detection::domain::detection::{BoundingBox, Detection, Landmark};
use crate::detection::domain::errors::DetectionError;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::neural_backend::NeuralBackend;
use crate::shared::constants::{
    NEURAL_INPUT_HEIGHT, NEURAL_INPUT_WIDTH, NEURAL_LANDMARK_COUNT, NEURAL_MODEL_PATH,
    NEURAL_MODEL_SCORE_THRESHOLD, NEURAL_NMS_THRESHOLD, NEURAL_ROW_COLUMNS,
    NEURAL_SCORE_THRESHOLD, NEURAL_TOP_K,
};
use crate::shared::frame::Frame;

/// Fixed configuration of the neural detector, applied once at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct NeuralConfig {
    pub model_path: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    /// Threshold the backend applies before emitting rows.
    pub model_score_threshold: f32,
    /// Threshold applied to emitted rows before they become detections.
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(NEURAL_MODEL_PATH),
            input_width: NEURAL_INPUT_WIDTH,
            input_height: NEURAL_INPUT_HEIGHT,
            model_score_threshold: NEURAL_MODEL_SCORE_THRESHOLD,
            score_threshold: NEURAL_SCORE_THRESHOLD,
            nms_threshold: NEURAL_NMS_THRESHOLD,
            top_k: NEURAL_TOP_K,
        }
    }
}

/// Single-pass detector producing boxes, five landmarks and a score.
///
/// Output rows from the backend are treated as an external contract: fewer
/// than [`NEURAL_ROW_COLUMNS`] columns is an error, extra trailing columns
/// are ignored (reported once), and rows with a non-finite score are dropped.
pub struct NeuralDetector {
    backend: Box<dyn NeuralBackend>,
    score_threshold: f32,
    warned_extra_columns: bool,
}

impl NeuralDetector {
    pub fn new(backend: Box<dyn NeuralBackend>, score_threshold: f32) -> Self {
        Self {
            backend,
            score_threshold,
            warned_extra_columns: false,
        }
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    fn rows_to_detections(&mut self, rows: &Array2<f32>) -> Result<Vec<Detection>, DetectionError> {
        let columns = rows.ncols();
        if rows.nrows() == 0 {
            return Ok(Vec::new());
        }
        if columns < NEURAL_ROW_COLUMNS {
            return Err(DetectionError::Schema {
                columns,
                expected: NEURAL_ROW_COLUMNS,
            });
        }
        if columns > NEURAL_ROW_COLUMNS && !self.warned_extra_columns {
            log::warn!(
                "Neural model emits {columns} columns per row, ignoring all after {NEURAL_ROW_COLUMNS}"
            );
            self.warned_extra_columns = true;
        }

        Ok(rows
            .rows()
            .into_iter()
            .filter_map(parse_row)
            .filter(|d| d.passes(self.score_threshold))
            .collect())
    }
}

/// Converts one validated row into a detection; `None` for unusable scores.
fn parse_row(row: ArrayView1<f32>) -> Option<Detection> {
    let score = row[NEURAL_ROW_COLUMNS - 1];
    if !score.is_finite() {
        return None;
    }
    let bbox = BoundingBox::new(row[0], row[1], row[2], row[3]);
    let landmarks = (0..NEURAL_LANDMARK_COUNT)
        .map(|i| Landmark {
            x: row[4 + 2 * i],
            y: row[5 + 2 * i],
        })
        .collect();
    Some(Detection::neural(bbox, landmarks, score))
}

impl FaceDetector for NeuralDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        // Output coordinates follow the input size, so track the frame.
        self.backend.set_input_size(frame.width(), frame.height());
        let rows = self.backend.infer(frame)?;
        self.rows_to_detections(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    struct StubBackend {
        rows: Array2<f32>,
        input_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl StubBackend {
        fn new(rows: Array2<f32>) -> Self {
            Self {
                rows,
                input_sizes: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl NeuralBackend for StubBackend {
        fn set_input_size(&mut self, width: u32, height: u32) {
            self.input_sizes.lock().unwrap().push((width, height));
        }

        fn infer(&mut self, _frame: &Frame) -> Result<Array2<f32>, DetectionError> {
            Ok(self.rows.clone())
        }
    }

    fn row(x: f32, y: f32, w: f32, h: f32, score: f32) -> [f32; 15] {
        [
            x, y, w, h, 20.0, 25.0, 40.0, 25.0, 30.0, 35.0, 22.0, 45.0, 38.0, 45.0, score,
        ]
    }

    fn frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![0; (w * h * 3) as usize], w, h, 3, 0)
    }

    #[test]
    fn test_row_above_threshold_becomes_detection() {
        let rows = Array2::from_shape_vec((1, 15), row(10.0, 10.0, 50.0, 50.0, 0.95).to_vec()).unwrap();
        let mut detector = NeuralDetector::new(Box::new(StubBackend::new(rows)), 0.6);

        let dets = detector.detect(&frame(100, 100)).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
        assert_relative_eq!(dets[0].score.unwrap(), 0.95);
        assert_eq!(dets[0].landmarks.len(), 5);
        assert_eq!(dets[0].landmarks[2], Landmark { x: 30.0, y: 35.0 });
    }

    #[test]
    fn test_row_below_threshold_is_discarded() {
        let rows = Array2::from_shape_vec((1, 15), row(10.0, 10.0, 50.0, 50.0, 0.4).to_vec()).unwrap();
        let mut detector = NeuralDetector::new(Box::new(StubBackend::new(rows)), 0.6);
        assert!(detector.detect(&frame(100, 100)).unwrap().is_empty());
    }

    #[test]
    fn test_all_rows_are_considered() {
        let mut data = Vec::new();
        data.extend(row(0.0, 0.0, 10.0, 10.0, 0.7));
        data.extend(row(50.0, 0.0, 10.0, 10.0, 0.3));
        data.extend(row(0.0, 50.0, 10.0, 10.0, 0.99));
        let rows = Array2::from_shape_vec((3, 15), data).unwrap();
        let mut detector = NeuralDetector::new(Box::new(StubBackend::new(rows)), 0.6);

        let dets = detector.detect(&frame(100, 100)).unwrap();
        assert_eq!(dets.len(), 2);
    }

    #[test]
    fn test_input_size_tracks_each_frame() {
        let backend = StubBackend::new(Array2::zeros((0, 15)));
        let sizes = backend.input_sizes.clone();
        let mut detector = NeuralDetector::new(Box::new(backend), 0.6);

        detector.detect(&frame(64, 48)).unwrap();
        detector.detect(&frame(32, 16)).unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![(64, 48), (32, 16)]);
    }

    #[rstest]
    #[case(4)]
    #[case(14)]
    fn test_short_rows_are_schema_error(#[case] columns: usize) {
        let rows = Array2::from_elem((1, columns), 0.9);
        let mut detector = NeuralDetector::new(Box::new(StubBackend::new(rows)), 0.6);
        let err = detector.detect(&frame(10, 10)).unwrap_err();
        assert!(matches!(err, DetectionError::Schema { columns: c, expected: 15 } if c == columns));
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let mut data = row(1.0, 2.0, 3.0, 4.0, 0.8).to_vec();
        data.push(123.0);
        let rows = Array2::from_shape_vec((1, 16), data).unwrap();
        let mut detector = NeuralDetector::new(Box::new(StubBackend::new(rows)), 0.6);

        let dets = detector.detect(&frame(10, 10)).unwrap();
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets[0].score.unwrap(), 0.8);
        assert!(detector.warned_extra_columns);
    }

    #[test]
    fn test_nan_score_is_dropped() {
        let rows = array![[0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, f32::NAN]];
        let mut detector = NeuralDetector::new(Box::new(StubBackend::new(rows)), 0.0);
        assert!(detector.detect(&frame(10, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_output_with_any_width_is_ok() {
        let mut detector = NeuralDetector::new(Box::new(StubBackend::new(Array2::zeros((0, 0)))), 0.6);
        assert!(detector.detect(&frame(10, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_default_config_uses_documented_constants() {
        let config = NeuralConfig::default();
        assert_eq!((config.input_width, config.input_height), (320, 320));
        assert_relative_eq!(config.model_score_threshold, 0.9);
        assert_relative_eq!(config.score_threshold, 0.6);
        assert_relative_eq!(config.nms_threshold, 0.3);
        assert_eq!(config.top_k, 500);
    }
}
