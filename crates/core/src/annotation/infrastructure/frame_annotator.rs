use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::RgbImage;
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::annotation::domain::overlay::{overlays_for, AnnotationStyle, Overlay};
use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::shared::frame::Frame;

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse font file {0}")]
    Parse(String),
}

/// DejaVu Sans, bundled so labels render without a configured font.
const BUILTIN_FONT: &[u8] = include_bytes!("../../../resources/fonts/DejaVuSans.ttf");

/// The bundled label font.
pub fn default_font() -> Result<FontVec, FontError> {
    FontVec::try_from_vec(BUILTIN_FONT.to_vec())
        .map_err(|_| FontError::Parse("built-in DejaVu Sans".to_string()))
}

/// Reads a TrueType/OpenType font used for score labels.
pub fn load_font(path: &Path) -> Result<FontVec, FontError> {
    let data = std::fs::read(path).map_err(|source| FontError::Read {
        path: path.display().to_string(),
        source,
    })?;
    FontVec::try_from_vec(data).map_err(|_| FontError::Parse(path.display().to_string()))
}

/// Draws detections onto frames.
///
/// Holds only immutable style and font, so equal inputs always produce equal
/// output. Labels are skipped when no font is configured; boxes and
/// landmarks are always drawn. Grayscale frames with detections come back
/// as RGB so the overlay colours survive.
pub struct FrameAnnotator {
    style: AnnotationStyle,
    font: Option<FontVec>,
}

impl FrameAnnotator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style, font: None }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    pub fn annotate(&self, frame: Frame, detections: &[Detection]) -> Frame {
        if detections.is_empty() {
            return frame;
        }
        let overlays = overlays_for(detections, &self.style);
        self.render(frame, &overlays)
    }

    pub fn render(&self, frame: Frame, overlays: &[Overlay]) -> Frame {
        let index = frame.index();
        let mut image = frame.into_rgb_image();
        for overlay in overlays {
            match overlay {
                Overlay::Rectangle { bbox, thickness } => {
                    draw_thick_rect(&mut image, bbox, *thickness, &self.style)
                }
                Overlay::Point { x, y, radius } => {
                    let (w, h) = image.dimensions();
                    let center = (clamp_to_i32(*x, w), clamp_to_i32(*y, h));
                    draw_filled_circle_mut(&mut image, center, *radius, self.style.landmark_color);
                }
                Overlay::Label { text, x, y } => self.draw_label(&mut image, text, *x, *y),
            }
        }
        Frame::from_rgb_image(image, index)
    }

    fn draw_label(&self, image: &mut RgbImage, text: &str, x: f32, baseline: f32) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let scale = PxScale::from(self.style.label_scale);
        let (_, text_height) = text_size(scale, font, text);
        let top = (baseline - text_height as f32).max(0.0);
        draw_text_mut(
            image,
            self.style.label_color,
            x.max(0.0).round() as i32,
            top.round() as i32,
            scale,
            font,
            text,
        );
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(AnnotationStyle::default())
    }
}

/// Draws `thickness` nested outlines growing inward from the box edge.
fn draw_thick_rect(image: &mut RgbImage, bbox: &BoundingBox, thickness: u32, style: &AnnotationStyle) {
    let (w, h) = image.dimensions();
    let Some(outer) = rect_from_bbox(bbox, w, h) else {
        return;
    };
    for t in 0..thickness.max(1) {
        let inner_w = outer.width().saturating_sub(2 * t);
        let inner_h = outer.height().saturating_sub(2 * t);
        if inner_w == 0 || inner_h == 0 {
            break;
        }
        let rect = Rect::at(outer.left() + t as i32, outer.top() + t as i32).of_size(inner_w, inner_h);
        draw_hollow_rect_mut(image, rect, style.box_color);
    }
}

/// Clamps a float box to the image; `None` when nothing is visible.
fn rect_from_bbox(bbox: &BoundingBox, img_w: u32, img_h: u32) -> Option<Rect> {
    if img_w == 0 || img_h == 0 {
        return None;
    }
    let max_x = (img_w - 1) as f32;
    let max_y = (img_h - 1) as f32;
    if bbox.right() < 0.0 || bbox.bottom() < 0.0 || bbox.x > max_x || bbox.y > max_y {
        return None;
    }
    let x1 = bbox.x.clamp(0.0, max_x).round();
    let y1 = bbox.y.clamp(0.0, max_y).round();
    let x2 = (bbox.right() - 1.0).clamp(0.0, max_x).round();
    let y2 = (bbox.bottom() - 1.0).clamp(0.0, max_y).round();
    let width = (x2 - x1 + 1.0).max(1.0) as u32;
    let height = (y2 - y1 + 1.0).max(1.0) as u32;
    Some(Rect::at(x1 as i32, y1 as i32).of_size(width, height))
}

fn clamp_to_i32(value: f32, extent: u32) -> i32 {
    if extent == 0 {
        return 0;
    }
    value.clamp(0.0, (extent - 1) as f32).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::overlay::format_score;
    use crate::detection::domain::detection::Landmark;
    use crate::detection::domain::errors::DetectionError;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::detection::domain::neural_backend::NeuralBackend;
    use crate::detection::infrastructure::neural_detector::NeuralDetector;
    use ndarray::Array2;

    const GREEN: [u8; 3] = [0, 255, 0];
    const RED: [u8; 3] = [255, 0, 0];
    const BLACK: [u8; 3] = [0, 0, 0];

    struct OneRowBackend {
        row: [f32; 15],
    }

    impl NeuralBackend for OneRowBackend {
        fn set_input_size(&mut self, _width: u32, _height: u32) {}

        fn infer(&mut self, _frame: &Frame) -> Result<Array2<f32>, DetectionError> {
            Ok(Array2::from_shape_vec((1, 15), self.row.to_vec()).unwrap())
        }
    }

    fn black_frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![0; (w * h * 3) as usize], w, h, 3, 3)
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * frame.width() + x) * 3) as usize;
        [frame.data()[i], frame.data()[i + 1], frame.data()[i + 2]]
    }

    fn row_with_score(score: f32) -> [f32; 15] {
        // box (10,10,50,50), landmarks along y=20 and y=50, away from the center
        [
            10.0, 10.0, 50.0, 50.0, 20.0, 20.0, 50.0, 20.0, 35.0, 50.0, 20.0, 50.0, 50.0, 50.0,
            score,
        ]
    }

    #[test]
    fn test_neural_row_draws_one_box_with_label() {
        let mut detector =
            NeuralDetector::new(Box::new(OneRowBackend { row: row_with_score(0.95) }), 0.6);
        let frame = black_frame(100, 100);
        let detections = detector.detect(&frame).unwrap();

        let style = AnnotationStyle::default();
        let overlays = overlays_for(&detections, &style);
        let boxes: Vec<_> = overlays
            .iter()
            .filter_map(|o| match o {
                Overlay::Rectangle { bbox, .. } => Some(*bbox),
                _ => None,
            })
            .collect();
        assert_eq!(boxes, vec![BoundingBox::new(10.0, 10.0, 50.0, 50.0)]);
        assert!(overlays.iter().any(
            |o| matches!(o, Overlay::Label { text, .. } if text.contains("0.95"))
        ));

        let out = FrameAnnotator::new(style).annotate(frame, &detections);
        assert_eq!(pixel(&out, 10, 10), GREEN);
        assert_eq!(pixel(&out, 59, 59), GREEN);
        assert_eq!(pixel(&out, 11, 30), GREEN);
        assert_eq!(pixel(&out, 12, 30), BLACK);
        assert_eq!(pixel(&out, 35, 35), BLACK);
        assert_eq!(pixel(&out, 60, 60), BLACK);
        assert_eq!(pixel(&out, 35, 50), RED);
    }

    #[test]
    fn test_low_score_row_draws_nothing() {
        let mut detector =
            NeuralDetector::new(Box::new(OneRowBackend { row: row_with_score(0.4) }), 0.6);
        let frame = black_frame(100, 100);
        let detections = detector.detect(&frame).unwrap();
        assert!(detections.is_empty());

        let out = FrameAnnotator::default().annotate(frame, &detections);
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_annotate_keeps_dimensions_and_index() {
        let dets = vec![Detection::cascade(BoundingBox::new(5.0, 5.0, 10.0, 10.0))];
        let out = FrameAnnotator::default().annotate(black_frame(32, 24), &dets);
        assert_eq!((out.width(), out.height(), out.channels(), out.index()), (32, 24, 3, 3));
    }

    #[test]
    fn test_annotate_is_deterministic() {
        let dets = vec![Detection::neural(
            BoundingBox::new(4.0, 6.0, 20.0, 12.0),
            vec![Landmark { x: 8.0, y: 9.0 }],
            0.8,
        )];
        let annotator = FrameAnnotator::default();
        let a = annotator.annotate(black_frame(40, 30), &dets);
        let b = annotator.annotate(black_frame(40, 30), &dets);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_grayscale_frame_is_promoted_when_drawn_on() {
        let frame = Frame::new(vec![50; 20 * 20], 20, 20, 1, 0);
        let dets = vec![Detection::cascade(BoundingBox::new(2.0, 2.0, 8.0, 8.0))];
        let out = FrameAnnotator::default().annotate(frame, &dets);
        assert_eq!(out.channels(), 3);
        assert_eq!(pixel(&out, 2, 2), GREEN);
        assert_eq!(pixel(&out, 15, 15), [50, 50, 50]);
    }

    #[test]
    fn test_no_detections_returns_frame_untouched() {
        let frame = Frame::new(vec![7; 16], 4, 4, 1, 0);
        let out = FrameAnnotator::default().annotate(frame, &[]);
        assert_eq!(out.channels(), 1);
        assert!(out.data().iter().all(|&v| v == 7));
    }

    #[test]
    fn test_box_partly_outside_frame_is_clamped() {
        let dets = vec![Detection::cascade(BoundingBox::new(-5.0, -5.0, 20.0, 20.0))];
        let out = FrameAnnotator::default().annotate(black_frame(30, 30), &dets);
        assert_eq!(pixel(&out, 0, 0), GREEN);
        assert_eq!(pixel(&out, 14, 14), GREEN);
    }

    #[test]
    fn test_box_fully_outside_frame_is_skipped() {
        let dets = vec![Detection::cascade(BoundingBox::new(100.0, 100.0, 20.0, 20.0))];
        let out = FrameAnnotator::default().annotate(black_frame(30, 30), &dets);
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_label_without_font_is_not_drawn() {
        let annotator = FrameAnnotator::default();
        assert!(!annotator.has_font());
        let overlays = vec![Overlay::Label {
            text: format_score(0.5),
            x: 2.0,
            y: 20.0,
        }];
        let out = annotator.render(black_frame(40, 30), &overlays);
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_builtin_font_draws_label_above_box() {
        let style = AnnotationStyle::default();
        let label_color = style.label_color.0;
        let annotator = FrameAnnotator::new(style).with_font(default_font().unwrap());
        assert!(annotator.has_font());
        let dets = vec![Detection::neural(
            BoundingBox::new(20.0, 60.0, 80.0, 80.0),
            Vec::new(),
            0.95,
        )];

        let out = annotator.annotate(black_frame(200, 200), &dets);

        let mut lit = 0;
        let mut solid = 0;
        for y in 0..58 {
            for x in 0..200 {
                let [r, g, b] = pixel(&out, x, y);
                if g == 0 {
                    continue;
                }
                assert_eq!((r, b), (label_color[0], label_color[2]));
                assert!(x >= 20, "label starts left of its box at x={x}");
                lit += 1;
                if g > 200 {
                    solid += 1;
                }
            }
        }
        assert!(lit > 30, "only {lit} label pixels drawn");
        assert!(solid > 0);
    }

    #[test]
    fn test_load_font_missing_file() {
        let err = load_font(Path::new("/no/such/font.ttf")).unwrap_err();
        assert!(matches!(err, FontError::Read { .. }));
    }

    #[test]
    fn test_load_font_rejects_garbage() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a font").unwrap();
        let err = load_font(file.path()).unwrap_err();
        assert!(matches!(err, FontError::Parse(_)));
    }
}
