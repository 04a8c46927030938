use image::Rgb;

use crate::detection::domain::detection::{BoundingBox, Detection};

/// Drawing style shared by every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationStyle {
    pub box_color: Rgb<u8>,
    /// Outline width for unscored cascade boxes.
    pub cascade_box_thickness: u32,
    /// Outline width for scored neural boxes.
    pub neural_box_thickness: u32,
    pub landmark_color: Rgb<u8>,
    pub landmark_radius: i32,
    pub label_color: Rgb<u8>,
    /// Label glyph height in pixels.
    pub label_scale: f32,
    /// Gap between the label baseline and the top edge of its box.
    pub label_offset: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_color: Rgb([0, 255, 0]),
            cascade_box_thickness: 3,
            neural_box_thickness: 2,
            landmark_color: Rgb([255, 0, 0]),
            landmark_radius: 2,
            label_color: Rgb([0, 255, 0]),
            label_scale: 18.0,
            label_offset: 5.0,
        }
    }
}

/// One drawing primitive, in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    Rectangle { bbox: BoundingBox, thickness: u32 },
    Point { x: f32, y: f32, radius: i32 },
    /// `(x, y)` is the left end of the text baseline.
    Label { text: String, x: f32, y: f32 },
}

pub fn format_score(score: f32) -> String {
    format!("Conf: {score:.2}")
}

/// Translates detections into overlays: a box each, a point per landmark,
/// and a score label above the box when the detection is scored.
pub fn overlays_for(detections: &[Detection], style: &AnnotationStyle) -> Vec<Overlay> {
    let mut overlays = Vec::with_capacity(detections.len() * 7);
    for detection in detections {
        let thickness = if detection.score.is_some() {
            style.neural_box_thickness
        } else {
            style.cascade_box_thickness
        };
        overlays.push(Overlay::Rectangle {
            bbox: detection.bbox,
            thickness,
        });
        overlays.extend(detection.landmarks.iter().map(|lm| Overlay::Point {
            x: lm.x,
            y: lm.y,
            radius: style.landmark_radius,
        }));
        if let Some(score) = detection.score {
            overlays.push(Overlay::Label {
                text: format_score(score),
                x: detection.bbox.x,
                y: detection.bbox.y - style.label_offset,
            });
        }
    }
    overlays
}
