//! Decoding of the raw multi-stride YuNet heads into face rows.
//!
//! The network predicts, for every cell of three feature maps (strides 8, 16
//! and 32 over a 32-aligned input), a class score, an objectness score, box
//! offsets and five landmark offsets. Each cell decodes to one
//! `[x, y, w, h, 10 landmark coords, score]` row.

use ndarray::Array2;

use crate::detection::domain::detection::{non_max_suppression, BoundingBox};
use crate::detection::domain::errors::DetectionError;
use crate::shared::constants::NEURAL_ROW_COLUMNS;

pub const STRIDES: [usize; 3] = [8, 16, 32];

/// Head kinds in the order they are looked up per stride.
pub const HEAD_KINDS: [&str; 4] = ["cls", "obj", "bbox", "kps"];

/// The four head outputs of one stride, flattened row-major over the cell grid.
pub struct StrideHeads<'a> {
    pub cls: &'a [f32],
    pub obj: &'a [f32],
    pub bbox: &'a [f32],
    pub kps: &'a [f32],
}

pub fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Decodes every cell whose score reaches `score_threshold`.
///
/// `padded` is the network input size `(width, height)`; both must be
/// multiples of 32.
pub fn decode_heads(
    heads: &[StrideHeads<'_>],
    padded: (usize, usize),
    score_threshold: f32,
) -> Result<Vec<[f32; NEURAL_ROW_COLUMNS]>, DetectionError> {
    if heads.len() != STRIDES.len() {
        return Err(DetectionError::Inference(format!(
            "expected {} stride groups, got {}",
            STRIDES.len(),
            heads.len()
        )));
    }
    let (pad_w, pad_h) = padded;
    if pad_w % 32 != 0 || pad_h % 32 != 0 {
        return Err(DetectionError::Inference(format!(
            "input {pad_w}x{pad_h} is not 32-aligned"
        )));
    }

    let mut rows = Vec::new();
    for (head, &stride) in heads.iter().zip(STRIDES.iter()) {
        let cols = pad_w / stride;
        let cells = cols * (pad_h / stride);
        check_len("cls", head.cls.len(), cells)?;
        check_len("obj", head.obj.len(), cells)?;
        check_len("bbox", head.bbox.len(), cells * 4)?;
        check_len("kps", head.kps.len(), cells * 10)?;

        let s = stride as f32;
        for idx in 0..cells {
            let score = (head.cls[idx].clamp(0.0, 1.0) * head.obj[idx].clamp(0.0, 1.0)).sqrt();
            if !score.is_finite() || score < score_threshold {
                continue;
            }
            let col = (idx % cols) as f32;
            let row = (idx / cols) as f32;

            let b = &head.bbox[idx * 4..idx * 4 + 4];
            let cx = (col + b[0]) * s;
            let cy = (row + b[1]) * s;
            let w = b[2].exp() * s;
            let h = b[3].exp() * s;

            let mut out = [0f32; NEURAL_ROW_COLUMNS];
            out[0] = cx - w / 2.0;
            out[1] = cy - h / 2.0;
            out[2] = w;
            out[3] = h;
            let k = &head.kps[idx * 10..idx * 10 + 10];
            for lm in 0..5 {
                out[4 + lm * 2] = (k[lm * 2] + col) * s;
                out[5 + lm * 2] = (k[lm * 2 + 1] + row) * s;
            }
            out[NEURAL_ROW_COLUMNS - 1] = score;
            rows.push(out);
        }
    }
    Ok(rows)
}

fn check_len(head: &str, actual: usize, expected: usize) -> Result<(), DetectionError> {
    if actual != expected {
        return Err(DetectionError::Inference(format!(
            "{head} head has {actual} values, expected {expected}"
        )));
    }
    Ok(())
}

/// Scales decoded rows into the caller's coordinate space, then keeps the
/// `top_k` best after non-maximum suppression.
pub fn finalize_rows(
    mut rows: Vec<[f32; NEURAL_ROW_COLUMNS]>,
    scale: (f32, f32),
    nms_threshold: f32,
    top_k: usize,
) -> Array2<f32> {
    let (sx, sy) = scale;
    for row in rows.iter_mut() {
        for i in (0..NEURAL_ROW_COLUMNS - 1).step_by(2) {
            row[i] *= sx;
            row[i + 1] *= sy;
        }
    }

    let candidates: Vec<(BoundingBox, f32)> = rows
        .iter()
        .map(|r| (BoundingBox::new(r[0], r[1], r[2], r[3]), r[NEURAL_ROW_COLUMNS - 1]))
        .collect();
    let keep = non_max_suppression(&candidates, nms_threshold, top_k);

    let mut out = Array2::<f32>::zeros((keep.len(), NEURAL_ROW_COLUMNS));
    for (dst, &src) in keep.iter().enumerate() {
        for (c, &v) in rows[src].iter().enumerate() {
            out[[dst, c]] = v;
        }
    }
    out
}
