/// Axis-aligned box in pixel coordinates, origin top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

/// Facial keypoint (eye, nose tip or mouth corner).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// One face found in one frame.
///
/// Cascade detectors fill only `bbox`; the neural detector also reports five
/// ordered landmarks (right eye, left eye, nose tip, right mouth corner,
/// left mouth corner) and a confidence score in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub landmarks: Vec<Landmark>,
    pub score: Option<f32>,
}

impl Detection {
    pub fn cascade(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            landmarks: Vec::new(),
            score: None,
        }
    }

    pub fn neural(bbox: BoundingBox, landmarks: Vec<Landmark>, score: f32) -> Self {
        Self {
            bbox,
            landmarks,
            score: Some(score),
        }
    }

    /// Unscored detections always pass.
    pub fn passes(&self, threshold: f32) -> bool {
        self.score.map_or(true, |s| s >= threshold)
    }
}

/// Greedy non-maximum suppression over `(box, score)` candidates.
///
/// Returns indices of kept candidates in descending score order, at most
/// `top_k` of them.
pub fn non_max_suppression(
    candidates: &[(BoundingBox, f32)],
    iou_threshold: f32,
    top_k: usize,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .1
            .partial_cmp(&candidates[a].1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(top_k);

    let mut keep: Vec<usize> = Vec::new();
    for &i in &order {
        let dominated = keep
            .iter()
            .any(|&k| candidates[k].0.iou(&candidates[i].0) > iou_threshold);
        if !dominated {
            keep.push(i);
        }
    }
    keep
}
