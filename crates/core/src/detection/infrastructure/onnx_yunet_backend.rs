use std::fmt;
use std::path::Path;

use ndarray::{Array2, Array4};

use crate::detection::domain::errors::{DetectionError, ModelLoadError};
use crate::detection::domain::neural_backend::NeuralBackend;
use crate::detection::infrastructure::neural_detector::NeuralConfig;
use crate::detection::infrastructure::yunet_decoder::{
    align_to, decode_heads, finalize_rows, StrideHeads, HEAD_KINDS, STRIDES,
};
use crate::shared::constants::NEURAL_ROW_COLUMNS;
use crate::shared::frame::Frame;

/// YuNet run through ONNX Runtime, decoded in Rust.
///
/// Models exported with a dynamic input shape are fed the frame padded to a
/// multiple of 32; fixed-shape exports get the frame resized to their
/// declared size and the rows scaled back afterwards.
pub struct OnnxYunetBackend {
    session: ort::session::Session,
    /// Output index for each (head kind, stride) pair, kind-major.
    head_order: Vec<usize>,
    fixed_input: Option<(u32, u32)>,
    input_size: (u32, u32),
    score_threshold: f32,
    nms_threshold: f32,
    top_k: usize,
}

impl OnnxYunetBackend {
    pub fn new(config: &NeuralConfig) -> Result<Self, ModelLoadError> {
        let path = &config.model_path;
        if !path.is_file() {
            return Err(ModelLoadError::NotFound { path: path.clone() });
        }
        let session = ort::session::Session::builder()
            .map_err(|e| invalid_model(path, e))?
            .with_execution_providers(execution_providers())
            .map_err(|e| invalid_model(path, e))?
            .commit_from_file(path)
            .map_err(|e| invalid_model(path, e))?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        let head_order = resolve_head_order(&output_names).ok_or_else(|| ModelLoadError::Invalid {
            path: path.clone(),
            reason: format!(
                "expected {} outputs, found {}",
                HEAD_KINDS.len() * STRIDES.len(),
                output_names.len()
            ),
        })?;

        // NCHW: [1, 3, H, W]; non-positive dims are dynamic
        let fixed_input = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() == 4 && shape[2] > 0 && shape[3] > 0 {
                    return Some((shape[3] as u32, shape[2] as u32));
                }
            }
            None
        });
        log::info!(
            "Loaded YuNet model {} ({})",
            path.display(),
            match fixed_input {
                Some((w, h)) => format!("fixed input {w}x{h}"),
                None => "dynamic input".to_string(),
            }
        );

        Ok(Self {
            session,
            head_order,
            fixed_input,
            input_size: (config.input_width, config.input_height),
            score_threshold: config.model_score_threshold,
            nms_threshold: config.nms_threshold,
            top_k: config.top_k,
        })
    }

    /// Network input size for the current requested input size.
    fn network_size(&self) -> (u32, u32) {
        match self.fixed_input {
            Some(size) => size,
            None => (
                align_to(self.input_size.0 as usize, 32) as u32,
                align_to(self.input_size.1 as usize, 32) as u32,
            ),
        }
    }
}

fn invalid_model(path: &Path, e: impl fmt::Display) -> ModelLoadError {
    ModelLoadError::Invalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn inference_error(e: impl fmt::Display) -> DetectionError {
    DetectionError::Inference(e.to_string())
}

fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Maps `cls_8 .. kps_32` to output indices, falling back to the export's
/// positional order (all cls, then obj, bbox, kps; strides ascending).
fn resolve_head_order(names: &[String]) -> Option<Vec<usize>> {
    let expected = HEAD_KINDS.len() * STRIDES.len();
    if names.len() < expected {
        return None;
    }
    let by_name: Option<Vec<usize>> = HEAD_KINDS
        .iter()
        .flat_map(|kind| STRIDES.iter().map(move |stride| format!("{kind}_{stride}")))
        .map(|wanted| names.iter().position(|n| *n == wanted))
        .collect();
    Some(by_name.unwrap_or_else(|| (0..expected).collect()))
}

/// Builds a `[1, 3, net_h, net_w]` BGR float tensor.
///
/// The frame is scaled to `content` (nearest neighbour) and placed at the
/// top-left; the remainder stays zero.
fn preprocess(frame: &Frame, content: (u32, u32), network: (u32, u32)) -> Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let (cw, ch) = (content.0 as usize, content.1 as usize);
    let (nw, nh) = (network.0 as usize, network.1 as usize);
    let gray = frame.is_grayscale();

    let mut tensor = Array4::<f32>::zeros((1, 3, nh, nw));
    for y in 0..ch.min(nh) {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / ch as f64) as usize).min(src_h - 1);
        for x in 0..cw.min(nw) {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / cw as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                // RGB -> BGR
                let value = if gray { src[[src_y, src_x, 0]] } else { src[[src_y, src_x, 2 - c]] };
                tensor[[0, c, y, x]] = value as f32;
            }
        }
    }
    tensor
}

impl NeuralBackend for OnnxYunetBackend {
    fn set_input_size(&mut self, width: u32, height: u32) {
        self.input_size = (width, height);
    }

    fn infer(&mut self, frame: &Frame) -> Result<Array2<f32>, DetectionError> {
        if frame.is_empty() {
            return Ok(Array2::zeros((0, NEURAL_ROW_COLUMNS)));
        }
        let (in_w, in_h) = self.input_size;
        let network = self.network_size();
        let (content, scale) = match self.fixed_input {
            Some((nw, nh)) => (
                (nw, nh),
                (in_w as f32 / nw as f32, in_h as f32 / nh as f32),
            ),
            None => ((in_w, in_h), (1.0, 1.0)),
        };

        let input = preprocess(frame, content, network);
        let input_value = ort::value::Tensor::from_array(input).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;

        let mut heads: Vec<Vec<f32>> = Vec::with_capacity(self.head_order.len());
        for &i in &self.head_order {
            let array = outputs[i].try_extract_array::<f32>().map_err(inference_error)?;
            heads.push(array.iter().copied().collect());
        }

        let n = STRIDES.len();
        let views: Vec<StrideHeads<'_>> = (0..n)
            .map(|s| StrideHeads {
                cls: &heads[s],
                obj: &heads[n + s],
                bbox: &heads[2 * n + s],
                kps: &heads[3 * n + s],
            })
            .collect();

        let rows = decode_heads(
            &views,
            (network.0 as usize, network.1 as usize),
            self.score_threshold,
        )?;
        Ok(finalize_rows(rows, scale, self.nms_threshold, self.top_k))
    }
}
