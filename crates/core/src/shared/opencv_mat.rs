//! Pixel conversions between [`Frame`] and OpenCV `Mat`.
//!
//! OpenCV stores colour as BGR; frames are RGB. Channel order is swapped
//! here and nowhere else.

use image::GrayImage;
use opencv::core::{Mat, Scalar, CV_8UC1, CV_8UC3};
use opencv::prelude::*;

use crate::shared::frame::Frame;

/// Copies an 8-bit BGR, BGRA or single-channel mat into a frame.
///
/// Returns `Ok(None)` for an empty mat.
pub fn mat_to_frame(mat: &Mat, index: usize) -> opencv::Result<Option<Frame>> {
    if mat.empty() || mat.cols() <= 0 || mat.rows() <= 0 {
        return Ok(None);
    }
    let owned;
    let mat = if mat.is_continuous() {
        mat
    } else {
        owned = mat.try_clone()?;
        &owned
    };

    let width = mat.cols() as u32;
    let height = mat.rows() as u32;
    let bytes = mat.data_bytes()?;
    let frame = match mat.channels() {
        1 => Frame::new(bytes.to_vec(), width, height, 1, index),
        channels @ (3 | 4) => {
            let step = channels as usize;
            let rgb = bytes
                .chunks_exact(step)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect();
            Frame::new(rgb, width, height, 3, index)
        }
        other => {
            return Err(opencv::Error::new(
                opencv::core::StsUnsupportedFormat,
                format!("unsupported channel count {other}"),
            ))
        }
    };
    Ok(Some(frame))
}

/// Builds an owned 8-bit BGR mat from an RGB or grayscale frame.
pub fn frame_to_bgr_mat(frame: &Frame) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    let dst = mat.data_bytes_mut()?;
    if frame.is_grayscale() {
        for (px, &v) in dst.chunks_exact_mut(3).zip(frame.data()) {
            px.copy_from_slice(&[v, v, v]);
        }
    } else {
        for (px, src) in dst.chunks_exact_mut(3).zip(frame.data().chunks_exact(3)) {
            px.copy_from_slice(&[src[2], src[1], src[0]]);
        }
    }
    Ok(mat)
}

/// Builds an owned single-channel mat from a luma image.
pub fn gray_to_mat(gray: &GrayImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        gray.height() as i32,
        gray.width() as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
    Ok(mat)
}
