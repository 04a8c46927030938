pub mod constants;
pub mod frame;
#[cfg(feature = "opencv")]
pub mod opencv_mat;
