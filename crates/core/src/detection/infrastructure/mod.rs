pub mod cascade_detector;
pub mod cascade_loader_factory;
pub mod neural_backend_factory;
pub mod neural_detector;
pub mod onnx_yunet_backend;
#[cfg(feature = "opencv")]
pub mod opencv_cascade;
#[cfg(feature = "opencv")]
pub mod opencv_yunet_backend;
pub mod yunet_decoder;
