pub mod cascade_model;
pub mod detection;
pub mod detector_kind;
pub mod errors;
pub mod face_detector;
pub mod neural_backend;
