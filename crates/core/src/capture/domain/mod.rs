pub mod capture_backend;
pub mod frame_source;
