pub mod acquisition_loop;
pub mod acquisition_stats;
pub mod detection_guard;
pub mod detector_selector;
pub mod display_sink;
pub mod pipeline_logger;
