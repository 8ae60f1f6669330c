pub mod anomaly;
pub mod log;
pub mod metrics;
pub mod timeline;
pub mod xai;
