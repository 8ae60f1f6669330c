pub mod anomalies;
pub mod logs;
pub mod metrics;
pub mod stream;
pub mod timeline;
