// src/lib.rs

// Rolling-window anomaly detection
pub mod anomaly_detection;

pub use anomaly_detection::{
    stats, DetectorConfig, DeviationSummary, MonitorError, MonitorState, RollingAnomalyMonitor,
};
