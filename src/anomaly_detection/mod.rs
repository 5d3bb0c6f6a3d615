//! 滚动窗口异常检测模块
//!
//! 固定容量窗口上的流式统计异常检测：
//! - 📊 无状态统计函数（mean / stdev / z-score / MAD 比率 / 离群点）
//! - 🪟 有界 FIFO 窗口监控器，按需分类为 Undefined / Stable / Volatile
//! - 🔔 可选的同步告警通知，失败不影响监控器状态
//! - 📡 注入式事件总线，替代全局日志配置
//! - 🗂️ 多数据流注册中心与风险分级

pub mod config;
pub mod errors;
pub mod events;
pub mod monitor;
pub mod notifier;
pub mod registry;
pub mod risk;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use config::DetectorConfig;
pub use errors::{MonitorError, Result};
pub use events::{
    EventBus, EventSubscriber, LoggingSubscriber, MonitorEvent, MonitorStatistics,
    StatisticsSubscriber,
};
pub use monitor::RollingAnomalyMonitor;
pub use notifier::{AnomalyNotifier, FnNotifier, LogNotifier, NotificationError};
pub use registry::{MonitorRegistry, SharedMonitor};
pub use risk::{RiskBands, RiskClassifier, RiskLabel};

/// 窗口分类状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    /// 窗口未满，历史数据不足
    Undefined,
    /// 窗口已满，两个偏差指标均未超过阈值
    Stable,
    /// 窗口已满，z-score 或 MAD 比率超过阈值
    Volatile,
}

impl MonitorState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Stable => "STABLE",
            Self::Volatile => "VOLATILE",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 偏差摘要（每次查询重新计算，不缓存）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationSummary {
    /// 分类状态
    pub state: MonitorState,
    /// 归一化严重度：max(max|z| / z_threshold, mad_ratio / mad_threshold)，1.0 即告警边界
    pub score: f64,
}

impl DeviationSummary {
    /// 窗口未满时的摘要
    pub fn undefined() -> Self {
        Self {
            state: MonitorState::Undefined,
            score: 0.0,
        }
    }

    /// 是否处于告警边界之上
    pub fn is_volatile(&self) -> bool {
        self.state == MonitorState::Volatile
    }
}
