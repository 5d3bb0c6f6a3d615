//! 异常监控error类型
//!
//! 统计函数、监控器构造、通知回调和注册中心共用的error定义

use thiserror::Error;

/// 异常监控error类型
#[derive(Debug, Error)]
pub enum MonitorError {
    /// 统计函数需要至少一个样本
    #[error("Statistic requires a non-empty series")]
    EmptySeries,

    /// 配置error（构造时立即返回）
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 拒绝 NaN / Infinity 观测值
    #[error("Non-finite observation rejected: {0}")]
    NonFiniteObservation(f64),

    /// 通知回调failed（非致命，只记录日志）
    #[error("Notification failed: {notifier} - {message}")]
    NotificationFailed { notifier: String, message: String },

    /// 无效参数
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 监控器未注册
    #[error("Monitor not found: {0}")]
    MonitorNotFound(String),

    /// 监控器重复注册
    #[error("Monitor already registered: {0}")]
    DuplicateMonitor(String),

    /// 序列化/反序列化error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 异常监控结果类型
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// 判断是否为可恢复的error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NonFiniteObservation(_)
                | Self::NotificationFailed { .. }
                | Self::MonitorNotFound(_)
                | Self::InvalidInput(_)
        )
    }

    /// 判断是否为严重error
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::Io(_))
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MonitorError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for MonitorError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
