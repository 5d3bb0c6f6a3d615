//! 告警通知接口
//!
//! `check_for_anomalies` 发现离群点时同步调用通知者；
//! 通知者返回的error由监控器记录并吞掉，不影响返回值

use thiserror::Error;
use tracing::warn;

/// 通知者返回的error
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct NotificationError(pub String);

impl From<String> for NotificationError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for NotificationError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// 告警通知者 trait
pub trait AnomalyNotifier: Send + Sync {
    /// 通知者名称（用于日志）
    fn name(&self) -> &str;

    /// 接收离群点列表（按窗口顺序）
    fn notify(&self, outliers: &[f64]) -> Result<(), NotificationError>;
}

/// 闭包通知者
pub struct FnNotifier<F> {
    name: String,
    callback: F,
}

impl<F> FnNotifier<F>
where
    F: Fn(&[f64]) -> Result<(), NotificationError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<F> AnomalyNotifier for FnNotifier<F>
where
    F: Fn(&[f64]) -> Result<(), NotificationError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, outliers: &[f64]) -> Result<(), NotificationError> {
        (self.callback)(outliers)
    }
}

/// 日志通知者 - 把离群点写成 warn 日志
pub struct LogNotifier {
    name: String,
}

impl LogNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AnomalyNotifier for LogNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, outliers: &[f64]) -> Result<(), NotificationError> {
        warn!(
            notifier = self.name.as_str(),
            count = outliers.len(),
            "🚨 anomalous values: {:?}",
            outliers
        );
        Ok(())
    }
}
