//! 滚动窗口异常监控器 - 主入口
//!
//! 固定容量的 FIFO 窗口 + 按需统计。每次查询都基于完整窗口重新计算，
//! 没有状态历史，也没有去抖动

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::anomaly_detection::{
    config::DetectorConfig,
    errors::{MonitorError, Result},
    events::{EventBus, MonitorEvent},
    notifier::AnomalyNotifier,
    stats, DeviationSummary, MonitorState,
};

/// 滚动窗口异常监控器
///
/// 变更操作需要 `&mut self`；多生产者场景请用锁包裹（见 [`MonitorRegistry`]）。
///
/// [`MonitorRegistry`]: crate::anomaly_detection::MonitorRegistry
pub struct RollingAnomalyMonitor {
    /// 配置（构造后不可变）
    config: DetectorConfig,
    /// 最近的观测值，按时间顺序
    window: VecDeque<f64>,
    /// 告警通知者
    notifier: Option<Arc<dyn AnomalyNotifier>>,
    /// 事件总线
    event_bus: Option<Arc<EventBus>>,
}

impl RollingAnomalyMonitor {
    /// 创建监控器，配置无效时立即返回 `InvalidConfig`
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            window_size = config.window_size,
            z_threshold = config.z_threshold,
            mad_threshold = config.mad_threshold,
            "rolling anomaly monitor created"
        );

        Ok(Self {
            window: VecDeque::with_capacity(config.window_size),
            config,
            notifier: None,
            event_bus: None,
        })
    }

    /// 使用默认阈值和指定窗口大小
    pub fn with_window(window_size: usize) -> Result<Self> {
        Self::new(DetectorConfig::with_window(window_size))
    }

    /// 设置告警通知者
    pub fn with_notifier(mut self, notifier: Arc<dyn AnomalyNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 设置事件总线
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// 写入新观测值，窗口已满时淘汰最旧的值
    ///
    /// 非有限值（NaN / ±Inf）被拒绝，窗口保持不变
    pub fn add_value(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(MonitorError::NonFiniteObservation(value));
        }

        if self.window.len() == self.config.window_size {
            self.window.pop_front();
        }
        self.window.push_back(value);

        self.emit(|| MonitorEvent::ValueRecorded {
            value,
            window_len: self.window.len(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// 当前分类；窗口未满时为 `Undefined`
    pub fn state(&self) -> MonitorState {
        let summary = self.evaluate();
        self.publish_evaluation(&summary);
        summary.state
    }

    /// (state, deviation_score)；窗口未满时分数为 0.0
    pub fn summary(&self) -> DeviationSummary {
        let summary = self.evaluate();
        self.publish_evaluation(&summary);
        summary
    }

    /// 最大 |z| 超过 z 阈值，或 MAD 比率超过 MAD 阈值
    pub fn is_anomalous(&self) -> bool {
        if self.window.is_empty() {
            return false;
        }
        let (max_z, mad) = Self::deviation(&self.snapshot());
        max_z > self.config.z_threshold || mad > self.config.mad_threshold
    }

    /// 提取当前窗口的离群点，非空时同步调用通知者
    ///
    /// 通知失败只记录日志，不影响返回的离群点列表
    pub fn check_for_anomalies(&self) -> Vec<f64> {
        if self.window.is_empty() {
            debug!("[STATUS] no_data");
            self.emit(|| MonitorEvent::NoData { timestamp: Utc::now() });
            return Vec::new();
        }

        let outliers = stats::detect_outliers(
            &self.snapshot(),
            self.config.z_threshold,
            self.config.pct_threshold,
        );

        if outliers.is_empty() {
            debug!(window_len = self.window.len(), "✅ [STATUS] stable");
            self.emit(|| MonitorEvent::WindowStable {
                window_len: self.window.len(),
                timestamp: Utc::now(),
            });
            return outliers;
        }

        let count = outliers.len();
        let max = outliers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        warn!(count, max, "⚠️ [ANOMALY] count={} max={}", count, max);
        self.emit(|| MonitorEvent::AnomalyDetected {
            count,
            max,
            outliers: outliers.clone(),
            timestamp: Utc::now(),
        });

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&outliers) {
                let err = MonitorError::NotificationFailed {
                    notifier: notifier.name().to_string(),
                    message: e.to_string(),
                };
                warn!(error = %err, "⚠️ anomaly notification swallowed");
                self.emit(|| MonitorEvent::NotificationFailed {
                    notifier: notifier.name().to_string(),
                    error: err.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }

        outliers
    }

    // === 只读访问 ===

    /// fetch配置（只读）
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.window_size
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.config.window_size
    }

    /// 窗口快照（按时间顺序）
    pub fn values(&self) -> Vec<f64> {
        self.window.iter().copied().collect()
    }

    /// fetch事件总线
    pub fn event_bus(&self) -> Option<Arc<EventBus>> {
        self.event_bus.clone()
    }

    /// 清空窗口（配置保持不变）
    pub fn clear(&mut self) {
        self.window.clear();
        debug!("🧹 monitor window cleared");
    }

    fn evaluate(&self) -> DeviationSummary {
        if !self.is_full() {
            return DeviationSummary::undefined();
        }

        let (max_z, mad) = Self::deviation(&self.snapshot());
        let state = if max_z > self.config.z_threshold || mad > self.config.mad_threshold {
            MonitorState::Volatile
        } else {
            MonitorState::Stable
        };
        let score = (max_z / self.config.z_threshold).max(mad / self.config.mad_threshold);

        DeviationSummary { state, score }
    }

    /// (max |z|, MAD ratio)；调用方保证窗口非空
    fn deviation(series: &[f64]) -> (f64, f64) {
        let max_z = stats::max_abs_z_score(series).unwrap_or(0.0);
        let mad = stats::mad_ratio(series).unwrap_or(0.0);
        (max_z, mad)
    }

    fn snapshot(&self) -> Cow<'_, [f64]> {
        match self.window.as_slices() {
            (front, []) => Cow::Borrowed(front),
            _ => Cow::Owned(self.values()),
        }
    }

    fn publish_evaluation(&self, summary: &DeviationSummary) {
        self.emit(|| MonitorEvent::StateEvaluated {
            state: summary.state,
            score: summary.score,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: impl FnOnce() -> MonitorEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event());
        }
    }
}

impl std::fmt::Debug for RollingAnomalyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingAnomalyMonitor")
            .field("config", &self.config)
            .field("len", &self.window.len())
            .field("notifier", &self.notifier.as_ref().map(|n| n.name().to_string()))
            .field("event_bus", &self.event_bus.is_some())
            .finish()
    }
}
