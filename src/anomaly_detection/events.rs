//! 事件系统模块
//!
//! 监控器不直接写全局日志，而是把事件发布到注入的 [`EventBus`]，
//! 由订阅者决定如何记录或统计

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::anomaly_detection::MonitorState;

/// 监控事件
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// 新观测值写入窗口
    ValueRecorded {
        value: f64,
        window_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// 窗口状态评估（state / summary）
    StateEvaluated {
        state: MonitorState,
        score: f64,
        timestamp: DateTime<Utc>,
    },

    /// 发现离群点
    AnomalyDetected {
        count: usize,
        max: f64,
        outliers: Vec<f64>,
        timestamp: DateTime<Utc>,
    },

    /// 检查完成，无离群点
    WindowStable {
        window_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// 窗口为空，无法检查
    NoData { timestamp: DateTime<Utc> },

    /// 通知回调failed
    NotificationFailed {
        notifier: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// fetch事件类型名称
    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::ValueRecorded { .. } => "value_recorded",
            MonitorEvent::StateEvaluated { .. } => "state_evaluated",
            MonitorEvent::AnomalyDetected { .. } => "anomaly_detected",
            MonitorEvent::WindowStable { .. } => "window_stable",
            MonitorEvent::NoData { .. } => "no_data",
            MonitorEvent::NotificationFailed { .. } => "notification_failed",
        }
    }

    /// fetch事件时间戳
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MonitorEvent::ValueRecorded { timestamp, .. }
            | MonitorEvent::StateEvaluated { timestamp, .. }
            | MonitorEvent::AnomalyDetected { timestamp, .. }
            | MonitorEvent::WindowStable { timestamp, .. }
            | MonitorEvent::NoData { timestamp }
            | MonitorEvent::NotificationFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// 事件订阅者 trait
pub trait EventSubscriber: Send + Sync {
    /// 处理事件
    fn on_event(&self, event: &MonitorEvent);

    /// fetch订阅者名称
    fn name(&self) -> &str;

    /// fetch感兴趣的事件类型（空表示全部）
    fn interested_events(&self) -> Vec<&'static str> {
        vec![]
    }
}

/// 事件总线
pub struct EventBus {
    subscribers: Mutex<Vec<Arc<dyn EventSubscriber>>>,
    event_buffer: Mutex<VecDeque<MonitorEvent>>,
    buffer_size: usize,
}

impl EventBus {
    /// 创建新的事件总线
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            event_buffer: Mutex::new(VecDeque::with_capacity(buffer_size)),
            buffer_size,
        }
    }

    /// 带日志订阅者的事件总线
    pub fn with_logging() -> Self {
        let bus = Self::default();
        bus.subscribe(Arc::new(LoggingSubscriber::new("logging")));
        bus
    }

    /// 订阅事件
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.lock().push(subscriber);
    }

    /// Cancel订阅
    pub fn unsubscribe(&self, subscriber_name: &str) {
        self.subscribers.lock().retain(|s| s.name() != subscriber_name);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// 发布事件
    pub fn publish(&self, event: MonitorEvent) {
        if self.buffer_size > 0 {
            let mut buffer = self.event_buffer.lock();
            if buffer.len() >= self.buffer_size {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());
        }

        // 先复制订阅者列表，订阅者内部可以再次访问总线
        let subscribers: Vec<_> = self.subscribers.lock().clone();
        for subscriber in subscribers {
            let interested = subscriber.interested_events();
            if interested.is_empty() || interested.contains(&event.event_type()) {
                subscriber.on_event(&event);
            }
        }
    }

    /// fetch最近的事件
    pub fn get_recent_events(&self, count: usize) -> Vec<MonitorEvent> {
        let buffer = self.event_buffer.lock();
        let start = buffer.len().saturating_sub(count);
        buffer.iter().skip(start).cloned().collect()
    }

    /// 清空事件缓冲区
    pub fn clear_buffer(&self) {
        self.event_buffer.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// 日志订阅者 - 将事件记录到 tracing
pub struct LoggingSubscriber {
    name: String,
}

impl LoggingSubscriber {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EventSubscriber for LoggingSubscriber {
    fn on_event(&self, event: &MonitorEvent) {
        use tracing::{debug, info, warn};

        let at = event.timestamp().to_rfc3339();
        match event {
            MonitorEvent::ValueRecorded { value, window_len, .. } => {
                debug!(value, window_len, "[EVENT] latest_value={} @{}", value, at);
            }
            MonitorEvent::StateEvaluated { state, score, .. } => match state {
                MonitorState::Volatile => warn!(
                    state = %state,
                    score = %format!("{:.3}", score),
                    "[VOLATILE] deviation_score={:.3} @{}", score, at
                ),
                _ => info!(
                    state = %state,
                    score = %format!("{:.3}", score),
                    "[{}] deviation_score={:.3} @{}", state.label(), score, at
                ),
            },
            MonitorEvent::AnomalyDetected { count, max, .. } => {
                warn!(count, max, "[ANOMALY] count={} max={} @{}", count, max, at);
            }
            MonitorEvent::WindowStable { window_len, .. } => {
                info!(window_len, "[STATUS] stable @{}", at);
            }
            MonitorEvent::NoData { .. } => {
                info!("[STATUS] no_data @{}", at);
            }
            MonitorEvent::NotificationFailed { notifier, error, .. } => {
                warn!(
                    notifier = notifier.as_str(),
                    error = error.as_str(),
                    "[NOTIFY] notification failed @{}", at
                );
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 统计订阅者 - 收集统计信息
pub struct StatisticsSubscriber {
    name: String,
    stats: Mutex<MonitorStatistics>,
}

impl StatisticsSubscriber {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stats: Mutex::new(MonitorStatistics::default()),
        }
    }

    pub fn get_statistics(&self) -> MonitorStatistics {
        self.stats.lock().clone()
    }

    pub fn reset_statistics(&self) {
        *self.stats.lock() = MonitorStatistics::default();
    }
}

impl EventSubscriber for StatisticsSubscriber {
    fn on_event(&self, event: &MonitorEvent) {
        let mut stats = self.stats.lock();

        match event {
            MonitorEvent::ValueRecorded { .. } => stats.values_recorded += 1,
            MonitorEvent::StateEvaluated { state, .. } => {
                stats.evaluations += 1;
                if *state == MonitorState::Volatile {
                    stats.volatile_evaluations += 1;
                }
            }
            MonitorEvent::AnomalyDetected { count, .. } => {
                stats.anomalies_detected += 1;
                stats.outliers_reported += *count as u64;
            }
            MonitorEvent::NotificationFailed { .. } => stats.notification_failures += 1,
            _ => {}
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn interested_events(&self) -> Vec<&'static str> {
        vec![
            "value_recorded",
            "state_evaluated",
            "anomaly_detected",
            "notification_failed",
        ]
    }
}

/// 监控统计信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorStatistics {
    pub values_recorded: u64,
    pub evaluations: u64,
    pub volatile_evaluations: u64,
    pub anomalies_detected: u64,
    pub outliers_reported: u64,
    pub notification_failures: u64,
}

impl MonitorStatistics {
    pub fn volatile_rate(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.volatile_evaluations as f64 / self.evaluations as f64
        }
    }
}
