//! 监控器注册中心
//!
//! 按名称管理多条数据流的监控器。每个监控器包在独立的 `RwLock` 中：
//! 写入独占，查询可以并发

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

use crate::anomaly_detection::{
    config::DetectorConfig,
    errors::{MonitorError, Result},
    events::EventBus,
    monitor::RollingAnomalyMonitor,
    notifier::AnomalyNotifier,
    DeviationSummary, MonitorState,
};

/// 可跨线程共享的监控器
pub type SharedMonitor = Arc<RwLock<RollingAnomalyMonitor>>;

/// 监控器注册中心
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: RwLock<HashMap<String, SharedMonitor>>,
    /// 新注册的监控器共用的事件总线
    event_bus: Option<Arc<EventBus>>,
    /// 新注册的监控器共用的通知者
    notifier: Option<Arc<dyn AnomalyNotifier>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AnomalyNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 按配置创建并注册监控器
    pub fn register(&self, name: impl Into<String>, config: DetectorConfig) -> Result<SharedMonitor> {
        let mut monitor = RollingAnomalyMonitor::new(config)?;
        if let Some(bus) = &self.event_bus {
            monitor = monitor.with_event_bus(bus.clone());
        }
        if let Some(notifier) = &self.notifier {
            monitor = monitor.with_notifier(notifier.clone());
        }
        self.register_monitor(name, monitor)
    }

    /// 注册已构造好的监控器
    pub fn register_monitor(
        &self,
        name: impl Into<String>,
        monitor: RollingAnomalyMonitor,
    ) -> Result<SharedMonitor> {
        let name = name.into();
        let mut monitors = self.monitors.write();
        if monitors.contains_key(&name) {
            return Err(MonitorError::DuplicateMonitor(name));
        }

        let shared = Arc::new(RwLock::new(monitor));
        monitors.insert(name.clone(), shared.clone());
        info!(monitor = name.as_str(), "✅ monitor registered");
        Ok(shared)
    }

    /// fetch监控器
    pub fn get(&self, name: &str) -> Option<SharedMonitor> {
        self.monitors.read().get(name).cloned()
    }

    /// 写入观测值
    pub fn record(&self, name: &str, value: f64) -> Result<()> {
        self.require(name)?.write().add_value(value)
    }

    /// 单个监控器的摘要
    pub fn summary(&self, name: &str) -> Result<DeviationSummary> {
        Ok(self.require(name)?.read().summary())
    }

    /// Delete监控器
    pub fn remove(&self, name: &str) -> Result<()> {
        self.monitors
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MonitorError::MonitorNotFound(name.to_string()))
    }

    /// 已注册名称（排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.monitors.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.monitors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.read().is_empty()
    }

    /// 按偏差分数降序排列；窗口未满的监控器不参与排名
    pub fn rank_by_severity(&self) -> Vec<(String, DeviationSummary)> {
        let mut ranked: Vec<(String, DeviationSummary)> = self
            .snapshot()
            .into_iter()
            .map(|(name, monitor)| {
                let summary = monitor.read().summary();
                (name, summary)
            })
            .filter(|(_, summary)| summary.state != MonitorState::Undefined)
            .collect();

        ranked.sort_by(|(a_name, a), (b_name, b)| {
            b.score.total_cmp(&a.score).then_with(|| a_name.cmp(b_name))
        });
        ranked
    }

    /// 对所有监控器执行离群点检查，只返回非空结果
    pub fn check_all(&self) -> BTreeMap<String, Vec<f64>> {
        self.snapshot()
            .into_iter()
            .filter_map(|(name, monitor)| {
                let outliers = monitor.read().check_for_anomalies();
                (!outliers.is_empty()).then_some((name, outliers))
            })
            .collect()
    }

    fn require(&self, name: &str) -> Result<SharedMonitor> {
        self.get(name)
            .ok_or_else(|| MonitorError::MonitorNotFound(name.to_string()))
    }

    /// 复制 (name, monitor) 列表后释放注册表锁
    fn snapshot(&self) -> Vec<(String, SharedMonitor)> {
        self.monitors
            .read()
            .iter()
            .map(|(name, monitor)| (name.clone(), monitor.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_record() {
        let registry = MonitorRegistry::new();
        registry.register("sol-price", DetectorConfig::with_window(3)).unwrap();

        for v in [1.0, 2.0, 3.0, 4.0] {
            registry.record("sol-price", v).unwrap();
        }

        let monitor = registry.get("sol-price").unwrap();
        assert_eq!(monitor.read().values(), vec![2.0, 3.0, 4.0]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = MonitorRegistry::new();
        registry.register("volume", DetectorConfig::default()).unwrap();
        let err = registry.register("volume", DetectorConfig::default()).unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateMonitor(name) if name == "volume"));
    }

    #[test]
    fn test_unknown_monitor() {
        let registry = MonitorRegistry::new();
        assert!(matches!(
            registry.record("missing", 1.0),
            Err(MonitorError::MonitorNotFound(_))
        ));
        assert!(matches!(
            registry.summary("missing"),
            Err(MonitorError::MonitorNotFound(_))
        ));
        assert!(matches!(
            registry.remove("missing"),
            Err(MonitorError::MonitorNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_config_not_registered() {
        let registry = MonitorRegistry::new();
        assert!(registry.register("bad", DetectorConfig::with_window(0)).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_and_names() {
        let registry = MonitorRegistry::new();
        registry.register("b", DetectorConfig::default()).unwrap();
        registry.register("a", DetectorConfig::default()).unwrap();
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);

        registry.remove("a").unwrap();
        assert_eq!(registry.names(), vec!["b".to_string()]);
    }
}
