// filepath: tests/monitor_properties.rs
//
// 滚动窗口监控器的行为性质：容量、FIFO、分类、离群点、回调隔离

use defi_anomaly_monitor::anomaly_detection::{
    stats, DetectorConfig, EventBus, FnNotifier, MonitorError, MonitorEvent, MonitorState,
    RollingAnomalyMonitor, StatisticsSubscriber,
};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ================================================================================
// 窗口容量与淘汰
// ================================================================================

#[test]
fn test_fifo_eviction_keeps_last_window_size_values() {
    let window_size = 5;
    let k = 7;
    let mut monitor = RollingAnomalyMonitor::with_window(window_size).unwrap();

    let appended: Vec<f64> = (0..window_size + k).map(|i| i as f64).collect();
    for &v in &appended {
        monitor.add_value(v).unwrap();
    }

    assert_eq!(monitor.values(), appended[k..].to_vec());
}

#[test]
fn test_undefined_for_every_query_until_full() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut monitor = RollingAnomalyMonitor::with_window(30).unwrap();

    for _ in 0..29 {
        monitor.add_value(rng.gen_range(-1_000.0..1_000.0)).unwrap();
        assert_eq!(monitor.state(), MonitorState::Undefined);
        assert_eq!(monitor.summary().score, 0.0);
    }
}

// ================================================================================
// 分类
// ================================================================================

#[test]
fn test_flat_series_stability() {
    for value in [0.1, 1.0 / 3.0, 42.0, -7.25, 1e6] {
        let mut monitor = RollingAnomalyMonitor::with_window(25).unwrap();
        for _ in 0..25 {
            monitor.add_value(value).unwrap();
        }
        let summary = monitor.summary();
        assert_eq!(summary.state, MonitorState::Stable, "value {}", value);
        assert_eq!(summary.score, 0.0, "value {}", value);
    }
}

#[test]
fn test_threshold_boundary_stable_then_volatile() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut monitor = RollingAnomalyMonitor::new(DetectorConfig::with_window(30)).unwrap();

    for _ in 0..30 {
        monitor.add_value(rng.gen_range(95.0..=105.0)).unwrap();
    }
    let before = monitor.summary();
    assert_eq!(before.state, MonitorState::Stable);
    assert!(before.score < 1.0);

    for _ in 0..10 {
        monitor.add_value(rng.gen_range(200.0..=250.0)).unwrap();
    }
    assert_eq!(monitor.len(), 30);
    let after = monitor.summary();
    assert_eq!(after.state, MonitorState::Volatile);
    assert!(after.score > 1.0);
    assert!(monitor.is_anomalous());
}

#[test]
fn test_summary_idempotent_without_append() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut monitor = RollingAnomalyMonitor::with_window(12).unwrap();
    for _ in 0..20 {
        monitor.add_value(rng.gen_range(0.0..10.0)).unwrap();
    }

    let first = monitor.summary();
    let second = monitor.summary();
    assert_eq!(first, second);
    assert_eq!(monitor.state(), first.state);
}

// ================================================================================
// 统计函数边界
// ================================================================================

#[test]
fn test_outlier_correctness() {
    let outliers = stats::detect_outliers(
        &[10.0, 10.0, 10.0, 10.0, 100.0],
        stats::DEFAULT_OUTLIER_STD_THRESHOLD,
        stats::DEFAULT_OUTLIER_PCT_THRESHOLD,
    );
    assert_eq!(outliers, vec![100.0]);
}

#[test]
fn test_zero_mean_mad_policy() {
    assert_eq!(stats::mad_ratio(&[-5.0, 0.0, 5.0]).unwrap(), 0.0);
}

#[test]
fn test_zero_mean_windows_with_rounding_stay_stable() {
    let windows: [&[f64]; 4] = [
        &[-0.1, 0.0, 0.1],
        &[-0.7, 0.0, 0.7],
        &[-1.1, 2.2, -2.2, 1.1],
        &[-3.7, 0.0, 0.0, 0.0, 0.0, 3.7],
    ];
    for window in windows {
        let mut monitor = RollingAnomalyMonitor::with_window(window.len()).unwrap();
        for &v in window {
            monitor.add_value(v).unwrap();
        }
        let summary = monitor.summary();
        assert_eq!(summary.state, MonitorState::Stable, "window {:?}", window);
        assert!(summary.score < 1.0, "window {:?}", window);
    }
}

#[test]
fn test_z_axis_holds_at_extreme_magnitudes() {
    // max |z| = 19 / sqrt(20) ≈ 4.25 beats the MAD axis (ratio ≈ 0.17)
    let expected = 19.0 / 20f64.sqrt() / 3.0;
    for scale in [1.0, 1e100, 1e200] {
        let mut monitor = RollingAnomalyMonitor::with_window(20).unwrap();
        for _ in 0..19 {
            monitor.add_value(scale).unwrap();
        }
        monitor.add_value(3.0 * scale).unwrap();

        let summary = monitor.summary();
        assert_eq!(summary.state, MonitorState::Volatile, "scale {}", scale);
        assert!((summary.score - expected).abs() < 1e-9, "scale {}", scale);
        assert_eq!(monitor.check_for_anomalies(), vec![3.0 * scale]);
    }
}

#[test]
fn test_empty_series_split_behavior() {
    assert!(matches!(stats::mean(&[]), Err(MonitorError::EmptySeries)));
    assert_eq!(stats::z_score(&[], 1.0), 0.0);
    assert!(stats::detect_outliers(&[], 3.0, 1.5).is_empty());
}

// ================================================================================
// 通知回调隔离
// ================================================================================

#[test]
fn test_callback_isolation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let notifier = FnNotifier::new("flaky-webhook", move |_: &[f64]| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err("503 Service Unavailable".into())
    });

    let bus = Arc::new(EventBus::new(100));
    let stats = Arc::new(StatisticsSubscriber::new("stats"));
    bus.subscribe(stats.clone());

    let mut monitor = RollingAnomalyMonitor::with_window(5)
        .unwrap()
        .with_notifier(Arc::new(notifier))
        .with_event_bus(bus.clone());
    for v in [10.0, 10.0, 10.0, 10.0, 100.0] {
        monitor.add_value(v).unwrap();
    }

    assert_eq!(monitor.check_for_anomalies(), vec![100.0]);
    assert_eq!(monitor.check_for_anomalies(), vec![100.0]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(monitor.len(), 5);

    let statistics = stats.get_statistics();
    assert_eq!(statistics.anomalies_detected, 2);
    assert_eq!(statistics.notification_failures, 2);

    // 监控器在回调failed后仍可继续写入
    monitor.add_value(10.0).unwrap();
    assert_eq!(monitor.values(), vec![10.0, 10.0, 10.0, 100.0, 10.0]);
}

#[test]
fn test_anomaly_event_carries_outliers() {
    let bus = Arc::new(EventBus::new(10));
    let mut monitor = RollingAnomalyMonitor::with_window(5)
        .unwrap()
        .with_event_bus(bus.clone());
    for v in [10.0, 10.0, 100.0, 10.0, 90.0] {
        monitor.add_value(v).unwrap();
    }

    let outliers = monitor.check_for_anomalies();
    let last = bus.get_recent_events(1);
    match &last[0] {
        MonitorEvent::AnomalyDetected { count, max, outliers: reported, .. } => {
            assert_eq!(*count, outliers.len());
            assert_eq!(*max, 100.0);
            assert_eq!(reported, &outliers);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

// ================================================================================
// Proptest 模糊测试
// ================================================================================

#[cfg(test)]
mod proptest_monitor {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_window_never_exceeds_capacity(
            window_size in 1usize..64,
            values in proptest::collection::vec(-1e6f64..1e6, 0..200)
        ) {
            let mut monitor = RollingAnomalyMonitor::with_window(window_size).unwrap();
            for (i, v) in values.iter().enumerate() {
                monitor.add_value(*v).unwrap();
                prop_assert_eq!(monitor.len(), window_size.min(i + 1));
            }
        }

        #[test]
        fn test_window_is_suffix_of_input(
            window_size in 1usize..32,
            values in proptest::collection::vec(-1e3f64..1e3, 1..100)
        ) {
            let mut monitor = RollingAnomalyMonitor::with_window(window_size).unwrap();
            for v in &values {
                monitor.add_value(*v).unwrap();
            }
            let start = values.len().saturating_sub(window_size);
            prop_assert_eq!(monitor.values(), values[start..].to_vec());
        }

        #[test]
        fn test_state_matches_is_anomalous_when_full(
            values in proptest::collection::vec(1.0f64..1e4, 10)
        ) {
            let mut monitor = RollingAnomalyMonitor::with_window(10).unwrap();
            for v in &values {
                monitor.add_value(*v).unwrap();
            }
            let expected = if monitor.is_anomalous() {
                MonitorState::Volatile
            } else {
                MonitorState::Stable
            };
            prop_assert_eq!(monitor.state(), expected);
            prop_assert_eq!(monitor.summary().state, expected);
        }

        #[test]
        fn test_symmetric_series_has_zero_mad_and_is_stable(
            magnitudes in proptest::collection::vec(1e-3f64..1e3, 1..=4),
            with_zero in any::<bool>(),
            mirrored in any::<bool>()
        ) {
            // [a, -a, b, -b] or [a, b, -b, -a]; at most 9 points keeps max |z| below 3
            let mut series: Vec<f64> = if mirrored {
                magnitudes
                    .iter()
                    .copied()
                    .chain(magnitudes.iter().rev().map(|a| -a))
                    .collect()
            } else {
                magnitudes.iter().flat_map(|&a| [a, -a]).collect()
            };
            if with_zero {
                series.insert(series.len() / 2, 0.0);
            }

            prop_assert_eq!(stats::mad_ratio(&series).unwrap(), 0.0);

            let mut monitor = RollingAnomalyMonitor::with_window(series.len()).unwrap();
            for v in &series {
                monitor.add_value(*v).unwrap();
            }
            prop_assert_eq!(monitor.summary().state, MonitorState::Stable);
        }

        #[test]
        fn test_max_abs_z_score_unchanged_by_power_of_two_scale(
            values in proptest::collection::vec(-1e6f64..1e6, 2..40),
            exponent in -200i32..=200
        ) {
            let factor = 2f64.powi(exponent);
            let scaled: Vec<f64> = values.iter().map(|v| v * factor).collect();
            prop_assert_eq!(
                stats::max_abs_z_score(&scaled).unwrap(),
                stats::max_abs_z_score(&values).unwrap()
            );
        }

        #[test]
        fn test_normalize_minmax_in_unit_range(
            values in proptest::collection::vec(-1e6f64..1e6, 1..50)
        ) {
            for x in stats::normalize_minmax(&values) {
                prop_assert!((0.0..=1.0).contains(&x));
            }
        }
    }
}
