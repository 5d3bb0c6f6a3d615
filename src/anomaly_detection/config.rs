//! 监控器配置模块
//!
//! 构造时一次性validate，之后不可变；需要修改阈值时重新构造监控器

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::anomaly_detection::errors::{MonitorError, Result};
use crate::anomaly_detection::stats::DEFAULT_OUTLIER_PCT_THRESHOLD;

/// 环境变量：窗口大小
pub const ENV_WINDOW_SIZE: &str = "ANOMALY_WINDOW_SIZE";
/// 环境变量：z-score 阈值
pub const ENV_Z_THRESHOLD: &str = "ANOMALY_Z_THRESHOLD";
/// 环境变量：MAD 比率阈值
pub const ENV_MAD_THRESHOLD: &str = "ANOMALY_MAD_THRESHOLD";
/// 环境变量：均值倍数阈值
pub const ENV_PCT_THRESHOLD: &str = "ANOMALY_PCT_THRESHOLD";

/// 滚动窗口检测配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// 窗口容量（观测值数量）
    pub window_size: usize,

    /// 最大 |z| 超过该值即判定为 Volatile，同时作为离群点的 z 阈值
    pub z_threshold: f64,

    /// MAD / mean 超过该值即判定为 Volatile
    pub mad_threshold: f64,

    /// 离群点的均值倍数阈值（value > mean * pct_threshold）
    pub pct_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            z_threshold: 3.0,
            mad_threshold: 0.25,
            pct_threshold: DEFAULT_OUTLIER_PCT_THRESHOLD,
        }
    }
}

impl DetectorConfig {
    /// 使用指定窗口大小，其余取默认值
    pub fn with_window(window_size: usize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    pub fn z_threshold(mut self, z_threshold: f64) -> Self {
        self.z_threshold = z_threshold;
        self
    }

    pub fn mad_threshold(mut self, mad_threshold: f64) -> Self {
        self.mad_threshold = mad_threshold;
        self
    }

    pub fn pct_threshold(mut self, pct_threshold: f64) -> Self {
        self.pct_threshold = pct_threshold;
        self
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(MonitorError::InvalidConfig(
                "window_size must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("z_threshold", self.z_threshold),
            ("mad_threshold", self.mad_threshold),
            ("pct_threshold", self.pct_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MonitorError::InvalidConfig(format!(
                    "{} must be a finite value greater than 0, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// from文件加载配置（按扩展名选择 JSON 或 TOML）
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from environment variables
    ///
    /// 未设置的变量取默认值；设置了但无法解析的变量返回 `InvalidConfig`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            window_size: env_or(ENV_WINDOW_SIZE, defaults.window_size)?,
            z_threshold: env_or(ENV_Z_THRESHOLD, defaults.z_threshold)?,
            mad_threshold: env_or(ENV_MAD_THRESHOLD, defaults.mad_threshold)?,
            pct_threshold: env_or(ENV_PCT_THRESHOLD, defaults.pct_threshold)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            MonitorError::InvalidConfig(format!("{} has an unparsable value: {:?}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}
