//! Risk classification
//!
//! One parameterized classifier mapping a deviation score onto a risk label.
//! Bands are configuration, so callers tune thresholds instead of adding
//! another hard-coded variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::anomaly_detection::errors::{MonitorError, Result};
use crate::anomaly_detection::{DeviationSummary, MonitorState};

/// Risk label derived from a deviation score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLabel {
    /// Activity appears stable
    Low,
    /// Approaching the alert boundary
    Elevated,
    /// At or past the alert boundary
    High,
    /// Far past the alert boundary
    Severe,
}

impl RiskLabel {
    /// Human-readable description for alert feeds
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Severe => "Severe deviation - flag and monitor immediately",
            Self::High => "High risk detected - window exceeds anomaly thresholds",
            Self::Elevated => "Elevated risk - deviation approaching alert boundary",
            Self::Low => "Low risk - activity appears stable",
        }
    }

    /// Check whether the label warrants an alert
    pub fn should_alert(&self) -> bool {
        matches!(self, Self::High | Self::Severe)
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Elevated => "Elevated",
            Self::High => "High",
            Self::Severe => "Severe",
        };
        f.write_str(label)
    }
}

/// Lower bounds (inclusive) of each non-Low band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBands {
    pub elevated: f64,
    pub high: f64,
    pub severe: f64,
}

impl Default for RiskBands {
    /// Deviation-score scale: 1.0 is exactly at the alert boundary
    fn default() -> Self {
        Self {
            elevated: 0.5,
            high: 1.0,
            severe: 2.0,
        }
    }
}

impl RiskBands {
    /// Bands must be finite, non-negative and strictly ascending
    pub fn validate(&self) -> Result<()> {
        let bands = [self.elevated, self.high, self.severe];
        if bands.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(MonitorError::InvalidConfig(format!(
                "risk bands must be finite and non-negative: {:?}",
                self
            )));
        }
        if !(self.elevated < self.high && self.high < self.severe) {
            return Err(MonitorError::InvalidConfig(format!(
                "risk bands must be strictly ascending: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Score-to-label classifier
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    bands: RiskBands,
}

impl RiskClassifier {
    pub fn new(bands: RiskBands) -> Result<Self> {
        bands.validate()?;
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &RiskBands {
        &self.bands
    }

    /// Convert a score to a label
    pub fn classify(&self, score: f64) -> RiskLabel {
        if score >= self.bands.severe {
            RiskLabel::Severe
        } else if score >= self.bands.high {
            RiskLabel::High
        } else if score >= self.bands.elevated {
            RiskLabel::Elevated
        } else {
            RiskLabel::Low
        }
    }

    /// An undefined summary carries no evidence and is always Low
    pub fn classify_summary(&self, summary: &DeviationSummary) -> RiskLabel {
        match summary.state {
            MonitorState::Undefined => RiskLabel::Low,
            _ => self.classify(summary.score),
        }
    }
}
