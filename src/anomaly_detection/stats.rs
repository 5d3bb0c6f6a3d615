//! Statistics kit for rolling-window anomaly detection
//!
//! Pure functions over `&[f64]` snapshots. Callers materialize the window
//! before calling; nothing here holds state.
//!
//! Empty-input behavior is per function: `mean`, `stdev`, `max_abs_z_score`
//! and `mad_ratio` fail with [`MonitorError::EmptySeries`], while `z_score`,
//! `normalize_minmax` and `detect_outliers` return a neutral value.
//!
//! Every statistic is computed on a copy of the series rescaled by a power of
//! two so the largest magnitude sits near 1.0. The rescale is exact, keeps
//! squared deviations finite for any finite input, and leaves the scale-free
//! results (`z`, MAD ratio, min-max) bit-for-bit unchanged.

use std::borrow::Cow;

use crate::anomaly_detection::errors::{MonitorError, Result};

/// Standard deviation reported in place of an exact zero.
pub const STDEV_FLOOR: f64 = 1e-9;

/// Default z-score multiple for outlier extraction.
pub const DEFAULT_OUTLIER_STD_THRESHOLD: f64 = 3.0;

/// Default percent-of-mean multiple for outlier extraction.
pub const DEFAULT_OUTLIER_PCT_THRESHOLD: f64 = 1.5;

/// Arithmetic mean.
///
/// A constant series returns its value exactly; otherwise the sum is
/// compensated, so a series whose exact mean is zero (e.g. `[-a, 0, a]`)
/// yields `0.0`.
pub fn mean(series: &[f64]) -> Result<f64> {
    if series.is_empty() {
        return Err(MonitorError::EmptySeries);
    }
    let (scaled, factor) = rescaled(series);
    Ok(exact_mean(&scaled) / factor)
}

/// Sample standard deviation (n - 1 denominator).
///
/// Returns [`STDEV_FLOOR`] instead of `0.0` for a flat or single-point series.
pub fn stdev(series: &[f64]) -> Result<f64> {
    if series.is_empty() {
        return Err(MonitorError::EmptySeries);
    }
    let (scaled, factor) = rescaled(series);
    let sigma = sample_stdev(&scaled, exact_mean(&scaled));
    Ok(if sigma == 0.0 { STDEV_FLOOR } else { sigma / factor })
}

/// Z-score of `value` against `series`; `0.0` when the series has fewer than two points.
pub fn z_score(series: &[f64], value: f64) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let (scaled, factor) = rescaled(series);
    let mu = exact_mean(&scaled);
    let sigma = sample_stdev(&scaled, mu);
    if sigma == 0.0 {
        return (value - mu / factor) / STDEV_FLOOR;
    }
    (value * factor - mu) / sigma
}

/// Largest `|z|` of any point, each scored against the whole series including itself.
pub fn max_abs_z_score(series: &[f64]) -> Result<f64> {
    if series.is_empty() {
        return Err(MonitorError::EmptySeries);
    }
    if series.len() < 2 {
        return Ok(0.0);
    }
    let (scaled, _) = rescaled(series);
    let mu = exact_mean(&scaled);
    let sigma = sample_stdev(&scaled, mu);
    if sigma == 0.0 {
        return Ok(0.0);
    }
    Ok(scaled
        .iter()
        .map(|x| ((x - mu) / sigma).abs())
        .fold(0.0, f64::max))
}

/// Mean absolute deviation divided by the mean; `0.0` when the mean is zero.
///
/// A mean within summation rounding of zero counts as zero, so the sign of a
/// rounding residue never decides the result.
pub fn mad_ratio(series: &[f64]) -> Result<f64> {
    if series.is_empty() {
        return Err(MonitorError::EmptySeries);
    }
    let (scaled, _) = rescaled(series);
    let mu = exact_mean(&scaled);
    if is_zero_mean(&scaled, mu) {
        return Ok(0.0);
    }
    let mad = scaled.iter().map(|x| (x - mu).abs()).sum::<f64>() / scaled.len() as f64;
    Ok(mad / mu)
}

/// Rescale every element to `[0, 1]`; a constant series maps to all zeros.
pub fn normalize_minmax(series: &[f64]) -> Vec<f64> {
    let (scaled, _) = rescaled(series);
    let Some((min, max)) = min_max(&scaled) else {
        return Vec::new();
    };
    if max == min {
        return vec![0.0; series.len()];
    }
    let range = max - min;
    scaled.iter().map(|x| (x - min) / range).collect()
}

/// Values flagged by either criterion: `z > std_threshold` or `value > mean * pct_threshold`.
///
/// Input order and duplicates are preserved.
pub fn detect_outliers(series: &[f64], std_threshold: f64, pct_threshold: f64) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }
    let (scaled, _) = rescaled(series);
    let mu = exact_mean(&scaled);
    // z_score() is defined as 0.0 below two points and for a flat series
    let sigma = (scaled.len() >= 2)
        .then(|| sample_stdev(&scaled, mu))
        .filter(|s| *s > 0.0);

    series
        .iter()
        .zip(scaled.iter())
        .filter(|&(_, &x)| {
            let z = sigma.map_or(0.0, |s| (x - mu) / s);
            z > std_threshold || x > mu * pct_threshold
        })
        .map(|(&value, _)| value)
        .collect()
}

// === 辅助指标 ===

/// Exponential moving average seeded with the first element.
pub fn exponential_moving_average(series: &[f64], alpha: f64) -> Result<Vec<f64>> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(MonitorError::InvalidInput(format!(
            "EMA alpha must be in (0, 1], got {}",
            alpha
        )));
    }
    let mut ema: Vec<f64> = Vec::with_capacity(series.len());
    for &x in series {
        let next = match ema.last() {
            Some(&prev) => alpha * x + (1.0 - alpha) * prev,
            None => x,
        };
        ema.push(next);
    }
    Ok(ema)
}

/// Mean of every contiguous window of length `window`.
pub fn rolling_average(series: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window > series.len() {
        return Vec::new();
    }
    series
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Weighted mean; `0.0` on mismatched or empty inputs or a zero weight sum.
pub fn weighted_average(values: &[f64], weights: &[f64]) -> f64 {
    if values.is_empty() || values.len() != weights.len() {
        return 0.0;
    }
    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total_weight
}

/// Percent change of `current` relative to `baseline`; `0.0` for a zero baseline.
pub fn spike_score(current: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    (current - baseline) / baseline * 100.0
}

/// Indices whose min-max normalized value exceeds `threshold`.
pub fn peak_indices(series: &[f64], threshold: f64) -> Vec<usize> {
    normalize_minmax(series)
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Power-of-two factor bringing the largest magnitude into `[1, 2)`.
fn unit_factor(series: &[f64]) -> f64 {
    let peak = series.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return 1.0;
    }
    let exponent = (peak.log2().floor() as i32).clamp(-1022, 1022);
    2f64.powi(-exponent)
}

/// The series multiplied by [`unit_factor`], plus the factor applied.
fn rescaled(series: &[f64]) -> (Cow<'_, [f64]>, f64) {
    let factor = unit_factor(series);
    if factor == 1.0 {
        (Cow::Borrowed(series), factor)
    } else {
        (Cow::Owned(series.iter().map(|x| x * factor).collect()), factor)
    }
}

/// Flat series short-circuit, else Neumaier-compensated `sum / n`.
fn exact_mean(series: &[f64]) -> f64 {
    match min_max(series) {
        Some((lo, hi)) if lo == hi => lo,
        Some(_) => compensated_sum(series) / series.len() as f64,
        None => 0.0,
    }
}

fn compensated_sum(series: &[f64]) -> f64 {
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for &x in series {
        let t = sum + x;
        if sum.abs() >= x.abs() {
            compensation += (sum - t) + x;
        } else {
            compensation += (x - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

/// `|mean|` below the rounding bound of summing the series
fn is_zero_mean(series: &[f64], mu: f64) -> bool {
    mu == 0.0 || mu.abs() <= f64::EPSILON * series.iter().map(|x| x.abs()).sum::<f64>()
}

/// Sample standard deviation of an already rescaled series; `0.0` when flat
/// or below two points.
fn sample_stdev(series: &[f64], mu: f64) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let variance =
        series.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (series.len() - 1) as f64;
    variance.sqrt()
}

fn min_max(series: &[f64]) -> Option<(f64, f64)> {
    let first = *series.first()?;
    Some(
        series
            .iter()
            .fold((first, first), |(lo, hi), &x| (lo.min(x), hi.max(x))),
    )
}
