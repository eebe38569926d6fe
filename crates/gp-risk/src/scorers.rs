//! Category scorers for the non-market risk types.
//!
//! Each scorer is a pure function of its signal series (newest-first) and
//! collapses it into a score in `[0, 1]`, so results are reproducible for
//! the same input snapshot. Empty series score 0.0; the calculator flags
//! those metrics as degraded.

use gp_types::{RiskType, SignalPoint};

/// Target liquidity coverage ratio; coverage at or above it scores zero risk.
const LIQUIDITY_COVERAGE_TARGET: f64 = 1.5;

/// How many recent compliance observations the regulatory scorer inspects.
const REGULATORY_WINDOW: usize = 12;

/// Per-step decay applied to weather forecast severities further out.
const WEATHER_DECAY: f64 = 0.9;

/// Smoothing factor for the technical failure-rate average.
const TECHNICAL_ALPHA: f64 = 0.3;

/// Dispatch to the scorer for the given category.
///
/// `Market` is handled by historical simulation in the metric calculator and
/// is not a valid input here; it scores 0.0 defensively rather than
/// panicking.
pub fn score(risk_type: RiskType, series: &[SignalPoint]) -> f64 {
    match risk_type {
        RiskType::Market => 0.0,
        RiskType::Credit => credit_score(series),
        RiskType::Operational => operational_score(series),
        RiskType::Liquidity => liquidity_score(series),
        RiskType::Regulatory => regulatory_score(series),
        RiskType::Weather => weather_score(series),
        RiskType::Technical => technical_score(series),
    }
}

/// Credit exposure: recency-weighted mean of exposure utilization.
pub fn credit_score(series: &[SignalPoint]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (i, point) in series.iter().enumerate() {
        let weight = 1.0 / (i as f64 + 1.0);
        weighted += weight * point.value;
        total += weight;
    }
    (weighted / total).clamp(0.0, 1.0)
}

/// Operational incidents: mean incident rate mapped through a saturating
/// exponential so occasional incidents stay mid-scale.
pub fn operational_score(series: &[SignalPoint]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let rate = series.iter().map(|p| p.value.max(0.0)).sum::<f64>() / series.len() as f64;
    (1.0 - (-rate).exp()).clamp(0.0, 1.0)
}

/// Liquidity coverage: shortfall of the recency-weighted coverage ratio
/// against the target.
pub fn liquidity_score(series: &[SignalPoint]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (i, point) in series.iter().enumerate() {
        let weight = 1.0 / (i as f64 + 1.0);
        weighted += weight * point.value.max(0.0);
        total += weight;
    }
    let coverage = weighted / total;
    (1.0 - coverage / LIQUIDITY_COVERAGE_TARGET).clamp(0.0, 1.0)
}

/// Regulatory compliance: the worst compliance signal in the recent window
/// drives the score (compliance 1.0 = fully compliant).
pub fn regulatory_score(series: &[SignalPoint]) -> f64 {
    let window = &series[..series.len().min(REGULATORY_WINDOW)];
    let worst = window
        .iter()
        .map(|p| p.value.clamp(0.0, 1.0))
        .fold(f64::INFINITY, f64::min);
    if worst.is_finite() {
        1.0 - worst
    } else {
        0.0
    }
}

/// Weather forecast severity: near-term forecasts dominate, further-out ones
/// decay geometrically.
pub fn weather_score(series: &[SignalPoint]) -> f64 {
    series
        .iter()
        .enumerate()
        .map(|(i, p)| p.value.clamp(0.0, 1.0) * WEATHER_DECAY.powi(i as i32))
        .fold(0.0, f64::max)
}

/// Technical failure rate: exponentially weighted average, oldest to newest,
/// so persistent failures accumulate while one-offs wash out.
pub fn technical_score(series: &[SignalPoint]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let mut ewma = 0.0;
    for point in series.iter().rev() {
        ewma = TECHNICAL_ALPHA * point.value.clamp(0.0, 1.0) + (1.0 - TECHNICAL_ALPHA) * ewma;
    }
    ewma.clamp(0.0, 1.0)
}
