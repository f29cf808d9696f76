//! Cross-symbol trend consensus.
//!
//! Per symbol: an OLS slope over the recent window, normalised to a
//! scale-free per-second return, then EWMA-smoothed along with its variance.
//! Across symbols: a weighted blend of the smoothed slopes plus a confidence
//! derived from how much the symbols agree.

use fnv::FnvHashMap;
use smol_str::SmolStr;

use gaugestream_feed::tick::Symbol;

use crate::series::SeriesPoint;

/// Least-squares slope of value over time, with timestamps shifted to the
/// window origin so large epoch values do not destroy precision.
pub fn ols_slope(points: &[SeriesPoint]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let origin = points[0].timestamp;
    let n = points.len() as f64;

    let mut sum_t = 0.0;
    let mut sum_v = 0.0;
    let mut sum_tt = 0.0;
    let mut sum_tv = 0.0;
    for point in points {
        let t = point.timestamp - origin;
        sum_t += t;
        sum_v += point.value;
        sum_tt += t * t;
        sum_tv += t * point.value;
    }

    let denominator = n * sum_tt - sum_t * sum_t;
    if denominator.abs() < 1e-12 {
        // All samples at one timestamp.
        return None;
    }
    Some((n * sum_tv - sum_t * sum_v) / denominator)
}

/// Slope as a fraction of the mean price per second, so symbols at different
/// price levels compare on one scale.
pub fn normalized_slope(points: &[SeriesPoint]) -> Option<f64> {
    let slope = ols_slope(points)?;
    let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
    if mean.abs() < 1e-12 {
        return None;
    }
    Some(slope / mean.abs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendLabel {
    StrongDown,
    Down,
    Flat,
    Up,
    StrongUp,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::StrongDown => "strong-down",
            TrendLabel::Down => "down",
            TrendLabel::Flat => "flat",
            TrendLabel::Up => "up",
            TrendLabel::StrongUp => "strong-up",
        }
    }
}

/// Blended view across the tracked symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSnapshot {
    /// Weighted mean of the smoothed normalised slopes, scaled by
    /// `full_scale` and clamped onto -1..1.
    pub index: f64,
    /// Weighted mean absolute slope on the same scale, clamped onto 0..1.
    pub strength: f64,
    /// Blend of cross-symbol sign agreement and inverse smoothed variance,
    /// 0..1.
    pub confidence: f64,
    pub label: TrendLabel,
    /// Symbols contributing to this snapshot.
    pub members: Vec<Symbol>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendWeighting {
    #[default]
    Equal,
    /// Weight each symbol by the inverse of its smoothed slope variance, so
    /// noisy symbols contribute less.
    InverseVolatility,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendConfig {
    /// EWMA rate for the smoothed slope and its variance.
    pub smoothing: f64,
    pub weighting: TrendWeighting,
    /// |index| below which the label reads Flat.
    pub flat_threshold: f64,
    /// |index| at which the label reads strong.
    pub strong_threshold: f64,
    /// Normalised per-second slope mapping onto index magnitude 1.0.
    pub full_scale: f64,
    /// Slope variance at which the variance half of confidence drops to 0.5.
    pub variance_scale: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.3,
            weighting: TrendWeighting::Equal,
            flat_threshold: 0.05,
            strong_threshold: 0.5,
            full_scale: 1e-4,
            variance_scale: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SlopeTracker {
    smoothed: Option<f64>,
    variance: f64,
}

impl SlopeTracker {
    fn observe(&mut self, slope: f64, rate: f64) {
        match self.smoothed {
            Some(previous) => {
                let next = previous + rate * (slope - previous);
                let deviation = slope - next;
                self.variance += rate * (deviation * deviation - self.variance);
                self.smoothed = Some(next);
            }
            None => self.smoothed = Some(slope),
        }
    }
}

/// Aggregates per-symbol slopes into one consensus reading.
///
/// Exclusions are recorded immediately but take effect at the next
/// `recompute`; the previously published snapshot is never rewritten.
#[derive(Debug, Clone)]
pub struct TrendAggregator {
    config: TrendConfig,
    trackers: FnvHashMap<Symbol, SlopeTracker>,
    excluded: Vec<Symbol>,
    snapshot: Option<TrendSnapshot>,
}

impl TrendAggregator {
    pub fn new(config: TrendConfig) -> Self {
        Self {
            config,
            trackers: FnvHashMap::default(),
            excluded: Vec::new(),
            snapshot: None,
        }
    }

    /// Feed the latest window for one symbol. Windows too short for a slope
    /// leave the tracker untouched.
    pub fn observe(&mut self, symbol: &Symbol, points: &[SeriesPoint]) {
        let Some(slope) = normalized_slope(points) else {
            return;
        };
        self.trackers
            .entry(symbol.clone())
            .or_default()
            .observe(slope, self.config.smoothing);
    }

    /// Exclude `symbol` from future snapshots. Its tracker is dropped so a
    /// later re-inclusion restarts smoothing from scratch.
    pub fn exclude(&mut self, symbol: &Symbol) {
        if !self.excluded.contains(symbol) {
            self.excluded.push(symbol.clone());
        }
        self.trackers.remove(symbol);
    }

    pub fn include(&mut self, symbol: &Symbol) {
        self.excluded.retain(|excluded| excluded != symbol);
    }

    pub fn remove(&mut self, symbol: &Symbol) {
        self.trackers.remove(symbol);
        self.excluded.retain(|excluded| excluded != symbol);
    }

    /// Last published snapshot, unchanged until the next `recompute`.
    pub fn snapshot(&self) -> Option<&TrendSnapshot> {
        self.snapshot.as_ref()
    }

    /// Rebuild the consensus from the current trackers.
    pub fn recompute(&mut self) -> Option<&TrendSnapshot> {
        let mut members: Vec<(&SmolStr, f64, f64)> = self
            .trackers
            .iter()
            .filter(|(symbol, _)| !self.excluded.contains(symbol))
            .filter_map(|(symbol, tracker)| {
                tracker.smoothed.map(|slope| (symbol, slope, tracker.variance))
            })
            .collect();
        members.sort_by(|a, b| a.0.cmp(b.0));

        if members.is_empty() {
            self.snapshot = None;
            return None;
        }

        let weights: Vec<f64> = members
            .iter()
            .map(|(_, _, variance)| match self.config.weighting {
                TrendWeighting::Equal => 1.0,
                TrendWeighting::InverseVolatility => 1.0 / (variance + 1e-12),
            })
            .collect();
        let total_weight: f64 = weights.iter().sum();

        let mean_slope = members
            .iter()
            .zip(&weights)
            .map(|((_, slope, _), weight)| slope * weight)
            .sum::<f64>()
            / total_weight;
        let index = (mean_slope / self.config.full_scale).clamp(-1.0, 1.0);

        let mean_abs_slope = members
            .iter()
            .zip(&weights)
            .map(|((_, slope, _), weight)| slope.abs() * weight)
            .sum::<f64>()
            / total_weight;
        let strength = (mean_abs_slope / self.config.full_scale).clamp(0.0, 1.0);

        // Sign consensus: weight fraction agreeing with the aggregate
        // direction. A flat aggregate counts everyone as agreeing.
        let consensus = if members.len() == 1 || mean_slope == 0.0 {
            1.0
        } else {
            members
                .iter()
                .zip(&weights)
                .filter(|((_, slope, _), _)| slope.signum() == mean_slope.signum())
                .map(|(_, weight)| weight)
                .sum::<f64>()
                / total_weight
        };
        let mean_variance = members
            .iter()
            .zip(&weights)
            .map(|((_, _, variance), weight)| variance * weight)
            .sum::<f64>()
            / total_weight;
        let dispersion = 1.0 / (1.0 + mean_variance / self.config.variance_scale);
        let confidence = (0.5 * consensus + 0.5 * dispersion).clamp(0.0, 1.0);

        let magnitude = index.abs();
        let label = if magnitude < self.config.flat_threshold {
            TrendLabel::Flat
        } else if magnitude >= self.config.strong_threshold {
            if index > 0.0 {
                TrendLabel::StrongUp
            } else {
                TrendLabel::StrongDown
            }
        } else if index > 0.0 {
            TrendLabel::Up
        } else {
            TrendLabel::Down
        };

        self.snapshot = Some(TrendSnapshot {
            index,
            strength,
            confidence,
            label,
            members: members.iter().map(|(symbol, _, _)| (*symbol).clone()).collect(),
        });
        self.snapshot.as_ref()
    }
}
