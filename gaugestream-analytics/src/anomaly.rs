//! Per-tick anomaly detection over a symbol's recent prices.
//!
//! Detection is stateless: every call re-derives its verdict from the slice
//! it is handed, so retention eviction upstream is the only form of decay.
//! Each verdict carries a short label suitable for logs and UI badges.

use crate::indicators::{self, BollingerConfig, MacdConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiExtremeConfig {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiExtremeConfig {
    fn default() -> Self {
        Self {
            period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreConfig {
    pub threshold: f64,
    /// Trailing samples the score is computed over.
    pub window: usize,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            window: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolSpikeConfig {
    /// Trailing returns inspected for the median baseline.
    pub window: usize,
    /// Last |return| must exceed the median by this factor.
    pub spike_factor: f64,
}

impl Default for VolSpikeConfig {
    fn default() -> Self {
        Self {
            window: 30,
            spike_factor: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceConfig {
    /// Samples compared at each end of the divergence window.
    pub window: usize,
    pub rsi_period: usize,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            window: 20,
            rsi_period: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeShiftConfig {
    /// Total returns inspected; split into two halves.
    pub window: usize,
    /// Recent-half volatility must exceed the earlier half by this factor.
    pub jump_factor: f64,
}

impl Default for RegimeShiftConfig {
    fn default() -> Self {
        Self {
            window: 40,
            jump_factor: 1.8,
        }
    }
}

/// Closed set of detection strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum AnomalyMode {
    RsiExtreme(RsiExtremeConfig),
    MacdCross(MacdConfig),
    BollingerBreakout(BollingerConfig),
    ZScore(ZScoreConfig),
    VolSpike(VolSpikeConfig),
    Divergence(DivergenceConfig),
    RegimeShift(RegimeShiftConfig),
    /// At least two sub-signals, or one backed by an elevated z-score.
    Composite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyVerdict {
    pub triggered: bool,
    pub label: &'static str,
}

impl AnomalyVerdict {
    fn clear() -> Self {
        Self {
            triggered: false,
            label: "",
        }
    }

    fn flagged(label: &'static str) -> Self {
        Self {
            triggered: true,
            label,
        }
    }
}

/// Evaluate `mode` against the symbol's recent prices.
pub fn detect(prices: &[f64], mode: &AnomalyMode) -> AnomalyVerdict {
    match mode {
        AnomalyMode::RsiExtreme(config) => rsi_extreme(prices, config),
        AnomalyMode::MacdCross(config) => macd_cross(prices, config),
        AnomalyMode::BollingerBreakout(config) => bollinger_breakout(prices, config),
        AnomalyMode::ZScore(config) => zscore_breach(prices, config),
        AnomalyMode::VolSpike(config) => vol_spike(prices, config),
        AnomalyMode::Divergence(config) => divergence(prices, config),
        AnomalyMode::RegimeShift(config) => regime_shift(prices, config),
        AnomalyMode::Composite => composite(prices),
    }
}

fn rsi_extreme(prices: &[f64], config: &RsiExtremeConfig) -> AnomalyVerdict {
    match indicators::rsi_last(prices, config.period) {
        Some(value) if value >= config.overbought => AnomalyVerdict::flagged("rsi-overbought"),
        Some(value) if value <= config.oversold => AnomalyVerdict::flagged("rsi-oversold"),
        _ => AnomalyVerdict::clear(),
    }
}

/// MACD line crossing its signal line on the most recent sample.
fn macd_cross(prices: &[f64], config: &MacdConfig) -> AnomalyVerdict {
    // Need rows past the warm-up so the cross is not seed noise.
    if prices.len() < config.slow + config.signal {
        return AnomalyVerdict::clear();
    }
    let series = indicators::macd(prices, *config);
    let n = series.histogram.len();
    if n < 2 {
        return AnomalyVerdict::clear();
    }
    let previous = series.histogram[n - 2];
    let current = series.histogram[n - 1];
    if previous <= 0.0 && current > 0.0 {
        AnomalyVerdict::flagged("macd-cross-up")
    } else if previous >= 0.0 && current < 0.0 {
        AnomalyVerdict::flagged("macd-cross-down")
    } else {
        AnomalyVerdict::clear()
    }
}

fn bollinger_breakout(prices: &[f64], config: &BollingerConfig) -> AnomalyVerdict {
    if prices.len() < config.period {
        return AnomalyVerdict::clear();
    }
    let bands = indicators::bollinger(prices, *config);
    let last = prices[prices.len() - 1];
    let upper = bands.upper[bands.upper.len() - 1];
    let lower = bands.lower[bands.lower.len() - 1];
    if last > upper {
        AnomalyVerdict::flagged("bollinger-breakout-up")
    } else if last < lower {
        AnomalyVerdict::flagged("bollinger-breakout-down")
    } else {
        AnomalyVerdict::clear()
    }
}

fn zscore_breach(prices: &[f64], config: &ZScoreConfig) -> AnomalyVerdict {
    if indicators::zscore(prices, config.window).abs() >= config.threshold {
        AnomalyVerdict::flagged("zscore-breach")
    } else {
        AnomalyVerdict::clear()
    }
}

fn returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|pair| {
            if pair[0].abs() > 0.0 {
                (pair[1] - pair[0]) / pair[0]
            } else {
                0.0
            }
        })
        .collect()
}

/// Last |return| against the median |return| of the trailing window.
fn vol_spike(prices: &[f64], config: &VolSpikeConfig) -> AnomalyVerdict {
    let all = returns(prices);
    if all.len() < 5 {
        return AnomalyVerdict::clear();
    }
    let last = all[all.len() - 1].abs();
    let start = all.len().saturating_sub(config.window + 1);
    let mut baseline: Vec<f64> = all[start..all.len() - 1].iter().map(|r| r.abs()).collect();
    baseline.sort_by(|a, b| a.partial_cmp(b).expect("returns are finite"));
    let median = baseline[baseline.len() / 2];
    if median > 0.0 && last >= median * config.spike_factor {
        AnomalyVerdict::flagged("vol-spike")
    } else {
        AnomalyVerdict::clear()
    }
}

/// Price pushing to a new extreme while momentum leans the other way.
fn divergence(prices: &[f64], config: &DivergenceConfig) -> AnomalyVerdict {
    let momentum = indicators::rsi(prices, config.rsi_period);
    if momentum.len() < config.window || prices.len() < config.window {
        return AnomalyVerdict::clear();
    }
    let price_tail = &prices[prices.len() - config.window..];
    let rsi_tail = &momentum[momentum.len() - config.window..];

    let price_last = price_tail[price_tail.len() - 1];
    let price_peak = price_tail.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let price_trough = price_tail.iter().cloned().fold(f64::INFINITY, f64::min);
    let rsi_delta = rsi_tail[rsi_tail.len() - 1] - rsi_tail[0];

    if price_last >= price_peak && rsi_delta < 0.0 {
        AnomalyVerdict::flagged("bearish-divergence")
    } else if price_last <= price_trough && rsi_delta > 0.0 {
        AnomalyVerdict::flagged("bullish-divergence")
    } else {
        AnomalyVerdict::clear()
    }
}

/// Recent-half return volatility jumping against the earlier half.
fn regime_shift(prices: &[f64], config: &RegimeShiftConfig) -> AnomalyVerdict {
    let all = returns(prices);
    if all.len() < config.window.max(8) {
        return AnomalyVerdict::clear();
    }
    let tail = &all[all.len() - config.window.min(all.len())..];
    let mid = tail.len() / 2;
    let earlier = stddev(&tail[..mid]);
    let recent = stddev(&tail[mid..]);
    if earlier > 0.0 && recent >= earlier * config.jump_factor {
        AnomalyVerdict::flagged("regime-shift")
    } else {
        AnomalyVerdict::clear()
    }
}

fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Two independent signals, or one signal with statistical backing.
fn composite(prices: &[f64]) -> AnomalyVerdict {
    let signals = [
        rsi_extreme(prices, &RsiExtremeConfig::default()),
        bollinger_breakout(prices, &BollingerConfig::default()),
        vol_spike(prices, &VolSpikeConfig::default()),
        macd_cross(prices, &MacdConfig::default()),
    ];
    let fired: Vec<&AnomalyVerdict> = signals.iter().filter(|v| v.triggered).collect();

    let z = indicators::zscore(prices, ZScoreConfig::default().window);
    match fired.len() {
        0 => AnomalyVerdict::clear(),
        1 if z.abs() >= 2.0 => AnomalyVerdict::flagged("composite"),
        1 => AnomalyVerdict::clear(),
        _ => AnomalyVerdict::flagged("composite"),
    }
}
