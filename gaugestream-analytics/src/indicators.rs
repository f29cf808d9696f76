//! Technical indicators computed over price slices.
//!
//! All functions are pure: they take a value slice and return the derived
//! series (or scalar) without touching any shared state. Callers pass the
//! output of `RollingSeries::values` or a resampled slice.

/// Wilder-smoothed RSI.
///
/// Seeds from the simple average of the first `period` gains/losses, then
/// applies Wilder smoothing. Returns one value per price after the seed
/// window, so the output has `len - period` entries. Empty when fewer than
/// `period + 1` prices are available. Flat stretches read as the neutral 50.
pub fn rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period + 1 {
        return Vec::new();
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in prices[..=period].windows(2) {
        let delta = pair[1] - pair[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;

    let mut output = Vec::with_capacity(prices.len() - period);
    output.push(rsi_value(avg_gain, avg_loss));

    for pair in prices[period..].windows(2) {
        let delta = pair[1] - pair[0];
        let (gain, loss) = if delta >= 0.0 {
            (delta, 0.0)
        } else {
            (0.0, -delta)
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        output.push(rsi_value(avg_gain, avg_loss));
    }

    output
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let total = avg_gain + avg_loss;
    if total <= 0.0 {
        // No movement either way: neutral.
        return 50.0;
    }
    100.0 * avg_gain / total
}

/// Most recent RSI value, if enough data exists.
pub fn rsi_last(prices: &[f64], period: usize) -> Option<f64> {
    rsi(prices, period).last().copied()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// MACD output aligned to the input: one row per price.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Standard EMA-based MACD. Inputs shorter than the slow period return
/// empty output. EMAs seed from the first price, which makes the early rows
/// warm-up noise; callers wanting only settled values should skip the first
/// `slow + signal` rows.
pub fn macd(prices: &[f64], config: MacdConfig) -> MacdSeries {
    if prices.len() < config.slow {
        return MacdSeries {
            macd: Vec::new(),
            signal: Vec::new(),
            histogram: Vec::new(),
        };
    }
    let fast = ema(prices, config.fast);
    let slow = ema(prices, config.slow);
    let macd_line: Vec<f64> = fast
        .iter()
        .zip(&slow)
        .map(|(fast, slow)| fast - slow)
        .collect();
    let signal_line = ema(&macd_line, config.signal);
    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(macd, signal)| macd - signal)
        .collect();

    MacdSeries {
        macd: macd_line,
        signal: signal_line,
        histogram,
    }
}

fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut output = Vec::with_capacity(values.len());
    let mut current: Option<f64> = None;
    for value in values {
        let next = match current {
            Some(previous) => previous + alpha * (value - previous),
            None => *value,
        };
        output.push(next);
        current = Some(next);
    }
    output
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerConfig {
    pub period: usize,
    pub stddev_multiplier: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: 20,
            stddev_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Bollinger bands over a rolling window, one row per price.
///
/// Uses prefix sums of value and value-squared so each window is O(1).
/// Before the window fills, all three bands sit on the raw price so the
/// output never carries misleading early envelopes.
pub fn bollinger(prices: &[f64], config: BollingerConfig) -> BollingerBands {
    let mut middle = Vec::with_capacity(prices.len());
    let mut upper = Vec::with_capacity(prices.len());
    let mut lower = Vec::with_capacity(prices.len());

    let mut prefix = Vec::with_capacity(prices.len() + 1);
    let mut prefix_sq = Vec::with_capacity(prices.len() + 1);
    prefix.push(0.0);
    prefix_sq.push(0.0);
    for value in prices {
        prefix.push(prefix.last().unwrap() + value);
        prefix_sq.push(prefix_sq.last().unwrap() + value * value);
    }

    for (index, value) in prices.iter().enumerate() {
        if config.period == 0 || index + 1 < config.period {
            middle.push(*value);
            upper.push(*value);
            lower.push(*value);
            continue;
        }
        let start = index + 1 - config.period;
        let n = config.period as f64;
        let sum = prefix[index + 1] - prefix[start];
        let sum_sq = prefix_sq[index + 1] - prefix_sq[start];
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        let band = config.stddev_multiplier * variance.sqrt();
        middle.push(mean);
        upper.push(mean + band);
        lower.push(mean - band);
    }

    BollingerBands {
        middle,
        upper,
        lower,
    }
}

/// Z-score of the last value against the mean/stddev of the trailing
/// `window` values.
///
/// Returns 0.0 with fewer than 5 samples or when the variance is effectively
/// zero, so flat or barely-populated series never read as anomalous.
pub fn zscore(values: &[f64], window: usize) -> f64 {
    let start = values.len().saturating_sub(window);
    let tail = &values[start..];
    if tail.len() < 5 {
        return 0.0;
    }
    let n = tail.len() as f64;
    let mean = tail.iter().sum::<f64>() / n;
    let variance = tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev < 1e-12 {
        return 0.0;
    }
    (tail.last().expect("len checked") - mean) / stddev
}
