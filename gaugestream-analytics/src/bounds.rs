//! Display-range computation for the gauge metaphor.
//!
//! Each mode is a distinct algorithm over the symbol's rolling series and the
//! current price, dispatched exhaustively in one place. Whatever the mode
//! produced, the final range always includes the current price and is never
//! narrower than an epsilon proportional to it.
//!
//! Several modes carry empirically-tuned smoothing rates and weight blends.
//! Their correctness is a product choice, so every such constant is a named,
//! overridable field on the mode's config struct.

use crate::series::RollingSeries;

/// Minimum-width policy: a fraction of `|price|`, floored by an absolute
/// constant so near-zero-priced instruments never degenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonConfig {
    pub relative: f64,
    pub absolute_floor: f64,
}

impl Default for EpsilonConfig {
    fn default() -> Self {
        Self {
            relative: 1e-3,
            absolute_floor: 1e-9,
        }
    }
}

impl EpsilonConfig {
    pub fn epsilon(&self, price: f64) -> f64 {
        (price.abs() * self.relative).max(self.absolute_floor)
    }
}

/// Current display range for one symbol. `min`/`max` are `None` until the
/// first update; once both are set, `max > min` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundsState {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl BoundsState {
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.min?, self.max?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedConfig {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    /// Window over the rolling series; `None` means the full buffer.
    pub window_secs: Option<f64>,
    /// EWMA rate pulling the smoothed extent toward the window extent.
    pub smoothing: f64,
    /// Padding below/above the smoothed extent, as a fraction of `|price|`.
    pub padding: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            window_secs: None,
            smoothing: 0.2,
            padding: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapseConfig {
    pub enabled: bool,
    /// Per-tick width decay while the data allows the range to narrow.
    pub factor: f64,
    /// Width floor as a fraction of `|price|`.
    pub min_width: f64,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            factor: 0.995,
            min_width: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeConfig {
    pub enabled: bool,
    /// Absolute last-return threshold that triggers the expansion.
    pub return_threshold: f64,
    /// Instant width multiplier on trigger.
    pub expand_factor: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            return_threshold: 2e-3,
            expand_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PythonLikeConfig {
    pub window_secs: Option<f64>,
    pub padding: f64,
    pub collapse: CollapseConfig,
    pub spike: SpikeConfig,
}

impl Default for PythonLikeConfig {
    fn default() -> Self {
        Self {
            window_secs: None,
            padding: 0.02,
            collapse: CollapseConfig::default(),
            spike: SpikeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OldSchoolAdaptiveConfig {
    /// Half-band as a fraction of the current price.
    pub band: f64,
    /// EWMA rate when a bound must move outward (react fast).
    pub expand_rate: f64,
    /// EWMA rate when a bound may move inward (relax slowly).
    pub contract_rate: f64,
}

impl Default for OldSchoolAdaptiveConfig {
    fn default() -> Self {
        Self {
            band: 0.05,
            expand_rate: 0.4,
            contract_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OldSchoolPythonLikeConfig {
    pub band: f64,
    pub collapse: CollapseConfig,
    pub spike: SpikeConfig,
}

impl Default for OldSchoolPythonLikeConfig {
    fn default() -> Self {
        Self {
            band: 0.05,
            collapse: CollapseConfig::default(),
            spike: SpikeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KiloCoderConfig {
    /// Smoothing rates for the short/medium/long EWMA-tracked extents.
    pub short_rate: f64,
    pub medium_rate: f64,
    pub long_rate: f64,
    /// Blend weights for short/medium/long/global extents.
    pub weights: [f64; 4],
    /// Base padding fraction, scaled up by recent-return volatility.
    pub padding: f64,
    /// Multiplier applied to the return stddev when scaling the padding.
    pub volatility_scale: f64,
    /// Number of trailing returns used for the volatility estimate.
    pub volatility_window: usize,
}

impl Default for KiloCoderConfig {
    fn default() -> Self {
        Self {
            short_rate: 0.5,
            medium_rate: 0.12,
            long_rate: 0.03,
            weights: [0.5, 0.3, 0.15, 0.05],
            padding: 0.01,
            volatility_scale: 8.0,
            volatility_window: 20,
        }
    }
}

/// Closed set of range algorithms.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundsMode {
    Fixed(FixedConfig),
    Manual,
    Adaptive(AdaptiveConfig),
    PythonLike(PythonLikeConfig),
    OldSchoolAdaptive(OldSchoolAdaptiveConfig),
    OldSchoolPythonLike(OldSchoolPythonLikeConfig),
    KiloCoderLike(KiloCoderConfig),
}

impl BoundsMode {
    pub fn label(&self) -> &'static str {
        match self {
            BoundsMode::Fixed(_) => "fixed",
            BoundsMode::Manual => "manual",
            BoundsMode::Adaptive(_) => "adaptive",
            BoundsMode::PythonLike(_) => "python-like",
            BoundsMode::OldSchoolAdaptive(_) => "old-school-adaptive",
            BoundsMode::OldSchoolPythonLike(_) => "old-school-python-like",
            BoundsMode::KiloCoderLike(_) => "kilocoder-like",
        }
    }
}

/// EWMA-tracked min/max extent: snaps outward on breach, decays toward the
/// price otherwise.
#[derive(Debug, Clone, Copy)]
struct EwmaExtent {
    min: f64,
    max: f64,
}

impl EwmaExtent {
    fn new(price: f64) -> Self {
        Self {
            min: price,
            max: price,
        }
    }

    fn update(&mut self, price: f64, rate: f64) {
        if price < self.min {
            self.min = price;
        } else {
            self.min += rate * (price - self.min);
        }
        if price > self.max {
            self.max = price;
        } else {
            self.max += rate * (price - self.max);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct KiloCoderTrackers {
    short: Option<EwmaExtent>,
    medium: Option<EwmaExtent>,
    long: Option<EwmaExtent>,
    global_min: f64,
    global_max: f64,
}

/// Per-symbol bounds computer. Mutated on every tick.
#[derive(Debug, Clone)]
pub struct BoundsEngine {
    mode: BoundsMode,
    epsilon: EpsilonConfig,
    state: BoundsState,
    // Mode-internal trackers; reset when the mode changes.
    smoothed: Option<(f64, f64)>,
    kilocoder: KiloCoderTrackers,
    last_price: Option<f64>,
}

impl BoundsEngine {
    pub fn new(mode: BoundsMode) -> Self {
        Self::with_epsilon(mode, EpsilonConfig::default())
    }

    pub fn with_epsilon(mode: BoundsMode, epsilon: EpsilonConfig) -> Self {
        Self {
            mode,
            epsilon,
            state: BoundsState::default(),
            smoothed: None,
            kilocoder: KiloCoderTrackers::default(),
            last_price: None,
        }
    }

    pub fn mode(&self) -> &BoundsMode {
        &self.mode
    }

    pub fn state(&self) -> BoundsState {
        self.state
    }

    /// Switch algorithms; internal trackers restart but the last emitted
    /// range is kept so the gauge does not jump to empty.
    pub fn set_mode(&mut self, mode: BoundsMode) {
        self.mode = mode;
        self.smoothed = None;
        self.kilocoder = KiloCoderTrackers::default();
    }

    /// Set the range externally. Only meaningful in `Manual` mode, where
    /// subsequent updates expand it but never narrow it.
    pub fn set_manual(&mut self, min: f64, max: f64) {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.state = BoundsState {
            min: Some(lo),
            max: Some(hi),
        };
    }

    /// Recompute the display range for the latest `price`.
    pub fn update(&mut self, series: &RollingSeries, price: f64) -> BoundsState {
        let last_return = self.last_price.map(|previous| {
            if previous.abs() > 0.0 {
                (price - previous) / previous
            } else {
                0.0
            }
        });

        let (lo, hi) = match &self.mode {
            BoundsMode::Fixed(config) => (config.min, config.max),

            BoundsMode::Manual => match self.state.range() {
                // Expand-only: include the price, never narrow.
                Some((lo, hi)) => (lo.min(price), hi.max(price)),
                None => (price, price),
            },

            BoundsMode::Adaptive(config) => {
                let config = *config;
                self.update_adaptive(series, price, config)
            }

            BoundsMode::PythonLike(config) => {
                let config = *config;
                let (wmin, wmax) = window_extent(series, config.window_secs, price);
                let pad = config.padding * price.abs();
                self.apply_width_policy(
                    wmin - pad,
                    wmax + pad,
                    price,
                    config.collapse,
                    config.spike,
                    last_return,
                )
            }

            BoundsMode::OldSchoolAdaptive(config) => {
                let config = *config;
                self.update_old_school_adaptive(price, config)
            }

            BoundsMode::OldSchoolPythonLike(config) => {
                let config = *config;
                let half = config.band * price.abs();
                self.apply_width_policy(
                    price - half,
                    price + half,
                    price,
                    config.collapse,
                    config.spike,
                    last_return,
                )
            }

            BoundsMode::KiloCoderLike(config) => {
                let config = *config;
                self.update_kilocoder(series, price, config)
            }
        };

        self.state = self.finalize(lo, hi, price);
        self.last_price = Some(price);
        self.state
    }

    fn update_adaptive(
        &mut self,
        series: &RollingSeries,
        price: f64,
        config: AdaptiveConfig,
    ) -> (f64, f64) {
        let (wmin, wmax) = window_extent(series, config.window_secs, price);

        let (mut smin, mut smax) = self.smoothed.unwrap_or((wmin, wmax));
        smin += config.smoothing * (wmin - smin);
        smax += config.smoothing * (wmax - smax);

        // Price escaped the smoothed extent: pull the bound to the price.
        if price < smin {
            smin = price;
        }
        if price > smax {
            smax = price;
        }
        self.smoothed = Some((smin, smax));

        let pad = config.padding * price.abs();
        (smin - pad, smax + pad)
    }

    fn update_old_school_adaptive(
        &mut self,
        price: f64,
        config: OldSchoolAdaptiveConfig,
    ) -> (f64, f64) {
        let target_lo = price * (1.0 - config.band);
        let target_hi = price * (1.0 + config.band);

        let (mut lo, mut hi) = self.smoothed.unwrap_or((target_lo, target_hi));
        let lo_rate = if target_lo < lo {
            config.expand_rate
        } else {
            config.contract_rate
        };
        let hi_rate = if target_hi > hi {
            config.expand_rate
        } else {
            config.contract_rate
        };
        lo += lo_rate * (target_lo - lo);
        hi += hi_rate * (target_hi - hi);

        self.smoothed = Some((lo, hi));
        (lo, hi)
    }

    fn update_kilocoder(
        &mut self,
        series: &RollingSeries,
        price: f64,
        config: KiloCoderConfig,
    ) -> (f64, f64) {
        let trackers = &mut self.kilocoder;
        if trackers.short.is_none() {
            trackers.short = Some(EwmaExtent::new(price));
            trackers.medium = Some(EwmaExtent::new(price));
            trackers.long = Some(EwmaExtent::new(price));
            trackers.global_min = price;
            trackers.global_max = price;
        }

        let short = trackers.short.as_mut().expect("initialised above");
        short.update(price, config.short_rate);
        let short = *short;
        let medium = trackers.medium.as_mut().expect("initialised above");
        medium.update(price, config.medium_rate);
        let medium = *medium;
        let long = trackers.long.as_mut().expect("initialised above");
        long.update(price, config.long_rate);
        let long = *long;

        trackers.global_min = trackers.global_min.min(price);
        trackers.global_max = trackers.global_max.max(price);

        let [w_short, w_medium, w_long, w_global] = config.weights;
        let lo = w_short * short.min
            + w_medium * medium.min
            + w_long * long.min
            + w_global * trackers.global_min;
        let hi = w_short * short.max
            + w_medium * medium.max
            + w_long * long.max
            + w_global * trackers.global_max;

        let volatility = return_stddev(series, config.volatility_window);
        let pad = config.padding * price.abs() * (1.0 + config.volatility_scale * volatility);
        (lo - pad, hi + pad)
    }

    /// Shared auto-collapse / spike-expand width policy.
    fn apply_width_policy(
        &mut self,
        base_lo: f64,
        base_hi: f64,
        price: f64,
        collapse: CollapseConfig,
        spike: SpikeConfig,
        last_return: Option<f64>,
    ) -> (f64, f64) {
        let base_width = base_hi - base_lo;
        let center = (base_lo + base_hi) / 2.0;
        let mut width = base_width;

        if collapse.enabled {
            if let Some((prev_lo, prev_hi)) = self.smoothed {
                let prev_width = prev_hi - prev_lo;
                if base_width < prev_width {
                    // Narrowing is gradual: decay the previous width, floored.
                    width = (prev_width * collapse.factor)
                        .max(base_width)
                        .max(collapse.min_width * price.abs());
                }
            }
        }

        if spike.enabled
            && last_return.is_some_and(|value| value.abs() >= spike.return_threshold)
        {
            width *= spike.expand_factor;
        }

        let lo = center - width / 2.0;
        let hi = center + width / 2.0;
        self.smoothed = Some((lo, hi));
        (lo, hi)
    }

    /// Enforce the universal invariant: `min <= price <= max` and
    /// `max - min >= epsilon(price)`.
    fn finalize(&self, lo: f64, hi: f64, price: f64) -> BoundsState {
        let (mut lo, mut hi) = if lo.is_finite() && hi.is_finite() {
            if lo <= hi { (lo, hi) } else { (hi, lo) }
        } else {
            (price, price)
        };

        if price < lo {
            lo = price;
        }
        if price > hi {
            hi = price;
        }

        let epsilon = self.epsilon.epsilon(price);
        let width = hi - lo;
        if width < epsilon {
            let grow = (epsilon - width) / 2.0;
            lo -= grow;
            hi += grow;
        }

        BoundsState {
            min: Some(lo),
            max: Some(hi),
        }
    }
}

/// Min/max over the series window, falling back to the price when empty.
fn window_extent(series: &RollingSeries, window_secs: Option<f64>, price: f64) -> (f64, f64) {
    let values: Vec<f64> = match window_secs {
        Some(window) => series.snapshot(window).iter().map(|p| p.value).collect(),
        None => series.values(),
    };
    if values.is_empty() {
        return (price, price);
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        min = min.min(value);
        max = max.max(value);
    }
    (min, max)
}

/// Stddev of the trailing `window` bar-to-bar returns; 0.0 when not enough
/// data or no variance.
fn return_stddev(series: &RollingSeries, window: usize) -> f64 {
    let values = series.values();
    if values.len() < 3 {
        return 0.0;
    }
    let start = values.len().saturating_sub(window + 1);
    let tail = &values[start..];
    let returns: Vec<f64> = tail
        .windows(2)
        .map(|pair| {
            if pair[0].abs() > 0.0 {
                (pair[1] - pair[0]) / pair[0]
            } else {
                0.0
            }
        })
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesPoint;

    fn all_modes() -> Vec<BoundsMode> {
        vec![
            BoundsMode::Fixed(FixedConfig {
                min: 10.0,
                max: 20.0,
            }),
            BoundsMode::Manual,
            BoundsMode::Adaptive(AdaptiveConfig::default()),
            BoundsMode::PythonLike(PythonLikeConfig {
                collapse: CollapseConfig {
                    enabled: true,
                    ..CollapseConfig::default()
                },
                spike: SpikeConfig {
                    enabled: true,
                    ..SpikeConfig::default()
                },
                ..PythonLikeConfig::default()
            }),
            BoundsMode::OldSchoolAdaptive(OldSchoolAdaptiveConfig::default()),
            BoundsMode::OldSchoolPythonLike(OldSchoolPythonLikeConfig::default()),
            BoundsMode::KiloCoderLike(KiloCoderConfig::default()),
        ]
    }

    /// Deterministic pseudo-random walk (no rand dev-dep needed).
    fn price_walk(len: usize) -> Vec<f64> {
        let mut state: u64 = 0x9E3779B97F4A7C15;
        let mut price = 50_000.0;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let step = ((state >> 33) as f64 / (u32::MAX as f64)) - 0.5;
                price *= 1.0 + step * 0.01;
                price
            })
            .collect()
    }

    #[test]
    fn test_invariant_holds_for_every_mode() {
        let prices = price_walk(300);

        for mode in all_modes() {
            let mut engine = BoundsEngine::new(mode.clone());
            let mut series = RollingSeries::new(500, 1e9);

            for (index, price) in prices.iter().enumerate() {
                series.push(SeriesPoint::new(index as f64, *price));
                let state = engine.update(&series, *price);

                let (min, max) = state.range().expect("bounds set after update");
                let epsilon = EpsilonConfig::default().epsilon(*price);
                assert!(
                    min <= *price && *price <= max,
                    "{}: price {price} escaped [{min}, {max}] at tick {index}",
                    mode.label(),
                );
                assert!(
                    max - min >= epsilon * 0.999,
                    "{}: degenerate range [{min}, {max}] at tick {index}",
                    mode.label(),
                );
            }
        }
    }

    #[test]
    fn test_adaptive_covers_recent_extent() {
        // Ticks (100, 50000), (101, 50100), (102, 49900), empty initial bounds.
        let mut engine = BoundsEngine::new(BoundsMode::Adaptive(AdaptiveConfig::default()));
        let mut series = RollingSeries::new(100, 1e9);

        for (ts, price) in [(100.0, 50_000.0), (101.0, 50_100.0), (102.0, 49_900.0)] {
            series.push(SeriesPoint::new(ts, price));
            engine.update(&series, price);
        }

        let (min, max) = engine.state().range().unwrap();
        assert!(min <= 49_900.0, "min {min}");
        assert!(max >= 50_100.0, "max {max}");
    }

    #[test]
    fn test_fixed_ignores_data_inside_range() {
        let mut engine = BoundsEngine::new(BoundsMode::Fixed(FixedConfig {
            min: 100.0,
            max: 200.0,
        }));
        let series = RollingSeries::new(10, 1e9);

        let state = engine.update(&series, 150.0);
        assert_eq!(state.range(), Some((100.0, 200.0)));

        // Out-of-range price is force-included.
        let state = engine.update(&series, 250.0);
        let (min, max) = state.range().unwrap();
        assert_eq!(min, 100.0);
        assert_eq!(max, 250.0);
    }

    #[test]
    fn test_manual_only_expands() {
        let mut engine = BoundsEngine::new(BoundsMode::Manual);
        engine.set_manual(100.0, 200.0);
        let series = RollingSeries::new(10, 1e9);

        engine.update(&series, 150.0);
        assert_eq!(engine.state().range(), Some((100.0, 200.0)));

        engine.update(&series, 250.0);
        assert_eq!(engine.state().range(), Some((100.0, 250.0)));

        // Back inside: range must not narrow again.
        engine.update(&series, 150.0);
        assert_eq!(engine.state().range(), Some((100.0, 250.0)));
    }

    #[test]
    fn test_old_school_python_like_tracks_price_band() {
        let config = OldSchoolPythonLikeConfig::default();
        let mut engine = BoundsEngine::new(BoundsMode::OldSchoolPythonLike(config));
        let series = RollingSeries::new(10, 1e9);

        let state = engine.update(&series, 1_000.0);
        let (min, max) = state.range().unwrap();
        assert!((min - 950.0).abs() < 1e-9);
        assert!((max - 1_050.0).abs() < 1e-9);

        // Recomputed fresh: the band follows the next price entirely.
        let state = engine.update(&series, 2_000.0);
        let (min, max) = state.range().unwrap();
        assert!((min - 1_900.0).abs() < 1e-9);
        assert!((max - 2_100.0).abs() < 1e-9);
    }

    #[test]
    fn test_spike_expand_widens_instantly() {
        let spiked = PythonLikeConfig {
            spike: SpikeConfig {
                enabled: true,
                return_threshold: 2e-3,
                expand_factor: 2.0,
            },
            ..PythonLikeConfig::default()
        };
        let mut series = RollingSeries::new(100, 1e9);

        let mut calm = BoundsEngine::new(BoundsMode::PythonLike(PythonLikeConfig::default()));
        let mut reactive = BoundsEngine::new(BoundsMode::PythonLike(spiked));

        series.push(SeriesPoint::new(0.0, 1_000.0));
        calm.update(&series, 1_000.0);
        reactive.update(&series, 1_000.0);

        // +1% jump: well beyond the 0.2% trigger.
        series.push(SeriesPoint::new(1.0, 1_010.0));
        let calm_state = calm.update(&series, 1_010.0);
        let reactive_state = reactive.update(&series, 1_010.0);

        let calm_width = {
            let (lo, hi) = calm_state.range().unwrap();
            hi - lo
        };
        let reactive_width = {
            let (lo, hi) = reactive_state.range().unwrap();
            hi - lo
        };
        assert!(
            reactive_width > calm_width * 1.5,
            "spike width {reactive_width} vs calm {calm_width}"
        );
    }

    #[test]
    fn test_auto_collapse_decays_width_gradually() {
        let config = OldSchoolPythonLikeConfig {
            band: 0.05,
            collapse: CollapseConfig {
                enabled: true,
                factor: 0.9,
                min_width: 1e-3,
            },
            spike: SpikeConfig::default(),
        };
        let mut engine = BoundsEngine::new(BoundsMode::OldSchoolPythonLike(config));
        let series = RollingSeries::new(10, 1e9);

        // Establish a wide range at a high price, then drop the price. The
        // fresh band would be much narrower; collapse only lets the width
        // shrink by 10% per tick.
        engine.update(&series, 10_000.0);
        let wide = {
            let (lo, hi) = engine.state().range().unwrap();
            hi - lo
        };

        engine.update(&series, 1_000.0);
        let after_one = {
            let (lo, hi) = engine.state().range().unwrap();
            hi - lo
        };
        assert!(after_one < wide);
        assert!(after_one > wide * 0.8, "collapsed too fast: {after_one} from {wide}");

        let mut previous = after_one;
        for _ in 0..50 {
            engine.update(&series, 1_000.0);
            let width = {
                let (lo, hi) = engine.state().range().unwrap();
                hi - lo
            };
            assert!(width <= previous + 1e-9);
            previous = width;
        }
        // Converged onto the fresh band (100.0 wide at price 1000).
        assert!(previous <= 101.0, "width {previous}");
    }

    #[test]
    fn test_kilocoder_blend_stays_within_global_extent() {
        let config = KiloCoderConfig {
            padding: 0.0,
            ..KiloCoderConfig::default()
        };
        let mut engine = BoundsEngine::new(BoundsMode::KiloCoderLike(config));
        let mut series = RollingSeries::new(500, 1e9);

        let prices = price_walk(200);
        let global_min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
        let global_max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        for (index, price) in prices.iter().enumerate() {
            series.push(SeriesPoint::new(index as f64, *price));
            engine.update(&series, *price);
        }

        // With zero padding the blended bounds are convex combinations of
        // tracked extents, all of which live inside the global extent
        // (modulo the epsilon widening).
        let (min, max) = engine.state().range().unwrap();
        let slack = EpsilonConfig::default().epsilon(global_max);
        assert!(min >= global_min - slack, "min {min} below {global_min}");
        assert!(max <= global_max + slack, "max {max} above {global_max}");
    }

    #[test]
    fn test_near_zero_price_gets_absolute_floor() {
        let mut engine = BoundsEngine::new(BoundsMode::Manual);
        let series = RollingSeries::new(10, 1e9);

        let state = engine.update(&series, 0.0);
        let (min, max) = state.range().unwrap();
        assert!(max - min >= EpsilonConfig::default().absolute_floor);
        assert!(min <= 0.0 && 0.0 <= max);
    }
}
