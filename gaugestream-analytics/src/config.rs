//! Engine configuration with tuned defaults.

use std::time::Duration;

use smol_str::SmolStr;

use gaugestream_feed::tick::Symbol;

use crate::anomaly::AnomalyMode;
use crate::bounds::{AdaptiveConfig, BoundsMode, EpsilonConfig};
use crate::resample::BucketReduce;
use crate::trend::TrendConfig;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-symbol rolling buffer capacity, in points.
    pub capacity: usize,
    /// Retention horizon for rolling buffers, in seconds.
    pub retention_secs: f64,
    /// Symbol whose price denominates the ratio series.
    pub reference: Symbol,
    pub bounds: BoundsMode,
    pub epsilon: EpsilonConfig,
    pub anomaly: AnomalyMode,
    /// Target series size for the indicator and anomaly pass; raw history is
    /// bucket-resampled down to this many points first.
    pub resample_points: usize,
    pub resample_method: BucketReduce,
    pub trend: TrendConfig,
    /// Window handed to the trend aggregator per tick, in seconds.
    pub trend_window_secs: f64,
    pub rsi_period: usize,
    /// Trailing returns used for the volatility readout.
    pub volatility_window: usize,
    /// A symbol with no tick for this long reads as stale.
    pub stale_after: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 2_000,
            retention_secs: 3_600.0,
            reference: SmolStr::new_static("BTCUSDT"),
            bounds: BoundsMode::Adaptive(AdaptiveConfig::default()),
            epsilon: EpsilonConfig::default(),
            anomaly: AnomalyMode::Composite,
            resample_points: 500,
            resample_method: BucketReduce::Last,
            trend: TrendConfig::default(),
            trend_window_secs: 60.0,
            rsi_period: 14,
            volatility_window: 30,
            stale_after: Duration::from_secs(10),
        }
    }
}
