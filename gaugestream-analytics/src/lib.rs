//! Rolling analytics over live price ticks.
//!
//! The [`engine::AnalyticsEngine`] consumes feed events and publishes
//! per-symbol gauge snapshots plus a cross-symbol trend reading. The
//! building blocks (rolling series, bounds modes, resampling, indicators,
//! anomaly detection, trend math) are plain modules usable on their own.

pub mod anomaly;
pub mod bounds;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod resample;
pub mod series;
pub mod trend;

pub use anomaly::{AnomalyMode, AnomalyVerdict};
pub use bounds::{BoundsEngine, BoundsMode, BoundsState};
pub use config::EngineConfig;
pub use engine::{AnalyticsEngine, GaugeSnapshot, SnapshotReader};
pub use series::{RollingSeries, SeriesPoint, SymbolHistory};
pub use trend::{TrendAggregator, TrendSnapshot};
