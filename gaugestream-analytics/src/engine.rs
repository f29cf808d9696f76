//! Analytics coordinator.
//!
//! Owns all per-symbol state on one task: rolling histories, bounds engines
//! and the trend aggregator are mutated only here, fed by the channel the
//! feed worker writes into. Readers get the latest per-symbol gauge state
//! through a shared snapshot map behind an `RwLock`; the lock is held only
//! for the copy-in/copy-out, never across computation.

use std::sync::Arc;
use std::time::Instant;

use fnv::FnvHashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gaugestream_feed::connection::FeedEvent;
use gaugestream_feed::tick::{Symbol, Tick};

use crate::anomaly::{self, AnomalyMode};
use crate::bounds::{BoundsEngine, BoundsMode};
use crate::config::EngineConfig;
use crate::indicators;
use crate::resample;
use crate::series::{SeriesPoint, SymbolHistory};
use crate::trend::{TrendAggregator, TrendSnapshot};

/// Latest gauge reading for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSnapshot {
    pub symbol: Symbol,
    pub price: f64,
    pub min: f64,
    pub max: f64,
    /// Price position inside [min, max], 0..1.
    pub position: f64,
    /// Stddev of recent bar-to-bar returns.
    pub volatility: f64,
    pub rsi: Option<f64>,
    pub anomaly: Option<&'static str>,
    pub stale: bool,
    /// Feed timestamp of the tick behind this reading, seconds.
    pub timestamp: f64,
}

type SnapshotMap = FnvHashMap<Symbol, GaugeSnapshot>;

/// Cheap clonable read handle onto the engine's published state.
#[derive(Debug, Clone, Default)]
pub struct SnapshotReader {
    snapshots: Arc<RwLock<SnapshotMap>>,
    trend: Arc<RwLock<Option<TrendSnapshot>>>,
}

impl SnapshotReader {
    pub fn gauge(&self, symbol: &Symbol) -> Option<GaugeSnapshot> {
        self.snapshots.read().get(symbol).cloned()
    }

    pub fn gauges(&self) -> Vec<GaugeSnapshot> {
        let mut all: Vec<GaugeSnapshot> = self.snapshots.read().values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub fn trend(&self) -> Option<TrendSnapshot> {
        self.trend.read().clone()
    }
}

struct SymbolState {
    history: SymbolHistory,
    bounds: BoundsEngine,
    last_seen: Instant,
}

/// Single-writer analytics state machine.
pub struct AnalyticsEngine {
    config: EngineConfig,
    symbols: FnvHashMap<Symbol, SymbolState>,
    trend: TrendAggregator,
    reader: SnapshotReader,
    reference_price: Option<f64>,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig) -> Self {
        let trend = TrendAggregator::new(config.trend);
        Self {
            config,
            symbols: FnvHashMap::default(),
            trend,
            reader: SnapshotReader::default(),
            reference_price: None,
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    /// Drive the engine from a feed event channel until it closes. Staleness
    /// is re-evaluated on a timer so quiet symbols flip to stale without
    /// waiting for traffic.
    pub async fn run(mut self, mut events: mpsc::Receiver<FeedEvent>) {
        let mut sweep = tokio::time::interval(self.config.stale_after / 2);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        info!("feed channel closed, analytics engine stopping");
                        return;
                    }
                },
                _ = sweep.tick() => self.refresh_staleness(Instant::now()),
            }
        }
    }

    pub fn on_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Tick(tick) => self.on_tick(&tick),
            FeedEvent::State(state) => info!(%state, "feed connection state"),
            FeedEvent::Error(error) => warn!(%error, "feed error"),
            FeedEvent::MessageRates(rates) => {
                for (symbol, per_second) in rates {
                    debug!(%symbol, per_second, "message rate");
                }
            }
        }
    }

    pub fn on_tick(&mut self, tick: &Tick) {
        if tick.symbol == self.config.reference {
            self.reference_price = Some(tick.price);
        }
        let reference_price = self.reference_price;

        let state = self.symbols.entry(tick.symbol.clone()).or_insert_with(|| {
            debug!(symbol = %tick.symbol, "tracking new symbol");
            SymbolState {
                history: SymbolHistory::new(self.config.capacity, self.config.retention_secs),
                bounds: BoundsEngine::with_epsilon(
                    self.config.bounds.clone(),
                    self.config.epsilon,
                ),
                last_seen: Instant::now(),
            }
        });

        state
            .history
            .push(tick.timestamp, tick.price, reference_price);
        state.last_seen = Instant::now();
        let bounds = state.bounds.update(&state.history.prices, tick.price);

        // Indicators and anomaly rules see the bounded resampled series, so
        // their cost stays fixed regardless of the raw buffer size.
        let points: Vec<SeriesPoint> = state.history.prices.iter().copied().collect();
        let resampled = resample::bucket_resample(
            &points,
            self.config.resample_points,
            self.config.resample_method,
        );
        let prices: Vec<f64> = resampled.iter().map(|p| p.value).collect();
        let rsi = indicators::rsi_last(&prices, self.config.rsi_period);
        let volatility = return_stddev(&prices, self.config.volatility_window);
        let verdict = anomaly::detect(&prices, &self.config.anomaly);

        let (min, max) = bounds.range().unwrap_or((tick.price, tick.price));
        let position = if max > min {
            ((tick.price - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.5
        };

        let snapshot = GaugeSnapshot {
            symbol: tick.symbol.clone(),
            price: tick.price,
            min,
            max,
            position,
            volatility,
            rsi,
            anomaly: verdict.triggered.then_some(verdict.label),
            stale: false,
            timestamp: tick.timestamp,
        };

        let trend_window = state.history.prices.snapshot(self.config.trend_window_secs);
        self.trend.observe(&tick.symbol, &trend_window);
        let trend = self.trend.recompute().cloned();

        self.reader
            .snapshots
            .write()
            .insert(tick.symbol.clone(), snapshot);
        *self.reader.trend.write() = trend;
    }

    /// Flip symbols with no recent tick to stale.
    pub fn refresh_staleness(&mut self, now: Instant) {
        let threshold = self.config.stale_after;
        let mut snapshots = self.reader.snapshots.write();
        for (symbol, state) in &self.symbols {
            if now.duration_since(state.last_seen) >= threshold {
                if let Some(snapshot) = snapshots.get_mut(symbol) {
                    if !snapshot.stale {
                        warn!(%symbol, "symbol went stale");
                        snapshot.stale = true;
                    }
                }
            }
        }
    }

    /// Stop tracking a symbol entirely.
    pub fn remove_symbol(&mut self, symbol: &Symbol) {
        self.symbols.remove(symbol);
        self.trend.remove(symbol);
        self.reader.snapshots.write().remove(symbol);
        info!(%symbol, "symbol removed");
    }

    /// Rename resets all derived state; history under the old name does not
    /// carry over, the new name starts from an empty buffer on its first tick.
    pub fn rename_symbol(&mut self, from: &Symbol, to: &Symbol) {
        self.remove_symbol(from);
        info!(%from, %to, "symbol renamed, state reset");
    }

    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        info!(mode = mode.label(), "bounds mode changed");
        self.config.bounds = mode.clone();
        for state in self.symbols.values_mut() {
            state.bounds.set_mode(mode.clone());
        }
    }

    pub fn set_anomaly_mode(&mut self, mode: AnomalyMode) {
        self.config.anomaly = mode;
    }

    /// Change the ratio denominator. Existing ratio series are cleared since
    /// they were computed against the old reference.
    pub fn set_reference(&mut self, reference: Symbol) {
        if reference == self.config.reference {
            return;
        }
        info!(%reference, "reference symbol changed");
        self.config.reference = reference;
        self.reference_price = None;
        for state in self.symbols.values_mut() {
            state.history.ratios.clear();
        }
    }

    pub fn exclude_from_trend(&mut self, symbol: &Symbol) {
        self.trend.exclude(symbol);
    }

    pub fn history(&self, symbol: &Symbol) -> Option<&SymbolHistory> {
        self.symbols.get(symbol).map(|state| &state.history)
    }
}

fn return_stddev(prices: &[f64], window: usize) -> f64 {
    if prices.len() < 3 {
        return 0.0;
    }
    let start = prices.len().saturating_sub(window + 1);
    let returns: Vec<f64> = prices[start..]
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
    use chrono::Utc;
    use smol_str::SmolStr;
    use std::time::Duration;

    use gaugestream_feed::tick::{Market, Provider, SourceKind};

    fn tick(symbol: &str, timestamp: f64, price: f64) -> Tick {
        Tick {
            symbol: SmolStr::new(symbol),
            timestamp,
            price,
            source: SourceKind::Trade,
            provider: Provider::Binance,
            market: Market::Global,
            sequence: 0,
            time_received: Utc::now(),
        }
    }

    #[test]
    fn test_tick_produces_snapshot_with_invariants() {
        let mut engine = AnalyticsEngine::new(EngineConfig::default());
        let reader = engine.reader();
        let symbol = SmolStr::new("BTCUSDT");

        for (ts, price) in [(100.0, 50_000.0), (101.0, 50_100.0), (102.0, 49_900.0)] {
            engine.on_event(FeedEvent::Tick(tick("BTCUSDT", ts, price)));
        }

        let snapshot = reader.gauge(&symbol).unwrap();
        assert_eq!(snapshot.price, 49_900.0);
        assert!(snapshot.min <= 49_900.0);
        assert!(snapshot.max >= 50_100.0);
        assert!((0.0..=1.0).contains(&snapshot.position));
        assert!(!snapshot.stale);
        assert_eq!(snapshot.timestamp, 102.0);
    }

    #[test]
    fn test_ratio_series_follows_reference() {
        let mut engine = AnalyticsEngine::new(EngineConfig::default());
        let eth = SmolStr::new("ETHUSDT");

        // ETH before any reference price: no ratio point.
        engine.on_tick(&tick("ETHUSDT", 100.0, 3_000.0));
        assert_eq!(engine.history(&eth).unwrap().ratios.len(), 0);

        engine.on_tick(&tick("BTCUSDT", 101.0, 60_000.0));
        engine.on_tick(&tick("ETHUSDT", 102.0, 3_000.0));

        let ratios = engine.history(&eth).unwrap().ratios.values();
        assert_eq!(ratios, vec![0.05]);
    }

    #[test]
    fn test_reference_change_clears_ratios() {
        let mut engine = AnalyticsEngine::new(EngineConfig::default());
        let eth = SmolStr::new("ETHUSDT");

        engine.on_tick(&tick("BTCUSDT", 100.0, 60_000.0));
        engine.on_tick(&tick("ETHUSDT", 101.0, 3_000.0));
        assert_eq!(engine.history(&eth).unwrap().ratios.len(), 1);

        engine.set_reference(SmolStr::new("SOLUSDT"));
        assert_eq!(engine.history(&eth).unwrap().ratios.len(), 0);
    }

    #[test]
    fn test_remove_symbol_resets_everything() {
        let mut engine = AnalyticsEngine::new(EngineConfig::default());
        let reader = engine.reader();
        let symbol = SmolStr::new("BTCUSDT");

        engine.on_tick(&tick("BTCUSDT", 100.0, 50_000.0));
        assert!(reader.gauge(&symbol).is_some());

        engine.remove_symbol(&symbol);
        assert!(reader.gauge(&symbol).is_none());
        assert!(engine.history(&symbol).is_none());

        // Re-adding starts from a fresh buffer.
        engine.on_tick(&tick("BTCUSDT", 200.0, 51_000.0));
        assert_eq!(engine.history(&symbol).unwrap().prices.len(), 1);
    }

    #[test]
    fn test_staleness_flips_only_quiet_symbols() {
        let config = EngineConfig {
            stale_after: Duration::from_millis(50),
            ..EngineConfig::default()
        };
        let mut engine = AnalyticsEngine::new(config);
        let reader = engine.reader();

        engine.on_tick(&tick("BTCUSDT", 100.0, 50_000.0));
        engine.on_tick(&tick("ETHUSDT", 100.0, 3_000.0));

        // Sweep far in the future: both stale.
        engine.refresh_staleness(Instant::now() + Duration::from_secs(1));
        assert!(reader.gauge(&SmolStr::new("BTCUSDT")).unwrap().stale);
        assert!(reader.gauge(&SmolStr::new("ETHUSDT")).unwrap().stale);

        // A fresh tick clears the flag for that symbol only.
        engine.on_tick(&tick("BTCUSDT", 101.0, 50_100.0));
        assert!(!reader.gauge(&SmolStr::new("BTCUSDT")).unwrap().stale);
        assert!(reader.gauge(&SmolStr::new("ETHUSDT")).unwrap().stale);
    }

    #[test]
    fn test_trend_published_alongside_gauges() {
        let mut engine = AnalyticsEngine::new(EngineConfig::default());
        let reader = engine.reader();

        for step in 0..30 {
            engine.on_tick(&tick(
                "BTCUSDT",
                100.0 + step as f64,
                50_000.0 + step as f64 * 10.0,
            ));
        }

        let trend = reader.trend().unwrap();
        assert!(trend.index > 0.0);
        assert_eq!(trend.members, vec![SmolStr::new("BTCUSDT")]);
    }

    #[test]
    fn test_indicators_see_resampled_series() {
        // A tight resample budget collapses 40 raw points to 5, too few for
        // a 14-period RSI; the default budget leaves them untouched.
        let config = EngineConfig {
            resample_points: 5,
            ..EngineConfig::default()
        };
        let mut engine = AnalyticsEngine::new(config);
        let reader = engine.reader();
        for step in 0..40 {
            engine.on_tick(&tick("BTCUSDT", step as f64, 100.0 + step as f64));
        }
        assert!(reader.gauge(&SmolStr::new("BTCUSDT")).unwrap().rsi.is_none());

        let mut engine = AnalyticsEngine::new(EngineConfig::default());
        let reader = engine.reader();
        for step in 0..40 {
            engine.on_tick(&tick("BTCUSDT", step as f64, 100.0 + step as f64));
        }
        assert!(reader.gauge(&SmolStr::new("BTCUSDT")).unwrap().rsi.is_some());
    }

    #[test]
    fn test_gauges_listing_is_sorted() {
        let mut engine = AnalyticsEngine::new(EngineConfig::default());
        let reader = engine.reader();

        engine.on_tick(&tick("ETHUSDT", 100.0, 3_000.0));
        engine.on_tick(&tick("BTCUSDT", 100.0, 50_000.0));

        let symbols: Vec<Symbol> = reader.gauges().into_iter().map(|g| g.symbol).collect();
        assert_eq!(symbols, vec![SmolStr::new("BTCUSDT"), SmolStr::new("ETHUSDT")]);
    }
}
