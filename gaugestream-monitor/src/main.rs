use std::time::{Duration, Instant};

use smol_str::SmolStr;
use tokio::time::interval;
use tracing::{error, info, warn};

use gaugestream_analytics::engine::AnalyticsEngine;
use gaugestream_analytics::EngineConfig;
use gaugestream_feed::connection::{FeedConfig, FeedConnection, FeedEvent};
use gaugestream_feed::router::{self, MarketCatalog, Resolution, SymbolRouter};
use gaugestream_feed::tick::{Market, Provider, SourceKind, Symbol};
use gaugestream_persist::{HistoryStore, NdjsonStore, SqliteStore, TickRecord};

#[tokio::main]
async fn main() {
    init_logging();

    info!("Starting gaugestream monitor");

    // Symbols configurable via GAUGE_SYMBOLS env var (comma-separated)
    let symbols: Vec<Symbol> = std::env::var("GAUGE_SYMBOLS")
        .unwrap_or_else(|_| "BTCUSDT,ETHUSDT,SOLUSDT".to_string())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SmolStr::new)
        .collect();

    let source = match std::env::var("GAUGE_SOURCE").as_deref() {
        Ok("ticker") => SourceKind::Ticker,
        _ => SourceKind::Trade,
    };

    let mut feed_config = FeedConfig {
        source,
        ..FeedConfig::default()
    };
    if let Ok(endpoint) = std::env::var("GAUGE_ENDPOINT") {
        feed_config.endpoint = endpoint;
    }

    // Route symbols to provider streams; unsupported symbols are reported
    // once and excluded, they never take the whole subscription down.
    let catalog = MarketCatalog::new(Provider::Binance, Market::Global, symbols.clone());
    let resolver = SymbolRouter::new(vec![catalog]);
    let resolutions = resolver.resolve(
        &symbols,
        Provider::Binance,
        &[Market::Global, Market::Us],
        source,
    );
    for (symbol, resolution) in &resolutions {
        if let Resolution::Unsupported(reason) = resolution {
            warn!(%symbol, reason = reason.as_str(), "symbol excluded from subscription");
        }
    }
    let subscription = router::subscription_set(&resolutions);
    if subscription.is_empty() {
        error!("no resolvable symbols, nothing to stream");
        return;
    }
    info!(streams = subscription.len(), "subscription resolved");

    let mut engine_config = EngineConfig::default();
    if let Ok(reference) = std::env::var("GAUGE_REFERENCE") {
        engine_config.reference = SmolStr::new(reference);
    }
    let stale_after = engine_config.stale_after;
    let retention_secs = engine_config.retention_secs;
    let mut engine = AnalyticsEngine::new(engine_config);
    let reader = engine.reader();

    // History backend configurable via GAUGE_STORE env var: sqlite (default)
    // or ndjson. Path via GAUGE_STORE_PATH.
    let store: Box<dyn HistoryStore> = match std::env::var("GAUGE_STORE").as_deref() {
        Ok("ndjson") => {
            let path = std::env::var("GAUGE_STORE_PATH")
                .unwrap_or_else(|_| "gaugestream-history.ndjson".to_string());
            info!(%path, "using ndjson history store");
            Box::new(NdjsonStore::new(path))
        }
        _ => {
            let path = std::env::var("GAUGE_STORE_PATH")
                .unwrap_or_else(|_| "gaugestream-history.db".to_string());
            info!(%path, "using sqlite history store");
            match SqliteStore::open(&path).await {
                Ok(store) => Box::new(store),
                Err(err) => {
                    error!(%err, "failed to open history store");
                    return;
                }
            }
        }
    };

    let (feed, mut events) = FeedConnection::start(feed_config, subscription);

    let snapshot_secs = env_u64("GAUGE_SNAPSHOT_SECS", 5);
    let flush_secs = env_u64("GAUGE_FLUSH_SECS", 60);
    let mut snapshot_timer = interval(Duration::from_secs(snapshot_secs));
    let mut flush_timer = interval(Duration::from_secs(flush_secs));
    let mut stale_timer = interval(stale_after / 2);

    let mut pending: Vec<TickRecord> = Vec::new();
    let mut history: Vec<TickRecord> = Vec::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if let FeedEvent::Tick(tick) = &event {
                        pending.push(TickRecord::from(tick));
                    }
                    engine.on_event(event);
                }
                None => {
                    warn!("feed channel closed");
                    break;
                }
            },
            _ = snapshot_timer.tick() => log_snapshots(&reader),
            _ = stale_timer.tick() => engine.refresh_staleness(Instant::now()),
            _ = flush_timer.tick() => {
                history.append(&mut pending);
                prune_history(&mut history, retention_secs);
                if let Err(err) = store.save_all(&history).await {
                    error!(%err, "history flush failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    // Final flush so ticks received since the last timer survive.
    history.append(&mut pending);
    prune_history(&mut history, retention_secs);
    if let Err(err) = store.save_all(&history).await {
        error!(%err, "final history flush failed");
    }

    let mut feed = feed;
    feed.stop().await;
    info!("gaugestream monitor stopped");
}

fn log_snapshots(reader: &gaugestream_analytics::SnapshotReader) {
    for gauge in reader.gauges() {
        info!(
            symbol = %gauge.symbol,
            price = gauge.price,
            min = gauge.min,
            max = gauge.max,
            position = format!("{:.3}", gauge.position),
            rsi = gauge.rsi.map(|v| format!("{v:.1}")),
            anomaly = gauge.anomaly,
            stale = gauge.stale,
            "gauge"
        );
    }
    if let Some(trend) = reader.trend() {
        info!(
            index = trend.index,
            strength = format!("{:.3}", trend.strength),
            confidence = format!("{:.3}", trend.confidence),
            label = trend.label.as_str(),
            members = trend.members.len(),
            "trend"
        );
    }
}

/// Drop records older than the retention horizon behind the newest one, so
/// the in-memory history and the persisted snapshot stay bounded over a long
/// run.
fn prune_history(history: &mut Vec<TickRecord>, retention_secs: f64) {
    let Some(latest) = history.iter().map(|r| r.timestamp).reduce(f64::max) else {
        return;
    };
    let cutoff = latest - retention_secs;
    history.retain(|record| record.timestamp >= cutoff);
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
