//! Feed connection state machine.
//!
//! One `FeedConnection` owns one live network session to one provider for a
//! given subscription set. The worker task is the only place that touches the
//! transport; consumers receive immutable [`Tick`]s and observability events
//! over an mpsc channel. Reconnection is sequential: the old session is fully
//! closed before a new one is opened.

use crate::{
    backoff::ReconnectPolicy,
    error::FeedError,
    liveness::{Liveness, MessageRate},
    protocol::parse_frame,
    tick::{Market, Provider, SourceKind, Symbol, Tick},
};
use chrono::Utc;
use derive_more::Display;
use fnv::FnvHashMap;
use futures::{SinkExt, StreamExt};
use smol_str::SmolStr;
use std::{collections::BTreeSet, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle state of a [`FeedConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    #[display("disconnected")]
    Disconnected,
    #[display("connecting")]
    Connecting,
    #[display("connected")]
    Connected,
    #[display("closing")]
    Closing,
}

/// Configuration for one feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Combined-stream endpoint base, eg/ `wss://host/stream?streams=`.
    pub endpoint: String,
    pub provider: Provider,
    pub market: Market,
    /// Message mode requested from the provider.
    pub source: SourceKind,
    pub ping_interval: Duration,
    pub watchdog_interval: Duration,
    pub pong_timeout: Duration,
    pub idle_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub channel_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://stream.binance.com:9443/stream?streams=".to_string(),
            provider: Provider::Binance,
            market: Market::Global,
            source: SourceKind::Trade,
            ping_interval: Duration::from_secs(10),
            watchdog_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            channel_buffer: 1000,
        }
    }
}

impl FeedConfig {
    /// Full websocket URL for a subscription set.
    pub fn stream_url(&self, subscription: &BTreeSet<SmolStr>) -> Result<Url, FeedError> {
        let streams = subscription
            .iter()
            .map(SmolStr::as_str)
            .collect::<Vec<_>>()
            .join("/");
        let raw = format!("{}{}", self.endpoint, streams);
        Url::parse(&raw).map_err(|error| FeedError::Endpoint(format!("{raw}: {error}")))
    }
}

/// Events emitted by the connection worker.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Tick(Tick),
    State(ConnectionState),
    /// Non-fatal failure, surfaced for observability only.
    Error(FeedError),
    /// Per-symbol messages/second over the last duty-cycle window.
    MessageRates(Vec<(Symbol, f64)>),
}

enum Command {
    SetSubscription(BTreeSet<SmolStr>),
    Stop,
}

/// Why a live session ended.
enum SessionEnd {
    Stopped,
    Resubscribe(BTreeSet<SmolStr>),
    Terminal(FeedError),
}

/// Handle to a running feed-connection worker.
pub struct FeedConnection {
    command_tx: mpsc::Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl FeedConnection {
    /// Spawn the worker and return the handle plus the event receiver.
    pub fn start(
        config: FeedConfig,
        subscription: BTreeSet<SmolStr>,
    ) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer);
        let (command_tx, command_rx) = mpsc::channel(16);

        let worker = tokio::spawn(run_connection_loop(
            config,
            subscription,
            command_rx,
            event_tx,
        ));

        (
            Self {
                command_tx,
                worker: Some(worker),
            },
            event_rx,
        )
    }

    /// Replace the subscription set. A changed set forces a full reconnect
    /// with the new streams.
    pub async fn set_subscription(&self, subscription: BTreeSet<SmolStr>) -> Result<(), FeedError> {
        self.command_tx
            .send(Command::SetSubscription(subscription))
            .await
            .map_err(|_| FeedError::Stopped)
    }

    /// Stop the worker. Idempotent; no further [`FeedEvent::Tick`] is emitted
    /// after this returns.
    pub async fn stop(&mut self) {
        let _ = self.command_tx.send(Command::Stop).await;
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

async fn run_connection_loop(
    config: FeedConfig,
    mut subscription: BTreeSet<SmolStr>,
    mut command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<FeedEvent>,
) {
    let mut attempt: u32 = 0;
    // Sequence numbers survive reconnects; per-symbol ordering is what the
    // downstream store relies on.
    let mut sequences: FnvHashMap<Symbol, u64> = FnvHashMap::default();

    loop {
        // Nothing to stream: park until the set changes or we are stopped.
        while subscription.is_empty() {
            match command_rx.recv().await {
                Some(Command::SetSubscription(next)) => subscription = next,
                Some(Command::Stop) | None => {
                    let _ = event_tx.send(FeedEvent::State(ConnectionState::Disconnected)).await;
                    return;
                }
            }
        }

        let _ = event_tx.send(FeedEvent::State(ConnectionState::Connecting)).await;

        let url = match config.stream_url(&subscription) {
            Ok(url) => url,
            Err(error) => {
                // Unusable endpoint: surface it, then park for commands.
                let _ = event_tx.send(FeedEvent::Error(error)).await;
                subscription.clear();
                continue;
            }
        };

        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!(provider = %config.provider, market = %config.market, "feed connected");
                attempt = 0;
                let _ = event_tx.send(FeedEvent::State(ConnectionState::Connected)).await;

                let end = run_session(
                    &config,
                    &subscription,
                    stream,
                    &mut command_rx,
                    &event_tx,
                    &mut sequences,
                )
                .await;

                match end {
                    SessionEnd::Stopped => {
                        let _ = event_tx.send(FeedEvent::State(ConnectionState::Disconnected)).await;
                        return;
                    }
                    SessionEnd::Resubscribe(next) => {
                        // Old session is closed; reconnect immediately with
                        // the new set, no backoff.
                        subscription = next;
                        continue;
                    }
                    SessionEnd::Terminal(error) => {
                        warn!(%error, "feed session ended, will reconnect");
                        let _ = event_tx.send(FeedEvent::Error(error)).await;
                    }
                }
            }
            Err(error) => {
                let error = FeedError::Transport(error.to_string());
                warn!(%error, attempt, "feed connect failed");
                let _ = event_tx.send(FeedEvent::Error(error)).await;
            }
        }

        // Schedule the next attempt, staying responsive to commands.
        let delay = config.reconnect.delay(attempt);
        attempt = attempt.saturating_add(1);
        debug!(?delay, attempt, "scheduling feed reconnect");

        tokio::select! {
            _ = sleep(delay) => {}
            command = command_rx.recv() => match command {
                Some(Command::SetSubscription(next)) => subscription = next,
                Some(Command::Stop) | None => {
                    let _ = event_tx.send(FeedEvent::State(ConnectionState::Disconnected)).await;
                    return;
                }
            }
        }
    }
}

async fn run_session(
    config: &FeedConfig,
    subscription: &BTreeSet<SmolStr>,
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    command_rx: &mut mpsc::Receiver<Command>,
    event_tx: &mpsc::Sender<FeedEvent>,
    sequences: &mut FnvHashMap<Symbol, u64>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    let mut ping = tokio::time::interval(config.ping_interval);
    let mut watchdog = tokio::time::interval(config.watchdog_interval);
    // The first tick of a tokio interval fires immediately; skip it so a
    // fresh session is not pinged or inspected at age zero.
    ping.tick().await;
    watchdog.tick().await;

    let mut liveness = Liveness::new(config.pong_timeout, config.idle_timeout);
    let mut rates = MessageRate::new(MessageRate::DEFAULT_WINDOW);

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(Command::SetSubscription(next)) => {
                    if &next != subscription {
                        let _ = event_tx.send(FeedEvent::State(ConnectionState::Closing)).await;
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Resubscribe(next);
                    }
                }
                Some(Command::Stop) | None => {
                    let _ = event_tx.send(FeedEvent::State(ConnectionState::Closing)).await;
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Stopped;
                }
            },

            _ = ping.tick() => {
                if write.send(Message::Ping(vec![].into())).await.is_err() {
                    return SessionEnd::Terminal(FeedError::Transport(
                        "ping send failed".to_string(),
                    ));
                }
            }

            _ = watchdog.tick() => {
                if let Some(reason) = liveness.staleness(Instant::now()) {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Terminal(FeedError::Liveness(format!("{reason:?}")));
                }
            }

            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    liveness.record_message();

                    let Some(raw) = parse_frame(&text) else {
                        // Malformed or unknown frame: dropped, never fatal.
                        debug!("dropped unparseable feed frame");
                        continue;
                    };

                    if let Some(window) = rates.record(&raw.symbol) {
                        let _ = event_tx.send(FeedEvent::MessageRates(window)).await;
                    }

                    let sequence = sequences.entry(raw.symbol.clone()).or_insert(0);
                    *sequence += 1;

                    let tick = Tick {
                        symbol: raw.symbol,
                        timestamp: raw.timestamp,
                        price: raw.price,
                        source: raw.source,
                        provider: config.provider,
                        market: config.market,
                        sequence: *sequence,
                        time_received: Utc::now(),
                    };

                    if event_tx.send(FeedEvent::Tick(tick)).await.is_err() {
                        // Consumer gone; nothing left to stream for.
                        return SessionEnd::Stopped;
                    }
                }
                Some(Ok(Message::Pong(_))) => liveness.record_pong(),
                Some(Ok(Message::Ping(_))) => liveness.record_message(),
                Some(Ok(Message::Close(_))) => {
                    return SessionEnd::Terminal(FeedError::Transport(
                        "remote closed connection".to_string(),
                    ));
                }
                Some(Err(error)) => {
                    return SessionEnd::Terminal(FeedError::Transport(error.to_string()));
                }
                None => {
                    return SessionEnd::Terminal(FeedError::Transport(
                        "stream ended".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }
}
