//! Resilient exchange tick-stream connections.
//!
//! A [`FeedConnection`](connection::FeedConnection) owns one live websocket
//! session to one provider and emits normalised [`Tick`](tick::Tick)s over an
//! mpsc channel, self-healing through reconnect-with-backoff and a liveness
//! watchdog. The [`SymbolRouter`](router::SymbolRouter) maps abstract tracked
//! symbols onto concrete provider stream identifiers across markets.

pub mod backoff;
pub mod connection;
pub mod error;
pub mod liveness;
pub mod protocol;
pub mod router;
pub mod tick;

pub use backoff::ReconnectPolicy;
pub use connection::{ConnectionState, FeedConfig, FeedConnection, FeedEvent};
pub use error::FeedError;
pub use router::{MarketCatalog, Resolution, SymbolRouter, UnsupportedReason};
pub use tick::{Market, Provider, SourceKind, Symbol, Tick};
