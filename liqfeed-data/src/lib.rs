#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Liqfeed-Data
//! Streams real-time liquidation events from Binance USD-M futures, Bybit linear perpetuals and
//! OKX swaps, decoding each venue's wire format into one canonical [`LiquidationEvent`].
//!
//! Each subscribed exchange runs on its own [`ConnectionManager`](stream::connection::ConnectionManager)
//! task which connects, subscribes, keeps the connection alive with the venue's heartbeat,
//! and reconnects according to a [`ReconnectPolicy`](stream::reconnect::ReconnectPolicy).
//! Normalised events are forwarded on a single unbounded channel so that one slow venue never
//! blocks another.
//!
//! ## Example
//! ```rust,no_run
//! use liqfeed_data::{
//!     event::ExchangeId, stream::LiquidationStreams, subscription::Subscription,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     let streams = LiquidationStreams::builder()
//!         .subscribe(Subscription::all_markets(ExchangeId::Binance))
//!         .subscribe(Subscription::new(ExchangeId::Bybit, ["BTCUSDT", "ETHUSDT"]))
//!         .subscribe(Subscription::all_markets(ExchangeId::Okx))
//!         .init(event_tx)
//!         .await
//!         .unwrap();
//!
//!     while let Some(event) = event_rx.recv().await {
//!         println!("{event:?}");
//!     }
//!
//!     streams.shutdown().await;
//! }
//! ```

/// Deserialisation helpers for venue numeric strings and epoch timestamps.
pub mod de;

/// All [`Error`](std::error::Error)s generated in `liqfeed-data`.
pub mod error;

/// Canonical [`LiquidationEvent`] and its exchange & side enums.
pub mod event;

/// [`Connector`](exchange::Connector) implementations and wire decoders for each supported
/// exchange.
pub mod exchange;

/// Converts decoder output into canonical [`LiquidationEvent`]s.
pub mod normalise;

/// Connection lifecycle, heartbeats and reconnection for exchange liquidation streams.
pub mod stream;

/// Per-exchange liquidation [`Subscription`](subscription::Subscription).
pub mod subscription;

pub use self::{
    error::DataError,
    event::{ExchangeId, LiquidationEvent, Side},
};

