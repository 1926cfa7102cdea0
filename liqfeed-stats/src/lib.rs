#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Liqfeed-Stats
//! Aggregates normalised [`LiquidationEvent`](liqfeed_data::LiquidationEvent)s into running
//! statistics for display: bounded history, lifetime totals & counters, the largest
//! liquidation, a daily activity streak, one-way achievements and a whale watch.
//!
//! The [`Engine`](engine::Engine) is the only writer of the
//! [`AggregateState`](state::AggregateState). Readers take snapshots or subscribe to changes
//! through the [`EngineHandle`](engine::EngineHandle).

/// Achievement catalogue and one-way unlock set.
pub mod achievement;

/// Single-writer [`Engine`](engine::Engine) task and its [`EngineHandle`](engine::EngineHandle).
pub mod engine;

/// History display filtering.
pub mod filter;

/// [`AggregateState`](state::AggregateState) and the per-event update algorithm.
pub mod state;

/// Elapsed-day activity streak.
pub mod streak;

/// Retention-windowed whale watch.
pub mod whale;

pub use self::{
    engine::{Engine, EngineConfig, EngineHandle},
    state::{AggregateState, Update},
};
