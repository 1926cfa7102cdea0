use chrono::TimeDelta;
use itertools::Itertools;
use liqfeed_data::{
    DataError, ExchangeId,
    normalise::SideRule,
    stream::{
        StreamConfig,
        reconnect::{Backoff, ReconnectPolicy},
    },
    subscription::Subscription,
};
use liqfeed_stats::{EngineConfig, whale::WhaleConfig};
use rust_decimal::Decimal;
use std::{fmt::Display, str::FromStr, time::Duration};
use thiserror::Error;

/// Bybit has no all-market liquidation topic, so these are tracked unless configured.
pub const DEFAULT_BYBIT_SYMBOLS: [&str; 4] = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "KAITOUSDT"];

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("LIQ_EXCHANGES selects no exchange")]
    NoExchanges,

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Process configuration, read once at start-up from `LIQ_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub subscriptions: Vec<Subscription>,
    pub bybit_side_rule: SideRule,
    pub stream: StreamConfig,
    pub engine: EngineConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset variables take their defaults; set but invalid
    /// variables are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let exchanges = match lookup("LIQ_EXCHANGES") {
            None => ExchangeId::ALL.to_vec(),
            Some(value) => split_list(&value)
                .map(ExchangeId::from_str)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .unique()
                .collect(),
        };
        if exchanges.is_empty() {
            return Err(ConfigError::NoExchanges);
        }

        let subscriptions = exchanges
            .into_iter()
            .map(|exchange| -> Result<Subscription, ConfigError> {
                let var = symbols_var(exchange);
                let subscription = match (lookup(var), exchange) {
                    (Some(value), _) => Subscription::new(exchange, split_list(&value)),
                    (None, ExchangeId::Bybit) => Subscription::new(exchange, DEFAULT_BYBIT_SYMBOLS),
                    (None, _) => Subscription::all_markets(exchange),
                };
                subscription.validate()?;
                Ok(subscription)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bybit_side_rule = match lookup("LIQ_BYBIT_SIDE_RULE") {
            None => SideRule::Invert,
            Some(value) => SideRule::from_str(&value)?,
        };

        let reconnect_mode = lookup("LIQ_RECONNECT").map(|value| value.trim().to_lowercase());
        let reconnect = match reconnect_mode.as_deref() {
            None | Some("backoff") => {
                let base = parse_var(&lookup, "LIQ_RECONNECT_BASE_MS", 1000u64)?;
                let max = parse_var(&lookup, "LIQ_RECONNECT_MAX_MS", 60_000u64)?;
                if max < base {
                    return Err(invalid(
                        "LIQ_RECONNECT_MAX_MS",
                        max,
                        "must be at least LIQ_RECONNECT_BASE_MS",
                    ));
                }
                ReconnectPolicy::Backoff(Backoff {
                    base: Duration::from_millis(base),
                    max: Duration::from_millis(max),
                    max_attempts: parse_var(&lookup, "LIQ_RECONNECT_MAX_ATTEMPTS", 0u32)?,
                    ..Backoff::default()
                })
            }
            Some("never") => ReconnectPolicy::Never,
            Some(other) => {
                return Err(invalid("LIQ_RECONNECT", other, "expected backoff or never"));
            }
        };

        let connect_timeout = positive_var(&lookup, "LIQ_CONNECT_TIMEOUT_SECS", 10u64)?;
        let read_timeout = positive_var(&lookup, "LIQ_READ_TIMEOUT_SECS", 120u64)?;

        let stream = StreamConfig::default()
            .with_reconnect(reconnect)
            .with_connect_timeout(Duration::from_secs(connect_timeout))
            .with_read_timeout(Duration::from_secs(read_timeout));

        let history_capacity = positive_var(&lookup, "LIQ_HISTORY_CAPACITY", 100usize)?;

        let threshold = parse_var(&lookup, "LIQ_WHALE_THRESHOLD", Decimal::from(250_000))?;
        if threshold.is_sign_negative() {
            return Err(invalid("LIQ_WHALE_THRESHOLD", threshold, "must not be negative"));
        }

        let retention_mins = positive_var(&lookup, "LIQ_WHALE_RETENTION_MINS", 60i64)?;
        let retention = TimeDelta::try_minutes(retention_mins)
            .ok_or_else(|| invalid("LIQ_WHALE_RETENTION_MINS", retention_mins, "out of range"))?;

        let engine = EngineConfig::default()
            .with_history_capacity(history_capacity)
            .with_whales(
                WhaleConfig::default()
                    .with_threshold(threshold)
                    .with_retention(retention),
            );

        Ok(Self {
            subscriptions,
            bybit_side_rule,
            stream,
            engine,
        })
    }
}

fn symbols_var(exchange: ExchangeId) -> &'static str {
    match exchange {
        ExchangeId::Binance => "LIQ_BINANCE_SYMBOLS",
        ExchangeId::Bybit => "LIQ_BYBIT_SYMBOLS",
        ExchangeId::Okx => "LIQ_OKX_SYMBOLS",
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn invalid(var: &'static str, value: impl Display, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|error| invalid(var, &value, error)),
    }
}

fn positive_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Display,
    T::Err: Display,
{
    let value = parse_var(lookup, var, default)?;
    if value > T::default() {
        Ok(value)
    } else {
        Err(invalid(var, value, "must be greater than zero"))
    }
}
