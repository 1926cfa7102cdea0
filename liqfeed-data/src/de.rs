//! Deserialisation helpers shared by the exchange payload models.

use crate::{error::DataError, event::ExchangeId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de::Error};
use std::str::FromStr;

/// Exchanges send numerics either as JSON strings ("0.5") or as bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StrOrNumber {
    Str(String),
    Number(serde_json::Number),
}

impl StrOrNumber {
    fn into_string(self) -> String {
        match self {
            StrOrNumber::Str(value) => value,
            StrOrNumber::Number(value) => value.to_string(),
        }
    }
}

/// Parse a decimal string, accepting scientific notation ("1.5e-3") as a fallback.
pub fn parse_decimal(input: &str) -> Option<Decimal> {
    let input = input.trim();
    Decimal::from_str(input)
        .or_else(|_| Decimal::from_scientific(input))
        .ok()
}

/// Parse a decimal payload field, attributing failures to the `exchange` and `field`.
pub fn parse_decimal_field(
    exchange: ExchangeId,
    field: &'static str,
    input: &str,
) -> Result<Decimal, DataError> {
    parse_decimal(input).ok_or_else(|| DataError::InvalidField {
        exchange,
        field,
        value: input.to_string(),
    })
}

/// Convert epoch milliseconds into a [`DateTime<Utc>`].
pub fn datetime_utc_from_epoch_ms(epoch_ms: u64) -> Option<DateTime<Utc>> {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Parse an epoch milliseconds string or number into a [`DateTime<Utc>`].
pub fn parse_epoch_ms(input: &str) -> Option<DateTime<Utc>> {
    input
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(datetime_utc_from_epoch_ms)
}

/// Deserialize a string or number as a [`Decimal`].
pub fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = StrOrNumber::deserialize(deserializer)?.into_string();
    parse_decimal(&raw).ok_or_else(|| D::Error::custom(format!("invalid decimal: {raw}")))
}

/// Deserialize a string or number of epoch milliseconds as a [`DateTime<Utc>`].
pub fn de_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = StrOrNumber::deserialize(deserializer)?.into_string();
    parse_epoch_ms(&raw).ok_or_else(|| D::Error::custom(format!("invalid epoch ms: {raw}")))
}

/// Deserialize a case-insensitive side string as a [`Side`](crate::event::Side).
pub fn de_side<'de, D>(deserializer: D) -> Result<crate::event::Side, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(D::Error::custom)
}
