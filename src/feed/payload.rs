use crate::models::Tick;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Event name carried by enveloped price updates
pub const PRICE_UPDATE_EVENT: &str = "symbol.price.update";

const PRICE_KEYS: [&str; 3] = ["price", "p", "last"];
const TIME_KEYS: [&str; 3] = ["timestamp", "ts", "time"];

/// Turn one upstream payload into a tick
///
/// Accepts a bare object (`{"symbol":"EURUSD","price":1.1,"ts":...}`) or the
/// socket envelope `["message", {"event":"symbol.price.update","data":{...}}]`.
/// Returns `None` for other events and for payloads without a usable symbol or
/// price.
pub fn parse_price_update(payload: &Value) -> Option<Tick> {
    let (data, channel) = match payload {
        Value::Array(items) => {
            let body = items.get(1)?;
            if body.get("event").and_then(Value::as_str) != Some(PRICE_UPDATE_EVENT) {
                return None;
            }
            (body.get("data")?, body.get("channel").and_then(Value::as_str))
        }
        Value::Object(_) => (payload, payload.get("channel").and_then(Value::as_str)),
        _ => return None,
    };

    let instrument = match data.get("symbol").and_then(Value::as_str) {
        Some(symbol) if !symbol.is_empty() => symbol.to_string(),
        _ => channel
            .and_then(|c| c.rsplit(':').next())
            .filter(|s| !s.is_empty())?
            .to_string(),
    };

    let price = match first_number(data, &PRICE_KEYS) {
        Some(p) => p,
        None => {
            tracing::warn!(instrument = %instrument, "Price update without usable price");
            return None;
        }
    };

    let event_time = first_number(data, &TIME_KEYS)
        .and_then(millis_to_datetime)
        .unwrap_or_else(Utc::now);

    Some(Tick::new(instrument, event_time, price))
}

fn first_number(data: &Value, keys: &[&str]) -> Option<f64> {
    let value = keys
        .iter()
        .find_map(|k| data.get(*k).filter(|v| !v.is_null()))?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn millis_to_datetime(ms: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms as i64).single()
}
