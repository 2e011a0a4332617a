use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A single observed price update for an instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub instrument: String,
    pub event_time: DateTime<Utc>,
    pub price: f64,
}

impl Tick {
    pub fn new(instrument: impl Into<String>, event_time: DateTime<Utc>, price: f64) -> Self {
        Self {
            instrument: instrument.into(),
            event_time,
            price,
        }
    }

    /// Minute this tick belongs to (event time floored to the minute)
    pub fn minute(&self) -> DateTime<Utc> {
        floor_to_minute(self.event_time)
    }
}

/// Floor a timestamp to minute granularity
pub fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    // duration_trunc only fails for out-of-range timestamps; keep the input then
    ts.duration_trunc(Duration::minutes(1)).unwrap_or(ts)
}

/// One-minute OHLC candle. `tick_count` is the volume proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub instrument: String,
    pub minute: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_count: u32,
}

/// Trade direction of a signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Call => "CALL",
            Direction::Put => "PUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicator values computed from the current candle history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSnapshot {
    pub ema_short: f64,
    pub ema_long: f64,
    /// NaN when the history is too short for the RSI window
    pub rsi: f64,
    pub bb_upper: f64,
    pub bb_mid: f64,
    pub bb_lower: f64,
    pub support: f64,
    pub resistance: f64,
}

/// Identifier of a confluence condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Condition {
    EmaTrend,
    PriceVsEmas,
    RsiZone,
    BollingerTouch,
    CandlePattern,
    Volume,
    SupportResistance,
}

impl Condition {
    pub const ALL: [Condition; 7] = [
        Condition::EmaTrend,
        Condition::PriceVsEmas,
        Condition::RsiZone,
        Condition::BollingerTouch,
        Condition::CandlePattern,
        Condition::Volume,
        Condition::SupportResistance,
    ];

    /// Name used in persisted condition details
    pub fn name(&self, direction: Direction) -> &'static str {
        match (self, direction) {
            (Condition::EmaTrend, _) => "ema",
            (Condition::PriceVsEmas, Direction::Call) => "price_above_emas",
            (Condition::PriceVsEmas, Direction::Put) => "price_below_emas",
            (Condition::RsiZone, _) => "rsi_zone",
            (Condition::BollingerTouch, _) => "bollinger_touch",
            (Condition::CandlePattern, _) => "candle_pattern",
            (Condition::Volume, _) => "volume",
            (Condition::SupportResistance, _) => "sr",
        }
    }
}

/// Boolean outcome of every condition for one direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConditionSet {
    pub ema_trend: bool,
    pub price_vs_emas: bool,
    pub rsi_zone: bool,
    pub bollinger_touch: bool,
    pub candle_pattern: bool,
    pub volume: bool,
    pub support_resistance: bool,
}

impl ConditionSet {
    pub fn get(&self, condition: Condition) -> bool {
        match condition {
            Condition::EmaTrend => self.ema_trend,
            Condition::PriceVsEmas => self.price_vs_emas,
            Condition::RsiZone => self.rsi_zone,
            Condition::BollingerTouch => self.bollinger_touch,
            Condition::CandlePattern => self.candle_pattern,
            Condition::Volume => self.volume,
            Condition::SupportResistance => self.support_resistance,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Condition, bool)> + '_ {
        Condition::ALL.iter().map(move |c| (*c, self.get(*c)))
    }

    /// Number of true conditions (0..=7)
    pub fn confluence_count(&self) -> u8 {
        self.iter().filter(|(_, v)| *v).count() as u8
    }

    /// Details keyed by condition name, in canonical order
    pub fn details(&self, direction: Direction) -> serde_json::Map<String, serde_json::Value> {
        self.iter()
            .map(|(c, v)| (c.name(direction).to_string(), serde_json::Value::Bool(v)))
            .collect()
    }
}

/// A directional signal chosen by the confluence scorer
///
/// Serializes `conditions` keyed by the direction-specific condition names.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCandidate {
    pub instrument: String,
    pub direction: Direction,
    pub confluence_count: u8,
    /// 0..=100, rounded to 2 decimals
    pub probability: f64,
    pub conditions: ConditionSet,
    pub entry_minute: DateTime<Utc>,
    pub expiration_minutes: u32,
}

impl SignalCandidate {
    pub fn details(&self) -> serde_json::Map<String, serde_json::Value> {
        self.conditions.details(self.direction)
    }
}

impl Serialize for SignalCandidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SignalCandidate", 7)?;
        state.serialize_field("instrument", &self.instrument)?;
        state.serialize_field("direction", &self.direction)?;
        state.serialize_field("confluence_count", &self.confluence_count)?;
        state.serialize_field("probability", &self.probability)?;
        state.serialize_field("conditions", &self.details())?;
        state.serialize_field("entry_minute", &self.entry_minute)?;
        state.serialize_field("expiration_minutes", &self.expiration_minutes)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tick_minute_floors() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 59).unwrap()
            + Duration::milliseconds(999);
        let tick = Tick::new("EURUSD", ts, 1.1);
        assert_eq!(tick.minute(), Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_condition_names_follow_direction() {
        assert_eq!(Condition::PriceVsEmas.name(Direction::Call), "price_above_emas");
        assert_eq!(Condition::PriceVsEmas.name(Direction::Put), "price_below_emas");
        assert_eq!(Condition::SupportResistance.name(Direction::Put), "sr");
    }

    #[test]
    fn test_confluence_count() {
        let set = ConditionSet {
            ema_trend: true,
            volume: true,
            support_resistance: true,
            ..Default::default()
        };
        assert_eq!(set.confluence_count(), 3);

        let details = set.details(Direction::Call);
        assert_eq!(details.len(), 7);
        assert_eq!(details["ema"], serde_json::Value::Bool(true));
        assert_eq!(details["rsi_zone"], serde_json::Value::Bool(false));
    }

    #[test]
    fn test_put_signal_json_uses_condition_names() {
        let signal = SignalCandidate {
            instrument: "EURUSD".to_string(),
            direction: Direction::Put,
            confluence_count: 4,
            probability: 61.5,
            conditions: ConditionSet {
                price_vs_emas: true,
                rsi_zone: true,
                volume: true,
                support_resistance: true,
                ..Default::default()
            },
            entry_minute: Utc.with_ymd_and_hms(2024, 3, 1, 10, 1, 0).unwrap(),
            expiration_minutes: 5,
        };

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["direction"], "PUT");

        let conditions = json["conditions"].as_object().unwrap();
        let mut keys: Vec<&str> = conditions.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "bollinger_touch",
                "candle_pattern",
                "ema",
                "price_below_emas",
                "rsi_zone",
                "sr",
                "volume",
            ]
        );
        assert_eq!(conditions["price_below_emas"], true);
        assert_eq!(conditions["sr"], true);
        assert_eq!(conditions["ema"], false);
    }

    #[test]
    fn test_direction_serializes_uppercase() {
        let json = serde_json::to_string(&Direction::Put).unwrap();
        assert_eq!(json, "\"PUT\"");
    }
}
