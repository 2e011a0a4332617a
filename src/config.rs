use crate::error::ConfigError;
use crate::models::Condition;
use crate::notify::WebhookChannel;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "signalbot";
const ENV_PREFIX: &str = "SIGNALBOT";

/// Canonical keys of the weight table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum WeightKey {
    Ema,
    Candle,
    Rsi,
    Bollinger,
    Volume,
    Sr,
}

impl WeightKey {
    /// Weight key a condition is scored under
    pub fn for_condition(condition: Condition) -> WeightKey {
        match condition {
            Condition::EmaTrend | Condition::PriceVsEmas => WeightKey::Ema,
            Condition::RsiZone => WeightKey::Rsi,
            Condition::BollingerTouch => WeightKey::Bollinger,
            Condition::CandlePattern => WeightKey::Candle,
            Condition::Volume => WeightKey::Volume,
            Condition::SupportResistance => WeightKey::Sr,
        }
    }
}

/// Per-condition weights. Keys left out of the table score with a uniform
/// fallback of 1 / (number of conditions).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct WeightTable(HashMap<WeightKey, f64>);

impl Default for WeightTable {
    fn default() -> Self {
        Self(HashMap::from([
            (WeightKey::Ema, 0.20),
            (WeightKey::Candle, 0.20),
            (WeightKey::Rsi, 0.15),
            (WeightKey::Bollinger, 0.15),
            (WeightKey::Volume, 0.15),
            (WeightKey::Sr, 0.15),
        ]))
    }
}

impl WeightTable {
    pub fn new(weights: HashMap<WeightKey, f64>) -> Self {
        Self(weights)
    }

    /// Weight of a condition, falling back to uniform when its key is unset
    pub fn weight(&self, condition: Condition) -> f64 {
        self.0
            .get(&WeightKey::for_condition(condition))
            .copied()
            .unwrap_or(1.0 / Condition::ALL.len() as f64)
    }

    /// Sum of weights over one full condition set
    pub fn total(&self) -> f64 {
        Condition::ALL.iter().map(|c| self.weight(*c)).sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, weight) in &self.0 {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "weight for {:?} must be a non-negative number, got {}",
                    key, weight
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(ConfigError::Validation(
                "weights must not all be zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Instruments whose ticks are aggregated; everything else is ignored
    pub monitored_instruments: BTreeSet<String>,
    pub min_confluences: u8,
    pub history_capacity: usize,
    pub warmup_candles: usize,
    pub expiration_minutes: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            monitored_instruments: BTreeSet::new(),
            min_confluences: 3,
            history_capacity: 2000,
            warmup_candles: 50,
            expiration_minutes: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorSettings {
    pub ema_short: usize,
    pub ema_long: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    pub sr_lookback: usize,
    /// Fractional distance counted as touching a Bollinger band
    pub band_proximity: f64,
    /// Fractional distance counted as sitting on support/resistance
    pub sr_proximity: f64,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_short: 9,
            ema_long: 21,
            rsi_period: 14,
            bb_period: 20,
            bb_std: 2.0,
            sr_lookback: 50,
            band_proximity: 0.002,
            sr_proximity: 0.005,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifySettings {
    pub probability_threshold: f64,
    pub webhook_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            probability_threshold: 70.0,
            webhook_url: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Per-instrument tick queue length
    pub worker_queue: usize,
    /// Pending sink events before new ones are dropped
    pub sink_queue: usize,
    /// Upper bound on one sink call, retries included
    pub sink_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            worker_queue: 1024,
            sink_queue: 4096,
            sink_timeout_secs: 20,
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub indicators: IndicatorSettings,
    pub weights: WeightTable,
    pub notify: NotifySettings,
    pub storage: StorageSettings,
    pub pipeline: PipelineSettings,
}

impl Settings {
    /// Load settings from an optional TOML file plus `SIGNALBOT__*` environment
    /// variables, then validate.
    ///
    /// # Example
    /// `SIGNALBOT__ENGINE__MONITORED_INSTRUMENTS=EURUSD,BTCUSDT`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("engine.monitored_instruments")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations that would only fail mid-stream
    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.engine;
        let i = &self.indicators;

        if e.monitored_instruments.is_empty() {
            return invalid("engine.monitored_instruments must list at least one instrument");
        }
        if !(1..=Condition::ALL.len() as u8).contains(&e.min_confluences) {
            return invalid("engine.min_confluences must be between 1 and 7");
        }
        if e.history_capacity == 0 || e.expiration_minutes == 0 {
            return invalid("engine.history_capacity and engine.expiration_minutes must be positive");
        }
        if [i.ema_short, i.ema_long, i.rsi_period, i.bb_period, i.sr_lookback].contains(&0) {
            return invalid("indicator periods must be positive");
        }
        if i.ema_short >= i.ema_long {
            return invalid("indicators.ema_short must be shorter than indicators.ema_long");
        }
        if e.warmup_candles < i.bb_period || e.warmup_candles <= i.rsi_period {
            return invalid("engine.warmup_candles must cover the Bollinger and RSI windows");
        }
        if e.history_capacity < e.warmup_candles {
            return invalid("engine.history_capacity must hold at least warmup_candles");
        }
        for (name, v) in [
            ("indicators.bb_std", i.bb_std),
            ("indicators.band_proximity", i.band_proximity),
            ("indicators.sr_proximity", i.sr_proximity),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Validation(format!("{} must be non-negative", name)));
            }
        }
        if !(0.0..=100.0).contains(&self.notify.probability_threshold) {
            return invalid("notify.probability_threshold must be between 0 and 100");
        }
        if self.pipeline.sink_timeout_secs == 0 {
            return invalid("pipeline.sink_timeout_secs must be positive");
        }
        if self.notify.webhook_url.is_some()
            && Duration::from_secs(self.pipeline.sink_timeout_secs) <= WebhookChannel::retry_budget()
        {
            return Err(ConfigError::Validation(format!(
                "pipeline.sink_timeout_secs must exceed the webhook retry budget of {:?}",
                WebhookChannel::retry_budget()
            )));
        }

        self.weights.validate()
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Validation(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.engine.monitored_instruments = ["EURUSD".to_string()].into();
        settings
    }

    #[test]
    fn test_defaults_match_original_constants() {
        let settings = Settings::default();
        assert_eq!(settings.engine.min_confluences, 3);
        assert_eq!(settings.engine.history_capacity, 2000);
        assert_eq!(settings.engine.expiration_minutes, 2);
        assert_eq!(settings.indicators.ema_short, 9);
        assert_eq!(settings.indicators.ema_long, 21);
        assert_eq!(settings.notify.probability_threshold, 70.0);
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_missing_instruments_fail_fast() {
        let err = Settings::default().validate().unwrap_err();
        assert!(err.to_string().contains("monitored_instruments"));
    }

    #[test]
    fn test_ema_periods_must_be_ordered() {
        let mut settings = valid_settings();
        settings.indicators.ema_short = 30;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_warmup_must_cover_indicators() {
        let mut settings = valid_settings();
        settings.engine.warmup_candles = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_sink_timeout_must_cover_webhook_retries() {
        let mut settings = valid_settings();
        settings.notify.webhook_url = Some("http://localhost/hook".to_string());
        assert!(settings.validate().is_ok());

        settings.pipeline.sink_timeout_secs = 10;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("retry budget"));

        settings.notify.webhook_url = None;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut settings = valid_settings();
        settings.weights = WeightTable::new(HashMap::from([(WeightKey::Rsi, -0.1)]));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let mut settings = valid_settings();
        settings.weights = WeightTable::new(
            [
                WeightKey::Ema,
                WeightKey::Candle,
                WeightKey::Rsi,
                WeightKey::Bollinger,
                WeightKey::Volume,
                WeightKey::Sr,
            ]
            .into_iter()
            .map(|k| (k, 0.0))
            .collect(),
        );
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_weight_mapping_and_fallback() {
        let table = WeightTable::new(HashMap::from([(WeightKey::Ema, 0.3)]));

        assert_eq!(table.weight(Condition::EmaTrend), 0.3);
        assert_eq!(table.weight(Condition::PriceVsEmas), 0.3);
        assert_eq!(table.weight(Condition::RsiZone), 1.0 / 7.0);
    }

    #[test]
    fn test_default_weight_total() {
        // ema is shared by the trend and price-vs-emas conditions
        assert!((WeightTable::default().total() - 1.2).abs() < 1e-12);
    }

    // Environment variables are process-wide
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("SIGNALBOT__") {
                std::env::remove_var(key);
            }
        }
    }

    fn write_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_from_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("SIGNALBOT__ENGINE__MONITORED_INSTRUMENTS", "EURUSD,BTCUSDT");
        std::env::set_var("SIGNALBOT__ENGINE__MIN_CONFLUENCES", "4");
        std::env::set_var("SIGNALBOT__PIPELINE__SINK_TIMEOUT_SECS", "3");

        let settings = Settings::load(None);
        clear_env();
        let settings = settings.unwrap();

        let expected: BTreeSet<String> = ["BTCUSDT", "EURUSD"].iter().map(|s| s.to_string()).collect();
        assert_eq!(settings.engine.monitored_instruments, expected);
        assert_eq!(settings.engine.min_confluences, 4);
        assert_eq!(settings.pipeline.sink_timeout_secs, 3);
        assert_eq!(settings.indicators, IndicatorSettings::default());
    }

    #[test]
    fn test_load_without_instruments_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("SIGNALBOT__ENGINE__MIN_CONFLUENCES", "4");

        let result = Settings::load(None);
        clear_env();

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_file_with_partial_weights_and_env_override() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let path = write_config(
            "signalbot-partial-weights",
            r#"
[engine]
monitored_instruments = ["EURUSD"]
min_confluences = 5

[weights]
ema = 0.3
sr = 0.1
"#,
        );
        std::env::set_var("SIGNALBOT__ENGINE__MIN_CONFLUENCES", "4");

        let settings = Settings::load(Some(&path));
        clear_env();
        std::fs::remove_file(&path).ok();
        let settings = settings.unwrap();

        assert_eq!(settings.engine.monitored_instruments.len(), 1);
        assert_eq!(settings.engine.min_confluences, 4);
        assert_eq!(settings.weights.weight(Condition::EmaTrend), 0.3);
        assert_eq!(settings.weights.weight(Condition::SupportResistance), 0.1);
        assert_eq!(settings.weights.weight(Condition::RsiZone), 1.0 / 7.0);
        assert_eq!(settings.weights.weight(Condition::CandlePattern), 1.0 / 7.0);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = std::env::temp_dir().join("signalbot-does-not-exist.toml");

        assert!(matches!(Settings::load(Some(&path)), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_weights_deserialize_from_names() {
        let table: WeightTable = serde_json::from_str(r#"{"ema": 0.5, "sr": 0.1}"#).unwrap();
        assert_eq!(table.weight(Condition::SupportResistance), 0.1);

        let unknown: Result<WeightTable, _> = serde_json::from_str(r#"{"macd": 0.5}"#);
        assert!(unknown.is_err());
    }
}
