//! Engine configuration
//!
//! Weight tables and window sizes are injected as an immutable [`EngineConfig`]
//! instead of module-level constants, so the ten-signal and eight-signal weight
//! schemes are explicit variants. Status thresholds and deviation directions
//! are fixed and live with their types.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::SignalKey;

/// Default number of earliest records used as the personal baseline
pub const DEFAULT_BASELINE_DAYS: usize = 7;

/// Extra calendar days fetched beyond the baseline window
pub const DEFAULT_BASELINE_LOOKBACK_EXTRA_DAYS: i64 = 30;

/// Calendar days of prior scores considered for momentum
pub const DEFAULT_TREND_DAYS: i64 = 7;

/// Days projected past the last actual score
pub const DEFAULT_PROJECTION_DAYS: u32 = 5;

/// Default number of prior voice sessions in the voice baseline
pub const DEFAULT_VOICE_BASELINE_SESSIONS: usize = 7;

/// Named weight scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// Canonical table including voice strain and speech sentiment
    #[default]
    TenSignal,
    /// Behavioral-only alternate table
    EightSignal,
}

impl WeightScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TenSignal => "ten_signal",
            Self::EightSignal => "eight_signal",
        }
    }

    pub fn table(self) -> WeightTable {
        match self {
            Self::TenSignal => WeightTable::ten_signal(),
            Self::EightSignal => WeightTable::eight_signal(),
        }
    }
}

impl std::str::FromStr for WeightScheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "ten_signal" => Ok(Self::TenSignal),
            "eight_signal" => Ok(Self::EightSignal),
            other => Err(format!(
                "invalid weight scheme '{other}', expected one of: ten_signal, eight_signal"
            )),
        }
    }
}

/// Per-signal risk weights, kept in canonical signal order
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    entries: Vec<(SignalKey, f64)>,
}

impl WeightTable {
    pub fn ten_signal() -> Self {
        Self {
            entries: vec![
                (SignalKey::SleepHours, 0.14),
                (SignalKey::SleepQuality, 0.14),
                (SignalKey::ActivityMinutes, 0.14),
                (SignalKey::MoodValue, 0.18),
                (SignalKey::TypingAvgIntervalMs, 0.11),
                (SignalKey::TypingStdMs, 0.07),
                (SignalKey::TypingBackspaceRatio, 0.07),
                (SignalKey::TypingFragmentation, 0.06),
                (SignalKey::VoiceStrainScore, 0.09),
                (SignalKey::SpeechSentimentCompound, 0.06),
            ],
        }
    }

    pub fn eight_signal() -> Self {
        Self {
            entries: vec![
                (SignalKey::SleepHours, 0.15),
                (SignalKey::SleepQuality, 0.15),
                (SignalKey::ActivityMinutes, 0.15),
                (SignalKey::MoodValue, 0.20),
                (SignalKey::TypingAvgIntervalMs, 0.12),
                (SignalKey::TypingStdMs, 0.08),
                (SignalKey::TypingBackspaceRatio, 0.08),
                (SignalKey::TypingFragmentation, 0.07),
            ],
        }
    }

    pub fn weight(&self, key: SignalKey) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, weight)| *weight)
    }

    /// Scored signals in canonical order
    pub fn keys(&self) -> impl Iterator<Item = &SignalKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, weight)| weight).sum()
    }
}

/// Voice drift sub-engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Prior sessions (by recency) forming the voice baseline
    #[serde(default = "default_voice_baseline_sessions")]
    pub baseline_sessions: usize,
    /// Maximum number of strongest |z| values averaged into drift
    #[serde(default = "default_voice_top_k")]
    pub top_k: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            baseline_sessions: default_voice_baseline_sessions(),
            top_k: default_voice_top_k(),
        }
    }
}

/// Drift engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_baseline_days")]
    pub baseline_days: usize,
    #[serde(default = "default_baseline_lookback_extra_days")]
    pub baseline_lookback_extra_days: i64,
    #[serde(default = "default_trend_days")]
    pub trend_days: i64,
    #[serde(default = "default_projection_days")]
    pub projection_days: u32,
    /// Multiplier from summed contributions to the 0-1 risk
    #[serde(default = "default_risk_scale")]
    pub risk_scale: f64,
    /// Contributions at or below this never become drivers
    #[serde(default = "default_driver_min_contribution")]
    pub driver_min_contribution: f64,
    #[serde(default = "default_max_drivers")]
    pub max_drivers: usize,
    #[serde(default)]
    pub weight_scheme: WeightScheme,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baseline_days: default_baseline_days(),
            baseline_lookback_extra_days: default_baseline_lookback_extra_days(),
            trend_days: default_trend_days(),
            projection_days: default_projection_days(),
            risk_scale: default_risk_scale(),
            driver_min_contribution: default_driver_min_contribution(),
            max_drivers: default_max_drivers(),
            weight_scheme: WeightScheme::default(),
            voice: VoiceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let parsed: EngineConfig = toml::from_str(raw)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn weights(&self) -> WeightTable {
        self.weight_scheme.table()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline_days < 2 {
            return Err(ConfigError::Invalid(
                "baseline_days must be at least 2".to_string(),
            ));
        }
        if self.trend_days < 1 {
            return Err(ConfigError::Invalid(
                "trend_days must be at least 1".to_string(),
            ));
        }
        if !(self.risk_scale.is_finite() && self.risk_scale > 0.0) {
            return Err(ConfigError::Invalid(
                "risk_scale must be a positive number".to_string(),
            ));
        }
        if self.voice.top_k == 0 {
            return Err(ConfigError::Invalid(
                "voice.top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_baseline_days() -> usize {
    DEFAULT_BASELINE_DAYS
}

fn default_baseline_lookback_extra_days() -> i64 {
    DEFAULT_BASELINE_LOOKBACK_EXTRA_DAYS
}

fn default_trend_days() -> i64 {
    DEFAULT_TREND_DAYS
}

fn default_projection_days() -> u32 {
    DEFAULT_PROJECTION_DAYS
}

fn default_risk_scale() -> f64 {
    2.0
}

fn default_driver_min_contribution() -> f64 {
    0.05
}

fn default_max_drivers() -> usize {
    3
}

fn default_voice_baseline_sessions() -> usize {
    DEFAULT_VOICE_BASELINE_SESSIONS
}

fn default_voice_top_k() -> usize {
    4
}
