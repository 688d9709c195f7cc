//! Core types for the Sentra drift engine
//!
//! This module defines the records that flow through the engine: daily signal
//! records coming in from collaborators, score records written by the risk
//! aggregator, and the read models returned to callers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DriftError;
use crate::voice::types::{SentimentLabel, StrainLevel, VoiceConfidence};

/// Which side of the personal baseline counts as a deterioration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationDirection {
    /// Too little and too much are both bad
    TwoSided,
    /// Falling below baseline is bad
    LowerIsWorse,
    /// Rising above baseline is bad
    HigherIsWorse,
}

/// Scored daily signals, in canonical weight-table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKey {
    SleepHours,
    SleepQuality,
    ActivityMinutes,
    MoodValue,
    TypingAvgIntervalMs,
    TypingStdMs,
    TypingBackspaceRatio,
    TypingFragmentation,
    VoiceStrainScore,
    SpeechSentimentCompound,
}

impl SignalKey {
    pub const ALL: [SignalKey; 10] = [
        SignalKey::SleepHours,
        SignalKey::SleepQuality,
        SignalKey::ActivityMinutes,
        SignalKey::MoodValue,
        SignalKey::TypingAvgIntervalMs,
        SignalKey::TypingStdMs,
        SignalKey::TypingBackspaceRatio,
        SignalKey::TypingFragmentation,
        SignalKey::VoiceStrainScore,
        SignalKey::SpeechSentimentCompound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKey::SleepHours => "sleep_hours",
            SignalKey::SleepQuality => "sleep_quality",
            SignalKey::ActivityMinutes => "activity_minutes",
            SignalKey::MoodValue => "mood_value",
            SignalKey::TypingAvgIntervalMs => "typing_avg_interval_ms",
            SignalKey::TypingStdMs => "typing_std_ms",
            SignalKey::TypingBackspaceRatio => "typing_backspace_ratio",
            SignalKey::TypingFragmentation => "typing_fragmentation",
            SignalKey::VoiceStrainScore => "voice_strain_score",
            SignalKey::SpeechSentimentCompound => "speech_sentiment_compound",
        }
    }

    /// Human-readable driver label
    pub fn label(&self) -> &'static str {
        match self {
            SignalKey::SleepHours => "sleep amount",
            SignalKey::SleepQuality => "sleep quality",
            SignalKey::ActivityMinutes => "activity level",
            SignalKey::MoodValue => "mood",
            SignalKey::TypingAvgIntervalMs => "typing rhythm",
            SignalKey::TypingStdMs => "typing consistency",
            SignalKey::TypingBackspaceRatio => "typing friction",
            SignalKey::TypingFragmentation => "focus fragmentation",
            SignalKey::VoiceStrainScore => "voice strain",
            SignalKey::SpeechSentimentCompound => "mood from words",
        }
    }

    pub fn direction(&self) -> DeviationDirection {
        match self {
            SignalKey::SleepHours => DeviationDirection::TwoSided,
            SignalKey::SleepQuality
            | SignalKey::ActivityMinutes
            | SignalKey::MoodValue
            | SignalKey::SpeechSentimentCompound => DeviationDirection::LowerIsWorse,
            SignalKey::TypingAvgIntervalMs
            | SignalKey::TypingStdMs
            | SignalKey::TypingBackspaceRatio
            | SignalKey::TypingFragmentation
            | SignalKey::VoiceStrainScore => DeviationDirection::HigherIsWorse,
        }
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignalKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SignalKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == value.trim())
            .ok_or_else(|| format!("unknown signal key '{value}'"))
    }
}

/// Wellbeing status band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Stable,
    Watch,
    High,
}

/// Lower bound of the Stable band
pub const STABLE_THRESHOLD: f64 = 70.0;

/// Lower bound of the Watch band; anything below is High
pub const WATCH_THRESHOLD: f64 = 45.0;

impl Status {
    /// Status is a pure function of the wellbeing score
    pub fn from_score(wellbeing: f64) -> Self {
        if wellbeing >= STABLE_THRESHOLD {
            Status::Stable
        } else if wellbeing >= WATCH_THRESHOLD {
            Status::Watch
        } else {
            Status::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Stable => "Stable",
            Status::Watch => "Watch",
            Status::High => "High",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Stable" => Ok(Status::Stable),
            "Watch" => Ok(Status::Watch),
            "High" => Ok(Status::High),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Coarse risk momentum (wellbeing falling means risk rising)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Momentum {
    Stable,
    SlowRise,
    RapidRise,
}

impl Momentum {
    pub fn as_str(&self) -> &'static str {
        match self {
            Momentum::Stable => "stable",
            Momentum::SlowRise => "slow_rise",
            Momentum::RapidRise => "rapid_rise",
        }
    }
}

impl std::str::FromStr for Momentum {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "stable" => Ok(Momentum::Stable),
            "slow_rise" => Ok(Momentum::SlowRise),
            "rapid_rise" => Ok(Momentum::RapidRise),
            other => Err(format!("unknown momentum '{other}'")),
        }
    }
}

/// Fine-grained momentum label shown next to the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumLabel {
    Rising,
    Stable,
    Recovering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MomentumStrength {
    Slow,
    Rapid,
}

/// Reliability grade of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Med,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Med => "med",
            Confidence::High => "high",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Confidence::Low),
            "med" => Ok(Confidence::Med),
            "high" => Ok(Confidence::High),
            other => Err(format!("unknown confidence '{other}'")),
        }
    }
}

/// Direction of a driver's effect (up = worsening)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverDirection {
    Up,
    Down,
}

/// One day of behavioral signals for a user.
///
/// Every signal is optional; repeated same-day updates overwrite the fields they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySignalRecord {
    pub user_id: String,
    pub date: NaiveDate,
    /// Hours slept
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    /// Self-rated sleep quality (1-5)
    #[serde(default)]
    pub sleep_quality: Option<f64>,
    #[serde(default)]
    pub activity_minutes: Option<f64>,
    /// Mood from the emoji wheel (1-10)
    #[serde(default)]
    pub mood_value: Option<f64>,
    #[serde(default)]
    pub typing_avg_interval_ms: Option<f64>,
    #[serde(default)]
    pub typing_std_ms: Option<f64>,
    #[serde(default)]
    pub typing_backspace_ratio: Option<f64>,
    /// Count of typing pauses longer than two seconds
    #[serde(default)]
    pub typing_fragmentation: Option<f64>,
    /// Voice strain (0-100)
    #[serde(default)]
    pub voice_strain_score: Option<f64>,
    /// Speech sentiment compound (-1..1)
    #[serde(default)]
    pub speech_sentiment_compound: Option<f64>,

    // Annotations carried alongside the scored signals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing_late_night: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_strain_level: Option<StrainLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_confidence: Option<VoiceConfidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_sentiment_label: Option<SentimentLabel>,
}

impl DailySignalRecord {
    /// Create an empty record for a user and day
    pub fn new(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            sleep_hours: None,
            sleep_quality: None,
            activity_minutes: None,
            mood_value: None,
            typing_avg_interval_ms: None,
            typing_std_ms: None,
            typing_backspace_ratio: None,
            typing_fragmentation: None,
            voice_strain_score: None,
            speech_sentiment_compound: None,
            typing_late_night: None,
            voice_strain_level: None,
            voice_confidence: None,
            speech_sentiment_label: None,
        }
    }

    pub fn value(&self, key: SignalKey) -> Option<f64> {
        match key {
            SignalKey::SleepHours => self.sleep_hours,
            SignalKey::SleepQuality => self.sleep_quality,
            SignalKey::ActivityMinutes => self.activity_minutes,
            SignalKey::MoodValue => self.mood_value,
            SignalKey::TypingAvgIntervalMs => self.typing_avg_interval_ms,
            SignalKey::TypingStdMs => self.typing_std_ms,
            SignalKey::TypingBackspaceRatio => self.typing_backspace_ratio,
            SignalKey::TypingFragmentation => self.typing_fragmentation,
            SignalKey::VoiceStrainScore => self.voice_strain_score,
            SignalKey::SpeechSentimentCompound => self.speech_sentiment_compound,
        }
    }

    pub fn set_value(&mut self, key: SignalKey, value: Option<f64>) {
        let slot = match key {
            SignalKey::SleepHours => &mut self.sleep_hours,
            SignalKey::SleepQuality => &mut self.sleep_quality,
            SignalKey::ActivityMinutes => &mut self.activity_minutes,
            SignalKey::MoodValue => &mut self.mood_value,
            SignalKey::TypingAvgIntervalMs => &mut self.typing_avg_interval_ms,
            SignalKey::TypingStdMs => &mut self.typing_std_ms,
            SignalKey::TypingBackspaceRatio => &mut self.typing_backspace_ratio,
            SignalKey::TypingFragmentation => &mut self.typing_fragmentation,
            SignalKey::VoiceStrainScore => &mut self.voice_strain_score,
            SignalKey::SpeechSentimentCompound => &mut self.speech_sentiment_compound,
        };
        *slot = value;
    }

    /// Overwrite this record's fields with every field present in `update`
    pub fn merge(&mut self, update: &DailySignalRecord) {
        for key in SignalKey::ALL {
            if let Some(value) = update.value(key) {
                self.set_value(key, Some(value));
            }
        }
        if update.typing_late_night.is_some() {
            self.typing_late_night = update.typing_late_night;
        }
        if update.voice_strain_level.is_some() {
            self.voice_strain_level = update.voice_strain_level;
        }
        if update.voice_confidence.is_some() {
            self.voice_confidence = update.voice_confidence;
        }
        if update.speech_sentiment_label.is_some() {
            self.speech_sentiment_label = update.speech_sentiment_label;
        }
    }

    /// Number of the given signals absent from this record
    pub fn missing_count<'a>(&self, keys: impl IntoIterator<Item = &'a SignalKey>) -> usize {
        keys.into_iter()
            .filter(|key| self.value(**key).is_none())
            .count()
    }

    /// Reject non-finite values, which can only come from corrupted storage
    pub fn validate(&self) -> Result<(), DriftError> {
        for key in SignalKey::ALL {
            if let Some(value) = self.value(key) {
                if !value.is_finite() {
                    return Err(DriftError::MalformedRecord(format!(
                        "{} on {} has non-finite {}",
                        self.user_id, self.date, key
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Raw metrics of one typing session; no typed content is ever stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingSession {
    pub user_id: String,
    pub date: NaiveDate,
    /// Mean inter-key interval in milliseconds
    pub avg_interval_ms: f64,
    pub std_interval_ms: f64,
    pub backspace_ratio: f64,
    pub session_duration_sec: f64,
    /// Pauses longer than two seconds
    pub fragmentation_count: u32,
    #[serde(default)]
    pub late_night: bool,
}

/// Persisted score for one (user, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Assigned on first insert and kept by every later upsert
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    /// Inverted risk, 0-100 (higher is better)
    pub wellbeing_score: f64,
    pub status: Status,
    pub momentum: Momentum,
    pub confidence: Confidence,
    /// Up to three signal keys, strongest first
    pub drivers: Vec<SignalKey>,
}

/// Display contribution of one driver to the day's movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverContribution {
    pub key: SignalKey,
    pub label: String,
    pub direction: DriverDirection,
    pub contribution: f64,
}

/// Read model for today's score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayScore {
    pub date: NaiveDate,
    pub wellbeing_score: f64,
    pub status: Status,
    pub momentum: Momentum,
    pub momentum_label: MomentumLabel,
    pub momentum_strength: Option<MomentumStrength>,
    pub confidence: Confidence,
    pub drivers: Vec<SignalKey>,
    pub driver_contributions: Vec<DriverContribution>,
    pub voice_strain_score: Option<f64>,
    pub voice_strain_level: Option<StrainLevel>,
    pub voice_confidence: Option<VoiceConfidence>,
    pub speech_sentiment_compound: Option<f64>,
    pub speech_sentiment_label: Option<SentimentLabel>,
}

/// One actual day on the trend chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub wellbeing_score: f64,
    pub status: Status,
    pub momentum: Momentum,
    pub momentum_label: MomentumLabel,
    pub momentum_strength: Option<MomentumStrength>,
    pub confidence: Confidence,
}

/// One projected day after the last actual score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub date: NaiveDate,
    pub projected_score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trends {
    pub data: Vec<TrendPoint>,
    pub projection: Vec<ProjectionPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(Status::from_score(80.0), Status::Stable);
        assert_eq!(Status::from_score(70.0), Status::Stable);
        assert_eq!(Status::from_score(69.9), Status::Watch);
        assert_eq!(Status::from_score(50.0), Status::Watch);
        assert_eq!(Status::from_score(45.0), Status::Watch);
        assert_eq!(Status::from_score(44.9), Status::High);
        assert_eq!(Status::from_score(30.0), Status::High);
    }

    #[test]
    fn test_signal_key_round_trips_through_wire_name() {
        for key in SignalKey::ALL {
            let parsed: SignalKey = key.as_str().parse().unwrap();
            assert_eq!(parsed, key);
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
        assert!("heart_rate".parse::<SignalKey>().is_err());
    }

    #[test]
    fn test_directions_cover_every_signal() {
        assert_eq!(SignalKey::SleepHours.direction(), DeviationDirection::TwoSided);
        assert_eq!(SignalKey::MoodValue.direction(), DeviationDirection::LowerIsWorse);
        assert_eq!(
            SignalKey::SpeechSentimentCompound.direction(),
            DeviationDirection::LowerIsWorse
        );
        assert_eq!(
            SignalKey::TypingFragmentation.direction(),
            DeviationDirection::HigherIsWorse
        );
        assert_eq!(
            SignalKey::VoiceStrainScore.direction(),
            DeviationDirection::HigherIsWorse
        );
    }

    #[test]
    fn test_merge_overwrites_only_present_fields() {
        let mut record = DailySignalRecord::new("u1", day(1));
        record.mood_value = Some(6.0);
        record.sleep_hours = Some(7.0);

        let mut update = DailySignalRecord::new("u1", day(1));
        update.mood_value = Some(3.0);
        update.typing_std_ms = Some(42.0);
        update.typing_late_night = Some(true);

        record.merge(&update);
        assert_eq!(record.mood_value, Some(3.0));
        assert_eq!(record.sleep_hours, Some(7.0));
        assert_eq!(record.typing_std_ms, Some(42.0));
        assert_eq!(record.typing_late_night, Some(true));
    }

    #[test]
    fn test_missing_count() {
        let mut record = DailySignalRecord::new("u1", day(2));
        record.mood_value = Some(5.0);
        record.sleep_hours = Some(8.0);
        assert_eq!(record.missing_count(SignalKey::ALL.iter()), 8);
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut record = DailySignalRecord::new("u1", day(3));
        record.activity_minutes = Some(f64::NAN);
        assert!(matches!(
            record.validate(),
            Err(DriftError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        let json = r#"{"user_id": "u1", "date": "2024-03-04", "mood_value": 7}"#;
        let record: DailySignalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.mood_value, Some(7.0));
        assert_eq!(record.sleep_hours, None);
        assert_eq!(record.voice_strain_level, None);
    }
}
