//! Voice strain data types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::DriverDirection;

/// Acoustic functionals (eGeMAPS) that take part in voice drift, with driver labels
pub const VOICE_KEYS: [(&str, &str); 8] = [
    ("loudness_sma3_amean", "energy"),
    ("loudness_sma3_stddevNorm", "loudness variability"),
    ("F0semitoneFrom27.5Hz_sma3nz_amean", "pitch"),
    ("F0semitoneFrom27.5Hz_sma3nz_stddevNorm", "pitch variability"),
    ("jitterLocal_sma3nz_amean", "jitter"),
    ("shimmerLocaldB_sma3nz_amean", "shimmer"),
    ("HNRdBACF_sma3nz_amean", "spectral balance"),
    ("spectralFlux_sma3_amean", "spectral harshness"),
];

/// Human label for a voice feature key (the key itself when unknown)
pub fn voice_label(key: &str) -> &str {
    VOICE_KEYS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, label)| *label)
        .unwrap_or(key)
}

/// One recorded voice check-in with already-extracted features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSession {
    pub user_id: String,
    pub recorded_at: DateTime<Utc>,
    /// Audio length in seconds
    pub duration_sec: f64,
    /// Acoustic functionals by name; keys outside [`VOICE_KEYS`] are kept but ignored
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    /// Sentiment compound of the transcript (-1..1), when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_compound: Option<f64>,
}

/// Voice strain band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrainLevel {
    Low,
    Medium,
    High,
}

impl StrainLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrainLevel::Low => "low",
            StrainLevel::Medium => "medium",
            StrainLevel::High => "high",
        }
    }
}

impl std::str::FromStr for StrainLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(StrainLevel::Low),
            "medium" => Ok(StrainLevel::Medium),
            "high" => Ok(StrainLevel::High),
            other => Err(format!("unknown strain level '{other}'")),
        }
    }
}

/// How far a voice reading can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceConfidence {
    Low,
    Medium,
    High,
}

impl VoiceConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceConfidence::Low => "low",
            VoiceConfidence::Medium => "medium",
            VoiceConfidence::High => "high",
        }
    }
}

impl std::str::FromStr for VoiceConfidence {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(VoiceConfidence::Low),
            "medium" => Ok(VoiceConfidence::Medium),
            "high" => Ok(VoiceConfidence::High),
            other => Err(format!("unknown voice confidence '{other}'")),
        }
    }
}

/// Coarse speech sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

/// Compound scores within this distance of zero are neutral
const SENTIMENT_NEUTRAL_BAND: f64 = 0.05;

impl SentimentLabel {
    pub fn from_compound(compound: f64) -> Self {
        if compound >= SENTIMENT_NEUTRAL_BAND {
            SentimentLabel::Positive
        } else if compound <= -SENTIMENT_NEUTRAL_BAND {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(format!("unknown sentiment label '{other}'")),
        }
    }
}

/// Feature that moved most against the voice baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceDriver {
    pub key: String,
    pub label: String,
    pub direction: DriverDirection,
}

/// Drift of one session against the voice baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceDrift {
    /// Mean of the strongest absolute z-scores
    pub drift_score: f64,
    /// Drift mapped onto 0-100
    pub strain_score: u32,
    pub strain_level: StrainLevel,
    pub confidence: VoiceConfidence,
    pub drivers: Vec<VoiceDriver>,
    pub z_scores: BTreeMap<String, f64>,
    /// Prior sessions that formed the baseline
    pub baseline_sessions: usize,
}

/// Outcome of assessing a voice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VoiceAssessment {
    /// Too few prior sessions to compare against
    BuildingBaseline { baseline_sessions: usize },
    Scored(VoiceDrift),
}

impl VoiceAssessment {
    pub fn is_building(&self) -> bool {
        matches!(self, VoiceAssessment::BuildingBaseline { .. })
    }

    pub fn strain_score(&self) -> u32 {
        match self {
            VoiceAssessment::BuildingBaseline { .. } => 0,
            VoiceAssessment::Scored(drift) => drift.strain_score,
        }
    }

    pub fn strain_level(&self) -> StrainLevel {
        match self {
            VoiceAssessment::BuildingBaseline { .. } => StrainLevel::Low,
            VoiceAssessment::Scored(drift) => drift.strain_level,
        }
    }

    pub fn confidence(&self) -> VoiceConfidence {
        match self {
            VoiceAssessment::BuildingBaseline { .. } => VoiceConfidence::Low,
            VoiceAssessment::Scored(drift) => drift.confidence,
        }
    }

    pub fn drivers(&self) -> &[VoiceDriver] {
        match self {
            VoiceAssessment::BuildingBaseline { .. } => &[],
            VoiceAssessment::Scored(drift) => &drift.drivers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_label_bands() {
        assert_eq!(SentimentLabel::from_compound(0.6), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_compound(0.05), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_compound(0.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_compound(-0.049), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_compound(-0.05), SentimentLabel::Negative);
    }

    #[test]
    fn test_voice_labels() {
        assert_eq!(voice_label("jitterLocal_sma3nz_amean"), "jitter");
        assert_eq!(voice_label("spectralFlux_sma3_amean"), "spectral harshness");
        assert_eq!(voice_label("mfcc1_sma3_amean"), "mfcc1_sma3_amean");
    }

    #[test]
    fn test_building_baseline_defaults() {
        let assessment = VoiceAssessment::BuildingBaseline {
            baseline_sessions: 1,
        };
        assert!(assessment.is_building());
        assert_eq!(assessment.strain_score(), 0);
        assert_eq!(assessment.strain_level(), StrainLevel::Low);
        assert_eq!(assessment.confidence(), VoiceConfidence::Low);
        assert!(assessment.drivers().is_empty());

        let json = serde_json::to_string(&assessment).unwrap();
        assert!(json.contains("\"state\":\"building_baseline\""));
    }

    #[test]
    fn test_enum_string_round_trip() {
        for level in [StrainLevel::Low, StrainLevel::Medium, StrainLevel::High] {
            assert_eq!(level.as_str().parse::<StrainLevel>().unwrap(), level);
        }
        assert!("severe".parse::<StrainLevel>().is_err());
        assert_eq!(
            "medium".parse::<VoiceConfidence>().unwrap(),
            VoiceConfidence::Medium
        );
        assert_eq!(
            "negative".parse::<SentimentLabel>().unwrap(),
            SentimentLabel::Negative
        );
    }
}
