//! Voice baseline from prior sessions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::baseline::{SignalBaseline, MIN_BASELINE_SAMPLES};
use crate::stats::{mean, population_std, EPSILON};
use crate::voice::types::{VoiceSession, VOICE_KEYS};

/// Per-feature (mean, std) over a user's recent voice sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceBaseline {
    features: BTreeMap<String, SignalBaseline>,
    sessions_used: usize,
}

impl VoiceBaseline {
    /// Build a baseline over the given sessions.
    ///
    /// Only whitelisted features with at least two finite values enter it.
    pub fn from_sessions(sessions: &[VoiceSession]) -> Self {
        let mut features = BTreeMap::new();
        for (key, _) in VOICE_KEYS {
            let values: Vec<f64> = sessions
                .iter()
                .filter_map(|session| session.features.get(key).copied())
                .filter(|value| value.is_finite())
                .collect();
            if values.len() < MIN_BASELINE_SAMPLES {
                continue;
            }
            if let (Some(mu), Some(sd)) = (mean(&values), population_std(&values)) {
                features.insert(
                    key.to_string(),
                    SignalBaseline {
                        mean: mu,
                        std: sd + EPSILON,
                        samples: values.len(),
                    },
                );
            }
        }

        Self {
            features,
            sessions_used: sessions.len(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SignalBaseline> {
        self.features.get(key)
    }

    pub fn sessions_used(&self) -> usize {
        self.sessions_used
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session(features: &[(&str, f64)]) -> VoiceSession {
        VoiceSession {
            user_id: "u1".to_string(),
            recorded_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            duration_sec: 12.0,
            features: features.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            sentiment_compound: None,
        }
    }

    #[test]
    fn test_baseline_over_whitelisted_keys() {
        let sessions = vec![
            session(&[("loudness_sma3_amean", 1.0), ("mfcc1_sma3_amean", 4.0)]),
            session(&[("loudness_sma3_amean", 3.0), ("mfcc1_sma3_amean", 6.0)]),
        ];
        let baseline = VoiceBaseline::from_sessions(&sessions);
        let loudness = baseline.get("loudness_sma3_amean").unwrap();
        assert!((loudness.mean - 2.0).abs() < 1e-12);
        assert!((loudness.std - (1.0 + EPSILON)).abs() < 1e-12);
        assert!(baseline.get("mfcc1_sma3_amean").is_none());
        assert_eq!(baseline.sessions_used(), 2);
    }

    #[test]
    fn test_feature_needs_two_values() {
        let sessions = vec![
            session(&[("jitterLocal_sma3nz_amean", 0.02)]),
            session(&[("shimmerLocaldB_sma3nz_amean", 1.1)]),
        ];
        let baseline = VoiceBaseline::from_sessions(&sessions);
        assert_eq!(baseline.feature_count(), 0);
    }
}
