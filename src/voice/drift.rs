//! Voice drift scoring
//!
//! Applies the same baseline and z-score method used for daily signals to the
//! acoustic features of a voice session, producing a bounded strain score.

use std::collections::BTreeMap;

use tracing::debug;

use crate::baseline::MIN_BASELINE_SAMPLES;
use crate::config::VoiceConfig;
use crate::stats::EPSILON;
use crate::types::DriverDirection;
use crate::voice::baseline::VoiceBaseline;
use crate::voice::types::{
    voice_label, StrainLevel, VoiceAssessment, VoiceConfidence, VoiceDrift, VoiceDriver,
    VoiceSession, VOICE_KEYS,
};

/// Number of voice drivers reported
const MAX_VOICE_DRIVERS: usize = 3;

/// Drift at which the strain score saturates at 100
const DRIFT_FULL_SCALE: f64 = 2.0;

const MEDIUM_STRAIN_DRIFT: f64 = 0.6;
const HIGH_STRAIN_DRIFT: f64 = 1.2;

/// Per-feature z-scores and the resulting drift
#[derive(Debug, Clone, PartialEq)]
pub struct DriftScores {
    pub drift: f64,
    /// Z-scores in feature catalogue order
    pub z_scores: Vec<(&'static str, f64)>,
}

/// Z-score every whitelisted feature present in both the session and the
/// baseline, then average the `top_k` largest magnitudes.
pub fn drift_scores(
    current: &BTreeMap<String, f64>,
    baseline: &VoiceBaseline,
    top_k: usize,
) -> DriftScores {
    let z_scores: Vec<(&'static str, f64)> = VOICE_KEYS
        .iter()
        .filter_map(|(key, _)| {
            let value = current.get(*key).copied().filter(|v| v.is_finite())?;
            let stats = baseline.get(key)?;
            Some((*key, (value - stats.mean) / stats.std.max(EPSILON)))
        })
        .collect();

    if z_scores.is_empty() {
        return DriftScores {
            drift: 0.0,
            z_scores,
        };
    }

    let mut magnitudes: Vec<f64> = z_scores.iter().map(|(_, z)| z.abs()).collect();
    magnitudes.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let k = top_k.min(magnitudes.len()).max(1);
    let drift = magnitudes[..k].iter().sum::<f64>() / k as f64;

    DriftScores { drift, z_scores }
}

/// Map drift onto a 0-100 strain score and its level
pub fn strain_from_drift(drift: f64) -> (u32, StrainLevel) {
    let score = (drift / DRIFT_FULL_SCALE * 100.0).clamp(0.0, 100.0).trunc() as u32;
    let level = if drift < MEDIUM_STRAIN_DRIFT {
        StrainLevel::Low
    } else if drift < HIGH_STRAIN_DRIFT {
        StrainLevel::Medium
    } else {
        StrainLevel::High
    };
    (score, level)
}

/// Most conservative of the baseline-size, duration and feature-count gates
pub fn voice_confidence(
    baseline_sessions: usize,
    duration_sec: f64,
    usable_features: usize,
) -> VoiceConfidence {
    let by_baseline = match baseline_sessions {
        0..=2 => VoiceConfidence::Low,
        3..=6 => VoiceConfidence::Medium,
        _ => VoiceConfidence::High,
    };
    let by_duration = if duration_sec < 6.0 {
        VoiceConfidence::Low
    } else if duration_sec < 10.0 {
        VoiceConfidence::Medium
    } else {
        VoiceConfidence::High
    };
    let by_features = if usable_features < 4 {
        VoiceConfidence::Low
    } else {
        VoiceConfidence::High
    };
    by_baseline.min(by_duration).min(by_features)
}

/// Voice drift engine bound to a voice configuration
#[derive(Debug, Clone)]
pub struct VoiceDriftEngine {
    baseline_sessions: usize,
    top_k: usize,
}

impl Default for VoiceDriftEngine {
    fn default() -> Self {
        Self::from_config(&VoiceConfig::default())
    }
}

impl VoiceDriftEngine {
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self {
            baseline_sessions: config.baseline_sessions,
            top_k: config.top_k,
        }
    }

    /// Number of prior sessions the baseline draws on
    pub fn baseline_sessions(&self) -> usize {
        self.baseline_sessions
    }

    /// Assess a session against prior sessions, newest first.
    ///
    /// Only the most recent `baseline_sessions` prior sessions are used.
    pub fn assess(&self, current: &VoiceSession, prior: &[VoiceSession]) -> VoiceAssessment {
        let window = &prior[..self.baseline_sessions.min(prior.len())];
        if window.len() < MIN_BASELINE_SAMPLES {
            debug!(
                user = %current.user_id,
                sessions = window.len(),
                "voice baseline still building"
            );
            return VoiceAssessment::BuildingBaseline {
                baseline_sessions: window.len(),
            };
        }

        let baseline = VoiceBaseline::from_sessions(window);
        let scores = drift_scores(&current.features, &baseline, self.top_k);
        let (strain_score, strain_level) = strain_from_drift(scores.drift);
        let confidence = voice_confidence(
            baseline.sessions_used(),
            current.duration_sec,
            scores.z_scores.len(),
        );

        let mut ranked = scores.z_scores.clone();
        ranked.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let drivers = ranked
            .iter()
            .take(MAX_VOICE_DRIVERS)
            .map(|(key, z)| VoiceDriver {
                key: key.to_string(),
                label: voice_label(key).to_string(),
                direction: if *z > 0.0 {
                    DriverDirection::Up
                } else {
                    DriverDirection::Down
                },
            })
            .collect();

        debug!(
            user = %current.user_id,
            drift = scores.drift,
            strain = strain_score,
            "voice session assessed"
        );

        VoiceAssessment::Scored(VoiceDrift {
            drift_score: scores.drift,
            strain_score,
            strain_level,
            confidence,
            drivers,
            z_scores: scores
                .z_scores
                .iter()
                .map(|(key, z)| (key.to_string(), *z))
                .collect(),
            baseline_sessions: baseline.sessions_used(),
        })
    }
}
