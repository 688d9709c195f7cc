//! Deviation mapping
//!
//! Converts a raw value and its baseline into a signed z-score, then into a
//! nonnegative directional "badness": only movement in the harmful direction
//! for that signal adds risk.

use crate::baseline::SignalBaseline;
use crate::types::{DeviationDirection, SignalKey};

/// Signed z-score; 0 when the value is absent or the std is unusable
pub fn z_score(value: Option<f64>, mean: f64, std: f64) -> f64 {
    match value {
        Some(v) if std > 0.0 && std.is_finite() => (v - mean) / std,
        _ => 0.0,
    }
}

/// Z-score of a value against a signal baseline
pub fn z_against(value: Option<f64>, baseline: &SignalBaseline) -> f64 {
    z_score(value, baseline.mean, baseline.std)
}

/// Map a z-score to nonnegative badness for a deviation direction
pub fn badness_for(z: f64, direction: DeviationDirection) -> f64 {
    match direction {
        DeviationDirection::TwoSided => z.abs(),
        DeviationDirection::LowerIsWorse => (-z).max(0.0),
        DeviationDirection::HigherIsWorse => z.max(0.0),
    }
}

/// Map a z-score to badness using the signal's fixed direction
pub fn badness(z: f64, signal: SignalKey) -> f64 {
    badness_for(z, signal.direction())
}
