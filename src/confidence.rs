//! Confidence grading from baseline size and today's data completeness

use crate::types::Confidence;

/// Baseline records below which confidence is always low
const LOW_BASELINE_DAYS: usize = 4;

/// Baseline records needed for high confidence
const HIGH_BASELINE_DAYS: usize = 7;

/// Missing signals at which confidence drops to low
const LOW_MISSING_SIGNALS: usize = 4;

/// Most missing signals still allowed for high confidence
const HIGH_MISSING_SIGNALS: usize = 1;

/// Grade a score from the records behind its baseline and the weighted
/// signals absent today.
pub fn grade(baseline_days: usize, missing_signals: usize) -> Confidence {
    if baseline_days < LOW_BASELINE_DAYS || missing_signals >= LOW_MISSING_SIGNALS {
        Confidence::Low
    } else if baseline_days >= HIGH_BASELINE_DAYS && missing_signals <= HIGH_MISSING_SIGNALS {
        Confidence::High
    } else {
        Confidence::Med
    }
}
