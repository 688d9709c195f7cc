//! Driver explanation
//!
//! Turns the day's ranked risk contributions into display entries that say how
//! many score points each top signal roughly accounts for. This is an
//! approximation for the UI and never feeds back into the score itself.

use crate::risk::Contribution;
use crate::stats::round1;
use crate::types::{DriverContribution, DriverDirection};

/// Number of explained drivers
const MAX_EXPLAINED: usize = 3;

/// Contributions at or below this are not worth showing
const MIN_SHOWN_CONTRIBUTION: f64 = 0.01;

/// Score movement below which contributions are scaled instead of apportioned
const MIN_SCORE_DELTA: f64 = 0.1;

/// Explain the strongest contributions against the change from the prior score.
///
/// `contributions` must already be ranked strongest first. When the score moved
/// by more than a tenth of a point, that movement is split across drivers in
/// proportion to their share of the total; otherwise each contribution is
/// shown scaled by ten.
pub fn explain(contributions: &[Contribution], score_delta: f64) -> Vec<DriverContribution> {
    let total: f64 = contributions.iter().map(|c| c.contribution.abs()).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    contributions
        .iter()
        .take(MAX_EXPLAINED)
        .filter(|c| c.contribution.abs() > MIN_SHOWN_CONTRIBUTION)
        .map(|c| {
            let points = if score_delta.abs() > MIN_SCORE_DELTA {
                c.contribution.abs() / total * score_delta.abs()
            } else {
                c.contribution.abs() * 10.0
            };
            DriverContribution {
                key: c.key,
                label: c.key.label().to_string(),
                direction: if c.contribution > 0.0 {
                    DriverDirection::Up
                } else {
                    DriverDirection::Down
                },
                contribution: round1(points),
            }
        })
        .collect()
}
