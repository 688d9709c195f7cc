//! Momentum and trend analysis
//!
//! Two distinct views of score movement are derived from recent history:
//!
//! - the coarse [`Momentum`] stored on every score record (is risk rising?)
//! - the fine [`MomentumLabel`] plus strength shown next to a score, with
//!   overrides for acute low-score days
//!
//! The module also projects the next few days from the recent slope.

use chrono::{Duration, NaiveDate};

use crate::stats::{linear_fit, round1};
use crate::types::{Momentum, MomentumLabel, MomentumStrength, ProjectionPoint, Status};

/// Most recent scores considered by the slope-based rules
pub const MAX_MOMENTUM_POINTS: usize = 7;

// Coarse momentum slopes (score points per day)
const RAPID_RISE_SLOPE: f64 = -2.0;
const SLOW_RISE_SLOPE: f64 = -0.5;

// Fine label thresholds
const TWO_POINT_DELTA: f64 = 5.0;
const TWO_POINT_RAPID_DELTA: f64 = 15.0;
const FINE_SLOPE: f64 = 0.8;
const FINE_RAPID_SLOPE: f64 = 2.0;

// Acute-day overrides
const ACUTE_SCORE: f64 = 45.0;
const ACUTE_RAPID_DROP: f64 = -10.0;
const ACUTE_RECOVERY: f64 = 10.0;
const ACUTE_RAPID_RECOVERY: f64 = 20.0;
const ACUTE_FLOOR_SCORE: f64 = 30.0;
const WATCH_DROP: f64 = -3.0;

/// Fine momentum label with optional strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineMomentum {
    pub label: MomentumLabel,
    pub strength: Option<MomentumStrength>,
}

impl FineMomentum {
    pub fn stable() -> Self {
        Self {
            label: MomentumLabel::Stable,
            strength: None,
        }
    }

    fn rising(rapid: bool) -> Self {
        Self {
            label: MomentumLabel::Rising,
            strength: Some(strength(rapid)),
        }
    }

    fn recovering(rapid: bool) -> Self {
        Self {
            label: MomentumLabel::Recovering,
            strength: Some(strength(rapid)),
        }
    }
}

fn strength(rapid: bool) -> MomentumStrength {
    if rapid {
        MomentumStrength::Rapid
    } else {
        MomentumStrength::Slow
    }
}

fn tail(scores: &[f64]) -> &[f64] {
    &scores[scores.len().saturating_sub(MAX_MOMENTUM_POINTS)..]
}

/// Coarse momentum from chronologically ordered scores (last 7 used).
///
/// A falling score means rising risk.
pub fn coarse_momentum(scores: &[f64]) -> Momentum {
    let Some(fit) = linear_fit(tail(scores)) else {
        return Momentum::Stable;
    };
    if fit.slope <= RAPID_RISE_SLOPE {
        Momentum::RapidRise
    } else if fit.slope <= SLOW_RISE_SLOPE {
        Momentum::SlowRise
    } else {
        Momentum::Stable
    }
}

/// Generic fine label from chronologically ordered scores.
///
/// Every score passed in is fitted; callers bound the window by date.
pub fn fine_momentum(scores: &[f64]) -> FineMomentum {
    match scores {
        [] | [_] => FineMomentum::stable(),
        [previous, current] => {
            let delta = current - previous;
            if delta <= -TWO_POINT_DELTA {
                FineMomentum::rising(delta <= -TWO_POINT_RAPID_DELTA)
            } else if delta >= TWO_POINT_DELTA {
                FineMomentum::recovering(delta >= TWO_POINT_RAPID_DELTA)
            } else {
                FineMomentum::stable()
            }
        }
        _ => {
            let Some(fit) = linear_fit(scores) else {
                return FineMomentum::stable();
            };
            if fit.slope >= FINE_SLOPE {
                FineMomentum::recovering(fit.slope >= FINE_RAPID_SLOPE)
            } else if fit.slope <= -FINE_SLOPE {
                FineMomentum::rising(fit.slope <= -FINE_RAPID_SLOPE)
            } else {
                FineMomentum::stable()
            }
        }
    }
}

/// Fine label for a single day, applying the acute low-score overrides
/// before falling back to [`fine_momentum`].
///
/// `recent` holds the scores of the surrounding week in date order, ending
/// with the day itself.
pub fn acute_momentum(status: Status, score: f64, recent: &[f64]) -> FineMomentum {
    let change = match recent {
        [.., previous, current] => Some(current - previous),
        _ => None,
    };

    match (status, change) {
        (Status::High, None) if score < ACUTE_SCORE => FineMomentum::rising(false),
        (Status::High, Some(change)) if score < ACUTE_SCORE => {
            if change < 0.0 {
                FineMomentum::rising(change <= ACUTE_RAPID_DROP)
            } else if change >= ACUTE_RECOVERY {
                FineMomentum::recovering(change >= ACUTE_RAPID_RECOVERY)
            } else if score < ACUTE_FLOOR_SCORE {
                FineMomentum::rising(false)
            } else {
                fine_momentum(recent)
            }
        }
        // Unreachable with consistent data since Watch starts at 45
        (Status::Watch, None) if score < ACUTE_SCORE => FineMomentum::stable(),
        (Status::Watch, Some(change)) if score < ACUTE_SCORE => {
            if change < WATCH_DROP {
                FineMomentum::rising(change <= ACUTE_RAPID_DROP)
            } else {
                fine_momentum(recent)
            }
        }
        _ => fine_momentum(recent),
    }
}

/// Project `days` future scores from the last actual scores.
///
/// Needs at least two actual points; each projection is clamped to 0-100.
pub fn project(actual: &[(NaiveDate, f64)], days: u32) -> Vec<ProjectionPoint> {
    let recent = &actual[actual.len().saturating_sub(MAX_MOMENTUM_POINTS)..];
    let Some((last_date, _)) = recent.last() else {
        return Vec::new();
    };
    let scores: Vec<f64> = recent.iter().map(|(_, score)| *score).collect();
    let Some(fit) = linear_fit(&scores) else {
        return Vec::new();
    };

    let last_x = (scores.len() - 1) as f64;
    (1..=days)
        .map(|i| ProjectionPoint {
            date: *last_date + Duration::days(i as i64),
            projected_score: round1(fit.at(last_x + i as f64).clamp(0.0, 100.0)),
        })
        .collect()
}
