//! Care Mode organization summary
//!
//! Aggregates the latest score of each member into counts only; no per-user
//! data leaves this module.

use serde::{Deserialize, Serialize};

use crate::stats::round1;
use crate::types::{Momentum, ScoreRecord, Status};

/// Members per status band
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    #[serde(rename = "Stable")]
    pub stable: usize,
    #[serde(rename = "Watch")]
    pub watch: usize,
    #[serde(rename = "High")]
    pub high: usize,
}

/// Members per coarse momentum
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumDistribution {
    pub stable: usize,
    pub slow_rise: usize,
    pub rapid_rise: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgSummary {
    pub counts: StatusCounts,
    /// 100 minus the mean wellbeing of scored members, one decimal
    pub average_risk: f64,
    pub momentum_distribution: MomentumDistribution,
    /// All requested members, scored or not
    pub total_users: usize,
}

/// Summarize the latest scores of an organization's members.
///
/// `latest` holds at most one score per member; members without any score
/// only count toward `total_users`.
pub fn summarize(total_users: usize, latest: &[ScoreRecord]) -> OrgSummary {
    let mut summary = OrgSummary {
        total_users,
        ..OrgSummary::default()
    };

    for score in latest {
        match score.status {
            Status::Stable => summary.counts.stable += 1,
            Status::Watch => summary.counts.watch += 1,
            Status::High => summary.counts.high += 1,
        }
        match score.momentum {
            Momentum::Stable => summary.momentum_distribution.stable += 1,
            Momentum::SlowRise => summary.momentum_distribution.slow_rise += 1,
            Momentum::RapidRise => summary.momentum_distribution.rapid_rise += 1,
        }
    }

    if !latest.is_empty() {
        let mean = latest.iter().map(|s| s.wellbeing_score).sum::<f64>() / latest.len() as f64;
        summary.average_risk = round1(100.0 - mean);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Confidence;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn score(user: &str, wellbeing: f64, momentum: Momentum) -> ScoreRecord {
        ScoreRecord {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            wellbeing_score: wellbeing,
            status: Status::from_score(wellbeing),
            momentum,
            confidence: Confidence::Med,
            drivers: Vec::new(),
        }
    }

    #[test]
    fn test_summary_counts_and_average() {
        let latest = vec![
            score("a", 80.0, Momentum::Stable),
            score("b", 50.0, Momentum::SlowRise),
            score("c", 30.0, Momentum::RapidRise),
        ];
        let summary = summarize(4, &latest);
        assert_eq!(
            summary.counts,
            StatusCounts {
                stable: 1,
                watch: 1,
                high: 1
            }
        );
        assert_eq!(summary.momentum_distribution.rapid_rise, 1);
        assert_eq!(summary.average_risk, 46.7);
        assert_eq!(summary.total_users, 4);
    }

    #[test]
    fn test_empty_organization() {
        let summary = summarize(0, &[]);
        assert_eq!(summary, OrgSummary::default());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(summarize(1, &[score("a", 90.0, Momentum::Stable)])).unwrap();
        assert_eq!(json["counts"]["Stable"], 1);
        assert_eq!(json["momentum_distribution"]["slow_rise"], 0);
        assert_eq!(json["average_risk"], 10.0);
    }
}
