//! Risk aggregation
//!
//! Combines per-signal badness into one weighted risk and maps it onto the
//! inverted 0-100 wellbeing score and its status band.

use crate::baseline::BaselineStats;
use crate::config::{EngineConfig, WeightTable};
use crate::deviation::{badness, z_against};
use crate::stats::round1;
use crate::types::{DailySignalRecord, SignalKey, Status};

/// Weighted deviation of one signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub key: SignalKey,
    pub z: f64,
    pub badness: f64,
    /// badness × weight
    pub contribution: f64,
}

/// Result of aggregating one day against its baseline
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Raw risk, 0-1
    pub risk: f64,
    pub wellbeing_score: f64,
    pub status: Status,
    /// Strongest contributors above the driver floor
    pub drivers: Vec<SignalKey>,
    /// Every scored contribution, strongest first
    pub contributions: Vec<Contribution>,
}

/// Weighted-sum risk aggregator
#[derive(Debug, Clone)]
pub struct RiskAggregator {
    weights: WeightTable,
    risk_scale: f64,
    driver_min_contribution: f64,
    max_drivers: usize,
}

impl Default for RiskAggregator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl RiskAggregator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            weights: config.weights(),
            risk_scale: config.risk_scale,
            driver_min_contribution: config.driver_min_contribution,
            max_drivers: config.max_drivers,
        }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Score a day against its baseline.
    ///
    /// Only signals that have a baseline and a value today contribute.
    pub fn assess(&self, day: &DailySignalRecord, baseline: &BaselineStats) -> RiskAssessment {
        let contributions = self.contributions(day, baseline);
        let total: f64 = contributions.iter().map(|c| c.contribution).sum();
        let risk = (total * self.risk_scale).min(1.0);
        let (wellbeing_score, status) = wellbeing_and_status(risk);

        let drivers = contributions
            .iter()
            .take(self.max_drivers)
            .filter(|c| c.contribution > self.driver_min_contribution)
            .map(|c| c.key)
            .collect();

        RiskAssessment {
            risk,
            wellbeing_score,
            status,
            drivers,
            contributions,
        }
    }

    /// Per-signal contributions sorted strongest first (ties keep table order)
    pub fn contributions(
        &self,
        day: &DailySignalRecord,
        baseline: &BaselineStats,
    ) -> Vec<Contribution> {
        let mut contributions: Vec<Contribution> = self
            .weights
            .keys()
            .filter_map(|key| {
                let stats = baseline.get(*key)?;
                let value = day.value(*key)?;
                let weight = self.weights.weight(*key)?;
                let z = z_against(Some(value), stats);
                let bad = badness(z, *key);
                Some(Contribution {
                    key: *key,
                    z,
                    badness: bad,
                    contribution: bad * weight,
                })
            })
            .collect();

        contributions.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        contributions
    }
}

/// Map raw risk (0-1) to a wellbeing score (0-100, one decimal) and status
pub fn wellbeing_and_status(risk: f64) -> (f64, Status) {
    let wellbeing = round1(((1.0 - risk) * 100.0).clamp(0.0, 100.0));
    (wellbeing, Status::from_score(wellbeing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn steady_history() -> Vec<DailySignalRecord> {
        // Alternating values give every signal a mean and a unit-ish std
        (1..=7)
            .map(|d| {
                let even = d % 2 == 0;
                let mut r = DailySignalRecord::new("u1", day(d));
                r.sleep_hours = Some(if even { 7.0 } else { 8.0 });
                r.sleep_quality = Some(if even { 3.0 } else { 4.0 });
                r.activity_minutes = Some(if even { 30.0 } else { 40.0 });
                r.mood_value = Some(if even { 6.0 } else { 8.0 });
                r.typing_avg_interval_ms = Some(if even { 280.0 } else { 320.0 });
                r
            })
            .collect()
    }

    #[test]
    fn test_day_at_baseline_is_stable() {
        let aggregator = RiskAggregator::default();
        let history = steady_history();
        let baseline = BaselineStats::estimate(&history, 7, aggregator.weights());

        let mut today = DailySignalRecord::new("u1", day(8));
        today.mood_value = Some(baseline.get(SignalKey::MoodValue).unwrap().mean);
        today.sleep_hours = Some(baseline.get(SignalKey::SleepHours).unwrap().mean);

        let assessment = aggregator.assess(&today, &baseline);
        assert!(assessment.risk.abs() < 1e-9);
        assert_eq!(assessment.wellbeing_score, 100.0);
        assert_eq!(assessment.status, Status::Stable);
        assert!(assessment.drivers.is_empty());
    }

    #[test]
    fn test_low_mood_becomes_top_driver() {
        let aggregator = RiskAggregator::default();
        let baseline = BaselineStats::estimate(&steady_history(), 7, aggregator.weights());

        let mut today = DailySignalRecord::new("u1", day(8));
        today.mood_value = Some(3.0);
        today.typing_avg_interval_ms = Some(350.0);
        today.activity_minutes = Some(60.0); // above baseline is harmless

        let assessment = aggregator.assess(&today, &baseline);
        assert_eq!(assessment.drivers[0], SignalKey::MoodValue);
        assert!(assessment.drivers.contains(&SignalKey::TypingAvgIntervalMs));
        assert!(!assessment.drivers.contains(&SignalKey::ActivityMinutes));
        assert!(assessment.wellbeing_score < 45.0);
        assert_eq!(assessment.status, Status::High);

        let activity = assessment
            .contributions
            .iter()
            .find(|c| c.key == SignalKey::ActivityMinutes)
            .unwrap();
        assert_eq!(activity.contribution, 0.0);
    }

    #[test]
    fn test_contributions_sorted_descending() {
        let aggregator = RiskAggregator::default();
        let baseline = BaselineStats::estimate(&steady_history(), 7, aggregator.weights());

        let mut today = DailySignalRecord::new("u1", day(8));
        today.mood_value = Some(5.0);
        today.sleep_hours = Some(5.0);
        today.sleep_quality = Some(2.0);

        let assessment = aggregator.assess(&today, &baseline);
        let values: Vec<f64> = assessment
            .contributions
            .iter()
            .map(|c| c.contribution)
            .collect();
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(values, sorted);
        assert!(assessment.drivers.len() <= 3);
    }

    #[test]
    fn test_risk_saturates_at_one() {
        let aggregator = RiskAggregator::default();
        let baseline = BaselineStats::estimate(&steady_history(), 7, aggregator.weights());

        let mut today = DailySignalRecord::new("u1", day(8));
        today.mood_value = Some(1.0);
        today.sleep_hours = Some(2.0);
        today.sleep_quality = Some(1.0);

        let assessment = aggregator.assess(&today, &baseline);
        assert_eq!(assessment.risk, 1.0);
        assert_eq!(assessment.wellbeing_score, 0.0);
        assert_eq!(assessment.status, Status::High);
    }

    #[test]
    fn test_signals_without_baseline_are_ignored() {
        let aggregator = RiskAggregator::default();
        let baseline = BaselineStats::estimate(&steady_history(), 7, aggregator.weights());

        let mut today = DailySignalRecord::new("u1", day(8));
        today.voice_strain_score = Some(95.0);

        let assessment = aggregator.assess(&today, &baseline);
        assert!(assessment.contributions.is_empty());
        assert_eq!(assessment.wellbeing_score, 100.0);
    }

    #[test]
    fn test_wellbeing_and_status_mapping() {
        assert_eq!(wellbeing_and_status(0.0), (100.0, Status::Stable));
        assert_eq!(wellbeing_and_status(0.3), (70.0, Status::Stable));
        assert_eq!(wellbeing_and_status(0.55), (45.0, Status::Watch));
        assert_eq!(wellbeing_and_status(0.5512), (44.9, Status::High));
        assert_eq!(wellbeing_and_status(1.0), (0.0, Status::High));
    }
}
