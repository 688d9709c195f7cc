//! Baseline estimation
//!
//! This module builds the personal per-signal baseline (mean, std) that daily
//! deviations are measured against. The baseline is anchored on the earliest
//! records of the lookback window, not the most recent ones.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, WeightTable};
use crate::stats::{mean, population_std, EPSILON};
use crate::types::{DailySignalRecord, SignalKey};

/// Minimum non-null values a signal needs to enter the baseline
pub const MIN_BASELINE_SAMPLES: usize = 2;

/// Baseline statistics for one signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalBaseline {
    pub mean: f64,
    /// Population std plus epsilon, never zero
    pub std: f64,
    pub samples: usize,
}

/// Per-signal baseline for one user at one target date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    signals: BTreeMap<SignalKey, SignalBaseline>,
    /// Number of records forming the anchor window
    days_used: usize,
}

impl BaselineStats {
    /// Estimate baselines from history strictly before the target date.
    ///
    /// Uses the earliest `baseline_days` records; fewer than two records yields
    /// an empty baseline.
    pub fn estimate(
        history: &[DailySignalRecord],
        baseline_days: usize,
        weights: &WeightTable,
    ) -> Self {
        if history.len() < MIN_BASELINE_SAMPLES {
            return Self::default();
        }

        let mut ordered: Vec<&DailySignalRecord> = history.iter().collect();
        ordered.sort_by_key(|record| record.date);
        let anchor = &ordered[..baseline_days.min(ordered.len())];

        let mut signals = BTreeMap::new();
        for key in weights.keys() {
            let values: Vec<f64> = anchor
                .iter()
                .filter_map(|record| record.value(*key))
                .collect();
            if values.len() < MIN_BASELINE_SAMPLES {
                continue;
            }
            if let (Some(mu), Some(sd)) = (mean(&values), population_std(&values)) {
                signals.insert(
                    *key,
                    SignalBaseline {
                        mean: mu,
                        std: sd + EPSILON,
                        samples: values.len(),
                    },
                );
            }
        }

        Self {
            signals,
            days_used: anchor.len(),
        }
    }

    pub fn get(&self, key: SignalKey) -> Option<&SignalBaseline> {
        self.signals.get(&key)
    }

    /// True when no signal qualified for a baseline
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn days_used(&self) -> usize {
        self.days_used
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignalKey, &SignalBaseline)> {
        self.signals.iter()
    }

    /// Load baseline stats from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize baseline stats to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inclusive history window fetched for a target date: it ends the day before
/// the target and spans `baseline_days + lookback_extra_days` days before that.
pub fn baseline_window(target: NaiveDate, config: &EngineConfig) -> (NaiveDate, NaiveDate) {
    let end = target - Duration::days(1);
    let span = config.baseline_days as i64 + config.baseline_lookback_extra_days;
    (end - Duration::days(span), end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(d: u32, mood: Option<f64>, sleep: Option<f64>) -> DailySignalRecord {
        let mut record = DailySignalRecord::new("user-1", day(d));
        record.mood_value = mood;
        record.sleep_hours = sleep;
        record
    }

    #[test]
    fn test_baseline_uses_earliest_records() {
        let weights = WeightTable::ten_signal();
        // Seven steady days, then a drifting tail that must not enter the baseline
        let mut history: Vec<DailySignalRecord> =
            (1..=7).map(|d| record(d, Some(7.0), Some(8.0))).collect();
        history.extend((8..=12).map(|d| record(d, Some(2.0), Some(4.0))));

        let stats = BaselineStats::estimate(&history, 7, &weights);
        let mood = stats.get(SignalKey::MoodValue).unwrap();
        assert!((mood.mean - 7.0).abs() < 1e-9);
        assert!((mood.std - EPSILON).abs() < 1e-12);
        assert_eq!(mood.samples, 7);
        assert_eq!(stats.days_used(), 7);
    }

    #[test]
    fn test_baseline_orders_unsorted_history() {
        let weights = WeightTable::ten_signal();
        let history = vec![record(3, Some(9.0), None), record(1, Some(5.0), None), record(2, Some(7.0), None)];
        let stats = BaselineStats::estimate(&history, 2, &weights);
        // Earliest two days are 1 and 2
        assert!((stats.get(SignalKey::MoodValue).unwrap().mean - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_signal_needs_two_values() {
        let weights = WeightTable::ten_signal();
        let history = vec![record(1, Some(6.0), Some(7.0)), record(2, Some(8.0), None)];
        let stats = BaselineStats::estimate(&history, 7, &weights);
        assert!(stats.get(SignalKey::MoodValue).is_some());
        assert!(stats.get(SignalKey::SleepHours).is_none());
        assert_eq!(stats.signal_count(), 1);
    }

    #[test]
    fn test_single_record_gives_empty_baseline() {
        let weights = WeightTable::ten_signal();
        let stats = BaselineStats::estimate(&[record(1, Some(6.0), Some(7.0))], 7, &weights);
        assert!(stats.is_empty());
        assert_eq!(stats.days_used(), 0);
    }

    #[test]
    fn test_eight_signal_table_skips_voice() {
        let weights = WeightTable::eight_signal();
        let mut a = record(1, Some(6.0), None);
        a.voice_strain_score = Some(20.0);
        let mut b = record(2, Some(8.0), None);
        b.voice_strain_score = Some(40.0);
        let stats = BaselineStats::estimate(&[a, b], 7, &weights);
        assert!(stats.get(SignalKey::VoiceStrainScore).is_none());
        assert!(stats.get(SignalKey::MoodValue).is_some());
    }

    #[test]
    fn test_population_std_with_epsilon() {
        let weights = WeightTable::ten_signal();
        let history = vec![record(1, Some(4.0), None), record(2, Some(6.0), None)];
        let stats = BaselineStats::estimate(&history, 7, &weights);
        let mood = stats.get(SignalKey::MoodValue).unwrap();
        assert!((mood.std - (1.0 + EPSILON)).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_window_bounds() {
        let config = EngineConfig::default();
        let (from, to) = baseline_window(day(31), &config);
        assert_eq!(to, day(30));
        assert_eq!(from, day(30) - Duration::days(37));
    }

    #[test]
    fn test_serialization() {
        let weights = WeightTable::ten_signal();
        let history = vec![record(1, Some(4.0), Some(7.0)), record(2, Some(6.0), Some(8.0))];
        let stats = BaselineStats::estimate(&history, 7, &weights);

        let json = stats.to_json().unwrap();
        let loaded = BaselineStats::from_json(&json).unwrap();
        assert_eq!(stats, loaded);
    }
}
