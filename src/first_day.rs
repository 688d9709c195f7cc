//! First-day estimation
//!
//! Absolute fallback scoring for users with no personal baseline yet. Each
//! available signal is mapped onto 0-100 on its own and the parts are averaged
//! without weights.

use crate::stats::round1;
use crate::types::{Confidence, DailySignalRecord, SignalKey, Status};

/// Score used when a first-day record carries no usable signal
pub const NEUTRAL_WELLBEING: f64 = 50.0;

/// Maximum number of first-day drivers
const MAX_FIRST_DAY_DRIVERS: usize = 3;

/// Outcome of first-day scoring
#[derive(Debug, Clone, PartialEq)]
pub struct FirstDayEstimate {
    pub wellbeing_score: f64,
    pub status: Status,
    pub drivers: Vec<SignalKey>,
    /// Always low: there is nothing personal to compare against
    pub confidence: Confidence,
}

/// Stateless first-day estimator
pub struct FirstDayEstimator;

impl FirstDayEstimator {
    pub fn estimate(day: &DailySignalRecord) -> FirstDayEstimate {
        let mut parts = Vec::new();
        let mut drivers = Vec::new();

        // Mapping order also fixes driver order
        let mappings: [(SignalKey, fn(f64) -> f64); 6] = [
            (SignalKey::MoodValue, mood_part),
            (SignalKey::SleepQuality, sleep_quality_part),
            (SignalKey::SleepHours, sleep_hours_part),
            (SignalKey::ActivityMinutes, activity_part),
            (SignalKey::VoiceStrainScore, voice_strain_part),
            (SignalKey::SpeechSentimentCompound, sentiment_part),
        ];

        for (key, mapping) in mappings {
            if let Some(value) = day.value(key) {
                parts.push(mapping(value).clamp(0.0, 100.0));
                drivers.push(key);
            }
        }

        if parts.is_empty() {
            return FirstDayEstimate {
                wellbeing_score: NEUTRAL_WELLBEING,
                status: Status::Watch,
                drivers: Vec::new(),
                confidence: Confidence::Low,
            };
        }

        let average = parts.iter().sum::<f64>() / parts.len() as f64;
        let wellbeing_score = round1(average).clamp(0.0, 100.0);
        drivers.truncate(MAX_FIRST_DAY_DRIVERS);

        FirstDayEstimate {
            wellbeing_score,
            status: Status::from_score(wellbeing_score),
            drivers,
            confidence: Confidence::Low,
        }
    }
}

/// Mood 1-10, linear
fn mood_part(mood: f64) -> f64 {
    (mood - 1.0) / 9.0 * 100.0
}

/// Sleep quality 1-5, linear onto 20-100
fn sleep_quality_part(quality: f64) -> f64 {
    (quality - 1.0) / 4.0 * 80.0 + 20.0
}

/// Sleep hours, peaking at 7.5h
fn sleep_hours_part(hours: f64) -> f64 {
    if hours < 5.0 {
        20.0
    } else if hours < 6.0 {
        50.0
    } else if hours <= 9.0 {
        70.0 + (4.0 - (hours - 7.5).abs()) * 7.5
    } else {
        (80.0 - (hours - 9.0) * 10.0).max(40.0)
    }
}

/// Activity minutes, saturating at one hour
fn activity_part(minutes: f64) -> f64 {
    (minutes / 60.0 * 100.0).min(100.0)
}

/// Voice strain 0-100, inverted
fn voice_strain_part(strain: f64) -> f64 {
    100.0 - strain
}

/// Sentiment compound -1..1, linear
fn sentiment_part(compound: f64) -> f64 {
    (compound + 1.0) / 2.0 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn empty() -> DailySignalRecord {
        DailySignalRecord::new("u1", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    #[test]
    fn test_typical_first_check_in() {
        let mut day = empty();
        day.mood_value = Some(8.0);
        day.sleep_quality = Some(4.0);
        day.sleep_hours = Some(7.5);
        day.activity_minutes = Some(40.0);

        let estimate = FirstDayEstimator::estimate(&day);
        // mood 77.78, quality 80, sleep hours 100, activity 66.67
        let expected = round1((700.0 / 9.0 + 80.0 + 100.0 + 200.0 / 3.0) / 4.0);
        assert_eq!(estimate.wellbeing_score, expected);
        assert_eq!(estimate.wellbeing_score, 81.1);
        assert_eq!(estimate.status, Status::Stable);
        assert_eq!(estimate.confidence, Confidence::Low);
        assert_eq!(
            estimate.drivers,
            vec![SignalKey::MoodValue, SignalKey::SleepQuality, SignalKey::SleepHours]
        );
    }

    #[test]
    fn test_no_signals_is_neutral_watch() {
        let estimate = FirstDayEstimator::estimate(&empty());
        assert_eq!(estimate.wellbeing_score, 50.0);
        assert_eq!(estimate.status, Status::Watch);
        assert!(estimate.drivers.is_empty());
        assert_eq!(estimate.confidence, Confidence::Low);
    }

    #[test]
    fn test_sleep_hours_piecewise() {
        assert_eq!(sleep_hours_part(4.0), 20.0);
        assert_eq!(sleep_hours_part(5.5), 50.0);
        assert_eq!(sleep_hours_part(6.0), 88.75);
        assert_eq!(sleep_hours_part(7.5), 100.0);
        assert_eq!(sleep_hours_part(9.0), 88.75);
        assert_eq!(sleep_hours_part(10.0), 70.0);
        assert_eq!(sleep_hours_part(14.0), 40.0);
    }

    #[test]
    fn test_parts_are_clamped_individually() {
        let mut day = empty();
        day.activity_minutes = Some(240.0);
        day.voice_strain_score = Some(130.0);
        let estimate = FirstDayEstimator::estimate(&day);
        // activity 100, voice strain clamped to 0
        assert_eq!(estimate.wellbeing_score, 50.0);
    }

    #[test]
    fn test_voice_and_sentiment_only() {
        let mut day = empty();
        day.voice_strain_score = Some(20.0);
        day.speech_sentiment_compound = Some(-0.5);
        let estimate = FirstDayEstimator::estimate(&day);
        assert_eq!(estimate.wellbeing_score, 52.5);
        assert_eq!(
            estimate.drivers,
            vec![SignalKey::VoiceStrainScore, SignalKey::SpeechSentimentCompound]
        );
    }

    #[test]
    fn test_low_inputs_grade_high_risk() {
        let mut day = empty();
        day.mood_value = Some(1.0);
        day.sleep_hours = Some(3.0);
        let estimate = FirstDayEstimator::estimate(&day);
        assert_eq!(estimate.wellbeing_score, 10.0);
        assert_eq!(estimate.status, Status::High);
    }
}
