//! Signal ingestion
//!
//! Validates inputs from the check-in, typing and voice collectors and folds
//! them into the day's [`DailySignalRecord`]. Bulk history arrives as NDJSON,
//! one record per line.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DriftError;
use crate::types::{DailySignalRecord, TypingSession};
use crate::voice::types::{SentimentLabel, VoiceSession};

/// Minutes represented by a full activity slider
pub const ACTIVITY_SLIDER_FULL_MINUTES: f64 = 180.0;

/// Daily self-report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    /// Emoji wheel mood (1-10)
    pub mood: f64,
    /// Hours slept (0-14)
    pub sleep_hours: f64,
    /// Sleep quality (1-5)
    pub sleep_quality: u8,
    /// Active minutes, takes precedence over the slider
    #[serde(default)]
    pub activity_minutes: Option<f64>,
    /// Activity slider (0-100)
    #[serde(default)]
    pub activity_slider: Option<f64>,
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), DriftError> {
    if !value.is_finite() || value < min || value > max {
        return Err(DriftError::InvalidInput(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<(), DriftError> {
    if !value.is_finite() || value < 0.0 {
        return Err(DriftError::InvalidInput(format!(
            "{name} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

impl CheckIn {
    pub fn validate(&self) -> Result<(), DriftError> {
        check_range("mood", self.mood, 1.0, 10.0)?;
        check_range("sleep_hours", self.sleep_hours, 0.0, 14.0)?;
        check_range("sleep_quality", f64::from(self.sleep_quality), 1.0, 5.0)?;
        if let Some(minutes) = self.activity_minutes {
            check_non_negative("activity_minutes", minutes)?;
        }
        if let Some(slider) = self.activity_slider {
            check_range("activity_slider", slider, 0.0, 100.0)?;
        }
        Ok(())
    }

    /// Active minutes, converting the slider when no minutes were given
    pub fn activity(&self) -> Option<f64> {
        self.activity_minutes.or_else(|| {
            self.activity_slider
                .map(|slider| slider / 100.0 * ACTIVITY_SLIDER_FULL_MINUTES)
        })
    }

    /// Write the check-in fields into a day's record.
    ///
    /// Activity is only written when minutes or a slider value was given; a
    /// check-in without either keeps the activity already recorded for the day
    /// (for example from an earlier check-in or an import) instead of clearing it.
    pub fn apply_to(&self, record: &mut DailySignalRecord) {
        record.mood_value = Some(self.mood);
        record.sleep_hours = Some(self.sleep_hours);
        record.sleep_quality = Some(f64::from(self.sleep_quality));
        if let Some(activity) = self.activity() {
            record.activity_minutes = Some(activity);
        }
    }
}

/// Reject sessions with negative or non-finite metrics
pub fn validate_typing_session(session: &TypingSession) -> Result<(), DriftError> {
    check_non_negative("avg_interval_ms", session.avg_interval_ms)?;
    check_non_negative("std_interval_ms", session.std_interval_ms)?;
    check_range("backspace_ratio", session.backspace_ratio, 0.0, 1.0)?;
    check_non_negative("session_duration_sec", session.session_duration_sec)?;
    Ok(())
}

/// Replace a day's typing fields with the aggregate of all its sessions.
///
/// Intervals and backspace ratio are averaged, fragmentation is summed and the
/// day is late-night if any session was.
pub fn aggregate_typing(record: &mut DailySignalRecord, sessions: &[TypingSession]) {
    if sessions.is_empty() {
        return;
    }
    let n = sessions.len() as f64;
    let mean_of = |f: fn(&TypingSession) -> f64| sessions.iter().map(f).sum::<f64>() / n;

    record.typing_avg_interval_ms = Some(mean_of(|s| s.avg_interval_ms));
    record.typing_std_ms = Some(mean_of(|s| s.std_interval_ms));
    record.typing_backspace_ratio = Some(mean_of(|s| s.backspace_ratio));
    record.typing_fragmentation = Some(
        sessions
            .iter()
            .map(|s| f64::from(s.fragmentation_count))
            .sum(),
    );
    record.typing_late_night = Some(sessions.iter().any(|s| s.late_night));
}

/// Reject voice sessions the drift engine cannot use
pub fn validate_voice_session(session: &VoiceSession) -> Result<(), DriftError> {
    check_non_negative("duration_sec", session.duration_sec)?;
    if let Some((name, value)) = session.features.iter().find(|(_, v)| !v.is_finite()) {
        return Err(DriftError::InvalidInput(format!(
            "voice feature {name} is not a finite number ({value})"
        )));
    }
    if let Some(compound) = session.sentiment_compound {
        check_range("sentiment_compound", compound, -1.0, 1.0)?;
    }
    Ok(())
}

/// Write a speech sentiment compound and its label into a day's record
pub fn apply_sentiment(record: &mut DailySignalRecord, compound: f64) {
    record.speech_sentiment_compound = Some(compound);
    record.speech_sentiment_label = Some(SentimentLabel::from_compound(compound));
}

/// Parse NDJSON (newline-delimited JSON) containing daily signal records
pub fn parse_ndjson_records(ndjson: &str) -> Result<Vec<DailySignalRecord>, DriftError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<DailySignalRecord>(trimmed).map_err(|e| {
            DriftError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        record.validate().map_err(|e| {
            DriftError::ParseError(format!("Invalid record on line {}: {}", line_num + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Merge records sharing a (user, date), later lines overwriting earlier ones.
///
/// The result is ordered by user, then ascending date.
pub fn merge_by_day(records: Vec<DailySignalRecord>) -> Vec<DailySignalRecord> {
    let mut by_day: BTreeMap<(String, NaiveDate), DailySignalRecord> = BTreeMap::new();
    for record in records {
        let key = (record.user_id.clone(), record.date);
        match by_day.get_mut(&key) {
            Some(existing) => existing.merge(&record),
            None => {
                by_day.insert(key, record);
            }
        }
    }
    by_day.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn check_in() -> CheckIn {
        CheckIn {
            mood: 7.0,
            sleep_hours: 7.5,
            sleep_quality: 4,
            activity_minutes: None,
            activity_slider: Some(50.0),
        }
    }

    fn typing(avg: f64, frag: u32, late: bool) -> TypingSession {
        TypingSession {
            user_id: "u1".to_string(),
            date: day(1),
            avg_interval_ms: avg,
            std_interval_ms: avg / 10.0,
            backspace_ratio: 0.1,
            session_duration_sec: 120.0,
            fragmentation_count: frag,
            late_night: late,
        }
    }

    #[test]
    fn test_check_in_slider_converts_to_minutes() {
        let input = check_in();
        assert!(input.validate().is_ok());
        assert_eq!(input.activity(), Some(90.0));

        let mut record = DailySignalRecord::new("u1", day(1));
        input.apply_to(&mut record);
        assert_eq!(record.mood_value, Some(7.0));
        assert_eq!(record.sleep_quality, Some(4.0));
        assert_eq!(record.activity_minutes, Some(90.0));
    }

    #[test]
    fn test_explicit_minutes_win_over_slider() {
        let input = CheckIn {
            activity_minutes: Some(25.0),
            ..check_in()
        };
        assert_eq!(input.activity(), Some(25.0));
    }

    #[test]
    fn test_check_in_without_activity_keeps_recorded_minutes() {
        let mut record = DailySignalRecord::new("u1", day(1));
        record.activity_minutes = Some(45.0);

        let input = CheckIn {
            activity_minutes: None,
            activity_slider: None,
            ..check_in()
        };
        assert_eq!(input.activity(), None);
        input.apply_to(&mut record);
        assert_eq!(record.mood_value, Some(7.0));
        assert_eq!(record.activity_minutes, Some(45.0));
    }

    #[test]
    fn test_check_in_range_validation() {
        let bad_mood = CheckIn {
            mood: 11.0,
            ..check_in()
        };
        assert!(matches!(bad_mood.validate(), Err(DriftError::InvalidInput(_))));

        let bad_sleep = CheckIn {
            sleep_hours: 15.0,
            ..check_in()
        };
        assert!(bad_sleep.validate().is_err());

        let bad_quality = CheckIn {
            sleep_quality: 0,
            ..check_in()
        };
        assert!(bad_quality.validate().is_err());

        let bad_slider = CheckIn {
            activity_slider: Some(120.0),
            ..check_in()
        };
        assert!(bad_slider.validate().is_err());
    }

    #[test]
    fn test_typing_aggregation() {
        let mut record = DailySignalRecord::new("u1", day(1));
        aggregate_typing(
            &mut record,
            &[typing(300.0, 2, false), typing(400.0, 3, true)],
        );
        assert_eq!(record.typing_avg_interval_ms, Some(350.0));
        assert_eq!(record.typing_std_ms, Some(35.0));
        assert_eq!(record.typing_fragmentation, Some(5.0));
        assert_eq!(record.typing_late_night, Some(true));
    }

    #[test]
    fn test_typing_validation() {
        let mut session = typing(300.0, 1, false);
        assert!(validate_typing_session(&session).is_ok());
        session.backspace_ratio = 1.5;
        assert!(validate_typing_session(&session).is_err());
        session.backspace_ratio = 0.2;
        session.avg_interval_ms = f64::INFINITY;
        assert!(validate_typing_session(&session).is_err());
    }

    #[test]
    fn test_sentiment_applies_label() {
        let mut record = DailySignalRecord::new("u1", day(1));
        apply_sentiment(&mut record, -0.4);
        assert_eq!(record.speech_sentiment_compound, Some(-0.4));
        assert_eq!(record.speech_sentiment_label, Some(SentimentLabel::Negative));
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"{"user_id":"u1","date":"2024-08-02","mood_value":6}

{"user_id":"u1","date":"2024-08-01","sleep_hours":7.5}
"#;
        let records = parse_ndjson_records(ndjson).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mood_value, Some(6.0));
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"user_id\":\"u1\",\"date\":\"2024-08-01\"}\n{not json}\n";
        let err = parse_ndjson_records(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_merge_by_day_orders_and_overwrites() {
        let mut a = DailySignalRecord::new("u1", day(2));
        a.mood_value = Some(4.0);
        a.sleep_hours = Some(6.0);
        let mut b = DailySignalRecord::new("u1", day(1));
        b.mood_value = Some(8.0);
        let mut c = DailySignalRecord::new("u1", day(2));
        c.mood_value = Some(5.0);

        let merged = merge_by_day(vec![a, b, c]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].date, day(1));
        assert_eq!(merged[1].mood_value, Some(5.0));
        assert_eq!(merged[1].sleep_hours, Some(6.0));
    }
}
