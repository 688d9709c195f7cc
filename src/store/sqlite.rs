//! SQLite-backed store
//!
//! Dates are stored as `YYYY-MM-DD` text and voice timestamps as fixed-width
//! RFC 3339 text, so lexical order matches chronological order. Score drivers
//! and voice features are JSON text columns.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;
use uuid::Uuid;

use crate::store::{ScoreStore, SignalStore, StoreError};
use crate::types::{DailySignalRecord, ScoreRecord, SignalKey, TypingSession};
use crate::voice::types::VoiceSession;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| StoreError::Malformed(format!("bad date '{raw}': {e}")))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("bad timestamp '{raw}': {e}")))
}

fn parse_enum<T>(raw: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    raw.parse().map_err(StoreError::Malformed)
}

fn parse_optional_enum<T>(raw: Option<String>) -> Result<Option<T>, StoreError>
where
    T: FromStr<Err = String>,
{
    raw.as_deref().map(parse_enum).transpose()
}

/// Parse the rows of a range read, skipping rows whose stored data is malformed.
///
/// A bad row only affects computations keyed on its own date, so range reads
/// log and drop it; other errors still fail the read.
fn collect_well_formed<R, T>(
    user_id: &str,
    table: &str,
    rows: impl Iterator<Item = rusqlite::Result<R>>,
    parse: impl Fn(R) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    let mut parsed = Vec::new();
    for row in rows {
        let raw = match row {
            Ok(raw) => raw,
            Err(
                e @ (rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..)),
            ) => {
                warn!(user = %user_id, table, error = %e, "skipping unreadable row");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match parse(raw) {
            Ok(record) => parsed.push(record),
            Err(StoreError::Malformed(reason)) => {
                warn!(user = %user_id, table, %reason, "skipping malformed row");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(parsed)
}

/// Signal row as read from SQLite, before text columns are parsed
struct RawSignalRow {
    user_id: String,
    date: String,
    values: [Option<f64>; 10],
    typing_late_night: Option<bool>,
    voice_strain_level: Option<String>,
    voice_confidence: Option<String>,
    speech_sentiment_label: Option<String>,
}

const SIGNAL_COLUMNS: &str = "user_id, date, sleep_hours, sleep_quality, activity_minutes, \
    mood_value, typing_avg_interval_ms, typing_std_ms, typing_backspace_ratio, \
    typing_fragmentation, voice_strain_score, speech_sentiment_compound, \
    typing_late_night, voice_strain_level, voice_confidence, speech_sentiment_label";

impl RawSignalRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut values = [None; 10];
        for (offset, slot) in values.iter_mut().enumerate() {
            *slot = row.get(2 + offset)?;
        }
        Ok(Self {
            user_id: row.get(0)?,
            date: row.get(1)?,
            values,
            typing_late_night: row.get(12)?,
            voice_strain_level: row.get(13)?,
            voice_confidence: row.get(14)?,
            speech_sentiment_label: row.get(15)?,
        })
    }

    fn into_record(self) -> Result<DailySignalRecord, StoreError> {
        let mut record = DailySignalRecord::new(self.user_id, parse_date(&self.date)?);
        // Column order follows SignalKey::ALL
        for (key, value) in SignalKey::ALL.iter().zip(self.values) {
            record.set_value(*key, value);
        }
        record.typing_late_night = self.typing_late_night;
        record.voice_strain_level = parse_optional_enum(self.voice_strain_level)?;
        record.voice_confidence = parse_optional_enum(self.voice_confidence)?;
        record.speech_sentiment_label = parse_optional_enum(self.speech_sentiment_label)?;
        Ok(record)
    }
}

struct RawScoreRow {
    id: String,
    user_id: String,
    date: String,
    wellbeing_score: f64,
    status: String,
    momentum: String,
    confidence: String,
    drivers: String,
}

const SCORE_COLUMNS: &str =
    "id, user_id, date, wellbeing_score, status, momentum, confidence, drivers";

impl RawScoreRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            wellbeing_score: row.get(3)?,
            status: row.get(4)?,
            momentum: row.get(5)?,
            confidence: row.get(6)?,
            drivers: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<ScoreRecord, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Malformed(format!("bad score id '{}': {e}", self.id)))?;
        let drivers: Vec<SignalKey> = serde_json::from_str(&self.drivers)
            .map_err(|e| StoreError::Malformed(format!("bad drivers '{}': {e}", self.drivers)))?;
        Ok(ScoreRecord {
            id,
            user_id: self.user_id,
            date: parse_date(&self.date)?,
            wellbeing_score: self.wellbeing_score,
            status: parse_enum(&self.status)?,
            momentum: parse_enum(&self.momentum)?,
            confidence: parse_enum(&self.confidence)?,
            drivers,
        })
    }
}

struct RawVoiceRow {
    user_id: String,
    recorded_at: String,
    duration_sec: f64,
    features: String,
    sentiment_compound: Option<f64>,
}

impl RawVoiceRow {
    fn into_session(self) -> Result<VoiceSession, StoreError> {
        let features: BTreeMap<String, f64> = serde_json::from_str(&self.features)
            .map_err(|e| StoreError::Malformed(format!("bad voice features: {e}")))?;
        Ok(VoiceSession {
            user_id: self.user_id,
            recorded_at: parse_timestamp(&self.recorded_at)?,
            duration_sec: self.duration_sec,
            features,
            sentiment_compound: self.sentiment_compound,
        })
    }
}

impl SignalStore for SqliteStore {
    fn signal_records(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySignalRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signal_records \
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date ASC"
        ))?;
        let rows = stmt.query_map(
            params![user_id, format_date(from), format_date(to)],
            RawSignalRow::from_row,
        )?;
        collect_well_formed(user_id, "signal_records", rows, RawSignalRow::into_record)
    }

    fn signal_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySignalRecord>, StoreError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {SIGNAL_COLUMNS} FROM signal_records WHERE user_id = ?1 AND date = ?2"
                ),
                params![user_id, format_date(date)],
                RawSignalRow::from_row,
            )
            .optional()?;
        raw.map(RawSignalRow::into_record).transpose()
    }

    fn put_signal_record(&self, record: &DailySignalRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO signal_records (
                user_id, date, sleep_hours, sleep_quality, activity_minutes, mood_value,
                typing_avg_interval_ms, typing_std_ms, typing_backspace_ratio,
                typing_fragmentation, voice_strain_score, speech_sentiment_compound,
                typing_late_night, voice_strain_level, voice_confidence, speech_sentiment_label
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(user_id, date) DO UPDATE SET
                sleep_hours = excluded.sleep_hours,
                sleep_quality = excluded.sleep_quality,
                activity_minutes = excluded.activity_minutes,
                mood_value = excluded.mood_value,
                typing_avg_interval_ms = excluded.typing_avg_interval_ms,
                typing_std_ms = excluded.typing_std_ms,
                typing_backspace_ratio = excluded.typing_backspace_ratio,
                typing_fragmentation = excluded.typing_fragmentation,
                voice_strain_score = excluded.voice_strain_score,
                speech_sentiment_compound = excluded.speech_sentiment_compound,
                typing_late_night = excluded.typing_late_night,
                voice_strain_level = excluded.voice_strain_level,
                voice_confidence = excluded.voice_confidence,
                speech_sentiment_label = excluded.speech_sentiment_label
            "#,
            params![
                record.user_id,
                format_date(record.date),
                record.sleep_hours,
                record.sleep_quality,
                record.activity_minutes,
                record.mood_value,
                record.typing_avg_interval_ms,
                record.typing_std_ms,
                record.typing_backspace_ratio,
                record.typing_fragmentation,
                record.voice_strain_score,
                record.speech_sentiment_compound,
                record.typing_late_night,
                record.voice_strain_level.map(|level| level.as_str()),
                record.voice_confidence.map(|confidence| confidence.as_str()),
                record.speech_sentiment_label.map(|label| label.as_str()),
            ],
        )?;
        Ok(())
    }

    fn typing_sessions(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TypingSession>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT avg_interval_ms, std_interval_ms, backspace_ratio,
                   session_duration_sec, fragmentation_count, late_night
            FROM typing_sessions
            WHERE user_id = ?1 AND date = ?2
            ORDER BY id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, format_date(date)], |row| {
            Ok(TypingSession {
                user_id: user_id.to_string(),
                date,
                avg_interval_ms: row.get(0)?,
                std_interval_ms: row.get(1)?,
                backspace_ratio: row.get(2)?,
                session_duration_sec: row.get(3)?,
                fragmentation_count: row.get(4)?,
                late_night: row.get(5)?,
            })
        })?;
        let sessions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn add_typing_session(&self, session: &TypingSession) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO typing_sessions (
                user_id, date, avg_interval_ms, std_interval_ms, backspace_ratio,
                session_duration_sec, fragmentation_count, late_night
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                session.user_id,
                format_date(session.date),
                session.avg_interval_ms,
                session.std_interval_ms,
                session.backspace_ratio,
                session.session_duration_sec,
                session.fragmentation_count,
                session.late_night,
            ],
        )?;
        Ok(())
    }

    fn voice_sessions_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<VoiceSession>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, recorded_at, duration_sec, features, sentiment_compound
            FROM voice_sessions
            WHERE user_id = ?1 AND recorded_at < ?2
            ORDER BY recorded_at DESC
            LIMIT ?3
            "#,
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![user_id, format_timestamp(before), limit], |row| {
            Ok(RawVoiceRow {
                user_id: row.get(0)?,
                recorded_at: row.get(1)?,
                duration_sec: row.get(2)?,
                features: row.get(3)?,
                sentiment_compound: row.get(4)?,
            })
        })?;
        collect_well_formed(user_id, "voice_sessions", rows, RawVoiceRow::into_session)
    }

    fn add_voice_session(&self, session: &VoiceSession) -> Result<(), StoreError> {
        let features = serde_json::to_string(&session.features)
            .map_err(|e| StoreError::Malformed(format!("unencodable voice features: {e}")))?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO voice_sessions (
                user_id, recorded_at, duration_sec, features, sentiment_compound
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                session.user_id,
                format_timestamp(session.recorded_at),
                session.duration_sec,
                features,
                session.sentiment_compound,
            ],
        )?;
        Ok(())
    }
}

impl ScoreStore for SqliteStore {
    fn score_records(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScoreRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCORE_COLUMNS} FROM score_records \
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date ASC"
        ))?;
        let rows = stmt.query_map(
            params![user_id, format_date(from), format_date(to)],
            RawScoreRow::from_row,
        )?;
        collect_well_formed(user_id, "score_records", rows, RawScoreRow::into_record)
    }

    fn score_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, StoreError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {SCORE_COLUMNS} FROM score_records WHERE user_id = ?1 AND date = ?2"
                ),
                params![user_id, format_date(date)],
                RawScoreRow::from_row,
            )
            .optional()?;
        raw.map(RawScoreRow::into_record).transpose()
    }

    fn latest_score_on_or_before(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, StoreError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {SCORE_COLUMNS} FROM score_records \
                     WHERE user_id = ?1 AND date <= ?2 ORDER BY date DESC LIMIT 1"
                ),
                params![user_id, format_date(date)],
                RawScoreRow::from_row,
            )
            .optional()?;
        raw.map(RawScoreRow::into_record).transpose()
    }

    fn upsert_score(&self, record: &ScoreRecord) -> Result<ScoreRecord, StoreError> {
        let drivers = serde_json::to_string(&record.drivers)
            .map_err(|e| StoreError::Malformed(format!("unencodable drivers: {e}")))?;
        let date = format_date(record.date);

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO score_records (
                id, user_id, date, wellbeing_score, status, momentum, confidence, drivers
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, date) DO UPDATE SET
                wellbeing_score = excluded.wellbeing_score,
                status = excluded.status,
                momentum = excluded.momentum,
                confidence = excluded.confidence,
                drivers = excluded.drivers
            "#,
            params![
                record.id.to_string(),
                record.user_id,
                date,
                record.wellbeing_score,
                record.status.as_str(),
                record.momentum.as_str(),
                record.confidence.as_str(),
                drivers,
            ],
        )?;

        let raw = conn.query_row(
            &format!("SELECT {SCORE_COLUMNS} FROM score_records WHERE user_id = ?1 AND date = ?2"),
            params![record.user_id, date],
            RawScoreRow::from_row,
        )?;
        raw.into_record()
    }
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS signal_records (
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            sleep_hours REAL,
            sleep_quality REAL,
            activity_minutes REAL,
            mood_value REAL,
            typing_avg_interval_ms REAL,
            typing_std_ms REAL,
            typing_backspace_ratio REAL,
            typing_fragmentation REAL,
            voice_strain_score REAL,
            speech_sentiment_compound REAL,
            typing_late_night INTEGER,
            voice_strain_level TEXT,
            voice_confidence TEXT,
            speech_sentiment_label TEXT,
            UNIQUE(user_id, date)
        );

        CREATE TABLE IF NOT EXISTS score_records (
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            wellbeing_score REAL NOT NULL,
            status TEXT NOT NULL,
            momentum TEXT NOT NULL,
            confidence TEXT NOT NULL,
            drivers TEXT NOT NULL,
            UNIQUE(user_id, date)
        );

        CREATE TABLE IF NOT EXISTS typing_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            avg_interval_ms REAL NOT NULL,
            std_interval_ms REAL NOT NULL,
            backspace_ratio REAL NOT NULL,
            session_duration_sec REAL NOT NULL,
            fragmentation_count INTEGER NOT NULL,
            late_night INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_typing_sessions_day ON typing_sessions(user_id, date);

        CREATE TABLE IF NOT EXISTS voice_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            duration_sec REAL NOT NULL,
            features TEXT NOT NULL,
            sentiment_compound REAL
        );
        CREATE INDEX IF NOT EXISTS idx_voice_sessions_user ON voice_sessions(user_id, recorded_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::engine::DriftEngine;
    use crate::error::DriftError;
    use crate::types::{Confidence, Momentum, Status};
    use crate::voice::types::{SentimentLabel, StrainLevel, VoiceConfidence};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn full_record() -> DailySignalRecord {
        let mut record = DailySignalRecord::new("alice", day(3));
        for (i, key) in SignalKey::ALL.iter().enumerate() {
            record.set_value(*key, Some(i as f64 + 0.5));
        }
        record.typing_late_night = Some(true);
        record.voice_strain_level = Some(StrainLevel::Medium);
        record.voice_confidence = Some(VoiceConfidence::High);
        record.speech_sentiment_label = Some(SentimentLabel::Negative);
        record
    }

    fn score(d: u32, wellbeing: f64) -> ScoreRecord {
        ScoreRecord {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            date: day(d),
            wellbeing_score: wellbeing,
            status: Status::from_score(wellbeing),
            momentum: Momentum::SlowRise,
            confidence: Confidence::High,
            drivers: vec![SignalKey::SleepHours, SignalKey::TypingStdMs],
        }
    }

    #[test]
    fn test_signal_record_persists_every_column() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = full_record();
        store.put_signal_record(&record).unwrap();

        let loaded = store.signal_record("alice", day(3)).unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.signal_record("alice", day(4)).unwrap().is_none());
    }

    #[test]
    fn test_put_signal_record_upserts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = DailySignalRecord::new("alice", day(1));
        record.mood_value = Some(4.0);
        store.put_signal_record(&record).unwrap();
        record.mood_value = Some(9.0);
        store.put_signal_record(&record).unwrap();

        let records = store.signal_records("alice", day(1), day(1)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mood_value, Some(9.0));
    }

    #[test]
    fn test_upsert_score_preserves_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.upsert_score(&score(5, 72.5)).unwrap();
        let second = store.upsert_score(&score(5, 41.0)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.wellbeing_score, 41.0);
        assert_eq!(second.status, Status::High);
        assert_eq!(second.drivers, vec![SignalKey::SleepHours, SignalKey::TypingStdMs]);
        assert_eq!(store.score_records("alice", day(1), day(31)).unwrap().len(), 1);
    }

    #[test]
    fn test_latest_score_on_or_before() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_score(&score(2, 80.0)).unwrap();
        store.upsert_score(&score(9, 60.0)).unwrap();

        let latest = store.latest_score_on_or_before("alice", day(8)).unwrap();
        assert_eq!(latest.map(|s| s.date), Some(day(2)));
        assert!(store.latest_score_on_or_before("alice", day(1)).unwrap().is_none());
    }

    #[test]
    fn test_voice_sessions_round_trip_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap();
        for i in 0..4 {
            let mut features = BTreeMap::new();
            features.insert("loudness_sma3_amean".to_string(), i as f64);
            store
                .add_voice_session(&VoiceSession {
                    user_id: "alice".to_string(),
                    recorded_at: base + chrono::Duration::days(i),
                    duration_sec: 11.5,
                    features,
                    sentiment_compound: Some(0.2),
                })
                .unwrap();
        }

        let prior = store
            .voice_sessions_before("alice", base + chrono::Duration::days(3), 7)
            .unwrap();
        assert_eq!(prior.len(), 3);
        assert_eq!(prior[0].recorded_at, base + chrono::Duration::days(2));
        assert_eq!(prior[0].features["loudness_sma3_amean"], 2.0);
        assert_eq!(prior[2].recorded_at, base);
    }

    #[test]
    fn test_malformed_drivers_are_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_score(&score(4, 75.0)).unwrap();
        store
            .conn()
            .unwrap()
            .execute("UPDATE score_records SET drivers = 'not json'", [])
            .unwrap();

        let result = store.score_record("alice", day(4));
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    fn daily(d: u32) -> DailySignalRecord {
        let mut record = DailySignalRecord::new("alice", day(d));
        record.mood_value = Some(if d % 2 == 0 { 6.0 } else { 8.0 });
        record.sleep_hours = Some(if d % 2 == 0 { 7.0 } else { 8.0 });
        record.sleep_quality = Some(4.0);
        record
    }

    fn corrupt_strain_level(store: &SqliteStore, d: u32) {
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE signal_records SET voice_strain_level = 'severe' WHERE date = ?1",
                params![format_date(day(d))],
            )
            .unwrap();
    }

    #[test]
    fn test_range_reads_skip_malformed_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        for d in 1..=4 {
            store.put_signal_record(&daily(d)).unwrap();
            store.upsert_score(&score(d, 70.0 + d as f64)).unwrap();
        }
        corrupt_strain_level(&store, 2);
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE score_records SET status = 'Unknown' WHERE date = ?1",
                params![format_date(day(3))],
            )
            .unwrap();

        let records = store.signal_records("alice", day(1), day(4)).unwrap();
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(3), day(4)]);

        let scores = store.score_records("alice", day(1), day(4)).unwrap();
        let dates: Vec<NaiveDate> = scores.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(4)]);

        // Single-date reads stay strict
        assert!(matches!(
            store.signal_record("alice", day(2)),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_malformed_day_fails_only_its_own_date() {
        let temp = tempdir().unwrap();
        let store = SqliteStore::open(temp.path().join("sentra.sqlite")).unwrap();
        let engine = DriftEngine::new(store);
        for d in 1..=6 {
            engine.store().put_signal_record(&daily(d)).unwrap();
        }
        corrupt_strain_level(engine.store(), 2);

        assert!(engine.compute_risk_for_date("alice", day(5)).unwrap().is_some());
        assert!(matches!(
            engine.compute_risk_for_date("alice", day(2)),
            Err(DriftError::Store(StoreError::Malformed(_)))
        ));

        let trends = engine.get_trends_ending("alice", day(6), 6).unwrap();
        let dates: Vec<NaiveDate> = trends.data.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day(1), day(3), day(4), day(5), day(6)]);
    }

    #[test]
    fn test_open_on_disk_creates_parent_dirs() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("sentra.sqlite");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put_signal_record(&full_record()).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.signal_record("alice", day(3)).unwrap().is_some());
    }
}
