//! Storage seam
//!
//! The engine reads and writes through two traits so it can run against the
//! bundled SQLite store, the in-memory store used in tests, or a caller's own
//! datasource. Both stores key records by (user, date) and upsert in place.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::types::{DailySignalRecord, ScoreRecord, TypingSession};
use crate::voice::types::VoiceSession;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed stored data: {0}")]
    Malformed(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Daily signals and the raw sessions they are aggregated from
pub trait SignalStore {
    /// Records for a user with `from <= date <= to`, ascending by date
    fn signal_records(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySignalRecord>, StoreError>;

    fn signal_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySignalRecord>, StoreError>;

    /// Insert or replace the record for its (user, date)
    fn put_signal_record(&self, record: &DailySignalRecord) -> Result<(), StoreError>;

    fn typing_sessions(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TypingSession>, StoreError>;

    fn add_typing_session(&self, session: &TypingSession) -> Result<(), StoreError>;

    /// Up to `limit` sessions recorded strictly before `before`, newest first
    fn voice_sessions_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<VoiceSession>, StoreError>;

    fn add_voice_session(&self, session: &VoiceSession) -> Result<(), StoreError>;
}

/// Persisted daily scores
pub trait ScoreStore {
    /// Scores for a user with `from <= date <= to`, ascending by date
    fn score_records(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScoreRecord>, StoreError>;

    fn score_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, StoreError>;

    fn latest_score_on_or_before(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, StoreError>;

    /// Insert the score or update the existing one for its (user, date).
    ///
    /// Returns the stored record; an existing record keeps its id.
    fn upsert_score(&self, record: &ScoreRecord) -> Result<ScoreRecord, StoreError>;
}
