//! In-memory store keyed by (user, date)

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::store::{ScoreStore, SignalStore, StoreError};
use crate::types::{DailySignalRecord, ScoreRecord, TypingSession};
use crate::voice::types::VoiceSession;

type DayKey = (String, NaiveDate);

#[derive(Debug, Default)]
struct Tables {
    signals: BTreeMap<DayKey, DailySignalRecord>,
    scores: BTreeMap<DayKey, ScoreRecord>,
    typing: BTreeMap<DayKey, Vec<TypingSession>>,
    voice: BTreeMap<String, Vec<VoiceSession>>,
}

/// Thread-safe store holding everything in ordered maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored score records across all users
    pub fn score_count(&self) -> Result<usize, StoreError> {
        Ok(self.tables()?.scores.len())
    }
}

fn range_key(user_id: &str, from: NaiveDate, to: NaiveDate) -> (DayKey, DayKey) {
    ((user_id.to_string(), from), (user_id.to_string(), to))
}

impl SignalStore for MemoryStore {
    fn signal_records(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySignalRecord>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let (start, end) = range_key(user_id, from, to);
        Ok(self
            .tables()?
            .signals
            .range(start..=end)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn signal_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySignalRecord>, StoreError> {
        Ok(self
            .tables()?
            .signals
            .get(&(user_id.to_string(), date))
            .cloned())
    }

    fn put_signal_record(&self, record: &DailySignalRecord) -> Result<(), StoreError> {
        self.tables()?
            .signals
            .insert((record.user_id.clone(), record.date), record.clone());
        Ok(())
    }

    fn typing_sessions(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TypingSession>, StoreError> {
        Ok(self
            .tables()?
            .typing
            .get(&(user_id.to_string(), date))
            .cloned()
            .unwrap_or_default())
    }

    fn add_typing_session(&self, session: &TypingSession) -> Result<(), StoreError> {
        self.tables()?
            .typing
            .entry((session.user_id.clone(), session.date))
            .or_default()
            .push(session.clone());
        Ok(())
    }

    fn voice_sessions_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<VoiceSession>, StoreError> {
        let tables = self.tables()?;
        let Some(sessions) = tables.voice.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut prior: Vec<VoiceSession> = sessions
            .iter()
            .filter(|session| session.recorded_at < before)
            .cloned()
            .collect();
        prior.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        prior.truncate(limit);
        Ok(prior)
    }

    fn add_voice_session(&self, session: &VoiceSession) -> Result<(), StoreError> {
        self.tables()?
            .voice
            .entry(session.user_id.clone())
            .or_default()
            .push(session.clone());
        Ok(())
    }
}

impl ScoreStore for MemoryStore {
    fn score_records(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ScoreRecord>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let (start, end) = range_key(user_id, from, to);
        Ok(self
            .tables()?
            .scores
            .range(start..=end)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn score_record(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, StoreError> {
        Ok(self
            .tables()?
            .scores
            .get(&(user_id.to_string(), date))
            .cloned())
    }

    fn latest_score_on_or_before(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, StoreError> {
        let tables = self.tables()?;
        let start = (user_id.to_string(), NaiveDate::MIN);
        let end = (user_id.to_string(), date);
        Ok(tables
            .scores
            .range(start..=end)
            .next_back()
            .map(|(_, record)| record.clone()))
    }

    fn upsert_score(&self, record: &ScoreRecord) -> Result<ScoreRecord, StoreError> {
        let mut tables = self.tables()?;
        let key = (record.user_id.clone(), record.date);
        let mut stored = record.clone();
        if let Some(existing) = tables.scores.get(&key) {
            stored.id = existing.id;
        }
        tables.scores.insert(key, stored.clone());
        Ok(stored)
    }
}
