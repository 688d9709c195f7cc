//! Engine orchestration
//!
//! This module provides the public API of the drift engine. It ties the
//! stores to the estimators:
//!
//! 1. Baseline - personal (mean, std) from the earliest records of the lookback window
//! 2. Deviation + Risk - weighted directional z-scores into a 0-100 wellbeing score
//! 3. First-day fallback - absolute mappings when no baseline exists
//! 4. Momentum - coarse trend stored with the score, fine label computed on read
//! 5. Drivers - ranked contributions explained against the prior score
//!
//! Every read-compute-write cycle for a user runs under that user's lock, and
//! scores are upserted per (user, date), so recomputation is idempotent.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::baseline::{baseline_window, BaselineStats};
use crate::config::EngineConfig;
use crate::confidence;
use crate::drivers;
use crate::error::DriftError;
use crate::first_day::FirstDayEstimator;
use crate::ingest::{
    aggregate_typing, apply_sentiment, merge_by_day, parse_ndjson_records,
    validate_typing_session, validate_voice_session, CheckIn,
};
use crate::momentum::{acute_momentum, coarse_momentum, fine_momentum, project};
use crate::org::{summarize, OrgSummary};
use crate::risk::RiskAggregator;
use crate::store::{ScoreStore, SignalStore, StoreError};
use crate::types::{
    DailySignalRecord, ScoreRecord, TodayScore, TrendPoint, Trends, TypingSession,
};
use crate::voice::{VoiceAssessment, VoiceDriftEngine, VoiceSession};

/// Outcome of an NDJSON import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Distinct (user, date) records written
    pub records_imported: usize,
    /// Days that produced a score
    pub days_scored: usize,
}

/// Baseline-drift scoring engine over a signal and score store
pub struct DriftEngine<S> {
    store: S,
    config: EngineConfig,
    aggregator: RiskAggregator,
    voice: VoiceDriftEngine,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S> DriftEngine<S>
where
    S: SignalStore + ScoreStore,
{
    /// Create an engine with default settings
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            aggregator: RiskAggregator::from_config(&config),
            voice: VoiceDriftEngine::from_config(&config.voice),
            store,
            config,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` while holding the user's lock.
    ///
    /// The lock entry is dropped again once no other caller holds or waits
    /// on it, so the map only tracks users with work in flight.
    fn with_user_lock<T>(
        &self,
        user_id: &str,
        f: impl FnOnce() -> Result<T, DriftError>,
    ) -> Result<T, DriftError> {
        let lock = {
            let mut locks = self.user_locks.lock().map_err(|_| StoreError::Poisoned)?;
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        let result = {
            let _guard = lock.lock().map_err(|_| StoreError::Poisoned)?;
            f()
        };

        let mut locks = self.user_locks.lock().map_err(|_| StoreError::Poisoned)?;
        // One reference in the map plus ours
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
        result
    }

    /// Compute and persist the score for one day.
    ///
    /// Returns `None` when the user has no signal record for that day.
    pub fn compute_risk_for_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, DriftError> {
        self.with_user_lock(user_id, || self.compute_locked(user_id, date))
    }

    /// Baseline for a target date over the valid records of its lookback window
    fn baseline_for(&self, user_id: &str, date: NaiveDate) -> Result<BaselineStats, DriftError> {
        let (from, to) = baseline_window(date, &self.config);
        let mut history = self.store.signal_records(user_id, from, to)?;
        history.retain(|record| match record.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(user = %user_id, date = %record.date, error = %e, "excluding malformed record from baseline");
                false
            }
        });
        Ok(BaselineStats::estimate(
            &history,
            self.config.baseline_days,
            self.aggregator.weights(),
        ))
    }

    fn compute_locked(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScoreRecord>, DriftError> {
        let Some(day) = self.store.signal_record(user_id, date)? else {
            debug!(user = %user_id, date = %date, "no signal record, nothing to score");
            return Ok(None);
        };
        day.validate()?;

        let baseline = self.baseline_for(user_id, date)?;
        debug!(
            user = %user_id,
            date = %date,
            baseline_days = baseline.days_used(),
            baseline_signals = baseline.signal_count(),
            "baseline estimated"
        );

        let (wellbeing_score, status, drivers, confidence) = if baseline.is_empty() {
            let estimate = FirstDayEstimator::estimate(&day);
            info!(user = %user_id, date = %date, score = estimate.wellbeing_score, "no baseline yet, first-day fallback");
            (
                estimate.wellbeing_score,
                estimate.status,
                estimate.drivers,
                estimate.confidence,
            )
        } else {
            let assessment = self.aggregator.assess(&day, &baseline);
            let missing = day.missing_count(self.aggregator.weights().keys());
            (
                assessment.wellbeing_score,
                assessment.status,
                assessment.drivers,
                confidence::grade(baseline.days_used(), missing),
            )
        };

        let prior: Vec<f64> = self
            .store
            .score_records(
                user_id,
                date - Duration::days(self.config.trend_days),
                date - Duration::days(1),
            )?
            .iter()
            .map(|score| score.wellbeing_score)
            .chain(std::iter::once(wellbeing_score))
            .collect();
        let momentum = coarse_momentum(&prior);

        let stored = self.store.upsert_score(&ScoreRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            date,
            wellbeing_score,
            status,
            momentum,
            confidence,
            drivers,
        })?;
        debug!(
            user = %user_id,
            date = %date,
            score = stored.wellbeing_score,
            status = stored.status.as_str(),
            momentum = stored.momentum.as_str(),
            "score upserted"
        );
        Ok(Some(stored))
    }

    /// Today's score (UTC date) with momentum label and explained drivers
    pub fn get_today_score(&self, user_id: &str) -> Result<Option<TodayScore>, DriftError> {
        self.get_score_for_day(user_id, Utc::now().date_naive())
    }

    /// Score read model for one day, computing the score if none is stored.
    ///
    /// Returns `None` when the user has no signal record for that day.
    pub fn get_score_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Option<TodayScore>, DriftError> {
        self.with_user_lock(user_id, || {
            let Some(record) = self.store.signal_record(user_id, day)? else {
                return Ok(None);
            };
            let score = match self.store.score_record(user_id, day)? {
                Some(score) => score,
                None => match self.compute_locked(user_id, day)? {
                    Some(score) => score,
                    None => return Ok(None),
                },
            };

            let recent: Vec<f64> = self
                .store
                .score_records(user_id, day - Duration::days(self.config.trend_days), day)?
                .iter()
                .map(|s| s.wellbeing_score)
                .collect();
            let fine = acute_momentum(score.status, score.wellbeing_score, &recent);

            let driver_contributions = if score.drivers.is_empty() {
                Vec::new()
            } else {
                let baseline = self.baseline_for(user_id, day)?;
                if baseline.is_empty() {
                    Vec::new()
                } else {
                    let contributions = self.aggregator.contributions(&record, &baseline);
                    let previous = match recent.as_slice() {
                        [.., previous, _] => *previous,
                        _ => score.wellbeing_score,
                    };
                    drivers::explain(&contributions, score.wellbeing_score - previous)
                }
            };

            Ok(Some(TodayScore {
                date: score.date,
                wellbeing_score: score.wellbeing_score,
                status: score.status,
                momentum: score.momentum,
                momentum_label: fine.label,
                momentum_strength: fine.strength,
                confidence: score.confidence,
                drivers: score.drivers,
                driver_contributions,
                voice_strain_score: record.voice_strain_score,
                voice_strain_level: record.voice_strain_level,
                voice_confidence: record.voice_confidence,
                speech_sentiment_compound: record.speech_sentiment_compound,
                speech_sentiment_label: record.speech_sentiment_label,
            }))
        })
    }

    /// Trend over the last `days` days ending today (UTC)
    pub fn get_trends(&self, user_id: &str, days: u32) -> Result<Trends, DriftError> {
        self.get_trends_ending(user_id, Utc::now().date_naive(), days)
    }

    /// Trend over `days` days ending at `end`, backfilling missing scores.
    ///
    /// Missing days are computed in ascending order; a day that fails to
    /// compute is logged and left out.
    pub fn get_trends_ending(
        &self,
        user_id: &str,
        end: NaiveDate,
        days: u32,
    ) -> Result<Trends, DriftError> {
        if days == 0 {
            return Err(DriftError::InvalidRange(
                "trend range must cover at least one day".to_string(),
            ));
        }
        let start = end - Duration::days(i64::from(days) - 1);

        self.with_user_lock(user_id, || {
            let stored: Vec<NaiveDate> = self
                .store
                .score_records(user_id, start, end)?
                .iter()
                .map(|s| s.date)
                .collect();

            let mut backfilled = 0usize;
            for date in start.iter_days().take_while(|date| *date <= end) {
                if stored.contains(&date) {
                    continue;
                }
                match self.compute_locked(user_id, date) {
                    Ok(Some(_)) => backfilled += 1,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(user = %user_id, date = %date, error = %e, "skipping day that failed to compute");
                    }
                }
            }
            if backfilled > 0 {
                info!(user = %user_id, days = backfilled, "backfilled missing scores");
            }

            let history: BTreeMap<NaiveDate, f64> = self
                .store
                .score_records(user_id, start - Duration::days(self.config.trend_days), end)?
                .iter()
                .map(|s| (s.date, s.wellbeing_score))
                .collect();

            let mut data = Vec::new();
            for score in self.store.score_records(user_id, start, end)? {
                let window_start = score.date - Duration::days(self.config.trend_days);
                let recent: Vec<f64> = history
                    .range(window_start..=score.date)
                    .map(|(_, value)| *value)
                    .collect();
                let fine = fine_momentum(&recent);
                data.push(TrendPoint {
                    date: score.date,
                    wellbeing_score: score.wellbeing_score,
                    status: score.status,
                    momentum: score.momentum,
                    momentum_label: fine.label,
                    momentum_strength: fine.strength,
                    confidence: score.confidence,
                });
            }

            let actual: Vec<(NaiveDate, f64)> = data
                .iter()
                .map(|point| (point.date, point.wellbeing_score))
                .collect();
            let projection = project(&actual, self.config.projection_days);

            Ok(Trends { data, projection })
        })
    }

    /// Record a daily check-in and rescore the day
    pub fn submit_checkin(
        &self,
        user_id: &str,
        date: NaiveDate,
        checkin: &CheckIn,
    ) -> Result<Option<ScoreRecord>, DriftError> {
        checkin.validate()?;
        self.with_user_lock(user_id, || {
            let mut record = self.record_or_new(user_id, date)?;
            checkin.apply_to(&mut record);
            self.store.put_signal_record(&record)?;
            info!(user = %user_id, date = %date, "check-in recorded");
            self.compute_locked(user_id, date)
        })
    }

    /// Store a typing session, refresh the day's typing aggregates and rescore
    pub fn submit_typing_session(
        &self,
        session: &TypingSession,
    ) -> Result<Option<ScoreRecord>, DriftError> {
        validate_typing_session(session)?;
        let user_id = session.user_id.as_str();
        self.with_user_lock(user_id, || {
            self.store.add_typing_session(session)?;
            let sessions = self.store.typing_sessions(user_id, session.date)?;
            let mut record = self.record_or_new(user_id, session.date)?;
            aggregate_typing(&mut record, &sessions);
            self.store.put_signal_record(&record)?;
            debug!(user = %user_id, date = %session.date, sessions = sessions.len(), "typing aggregates refreshed");
            self.compute_locked(user_id, session.date)
        })
    }

    /// Assess and store a voice session.
    ///
    /// The day's strain fields are written only once a voice baseline exists;
    /// a sentiment compound is written whenever present.
    pub fn record_voice_session(
        &self,
        session: &VoiceSession,
    ) -> Result<VoiceAssessment, DriftError> {
        validate_voice_session(session)?;
        let user_id = session.user_id.as_str();
        self.with_user_lock(user_id, || {
            let prior = self.store.voice_sessions_before(
                user_id,
                session.recorded_at,
                self.voice.baseline_sessions(),
            )?;
            let assessment = self.voice.assess(session, &prior);
            self.store.add_voice_session(session)?;

            let date = session.recorded_at.date_naive();
            let mut record = self.record_or_new(user_id, date)?;
            let mut changed = false;
            if !assessment.is_building() {
                record.voice_strain_score = Some(f64::from(assessment.strain_score()));
                record.voice_strain_level = Some(assessment.strain_level());
                record.voice_confidence = Some(assessment.confidence());
                changed = true;
            }
            if let Some(compound) = session.sentiment_compound {
                apply_sentiment(&mut record, compound);
                changed = true;
            }

            if changed {
                self.store.put_signal_record(&record)?;
                self.compute_locked(user_id, date)?;
            }
            Ok(assessment)
        })
    }

    /// Import NDJSON daily records, merging into stored days, then rescore
    /// every imported day in ascending date order.
    pub fn import_records(&self, ndjson: &str) -> Result<ImportSummary, DriftError> {
        let records = merge_by_day(parse_ndjson_records(ndjson)?);

        let mut by_user: BTreeMap<String, Vec<DailySignalRecord>> = BTreeMap::new();
        for record in records {
            by_user.entry(record.user_id.clone()).or_default().push(record);
        }

        let mut summary = ImportSummary::default();
        for (user_id, days) in by_user {
            let scored = self.with_user_lock(&user_id, || {
                for update in &days {
                    let mut record = self.record_or_new(&user_id, update.date)?;
                    record.merge(update);
                    self.store.put_signal_record(&record)?;
                }
                let mut scored = 0;
                for update in &days {
                    if self.compute_locked(&user_id, update.date)?.is_some() {
                        scored += 1;
                    }
                }
                Ok(scored)
            })?;
            info!(user = %user_id, records = days.len(), scored, "imported signal records");
            summary.records_imported += days.len();
            summary.days_scored += scored;
        }
        Ok(summary)
    }

    /// Care Mode summary over each member's latest score on or before `as_of`
    pub fn org_summary(
        &self,
        user_ids: &[String],
        as_of: NaiveDate,
    ) -> Result<OrgSummary, DriftError> {
        let mut latest = Vec::new();
        for user_id in user_ids {
            if let Some(score) = self.store.latest_score_on_or_before(user_id, as_of)? {
                latest.push(score);
            }
        }
        Ok(summarize(user_ids.len(), &latest))
    }

    fn record_or_new(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<DailySignalRecord, DriftError> {
        Ok(self
            .store
            .signal_record(user_id, date)?
            .unwrap_or_else(|| DailySignalRecord::new(user_id, date)))
    }
}
