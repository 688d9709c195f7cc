//! Sentra Drift - personal baseline-drift wellbeing scoring
//!
//! Sentra turns daily self-reported and passively measured behavioral signals
//! into a personalized wellbeing score: each signal is compared against the
//! user's own early baseline, directional deviations are weighted into one
//! risk, and the result is graded with a status, confidence, momentum and a
//! short projection.
//!
//! ## Modules
//!
//! - **Engine**: `compute_risk_for_date`, today's score and trends over a store
//! - **Estimators**: baseline, deviation, risk, first-day, momentum, confidence, drivers
//! - **Voice**: the same drift method applied to acoustic voice features
//! - **Store**: `SignalStore` / `ScoreStore` traits with SQLite and in-memory backends

pub mod baseline;
pub mod confidence;
pub mod config;
pub mod deviation;
pub mod drivers;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod first_day;
pub mod ingest;
pub mod momentum;
pub mod org;
pub mod risk;
pub mod stats;
pub mod store;
pub mod types;
pub mod voice;

pub use config::{EngineConfig, WeightScheme, WeightTable};
pub use encoder::{Envelope, ScoreEncoder, SCHEMA_VERSION};
pub use engine::{DriftEngine, ImportSummary};
pub use error::{ConfigError, DriftError};
pub use ingest::CheckIn;
pub use org::OrgSummary;
pub use store::{MemoryStore, ScoreStore, SignalStore, SqliteStore, StoreError};
pub use types::{
    Confidence, DailySignalRecord, Momentum, MomentumLabel, MomentumStrength, ScoreRecord,
    SignalKey, Status, TodayScore, Trends, TypingSession,
};
pub use voice::{VoiceAssessment, VoiceSession};

/// Engine version embedded in every output envelope
pub const DRIFT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for output envelopes
pub const PRODUCER_NAME: &str = "sentra-drift";
