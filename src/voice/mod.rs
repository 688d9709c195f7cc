//! Voice strain sub-engine
//!
//! Scores acoustic drift of voice check-ins against a rolling baseline of the
//! user's own prior sessions. Feature extraction happens upstream: sessions
//! arrive as named numeric functionals.
//!
//! Pipeline: prior sessions → VoiceBaseline → z-scores → drift → strain score

pub mod baseline;
pub mod drift;
pub mod types;

pub use baseline::VoiceBaseline;
pub use drift::{strain_from_drift, voice_confidence, VoiceDriftEngine};
pub use types::{
    SentimentLabel, StrainLevel, VoiceAssessment, VoiceConfidence, VoiceDrift, VoiceDriver,
    VoiceSession, VOICE_KEYS,
};
