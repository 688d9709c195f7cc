//! Output encoding
//!
//! Wraps engine results in a versioned JSON envelope carrying producer
//! metadata and the computation time, so downstream consumers can tell which
//! engine build produced a payload.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DriftError;
use crate::{DRIFT_VERSION, PRODUCER_NAME};

/// Current envelope schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Versioned envelope around any serializable body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub schema_version: String,
    pub producer: Producer,
    /// RFC 3339 timestamp of encoding
    pub computed_at_utc: String,
    pub body: T,
}

/// Encoder stamping payloads with a stable instance id
pub struct ScoreEncoder {
    instance_id: String,
}

impl Default for ScoreEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode<T: Serialize>(&self, body: T) -> Envelope<T> {
        Envelope {
            schema_version: SCHEMA_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: DRIFT_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            body,
        }
    }

    /// Encode to a JSON string, compact or pretty-printed
    pub fn encode_to_json<T: Serialize>(&self, body: T, pretty: bool) -> Result<String, DriftError> {
        let envelope = self.encode(body);
        let json = if pretty {
            serde_json::to_string_pretty(&envelope)?
        } else {
            serde_json::to_string(&envelope)?
        };
        Ok(json)
    }
}
