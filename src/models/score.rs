use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One ranked member of the leaderboard.
///
/// The member string and score are both the storage key and the payload of
/// the ordered set; there is no separate row identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(rename = "clientId")]
    pub identity: String,
    #[serde(rename = "score")]
    pub value: f64,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<i64>,
}

impl ScoreEntry {
    pub fn new(identity: impl Into<String>, value: f64) -> Self {
        Self {
            identity: identity.into(),
            value,
            submitted_at: None,
        }
    }
}

/// Score submission command, as received from the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddScore {
    #[serde(rename = "clientId", default)]
    pub client_id: String,
    pub score: f64,
}

impl AddScore {
    pub fn new(client_id: impl Into<String>, score: f64) -> Self {
        Self {
            client_id: client_id.into(),
            score,
        }
    }
}

/// Current version of the synthetic member encoding.
pub const SYNTHETIC_IDENTITY_VERSION: u8 = 1;

#[derive(Error, Debug)]
pub enum SyntheticIdentityError {
    #[error("Member is not an encoded identity: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported encoded identity version {0}")]
    UnsupportedVersion(u8),

    #[error("Encoded identity has an empty clientId")]
    EmptyClientId,
}

/// Composite member used for duplicate-tolerant submissions.
///
/// The ordered set is unique by member string, so the real identity is
/// salted with the submission time and a process-local nonce. Members written
/// before versioning existed (`{"clientId":..,"createdAt":..}`) decode as
/// version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticIdentity {
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

impl SyntheticIdentity {
    pub fn new(client_id: impl Into<String>, created_at: i64, nonce: u64) -> Self {
        Self {
            version: Some(SYNTHETIC_IDENTITY_VERSION),
            client_id: client_id.into(),
            created_at,
            nonce: Some(nonce),
        }
    }

    pub fn encode(&self) -> Result<String, SyntheticIdentityError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(member: &str) -> Result<Self, SyntheticIdentityError> {
        let decoded: SyntheticIdentity = serde_json::from_str(member)?;

        match decoded.version.unwrap_or(SYNTHETIC_IDENTITY_VERSION) {
            SYNTHETIC_IDENTITY_VERSION => {}
            other => return Err(SyntheticIdentityError::UnsupportedVersion(other)),
        }

        if decoded.client_id.is_empty() {
            return Err(SyntheticIdentityError::EmptyClientId);
        }

        Ok(decoded)
    }
}
