use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::DomainError;
use crate::config::LeaderboardConfig;
use crate::models::{AddScore, ScoreEntry, SyntheticIdentity};
use crate::store::{KeyPresence, RankingStore};

/// Longest accepted client identifier, in bytes.
pub const MAX_IDENTITY_LEN: usize = 256;

/// Submission policy and ordered reads over a single ranking key.
///
/// The service keeps no ranking state of its own; the store is the single
/// source of truth. It is shared across request handlers and the reset
/// scheduler without locking.
pub struct LeaderboardService {
    store: Arc<dyn RankingStore>,
    config: LeaderboardConfig,
    nonce: AtomicU64,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn RankingStore>, config: LeaderboardConfig) -> Self {
        Self {
            store,
            config,
            nonce: AtomicU64::new(u64::from(rand::random::<u32>())),
        }
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    /// Submit a score where each identity holds at most one entry.
    ///
    /// A repeated identity overwrites its previous score. Identities that
    /// would decode as an encoded member are rejected, since reads could not
    /// tell them apart from duplicate-tolerant submissions.
    #[tracing::instrument(skip(self, command), fields(client_id = %command.client_id, score = command.score))]
    pub async fn add(&self, command: &AddScore) -> Result<(), DomainError> {
        validate(command)?;

        if SyntheticIdentity::decode(&command.client_id).is_ok() {
            return Err(DomainError::Validation(
                "clientId must not be an encoded identity".to_string(),
            ));
        }

        let entry = ScoreEntry::new(command.client_id.as_str(), command.score);
        self.submit(&entry).await
    }

    /// Submit a score that never replaces an earlier one from the same
    /// identity. The member is a synthetic encoding of the identity salted
    /// with the submission time and a nonce.
    #[tracing::instrument(skip(self, command), fields(client_id = %command.client_id, score = command.score))]
    pub async fn add_ignore_duplicate(&self, command: &AddScore) -> Result<(), DomainError> {
        validate(command)?;

        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let member = SyntheticIdentity::new(command.client_id.as_str(), Utc::now().timestamp(), nonce)
            .encode()
            .map_err(|e| DomainError::Validation(e.to_string()))?;

        let entry = ScoreEntry::new(member, command.score);
        self.submit(&entry).await
    }

    /// Top entries by descending score, with synthetic members decoded back
    /// to the real client identity.
    ///
    /// Members stored before the encoding carried a version decode as
    /// version 1, so a plain identity written by an older release in that
    /// shape is read back as its inner `clientId`.
    #[tracing::instrument(skip(self))]
    pub async fn get_leaderboard(&self) -> Result<Vec<ScoreEntry>, DomainError> {
        if self.config.size == 0 {
            return Ok(Vec::new());
        }

        let stop = self.config.size.saturating_sub(1) as i64;
        let mut scores = self.store.list(&self.config.key, 0, stop).await?;

        for entry in scores.iter_mut() {
            match SyntheticIdentity::decode(&entry.identity) {
                Ok(decoded) => {
                    entry.identity = decoded.client_id;
                    entry.submitted_at = Some(decoded.created_at);
                }
                Err(e) => {
                    debug!(member = %entry.identity, reason = %e, "Keeping member as plain identity");
                }
            }
        }

        Ok(scores)
    }

    /// Wipe the ranking (and everything else in the store's namespace).
    /// Irreversible.
    #[tracing::instrument(skip(self))]
    pub async fn reset_leaderboard(&self) -> Result<u64, DomainError> {
        let removed = self.store.delete_all().await?;
        info!(removed, "Leaderboard reset");
        Ok(removed)
    }

    pub async fn health(&self) -> Result<(), DomainError> {
        Ok(self.store.ping().await?)
    }

    /// Insert `entry`, arming the key TTL when this insert starts a new key
    /// lifetime.
    ///
    /// The presence check and the insert are separate round trips; two
    /// concurrent first writers may both arm the TTL.
    async fn submit(&self, entry: &ScoreEntry) -> Result<(), DomainError> {
        let key = self.config.key.as_str();

        let arm_expiry = match self.store.exists(key).await {
            KeyPresence::Present(_) => false,
            KeyPresence::Absent => true,
            KeyPresence::CheckFailed(reason) => {
                warn!(%reason, "Presence check failed, arming expiry as if the key were new");
                true
            }
        };

        self.store.create(key, entry).await?;

        if arm_expiry {
            // The entry is already stored; a missing TTL only delays cleanup
            // until the next scheduled reset.
            if let Err(e) = self.store.set_expire(key, self.config.ttl).await {
                warn!(error = %e, "Failed to arm leaderboard expiry");
            }
        }

        Ok(())
    }
}

fn validate(command: &AddScore) -> Result<(), DomainError> {
    if command.client_id.trim().is_empty() {
        return Err(DomainError::Validation("clientId is required".to_string()));
    }

    if command.client_id.len() > MAX_IDENTITY_LEN {
        return Err(DomainError::Validation(format!(
            "clientId exceeds {} bytes",
            MAX_IDENTITY_LEN
        )));
    }

    if !command.score.is_finite() {
        return Err(DomainError::Validation(format!(
            "score must be a finite number, got {}",
            command.score
        )));
    }

    Ok(())
}
