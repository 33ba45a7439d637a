//! Job and job-result contracts consumed by the orchestrator: a job is an
//! immutable, tagged record with one of three variants. Decoding applies
//! defaults where the wire format omits a field (`ssl_mode` defaults to
//! `prefer`, `older_than_minutes` defaults to 5).

use serde::{Deserialize, Serialize};

use crate::model::{ConnectionTarget, Requester, Role, SessionStatus};

/// Default grace period, in minutes, for a `cleanup` job that omits
/// `olderThanMinutes`.
pub const DEFAULT_CLEANUP_GRACE_MINUTES: u32 = 5;

/// Inbound job payload, tagged by `type`:
/// `{ "id", "correlationId", "type", ...variant fields }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Request a new ephemeral session.
    CreateSession {
        /// Idempotency handle, 1-128 characters.
        id: String,
        /// Correlation id threaded through logs and audit events.
        #[serde(rename = "correlationId")]
        correlation_id: String,
        /// Database to provision the principal against.
        target: ConnectionTarget,
        /// Requested permission tier.
        role: Role,
        /// Requested time-to-live, in minutes (1..=1440 by default config).
        #[serde(rename = "ttlMinutes")]
        ttl_minutes: u32,
        /// Caller identity, carried through for audit purposes.
        requester: Requester,
        /// Optional free-text justification, <=256 characters.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Request early reclamation of a live session.
    RevokeSession {
        /// Idempotency handle, 1-128 characters.
        id: String,
        /// Correlation id threaded through logs and audit events.
        #[serde(rename = "correlationId")]
        correlation_id: String,
        /// Session id to revoke.
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    /// Request a batch reclamation sweep of expired principals.
    Cleanup {
        /// Idempotency handle, 1-128 characters.
        id: String,
        /// Correlation id threaded through logs and audit events.
        #[serde(rename = "correlationId")]
        correlation_id: String,
        /// Grace period, in minutes, beyond expiry before a principal is
        /// dropped. Defaults to [`DEFAULT_CLEANUP_GRACE_MINUTES`].
        #[serde(rename = "olderThanMinutes", default = "default_older_than_minutes")]
        older_than_minutes: u32,
    },
}

const fn default_older_than_minutes() -> u32 {
    DEFAULT_CLEANUP_GRACE_MINUTES
}

impl Job {
    /// Returns the job id common to every variant.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::CreateSession { id, .. } | Self::RevokeSession { id, .. } | Self::Cleanup { id, .. } => id,
        }
    }

    /// Returns the correlation id common to every variant.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::CreateSession { correlation_id, .. }
            | Self::RevokeSession { correlation_id, .. }
            | Self::Cleanup { correlation_id, .. } => correlation_id,
        }
    }
}

/// Structured failure detail attached to a failed job result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorDetail {
    /// Stable machine-readable failure code.
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
    /// Whether a caller should retry the job.
    pub retryable: bool,
}

/// Outbound job result, paralleling [`Job`]'s variants.
///
/// Result shapes for create/revoke/cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobResult {
    /// Result of a `create_session` job.
    CreateSession {
        /// Session id, present even on failure for correlation.
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Terminal or pending status.
        status: SessionStatus,
        /// Fresh connection string. Present only when `status == ready`.
        #[serde(skip_serializing_if = "Option::is_none")]
        dsn: Option<String>,
        /// UTC expiry instant. Present only when `status == ready`.
        #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
        /// Provisioned username. Present only when `status == ready`.
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        /// Failure detail. Present only when `status == failed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<JobErrorDetail>,
    },
    /// Result of a `revoke_session` job.
    RevokeSession {
        /// Terminal status.
        status: SessionStatus,
        /// Failure detail. Present only when `status == failed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<JobErrorDetail>,
    },
    /// Result of a `cleanup` job.
    Cleanup {
        /// Terminal status.
        status: SessionStatus,
        /// Number of principals actually dropped.
        #[serde(rename = "cleanedCount")]
        cleaned_count: u64,
        /// Failure detail. Present only when `status == failed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<JobErrorDetail>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_decodes_with_ssl_mode_default() {
        let payload = serde_json::json!({
            "id": "j1",
            "correlationId": "c07a0c9b-7f6d-4b8f-8b0c-1d8b9eb9f4f8",
            "type": "create_session",
            "target": {"host": "db", "port": 5432, "database": "app"},
            "role": "read",
            "ttlMinutes": 15,
            "requester": {"userId": "u1"}
        });
        let job: Job = serde_json::from_value(payload).expect("job should decode");
        match job {
            Job::CreateSession { target, .. } => {
                assert_eq!(target.ssl_mode, crate::model::SslMode::Prefer);
            }
            _ => panic!("expected CreateSession variant"),
        }
    }

    #[test]
    fn cleanup_decodes_with_default_grace_period() {
        let payload = serde_json::json!({
            "id": "j2",
            "correlationId": "c07a0c9b-7f6d-4b8f-8b0c-1d8b9eb9f4f8",
            "type": "cleanup"
        });
        let job: Job = serde_json::from_value(payload).expect("job should decode");
        match job {
            Job::Cleanup { older_than_minutes, .. } => {
                assert_eq!(older_than_minutes, DEFAULT_CLEANUP_GRACE_MINUTES);
            }
            _ => panic!("expected Cleanup variant"),
        }
    }

    #[test]
    fn revoke_session_round_trips() {
        let job = Job::RevokeSession {
            id: "j3".to_owned(),
            correlation_id: "c07a0c9b-7f6d-4b8f-8b0c-1d8b9eb9f4f8".to_owned(),
            session_id: "ses_unknown".to_owned(),
        };
        let encoded = serde_json::to_value(&job).expect("job should encode");
        let decoded: Job = serde_json::from_value(encoded).expect("job should decode");
        assert_eq!(decoded.id(), "j3");
    }
}
