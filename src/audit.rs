//! Append-only, tamper-evident audit log.
//!
//! Each event hash-chains to the previous event's hash so the log is
//! tamper-evident: forging or deleting a row breaks every hash after it.
//! Maintaining the chain requires a consistent read of the current tail
//! before inserting a new row; [`PostgresAuditLog`] does this by reading the
//! tail and inserting inside one transaction, serialising writes rather than
//! chasing a lock-free append.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::{ProviderError, ProviderErrorCode};

/// Event types emitted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Bootstrap installation completed.
    SetupCompleted,
    /// A create-session job succeeded.
    SessionCreated,
    /// A revoke-session job succeeded.
    SessionRevoked,
    /// A cleanup job completed.
    SessionsCleaned,
}

impl AuditEventType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::SetupCompleted => "setup.completed",
            Self::SessionCreated => "session.created",
            Self::SessionRevoked => "session.revoked",
            Self::SessionsCleaned => "sessions.cleaned",
        }
    }
}

/// Append-only record written after the effect it describes has already
/// committed (or, on revoke, after the drop succeeds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Kind of event.
    pub event_type: AuditEventType,
    /// Session id, when the event concerns a specific session.
    pub session_id: Option<String>,
    /// Username, when the event concerns a specific principal.
    pub username: Option<String>,
    /// Correlation id threading this event back to its originating job.
    pub correlation_id: String,
    /// Structured, engine-agnostic event payload. Never contains a DSN or
    /// password.
    pub event_data: serde_json::Value,
}

impl AuditEvent {
    /// Computes the content hash over `{event_type, event_data}`.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.event_type.as_str().as_bytes());
        hasher.update(self.event_data.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Collaborator that appends audit events to the target database and can
/// resolve a session id back to the username it was issued for.
///
/// The revoke flow depends on this lookup because the orchestrator's core
/// does not persist a durable session-to-username mapping of its own; see
/// [`crate::orchestrator::Orchestrator::record_session`] for the in-memory
/// fast path consulted before this trait.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends `event` to the log, chaining it to the current tail's hash.
    async fn append(&self, event: AuditEvent) -> Result<(), ProviderError>;

    /// Finds the username most recently associated with `session_id` via a
    /// `session.created` event, if any.
    async fn find_username_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<String>, ProviderError>;
}

/// PostgreSQL-backed [`AuditLog`] writing to the bootstrap-installed audit
/// table.
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    /// Wraps an existing admin pool for audit reads and writes.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, event: AuditEvent) -> Result<(), ProviderError> {
        let event_hash = event.content_hash();
        let mut tx = self.pool.begin().await.map_err(|err| {
            ProviderError::new(
                ProviderErrorCode::ProviderInitError,
                format!("failed to start audit transaction: {err}"),
                true,
                "postgres",
            )
        })?;

        let prev_hash: Option<String> =
            sqlx::query_scalar("SELECT event_hash FROM gk_audit_log ORDER BY id DESC LIMIT 1")
                .fetch_optional(&mut *tx)
                .await
                .map_err(|err| {
                    ProviderError::new(
                        ProviderErrorCode::ProviderInitError,
                        format!("failed to read audit tail: {err}"),
                        true,
                        "postgres",
                    )
                })?;

        sqlx::query(
            "INSERT INTO gk_audit_log \
             (event_type, session_id, username, correlation_id, event_data, prev_hash, event_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(event.event_type.as_str())
        .bind(&event.session_id)
        .bind(&event.username)
        .bind(&event.correlation_id)
        .bind(&event.event_data)
        .bind(&prev_hash)
        .bind(&event_hash)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            ProviderError::new(
                ProviderErrorCode::ProviderInitError,
                format!("failed to append audit event: {err}"),
                true,
                "postgres",
            )
        })?;

        tx.commit().await.map_err(|err| {
            ProviderError::new(
                ProviderErrorCode::ProviderInitError,
                format!("failed to commit audit event: {err}"),
                true,
                "postgres",
            )
        })
    }

    async fn find_username_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<String>, ProviderError> {
        sqlx::query_scalar(
            "SELECT username FROM gk_audit_log \
             WHERE event_type = 'session.created' AND session_id = $1 \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| {
            ProviderError::new(
                ProviderErrorCode::ProviderInitError,
                format!("failed to query audit trail: {err}"),
                true,
                "postgres",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_for_identical_events() {
        let event = AuditEvent {
            event_type: AuditEventType::SessionCreated,
            session_id: Some("ses_abc123".to_owned()),
            username: Some("gk_abc123".to_owned()),
            correlation_id: "c07a0c9b-7f6d-4b8f-8b0c-1d8b9eb9f4f8".to_owned(),
            event_data: serde_json::json!({"role": "read"}),
        };
        let other = event.clone();
        assert_eq!(event.content_hash(), other.content_hash());
    }

    #[test]
    fn content_hash_differs_for_different_payloads() {
        let base = AuditEvent {
            event_type: AuditEventType::SessionCreated,
            session_id: None,
            username: None,
            correlation_id: "c07a0c9b-7f6d-4b8f-8b0c-1d8b9eb9f4f8".to_owned(),
            event_data: serde_json::json!({"role": "read"}),
        };
        let mut changed = base.clone();
        changed.event_data = serde_json::json!({"role": "write"});
        assert_ne!(base.content_hash(), changed.content_hash());
    }

    #[test]
    fn event_type_serializes_to_dotted_names() {
        assert_eq!(AuditEventType::SetupCompleted.as_str(), "setup.completed");
        assert_eq!(AuditEventType::SessionsCleaned.as_str(), "sessions.cleaned");
    }
}
