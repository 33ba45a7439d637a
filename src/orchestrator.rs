//! Dispatches validated jobs to a [`DatabaseProvider`], emits audit events,
//! and tracks the in-memory session-to-username hook that lets a revoke job
//! resolve a username without a durable mapping of its own.

use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::SecretString;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditEventType, AuditLog};
use crate::error::{OrchestratorError, ValidationError};
use crate::job::{Job, JobErrorDetail, JobResult};
use crate::model::{
    ConnectionTarget, HealthState, NewPrincipal, OrchestratorHealthReport, Requester, Role,
    SessionStatus,
};
use crate::observability::LOG_TARGET;
use crate::provider::DatabaseProvider;
use crate::validation::{
    validate_correlation_id, validate_job_id, validate_reason, validate_session_id,
    validate_ttl_minutes,
};

/// Fixed connection cap assigned to every ephemeral principal, set by the
/// orchestrator at the call site rather than made configurable or exposed
/// as a job field.
const EPHEMERAL_CONNECTION_LIMIT: i32 = 2;

/// Password length, chosen so a uniformly random alphanumeric password
/// carries comfortably more than 48 bits of entropy
/// (`log2(62^24) ~= 143 bits`).
const GENERATED_PASSWORD_LENGTH: usize = 24;

/// Coordinates job validation, provider dispatch, and audit logging for one
/// target database's provider instance.
pub struct Orchestrator {
    provider: Arc<dyn DatabaseProvider>,
    audit: Arc<dyn AuditLog>,
    max_ttl_minutes: u32,
    sessions: DashMap<String, String>,
}

impl Orchestrator {
    /// Builds an orchestrator around an already-initialised `provider` and
    /// its `audit` log, enforcing `max_ttl_minutes` on every create job.
    #[must_use]
    pub fn new(provider: Arc<dyn DatabaseProvider>, audit: Arc<dyn AuditLog>, max_ttl_minutes: u32) -> Self {
        Self {
            provider,
            audit,
            max_ttl_minutes,
            sessions: DashMap::new(),
        }
    }

    /// Records a session id's username outside the normal create flow, e.g.
    /// when restoring state after a restart. Lets the orchestrator populate
    /// the in-memory mapping as sessions are created without depending on a
    /// durable store.
    pub fn record_session(&self, session_id: impl Into<String>, username: impl Into<String>) {
        self.sessions.insert(session_id.into(), username.into());
    }

    /// Validates and dispatches `job`, returning a [`JobResult`] even on
    /// failure (never propagating the error past the job boundary).
    pub async fn dispatch(&self, job: Job) -> JobResult {
        match job {
            Job::CreateSession {
                id,
                correlation_id,
                target,
                role,
                ttl_minutes,
                requester,
                reason,
            } => {
                self.dispatch_create_session(id, correlation_id, target, role, ttl_minutes, requester, reason)
                    .await
            }
            Job::RevokeSession {
                id,
                correlation_id,
                session_id,
            } => self.dispatch_revoke_session(id, correlation_id, session_id).await,
            Job::Cleanup {
                id,
                correlation_id,
                older_than_minutes,
            } => self.dispatch_cleanup(id, correlation_id, older_than_minutes).await,
        }
    }

    #[allow(clippy::too_many_arguments, reason = "mirrors the CreateSession job's own field count")]
    async fn dispatch_create_session(
        &self,
        id: String,
        correlation_id: String,
        target: ConnectionTarget,
        role: Role,
        ttl_minutes: u32,
        requester: Requester,
        reason: Option<String>,
    ) -> JobResult {
        let session_id = generate_session_id();

        if let Err(err) = self.validate_create_session(&id, &correlation_id, ttl_minutes, reason.as_deref()) {
            let orchestrator_err: OrchestratorError = err.into();
            return failed_create_session(session_id, orchestrator_error_detail(&orchestrator_err));
        }

        let username = generate_username();
        let request = NewPrincipal {
            name: username.clone(),
            password: generate_password(),
            role_pack: role.pack_name().to_owned(),
            ttl_minutes,
            connection_limit: EPHEMERAL_CONNECTION_LIMIT,
        };

        let provisioned = match self.provider.create_ephemeral_user(request).await {
            Ok(provisioned) => provisioned,
            Err(err) => {
                warn!(target: LOG_TARGET, correlation_id = %correlation_id, error = %err, "create_session provider call failed");
                return failed_create_session(session_id, provider_error_detail(&err));
            }
        };

        self.sessions.insert(session_id.clone(), username.clone());

        let event_data = serde_json::json!({
            "target": { "host": target.host, "port": target.port, "database": target.database },
            "role": role,
            "ttlMinutes": ttl_minutes,
            "requesterId": requester.user_id,
            "reason": reason,
        });
        if let Err(err) = self
            .audit
            .append(AuditEvent {
                event_type: AuditEventType::SessionCreated,
                session_id: Some(session_id.clone()),
                username: Some(username.clone()),
                correlation_id: correlation_id.clone(),
                event_data,
            })
            .await
        {
            warn!(target: LOG_TARGET, correlation_id = %correlation_id, error = %err, "failed to append session.created audit event");
        }

        info!(target: LOG_TARGET, correlation_id = %correlation_id, session_id = %session_id, "session created");

        JobResult::CreateSession {
            session_id,
            status: SessionStatus::Ready,
            dsn: Some(provisioned.dsn),
            expires_at: Some(provisioned.expires_at),
            username: Some(username),
            error: None,
        }
    }

    fn validate_create_session(
        &self,
        id: &str,
        correlation_id: &str,
        ttl_minutes: u32,
        reason: Option<&str>,
    ) -> Result<(), ValidationError> {
        validate_job_id(id)?;
        validate_correlation_id(correlation_id)?;
        validate_ttl_minutes(ttl_minutes, self.max_ttl_minutes)?;
        validate_reason(reason)?;
        Ok(())
    }

    async fn dispatch_revoke_session(&self, id: String, correlation_id: String, session_id: String) -> JobResult {
        if let Err(err) = validate_job_id(&id)
            .and_then(|()| validate_correlation_id(&correlation_id))
            .and_then(|()| validate_session_id(&session_id))
        {
            return JobResult::RevokeSession {
                status: SessionStatus::Failed,
                error: Some(orchestrator_error_detail(&err.into())),
            };
        }

        let username = match self.resolve_session_username(&session_id).await {
            Some(username) => username,
            None => {
                return JobResult::RevokeSession {
                    status: SessionStatus::NotFound,
                    error: None,
                };
            }
        };

        match self.provider.drop_user(&username).await {
            Ok(true) => {
                self.sessions.remove(&session_id);
                let event_data = serde_json::json!({});
                if let Err(err) = self
                    .audit
                    .append(AuditEvent {
                        event_type: AuditEventType::SessionRevoked,
                        session_id: Some(session_id.clone()),
                        username: Some(username),
                        correlation_id,
                        event_data,
                    })
                    .await
                {
                    warn!(target: LOG_TARGET, error = %err, "failed to append session.revoked audit event");
                }
                JobResult::RevokeSession {
                    status: SessionStatus::Revoked,
                    error: None,
                }
            }
            Ok(false) => JobResult::RevokeSession {
                status: SessionStatus::NotFound,
                error: None,
            },
            Err(err) => {
                let revocation_err = OrchestratorError::new(
                    crate::error::OrchestratorErrorCode::RevocationError,
                    err.message,
                    true,
                );
                JobResult::RevokeSession {
                    status: SessionStatus::Failed,
                    error: Some(orchestrator_error_detail(&revocation_err)),
                }
            }
        }
    }

    async fn resolve_session_username(&self, session_id: &str) -> Option<String> {
        if let Some(entry) = self.sessions.get(session_id) {
            return Some(entry.value().clone());
        }
        self.audit.find_username_for_session(session_id).await.ok().flatten()
    }

    async fn dispatch_cleanup(&self, id: String, correlation_id: String, older_than_minutes: u32) -> JobResult {
        if let Err(err) = validate_job_id(&id).and_then(|()| validate_correlation_id(&correlation_id)) {
            let orchestrator_err: OrchestratorError = err.into();
            return JobResult::Cleanup {
                status: SessionStatus::Failed,
                cleaned_count: 0,
                error: Some(orchestrator_error_detail(&orchestrator_err)),
            };
        }

        let outcomes = match self.provider.cleanup_expired_users(older_than_minutes).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                return JobResult::Cleanup {
                    status: SessionStatus::Failed,
                    cleaned_count: 0,
                    error: Some(provider_error_detail(&err)),
                };
            }
        };

        let cleaned: Vec<&str> = outcomes
            .iter()
            .filter(|outcome| outcome.dropped)
            .map(|outcome| outcome.name.as_str())
            .collect();
        let cleaned_count = u64::try_from(cleaned.len()).unwrap_or(u64::MAX);

        for username in &cleaned {
            self.sessions.retain(|_, mapped| mapped.as_str() != *username);
        }

        let event_data = serde_json::json!({ "cleaned": cleaned, "olderThanMinutes": older_than_minutes });
        if let Err(err) = self
            .audit
            .append(AuditEvent {
                event_type: AuditEventType::SessionsCleaned,
                session_id: None,
                username: None,
                correlation_id,
                event_data,
            })
            .await
        {
            warn!(target: LOG_TARGET, error = %err, "failed to append sessions.cleaned audit event");
        }

        JobResult::Cleanup {
            status: SessionStatus::Completed,
            cleaned_count,
            error: None,
        }
    }

    /// Reports aggregate health by proxying to the provider's health check,
    /// mapping its tri-state and enriching the detail bag with the
    /// provider's engine tag and version.
    pub async fn health(&self) -> OrchestratorHealthReport {
        let checked_at = chrono::Utc::now();
        let (state, message, mut details) = match self.provider.health_check().await {
            Ok(report) => (report.state.into(), report.message, report.details),
            Err(err) => (HealthState::Unhealthy.into(), err.message, serde_json::json!({})),
        };
        if let Some(map) = details.as_object_mut() {
            map.insert("engine".to_owned(), serde_json::json!(self.provider.engine()));
            map.insert("providerVersion".to_owned(), serde_json::json!(self.provider.provider_version()));
        }
        OrchestratorHealthReport {
            state,
            message,
            checked_at,
            details,
        }
    }

    /// Releases the provider's resources. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.provider.close().await;
    }
}

fn orchestrator_error_detail(err: &OrchestratorError) -> JobErrorDetail {
    JobErrorDetail {
        code: err.code.as_str().to_owned(),
        message: err.message.clone(),
        retryable: err.retryable,
    }
}

/// Builds a [`JobErrorDetail`] straight from a provider failure, preserving
/// its own code (e.g. `USER_EXISTS`) rather than collapsing it to a generic
/// internal error: validation failures and known semantic conflicts never
/// propagate as `INTERNAL_ERROR`.
fn provider_error_detail(err: &crate::error::ProviderError) -> JobErrorDetail {
    JobErrorDetail {
        code: err.code.as_str().to_owned(),
        message: err.message.clone(),
        retryable: err.retryable,
    }
}

fn failed_create_session(session_id: String, error: JobErrorDetail) -> JobResult {
    JobResult::CreateSession {
        session_id,
        status: SessionStatus::Failed,
        dsn: None,
        expires_at: None,
        username: None,
        error: Some(error),
    }
}

/// Generates a fresh `gk_<random-hex-12>` login name.
fn generate_username() -> String {
    let suffix: String = (0..12)
        .map(|_| {
            let nibble: u8 = rand::thread_rng().gen_range(0..16);
            char::from_digit(u32::from(nibble), 16).unwrap_or('0')
        })
        .collect();
    format!("gk_{suffix}")
}

/// Generates a fresh `ses_<random-hex-12>` session id.
fn generate_session_id() -> String {
    let suffix: String = (0..12)
        .map(|_| {
            let nibble: u8 = rand::thread_rng().gen_range(0..16);
            char::from_digit(u32::from(nibble), 16).unwrap_or('0')
        })
        .collect();
    format!("ses_{suffix}")
}

fn generate_password() -> SecretString {
    let raw: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect();
    SecretString::from(raw)
}
