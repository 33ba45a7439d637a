//! Core data model shared by the provider interface, orchestrator, and job
//! contracts: ephemeral principals, role packs, connection targets, and the
//! enumerations the contracts in [`crate::job`] are built from.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// A database login with a hard expiry, provisioned for a single session:
/// unique name, a write-only password never re-read once set, a grant set
/// inherited from its role pack, an expiry instant, and a connection cap
/// (default 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemeralPrincipal {
    /// Unique login name. Matches `^gk_[A-Za-z0-9_]+$`, 4-63 characters.
    pub name: String,
    /// ISO-8601 UTC timestamp after which the database itself rejects
    /// connections from this principal.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Maximum simultaneous connections permitted for this login.
    pub connection_limit: i32,
    /// Role pack this principal was provisioned against.
    pub role_pack: String,
}

/// Freshly generated credential material for a principal that does not yet
/// exist in the target database.
///
/// The password is never read back once set; it only flows from the
/// orchestrator (which generates it) through the provider to the database.
#[derive(Clone)]
pub struct NewPrincipal {
    /// Login name to create. Caller-generated, matches the `gk_` pattern.
    pub name: String,
    /// Freshly generated password. Never logged or included in `Debug` output.
    pub password: SecretString,
    /// Role pack to assign.
    pub role_pack: String,
    /// Time-to-live in minutes.
    pub ttl_minutes: u32,
    /// Maximum simultaneous connections permitted for this login.
    pub connection_limit: i32,
}

impl std::fmt::Debug for NewPrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPrincipal")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("role_pack", &self.role_pack)
            .field("ttl_minutes", &self.ttl_minutes)
            .field("connection_limit", &self.connection_limit)
            .finish()
    }
}

/// A named, versioned collection of grants appropriate to one engine.
///
/// Identity is `(engine, name, version)`. Installed idempotently at
/// bootstrap time; a new version is a new role pack rather than a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePack {
    /// Engine tag this role pack targets (e.g. `"postgres"`).
    pub engine: String,
    /// Role pack name (`read`, `write`, `admin`, or an engine-specific variant
    /// such as `analyst`).
    pub name: String,
    /// Version tag, e.g. `"pg-1.0.0"`.
    pub version: String,
    /// Human description shown in catalogues.
    pub description: String,
    /// Permission statements granted by this pack.
    pub grants: Vec<String>,
}

/// Permission tier requested by a `create_session` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access.
    Read,
    /// Read-write access.
    Write,
    /// Administrative access.
    Admin,
}

impl Role {
    /// Returns the role pack name this role maps to.
    #[must_use]
    pub const fn pack_name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }
}

/// SSL negotiation mode used when building a DSN. Defaults to `prefer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Do not use SSL.
    Disable,
    /// Prefer SSL but fall back to an unencrypted connection.
    #[default]
    Prefer,
    /// Require SSL; fail the connection if it cannot be negotiated.
    Require,
}

impl SslMode {
    /// Returns the literal value used in the DSN's `sslmode` query parameter.
    #[must_use]
    pub const fn as_dsn_value(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
        }
    }
}

/// The database a `create_session` job targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Database host name or address.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// SSL mode; defaults to [`SslMode::Prefer`] when absent from the job.
    #[serde(default, rename = "sslMode")]
    pub ssl_mode: SslMode,
}

/// Identity of the caller requesting a session, carried through for audit
/// purposes only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requester {
    /// Opaque identifier of the requesting user or service.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Optional contact email, logged but never used for authentication.
    #[serde(default)]
    pub email: Option<String>,
}

/// Lifecycle state of a session.
///
/// Transitions: `Pending -> Ready | Failed`, `Ready -> Revoked | Expired`.
/// `Ready -> Failed` is not a legal transition: once a DSN is issued the
/// session is observable as alive until revoked or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Job accepted but the provider call has not yet completed.
    Pending,
    /// Session is live; a DSN has been issued.
    Ready,
    /// Session was revoked before its natural expiry.
    Revoked,
    /// Session's TTL elapsed and cleanup reclaimed the principal.
    Expired,
    /// Provider or validation failure; no principal exists for this job.
    Failed,
    /// A revoke job named a session id with no known mapping to a username.
    NotFound,
    /// A cleanup sweep ran to completion (regardless of how many principals
    /// it actually dropped).
    Completed,
}

/// Row returned by the bootstrap's `list_ephemeral()` helper routine and by
/// [`crate::provider::DatabaseProvider::list_ephemeral_users`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedPrincipal {
    /// Login name.
    pub name: String,
    /// ISO-8601 UTC expiry timestamp.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Whether the database already considers this principal expired.
    pub is_expired: bool,
    /// Configured connection cap.
    pub connection_limit: i32,
    /// Currently active connections for this login.
    pub active_connections: i32,
}

/// Outcome of a single candidate in a `cleanupExpiredUsers` batch: dropped
/// successfully, was expired but the drop failed (with error text), or
/// considered but not yet expired under the grace period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupOutcome {
    /// Login name considered for cleanup.
    pub name: String,
    /// Whether the database considered this principal expired (honouring the
    /// grace period).
    pub was_expired: bool,
    /// Whether the principal was actually dropped.
    pub dropped: bool,
    /// Error text if `was_expired` is true but `dropped` is false.
    pub error_message: Option<String>,
}

/// Tri-state health reported by [`crate::provider::DatabaseProvider::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// All checks passed.
    Healthy,
    /// At least one non-connectivity check failed.
    Degraded,
    /// The provider could not reach the database at all.
    Unhealthy,
}

/// Structured health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Aggregate health state.
    pub state: HealthState,
    /// Free-text summary.
    pub message: String,
    /// Timestamp the check was performed.
    pub checked_at: chrono::DateTime<chrono::Utc>,
    /// Per-check status plus pool statistics, as a JSON detail bag.
    pub details: serde_json::Value,
}

/// Orchestrator-facing health tri-state, mapped from [`HealthState`]'s
/// healthy/degraded/unhealthy onto the ok/degraded/down vocabulary callers
/// see from [`crate::orchestrator::Orchestrator::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorHealthState {
    /// Provider reported [`HealthState::Healthy`].
    Ok,
    /// Provider reported [`HealthState::Degraded`].
    Degraded,
    /// Provider reported [`HealthState::Unhealthy`], or could not be reached.
    Down,
}

impl From<HealthState> for OrchestratorHealthState {
    fn from(state: HealthState) -> Self {
        match state {
            HealthState::Healthy => Self::Ok,
            HealthState::Degraded => Self::Degraded,
            HealthState::Unhealthy => Self::Down,
        }
    }
}

/// Orchestrator-facing health report, enriched with the provider's engine
/// tag and version over the raw [`HealthReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorHealthReport {
    /// Mapped tri-state.
    pub state: OrchestratorHealthState,
    /// Free-text summary, as reported by the provider.
    pub message: String,
    /// Timestamp the check was performed.
    pub checked_at: chrono::DateTime<chrono::Utc>,
    /// The provider's detail bag, with `engine` and `providerVersion` merged
    /// in.
    pub details: serde_json::Value,
}
