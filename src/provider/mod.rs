//! The provider interface: the capability surface every database engine
//! implementation must satisfy.

pub mod postgres;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::{
    CleanupOutcome, ConnectionTarget, HealthReport, ListedPrincipal, NewPrincipal, RolePack,
};

/// Admin credentials used to open a provider's connection pool.
///
/// Kept engine-agnostic here; the PostgreSQL provider narrows `password` into
/// a `secrecy::SecretString` internally.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    /// Administrative username.
    pub username: String,
    /// Administrative password.
    pub password: secrecy::SecretString,
}

impl PartialEq for AdminCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

/// Result of provisioning a new ephemeral principal.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProvisionedUser {
    /// Login name assigned to the new principal.
    pub name: String,
    /// Fresh connection string embedding the new principal's credentials.
    pub dsn: String,
    /// UTC expiry instant.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Connection cap assigned to the new principal.
    pub connection_limit: i32,
    /// Provider-specific metadata (e.g. the engine's reported server version).
    pub metadata: serde_json::Value,
}

/// The capability surface for one database engine.
///
/// Implementations must be `Send + Sync` so an [`crate::orchestrator::Orchestrator`]
/// can hold one behind an `Arc` and dispatch concurrent jobs against it.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Opens an admin connection pool and verifies the bootstrap setup.
    ///
    /// # Errors
    /// Returns [`crate::error::ProviderErrorCode::ProviderInitError`] if the
    /// pool cannot be created or the setup probe fails.
    async fn initialize(
        &self,
        connection: &ConnectionTarget,
        credentials: AdminCredentials,
    ) -> Result<(), ProviderError>;

    /// Reports provider health: connectivity, bootstrap validation checks,
    /// and pool statistics.
    async fn health_check(&self) -> Result<HealthReport, ProviderError>;

    /// Provisions one ephemeral principal and returns its connection details.
    async fn create_ephemeral_user(
        &self,
        request: NewPrincipal,
    ) -> Result<ProvisionedUser, ProviderError>;

    /// Idempotently removes a principal. Returns `true` only if a principal
    /// actually existed and was removed.
    async fn drop_user(&self, name: &str) -> Result<bool, ProviderError>;

    /// Enumerates currently provisioned principals matching the `gk_`
    /// pattern.
    async fn list_ephemeral_users(&self) -> Result<Vec<ListedPrincipal>, ProviderError>;

    /// Drops every principal whose expiry is older than `now -
    /// older_than_minutes`, returning one outcome row per candidate.
    async fn cleanup_expired_users(
        &self,
        older_than_minutes: u32,
    ) -> Result<Vec<CleanupOutcome>, ProviderError>;

    /// Returns the role packs available for this engine.
    async fn available_role_packs(&self) -> Result<Vec<RolePack>, ProviderError>;

    /// Idempotently installs `role_pack` at its fixed version.
    async fn install_role_pack(&self, role_pack: &RolePack) -> Result<(), ProviderError>;

    /// Builds the engine-specific connection string for `name`/`password`
    /// against `connection`.
    fn generate_dsn(
        &self,
        connection: &ConnectionTarget,
        name: &str,
        password: &secrecy::SecretString,
    ) -> String;

    /// Best-effort reachability check against an arbitrary DSN.
    async fn test_connection(&self, dsn: &str) -> Result<bool, ProviderError>;

    /// Releases the pool and any background work. Idempotent.
    async fn close(&self);

    /// Engine tag reported alongside every error and audit event.
    fn engine(&self) -> &'static str;

    /// Provider implementation version, independent of the engine's own
    /// server version.
    fn provider_version(&self) -> &'static str;
}
