//! PostgreSQL [`DatabaseProvider`] implementation.
//!
//! Bootstrap installs three idempotent SQL scripts (role packs, privileged
//! helper routines, the audit table) and every subsequent operation goes
//! through the helper routines rather than issuing `CREATE ROLE` / `DROP
//! ROLE` directly, so the admin connection only ever needs `EXECUTE` on four
//! functions.

pub mod dsn;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditEventType, AuditLog, PostgresAuditLog};
use crate::error::{ProviderError, ProviderErrorCode};
use crate::model::{
    CleanupOutcome, ConnectionTarget, HealthReport, HealthState, ListedPrincipal, NewPrincipal,
    RolePack,
};
use crate::observability::LOG_TARGET;
use crate::provider::{AdminCredentials, DatabaseProvider, ProvisionedUser};

const BOOTSTRAP_ROLES_SQL: &str = include_str!("sql/roles.sql");
const BOOTSTRAP_HELPERS_SQL: &str = include_str!("sql/helpers.sql");
const BOOTSTRAP_AUDIT_SQL: &str = include_str!("sql/audit.sql");

const ENGINE: &str = "postgres";
const PROVIDER_VERSION: &str = "pg-1.0.0";

/// Tuning knobs for the admin connection pool.
#[derive(Debug, Clone)]
pub struct PostgresProviderConfig {
    /// Maximum number of pooled admin connections.
    pub max_connections: u32,
    /// How long an idle pooled connection may sit before being closed.
    pub idle_timeout: Duration,
    /// How long to wait for a new connection before failing.
    pub connect_timeout: Duration,
    /// `statement_timeout` applied to every connection in the pool.
    pub statement_timeout: Duration,
    /// Timeout applied to individual helper-routine calls.
    pub query_timeout: Duration,
}

impl Default for PostgresProviderConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(25),
        }
    }
}

/// The three role packs this provider ships, at a fixed catalogue version,
/// independent of what has actually been installed against a given target.
fn role_pack_catalogue() -> Vec<RolePack> {
    vec![
        RolePack {
            engine: ENGINE.to_owned(),
            name: "read".to_owned(),
            version: PROVIDER_VERSION.to_owned(),
            description: "SELECT on every table in the public schema".to_owned(),
            grants: vec!["GRANT SELECT ON ALL TABLES IN SCHEMA public".to_owned()],
        },
        RolePack {
            engine: ENGINE.to_owned(),
            name: "write".to_owned(),
            version: PROVIDER_VERSION.to_owned(),
            description: "SELECT, INSERT, UPDATE, DELETE on every table in the public schema"
                .to_owned(),
            grants: vec![
                "GRANT SELECT, INSERT, UPDATE, DELETE ON ALL TABLES IN SCHEMA public".to_owned(),
            ],
        },
        RolePack {
            engine: ENGINE.to_owned(),
            name: "admin".to_owned(),
            version: PROVIDER_VERSION.to_owned(),
            description: "ALL PRIVILEGES on the public schema".to_owned(),
            grants: vec!["GRANT ALL PRIVILEGES ON SCHEMA public".to_owned()],
        },
    ]
}

/// Maps a raised `GK0xx` SQLSTATE (or a generic failure) from a helper
/// routine call into a [`ProviderError`].
fn map_helper_error(err: &sqlx::Error, code_on_failure: ProviderErrorCode, message: &str) -> ProviderError {
    if let sqlx::Error::Database(db_err) = err {
        match db_err.code().as_deref() {
            Some("GK001") => {
                return ProviderError::new(ProviderErrorCode::UserExists, db_err.message(), false, ENGINE);
            }
            Some("GK002") => {
                return ProviderError::new(ProviderErrorCode::RoleNotFound, db_err.message(), false, ENGINE);
            }
            Some("GK003" | "GK004") => {
                return ProviderError::new(code_on_failure, db_err.message(), false, ENGINE);
            }
            _ => {}
        }
    }
    ProviderError::new(code_on_failure, format!("{message}: {err}"), true, ENGINE)
}

/// PostgreSQL [`DatabaseProvider`]. Holds the admin pool behind a
/// [`OnceCell`] so `initialize` can be called exactly once and every other
/// method can assume it has succeeded.
pub struct PostgresProvider {
    config: PostgresProviderConfig,
    pool: OnceCell<PgPool>,
    audit: OnceCell<PostgresAuditLog>,
    connection: OnceCell<ConnectionTarget>,
}

impl PostgresProvider {
    /// Builds a provider with the given pool configuration. Call
    /// [`DatabaseProvider::initialize`] before using it.
    #[must_use]
    pub fn new(config: PostgresProviderConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
            audit: OnceCell::new(),
            connection: OnceCell::new(),
        }
    }

    fn pool(&self) -> Result<&PgPool, ProviderError> {
        self.pool.get().ok_or_else(|| ProviderError::not_initialized(ENGINE))
    }

    /// Bounds `fut` by the configured per-query timeout, mapping an elapsed
    /// deadline into a retryable `code` error.
    async fn with_query_timeout<T>(
        &self,
        code: ProviderErrorCode,
        operation: &str,
        fut: impl std::future::Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        match tokio::time::timeout(self.config.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(
                code,
                format!("{operation} exceeded the configured query timeout"),
                true,
                ENGINE,
            )),
        }
    }

    /// Returns the audit log backing this provider, for wiring into an
    /// [`crate::orchestrator::Orchestrator`]'s session-lookup fallback.
    ///
    /// # Errors
    /// Returns [`ProviderErrorCode::NotInitialized`] if called before
    /// [`DatabaseProvider::initialize`] succeeds.
    pub fn audit_log(&self) -> Result<&PostgresAuditLog, ProviderError> {
        self.audit.get().ok_or_else(|| ProviderError::not_initialized(ENGINE))
    }

    async fn run_bootstrap_script(pool: &PgPool, script: &str) -> Result<(), ProviderError> {
        sqlx::raw_sql(script).execute(pool).await.map_err(|err| {
            ProviderError::new(
                ProviderErrorCode::ProviderInitError,
                format!("bootstrap script failed: {err}"),
                true,
                ENGINE,
            )
        })?;
        Ok(())
    }
}

impl Default for PostgresProvider {
    fn default() -> Self {
        Self::new(PostgresProviderConfig::default())
    }
}

#[async_trait]
impl DatabaseProvider for PostgresProvider {
    async fn initialize(
        &self,
        connection: &ConnectionTarget,
        credentials: AdminCredentials,
    ) -> Result<(), ProviderError> {
        if self.pool.get().is_some() {
            return Ok(());
        }

        let dsn = dsn::build_dsn(connection, &credentials.username, &credentials.password);
        let statement_timeout_ms = self.config.statement_timeout.as_millis();
        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .idle_timeout(self.config.idle_timeout)
            .acquire_timeout(self.config.connect_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query(&format!("SET statement_timeout = {statement_timeout_ms}"))
                        .execute(conn)
                        .await
                        .map(|_| ())
                })
            })
            .connect(&dsn)
            .await
            .map_err(|err| {
                ProviderError::new(
                    ProviderErrorCode::ProviderInitError,
                    format!("failed to connect admin pool: {err}"),
                    true,
                    ENGINE,
                )
            })?;

        Self::run_bootstrap_script(&pool, BOOTSTRAP_ROLES_SQL).await?;
        Self::run_bootstrap_script(&pool, BOOTSTRAP_HELPERS_SQL).await?;
        Self::run_bootstrap_script(&pool, BOOTSTRAP_AUDIT_SQL).await?;

        let audit = PostgresAuditLog::new(pool.clone());
        audit
            .append(AuditEvent {
                event_type: AuditEventType::SetupCompleted,
                session_id: None,
                username: None,
                correlation_id: "bootstrap".to_owned(),
                event_data: serde_json::json!({ "providerVersion": PROVIDER_VERSION }),
            })
            .await?;

        info!(target: LOG_TARGET, engine = ENGINE, "bootstrap installed");

        // A concurrent caller may have raced this one to `initialize`; whichever loses the
        // `set` has done redundant but harmless work against idempotent bootstrap scripts,
        // so the loser reports success rather than an error.
        let _ = self.pool.set(pool);
        let _ = self.audit.set(audit);
        let _ = self.connection.set(connection.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthReport, ProviderError> {
        let pool = self.pool()?;
        let checked_at = chrono::Utc::now();

        let rows = match sqlx::query("SELECT check_name, status, details FROM gk_validate_setup()")
            .fetch_all(pool)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(target: LOG_TARGET, engine = ENGINE, error = %err, "health check connectivity probe failed");
                return Ok(HealthReport {
                    state: HealthState::Unhealthy,
                    message: format!("connectivity probe failed: {err}"),
                    checked_at,
                    details: serde_json::json!({}),
                });
            }
        };

        let mut checks = Vec::with_capacity(rows.len());
        let mut all_green = true;
        for row in &rows {
            let check_name: String = row.try_get("check_name").unwrap_or_default();
            let status: String = row.try_get("status").unwrap_or_default();
            let details: String = row.try_get("details").unwrap_or_default();
            if status != "green" {
                all_green = false;
            }
            checks.push(serde_json::json!({
                "check": check_name,
                "status": status,
                "details": details,
            }));
        }

        let state = if all_green {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        };
        let message = if all_green {
            "all bootstrap checks passed".to_owned()
        } else {
            "one or more bootstrap checks failed".to_owned()
        };

        let total = pool.size();
        let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX);
        let waiting = total.saturating_sub(idle);

        Ok(HealthReport {
            state,
            message,
            checked_at,
            details: serde_json::json!({
                "checks": checks,
                "pool": { "total": total, "idle": idle, "waiting": waiting },
            }),
        })
    }

    async fn create_ephemeral_user(
        &self,
        request: NewPrincipal,
    ) -> Result<ProvisionedUser, ProviderError> {
        let pool = self.pool()?;
        let expires_at = chrono::Utc::now()
            + chrono::Duration::minutes(i64::from(request.ttl_minutes));

        self.with_query_timeout(
            ProviderErrorCode::UserCreationFailed,
            "createEphemeralUser",
            async {
                sqlx::query("SELECT gk_create_ephemeral($1, $2, $3, $4, $5)")
                    .bind(&request.name)
                    .bind(request.password.expose_secret())
                    .bind(expires_at)
                    .bind(&request.role_pack)
                    .bind(request.connection_limit)
                    .execute(pool)
                    .await
                    .map_err(|err| map_helper_error(&err, ProviderErrorCode::UserCreationFailed, "createEphemeralUser failed"))
            },
        )
        .await?;

        let connection = self.connection.get().ok_or_else(|| ProviderError::not_initialized(ENGINE))?;
        let dsn = dsn::build_dsn(connection, &request.name, &request.password);

        Ok(ProvisionedUser {
            name: request.name,
            dsn,
            expires_at,
            connection_limit: request.connection_limit,
            metadata: serde_json::json!({ "rolePack": request.role_pack }),
        })
    }

    async fn drop_user(&self, name: &str) -> Result<bool, ProviderError> {
        let pool = self.pool()?;
        self.with_query_timeout(ProviderErrorCode::UserDropFailed, "dropUser", async {
            sqlx::query_scalar("SELECT gk_drop($1)")
                .bind(name)
                .fetch_one(pool)
                .await
                .map_err(|err| map_helper_error(&err, ProviderErrorCode::UserDropFailed, "dropUser failed"))
        })
        .await
    }

    async fn list_ephemeral_users(&self) -> Result<Vec<ListedPrincipal>, ProviderError> {
        let pool = self.pool()?;
        let rows = self
            .with_query_timeout(ProviderErrorCode::UserListFailed, "listEphemeralUsers", async {
                sqlx::query(
                    "SELECT name, expires_at, is_expired, connection_limit, active_connections \
                     FROM gk_list_ephemeral()",
                )
                .fetch_all(pool)
                .await
                .map_err(|err| {
                    ProviderError::new(
                        ProviderErrorCode::UserListFailed,
                        format!("listEphemeralUsers failed: {err}"),
                        true,
                        ENGINE,
                    )
                })
            })
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ListedPrincipal {
                    name: row.try_get("name").map_err(|err| list_row_error(&err))?,
                    expires_at: row.try_get("expires_at").map_err(|err| list_row_error(&err))?,
                    is_expired: row.try_get("is_expired").map_err(|err| list_row_error(&err))?,
                    connection_limit: row
                        .try_get("connection_limit")
                        .map_err(|err| list_row_error(&err))?,
                    active_connections: row
                        .try_get("active_connections")
                        .map_err(|err| list_row_error(&err))?,
                })
            })
            .collect()
    }

    async fn cleanup_expired_users(
        &self,
        older_than_minutes: u32,
    ) -> Result<Vec<CleanupOutcome>, ProviderError> {
        let pool = self.pool()?;
        let older_than_minutes = i32::try_from(older_than_minutes).unwrap_or(i32::MAX);
        let rows = self
            .with_query_timeout(ProviderErrorCode::CleanupFailed, "cleanupExpiredUsers", async {
                sqlx::query(
                    "SELECT name, was_expired, dropped, error_message FROM gk_cleanup_expired($1)",
                )
                .bind(older_than_minutes)
                .fetch_all(pool)
                .await
                .map_err(|err| {
                    ProviderError::new(
                        ProviderErrorCode::CleanupFailed,
                        format!("cleanupExpiredUsers failed: {err}"),
                        true,
                        ENGINE,
                    )
                })
            })
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CleanupOutcome {
                    name: row.try_get("name").map_err(|err| list_row_error(&err))?,
                    was_expired: row.try_get("was_expired").map_err(|err| list_row_error(&err))?,
                    dropped: row.try_get("dropped").map_err(|err| list_row_error(&err))?,
                    error_message: row
                        .try_get("error_message")
                        .map_err(|err| list_row_error(&err))?,
                })
            })
            .collect()
    }

    async fn available_role_packs(&self) -> Result<Vec<RolePack>, ProviderError> {
        Ok(role_pack_catalogue())
    }

    async fn install_role_pack(&self, role_pack: &RolePack) -> Result<(), ProviderError> {
        if role_pack.engine != ENGINE {
            return Err(ProviderError::new(
                ProviderErrorCode::RolePackError,
                format!("role pack engine `{}` does not match provider engine `{ENGINE}`", role_pack.engine),
                false,
                ENGINE,
            ));
        }
        let pool = self.pool()?;
        Self::run_bootstrap_script(pool, BOOTSTRAP_ROLES_SQL).await.map_err(|err| {
            ProviderError::new(
                ProviderErrorCode::RolePackError,
                format!("installRolePack({}) failed: {}", role_pack.name, err.message),
                err.retryable,
                ENGINE,
            )
        })
    }

    fn generate_dsn(
        &self,
        connection: &ConnectionTarget,
        name: &str,
        password: &SecretString,
    ) -> String {
        dsn::build_dsn(connection, name, password)
    }

    async fn test_connection(&self, dsn: &str) -> Result<bool, ProviderError> {
        match PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.config.connect_timeout)
            .connect(dsn)
            .await
        {
            Ok(pool) => {
                pool.close().await;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn provider_version(&self) -> &'static str {
        PROVIDER_VERSION
    }
}

fn list_row_error(err: &sqlx::Error) -> ProviderError {
    ProviderError::new(
        ProviderErrorCode::UserListFailed,
        format!("failed to decode helper routine row: {err}"),
        false,
        ENGINE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = PostgresProviderConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.query_timeout, Duration::from_secs(25));
    }

    #[test]
    fn role_pack_catalogue_has_three_fixed_packs() {
        let packs = role_pack_catalogue();
        assert_eq!(packs.len(), 3);
        assert!(packs.iter().all(|pack| pack.version == PROVIDER_VERSION));
    }

    #[test]
    fn uninitialized_provider_reports_not_initialized() {
        let provider = PostgresProvider::default();
        let err = provider.pool().expect_err("pool must be absent before initialize");
        assert_eq!(err.code, ProviderErrorCode::NotInitialized);
    }
}
