//! Environment-sourced configuration for wiring a provider and orchestrator
//! together.
//!
//! Deliberately narrow: this crate does not own a general-purpose
//! configuration-loading service, which stays an external collaborator's
//! responsibility. [`GatekeeperConfig`] only covers the handful of values
//! this crate's own tests and examples need to build a
//! [`crate::provider::postgres::PostgresProvider`] and
//! [`crate::orchestrator::Orchestrator`] without hand-wiring every field.

use std::time::Duration;

use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;

use crate::model::SslMode;

/// Configuration loaded from `GATEKEEPER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct GatekeeperConfig {
    /// Target database host.
    pub db_host: String,
    /// Target database port.
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    /// Target database name.
    pub db_name: String,
    /// Administrative username used to open the provider's connection pool.
    pub db_admin_user: String,
    /// Administrative password used to open the provider's connection pool.
    pub db_admin_password: String,
    /// SSL mode used for the admin connection and every issued DSN.
    #[serde(default)]
    pub db_ssl_mode: SslMode,
    /// Maximum TTL, in minutes, the orchestrator will accept on a
    /// `create_session` job.
    #[serde(default = "default_max_ttl_minutes")]
    pub max_ttl_minutes: u32,
    /// Maximum number of pooled admin connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

const fn default_db_port() -> u16 {
    5432
}

const fn default_max_ttl_minutes() -> u32 {
    1440
}

const fn default_max_connections() -> u32 {
    10
}

impl GatekeeperConfig {
    /// Loads configuration from environment variables prefixed
    /// `GATEKEEPER_`, e.g. `GATEKEEPER_DB_HOST`.
    ///
    /// # Errors
    /// Returns a [`figment::Error`] if a required variable is missing or a
    /// present variable fails to deserialise into its target type.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::new().merge(Env::prefixed("GATEKEEPER_")).extract()
    }

    /// Converts the configured database connection fields into a
    /// [`crate::model::ConnectionTarget`].
    #[must_use]
    pub fn connection_target(&self) -> crate::model::ConnectionTarget {
        crate::model::ConnectionTarget {
            host: self.db_host.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            ssl_mode: self.db_ssl_mode,
        }
    }

    /// Builds a [`crate::provider::postgres::PostgresProviderConfig`] using
    /// this configuration's pool-size setting and the provider's own
    /// timeout defaults.
    #[must_use]
    pub fn postgres_provider_config(&self) -> crate::provider::postgres::PostgresProviderConfig {
        crate::provider::postgres::PostgresProviderConfig {
            max_connections: self.max_connections,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(25),
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn loads_required_fields_and_applies_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("GATEKEEPER_DB_HOST", "db.internal");
            jail.set_env("GATEKEEPER_DB_NAME", "app");
            jail.set_env("GATEKEEPER_DB_ADMIN_USER", "gk_admin");
            jail.set_env("GATEKEEPER_DB_ADMIN_PASSWORD", "secret");

            let config = GatekeeperConfig::from_env().expect("config should load");
            assert_eq!(config.db_port, 5432);
            assert_eq!(config.max_ttl_minutes, 1440);
            assert_eq!(config.max_connections, 10);
            Ok(())
        });
    }

    #[test]
    fn overrides_defaults_when_present() {
        Jail::expect_with(|jail| {
            jail.set_env("GATEKEEPER_DB_HOST", "db.internal");
            jail.set_env("GATEKEEPER_DB_NAME", "app");
            jail.set_env("GATEKEEPER_DB_ADMIN_USER", "gk_admin");
            jail.set_env("GATEKEEPER_DB_ADMIN_PASSWORD", "secret");
            jail.set_env("GATEKEEPER_MAX_TTL_MINUTES", "60");

            let config = GatekeeperConfig::from_env().expect("config should load");
            assert_eq!(config.max_ttl_minutes, 60);
            Ok(())
        });
    }
}
