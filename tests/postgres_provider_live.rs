//! Live PostgreSQL integration tests.
//!
//! These exercise `PostgresProvider` against a real server instead of a
//! mock, so they only compile under the `provider-tests` feature and expect
//! `GATEKEEPER_TEST_PG_*` environment variables naming an admin connection
//! with permission to create roles (run with
//! `cargo test --features provider-tests --test postgres_provider_live`).

#![cfg(feature = "provider-tests")]

use gatekeeper_core::model::{ConnectionTarget, HealthState, NewPrincipal, Role, SslMode};
use gatekeeper_core::provider::postgres::{PostgresProvider, PostgresProviderConfig};
use gatekeeper_core::provider::{AdminCredentials, DatabaseProvider};
use secrecy::SecretString;

fn admin_credentials_from_env() -> (ConnectionTarget, AdminCredentials) {
    let host = std::env::var("GATEKEEPER_TEST_PG_HOST").unwrap_or_else(|_| "localhost".to_owned());
    let port: u16 = std::env::var("GATEKEEPER_TEST_PG_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5432);
    let database = std::env::var("GATEKEEPER_TEST_PG_DATABASE").unwrap_or_else(|_| "postgres".to_owned());
    let username = std::env::var("GATEKEEPER_TEST_PG_USER").unwrap_or_else(|_| "postgres".to_owned());
    let password = std::env::var("GATEKEEPER_TEST_PG_PASSWORD").unwrap_or_else(|_| "postgres".to_owned());

    (
        ConnectionTarget {
            host,
            port,
            database,
            ssl_mode: SslMode::Disable,
        },
        AdminCredentials {
            username,
            password: SecretString::from(password),
        },
    )
}

#[tokio::test]
async fn bootstrap_then_create_and_drop_a_real_ephemeral_user() {
    let (connection, credentials) = admin_credentials_from_env();
    let provider = PostgresProvider::new(PostgresProviderConfig::default());

    provider
        .initialize(&connection, credentials)
        .await
        .expect("bootstrap against a live server should succeed");

    let report = provider.health_check().await.expect("health check should succeed");
    assert_eq!(report.state, HealthState::Healthy);

    let provisioned = provider
        .create_ephemeral_user(NewPrincipal {
            name: "gk_livetest0001".to_owned(),
            password: SecretString::from("correct horse battery staple".to_owned()),
            role_pack: Role::Read.pack_name().to_owned(),
            ttl_minutes: 5,
            connection_limit: 2,
        })
        .await
        .expect("create_ephemeral_user should succeed against a live server");
    assert!(provisioned.dsn.starts_with("postgresql://gk_livetest0001:"));

    let dropped = provider
        .drop_user("gk_livetest0001")
        .await
        .expect("drop_user should succeed");
    assert!(dropped);

    provider.close().await;
}

#[tokio::test]
async fn initialize_is_idempotent_on_repeat_calls() {
    let (connection, credentials) = admin_credentials_from_env();
    let provider = PostgresProvider::new(PostgresProviderConfig::default());

    provider
        .initialize(&connection, credentials.clone())
        .await
        .expect("first initialize should succeed");
    provider
        .initialize(&connection, credentials)
        .await
        .expect("second initialize should be a no-op, not an error");

    provider.close().await;
}
