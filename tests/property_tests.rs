//! Property-based tests for validator and DSN-construction invariants and
//! boundary behaviour.

use gatekeeper_core::model::{ConnectionTarget, SslMode};
use gatekeeper_core::provider::postgres::dsn::build_dsn;
use gatekeeper_core::validation::{
    validate_job_id, validate_reason, validate_session_id, validate_ttl_minutes, validate_username,
};
use proptest::prelude::*;
use secrecy::SecretString;

proptest! {
    #[test]
    fn ttl_within_bounds_is_always_accepted(max in 1u32..=10_000, ttl in 1u32..=10_000) {
        prop_assume!(ttl <= max);
        prop_assert!(validate_ttl_minutes(ttl, max).is_ok());
    }

    #[test]
    fn ttl_above_max_is_always_rejected(max in 1u32..=10_000, overshoot in 1u32..=10_000) {
        let ttl = max.saturating_add(overshoot);
        prop_assert!(validate_ttl_minutes(ttl, max).is_err());
    }

    #[test]
    fn ttl_zero_is_always_rejected(max in 0u32..=10_000) {
        prop_assert!(validate_ttl_minutes(0, max).is_err());
    }

    #[test]
    fn valid_generated_usernames_round_trip_through_validation(suffix in "[a-z0-9]{4,60}") {
        let username = format!("gk_{suffix}");
        prop_assert!(validate_username(&username).is_ok());
    }

    #[test]
    fn usernames_without_the_gk_prefix_are_rejected(candidate in "[a-zA-Z0-9]{1,60}") {
        prop_assume!(!candidate.starts_with("gk_"));
        prop_assert!(validate_username(&candidate).is_err());
    }

    #[test]
    fn valid_session_ids_round_trip_through_validation(suffix in "[A-Za-z0-9]{4,60}") {
        let session_id = format!("ses_{suffix}");
        prop_assert!(validate_session_id(&session_id).is_ok());
    }

    #[test]
    fn job_ids_within_length_bounds_are_accepted(len in 1usize..=128) {
        let id = "a".repeat(len);
        prop_assert!(validate_job_id(&id).is_ok());
    }

    #[test]
    fn reasons_within_256_chars_are_accepted(len in 0usize..=256) {
        let reason = "a".repeat(len);
        prop_assert!(validate_reason(Some(&reason)).is_ok());
    }

    #[test]
    fn reasons_over_256_chars_are_rejected(extra in 1usize..=200) {
        let reason = "a".repeat(256 + extra);
        prop_assert!(validate_reason(Some(&reason)).is_err());
    }

    #[test]
    fn dsn_always_embeds_the_requested_ssl_mode(
        host in "[a-z0-9.-]{1,40}",
        port in 1u16..=65535,
        database in "[a-z0-9_]{1,30}",
        name in "gk_[a-z0-9]{4,20}",
    ) {
        for ssl_mode in [SslMode::Disable, SslMode::Prefer, SslMode::Require] {
            let target = ConnectionTarget { host: host.clone(), port, database: database.clone(), ssl_mode };
            let password = SecretString::from("correct-horse-battery-staple".to_owned());
            let dsn = build_dsn(&target, &name, &password);
            let expected_suffix = format!("sslmode={}", ssl_mode.as_dsn_value());
            prop_assert!(dsn.ends_with(&expected_suffix));
            prop_assert!(dsn.starts_with("postgresql://"));
        }
    }

    #[test]
    fn dsn_never_leaks_the_raw_password_unescaped_when_it_has_special_characters(
        name in "gk_[a-z0-9]{4,20}",
    ) {
        let target = ConnectionTarget {
            host: "db.internal".to_owned(),
            port: 5432,
            database: "app".to_owned(),
            ssl_mode: SslMode::Prefer,
        };
        let password = SecretString::from("p@ss:word/with?special&chars".to_owned());
        let dsn = build_dsn(&target, &name, &password);
        prop_assert!(!dsn.contains("p@ss:word/with?special&chars"));
    }
}
