//! Field-level validators for job contracts: TTL within [1, configured
//! maximum], correlation id a UUID, session id matching
//! `ses_[alphanumeric]{4,60}`, target id matching `[A-Za-z0-9_-]{1,64}`,
//! ephemeral username matching `gk_[A-Za-z0-9]{1,60}`, and reason at most
//! 256 characters or absent.
//!
//! Each validator returns a [`ValidationError`] naming the offending field,
//! never a bare string, so the orchestrator can surface a stable `field`
//! value to callers.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

static SESSION_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"^ses_[A-Za-z0-9]{4,60}$"));
static TARGET_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"^[A-Za-z0-9_-]{1,64}$"));
static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"^gk_[A-Za-z0-9]{1,60}$"));

/// Compiles one of the crate's fixed validation patterns.
///
/// # Panics
///
/// Panics if `pattern` fails to compile. All callers pass crate-internal
/// constants, so a panic here indicates a programming error in this module,
/// never bad user input.
fn build_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("built-in validation pattern `{pattern}` failed to compile: {err}"),
    }
}

/// Validates a requested TTL (in minutes) against the configured maximum.
/// `ttl == 0` is rejected, `ttl == max` is accepted, `ttl == max + 1` is
/// rejected.
pub fn validate_ttl_minutes(ttl_minutes: u32, max_ttl_minutes: u32) -> Result<(), ValidationError> {
    if ttl_minutes < 1 {
        return Err(ValidationError::new(
            "ttlMinutes",
            "must be at least 1 minute",
        ));
    }
    if ttl_minutes > max_ttl_minutes {
        return Err(ValidationError::new(
            "ttlMinutes",
            format!("must not exceed the configured maximum of {max_ttl_minutes} minutes"),
        ));
    }
    Ok(())
}

/// Validates that `value` is a syntactically well-formed UUID (used for
/// correlation ids).
pub fn validate_correlation_id(value: &str) -> Result<(), ValidationError> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("correlationId", "must be a UUID"))
}

/// Validates a session id against `ses_[A-Za-z0-9]{4,60}`.
pub fn validate_session_id(value: &str) -> Result<(), ValidationError> {
    if SESSION_ID_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "sessionId",
            "must match ses_[A-Za-z0-9]{4,60}",
        ))
    }
}

/// Validates a target database identifier against `[A-Za-z0-9_-]{1,64}`.
pub fn validate_target_id(value: &str) -> Result<(), ValidationError> {
    if TARGET_ID_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "target",
            "must match [A-Za-z0-9_-]{1,64}",
        ))
    }
}

/// Validates an ephemeral username against `gk_[A-Za-z0-9]{1,60}`, with an
/// overall length ceiling of 63 characters.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.len() > 63 {
        return Err(ValidationError::new(
            "username",
            "must not exceed 63 characters",
        ));
    }
    if USERNAME_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "username",
            "must match gk_[A-Za-z0-9]{1,60}",
        ))
    }
}

/// Validates an optional free-text reason, capped at 256 characters.
pub fn validate_reason(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        None => Ok(()),
        Some(reason) if reason.chars().count() <= 256 => Ok(()),
        Some(_) => Err(ValidationError::new(
            "reason",
            "must not exceed 256 characters",
        )),
    }
}

/// Validates a job id, which doubles as an idempotency handle (1-128 chars).
pub fn validate_job_id(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if (1..=128).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "id",
            "must be between 1 and 128 characters",
        ))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::prefixed_alphanumeric("gk_abc123", true)]
    #[case::missing_prefix("abc123", false)]
    #[case::wrong_prefix("adm_abc123", false)]
    #[case::empty_suffix("gk_", false)]
    #[case::at_length_ceiling(&format!("gk_{}", "a".repeat(60)), true)]
    #[case::past_length_ceiling(&format!("gk_{}", "a".repeat(61)), false)]
    fn username_pattern_cases(#[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(validate_username(candidate).is_ok(), expected);
    }

    #[test]
    fn ttl_zero_is_rejected() {
        assert!(validate_ttl_minutes(0, 1440).is_err());
    }

    #[test]
    fn ttl_at_max_is_accepted() {
        assert!(validate_ttl_minutes(1440, 1440).is_ok());
    }

    #[test]
    fn ttl_over_max_is_rejected() {
        let err = validate_ttl_minutes(1441, 1440).expect_err("should reject over-max ttl");
        assert_eq!(err.field, "ttlMinutes");
    }

    #[test]
    fn username_pattern_accepts_generated_shape() {
        assert!(validate_username("gk_0123456789ab").is_ok());
    }

    #[test]
    fn username_pattern_rejects_missing_prefix() {
        assert!(validate_username("admin").is_err());
    }

    #[test]
    fn username_pattern_rejects_over_length() {
        let long = format!("gk_{}", "a".repeat(61));
        assert!(validate_username(&long).is_err());
    }

    #[test]
    fn session_id_pattern_accepts_generated_shape() {
        assert!(validate_session_id("ses_0123456789ab").is_ok());
    }

    #[test]
    fn session_id_pattern_rejects_too_short_suffix() {
        assert!(validate_session_id("ses_ab").is_err());
    }

    #[test]
    fn correlation_id_requires_uuid_shape() {
        assert!(validate_correlation_id("c07a0c9b-7f6d-4b8f-8b0c-1d8b9eb9f4f8").is_ok());
        assert!(validate_correlation_id("not-a-uuid").is_err());
    }

    #[test]
    fn reason_accepts_absence_and_short_text() {
        assert!(validate_reason(None).is_ok());
        assert!(validate_reason(Some("debugging a slow query")).is_ok());
    }

    #[test]
    fn reason_rejects_over_256_chars() {
        let long = "a".repeat(257);
        assert!(validate_reason(Some(&long)).is_err());
    }

    #[test]
    fn job_id_rejects_empty_and_over_length() {
        assert!(validate_job_id("").is_err());
        assert!(validate_job_id(&"a".repeat(129)).is_err());
        assert!(validate_job_id("j1").is_ok());
    }
}
