//! Domain error types for the credential lifecycle core.
//!
//! Errors are layered into a narrow leaf error per component, composed into
//! a top-level [`Error`]. Leaf errors carry structured fields (`code`,
//! `retryable`) rather than an opaque report, since those fields need to
//! cross the orchestrator boundary as machine-readable data a caller can
//! match on.

use thiserror::Error;

/// Result alias for operations that may return the crate's top-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for provider-specific fallible operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Result alias for orchestrator-specific fallible operations.
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

/// Result alias for validation fallible operations.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Top-level error exposed by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A database provider operation failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Orchestrator-level dispatch or validation failed.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
    /// A registry lookup failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Stable machine-readable codes raised by [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorCode {
    /// Operation attempted before `initialize` succeeded.
    NotInitialized,
    /// The requested principal name already exists in the target database.
    UserExists,
    /// The requested role pack is not installed.
    RoleNotFound,
    /// `createEphemeralUser` failed for a reason other than a known conflict.
    UserCreationFailed,
    /// `dropUser` failed.
    UserDropFailed,
    /// `listEphemeralUsers` failed.
    UserListFailed,
    /// `cleanupExpiredUsers` failed.
    CleanupFailed,
    /// The registry has no factory registered for the requested engine tag.
    ProviderNotFound,
    /// Provider initialisation failed (pool creation, probe query, etc.).
    ProviderInitError,
    /// A role-pack install or lookup failed.
    RolePackError,
    /// The operation is not implemented by this provider (stub engines).
    NotImplemented,
}

impl ProviderErrorCode {
    /// Renders the `SCREAMING_SNAKE_CASE` wire code, e.g. `"USER_EXISTS"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::UserExists => "USER_EXISTS",
            Self::RoleNotFound => "ROLE_NOT_FOUND",
            Self::UserCreationFailed => "USER_CREATION_FAILED",
            Self::UserDropFailed => "USER_DROP_FAILED",
            Self::UserListFailed => "USER_LIST_FAILED",
            Self::CleanupFailed => "CLEANUP_FAILED",
            Self::ProviderNotFound => "PROVIDER_NOT_FOUND",
            Self::ProviderInitError => "PROVIDER_INIT_ERROR",
            Self::RolePackError => "ROLE_PACK_ERROR",
            Self::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

/// Error raised by a [`crate::provider::DatabaseProvider`] implementation: a
/// machine-readable `code`, a human `message`, a `retryable` flag, and the
/// `engine` tag of the provider that raised it.
#[derive(Debug, Error)]
#[error("{code:?}: {message} (engine={engine}, retryable={retryable})")]
pub struct ProviderError {
    /// Stable machine-readable failure code.
    pub code: ProviderErrorCode,
    /// Human-readable explanation. Never contains a password or DSN.
    pub message: String,
    /// Whether a caller should retry the operation, optionally with backoff.
    pub retryable: bool,
    /// Engine tag of the provider that raised the error (e.g. `"postgres"`).
    pub engine: &'static str,
}

impl ProviderError {
    /// Builds a new provider error from its constituent fields.
    #[must_use]
    pub fn new(
        code: ProviderErrorCode,
        message: impl Into<String>,
        retryable: bool,
        engine: &'static str,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
            engine,
        }
    }

    /// Convenience constructor for [`ProviderErrorCode::NotInitialized`].
    #[must_use]
    pub fn not_initialized(engine: &'static str) -> Self {
        Self::new(
            ProviderErrorCode::NotInitialized,
            "provider has not completed initialize()",
            false,
            engine,
        )
    }

    /// Convenience constructor for [`ProviderErrorCode::NotImplemented`].
    #[must_use]
    pub fn not_implemented(engine: &'static str) -> Self {
        Self::new(
            ProviderErrorCode::NotImplemented,
            "this provider does not implement the requested operation",
            false,
            engine,
        )
    }
}

/// Stable machine-readable codes raised by the orchestrator, in addition to
/// the [`ProviderErrorCode`]s it forwards unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorErrorCode {
    /// Job payload failed schema or field validation.
    ValidationError,
    /// A revoke job's provider call failed.
    RevocationError,
    /// An uncategorised internal fault.
    InternalError,
}

impl OrchestratorErrorCode {
    /// Renders the `SCREAMING_SNAKE_CASE` wire code, e.g. `"VALIDATION_ERROR"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RevocationError => "REVOCATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Error raised while validating or dispatching a job.
#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct OrchestratorError {
    /// Stable machine-readable failure code.
    pub code: OrchestratorErrorCode,
    /// Human-readable explanation.
    pub message: String,
    /// Whether a caller should retry the job.
    pub retryable: bool,
}

impl OrchestratorError {
    /// Builds a new orchestrator error from its constituent fields.
    #[must_use]
    pub fn new(code: OrchestratorErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }
}

impl From<ValidationError> for OrchestratorError {
    fn from(err: ValidationError) -> Self {
        Self::new(
            OrchestratorErrorCode::ValidationError,
            err.to_string(),
            false,
        )
    }
}

impl From<ProviderError> for OrchestratorError {
    fn from(err: ProviderError) -> Self {
        Self::new(OrchestratorErrorCode::InternalError, err.message, err.retryable)
    }
}

/// Error raised by a field-level validator in [`crate::validation`].
#[derive(Debug, Error)]
#[error("invalid field `{field}`: {reason}")]
pub struct ValidationError {
    /// Name of the offending field, e.g. `"ttlMinutes"`.
    pub field: &'static str,
    /// Human-readable reason the value was rejected.
    pub reason: String,
}

impl ValidationError {
    /// Builds a new validation error for `field` with the given `reason`.
    #[must_use]
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Error raised by [`crate::registry::ProviderRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No factory is registered for the requested engine tag.
    #[error("no provider registered for engine `{0}`")]
    ProviderNotFound(String),
}

impl From<RegistryError> for ProviderError {
    fn from(err: RegistryError) -> Self {
        let RegistryError::ProviderNotFound(engine) = &err;
        let message = err.to_string();
        Self::new(ProviderErrorCode::ProviderNotFound, message, false, intern_engine_tag(engine))
    }
}

/// The registry raises errors before a provider instance exists, so there is
/// no live `&'static str` engine tag to report. Known engine tags are
/// interned here; an unknown tag falls back to `"unknown"` rather than
/// allocating a `'static` string at runtime.
fn intern_engine_tag(engine: &str) -> &'static str {
    match engine {
        "postgres" | "postgresql" => "postgres",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display_omits_no_fields() {
        let err = ProviderError::new(ProviderErrorCode::UserExists, "gk_abc123 exists", false, "postgres");
        let rendered = err.to_string();
        assert!(rendered.contains("UserExists"));
        assert!(rendered.contains("postgres"));
    }

    #[test]
    fn validation_error_becomes_non_retryable_orchestrator_error() {
        let validation = ValidationError::new("ttlMinutes", "must be <= 1440");
        let orchestrator_err: OrchestratorError = validation.into();
        assert_eq!(orchestrator_err.code, OrchestratorErrorCode::ValidationError);
        assert!(!orchestrator_err.retryable);
    }

    #[test]
    fn provider_error_retryability_is_preserved_through_conversion() {
        let provider_err = ProviderError::new(
            ProviderErrorCode::UserCreationFailed,
            "connection reset",
            true,
            "postgres",
        );
        let orchestrator_err: OrchestratorError = provider_err.into();
        assert!(orchestrator_err.retryable);
    }

    #[test]
    fn registry_error_maps_to_provider_not_found() {
        let registry_err = RegistryError::ProviderNotFound("mysql".to_owned());
        let provider_err: ProviderError = registry_err.into();
        assert_eq!(provider_err.code, ProviderErrorCode::ProviderNotFound);
        assert_eq!(provider_err.engine, "unknown");
    }
}
