//! CLI error types for structured error handling.
//!
//! Typed errors map to specific exit codes so scripts can react to a wrong
//! password differently from a damaged file.

use std::fmt;

use keeptower_core::VaultError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (vault, user, record, backup)
    NotFound { message: String, hint: String },

    /// Authentication failed (wrong credentials, missing second factor)
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Invalid user input
    InvalidInput(String),

    /// The session may not do this
    Denied {
        message: String,
        hint: Option<String>,
    },

    /// Unrecoverable on-disk damage
    IntegrityFailed { message: String, hint: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an AuthFailed error with message and optional hint.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: None,
        }
    }

    /// Create an AuthFailed error with message and hint.
    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    pub fn denied(message: impl Into<String>, hint: Option<&str>) -> Self {
        CliError::Denied {
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CliError::NotFound { message, .. }
            | CliError::AuthFailed { message, .. }
            | CliError::Denied { message, .. }
            | CliError::IntegrityFailed { message, .. } => message,
            CliError::InvalidInput(message) => message,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            CliError::NotFound { hint, .. } | CliError::IntegrityFailed { hint, .. } => Some(hint),
            CliError::AuthFailed { hint, .. } | CliError::Denied { hint, .. } => hint.as_deref(),
            CliError::InvalidInput(_) => None,
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::Denied { .. } => exit_codes::PERMISSION_DENIED,
            CliError::IntegrityFailed { .. } => exit_codes::INTEGRITY_FAILED,
        }
    }
}

impl From<&VaultError> for CliError {
    fn from(err: &VaultError) -> Self {
        let message = err.to_string();
        if err.is_corruption() {
            return CliError::IntegrityFailed {
                message,
                hint: "Hint: Restore the newest backup with `keeptower backup restore`.".into(),
            };
        }
        match err {
            VaultError::FileNotFound(_) => CliError::not_found(
                message,
                "Hint: Run `keeptower init` or pass --vault <PATH>.",
            ),
            VaultError::UserNotFound => CliError::not_found(
                message,
                "Hint: Run `keeptower users list` to see active accounts.",
            ),
            VaultError::RecordNotFound(_) => CliError::not_found(
                message,
                "Hint: Run `keeptower records list` to find record IDs.",
            ),
            VaultError::AuthenticationFailed => CliError::auth_failed_with_hint(
                message,
                "Hint: Check the username and password. Set KEEPTOWER_USER and KEEPTOWER_PASSWORD for scripted use.",
            ),
            VaultError::SecondFactorUnavailable | VaultError::SecondFactorFailed(_) => {
                CliError::auth_failed(message)
            }
            VaultError::PasswordChangeRequired => CliError::denied(
                message,
                Some("Hint: Run `keeptower passwd` to set a new password."),
            ),
            VaultError::PermissionDenied(_)
            | VaultError::FilePermissionDenied(_)
            | VaultError::SelfRemovalNotAllowed
            | VaultError::LastAdministrator => CliError::denied(message, None),
            VaultError::UnsupportedVersion(1) => CliError::InvalidInput(format!(
                "{}\nHint: Run `keeptower upgrade` to convert a legacy vault.",
                message
            )),
            _ => CliError::InvalidInput(message),
        }
    }
}

/// Classify an error returned by a handler.
///
/// Returns the message, optional hint and exit code. Errors that are
/// neither [`CliError`] nor [`VaultError`] exit with the general code.
pub fn classify(err: &anyhow::Error) -> (String, Option<String>, i32) {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return describe(cli_err);
    }
    if let Some(vault_err) = err.downcast_ref::<VaultError>() {
        return describe(&CliError::from(vault_err));
    }
    (format!("{:#}", err), None, exit_codes::GENERAL)
}

fn describe(err: &CliError) -> (String, Option<String>, i32) {
    (
        err.message().to_string(),
        err.hint().map(str::to_string),
        err.exit_code(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_error_exit_codes() {
        let cases = [
            (VaultError::AuthenticationFailed, exit_codes::AUTH_FAILED),
            (VaultError::FileNotFound("x".into()), exit_codes::NOT_FOUND),
            (VaultError::UserNotFound, exit_codes::NOT_FOUND),
            (VaultError::WeakPassword("short".into()), exit_codes::INVALID_INPUT),
            (VaultError::LastAdministrator, exit_codes::PERMISSION_DENIED),
            (VaultError::PasswordChangeRequired, exit_codes::PERMISSION_DENIED),
            (
                VaultError::FecDecodingFailed("header".into()),
                exit_codes::INTEGRITY_FAILED,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(CliError::from(&err).exit_code(), code, "{:?}", err);
        }
    }

    #[test]
    fn test_classify_sees_through_context() {
        let err = anyhow::Error::new(VaultError::AuthenticationFailed).context("opening vault");
        let (_, hint, code) = classify(&err);
        assert_eq!(code, exit_codes::AUTH_FAILED);
        assert!(hint.unwrap().contains("KEEPTOWER_PASSWORD"));
    }

    #[test]
    fn test_classify_plain_anyhow() {
        let (message, hint, code) = classify(&anyhow::anyhow!("boom"));
        assert_eq!(message, "boom");
        assert!(hint.is_none());
        assert_eq!(code, exit_codes::GENERAL);
    }

    #[test]
    fn test_password_change_hint() {
        let err = CliError::from(&VaultError::PasswordChangeRequired);
        assert!(err.hint().unwrap().contains("keeptower passwd"));
    }
}
