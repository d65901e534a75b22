//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells)
/// - 3+: Application-specific errors
pub mod exit_codes {
    pub const GENERAL: i32 = 1;

    /// Resource not found (vault file, user, record, backup).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (wrong credentials, second factor).
    pub const AUTH_FAILED: i32 = 5;

    /// The vault file is damaged beyond what FEC can repair.
    pub const INTEGRITY_FAILED: i32 = 6;

    /// The session is not allowed to perform the operation.
    pub const PERMISSION_DENIED: i32 = 7;
}

/// Environment variables read by the CLI.
pub mod env {
    pub const VAULT: &str = "KEEPTOWER_VAULT";
    pub const USER: &str = "KEEPTOWER_USER";
    pub const CONFIG: &str = "KEEPTOWER_CONFIG";

    /// Password of the user opening the vault (or the legacy V1 password).
    pub const PASSWORD: &str = "KEEPTOWER_PASSWORD";

    /// Password being set: initial admin, temporary user password, or new password.
    pub const NEW_PASSWORD: &str = "KEEPTOWER_NEW_PASSWORD";

    /// Secret stored in a new account record.
    pub const RECORD_PASSWORD: &str = "KEEPTOWER_RECORD_PASSWORD";
}

/// File name of the vault inside the XDG data directory.
pub const DEFAULT_VAULT_FILE: &str = "keeptower.vault";

/// Application directory name under the XDG config/data roots.
pub const APP_DIR: &str = "keeptower";
