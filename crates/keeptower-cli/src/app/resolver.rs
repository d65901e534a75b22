//! Path resolution for config and vault files.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{default_config_path, default_vault_path, KeepTowerConfig};
use crate::constants::env;

/// Resolve the config file path, checking `KEEPTOWER_CONFIG` first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(env::CONFIG) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Resolve the vault path: `--vault`/`KEEPTOWER_VAULT`, then config, then the XDG default.
pub fn resolve_vault_path(cli: &Cli, config: Option<&KeepTowerConfig>) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.vault.as_deref().filter(|p| !p.trim().is_empty()) {
        return Ok(PathBuf::from(path));
    }
    if let Some(config) = config {
        return Ok(PathBuf::from(&config.vault.path));
    }
    default_vault_path()
}

/// Error message when the vault file is missing.
pub fn missing_vault_message(path: &Path) -> String {
    format!("No vault found at {}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use keeptower_core::VaultConfig;

    #[test]
    fn test_flag_wins_over_config() {
        let cli = Cli::parse_from(["keeptower", "--vault", "/flag.vault", "info"]);
        let config = KeepTowerConfig::new(Path::new("/config.vault"), None, VaultConfig::default());
        assert_eq!(
            resolve_vault_path(&cli, Some(&config)).unwrap(),
            PathBuf::from("/flag.vault")
        );
    }

    #[test]
    fn test_config_used_without_flag() {
        let mut cli = Cli::parse_from(["keeptower", "info"]);
        cli.vault = None;
        let config = KeepTowerConfig::new(Path::new("/config.vault"), None, VaultConfig::default());
        assert_eq!(
            resolve_vault_path(&cli, Some(&config)).unwrap(),
            PathBuf::from("/config.vault")
        );
    }
}
