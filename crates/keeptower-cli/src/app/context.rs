//! Application context for the KeepTower CLI.
//!
//! Bundles the parsed arguments with the lazily loaded config file and
//! owns the open -> operate -> close cycle every vault command follows.

use std::io::IsTerminal;
use std::path::PathBuf;

use keeptower_core::{Session, VaultConfig, VaultManager};
use once_cell::unsync::OnceCell;
use tracing::warn;

use crate::cli::Cli;
use crate::config::{read_config, KeepTowerConfig};
use crate::errors::CliError;
use crate::helpers::{prompt_password, prompt_username};
use crate::ui::{Spinner, UiContext};

use super::resolver::{missing_vault_message, resolve_config_path, resolve_vault_path};

pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<Option<KeepTowerConfig>>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
        }
    }

    pub fn cli(&self) -> &Cli {
        self.cli
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Whether secrets may be prompted for.
    pub fn interactive(&self) -> bool {
        !self.cli.no_input && std::io::stdin().is_terminal()
    }

    pub fn ui(&self) -> UiContext {
        UiContext::from_env(self.cli.json, self.cli.no_color, self.cli.ascii)
    }

    /// The config file, loaded on first use; `None` when it does not exist.
    pub fn config(&self) -> anyhow::Result<Option<&KeepTowerConfig>> {
        let config = self.config.get_or_try_init(|| {
            let path = resolve_config_path()?;
            if path.exists() {
                read_config(&path).map(Some)
            } else {
                Ok(None)
            }
        })?;
        Ok(config.as_ref())
    }

    pub fn engine_config(&self) -> anyhow::Result<VaultConfig> {
        Ok(self
            .config()?
            .map(|config| config.engine.clone())
            .unwrap_or_default())
    }

    pub fn vault_path(&self) -> anyhow::Result<PathBuf> {
        resolve_vault_path(self.cli, self.config()?)
    }

    /// Vault path that must already exist.
    pub fn existing_vault_path(&self) -> anyhow::Result<PathBuf> {
        let path = self.vault_path()?;
        if !path.exists() {
            return Err(CliError::not_found(
                missing_vault_message(&path),
                "Hint: Run `keeptower init` or pass --vault <PATH>.",
            )
            .into());
        }
        Ok(path)
    }

    /// Username from `--user`/`KEEPTOWER_USER`, the config default, or a prompt.
    pub fn username(&self) -> anyhow::Result<String> {
        if let Some(user) = self.cli.user.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(user.to_string());
        }
        if let Some(user) = self
            .config()?
            .and_then(|config| config.vault.default_user.clone())
        {
            return Ok(user);
        }
        prompt_username(self.interactive())
    }

    pub fn manager(&self) -> anyhow::Result<VaultManager> {
        Ok(VaultManager::new(self.engine_config()?))
    }

    /// Authenticate, run `op` against the open vault, then save and close.
    pub fn with_vault<T>(
        &self,
        op: impl FnOnce(&VaultManager, &Session) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        self.with_vault_password(|manager, session, _| op(manager, session))
    }

    /// Like [`with_vault`](Self::with_vault), also handing `op` the password
    /// the vault was unlocked with.
    ///
    /// The vault is closed even when `op` fails; a close failure after a
    /// failed `op` is logged and the original error returned.
    pub fn with_vault_password<T>(
        &self,
        op: impl FnOnce(&VaultManager, &Session, &str) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let path = self.existing_vault_path()?;
        let username = self.username()?;
        let password = prompt_password(self.interactive(), &format!("Password for {}", username))?;
        let manager = self.manager()?;

        let session = {
            let _spinner = Spinner::start(&self.ui(), "Unlocking vault");
            manager.open(&path, &username, &password)?
        };

        match op(&manager, &session, &password) {
            Ok(value) => {
                manager.close()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(close_err) = manager.close() {
                    warn!(error = %close_err, "closing vault after a failed command");
                }
                Err(err)
            }
        }
    }
}
