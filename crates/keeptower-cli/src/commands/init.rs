use std::path::PathBuf;

use serde_json::json;

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{write_config, KeepTowerConfig};
use crate::errors::CliError;
use crate::helpers::{policy_from_args, prompt_new_password};
use crate::ui::{hint, print, print_json, receipt, Spinner};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let path = match args.path.as_deref() {
        Some(path) => PathBuf::from(path),
        None => ctx.vault_path()?,
    };
    if path.exists() {
        return Err(CliError::invalid_input(format!(
            "A vault already exists at {}",
            path.display()
        ))
        .into());
    }

    let policy = policy_from_args(&args.policy)?;
    let admin = ctx.username()?;
    let password = prompt_new_password(ctx.interactive(), "Administrator password")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("Failed to create directory {}: {}", parent.display(), e)
        })?;
    }

    let manager = ctx.manager()?;
    {
        let _spinner = Spinner::start(&ui, "Creating vault");
        manager.create(&path, &admin, &password, policy)?;
    }
    manager.close()?;

    let config_path = resolve_config_path()?;
    let wrote_config = !args.no_config && !config_path.exists();
    if wrote_config {
        let config = KeepTowerConfig::new(&path, Some(admin.clone()), ctx.engine_config()?);
        write_config(&config_path, &config)?;
    }

    if ui.mode.is_json() {
        return print_json(&json!({
            "path": path,
            "admin": admin,
            "config": wrote_config.then_some(&config_path),
        }));
    }
    if ctx.quiet() {
        return Ok(());
    }

    let path_str = path.display().to_string();
    let mut items = vec![("Vault", path_str.as_str()), ("Administrator", admin.as_str())];
    let config_str = config_path.display().to_string();
    if wrote_config {
        items.push(("Config", config_str.as_str()));
    }
    print(&ui, &receipt(&ui, "Vault created", &items));
    print(&ui, &hint(&ui, "keeptower users add <name> to invite other users"));
    Ok(())
}
