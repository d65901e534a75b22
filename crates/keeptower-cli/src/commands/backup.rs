use keeptower_core::VaultManager;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::BackupSubcommand;
use crate::errors::CliError;
use crate::ui::{format_bytes, print, print_json, receipt, table};

pub fn handle_backup(ctx: &AppContext, command: &BackupSubcommand) -> anyhow::Result<()> {
    match command {
        BackupSubcommand::List => handle_list(ctx),
        BackupSubcommand::Restore => handle_restore(ctx),
    }
}

fn handle_list(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let path = ctx.vault_path()?;
    let backups = VaultManager::list_backups(&path)?;

    if ui.mode.is_json() {
        return print_json(&json!(backups));
    }
    if backups.is_empty() {
        if !ctx.quiet() {
            print(&ui, &format!("No backups of {}", path.display()));
        }
        return Ok(());
    }

    let columns = ["#", "File", "Size"];
    let rows: Vec<Vec<String>> = backups
        .iter()
        .enumerate()
        .map(|(index, backup)| {
            let size = std::fs::metadata(backup)
                .map(|m| format_bytes(m.len()))
                .unwrap_or_else(|_| "?".to_string());
            vec![
                (index + 1).to_string(),
                backup.display().to_string(),
                size,
            ]
        })
        .collect();
    print(&ui, &table(&ui, &columns, &rows));
    Ok(())
}

fn handle_restore(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let path = ctx.vault_path()?;

    if ctx.interactive() && !ctx.quiet() && !ui.mode.is_json() {
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!("Replace {} with its newest backup?", path.display()))
            .default(false)
            .interact()?;
        if !proceed {
            return Err(CliError::invalid_input("Restore cancelled").into());
        }
    }

    let restored = ctx.manager()?.restore_from_backup(&path)?;

    if ui.mode.is_json() {
        return print_json(&json!({ "vault": path, "restored_from": restored }));
    }
    if !ctx.quiet() {
        let vault = path.display().to_string();
        let source = restored.display().to_string();
        print(
            &ui,
            &receipt(
                &ui,
                "Vault restored",
                &[("Vault", vault.as_str()), ("From", source.as_str())],
            ),
        );
    }
    Ok(())
}
