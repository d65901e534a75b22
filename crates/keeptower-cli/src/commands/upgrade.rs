use keeptower_core::vault::v1_backup_path;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::UpgradeArgs;
use crate::helpers::{policy_from_args, prompt_new_password, prompt_password};
use crate::ui::{hint, print, print_json, receipt, Spinner};

/// Convert a V1 vault in place, keeping the original as `<file>.v1.backup`.
pub fn handle_upgrade(ctx: &AppContext, args: &UpgradeArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let path = ctx.existing_vault_path()?;
    let policy = policy_from_args(&args.policy)?;
    let admin = match args.admin.as_deref() {
        Some(admin) => admin.to_string(),
        None => ctx.username()?,
    };

    let legacy_password = prompt_password(ctx.interactive(), "Current vault password")?;
    let admin_password = prompt_new_password(
        ctx.interactive(),
        &format!("New password for {}", admin),
    )?;

    let manager = ctx.manager()?;
    {
        let _spinner = Spinner::start(&ui, "Upgrading vault");
        manager.migrate_v1_to_v2(&path, &legacy_password, &admin, &admin_password, policy)?;
    }
    let records = manager.records().map(|records| records.len());
    manager.close()?;
    let records = records?;

    let backup = v1_backup_path(&path);
    if ui.mode.is_json() {
        return print_json(&json!({
            "path": path,
            "admin": admin,
            "records": records,
            "backup": backup,
        }));
    }
    if !ctx.quiet() {
        let vault = path.display().to_string();
        let backup = backup.display().to_string();
        let records = records.to_string();
        print(
            &ui,
            &receipt(
                &ui,
                "Vault upgraded",
                &[
                    ("Vault", vault.as_str()),
                    ("Administrator", admin.as_str()),
                    ("Records", records.as_str()),
                    ("Legacy copy", backup.as_str()),
                ],
            ),
        );
        print(&ui, &hint(&ui, "log in with the new administrator from now on"));
    }
    Ok(())
}
