use keeptower_core::{MigrationStatus, UserInfo, UserRole};
use serde_json::json;

use crate::app::AppContext;
use crate::cli::{UserAddArgs, UserTargetArgs, UsersSubcommand};
use crate::errors::CliError;
use crate::helpers::prompt_new_password;
use crate::ui::{format_timestamp, print, print_json, receipt, table, yes_no};

pub fn handle_users(ctx: &AppContext, command: &UsersSubcommand) -> anyhow::Result<()> {
    match command {
        UsersSubcommand::List => handle_list(ctx),
        UsersSubcommand::Add(args) => handle_add(ctx, args),
        UsersSubcommand::Remove(args) => handle_remove(ctx, args),
        UsersSubcommand::ResetPassword(args) => handle_reset_password(ctx, args),
    }
}

fn migration_label(status: MigrationStatus) -> &'static str {
    match status {
        MigrationStatus::NotMigrated => "-",
        MigrationStatus::Pending => "pending",
        MigrationStatus::Migrated => "migrated",
    }
}

fn user_json(user: &UserInfo) -> serde_json::Value {
    json!({
        "slot": user.slot_index,
        "username": user.username,
        "role": user.role,
        "must_change_password": user.must_change_password,
        "password_changed_at": user.password_changed_at,
        "last_login_at": user.last_login_at,
        "username_hash_algorithm": user.username_hash_algorithm.to_string(),
        "kek_algorithm": user.kek_algorithm.to_string(),
        "migration_status": user.migration_status,
        "second_factor_enrolled": user.second_factor_enrolled,
    })
}

fn handle_list(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let users = ctx.with_vault(|vault, _| Ok(vault.list_users()?))?;

    if ui.mode.is_json() {
        return print_json(&json!(users.iter().map(user_json).collect::<Vec<_>>()));
    }

    let pretty = ui.mode.is_pretty();
    let columns = [
        "Slot",
        "Username",
        "Role",
        "Must change",
        "Last login",
        "Stored as",
        "Migration",
    ];
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|user| {
            vec![
                user.slot_index.to_string(),
                user.username.clone().unwrap_or_else(|| "(hashed)".to_string()),
                user.role.to_string(),
                yes_no(user.must_change_password).to_string(),
                format_timestamp(user.last_login_at, pretty),
                user.username_hash_algorithm.to_string(),
                migration_label(user.migration_status).to_string(),
            ]
        })
        .collect();
    print(&ui, &table(&ui, &columns, &rows));
    Ok(())
}

fn handle_add(ctx: &AppContext, args: &UserAddArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let role = if args.admin {
        UserRole::Administrator
    } else {
        UserRole::Standard
    };
    ctx.with_vault(|vault, _| {
        let temporary = prompt_new_password(
            ctx.interactive(),
            &format!("Temporary password for {}", args.username),
        )?;
        vault.add_user(&args.username, &temporary, role)?;
        Ok(())
    })?;

    if ui.mode.is_json() {
        return print_json(&json!({
            "username": args.username,
            "role": role,
            "must_change_password": true,
        }));
    }
    if !ctx.quiet() {
        let role = role.to_string();
        print(
            &ui,
            &receipt(
                &ui,
                "User added",
                &[
                    ("Username", args.username.as_str()),
                    ("Role", role.as_str()),
                    ("Must change password", "yes"),
                ],
            ),
        );
    }
    Ok(())
}

fn confirm(ctx: &AppContext, prompt: &str) -> anyhow::Result<()> {
    if ctx.interactive() && !ctx.quiet() && !ctx.cli().json {
        let proceed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        if !proceed {
            return Err(CliError::invalid_input("Cancelled").into());
        }
    }
    Ok(())
}

fn handle_remove(ctx: &AppContext, args: &UserTargetArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    ctx.with_vault(|vault, _| {
        confirm(ctx, &format!("Remove user {}?", args.username))?;
        vault.remove_user(&args.username)?;
        Ok(())
    })?;

    if ui.mode.is_json() {
        return print_json(&json!({ "removed": args.username }));
    }
    if !ctx.quiet() {
        print(
            &ui,
            &receipt(&ui, "User removed", &[("Username", args.username.as_str())]),
        );
    }
    Ok(())
}

fn handle_reset_password(ctx: &AppContext, args: &UserTargetArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    ctx.with_vault(|vault, _| {
        let temporary = prompt_new_password(
            ctx.interactive(),
            &format!("Temporary password for {}", args.username),
        )?;
        vault.admin_reset_password(&args.username, &temporary)?;
        Ok(())
    })?;

    if ui.mode.is_json() {
        return print_json(&json!({
            "username": args.username,
            "must_change_password": true,
        }));
    }
    if !ctx.quiet() {
        print(
            &ui,
            &receipt(
                &ui,
                "Password reset",
                &[
                    ("Username", args.username.as_str()),
                    ("Must change password", "yes"),
                ],
            ),
        );
    }
    Ok(())
}
