use keeptower_core::VaultSecurityPolicy;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::{MigrateUsernamesArgs, PolicySetArgs, PolicySubcommand};
use crate::errors::CliError;
use crate::helpers::{parse_kek, parse_username_hash};
use crate::ui::{format_timestamp, header, kv, print, print_json, receipt, yes_no, UiContext};

pub fn handle_policy(ctx: &AppContext, command: &PolicySubcommand) -> anyhow::Result<()> {
    match command {
        PolicySubcommand::Show => handle_show(ctx),
        PolicySubcommand::Set(args) => handle_set(ctx, args),
        PolicySubcommand::MigrateUsernames(args) => handle_migrate_usernames(ctx, args),
    }
}

fn policy_json(policy: &VaultSecurityPolicy) -> serde_json::Value {
    json!({
        "require_second_factor": policy.require_second_factor,
        "second_factor_algorithm": policy.second_factor_algorithm,
        "min_password_length": policy.min_password_length,
        "kdf_iterations": policy.kdf_iterations,
        "kek_algorithm": policy.kek_algorithm.to_string(),
        "username_hash_algorithm": policy.username_hash_algorithm.to_string(),
        "argon2_memory_kib": policy.argon2_memory_kib,
        "argon2_iterations": policy.argon2_iterations,
        "argon2_parallelism": policy.argon2_parallelism,
        "migration": {
            "active": policy.migration_active(),
            "from": policy.previous_username_hash_algorithm.to_string(),
            "started_at": policy.migration_started_at,
        },
    })
}

fn print_policy(ui: &UiContext, policy: &VaultSecurityPolicy) {
    let pretty = ui.mode.is_pretty();
    print(ui, &kv(ui, "Second factor required", yes_no(policy.require_second_factor)));
    print(ui, &kv(ui, "Min password length", &policy.min_password_length.to_string()));
    print(ui, &kv(ui, "KDF iterations", &policy.kdf_iterations.to_string()));
    print(ui, &kv(ui, "Key derivation", &policy.kek_algorithm.to_string()));
    print(ui, &kv(ui, "Username storage", &policy.username_hash_algorithm.to_string()));
    print(
        ui,
        &kv(
            ui,
            "Argon2",
            &format!(
                "{} KiB, {} passes, {} lanes",
                policy.argon2_memory_kib, policy.argon2_iterations, policy.argon2_parallelism
            ),
        ),
    );
    if policy.migration_active() {
        print(
            ui,
            &kv(
                ui,
                "Username migration",
                &format!(
                    "{} -> {} since {}",
                    policy.previous_username_hash_algorithm,
                    policy.username_hash_algorithm,
                    format_timestamp(policy.migration_started_at, pretty)
                ),
            ),
        );
    }
}

fn handle_show(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let policy = ctx.with_vault(|vault, _| Ok(vault.security_policy()?))?;
    if ui.mode.is_json() {
        return print_json(&policy_json(&policy));
    }
    print(&ui, &header(&ui, "policy", None));
    print_policy(&ui, &policy);
    Ok(())
}

fn handle_set(ctx: &AppContext, args: &PolicySetArgs) -> anyhow::Result<()> {
    if args.min_password_length.is_none() && args.kek.is_none() {
        return Err(CliError::invalid_input(
            "Nothing to change (use --min-password-length or --kek)",
        )
        .into());
    }
    let kek = args.kek.as_deref().map(parse_kek).transpose()?;

    let ui = ctx.ui();
    let policy = ctx.with_vault(|vault, _| {
        let mut policy = vault.security_policy()?;
        if let Some(length) = args.min_password_length {
            policy.min_password_length = length;
        }
        if let Some(kek) = kek {
            policy.kek_algorithm = kek;
        }
        vault.update_security_policy(policy)?;
        Ok(vault.security_policy()?)
    })?;

    if ui.mode.is_json() {
        return print_json(&policy_json(&policy));
    }
    if !ctx.quiet() {
        let length = policy.min_password_length.to_string();
        let kek = policy.kek_algorithm.to_string();
        print(
            &ui,
            &receipt(
                &ui,
                "Policy updated",
                &[("Min password length", length.as_str()), ("Key derivation", kek.as_str())],
            ),
        );
    }
    Ok(())
}

fn handle_migrate_usernames(ctx: &AppContext, args: &MigrateUsernamesArgs) -> anyhow::Result<()> {
    let algorithm = parse_username_hash(&args.algorithm)?;
    let ui = ctx.ui();
    let policy = ctx.with_vault(|vault, _| {
        vault.enable_username_hash_migration(algorithm)?;
        // the session user is already authenticated, so move their slot now
        vault.migrate_own_username()?;
        Ok(vault.security_policy()?)
    })?;

    if ui.mode.is_json() {
        return print_json(&policy_json(&policy));
    }
    if !ctx.quiet() {
        let from = policy.previous_username_hash_algorithm.to_string();
        let to = policy.username_hash_algorithm.to_string();
        let state = if policy.migration_active() {
            "in progress"
        } else {
            "complete"
        };
        print(
            &ui,
            &receipt(
                &ui,
                "Username migration enabled",
                &[("From", from.as_str()), ("To", to.as_str()), ("Status", state)],
            ),
        );
    }
    Ok(())
}
