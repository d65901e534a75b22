use keeptower_core::{VaultInfo, VaultManager};
use serde_json::json;

use crate::app::AppContext;
use crate::ui::{format_bytes, header, hint, kv, print, print_json, CheckReport, Outcome, UiContext};

fn redundancy(value: Option<u8>) -> String {
    value
        .map(|r| format!("{}%", r))
        .unwrap_or_else(|| "off".to_string())
}

fn info_json(info: &VaultInfo) -> serde_json::Value {
    let policy = info.security_policy.as_ref().map(|p| {
        json!({
            "min_password_length": p.min_password_length,
            "username_hash_algorithm": p.username_hash_algorithm.to_string(),
            "kek_algorithm": p.kek_algorithm.to_string(),
            "argon2_memory_kib": p.argon2_memory_kib,
            "argon2_iterations": p.argon2_iterations,
            "argon2_parallelism": p.argon2_parallelism,
            "username_migration_active": p.migration_active(),
        })
    });
    json!({
        "version": info.version,
        "file_size": info.file_size,
        "kdf_iterations": info.kdf_iterations,
        "header_redundancy": info.header_redundancy,
        "payload_redundancy": info.payload_redundancy,
        "slot_count": info.slot_count,
        "active_slots": info.active_slots,
        "second_factor_required": info.second_factor_required,
        "security_policy": policy,
    })
}

fn print_info(ui: &UiContext, info: &VaultInfo) {
    print(ui, &kv(ui, "Format version", &info.version.to_string()));
    print(ui, &kv(ui, "File size", &format_bytes(info.file_size)));
    print(ui, &kv(ui, "KDF iterations", &info.kdf_iterations.to_string()));
    print(ui, &kv(ui, "Header FEC", &redundancy(info.header_redundancy)));
    print(ui, &kv(ui, "Payload FEC", &redundancy(info.payload_redundancy)));
    print(
        ui,
        &kv(
            ui,
            "Users",
            &format!("{} active / {} slots", info.active_slots, info.slot_count),
        ),
    );
    print(
        ui,
        &kv(
            ui,
            "Second factor",
            if info.second_factor_required {
                "required"
            } else {
                "optional"
            },
        ),
    );
    if let Some(policy) = &info.security_policy {
        print(ui, &kv(ui, "Username storage", &policy.username_hash_algorithm.to_string()));
        print(ui, &kv(ui, "Key derivation", &policy.kek_algorithm.to_string()));
    }
    if info.version == 1 {
        print(ui, &hint(ui, "keeptower upgrade converts this legacy vault"));
    }
}

pub fn handle_info(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let path = ctx.existing_vault_path()?;
    let info = VaultManager::inspect(&path)?;

    if ui.mode.is_json() {
        return print_json(&info_json(&info));
    }
    print(&ui, &header(&ui, "info", Some(&path.display().to_string())));
    print_info(&ui, &info);
    Ok(())
}

pub fn handle_check(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let path = ctx.existing_vault_path()?;
    if !ctx.quiet() {
        print(&ui, &header(&ui, "check", Some(&path.display().to_string())));
    }

    let mut report = CheckReport::new(&ui);
    let info = VaultManager::inspect(&path)
        .inspect_err(|_| report.record("Header", Outcome::Fail))?;
    report.record("Header", Outcome::Pass);

    // `None` when the session may not read records yet
    let records = ctx
        .with_vault(|vault, session| {
            if session.must_change_password {
                Ok(None)
            } else {
                Ok(Some(vault.records()?.len()))
            }
        })
        .inspect_err(|_| report.record("Unlock", Outcome::Fail))?;
    report.record("Unlock", Outcome::Pass);
    report.record(
        "Records",
        if records.is_some() {
            Outcome::Pass
        } else {
            Outcome::Warn
        },
    );

    if ui.mode.is_json() {
        return print_json(&json!({
            "status": report.status().label(),
            "version": info.version,
            "records": records,
        }));
    }
    if records.is_none() {
        print(&ui, &hint(&ui, "keeptower passwd is required before records can be read"));
    } else if !ctx.quiet() {
        print(&ui, "Integrity check: OK");
    }
    Ok(())
}
