use keeptower_core::AccountRecord;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::{RecordAddArgs, RecordIdArgs, RecordListArgs, RecordShowArgs, RecordsSubcommand};
use crate::helpers::{prompt_record_password, resolve_record_id};
use crate::ui::theme::{styled, styles};
use crate::ui::{
    format_datetime, header, kv, print, print_json, receipt, short_id, table, truncate, yes_no,
};

pub fn handle_records(ctx: &AppContext, command: &RecordsSubcommand) -> anyhow::Result<()> {
    match command {
        RecordsSubcommand::List(args) => handle_list(ctx, args),
        RecordsSubcommand::Add(args) => handle_add(ctx, args),
        RecordsSubcommand::Show(args) => handle_show(ctx, args),
        RecordsSubcommand::Remove(args) => handle_remove(ctx, args),
    }
}

fn record_json(record: &AccountRecord, reveal: bool) -> serde_json::Value {
    let mut value = json!({
        "id": record.id,
        "account_name": record.account_name,
        "user_name": record.user_name,
        "email": record.email,
        "website": record.website,
        "notes": record.notes,
        "tags": record.tags,
        "is_favorite": record.is_favorite,
        "created_at": record.created_at,
        "modified_at": record.modified_at,
    });
    if reveal {
        value["password"] = json!(record.password);
    }
    value
}

fn handle_list(ctx: &AppContext, args: &RecordListArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let mut records = ctx.with_vault(|vault, _| Ok(vault.records()?))?;
    records.retain(|record| {
        (!args.favorites || record.is_favorite)
            && args
                .tag
                .as_ref()
                .map_or(true, |tag| record.tags.iter().any(|t| t == tag))
    });
    records.sort_by(|a, b| a.account_name.to_lowercase().cmp(&b.account_name.to_lowercase()));

    if ui.mode.is_json() {
        return print_json(&json!(records
            .iter()
            .map(|record| record_json(record, false))
            .collect::<Vec<_>>()));
    }

    let pretty = ui.mode.is_pretty();
    let columns = [
        "ID",
        "Account",
        "Login",
        "Website",
        "Tags",
        "Modified",
    ];
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            vec![
                short_id(&record.id),
                truncate(&record.account_name, 32),
                truncate(&record.user_name, 24),
                truncate(&record.website, 32),
                record.tags.join(","),
                format_datetime(&record.modified_at, pretty),
            ]
        })
        .collect();
    print(&ui, &table(&ui, &columns, &rows));
    Ok(())
}

fn handle_add(ctx: &AppContext, args: &RecordAddArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let secret = prompt_record_password(ctx.interactive())?;

    let mut record = AccountRecord::new(args.name.trim());
    record.user_name = args.login.clone().unwrap_or_default();
    record.email = args.email.clone().unwrap_or_default();
    record.website = args.website.clone().unwrap_or_default();
    record.notes = args.notes.clone().unwrap_or_default();
    record.tags = args.tag.clone();
    record.is_favorite = args.favorite;
    record.password = secret.to_string();

    let id = ctx.with_vault(move |vault, _| Ok(vault.add_record(record)?))?;

    if ui.mode.is_json() {
        return print_json(&json!({ "id": id, "account_name": args.name }));
    }
    if ctx.quiet() {
        println!("{}", id);
        return Ok(());
    }
    let id = id.to_string();
    print(
        &ui,
        &receipt(
            &ui,
            "Record added",
            &[("ID", id.as_str()), ("Account", args.name.as_str())],
        ),
    );
    Ok(())
}

fn handle_show(ctx: &AppContext, args: &RecordShowArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let record = ctx.with_vault(|vault, _| {
        let ids: Vec<_> = vault.records()?.iter().map(|r| r.id).collect();
        let id = resolve_record_id(&args.id, &ids)?;
        Ok(vault.record(&id)?)
    })?;

    if ui.mode.is_json() {
        return print_json(&record_json(&record, args.reveal));
    }

    let pretty = ui.mode.is_pretty();
    print(&ui, &header(&ui, "record", None));
    print(&ui, &kv(&ui, "ID", &record.id.to_string()));
    print(&ui, &kv(&ui, "Account", &record.account_name));
    for (label, value) in [
        ("Login", &record.user_name),
        ("Email", &record.email),
        ("Website", &record.website),
    ] {
        if !value.is_empty() {
            print(&ui, &kv(&ui, label, value));
        }
    }
    let password = if args.reveal {
        styled(&record.password, styles::warn(), ui.color)
    } else if record.password.is_empty() {
        String::new()
    } else {
        "********".to_string()
    };
    print(&ui, &kv(&ui, "Password", &password));
    if !record.tags.is_empty() {
        print(&ui, &kv(&ui, "Tags", &record.tags.join(", ")));
    }
    print(&ui, &kv(&ui, "Favorite", yes_no(record.is_favorite)));
    print(&ui, &kv(&ui, "Modified", &format_datetime(&record.modified_at, pretty)));
    if !record.notes.is_empty() {
        print(&ui, &kv(&ui, "Notes", &record.notes));
    }
    Ok(())
}

fn handle_remove(ctx: &AppContext, args: &RecordIdArgs) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let removed = ctx.with_vault(|vault, _| {
        let ids: Vec<_> = vault.records()?.iter().map(|r| r.id).collect();
        let id = resolve_record_id(&args.id, &ids)?;
        Ok(vault.remove_record(&id)?)
    })?;

    if ui.mode.is_json() {
        return print_json(&json!({ "removed": removed.id }));
    }
    if !ctx.quiet() {
        let id = removed.id.to_string();
        print(
            &ui,
            &receipt(
                &ui,
                "Record removed",
                &[("ID", id.as_str()), ("Account", removed.account_name.as_str())],
            ),
        );
    }
    Ok(())
}
