//! Line, block and table rendering for the three output modes.
//!
//! Plain mode is a stable contract for scripts: `key=value` lines with
//! snake_case keys, and tab-separated rows without a header.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{ASCII_MARKDOWN, UTF8_FULL};
use comfy_table::{ContentArrangement, Table};

use super::context::{OutputMode, UiContext};
use super::theme::{styled, styles, Badge};

const MAX_HEADER_PATH: usize = 50;

fn plain_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

/// Keep the tail of a long path, where the file name lives.
fn shorten_path(path: &str, max: usize) -> String {
    let len = path.chars().count();
    if len <= max {
        return path.to_string();
    }
    let tail: String = path.chars().skip(len - (max - 3)).collect();
    format!("...{}", tail)
}

/// "KeepTower · command" plus the vault path, or "keeptower command".
pub fn header(ctx: &UiContext, command: &str, path: Option<&str>) -> String {
    match ctx.mode {
        OutputMode::Json => String::new(),
        OutputMode::Plain => format!("keeptower {}", command),
        OutputMode::Pretty => {
            let title = format!(
                "{} \u{00B7} {}",
                styled("KeepTower", styles::bold(), ctx.color),
                command
            );
            match path {
                Some(path) => format!(
                    "{}\n{}",
                    title,
                    kv(ctx, "Vault", &shorten_path(path, MAX_HEADER_PATH))
                ),
                None => title,
            }
        }
    }
}

pub fn badge(ctx: &UiContext, kind: Badge, message: &str) -> String {
    let mark = styled(kind.display(ctx.unicode), kind.style(), ctx.color);
    match message {
        "" => mark,
        message => format!("{} {}", mark, message),
    }
}

pub fn kv(ctx: &UiContext, key: &str, value: &str) -> String {
    if ctx.mode.is_pretty() {
        format!("{} {}", styled(&format!("{}:", key), styles::dim(), ctx.color), value)
    } else {
        format!("{}={}", plain_key(key), value)
    }
}

pub fn hint(ctx: &UiContext, text: &str) -> String {
    kv(ctx, "Hint", text)
}

/// Summary printed after a change: an OK badge and the affected values.
pub fn receipt(ctx: &UiContext, title: &str, items: &[(&str, &str)]) -> String {
    let (first, indent) = if ctx.mode.is_pretty() {
        (badge(ctx, Badge::Ok, title), "  ")
    } else {
        ("status=ok".to_string(), "")
    };
    std::iter::once(first)
        .chain(
            items
                .iter()
                .map(|(key, value)| format!("{}{}", indent, kv(ctx, key, value))),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn table(ctx: &UiContext, headers: &[&str], rows: &[Vec<String>]) -> String {
    if !ctx.mode.is_pretty() {
        return rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let mut table = Table::new();
    if ctx.unicode {
        table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    } else {
        table.load_preset(ASCII_MARKDOWN);
    }
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(u16::try_from(ctx.width).unwrap_or(u16::MAX))
        .set_header(headers.to_vec());
    for row in rows {
        table.add_row(row);
    }
    table.to_string()
}

/// Print to stdout; JSON mode prints only documents via [`print_json`].
pub fn print(ctx: &UiContext, message: &str) {
    if !ctx.mode.is_json() && !message.is_empty() {
        println!("{}", message);
    }
}

pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// An error line and optional hint; JSON mode falls back to plain lines.
pub fn error_message(ctx: &UiContext, message: &str, error_hint: Option<&str>) -> String {
    let first = if ctx.mode.is_pretty() {
        badge(ctx, Badge::Err, message)
    } else {
        format!("error={}", message)
    };
    match error_hint.map(|h| h.trim_start_matches("Hint: ")) {
        Some(h) if ctx.mode.is_pretty() => format!("{}\n{}", first, hint(ctx, h)),
        Some(h) => format!("{}\nhint={}", first, h),
        None => first,
    }
}

pub fn print_error(ctx: &UiContext, message: &str, error_hint: Option<&str>) {
    eprintln!("{}", error_message(ctx, message, error_hint));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(mode: OutputMode) -> UiContext {
        UiContext {
            is_tty: mode.is_pretty(),
            color: false,
            unicode: true,
            width: 80,
            mode,
        }
    }

    #[test]
    fn test_header_per_mode() {
        assert_eq!(header(&ctx(OutputMode::Plain), "info", None), "keeptower info");
        assert!(header(&ctx(OutputMode::Json), "info", Some("/tmp/v")).is_empty());
        assert_eq!(
            header(&ctx(OutputMode::Pretty), "check", Some("/tmp/team.vault")),
            "KeepTower \u{00B7} check\nVault: /tmp/team.vault"
        );
    }

    #[test]
    fn test_shorten_path_keeps_file_name() {
        let long = "/srv/shared/keeptower/departments/finance/reconciliation/team.vault";
        let short = shorten_path(long, MAX_HEADER_PATH);
        assert_eq!(short.chars().count(), MAX_HEADER_PATH);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("/team.vault"));
        assert_eq!(shorten_path("/tmp/a.vault", MAX_HEADER_PATH), "/tmp/a.vault");
    }

    #[test]
    fn test_kv_and_hint() {
        assert_eq!(kv(&ctx(OutputMode::Plain), "KDF iterations", "1000"), "kdf_iterations=1000");
        assert_eq!(kv(&ctx(OutputMode::Pretty), "Role", "administrator"), "Role: administrator");
        assert_eq!(hint(&ctx(OutputMode::Plain), "run passwd"), "hint=run passwd");
    }

    #[test]
    fn test_receipt() {
        let items = [("Username", "bob"), ("Role", "standard")];
        assert_eq!(
            receipt(&ctx(OutputMode::Plain), "User added", &items),
            "status=ok\nusername=bob\nrole=standard"
        );
        let pretty = receipt(&ctx(OutputMode::Pretty), "User added", &items);
        assert!(pretty.starts_with("[\u{2713}] User added"));
        assert!(pretty.contains("\n  Username: bob"));
    }

    #[test]
    fn test_table_plain_rows() {
        let rows = vec![
            vec!["7a2e3c0b".to_string(), "Mail".to_string()],
            vec!["9b3f4d1c".to_string(), "Bank login".to_string()],
        ];
        assert_eq!(
            table(&ctx(OutputMode::Plain), &["ID", "Account"], &rows),
            "7a2e3c0b\tMail\n9b3f4d1c\tBank login"
        );
        let pretty = table(&ctx(OutputMode::Pretty), &["ID", "Account"], &rows);
        assert!(pretty.contains("Account"));
        assert!(pretty.contains("Bank login"));
    }

    #[test]
    fn test_error_message() {
        let plain = error_message(&ctx(OutputMode::Json), "Authentication failed", Some("Hint: Check it"));
        assert_eq!(plain, "error=Authentication failed\nhint=Check it");

        let pretty = error_message(&ctx(OutputMode::Pretty), "Authentication failed", None);
        assert_eq!(pretty, "[\u{2717}] Authentication failed");
    }
}
