use serde_json::json;

use crate::app::AppContext;
use crate::helpers::prompt_new_password;
use crate::ui::{print, print_json, receipt};

/// Change the session user's own password, clearing a must-change flag.
pub fn handle_passwd(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui();
    let username = ctx.with_vault_password(|vault, session, current| {
        let new_password = prompt_new_password(ctx.interactive(), "New password")?;
        vault.change_password(&session.username, current, &new_password)?;
        Ok(session.username.clone())
    })?;

    if ui.mode.is_json() {
        return print_json(&json!({ "username": username, "changed": true }));
    }
    if !ctx.quiet() {
        print(
            &ui,
            &receipt(&ui, "Password changed", &[("Username", username.as_str())]),
        );
    }
    Ok(())
}
