//! Balance command - show an account's committed balance

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(identity: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let account = ctx.history_service.account(identity)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "identity": account.identity,
                "displayName": account.display_name,
                "balance": output::format_money(account.balance),
            })
        );
        return Ok(());
    }

    println!(
        "{} ({}): {}",
        account.display_name.bold(),
        account.identity,
        output::format_money(account.balance)
    );
    Ok(())
}
