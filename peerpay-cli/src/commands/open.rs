//! Open command - register a new account

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use super::{get_context, log_event};
use crate::output;
use peerpay_core::services::{LogEvent, LoggingService};

pub fn run(
    identity: &str,
    name: Option<&str>,
    balance: Option<&str>,
    json: bool,
    logger: &Option<Arc<LoggingService>>,
) -> Result<()> {
    let balance = balance
        .map(|text| {
            Decimal::from_str(text.trim())
                .with_context(|| format!("Opening balance '{}' is not a number", text))
        })
        .transpose()?;

    let ctx = get_context()?;
    let account = ctx.account_service.open(identity, name, balance)?;
    log_event(logger, LogEvent::new("account_opened"));

    if json {
        println!("{}", serde_json::to_string_pretty(&account)?);
        return Ok(());
    }

    output::success(&format!(
        "Opened account {} ({}) with balance {}",
        account.identity,
        account.display_name,
        output::format_money(account.balance)
    ));
    Ok(())
}
