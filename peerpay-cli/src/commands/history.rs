//! History command - list an account's transfers, newest first

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use peerpay_core::services::Direction;
use peerpay_core::Recipient;

pub fn run(identity: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let entries = ctx.history_service.history(identity)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        output::warning("No transfers yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["#", "Time (UTC)", "Direction", "Counterparty", "Amount"]);

    for entry in &entries {
        let record = &entry.record;
        let counterparty = match (entry.direction, &record.recipient) {
            (Direction::Received, _) => record.sender.to_string(),
            (_, Recipient::Resolved(identity)) => {
                format!("{} ({})", record.recipient_name, identity)
            }
            (_, Recipient::External(handle)) => format!("{} ({})", record.recipient_name, handle),
        };
        let direction = match entry.direction {
            Direction::Sent => "sent",
            Direction::Received => "received",
            Direction::ToSelf => "self",
        };

        table.add_row(vec![
            record.id.to_string(),
            record.committed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            direction.to_string(),
            counterparty,
            output::format_signed(entry.signed_amount()),
        ]);
    }

    println!("{}", table);
    println!(
        "{} {}",
        "Balance:".bold(),
        output::format_money(ctx.history_service.balance(identity)?)
    );
    Ok(())
}
