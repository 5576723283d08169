//! Pay command - submit a transfer through the gateway

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use peerpay_core::services::{LoggingService, TransferRequest};
use peerpay_core::Recipient;

/// Exit status for failures worth retrying (EX_TEMPFAIL)
const EXIT_RETRYABLE: u8 = 75;

pub fn run(
    from: &str,
    to: &str,
    amount: &str,
    name: Option<String>,
    json: bool,
    logger: Option<Arc<LoggingService>>,
) -> Result<ExitCode> {
    let mut ctx = get_context()?;
    if let Some(logger) = logger {
        ctx = ctx.with_event_log(logger);
    }

    let mut request = TransferRequest::new(from, amount, to);
    request.recipient_display_name = name;
    let response = ctx.gateway.handle(request);

    if json {
        println!("{}", response.to_json());
    } else if let Some(record) = &response.record {
        output::success(response.message.as_deref().unwrap_or("Payment Successful"));
        let destination = match &record.recipient {
            Recipient::Resolved(identity) => format!("{} ({})", record.recipient_name, identity),
            Recipient::External(handle) => {
                format!("{} ({}, external)", record.recipient_name, handle)
            }
        };
        println!(
            "  {} sent to {}  {}",
            output::format_money(record.amount.value()).bold(),
            destination,
            format!("#{}", record.id).dimmed()
        );
    } else {
        output::error(response.error.as_deref().unwrap_or("Payment failed"));
        if response.retryable {
            output::warning("The ledger was busy; the payment was not made. Try again.");
        }
    }

    Ok(if response.success {
        ExitCode::SUCCESS
    } else if response.retryable {
        ExitCode::from(EXIT_RETRYABLE)
    } else {
        ExitCode::FAILURE
    })
}
