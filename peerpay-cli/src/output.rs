//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{}", msg.yellow());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format a balance or amount with exactly two decimals
pub fn format_money(value: Decimal) -> String {
    let mut value = value;
    value.rescale(2);
    value.to_string()
}

/// Signed amount, colored by direction
pub fn format_signed(value: Decimal) -> String {
    let text = format_money(value);
    if value.is_sign_negative() && !value.is_zero() {
        text.red().to_string()
    } else if value.is_zero() {
        text.dimmed().to_string()
    } else {
        format!("+{}", text).green().to_string()
    }
}
