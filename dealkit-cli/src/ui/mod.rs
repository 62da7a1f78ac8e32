//! Terminal UI utilities

use colored::Colorize;
use dealkit_lib::{Deal, DealStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print a section header
pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Create a spinner progress indicator
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a separator line
pub fn separator() {
    println!("{}", "─".repeat(60).dimmed());
}

fn status_label(status: DealStatus) -> String {
    match status {
        DealStatus::Created => status.as_str().normal().to_string(),
        DealStatus::WaitingPayment => status.as_str().yellow().to_string(),
        DealStatus::Paid => status.as_str().blue().to_string(),
        DealStatus::Finished => status.as_str().green().to_string(),
        DealStatus::Canceled => status.as_str().red().to_string(),
    }
}

/// Print a deal card
pub fn deal(deal: &Deal, bot_username: Option<&str>) {
    header(&format!("Deal #{}", deal.id));
    key_value("Deal ID", deal.id.as_str());
    key_value("Category", &deal.category.as_str().to_uppercase());
    key_value("Item", &deal.item_info);
    key_value("Amount", &deal.amount.to_string());
    if !deal.description.is_empty() {
        key_value("Description", &deal.description);
    }
    key_value("Seller", &deal.seller_id.to_string());
    if let Some(buyer) = deal.buyer_id {
        key_value("Buyer", &buyer.to_string());
    }
    key_value("Status", &status_label(deal.status));
    if let Some(bot) = bot_username {
        key_value("Share link", &deal.id.share_link(bot));
    }
}

/// Print one line per deal
pub fn deal_list(deals: &[Deal]) {
    separator();
    for deal in deals {
        println!(
            "  {}  {:<8} {:>12}  {}  {}",
            deal.id.as_str().bold(),
            deal.category.as_str(),
            deal.amount.to_string(),
            status_label(deal.status),
            deal.item_info
        );
    }
    separator();
}
