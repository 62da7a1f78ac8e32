//! CLI command implementations

pub mod backup;
pub mod chat;
pub mod deal;
pub mod export;
pub mod monitor;
pub mod user;

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use dealkit_lib::{DealEngine, DealId, DealkitConfig, FileStore, Notification, Notifier};
use std::sync::Arc;

/// Open the file store named by `config` and wrap it in an engine.
pub fn open_engine(config: &DealkitConfig) -> Result<Arc<DealEngine>> {
    let store = FileStore::with_config(&config.data_dir, config.store_config())
        .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?;
    Ok(Arc::new(DealEngine::new(Arc::new(store))))
}

/// Parse a deal id typed on the command line.
pub fn parse_deal_id(raw: &str) -> Result<DealId> {
    DealId::parse(raw).with_context(|| format!("'{}' is not a deal id", raw))
}

/// Prints notifications to stdout, one block per recipient.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, notification: &Notification) -> dealkit_lib::Result<()> {
        println!(
            "{} {}",
            format!("→ user {}:", notification.recipient).magenta().bold(),
            notification.message
        );
        Ok(())
    }
}
