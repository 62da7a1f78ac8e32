//! Backup and restore commands

use anyhow::{Context, Result};
use dealkit_lib::backup::{backup_store, read_backup, restore_snapshot};
use dealkit_lib::DealkitConfig;
use std::path::Path;

use crate::ui;

pub async fn backup(config: &DealkitConfig) -> Result<()> {
    let engine = super::open_engine(config)?;

    let spinner = ui::spinner("Writing backup...");
    let path = backup_store(engine.store().as_ref(), &config.backup_dir)
        .await
        .with_context(|| format!("failed to write backup to {}", config.backup_dir.display()));
    spinner.finish_and_clear();

    let path = path?;
    ui::success("Backup written");
    ui::key_value("File", &path.display().to_string());
    Ok(())
}

pub async fn restore(config: &DealkitConfig, input: &Path) -> Result<()> {
    let snapshot =
        read_backup(input).with_context(|| format!("failed to read {}", input.display()))?;
    let engine = super::open_engine(config)?;
    restore_snapshot(engine.store().as_ref(), &snapshot).await?;

    ui::success("Backup restored");
    ui::key_value("Users", &snapshot.users.len().to_string());
    ui::key_value("Deals", &snapshot.deals.len().to_string());
    Ok(())
}
