//! Export command - dump every deal to CSV

use anyhow::{Context, Result};
use dealkit_lib::export::export_deals_csv;
use dealkit_lib::DealkitConfig;
use std::path::Path;

use crate::ui;

pub async fn run(config: &DealkitConfig, output: &Path) -> Result<()> {
    let engine = super::open_engine(config)?;

    let spinner = ui::spinner("Exporting deals...");
    let rows = export_deals_csv(engine.store().as_ref(), output)
        .await
        .with_context(|| format!("failed to export to {}", output.display()));
    spinner.finish_and_clear();

    let rows = rows?;
    ui::success(&format!("Exported {} deals", rows));
    ui::key_value("File", &output.display().to_string());
    Ok(())
}
