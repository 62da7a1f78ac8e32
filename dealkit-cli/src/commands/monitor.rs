//! Monitor command - background payment checks

use anyhow::Result;
use dealkit_lib::config::ENV_AUTO_PAYMENT_CHECK;
use dealkit_lib::{dispatch_all, DealkitConfig, NoopVerifier, PaymentMonitor};
use std::sync::Arc;
use tokio::sync::watch;

use super::ConsoleNotifier;
use crate::ui;

pub async fn run(config: &DealkitConfig, once: bool) -> Result<()> {
    let engine = super::open_engine(config)?;
    let monitor = PaymentMonitor::new(engine, Arc::new(NoopVerifier), config.auto_check_interval());

    if once {
        let applied = monitor.check_open_deals().await?;
        for outcome in &applied {
            dispatch_all(&ConsoleNotifier, &outcome.notifications).await;
        }
        ui::success(&format!("Checked open deals, {} marked paid", applied.len()));
        return Ok(());
    }

    if !config.auto_payment_check {
        ui::warning("Automatic payment checks are disabled");
        ui::info(&format!(
            "Set {}=1 or auto_payment_check = true in the config file",
            ENV_AUTO_PAYMENT_CHECK
        ));
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    ui::info(&format!(
        "Checking every {}s, press Ctrl-C to stop",
        config.auto_check_interval().as_secs()
    ));
    monitor.run(&ConsoleNotifier, shutdown_rx).await;
    ui::success("Monitor stopped");
    Ok(())
}
