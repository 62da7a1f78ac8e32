//! Optional background payment checks.
//!
//! The monitor never settles anything. It asks a [`PaymentVerifier`] whether
//! the buyer of an open deal has paid and, if so, fires the ordinary
//! `mark-paid` transition on the buyer's behalf.

use crate::engine::{DealEngine, TransitionOutcome};
use crate::errors::{DealError, Result};
use crate::lifecycle::DealEvent;
use crate::models::Deal;
use crate::notification::{dispatch_all, Notifier};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Default pause between checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Answers whether a deal has been paid.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn payment_received(&self, deal: &Deal, seller_wallet: Option<&str>) -> Result<bool>;
}

/// Verifier that never confirms anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVerifier;

#[async_trait]
impl PaymentVerifier for NoopVerifier {
    async fn payment_received(&self, deal: &Deal, _seller_wallet: Option<&str>) -> Result<bool> {
        tracing::trace!(deal_id = %deal.id, "no payment verifier configured");
        Ok(false)
    }
}

pub struct PaymentMonitor {
    engine: Arc<DealEngine>,
    verifier: Arc<dyn PaymentVerifier>,
    check_interval: Duration,
}

impl PaymentMonitor {
    pub fn new(
        engine: Arc<DealEngine>,
        verifier: Arc<dyn PaymentVerifier>,
        check_interval: Duration,
    ) -> Self {
        Self {
            engine,
            verifier,
            check_interval,
        }
    }

    /// Create with default check interval (30 seconds)
    pub fn with_default_interval(
        engine: Arc<DealEngine>,
        verifier: Arc<dyn PaymentVerifier>,
    ) -> Self {
        Self::new(engine, verifier, DEFAULT_CHECK_INTERVAL)
    }

    /// Check every open deal with a buyer once.
    ///
    /// Returns the transitions that were applied. A deal that changed
    /// underneath the check (buyer left, canceled) is skipped quietly.
    pub async fn check_open_deals(&self) -> Result<Vec<TransitionOutcome>> {
        let mut applied = Vec::new();

        for deal in self.engine.open_deals().await? {
            let Some(buyer) = deal.buyer_id else {
                continue;
            };
            let seller_wallet = self
                .engine
                .user(deal.seller_id)
                .await?
                .and_then(|u| u.wallet);

            let paid = match self
                .verifier
                .payment_received(&deal, seller_wallet.as_deref())
                .await
            {
                Ok(paid) => paid,
                Err(e) => {
                    tracing::warn!(deal_id = %deal.id, error = %e, "payment check failed");
                    continue;
                }
            };
            if !paid {
                continue;
            }

            match self
                .engine
                .apply_transition(&deal.id, DealEvent::MarkPaid, buyer)
                .await
            {
                Ok(outcome) => {
                    tracing::info!(deal_id = %deal.id, "payment detected, deal marked paid");
                    applied.push(outcome);
                }
                Err(DealError::Transition(e)) => {
                    tracing::debug!(deal_id = %deal.id, error = %e, "deal moved on before payment was applied");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(applied)
    }

    /// Check periodically until `shutdown` flips to `true` or its sender is
    /// dropped. Notifications from applied transitions go to `notifier`.
    pub async fn run(&self, notifier: &dyn Notifier, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.check_interval.as_secs(), "payment monitor started");
        loop {
            match self.check_open_deals().await {
                Ok(outcomes) => {
                    for outcome in &outcomes {
                        dispatch_all(notifier, &outcome.notifications).await;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "payment monitor pass failed"),
            }

            tokio::select! {
                _ = sleep(self.check_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("payment monitor stopped");
    }

    pub fn engine(&self) -> &Arc<DealEngine> {
        &self.engine
    }
}
