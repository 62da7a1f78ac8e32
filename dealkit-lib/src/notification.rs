//! State-change notifications.
//!
//! The engine never talks to a transport. Each accepted transition returns
//! a list of [`Notification`]s and the caller hands them to a [`Notifier`].

use crate::errors::Result;
use crate::models::{Deal, DealId, UserId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: UserId,
    pub message: NotificationMessage,
}

impl Notification {
    pub fn new(recipient: UserId, message: NotificationMessage) -> Self {
        Self { recipient, message }
    }
}

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationMessage {
    /// To the buyer who just joined.
    PaymentInstructions {
        deal: Deal,
        seller_wallet: Option<String>,
    },
    /// To the seller when someone joins.
    BuyerJoined { deal_id: DealId, buyer: String },
    /// To the buyer after marking the deal paid.
    PaymentMarked { deal_id: DealId },
    /// To the seller after the buyer marks the deal paid.
    PaymentClaimed { deal_id: DealId },
    /// To the buyer who left.
    LeftDeal { deal_id: DealId },
    /// To the seller when the buyer leaves.
    BuyerLeft { deal_id: DealId },
    /// To the seller after finishing.
    HandOverItem { deal_id: DealId },
    /// To the buyer after the seller finishes.
    FinishedBySeller { deal_id: DealId },
    /// To every participant of a canceled deal.
    Canceled { deal_id: DealId },
}

impl NotificationMessage {
    pub fn deal_id(&self) -> &DealId {
        match self {
            Self::PaymentInstructions { deal, .. } => &deal.id,
            Self::BuyerJoined { deal_id, .. }
            | Self::PaymentMarked { deal_id }
            | Self::PaymentClaimed { deal_id }
            | Self::LeftDeal { deal_id }
            | Self::BuyerLeft { deal_id }
            | Self::HandOverItem { deal_id }
            | Self::FinishedBySeller { deal_id }
            | Self::Canceled { deal_id } => deal_id,
        }
    }
}

impl fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentInstructions {
                deal,
                seller_wallet,
            } => {
                writeln!(f, "{}", DealCard(deal))?;
                match seller_wallet {
                    Some(wallet) => write!(
                        f,
                        "Send {} to the seller's wallet:\n{}\n\nMark the deal paid once the transfer is done.",
                        deal.amount, wallet
                    ),
                    None => write!(
                        f,
                        "The seller has not registered a wallet yet. Contact the seller before paying."
                    ),
                }
            }
            Self::BuyerJoined { deal_id, buyer } => {
                write!(f, "Buyer {} joined deal #{}.", buyer, deal_id)
            }
            Self::PaymentMarked { deal_id } => write!(
                f,
                "You marked deal #{} as paid. Wait for the seller to confirm.",
                deal_id
            ),
            Self::PaymentClaimed { deal_id } => write!(
                f,
                "The buyer marked deal #{} as paid. Check the transfer and finish the deal.",
                deal_id
            ),
            Self::LeftDeal { deal_id } => write!(f, "You left deal #{}.", deal_id),
            Self::BuyerLeft { deal_id } => write!(f, "The buyer left deal #{}.", deal_id),
            Self::HandOverItem { deal_id } => write!(
                f,
                "Deal #{} is finished. Hand the item over to the buyer.",
                deal_id
            ),
            Self::FinishedBySeller { deal_id } => {
                write!(f, "Deal #{} was finished by the seller.", deal_id)
            }
            Self::Canceled { deal_id } => write!(f, "Deal #{} was canceled.", deal_id),
        }
    }
}

/// Human-readable summary of a deal.
pub struct DealCard<'a>(pub &'a Deal);

impl fmt::Display for DealCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deal = self.0;
        writeln!(f, "Deal #{}", deal.id)?;
        writeln!(f, "Category: {}", deal.category.as_str().to_uppercase())?;
        writeln!(f, "Item: {}", or_dash(&deal.item_info))?;
        writeln!(f, "Amount: {}", deal.amount)?;
        writeln!(f, "Description: {}", or_dash(&deal.description))?;
        write!(f, "Status: {}", deal.status)
    }
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

/// Delivers notifications to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Deliver every notification, logging failures instead of stopping.
///
/// Returns how many were delivered. A failed delivery never undoes the
/// transition that produced it.
pub async fn dispatch_all(notifier: &dyn Notifier, notifications: &[Notification]) -> usize {
    let mut delivered = 0;
    for notification in notifications {
        match notifier.notify(notification).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(
                recipient = %notification.recipient,
                deal_id = %notification.message.deal_id(),
                error = %e,
                "notification delivery failed"
            ),
        }
    }
    delivered
}

/// Writes notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            deal_id = %notification.message.deal_id(),
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Keeps notifications in memory. Useful in tests and embeddings.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::errors::StoreError;
    use crate::models::Category;

    fn sample_deal() -> Deal {
        Deal::new(
            DealId::parse("c0ffee").unwrap(),
            UserId(1),
            Category::Nft,
            "rare pepe".to_string(),
            String::new(),
            Amount::parse_user_input("99,5").unwrap(),
            0,
        )
    }

    #[test]
    fn test_deal_card() {
        let card = DealCard(&sample_deal()).to_string();
        assert!(card.contains("Deal #c0ffee"));
        assert!(card.contains("Category: NFT"));
        assert!(card.contains("Amount: 99.5"));
        assert!(card.contains("Description: -"));
        assert!(card.ends_with("Status: created"));
    }

    #[test]
    fn test_payment_instructions() {
        let with_wallet = NotificationMessage::PaymentInstructions {
            deal: sample_deal(),
            seller_wallet: Some("UQ-seller".to_string()),
        };
        let text = with_wallet.to_string();
        assert!(text.contains("UQ-seller"));
        assert!(text.contains("Send 99.5"));

        let without = NotificationMessage::PaymentInstructions {
            deal: sample_deal(),
            seller_wallet: None,
        };
        assert!(without.to_string().contains("Contact the seller"));
    }

    struct FlakyNotifier;

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, notification: &Notification) -> Result<()> {
            if notification.recipient == UserId(2) {
                return Err(StoreError::Corrupt {
                    record: "outbox".to_string(),
                    reason: "unreachable".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_continues_after_failure() {
        let deal_id = DealId::parse("c0ffee").unwrap();
        let notes = vec![
            Notification::new(UserId(2), NotificationMessage::Canceled { deal_id: deal_id.clone() }),
            Notification::new(UserId(1), NotificationMessage::Canceled { deal_id }),
        ];
        assert_eq!(dispatch_all(&FlakyNotifier, &notes).await, 1);

        let collector = CollectingNotifier::new();
        assert_eq!(dispatch_all(&collector, &notes).await, 2);
        assert_eq!(collector.take(), notes);
        assert!(collector.is_empty());
    }
}
