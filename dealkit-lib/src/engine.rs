//! The deal engine: every state change goes through here.
//!
//! Each transition is evaluated inside [`DealStore::update_deal`], so the
//! lifecycle check and the write see the same record and two concurrent
//! events on one deal behave as if serialized.

use crate::amount::Amount;
use crate::errors::{DealError, Result, StoreError, TransitionError, ValidationError};
use crate::ids::{DealIdGenerator, RandomDealIds};
use crate::lifecycle::{self, DealEvent, Transition};
use crate::models::{Category, Deal, DealId, User, UserId};
use crate::notification::{Notification, NotificationMessage};
use crate::session::{DealDraft, DialogInput, DialogOutcome, DialogStep, SessionStore};
use crate::storage::{now_timestamp, DealFilter, DealStore};
use std::sync::Arc;

/// How many fresh ids to try before giving up on a collision streak.
const MAX_ID_ATTEMPTS: usize = 5;

/// An accepted transition and who must hear about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub deal: Deal,
    pub transition: Transition,
    pub notifications: Vec<Notification>,
}

/// What the front end should show after a dialog input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogReply {
    /// Ask for the next step.
    Prompt(DialogStep),
    WalletSaved(User),
    DealCreated(Deal),
    Cancelled,
    /// No flow running; show the default menu.
    Idle,
}

pub struct DealEngine {
    store: Arc<dyn DealStore>,
    ids: Arc<dyn DealIdGenerator>,
}

impl DealEngine {
    pub fn new(store: Arc<dyn DealStore>) -> Self {
        Self::with_id_generator(store, Arc::new(RandomDealIds))
    }

    pub fn with_id_generator(store: Arc<dyn DealStore>, ids: Arc<dyn DealIdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Get storage reference (for backup, export and tests)
    pub fn store(&self) -> &Arc<dyn DealStore> {
        &self.store
    }

    // ============================================================
    // Users
    // ============================================================

    /// Record a user on first contact.
    ///
    /// Existing users keep their wallet and channel; the display name is
    /// refreshed when a non-empty one is supplied.
    pub async fn register_user(&self, id: UserId, display_name: Option<&str>) -> Result<User> {
        let name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let fresh = User::new(id, name.clone(), now_timestamp());
        if self.store.insert_user(&fresh).await? {
            tracing::info!(user_id = %id, "user registered");
            return Ok(fresh);
        }

        let Some(name) = name else {
            return self.existing_user(id).await;
        };
        self.store
            .update_user(id, Box::new(move |user: &mut User| user.display_name = Some(name)))
            .await?
            .ok_or_else(|| missing_user(id))
    }

    pub async fn set_wallet(&self, id: UserId, wallet: &str) -> Result<User> {
        let wallet = wallet.trim().to_string();
        if wallet.is_empty() {
            return Err(ValidationError::EmptyField("wallet address").into());
        }
        self.register_user(id, None).await?;
        let user = self
            .store
            .update_user(id, Box::new(move |user: &mut User| user.wallet = Some(wallet)))
            .await?
            .ok_or_else(|| missing_user(id))?;
        tracing::info!(user_id = %id, "wallet saved");
        Ok(user)
    }

    pub async fn link_channel(&self, id: UserId, channel_id: i64) -> Result<User> {
        self.register_user(id, None).await?;
        let user = self
            .store
            .update_user(id, Box::new(move |user: &mut User| user.channel_id = Some(channel_id)))
            .await?
            .ok_or_else(|| missing_user(id))?;
        tracing::info!(user_id = %id, channel_id, "channel linked");
        Ok(user)
    }

    pub async fn user(&self, id: UserId) -> Result<Option<User>> {
        self.store.get_user(id).await
    }

    async fn existing_user(&self, id: UserId) -> Result<User> {
        self.store.get_user(id).await?.ok_or_else(|| missing_user(id))
    }

    async fn require_wallet(&self, id: UserId) -> Result<User> {
        match self.store.get_user(id).await? {
            Some(user) if user.has_wallet() => Ok(user),
            _ => Err(ValidationError::WalletRequired(id).into()),
        }
    }

    // ============================================================
    // Deals
    // ============================================================

    /// List a new deal. The seller must have a registered wallet.
    pub async fn create_deal(
        &self,
        seller: UserId,
        amount: Amount,
        category: Category,
        item_info: &str,
        description: &str,
    ) -> Result<DealId> {
        let deal = self
            .insert_new_deal(
                seller,
                DealDraft {
                    category,
                    item_info: item_info.to_string(),
                    amount,
                    description: description.to_string(),
                },
            )
            .await?;
        Ok(deal.id)
    }

    pub async fn create_deal_from_draft(&self, seller: UserId, draft: DealDraft) -> Result<DealId> {
        Ok(self.insert_new_deal(seller, draft).await?.id)
    }

    async fn insert_new_deal(&self, seller: UserId, draft: DealDraft) -> Result<Deal> {
        let item_info = draft.item_info.trim();
        if item_info.is_empty() {
            return Err(ValidationError::EmptyField("item info").into());
        }
        self.require_wallet(seller).await?;

        let now = now_timestamp();
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let deal = Deal::new(
                self.ids.next_id(),
                seller,
                draft.category,
                item_info.to_string(),
                draft.description.trim().to_string(),
                draft.amount,
                now,
            );
            if self.store.insert_deal(&deal).await? {
                tracing::info!(
                    deal_id = %deal.id,
                    seller = %seller,
                    amount = %deal.amount,
                    category = %deal.category,
                    "deal created"
                );
                return Ok(deal);
            }
            tracing::warn!(deal_id = %deal.id, attempt, "deal id collision, regenerating");
        }
        Err(StoreError::IdCollision {
            attempts: MAX_ID_ATTEMPTS,
        }
        .into())
    }

    /// Fire `event` on a deal as `actor`.
    ///
    /// Checks run in order: existence, role, state. A rejection writes
    /// nothing and produces no notifications.
    pub async fn apply_transition(
        &self,
        deal_id: &DealId,
        event: DealEvent,
        actor: UserId,
    ) -> Result<TransitionOutcome> {
        let now = now_timestamp();
        let mut accepted: Option<Transition> = None;

        let updated = self
            .store
            .update_deal(
                deal_id,
                Box::new(|deal: &mut Deal| -> Result<()> {
                    let transition = lifecycle::evaluate(deal, event, actor)?;
                    transition.apply(deal, now);
                    accepted = Some(transition);
                    Ok(())
                }),
            )
            .await;

        let deal = match updated {
            Ok(Some(deal)) => deal,
            Ok(None) => {
                let err = TransitionError::NotFound(deal_id.clone());
                tracing::warn!(deal_id = %deal_id, %event, actor = %actor, "transition on unknown deal");
                return Err(err.into());
            }
            Err(DealError::Transition(err)) => {
                tracing::warn!(
                    deal_id = %deal_id,
                    %event,
                    actor = %actor,
                    kind = err.kind().as_str(),
                    "transition rejected"
                );
                return Err(err.into());
            }
            Err(err) => return Err(err),
        };

        let Some(transition) = accepted else {
            return Err(StoreError::Corrupt {
                record: deal_id.to_string(),
                reason: "update returned without applying the transition".to_string(),
            }
            .into());
        };

        tracing::info!(
            deal_id = %deal.id,
            %event,
            actor = %actor,
            from = %transition.from,
            to = %transition.to,
            "deal transitioned"
        );

        let notifications = self.notifications_for(&deal, &transition).await;
        Ok(TransitionOutcome {
            deal,
            transition,
            notifications,
        })
    }

    pub async fn get_deal(&self, id: &DealId) -> Result<Deal> {
        self.store
            .get_deal(id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(id.clone()).into())
    }

    /// Show a deal to a prospective buyer.
    ///
    /// Refuses with the same errors `join` would, without writing anything.
    pub async fn preview_join(&self, id: &DealId, actor: UserId) -> Result<Deal> {
        let deal = self.get_deal(id).await?;
        lifecycle::evaluate(&deal, DealEvent::Join, actor)?;
        Ok(deal)
    }

    /// Deals where `user` is seller or buyer, newest first.
    pub async fn deals_for_user(&self, user: UserId) -> Result<Vec<Deal>> {
        self.store.list_deals(&DealFilter::Participant(user)).await
    }

    /// Deals still waiting on a buyer or on payment, newest first.
    pub async fn open_deals(&self) -> Result<Vec<Deal>> {
        self.store.list_deals(&DealFilter::Open).await
    }

    // ============================================================
    // Dialog
    // ============================================================

    /// Feed one dialog input and act on a finished flow.
    ///
    /// Starting deal creation without a wallet is refused before the session
    /// is touched.
    pub async fn handle_dialog_input(
        &self,
        sessions: &SessionStore,
        actor: UserId,
        input: DialogInput,
    ) -> Result<DialogReply> {
        if input == DialogInput::CreateDeal {
            self.require_wallet(actor).await?;
        }

        let reply = match sessions.advance(actor, input)? {
            DialogOutcome::Prompt { step, .. } => DialogReply::Prompt(step),
            DialogOutcome::WalletCaptured(wallet) => {
                DialogReply::WalletSaved(self.set_wallet(actor, &wallet).await?)
            }
            DialogOutcome::DraftReady(draft) => {
                DialogReply::DealCreated(self.insert_new_deal(actor, draft).await?)
            }
            DialogOutcome::Cancelled => DialogReply::Cancelled,
            DialogOutcome::Idle => DialogReply::Idle,
        };
        Ok(reply)
    }

    // ============================================================
    // Notifications
    // ============================================================

    async fn notifications_for(&self, deal: &Deal, transition: &Transition) -> Vec<Notification> {
        let deal_id = deal.id.clone();
        let seller = deal.seller_id;
        let actor = transition.actor;

        match transition.event {
            DealEvent::Join => {
                let seller_wallet = self
                    .lookup_user(seller)
                    .await
                    .and_then(|u| u.wallet)
                    .filter(|w| !w.trim().is_empty());
                let buyer = self
                    .lookup_user(actor)
                    .await
                    .map(|u| u.mention())
                    .unwrap_or_else(|| actor.to_string());
                vec![
                    Notification::new(
                        actor,
                        NotificationMessage::PaymentInstructions {
                            deal: deal.clone(),
                            seller_wallet,
                        },
                    ),
                    Notification::new(seller, NotificationMessage::BuyerJoined { deal_id, buyer }),
                ]
            }
            DealEvent::MarkPaid => vec![
                Notification::new(
                    actor,
                    NotificationMessage::PaymentMarked {
                        deal_id: deal_id.clone(),
                    },
                ),
                Notification::new(seller, NotificationMessage::PaymentClaimed { deal_id }),
            ],
            DealEvent::Leave => vec![
                Notification::new(
                    actor,
                    NotificationMessage::LeftDeal {
                        deal_id: deal_id.clone(),
                    },
                ),
                Notification::new(seller, NotificationMessage::BuyerLeft { deal_id }),
            ],
            DealEvent::Finish => {
                let mut notes = vec![Notification::new(
                    seller,
                    NotificationMessage::HandOverItem {
                        deal_id: deal_id.clone(),
                    },
                )];
                if let Some(buyer) = deal.buyer_id {
                    notes.push(Notification::new(
                        buyer,
                        NotificationMessage::FinishedBySeller { deal_id },
                    ));
                }
                notes
            }
            DealEvent::Cancel => {
                let mut notes = vec![Notification::new(
                    actor,
                    NotificationMessage::Canceled {
                        deal_id: deal_id.clone(),
                    },
                )];
                for participant in [Some(seller), deal.buyer_id].into_iter().flatten() {
                    if participant != actor {
                        notes.push(Notification::new(
                            participant,
                            NotificationMessage::Canceled {
                                deal_id: deal_id.clone(),
                            },
                        ));
                    }
                }
                notes
            }
        }
    }

    // The transition is already committed; a failed lookup only degrades
    // the message.
    async fn lookup_user(&self, id: UserId) -> Option<User> {
        match self.store.get_user(id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "user lookup failed while notifying");
                None
            }
        }
    }
}

fn missing_user(id: UserId) -> DealError {
    StoreError::Corrupt {
        record: format!("user {}", id),
        reason: "record vanished during update".to_string(),
    }
    .into()
}
