//! Per-actor dialog sessions.
//!
//! A session walks one actor through a multi-step input flow: either the
//! wallet edit (one step) or deal creation
//! (category → item → amount → description). Sessions are transient and
//! live only in memory.
//!
//! # Thread Safety
//!
//! [`SessionStore`] keeps one `Mutex` per actor behind a `RwLock`ed map, so
//! inputs from one actor are serialized while different actors never wait on
//! each other. Poisoned locks are recovered, since a session is plain data.

use crate::amount::Amount;
use crate::errors::ValidationError;
use crate::models::{Category, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

/// Where a session is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogStep {
    WalletWait,
    ChooseCategory,
    EnterItem,
    EnterAmount,
    EnterDescription,
}

impl DialogStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WalletWait => "wallet_wait",
            Self::ChooseCategory => "choose_category",
            Self::EnterItem => "enter_item",
            Self::EnterAmount => "enter_amount",
            Self::EnterDescription => "enter_description",
        }
    }

    /// What to ask the actor at this step.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::WalletWait => "Send your wallet address.",
            Self::ChooseCategory => "Choose a category: channel, gift or nft.",
            Self::EnterItem => "Send the link to the item or its name.",
            Self::EnterAmount => "Enter the price (for example 100 or 99,5).",
            Self::EnterDescription => "Add a description (what exactly is being sold).",
        }
    }
}

impl fmt::Display for DialogStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input from an actor, already classified by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogInput {
    /// Start (or restart) the wallet edit flow.
    EditWallet,
    /// Start (or restart) the deal creation flow.
    CreateDeal,
    /// A category picked from the offered choices.
    Category(Category),
    /// Free text.
    Text(String),
    /// Abandon whatever flow is running.
    Cancel,
}

/// Fields gathered so far by the deal flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedFields {
    pub category: Option<Category>,
    pub item_info: Option<String>,
    pub amount: Option<Amount>,
}

/// Everything needed to create a deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealDraft {
    pub category: Category,
    pub item_info: String,
    pub amount: Amount,
    pub description: String,
}

/// Result of feeding one input to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    /// Flow continues; ask for the next step.
    Prompt {
        step: DialogStep,
        fields: CollectedFields,
    },
    /// Wallet flow finished with this address.
    WalletCaptured(String),
    /// Deal flow finished with a complete draft.
    DraftReady(DealDraft),
    /// A running flow was abandoned.
    Cancelled,
    /// No flow is running; the input was not consumed.
    Idle,
}

impl DialogOutcome {
    /// The session ends with this outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Prompt { .. })
    }
}

/// State of one actor's running flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogSession {
    step: DialogStep,
    fields: CollectedFields,
}

impl DialogSession {
    pub fn wallet_flow() -> Self {
        Self {
            step: DialogStep::WalletWait,
            fields: CollectedFields::default(),
        }
    }

    pub fn deal_flow() -> Self {
        Self {
            step: DialogStep::ChooseCategory,
            fields: CollectedFields::default(),
        }
    }

    pub fn step(&self) -> DialogStep {
        self.step
    }

    pub fn fields(&self) -> &CollectedFields {
        &self.fields
    }

    /// Feed one in-flow input.
    ///
    /// Input is validated before anything changes, so on error the session
    /// is exactly as it was and the actor can be re-prompted. Flow control
    /// inputs (`EditWallet`, `CreateDeal`, `Cancel`) are handled by
    /// [`SessionStore::advance`] and rejected here.
    pub fn advance(&mut self, input: DialogInput) -> Result<DialogOutcome, ValidationError> {
        let unexpected = ValidationError::UnexpectedInput { step: self.step };

        match (self.step, input) {
            (DialogStep::WalletWait, DialogInput::Text(text)) => {
                let wallet = non_empty(&text, "wallet address")?;
                Ok(DialogOutcome::WalletCaptured(wallet))
            }
            (DialogStep::ChooseCategory, DialogInput::Category(category)) => {
                self.fields.category = Some(category);
                Ok(self.prompt(DialogStep::EnterItem))
            }
            (DialogStep::EnterItem, DialogInput::Text(text)) => {
                self.fields.item_info = Some(non_empty(&text, "item info")?);
                Ok(self.prompt(DialogStep::EnterAmount))
            }
            (DialogStep::EnterAmount, DialogInput::Text(text)) => {
                self.fields.amount = Some(Amount::parse_user_input(&text)?);
                Ok(self.prompt(DialogStep::EnterDescription))
            }
            (DialogStep::EnterDescription, DialogInput::Text(text)) => {
                let amount = self.fields.amount.ok_or(ValidationError::EmptyField("amount"))?;
                Ok(DialogOutcome::DraftReady(DealDraft {
                    category: self.fields.category.unwrap_or_default(),
                    item_info: self.fields.item_info.clone().unwrap_or_default(),
                    amount,
                    description: text.trim().to_string(),
                }))
            }
            _ => Err(unexpected),
        }
    }

    fn prompt(&mut self, step: DialogStep) -> DialogOutcome {
        self.step = step;
        DialogOutcome::Prompt {
            step,
            fields: self.fields.clone(),
        }
    }
}

fn non_empty(text: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

type SessionSlot = Arc<Mutex<Option<DialogSession>>>;

/// All running sessions, keyed by actor.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, SessionSlot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one input from `actor`.
    ///
    /// Starting a flow replaces any running one. `Cancel` without a session
    /// is a no-op answered with `Idle`, as is free input with no session.
    pub fn advance(
        &self,
        actor: UserId,
        input: DialogInput,
    ) -> Result<DialogOutcome, ValidationError> {
        let slot = self.slot(actor);
        let outcome = {
            let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            let outcome = match input {
                DialogInput::EditWallet => start(&mut guard, DialogSession::wallet_flow()),
                DialogInput::CreateDeal => start(&mut guard, DialogSession::deal_flow()),
                DialogInput::Cancel => match guard.take() {
                    Some(_) => DialogOutcome::Cancelled,
                    None => DialogOutcome::Idle,
                },
                input => match guard.as_mut() {
                    Some(session) => {
                        let outcome = session.advance(input)?;
                        if outcome.is_terminal() {
                            *guard = None;
                        }
                        outcome
                    }
                    None => DialogOutcome::Idle,
                },
            };
            tracing::debug!(actor = %actor, ?outcome, "dialog advanced");
            outcome
        };
        drop(slot);

        if outcome.is_terminal() {
            self.evict_if_idle(actor);
        }
        Ok(outcome)
    }

    /// Drop `actor`'s session. Returns whether one was running.
    pub fn cancel(&self, actor: UserId) -> bool {
        matches!(self.advance(actor, DialogInput::Cancel), Ok(DialogOutcome::Cancelled))
    }

    /// Step `actor` is currently at, if a flow is running.
    pub fn step_of(&self, actor: UserId) -> Option<DialogStep> {
        self.session(actor).map(|s| s.step())
    }

    /// Snapshot of `actor`'s session.
    pub fn session(&self, actor: UserId) -> Option<DialogSession> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let slot = sessions.get(&actor)?;
        let guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Number of actors with a running flow.
    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .values()
            .filter(|slot| slot.lock().unwrap_or_else(|e| e.into_inner()).is_some())
            .count()
    }

    fn slot(&self, actor: UserId) -> SessionSlot {
        if let Some(slot) = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&actor)
        {
            return Arc::clone(slot);
        }
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(sessions.entry(actor).or_default())
    }

    // Only removes a slot nobody else holds, so a concurrent input for the
    // same actor never lands in a detached slot.
    fn evict_if_idle(&self, actor: UserId) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let idle = sessions.get(&actor).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot.lock().unwrap_or_else(|e| e.into_inner()).is_none()
        });
        if idle {
            sessions.remove(&actor);
        }
    }
}

fn start(slot: &mut Option<DialogSession>, session: DialogSession) -> DialogOutcome {
    let outcome = DialogOutcome::Prompt {
        step: session.step(),
        fields: session.fields().clone(),
    };
    *slot = Some(session);
    outcome
}
