//! Deal state machine.
//!
//! [`evaluate`] is pure: it decides whether an actor may fire an event on a
//! deal and, if so, returns the [`Transition`] to apply. Persistence lives in
//! the engine, which runs `evaluate` inside the store's per-record update so
//! the check and the write see the same record.
//!
//! ```text
//!   created ──join──▶ waiting_payment ──mark-paid──▶ paid ──finish──▶ finished
//!      ▲                    │                         │
//!      └──────leave─────────┴───────────leave─────────┘
//!   any non-terminal ──cancel──▶ canceled
//! ```

use crate::errors::TransitionError;
use crate::models::{Deal, DealStatus, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something an actor asks to happen to a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DealEvent {
    Join,
    MarkPaid,
    Leave,
    Finish,
    Cancel,
}

impl DealEvent {
    pub const ALL: [DealEvent; 5] = [
        DealEvent::Join,
        DealEvent::MarkPaid,
        DealEvent::Leave,
        DealEvent::Finish,
        DealEvent::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::MarkPaid => "mark-paid",
            Self::Leave => "leave",
            Self::Finish => "finish",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for DealEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effect of a transition on the buyer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyerChange {
    Keep,
    Set(UserId),
    Clear,
}

/// An accepted event, ready to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub event: DealEvent,
    pub actor: UserId,
    pub from: DealStatus,
    pub to: DealStatus,
    pub buyer: BuyerChange,
}

impl Transition {
    /// Write the new status and buyer into `deal` and stamp `updated_at`.
    pub fn apply(&self, deal: &mut Deal, now: i64) {
        deal.status = self.to;
        match self.buyer {
            BuyerChange::Keep => {}
            BuyerChange::Set(buyer) => deal.buyer_id = Some(buyer),
            BuyerChange::Clear => deal.buyer_id = None,
        }
        deal.updated_at = now;
    }
}

/// Decide whether `actor` may fire `event` on `deal`.
///
/// The role check runs before the state check, so a seller joining their
/// own deal is always `forbidden-role` whatever the deal's status.
pub fn evaluate(deal: &Deal, event: DealEvent, actor: UserId) -> Result<Transition, TransitionError> {
    if !actor_allowed(deal, event, actor) {
        return Err(TransitionError::ForbiddenRole {
            deal_id: deal.id.clone(),
            event,
            actor,
        });
    }

    let (to, buyer) = target(deal, event, actor).ok_or_else(|| TransitionError::InvalidState {
        deal_id: deal.id.clone(),
        event,
        status: deal.status,
    })?;

    Ok(Transition {
        event,
        actor,
        from: deal.status,
        to,
        buyer,
    })
}

/// Events `actor` could fire on `deal` right now.
pub fn available_events(deal: &Deal, actor: UserId) -> Vec<DealEvent> {
    DealEvent::ALL
        .into_iter()
        .filter(|event| evaluate(deal, *event, actor).is_ok())
        .collect()
}

fn actor_allowed(deal: &Deal, event: DealEvent, actor: UserId) -> bool {
    match event {
        DealEvent::Join => actor != deal.seller_id,
        DealEvent::MarkPaid | DealEvent::Leave => deal.buyer_id == Some(actor),
        DealEvent::Finish => actor == deal.seller_id,
        DealEvent::Cancel => deal.is_participant(actor),
    }
}

fn target(deal: &Deal, event: DealEvent, actor: UserId) -> Option<(DealStatus, BuyerChange)> {
    use DealStatus::*;

    match (event, deal.status) {
        (DealEvent::Join, Created) if deal.buyer_id.is_none() => {
            Some((WaitingPayment, BuyerChange::Set(actor)))
        }
        // Reachable from `created` only if a buyer is recorded there, which
        // the join/leave pair never produces.
        (DealEvent::MarkPaid, Created | WaitingPayment) => Some((Paid, BuyerChange::Keep)),
        (DealEvent::Leave, status) if !status.is_terminal() => Some((Created, BuyerChange::Clear)),
        (DealEvent::Finish, Paid) => Some((Finished, BuyerChange::Keep)),
        (DealEvent::Cancel, status) if !status.is_terminal() => Some((Canceled, BuyerChange::Keep)),
        _ => None,
    }
}
