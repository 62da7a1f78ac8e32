//! Durable storage for users and deals.
//!
//! Every single-record operation is atomic with respect to concurrent
//! callers. [`DealStore::update_deal`] is the read-modify-write primitive the
//! engine builds transitions on: the patch runs against the current record
//! under the record's lock, and an `Err` from the patch aborts without
//! writing anything.

mod file;
mod memory;

pub use file::{FileStore, StoreConfig};
pub use memory::MemoryStore;

use crate::errors::Result;
use crate::models::{Deal, DealId, DealStatus, User, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// In-place edit of a user record.
pub type UserPatch<'a> = Box<dyn FnOnce(&mut User) + Send + 'a>;

/// In-place edit of a deal record. Returning `Err` discards the edit.
pub type DealPatch<'a> = Box<dyn FnOnce(&mut Deal) -> Result<()> + Send + 'a>;

/// Which deals a listing returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DealFilter {
    #[default]
    All,
    /// Deals where the user is seller or buyer.
    Participant(UserId),
    /// Deals still waiting on a buyer or on payment.
    Open,
    Status(DealStatus),
}

impl DealFilter {
    pub fn matches(&self, deal: &Deal) -> bool {
        match self {
            Self::All => true,
            Self::Participant(user) => deal.is_participant(*user),
            Self::Open => deal.status.is_open(),
            Self::Status(status) => deal.status == *status,
        }
    }
}

/// Point-in-time copy of everything in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub taken_at: i64,
    /// Sorted by id.
    pub users: Vec<User>,
    /// Newest created first.
    pub deals: Vec<Deal>,
}

/// Storage backend for users and deals.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Insert or replace.
    async fn put_user(&self, user: &User) -> Result<()>;

    /// Insert only if no user with this id exists. Returns whether it did.
    async fn insert_user(&self, user: &User) -> Result<bool>;

    /// Atomically edit a user. `None` if the user does not exist.
    async fn update_user(&self, id: UserId, patch: UserPatch<'_>) -> Result<Option<User>>;

    async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>>;

    /// Insert or replace.
    async fn put_deal(&self, deal: &Deal) -> Result<()>;

    /// Insert only if the id is unused. Returns whether it did.
    async fn insert_deal(&self, deal: &Deal) -> Result<bool>;

    /// Atomically edit a deal. `None` if the deal does not exist.
    async fn update_deal(&self, id: &DealId, patch: DealPatch<'_>) -> Result<Option<Deal>>;

    /// Matching deals, newest created first. Ties keep insertion order,
    /// latest insert first.
    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>>;

    async fn snapshot(&self) -> Result<StoreSnapshot>;
}

/// Sort `(insertion position, deal)` pairs into listing order.
pub(crate) fn sort_newest_first(deals: &mut [(usize, Deal)]) {
    deals.sort_by(|(pos_a, a), (pos_b, b)| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| pos_b.cmp(pos_a))
    });
}

pub(crate) fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
