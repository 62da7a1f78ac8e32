//! # dealkit
//!
//! Peer-to-peer escrow deals: a seller lists an item with a price, a buyer
//! joins through a share link, payment happens out of band, and both sides
//! drive the deal to `finished` or `canceled`.
//!
//! ## Guarantees
//! - Every state change goes through [`lifecycle::evaluate`], checked in the
//!   order existence, role, state
//! - Transitions run inside the store's per-record atomic update, so two
//!   concurrent joins can never both succeed
//! - Prices are fixed-point decimals, always positive
//! - Nothing here moves funds; the system only records what buyer and
//!   seller attest to
//!
//! ## Layout
//! - [`DealEngine`]: users, deal creation, transitions, listings, dialogs
//! - [`DealStore`]: [`MemoryStore`] and the durable [`FileStore`]
//! - [`SessionStore`]: per-actor multi-step input collection
//! - [`export`], [`backup`], [`monitor`]: utilities over the store

pub mod amount;
pub mod backup;
pub mod config;
pub mod engine;
pub mod errors;
pub mod export;
pub mod ids;
pub mod lifecycle;
pub mod models;
pub mod monitor;
pub mod notification;
pub mod session;
pub mod storage;

pub use amount::Amount;
pub use config::{ConfigError, DealkitConfig};
pub use engine::{DealEngine, DialogReply, TransitionOutcome};
pub use errors::{
    DealError, DealErrorCode, Result, StoreError, TransitionError, TransitionErrorKind,
    ValidationError,
};
pub use ids::{DealIdGenerator, RandomDealIds, SaltedCounterIds, DEAL_ID_LEN};
pub use lifecycle::{available_events, BuyerChange, DealEvent, Transition};
pub use models::{Category, Deal, DealId, DealStatus, User, UserId};
pub use monitor::{NoopVerifier, PaymentMonitor, PaymentVerifier};
pub use notification::{
    dispatch_all, CollectingNotifier, DealCard, LogNotifier, Notification, NotificationMessage,
    Notifier,
};
pub use session::{
    CollectedFields, DealDraft, DialogInput, DialogOutcome, DialogSession, DialogStep,
    SessionStore,
};
pub use storage::{
    DealFilter, DealPatch, DealStore, FileStore, MemoryStore, StoreConfig, StoreSnapshot,
    UserPatch,
};
