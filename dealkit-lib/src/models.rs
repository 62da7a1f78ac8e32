//! Persisted records and their identifiers.

use crate::amount::Amount;
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chat-platform user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Longest deal id accepted from outside.
pub const MAX_DEAL_ID_LEN: usize = 64;

/// Prefix of the deep-link payload that opens a deal.
pub const START_PAYLOAD_PREFIX: &str = "deal_";

/// Opaque deal identifier.
///
/// Ids double as file names in the file store, so only ASCII letters, digits,
/// `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DealId(String);

impl DealId {
    /// Validate an id received from a user or a link.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_DEAL_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(ValidationError::MalformedDealId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Hex-encode random or hashed bytes into an id.
    pub fn from_token_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Extract the deal id from a deep-link start payload.
    ///
    /// Accepts `deal_<id>` as well as a bare id. Returns `None` for an empty
    /// payload or one that is not a valid id.
    pub fn from_start_payload(payload: &str) -> Option<Self> {
        let payload = payload.trim();
        let raw = payload.strip_prefix(START_PAYLOAD_PREFIX).unwrap_or(payload);
        Self::parse(raw).ok()
    }

    /// Payload to embed in a share link.
    pub fn start_payload(&self) -> String {
        format!("{}{}", START_PAYLOAD_PREFIX, self.0)
    }

    /// Link a buyer follows to open this deal in the bot.
    pub fn share_link(&self, bot_username: &str) -> String {
        format!(
            "https://t.me/{}?start={}",
            bot_username.trim_start_matches('@'),
            self.start_payload()
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DealId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DealId> for String {
    fn from(id: DealId) -> Self {
        id.0
    }
}

impl FromStr for DealId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Created,
    WaitingPayment,
    Paid,
    Finished,
    Canceled,
}

impl DealStatus {
    pub const ALL: [DealStatus; 5] = [
        DealStatus::Created,
        DealStatus::WaitingPayment,
        DealStatus::Paid,
        DealStatus::Finished,
        DealStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::WaitingPayment => "waiting_payment",
            Self::Paid => "paid",
            Self::Finished => "finished",
            Self::Canceled => "canceled",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Canceled)
    }

    /// Still waiting on a buyer or on payment.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Created | Self::WaitingPayment)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is being sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Channel,
    Gift,
    Nft,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Channel,
        Category::Gift,
        Category::Nft,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Gift => "gift",
            Self::Nft => "nft",
            Self::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownCategory(s.trim().to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person known to the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: Option<String>,
    pub wallet: Option<String>,
    pub channel_id: Option<i64>,
    pub created_at: i64,
}

impl User {
    pub fn new(id: UserId, display_name: Option<String>, created_at: i64) -> Self {
        Self {
            id,
            display_name,
            wallet: None,
            channel_id: None,
            created_at,
        }
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.as_deref().is_some_and(|w| !w.trim().is_empty())
    }

    /// `@name` when a display name is known, otherwise the numeric id.
    pub fn mention(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => format!("@{}", name.trim_start_matches('@')),
            _ => self.id.to_string(),
        }
    }
}

/// One escrow negotiation between a seller and at most one buyer.
///
/// Field order matches the export column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub seller_id: UserId,
    pub buyer_id: Option<UserId>,
    pub category: Category,
    pub item_info: String,
    pub description: String,
    pub amount: Amount,
    pub status: DealStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Deal {
    /// A freshly listed deal with no buyer.
    pub fn new(
        id: DealId,
        seller_id: UserId,
        category: Category,
        item_info: String,
        description: String,
        amount: Amount,
        now: i64,
    ) -> Self {
        Self {
            id,
            seller_id,
            buyer_id: None,
            category,
            item_info,
            description,
            amount,
            status: DealStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.seller_id == user || self.buyer_id == Some(user)
    }

    /// The other side of the deal from `user`'s point of view.
    pub fn counterparty(&self, user: UserId) -> Option<UserId> {
        if self.seller_id == user {
            self.buyer_id
        } else if self.buyer_id == Some(user) {
            Some(self.seller_id)
        } else {
            None
        }
    }
}
