//! Deal id generation.
//!
//! Ids are fixed-length lowercase hex tokens ([`DEAL_ID_LEN`] characters).
//! Both generators are unpredictable, so a share link cannot be guessed from
//! a neighbouring deal's link.

use crate::models::DealId;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Length of generated ids in hex characters.
pub const DEAL_ID_LEN: usize = 16;

const TOKEN_BYTES: usize = DEAL_ID_LEN / 2;

/// Source of fresh deal ids.
pub trait DealIdGenerator: Send + Sync {
    fn next_id(&self) -> DealId;
}

/// Ids drawn from the operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDealIds;

impl DealIdGenerator for RandomDealIds {
    fn next_id(&self) -> DealId {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        DealId::from_token_bytes(&bytes)
    }
}

/// Ids derived from a monotonic counter hashed with a secret salt.
///
/// Distinct for the lifetime of one generator; the salt hides the counter.
pub struct SaltedCounterIds {
    salt: [u8; 32],
    counter: AtomicU64,
}

impl SaltedCounterIds {
    pub fn new() -> Self {
        let mut salt = [0u8; 32];
        OsRng.fill_bytes(&mut salt);
        Self::with_salt(salt)
    }

    pub fn with_salt(salt: [u8; 32]) -> Self {
        Self {
            salt,
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SaltedCounterIds {
    fn default() -> Self {
        Self::new()
    }
}

impl DealIdGenerator for SaltedCounterIds {
    fn next_id(&self) -> DealId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(self.salt);
        hasher.update(n.to_be_bytes());
        let digest = hasher.finalize();
        DealId::from_token_bytes(&digest[..TOKEN_BYTES])
    }
}
