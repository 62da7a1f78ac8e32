//! Point-in-time JSON backups of a store.

use crate::errors::{Result, StoreError};
use crate::storage::{DealStore, StoreSnapshot};
use chrono::{TimeZone, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Backup files are named `<prefix><UTC timestamp>.json`.
pub const BACKUP_PREFIX: &str = "dealkit_backup_";

/// File name for a backup taken at `taken_at` (unix seconds).
pub fn backup_file_name(taken_at: i64) -> String {
    let stamp = Utc
        .timestamp_opt(taken_at, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .format("%Y%m%dT%H%M%SZ");
    format!("{}{}.json", BACKUP_PREFIX, stamp)
}

/// Snapshot `store` into a new file under `backup_dir`.
///
/// Returns the path written. Two backups within the same second get a
/// numeric suffix rather than overwriting each other.
pub async fn backup_store(store: &dyn DealStore, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)?;
    let snapshot = store.snapshot().await?;

    let base = backup_file_name(snapshot.taken_at);
    let mut path = backup_dir.join(&base);
    let mut n = 1;
    while path.exists() {
        path = backup_dir.join(base.replace(".json", &format!("-{}.json", n)));
        n += 1;
    }

    let json = serde_json::to_vec_pretty(&snapshot)?;
    let mut file = File::create(&path)?;
    file.write_all(&json)?;
    file.sync_all()?;

    tracing::info!(
        path = %path.display(),
        users = snapshot.users.len(),
        deals = snapshot.deals.len(),
        "backup written"
    );
    Ok(path)
}

pub fn read_backup(path: &Path) -> Result<StoreSnapshot> {
    let bytes = fs::read(path)?;
    let snapshot = serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        record: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(snapshot)
}

/// Write every record of `snapshot` into `store`, replacing same-id records.
///
/// Deals are inserted oldest first so listings keep their original order.
pub async fn restore_snapshot(store: &dyn DealStore, snapshot: &StoreSnapshot) -> Result<()> {
    for user in &snapshot.users {
        store.put_user(user).await?;
    }
    for deal in snapshot.deals.iter().rev() {
        store.put_deal(deal).await?;
    }
    tracing::info!(
        users = snapshot.users.len(),
        deals = snapshot.deals.len(),
        "snapshot restored"
    );
    Ok(())
}
