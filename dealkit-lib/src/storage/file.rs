use super::{
    now_timestamp, sort_newest_first, DealFilter, DealPatch, DealStore, StoreSnapshot, UserPatch,
};
use crate::errors::{Result, StoreError};
use crate::models::{Deal, DealId, User, UserId};
use async_trait::async_trait;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

const USERS_DIR: &str = "users";
const DEALS_DIR: &str = "deals";
const LOCKS_DIR: &str = "locks";
const DEAL_ORDER_FILE: &str = "deal_order.log";
const DEAL_ORDER_LOCK: &str = "deal-order";

/// Lock behaviour of a [`FileStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Give up on a record lock after this long.
    pub lock_timeout: Duration,
    /// Pause between lock attempts.
    pub retry_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(10),
        }
    }
}

/// Holds an exclusive advisory lock until dropped.
struct RecordLock {
    file: File,
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well.
        let _ = self.file.unlock();
    }
}

/// Store keeping one JSON document per record on disk.
///
/// ```text
/// <root>/users/<user id>.json
/// <root>/deals/<deal id>.json
/// <root>/deal_order.log      one deal id per line, creation order
/// <root>/locks/*.lock        advisory lock files
/// ```
///
/// Writes go to a temp file that is synced and renamed over the record, so
/// readers never observe a half-written document. Read-modify-write holds an
/// exclusive `fs2` lock on the record's lock file, which serializes writers
/// across tasks and across processes sharing the directory.
pub struct FileStore {
    root: PathBuf,
    config: StoreConfig,
    // Writers share it while touching disk; `snapshot` takes it exclusively
    // so a backup never sees half of an in-process operation.
    gate: RwLock<()>,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(root, StoreConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(USERS_DIR))?;
        fs::create_dir_all(root.join(DEALS_DIR))?;
        fs::create_dir_all(root.join(LOCKS_DIR))?;
        tracing::debug!(root = %root.display(), "opened file store");
        Ok(Self { root, config, gate: RwLock::new(()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_path(&self, id: UserId) -> PathBuf {
        self.root.join(USERS_DIR).join(format!("{}.json", id))
    }

    fn deal_path(&self, id: &DealId) -> PathBuf {
        self.root.join(DEALS_DIR).join(format!("{}.json", id))
    }

    fn order_path(&self) -> PathBuf {
        self.root.join(DEAL_ORDER_FILE)
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.root.join(LOCKS_DIR).join(format!("{}.lock", name))
    }

    fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the exclusive lock named `name`, retrying until the timeout.
    async fn acquire(&self, name: &str) -> Result<RecordLock> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path(name))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(RecordLock { file }),
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= self.config.lock_timeout {
                        let waited_ms = waited.as_millis() as u64;
                        tracing::warn!(record = name, waited_ms, "gave up waiting for record lock");
                        return Err(StoreError::LockTimeout {
                            record: name.to_string(),
                            waited_ms,
                        }
                        .into());
                    }
                    tokio::time::sleep(self.config.retry_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn append_order(&self, id: &DealId) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.order_path())?;
        writeln!(file, "{}", id)?;
        file.sync_data()?;
        Ok(())
    }

    /// Every deal with its creation-order position.
    ///
    /// Deals missing from the order log (a crash between the record write and
    /// the log append) are still returned, ordered by `created_at` alone.
    fn load_deals(&self) -> Result<Vec<(usize, Deal)>> {
        let order = match fs::read_to_string(self.order_path()) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut positions: HashMap<DealId, usize> = HashMap::new();
        for (pos, line) in order.lines().enumerate() {
            if let Ok(id) = DealId::parse(line) {
                positions.entry(id).or_insert(pos);
            }
        }

        let mut deals = Vec::new();
        for path in json_files(&self.root.join(DEALS_DIR))? {
            if let Some(deal) = read_json::<Deal>(&path)? {
                let pos = positions.get(&deal.id).copied().unwrap_or(usize::MAX);
                deals.push((pos, deal));
            }
        }
        sort_newest_first(&mut deals);
        Ok(deals)
    }

    fn load_users(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for path in json_files(&self.root.join(USERS_DIR))? {
            if let Some(user) = read_json::<User>(&path)? {
                users.push(user);
            }
        }
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    /// Write a deal, appending it to the order log if it is new. Caller holds
    /// the deal's lock and the order lock.
    fn write_deal(&self, deal: &Deal, path: &Path) -> Result<()> {
        let is_new = !path.exists();
        write_json_atomic(path, deal)?;
        if is_new {
            self.append_order(&deal.id)?;
        }
        tracing::debug!(deal_id = %deal.id, status = %deal.status, "deal written");
        Ok(())
    }
}

fn user_lock(id: UserId) -> String {
    format!("user-{}", id)
}

fn deal_lock(id: &DealId) -> String {
    format!("deal-{}", id)
}

fn is_contended(err: &std::io::Error) -> bool {
    err.raw_os_error().is_some()
        && err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(files)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        record: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(value))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl DealStore for FileStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        read_json(&self.user_path(id))
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        let _lock = self.acquire(&user_lock(user.id)).await?;
        let _gate = self.read_gate();
        write_json_atomic(&self.user_path(user.id), user)
    }

    async fn insert_user(&self, user: &User) -> Result<bool> {
        let _lock = self.acquire(&user_lock(user.id)).await?;
        let _gate = self.read_gate();
        let path = self.user_path(user.id);
        if path.exists() {
            return Ok(false);
        }
        write_json_atomic(&path, user)?;
        tracing::debug!(user_id = %user.id, "user inserted");
        Ok(true)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch<'_>) -> Result<Option<User>> {
        let _lock = self.acquire(&user_lock(id)).await?;
        let _gate = self.read_gate();
        let path = self.user_path(id);
        let Some(mut user) = read_json::<User>(&path)? else {
            return Ok(None);
        };
        patch(&mut user);
        write_json_atomic(&path, &user)?;
        Ok(Some(user))
    }

    async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>> {
        read_json(&self.deal_path(id))
    }

    async fn put_deal(&self, deal: &Deal) -> Result<()> {
        let _lock = self.acquire(&deal_lock(&deal.id)).await?;
        let _order = self.acquire(DEAL_ORDER_LOCK).await?;
        let _gate = self.read_gate();
        self.write_deal(deal, &self.deal_path(&deal.id))
    }

    async fn insert_deal(&self, deal: &Deal) -> Result<bool> {
        let _lock = self.acquire(&deal_lock(&deal.id)).await?;
        let _order = self.acquire(DEAL_ORDER_LOCK).await?;
        let _gate = self.read_gate();
        let path = self.deal_path(&deal.id);
        if path.exists() {
            return Ok(false);
        }
        self.write_deal(deal, &path)?;
        Ok(true)
    }

    async fn update_deal(&self, id: &DealId, patch: DealPatch<'_>) -> Result<Option<Deal>> {
        let _lock = self.acquire(&deal_lock(id)).await?;
        let _gate = self.read_gate();
        let path = self.deal_path(id);
        let Some(mut deal) = read_json::<Deal>(&path)? else {
            return Ok(None);
        };
        patch(&mut deal)?;
        write_json_atomic(&path, &deal)?;
        tracing::debug!(deal_id = %deal.id, status = %deal.status, "deal updated");
        Ok(Some(deal))
    }

    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>> {
        Ok(self
            .load_deals()?
            .into_iter()
            .map(|(_, deal)| deal)
            .filter(|deal| filter.matches(deal))
            .collect())
    }

    async fn snapshot(&self) -> Result<StoreSnapshot> {
        let _gate = self.gate.write().unwrap_or_else(|e| e.into_inner());
        let users = self.load_users()?;
        let deals = self.load_deals()?.into_iter().map(|(_, deal)| deal).collect();
        Ok(StoreSnapshot {
            taken_at: now_timestamp(),
            users,
            deals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;
    use crate::errors::{DealError, DealErrorCode};
    use crate::models::DealStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_users_round_trip() {
        let dir = tempdir().unwrap();
        contract::users_round_trip(&FileStore::open(dir.path()).unwrap()).await;
    }

    #[tokio::test]
    async fn test_deals_insert_update_list() {
        let dir = tempdir().unwrap();
        contract::deals_insert_update_list(&FileStore::open(dir.path()).unwrap()).await;
    }

    #[tokio::test]
    async fn test_failed_patch_writes_nothing() {
        let dir = tempdir().unwrap();
        contract::failed_patch_writes_nothing(&FileStore::open(dir.path()).unwrap()).await;
    }

    #[tokio::test]
    async fn test_snapshot_copies_everything() {
        let dir = tempdir().unwrap();
        contract::snapshot_copies_everything(&FileStore::open(dir.path()).unwrap()).await;
    }

    #[tokio::test]
    async fn test_lock_timeout_is_transient_error() {
        let dir = tempdir().unwrap();
        let store = FileStore::with_config(
            dir.path(),
            StoreConfig {
                lock_timeout: Duration::from_millis(50),
                retry_interval: Duration::from_millis(5),
            },
        )
        .unwrap();
        let deal = contract::deal("held", 1, 1);
        store.put_deal(&deal).await.unwrap();

        // A second handle on the lock file stands in for another process.
        let holder = File::create(store.lock_path(&deal_lock(&deal.id))).unwrap();
        holder.lock_exclusive().unwrap();

        let err = store
            .update_deal(
                &deal.id,
                Box::new(|d: &mut Deal| -> Result<()> {
                    d.status = DealStatus::Canceled;
                    Ok(())
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), DealErrorCode::LockTimeout);
        assert!(err.is_retryable());
        assert_eq!(
            store.get_deal(&deal.id).await.unwrap().unwrap().status,
            DealStatus::Created
        );

        holder.unlock().unwrap();
        assert!(store
            .update_deal(&deal.id, Box::new(|_: &mut Deal| -> Result<()> { Ok(()) }))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.insert_deal(&contract::deal("first", 1, 10)).await.unwrap();
            store.insert_deal(&contract::deal("second", 1, 10)).await.unwrap();
            store
                .put_user(&User::new(UserId(1), Some("seller".to_string()), 10))
                .await
                .unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let ids: Vec<_> = store
            .list_deals(&DealFilter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(ids, vec!["second", "first"]);
        assert_eq!(
            store.get_user(UserId(1)).await.unwrap().unwrap().display_name.as_deref(),
            Some("seller")
        );
    }

    #[tokio::test]
    async fn test_unindexed_deal_is_still_listed() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.insert_deal(&contract::deal("indexed", 1, 10)).await.unwrap();

        let orphan = contract::deal("orphan", 1, 20);
        write_json_atomic(&store.deal_path(&orphan.id), &orphan).unwrap();

        let listed = store.list_deals(&DealFilter::All).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id.as_str(), "orphan");
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let id = DealId::parse("broken").unwrap();
        fs::write(store.deal_path(&id), b"{not json").unwrap();

        let err = store.get_deal(&id).await.unwrap_err();
        assert!(matches!(err, DealError::Store(StoreError::Corrupt { .. })));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        for i in 0..5 {
            store.put_deal(&contract::deal(&format!("d{i}"), 1, i)).await.unwrap();
        }
        let leftovers = fs::read_dir(dir.path().join(DEALS_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
