//! Durability, export and backup across store handles

use dealkit_lib::backup::{backup_store, read_backup, restore_snapshot, BACKUP_PREFIX};
use dealkit_lib::export::{export_deals_csv, EXPORT_HEADER};
use dealkit_lib::{
    Amount, Category, DealEngine, DealEvent, DealFilter, DealId, DealStatus, DealStore, FileStore,
    MemoryStore, UserId,
};
use std::sync::Arc;
use tempfile::tempdir;

const SELLER: UserId = UserId(7);
const BUYER: UserId = UserId(8);

/// Three deals: one finished, one waiting for payment, one untouched.
async fn populate(engine: &DealEngine) -> Vec<DealId> {
    engine.register_user(SELLER, Some("seller")).await.unwrap();
    engine.set_wallet(SELLER, "UQ-seller").await.unwrap();
    engine.register_user(BUYER, Some("buyer")).await.unwrap();

    let mut ids = Vec::new();
    for (i, item) in ["first, with comma", "second \"quoted\"", "third"].iter().enumerate() {
        ids.push(
            engine
                .create_deal(
                    SELLER,
                    Amount::parse_user_input(&format!("{}.5", i + 1)).unwrap(),
                    Category::Gift,
                    item,
                    "",
                )
                .await
                .unwrap(),
        );
    }

    engine.apply_transition(&ids[0], DealEvent::Join, BUYER).await.unwrap();
    engine.apply_transition(&ids[0], DealEvent::MarkPaid, BUYER).await.unwrap();
    engine.apply_transition(&ids[0], DealEvent::Finish, SELLER).await.unwrap();
    engine.apply_transition(&ids[1], DealEvent::Join, BUYER).await.unwrap();
    ids
}

#[tokio::test]
async fn test_deals_survive_reopen() {
    let dir = tempdir().unwrap();
    let ids = {
        let engine = DealEngine::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        populate(&engine).await
    };

    let engine = DealEngine::new(Arc::new(FileStore::open(dir.path()).unwrap()));
    assert_eq!(engine.get_deal(&ids[0]).await.unwrap().status, DealStatus::Finished);
    let waiting = engine.get_deal(&ids[1]).await.unwrap();
    assert_eq!(waiting.status, DealStatus::WaitingPayment);
    assert_eq!(waiting.buyer_id, Some(BUYER));

    let seller = engine.user(SELLER).await.unwrap().unwrap();
    assert_eq!(seller.wallet.as_deref(), Some("UQ-seller"));

    let listed: Vec<_> = engine
        .deals_for_user(SELLER)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(listed, vec![ids[2].clone(), ids[1].clone(), ids[0].clone()]);

    engine.apply_transition(&ids[1], DealEvent::MarkPaid, BUYER).await.unwrap();
    assert_eq!(engine.get_deal(&ids[1]).await.unwrap().status, DealStatus::Paid);
}

#[tokio::test]
async fn test_export_lists_newest_first() {
    let dir = tempdir().unwrap();
    let engine = DealEngine::new(Arc::new(FileStore::open(dir.path().join("data")).unwrap()));
    let ids = populate(&engine).await;

    let path = dir.path().join("deals.csv");
    let rows = export_deals_csv(engine.store().as_ref(), &path).await.unwrap();
    assert_eq!(rows, 3);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], EXPORT_HEADER.join(","));
    assert!(lines[1].starts_with(&format!("{},{},,gift,third,", ids[2], SELLER)));
    assert!(lines[2].contains("\"second \"\"quoted\"\"\""));
    assert!(lines[2].contains(",waiting_payment,"));
    assert!(lines[3].contains("\"first, with comma\""));
    assert!(lines[3].contains(",finished,"));
}

#[tokio::test]
async fn test_backup_restores_into_fresh_store() {
    let dir = tempdir().unwrap();
    let source = DealEngine::new(Arc::new(FileStore::open(dir.path().join("data")).unwrap()));
    populate(&source).await;

    let backup_dir = dir.path().join("backups");
    let path = backup_store(source.store().as_ref(), &backup_dir).await.unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(BACKUP_PREFIX));
    assert!(name.ends_with(".json"));

    let second = backup_store(source.store().as_ref(), &backup_dir).await.unwrap();
    assert_ne!(second, path);

    let snapshot = read_backup(&path).unwrap();
    assert_eq!(snapshot.users.len(), 2);
    assert_eq!(snapshot.deals.len(), 3);

    let target = MemoryStore::new();
    restore_snapshot(&target, &snapshot).await.unwrap();

    let original = source.store().list_deals(&DealFilter::All).await.unwrap();
    let restored = target.list_deals(&DealFilter::All).await.unwrap();
    assert_eq!(restored, original);
    assert_eq!(
        target.get_user(SELLER).await.unwrap(),
        source.user(SELLER).await.unwrap()
    );
}

#[tokio::test]
async fn test_corrupt_backup_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, b"{not json").unwrap();
    let err = read_backup(&path).unwrap_err();
    assert!(!err.is_retryable());
}
