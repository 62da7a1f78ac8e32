use super::{
    now_timestamp, sort_newest_first, DealFilter, DealPatch, DealStore, StoreSnapshot, UserPatch,
};
use crate::errors::Result;
use crate::models::{Deal, DealId, User, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct DealTable {
    records: HashMap<DealId, Deal>,
    /// Insertion order.
    order: Vec<DealId>,
}

impl DealTable {
    fn upsert(&mut self, deal: Deal) {
        if !self.records.contains_key(&deal.id) {
            self.order.push(deal.id.clone());
        }
        self.records.insert(deal.id.clone(), deal);
    }
}

/// Process-local store backed by lock-guarded maps.
///
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    deals: RwLock<DealTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DealStore for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(&id).cloned())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        if users.contains_key(&user.id) {
            return Ok(false);
        }
        users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch<'_>) -> Result<Option<User>> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        Ok(users.get_mut(&id).map(|user| {
            patch(user);
            user.clone()
        }))
    }

    async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>> {
        let deals = self.deals.read().unwrap_or_else(|e| e.into_inner());
        Ok(deals.records.get(id).cloned())
    }

    async fn put_deal(&self, deal: &Deal) -> Result<()> {
        let mut deals = self.deals.write().unwrap_or_else(|e| e.into_inner());
        deals.upsert(deal.clone());
        Ok(())
    }

    async fn insert_deal(&self, deal: &Deal) -> Result<bool> {
        let mut deals = self.deals.write().unwrap_or_else(|e| e.into_inner());
        if deals.records.contains_key(&deal.id) {
            return Ok(false);
        }
        deals.upsert(deal.clone());
        Ok(true)
    }

    async fn update_deal(&self, id: &DealId, patch: DealPatch<'_>) -> Result<Option<Deal>> {
        let mut deals = self.deals.write().unwrap_or_else(|e| e.into_inner());
        let Some(current) = deals.records.get(id) else {
            return Ok(None);
        };
        let mut next = current.clone();
        patch(&mut next)?;
        deals.records.insert(id.clone(), next.clone());
        Ok(Some(next))
    }

    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>> {
        let deals = self.deals.read().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<(usize, Deal)> = deals
            .order
            .iter()
            .enumerate()
            .filter_map(|(pos, id)| deals.records.get(id).map(|d| (pos, d)))
            .filter(|(_, deal)| filter.matches(deal))
            .map(|(pos, deal)| (pos, deal.clone()))
            .collect();
        sort_newest_first(&mut matching);
        Ok(matching.into_iter().map(|(_, deal)| deal).collect())
    }

    async fn snapshot(&self) -> Result<StoreSnapshot> {
        // Both locks are held together so the copy is consistent.
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let deals = self.deals.read().unwrap_or_else(|e| e.into_inner());

        let mut user_list: Vec<User> = users.values().cloned().collect();
        user_list.sort_by_key(|u| u.id);

        let mut deal_list: Vec<(usize, Deal)> = deals
            .order
            .iter()
            .enumerate()
            .filter_map(|(pos, id)| deals.records.get(id).map(|d| (pos, d.clone())))
            .collect();
        sort_newest_first(&mut deal_list);

        Ok(StoreSnapshot {
            taken_at: now_timestamp(),
            users: user_list,
            deals: deal_list.into_iter().map(|(_, deal)| deal).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;

    #[tokio::test]
    async fn test_users_round_trip() {
        contract::users_round_trip(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_deals_insert_update_list() {
        contract::deals_insert_update_list(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_failed_patch_writes_nothing() {
        contract::failed_patch_writes_nothing(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_snapshot_copies_everything() {
        contract::snapshot_copies_everything(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_put_deal_replaces_without_reordering() {
        let store = MemoryStore::new();
        store.put_deal(&contract::deal("a", 1, 1)).await.unwrap();
        store.put_deal(&contract::deal("b", 1, 1)).await.unwrap();
        let mut a = contract::deal("a", 1, 1);
        a.description = "edited".to_string();
        store.put_deal(&a).await.unwrap();

        let listed = store.list_deals(&DealFilter::All).await.unwrap();
        assert_eq!(listed[0].id.as_str(), "b");
        assert_eq!(listed[1].description, "edited");
    }
}
