//! TTL cache in front of a [`ConfigStore`].
//!
//! Expiry is measured with the injected [`Clock`], so tests decide when an
//! entry goes stale. Admin-side configuration changes call one of the
//! `invalidate_*` methods.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc, Weekday};
use moka::future::Cache;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::branch::{Branch, ShopConfig};
use crate::repositories::ConfigStore;
use crate::types::{BranchId, UserId};
use crate::utils::time::Clock;

/// Upper bound on entries per slot.
const SLOT_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// One `moka` cache per lookup. `moka` evicts on its own wall-clock TTL and
/// capacity bound; freshness as seen by callers follows the injected clock.
struct Slot<K, V> {
    entries: Cache<K, Entry<V>>,
}

impl<K, V> Slot<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new(ttl: Duration) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(SLOT_CAPACITY)
            .support_invalidation_closures();
        if let Ok(ttl) = ttl.to_std() {
            builder = builder.time_to_live(ttl);
        }
        Self {
            entries: builder.build(),
        }
    }

    async fn get(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let entry = self.entries.get(key).await?;
        if entry.expires_at <= now {
            self.entries.invalidate(key).await;
            return None;
        }
        Some(entry.value)
    }

    async fn put(&self, key: K, value: V, expires_at: DateTime<Utc>) {
        self.entries.insert(key, Entry { value, expires_at }).await;
    }

    async fn invalidate(&self, key: &K) {
        self.entries.invalidate(key).await;
    }

    fn clear(&self) {
        self.entries.invalidate_all();
    }

    fn invalidate_if<F>(&self, predicate: F)
    where
        F: Fn(&K, &Entry<V>) -> bool + Send + Sync + 'static,
    {
        if let Err(err) = self.entries.invalidate_entries_if(predicate) {
            tracing::warn!(error = %err, "config cache predicate invalidation failed");
            self.clear();
        }
    }
}

pub struct CachedConfigStore {
    inner: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    user_branches: Slot<UserId, Vec<Branch>>,
    branches: Slot<BranchId, Option<Branch>>,
    shop_configs: Slot<(BranchId, Weekday), Option<ShopConfig>>,
    geofence: Slot<UserId, bool>,
}

impl CachedConfigStore {
    pub fn new(inner: Arc<dyn ConfigStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner,
            clock,
            ttl,
            user_branches: Slot::new(ttl),
            branches: Slot::new(ttl),
            shop_configs: Slot::new(ttl),
            geofence: Slot::new(ttl),
        }
    }

    fn expiry(&self) -> DateTime<Utc> {
        self.clock.now() + self.ttl
    }

    /// Drops everything cached about one branch.
    pub async fn invalidate_branch(&self, branch_id: BranchId) {
        self.branches.invalidate(&branch_id).await;
        self.shop_configs
            .invalidate_if(move |(branch, _), _| *branch == branch_id);
        self.user_branches
            .invalidate_if(move |_, entry| entry.value.iter().any(|b| b.id == branch_id));
    }

    /// Drops a user's assignments and geofence flag.
    pub async fn invalidate_user(&self, user_id: UserId) {
        self.user_branches.invalidate(&user_id).await;
        self.geofence.invalidate(&user_id).await;
    }

    pub fn invalidate_all(&self) {
        self.user_branches.clear();
        self.branches.clear();
        self.shop_configs.clear();
        self.geofence.clear();
    }
}

#[async_trait]
impl ConfigStore for CachedConfigStore {
    async fn branches_for_user(&self, user_id: UserId) -> Result<Vec<Branch>, AppError> {
        if let Some(hit) = self.user_branches.get(&user_id, self.clock.now()).await {
            return Ok(hit);
        }
        let value = self.inner.branches_for_user(user_id).await?;
        self.user_branches
            .put(user_id, value.clone(), self.expiry())
            .await;
        Ok(value)
    }

    async fn branch(&self, branch_id: BranchId) -> Result<Option<Branch>, AppError> {
        if let Some(hit) = self.branches.get(&branch_id, self.clock.now()).await {
            return Ok(hit);
        }
        let value = self.inner.branch(branch_id).await?;
        self.branches
            .put(branch_id, value.clone(), self.expiry())
            .await;
        Ok(value)
    }

    async fn shop_config(
        &self,
        branch_id: BranchId,
        weekday: Weekday,
    ) -> Result<Option<ShopConfig>, AppError> {
        let key = (branch_id, weekday);
        if let Some(hit) = self.shop_configs.get(&key, self.clock.now()).await {
            return Ok(hit);
        }
        let value = self.inner.shop_config(branch_id, weekday).await?;
        self.shop_configs
            .put(key, value.clone(), self.expiry())
            .await;
        Ok(value)
    }

    async fn geofence_enabled(&self, user_id: UserId) -> Result<bool, AppError> {
        if let Some(hit) = self.geofence.get(&user_id, self.clock.now()).await {
            return Ok(hit);
        }
        let value = self.inner.geofence_enabled(user_id).await?;
        self.geofence.put(user_id, value, self.expiry()).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockConfigStore;
    use crate::utils::time::ManualClock;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn entries_are_served_until_ttl_elapses() {
        let branch = BranchId::new();
        let mut inner = MockConfigStore::new();
        inner
            .expect_shop_config()
            .times(2)
            .returning(|_, _| Ok(Some(ShopConfig::default())));
        let clock = clock();
        let cache = CachedConfigStore::new(Arc::new(inner), clock.clone(), Duration::minutes(5));

        cache.shop_config(branch, Weekday::Mon).await.unwrap();
        clock.advance_minutes(4);
        cache.shop_config(branch, Weekday::Mon).await.unwrap();
        clock.advance_minutes(1);
        cache.shop_config(branch, Weekday::Mon).await.unwrap();
    }

    #[tokio::test]
    async fn stale_entries_are_evicted_on_read() {
        let branch = BranchId::new();
        let mut inner = MockConfigStore::new();
        inner.expect_branch().times(1).returning(|_| Ok(None));
        let clock = clock();
        let cache = CachedConfigStore::new(Arc::new(inner), clock.clone(), Duration::minutes(5));

        assert_eq!(cache.branch(branch).await.unwrap(), None);
        assert!(cache.branches.entries.get(&branch).await.is_some());

        clock.advance_minutes(5);
        assert_eq!(cache.branches.get(&branch, clock.now()).await, None);
        assert!(cache.branches.entries.get(&branch).await.is_none());
    }

    #[tokio::test]
    async fn invalidation_forces_reload() {
        let user = UserId::new();
        let mut inner = MockConfigStore::new();
        inner
            .expect_geofence_enabled()
            .times(2)
            .returning(|_| Ok(true));
        let cache = CachedConfigStore::new(Arc::new(inner), clock(), Duration::minutes(5));

        assert!(cache.geofence_enabled(user).await.unwrap());
        assert!(cache.geofence_enabled(user).await.unwrap());
        cache.invalidate_user(user).await;
        assert!(cache.geofence_enabled(user).await.unwrap());
    }

    #[tokio::test]
    async fn invalidate_all_reloads_every_lookup() {
        let user = UserId::new();
        let branch = BranchId::new();
        let mut inner = MockConfigStore::new();
        inner
            .expect_branches_for_user()
            .times(2)
            .returning(|_| Ok(Vec::new()));
        inner.expect_branch().times(2).returning(|_| Ok(None));
        let cache = CachedConfigStore::new(Arc::new(inner), clock(), Duration::minutes(5));

        cache.branches_for_user(user).await.unwrap();
        cache.branch(branch).await.unwrap();
        cache.invalidate_all();
        cache.branches_for_user(user).await.unwrap();
        cache.branch(branch).await.unwrap();
    }

    #[tokio::test]
    async fn branch_invalidation_drops_its_shop_configs() {
        let branch = BranchId::new();
        let mut inner = MockConfigStore::new();
        inner
            .expect_shop_config()
            .times(2)
            .returning(|_, _| Ok(None));
        let cache = CachedConfigStore::new(Arc::new(inner), clock(), Duration::minutes(5));

        assert_eq!(cache.shop_config(branch, Weekday::Tue).await.unwrap(), None);
        cache.invalidate_branch(branch).await;
        assert_eq!(cache.shop_config(branch, Weekday::Tue).await.unwrap(), None);
    }
}
