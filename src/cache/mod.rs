//! Per-tenant view cache with stale-while-revalidate semantics.
//!
//! Frequently-polled aggregates (pending-inbound-by-supplier, order-candidate
//! product lists) are served from here. A fresh hit is returned directly; a
//! stale hit is returned immediately while a background refresh runs; every
//! mutating transition invalidates the affected tenant's views synchronously.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

/// Well-known view names, so services and invalidation hooks agree on keys.
pub mod views {
    pub const PENDING_INBOUND: &str = "pending_inbound_by_supplier";
    pub const ORDER_CANDIDATES: &str = "order_candidate_products";
    pub const OUTBOUND_HISTORY: &str = "outbound_history";
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ViewKey {
    tenant_id: Uuid,
    view: String,
}

struct CachedView {
    value: serde_json::Value,
    refreshed_at: Instant,
    refreshing: Arc<AtomicBool>,
}

/// In-process cache keyed by (tenant, view).
#[derive(Clone)]
pub struct ViewCache {
    entries: Arc<DashMap<ViewKey, CachedView>>,
    ttl: Duration,
}

impl ViewCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Returns the cached view, loading it on a miss. A stale entry is
    /// returned as-is and refreshed in the background; the caller never waits
    /// for the revalidation.
    pub async fn get_with<F, Fut>(
        &self,
        tenant_id: Uuid,
        view: &str,
        loader: F,
    ) -> Result<serde_json::Value, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<serde_json::Value, String>> + Send,
    {
        let key = ViewKey {
            tenant_id,
            view: view.to_string(),
        };

        if let Some(entry) = self.entries.get(&key) {
            let age = entry.refreshed_at.elapsed();
            let value = entry.value.clone();
            let refreshing = entry.refreshing.clone();
            drop(entry);

            if age <= self.ttl {
                return Ok(value);
            }

            // Stale: hand back the old value, kick one refresh
            if refreshing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let entries = self.entries.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    match loader().await {
                        Ok(fresh) => {
                            entries.insert(
                                key,
                                CachedView {
                                    value: fresh,
                                    refreshed_at: Instant::now(),
                                    refreshing: Arc::new(AtomicBool::new(false)),
                                },
                            );
                        }
                        Err(e) => {
                            refreshing.store(false, Ordering::Release);
                            warn!(error = %e, "Background view refresh failed, keeping stale entry");
                        }
                    }
                });
            }
            return Ok(value);
        }

        // Miss: load synchronously
        let value = loader().await.map_err(CacheError::OperationFailed)?;
        self.entries.insert(
            key,
            CachedView {
                value: value.clone(),
                refreshed_at: Instant::now(),
                refreshing: Arc::new(AtomicBool::new(false)),
            },
        );
        Ok(value)
    }

    /// Synchronously drops the named views for a tenant. Called from every
    /// mutating transition that could affect them.
    pub fn invalidate(&self, tenant_id: Uuid, views: &[&str]) {
        for view in views {
            let key = ViewKey {
                tenant_id,
                view: (*view).to_string(),
            };
            if self.entries.remove(&key).is_some() {
                debug!(%tenant_id, view, "View cache invalidated");
            }
        }
    }

    /// Drops every cached view for a tenant.
    pub fn invalidate_tenant(&self, tenant_id: Uuid) {
        self.entries.retain(|key, _| key.tenant_id != tenant_id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn miss_loads_and_caches() {
        let cache = ViewCache::new(Duration::from_secs(60));
        let tenant = Uuid::new_v4();

        let value = cache
            .get_with(tenant, views::ORDER_CANDIDATES, || async {
                Ok(json!({"products": 3}))
            })
            .await
            .unwrap();

        assert_eq!(value, json!({"products": 3}));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn fresh_hit_skips_loader() {
        let cache = ViewCache::new(Duration::from_secs(60));
        let tenant = Uuid::new_v4();

        cache
            .get_with(tenant, views::ORDER_CANDIDATES, || async {
                Ok(json!("first"))
            })
            .await
            .unwrap();

        let value = cache
            .get_with(tenant, views::ORDER_CANDIDATES, || async {
                panic!("loader must not run on a fresh hit")
            })
            .await
            .unwrap();

        assert_eq!(value, json!("first"));
    }

    #[tokio::test]
    async fn stale_hit_returns_old_value_then_revalidates() {
        let cache = ViewCache::new(Duration::from_millis(0));
        let tenant = Uuid::new_v4();

        cache
            .get_with(tenant, views::PENDING_INBOUND, || async { Ok(json!(1)) })
            .await
            .unwrap();

        // Entry is immediately stale (zero TTL): the old value comes back
        // without waiting for the refresh.
        let stale = cache
            .get_with(tenant, views::PENDING_INBOUND, || async { Ok(json!(2)) })
            .await
            .unwrap();
        assert_eq!(stale, json!(1));

        // Let the background refresh land
        tokio::time::sleep(Duration::from_millis(50)).await;

        let refreshed = cache
            .get_with(tenant, views::PENDING_INBOUND, || async { Ok(json!(3)) })
            .await
            .unwrap();
        assert_eq!(refreshed, json!(2));
    }

    #[tokio::test]
    async fn invalidation_forces_reload() {
        let cache = ViewCache::new(Duration::from_secs(60));
        let tenant = Uuid::new_v4();

        cache
            .get_with(tenant, views::ORDER_CANDIDATES, || async { Ok(json!("a")) })
            .await
            .unwrap();

        cache.invalidate(tenant, &[views::ORDER_CANDIDATES]);

        let value = cache
            .get_with(tenant, views::ORDER_CANDIDATES, || async { Ok(json!("b")) })
            .await
            .unwrap();
        assert_eq!(value, json!("b"));
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_tenant() {
        let cache = ViewCache::new(Duration::from_secs(60));
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        cache
            .get_with(tenant_a, views::PENDING_INBOUND, || async { Ok(json!("a")) })
            .await
            .unwrap();
        cache
            .get_with(tenant_b, views::PENDING_INBOUND, || async { Ok(json!("b")) })
            .await
            .unwrap();

        cache.invalidate_tenant(tenant_a);
        assert_eq!(cache.len(), 1);

        let value = cache
            .get_with(tenant_b, views::PENDING_INBOUND, || async {
                panic!("tenant B entry should still be fresh")
            })
            .await
            .unwrap();
        assert_eq!(value, json!("b"));
    }
}
