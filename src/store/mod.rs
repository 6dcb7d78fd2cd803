//! Generic row store.
//!
//! The manager only needs three things from persistence: read every row of
//! a table, append a row, and count rows matching a predicate. Relational
//! backends implement [`GenericStore`] over their own tables; [`MemoryStore`]
//! is the in-process implementation used by default and in tests.

pub mod models;

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;

pub use models::{CacheSetting, IncomingRequest, LimitSetting, OutgoingRequest};

/// A row type with a store-assigned natural key.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Table name, also used to namespace cache keys derived from the table.
    const TABLE: &'static str;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);
}

/// CRUD access to one table.
#[async_trait]
pub trait GenericStore<T: Entity>: Send + Sync {
    /// Snapshot of every row, read-only.
    async fn query(&self) -> Result<Vec<T>>;

    /// Append a row; returns it with its assigned id.
    async fn add(&self, row: T) -> Result<T>;

    /// Count rows matching `predicate`.
    async fn count_where(
        &self,
        predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> Result<usize>;
}

/// In-memory table.
pub struct MemoryStore<T> {
    rows: RwLock<Vec<T>>,
    next_id: AtomicI64,
}

impl<T: Entity> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Create a store pre-populated with `rows` (ids are reassigned).
    pub fn with_rows(rows: impl IntoIterator<Item = T>) -> Self {
        let mut next_id = 1;
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.set_id(next_id);
                next_id += 1;
                row
            })
            .collect();
        Self {
            rows: RwLock::new(rows),
            next_id: AtomicI64::new(next_id),
        }
    }

    /// Number of rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T: Entity> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> GenericStore<T> for MemoryStore<T> {
    async fn query(&self) -> Result<Vec<T>> {
        Ok(self.rows.read().await.clone())
    }

    async fn add(&self, mut row: T) -> Result<T> {
        row.set_id(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn count_where(
        &self,
        predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> Result<usize> {
        Ok(self.rows.read().await.iter().filter(|r| predicate(r)).count())
    }
}

/// Insert the global [`CacheSetting`] if the table is empty.
///
/// Returns `true` when a row was added.
pub async fn seed_global_settings(store: &dyn GenericStore<CacheSetting>) -> Result<bool> {
    if !store.query().await?.is_empty() {
        return Ok(false);
    }
    store.add(CacheSetting::global_default()).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn add_assigns_increasing_ids() {
        let store = MemoryStore::<LimitSetting>::new();
        let a = store.add(LimitSetting::new(10, 1)).await.unwrap();
        let b = store.add(LimitSetting::new(20, 1)).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn with_rows_assigns_ids() {
        let store = MemoryStore::with_rows([LimitSetting::new(1, 1), LimitSetting::new(2, 1)]);
        let rows = store.query().await.unwrap();
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].id, 2);
        let next = store.add(LimitSetting::new(3, 1)).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn count_where_filters() {
        let store = MemoryStore::with_rows([
            LimitSetting::new(1, 1),
            LimitSetting::new(2, 1).disabled(),
            LimitSetting::new(3, 1),
        ]);
        let enabled = store.count_where(&|r: &LimitSetting| r.enabled).await.unwrap();
        assert_eq!(enabled, 2);
    }

    #[tokio::test]
    async fn count_where_through_trait_object() {
        let store: Arc<dyn GenericStore<LimitSetting>> = Arc::new(MemoryStore::with_rows([
            LimitSetting::new(5, 1),
            LimitSetting::new(50, 1),
            LimitSetting::new(500, 1),
        ]));
        let threshold = 10;
        let above = store
            .count_where(&|r: &LimitSetting| r.request_limit > threshold)
            .await
            .unwrap();
        assert_eq!(above, 2);
    }

    #[tokio::test]
    async fn seed_only_when_empty() {
        let store = MemoryStore::<CacheSetting>::new();
        assert!(seed_global_settings(&store).await.unwrap());
        assert!(!seed_global_settings(&store).await.unwrap());
        let rows = store.query().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].supplier_type, None);
    }
}
