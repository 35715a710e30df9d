//! Key-value store shared by the webhook server and the uploader.
//!
//! [`KeyValueStore`] is the small set of primitive commands both processes
//! need; [`LinkStore`] binds a backend to the configured key names and
//! exposes the domain operations. A `LinkStore` is constructed once per
//! process and passed explicitly to everything that touches the store.

use crate::error::{RefreshError, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use yo9gag_config::StoreKeys;

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Primitive commands against an unordered-set / hash store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Number of members in the set at `key` (0 when missing)
    async fn set_cardinality(&self, key: &str) -> Result<usize, StoreError>;

    /// A uniformly random member of the set at `key`
    async fn random_member(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Add one member; `true` when it was not present before
    async fn add_member(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Add many members; returns how many were newly added
    async fn add_members(&self, key: &str, members: &[String]) -> Result<usize, StoreError>;

    /// Remove `key`; returns the number of keys removed
    async fn delete_key(&self, key: &str) -> Result<usize, StoreError>;

    /// Increment `field` of the hash at `key` by `delta`; returns the new value
    async fn increment_field(&self, key: &str, field: &str, delta: i64)
        -> Result<i64, StoreError>;

    /// Disconnect from the backend
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The two per-day statistics counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyCounter {
    /// Yos received through the webhook
    ReceivedYo,
    /// Subscribers seen for the first time
    NewSubscriber,
}

impl DailyCounter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DailyCounter::ReceivedYo => "received_yo",
            DailyCounter::NewSubscriber => "new_subscriber",
        }
    }
}

/// Results of the three steps of a candidate set replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Keys removed by the delete step (1 when an old set existed)
    pub deleted: usize,
    /// Members added by the bulk insert
    pub added: usize,
    /// Cardinality read back after the insert
    pub cardinality: usize,
}

/// Store handle bound to the configured key names
#[derive(Clone)]
pub struct LinkStore {
    backend: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
}

impl LinkStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, keys: StoreKeys) -> Self {
        Self { backend, keys }
    }

    pub fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    pub async fn candidate_count(&self) -> Result<usize, StoreError> {
        self.backend.set_cardinality(&self.keys.candidates).await
    }

    pub async fn random_candidate(&self) -> Result<Option<String>, StoreError> {
        self.backend.random_member(&self.keys.candidates).await
    }

    /// Replace the candidate set: delete, bulk insert, then re-count.
    ///
    /// The steps are not transactional. A reader running between the delete
    /// and the insert sees an empty or partial set. The first failing step
    /// aborts the remaining ones.
    pub async fn replace_candidates(&self, links: &[String]) -> Result<ReplaceReport, RefreshError> {
        let key = &self.keys.candidates;

        let deleted = self
            .backend
            .delete_key(key)
            .await
            .map_err(|source| RefreshError::Install {
                step: "delete",
                source,
            })?;
        debug!(key = %key, deleted, "Deleted candidate set");

        let added = self
            .backend
            .add_members(key, links)
            .await
            .map_err(|source| RefreshError::Install {
                step: "insert",
                source,
            })?;
        debug!(key = %key, added, "Inserted candidate links");

        let cardinality = self
            .backend
            .set_cardinality(key)
            .await
            .map_err(|source| RefreshError::Install {
                step: "count",
                source,
            })?;
        debug!(key = %key, cardinality, "Counted candidate set");

        Ok(ReplaceReport {
            deleted,
            added,
            cardinality,
        })
    }

    /// Record a link as popular; `true` only the first time
    pub async fn add_popular(&self, link: &str) -> Result<bool, StoreError> {
        self.backend.add_member(&self.keys.popular, link).await
    }

    /// Record a subscriber; `true` only the first time
    pub async fn add_subscriber(&self, subscriber: &str) -> Result<bool, StoreError> {
        self.backend.add_member(&self.keys.subscribers, subscriber).await
    }

    /// Increment `counter` for `day` by one; returns the new value
    pub async fn increment_daily(&self, counter: DailyCounter, day: &str) -> Result<i64, StoreError> {
        let key = match counter {
            DailyCounter::ReceivedYo => &self.keys.yo_count,
            DailyCounter::NewSubscriber => &self.keys.new_subscriber_count,
        };
        self.backend.increment_field(key, day, 1).await
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        self.backend.close().await
    }
}
