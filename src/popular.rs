// Popularity registrar
//
// A link whose vote count crosses the threshold is added to the popular set.
// Only a first-time add triggers a Yo-all broadcast, which runs in its own
// task after a short delay. The uploader drains the pending broadcasts with
// `finish` before it disconnects.

use crate::notify::Notifier;
use crate::store::LinkStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// What happened to a link handed to [`PopularityRegistrar::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First time popular; a broadcast was scheduled
    Added,
    /// Already in the popular set; nothing to do
    AlreadyPopular,
    /// The store write failed; logged, not retried
    Failed,
}

/// Outcome of the broadcasts scheduled during one refresh cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
}

pub struct PopularityRegistrar {
    store: LinkStore,
    notifier: Arc<dyn Notifier>,
    delay: Duration,
    pending: JoinSet<bool>,
}

impl PopularityRegistrar {
    pub fn new(store: LinkStore, notifier: Arc<dyn Notifier>, delay: Duration) -> Self {
        Self {
            store,
            notifier,
            delay,
            pending: JoinSet::new(),
        }
    }

    pub async fn register(&mut self, link: &str) -> Registration {
        match self.store.add_popular(link).await {
            Err(e) => {
                error!(link = %link, error = %e, "Failed to add link to the popular set");
                Registration::Failed
            }
            Ok(false) => {
                debug!(link = %link, "Link is already popular");
                Registration::AlreadyPopular
            }
            Ok(true) => {
                info!(link = %link, "Found a new popular link");
                self.schedule_broadcast(link.to_string());
                Registration::Added
            }
        }
    }

    fn schedule_broadcast(&mut self, link: String) {
        let notifier = Arc::clone(&self.notifier);
        let delay = self.delay;
        self.pending.spawn(async move {
            tokio::time::sleep(delay).await;
            match notifier.yo_all(&link).await {
                Ok(()) => {
                    info!(link = %link, "Broadcast popular link");
                    true
                }
                Err(e) => {
                    error!(link = %link, error = %e, "Yo-all broadcast failed");
                    false
                }
            }
        });
    }

    /// Wait for every scheduled broadcast to complete
    pub async fn finish(mut self) -> BroadcastSummary {
        let mut summary = BroadcastSummary::default();
        while let Some(result) = self.pending.join_next().await {
            match result {
                Ok(true) => summary.sent += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    error!(error = %e, "Broadcast task did not complete");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use yo9gag_config::StoreKeys;

    #[derive(Default)]
    struct Broadcasts(Mutex<Vec<String>>);

    #[async_trait]
    impl Notifier for Broadcasts {
        async fn yo(&self, _username: &str, _link: &str) -> Result<(), NotifyError> {
            Ok(())
        }

        async fn yo_all(&self, link: &str) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(link.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_broadcasts_once_per_link() {
        let store = LinkStore::new(Arc::new(MemoryStore::new()), StoreKeys::default());
        let notifier = Arc::new(Broadcasts::default());

        let mut registrar =
            PopularityRegistrar::new(store.clone(), notifier.clone(), Duration::ZERO);
        assert_eq!(registrar.register("link1").await, Registration::Added);
        assert_eq!(
            registrar.register("link1").await,
            Registration::AlreadyPopular
        );
        assert_eq!(
            registrar.finish().await,
            BroadcastSummary { sent: 1, failed: 0 }
        );

        // A later cycle sees the same link again
        let mut registrar = PopularityRegistrar::new(store, notifier.clone(), Duration::ZERO);
        assert_eq!(
            registrar.register("link1").await,
            Registration::AlreadyPopular
        );
        assert_eq!(registrar.finish().await, BroadcastSummary::default());

        assert_eq!(*notifier.0.lock().unwrap(), vec!["link1".to_string()]);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_broadcast() {
        let backend = Arc::new(MemoryStore::new());
        let store = LinkStore::new(backend.clone(), StoreKeys::default());
        // Make the popular key a hash so SADD fails
        store
            .increment_daily(crate::store::DailyCounter::ReceivedYo, "x")
            .await
            .unwrap();
        let keys = StoreKeys {
            popular: StoreKeys::default().yo_count,
            ..StoreKeys::default()
        };
        let store = LinkStore::new(backend, keys);
        let notifier = Arc::new(Broadcasts::default());

        let mut registrar = PopularityRegistrar::new(store, notifier.clone(), Duration::ZERO);
        assert_eq!(registrar.register("link1").await, Registration::Failed);
        assert_eq!(registrar.finish().await, BroadcastSummary::default());
        assert!(notifier.0.lock().unwrap().is_empty());
    }
}
