//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired entries out of the
//! local store, so idle keys release their slots before LRU eviction.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::local::SharedLocalStore;

/// Spawns a background task that removes expired local entries every
/// `cleanup_interval_secs` seconds.
///
/// Returns a JoinHandle so the task can be aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let store = LocalStore::shared(1000);
/// let cleanup_handle = spawn_cleanup_task(store.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(store: SharedLocalStore, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = match store.lock() {
                Ok(mut guard) => guard.cleanup_expired(),
                Err(_) => {
                    warn!("TTL cleanup: local store lock poisoned, stopping");
                    break;
                }
            };

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStore;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let store = LocalStore::shared(100);
        store
            .lock()
            .unwrap()
            .set("expire_soon", "value".to_string(), Some(1))
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        {
            let guard = store.lock().unwrap();
            assert!(guard.peek("expire_soon").is_none(), "Expired entry should have been swept");
            assert_eq!(guard.stats().expirations, 1);
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store = LocalStore::shared(100);
        store
            .lock()
            .unwrap()
            .set("long_lived", "value".to_string(), Some(3600))
            .unwrap();

        let handle = spawn_cleanup_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.lock().unwrap().get("long_lived").as_deref(), Some("value"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(LocalStore::shared(10), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
