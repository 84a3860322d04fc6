//! Lazy load-once cache for expensive shared resources.
//!
//! The historical dataset, the monthly history and the fitted model are
//! each computed once and reused across requests until someone calls
//! [`LazyCache::invalidate`] (for example after a refit).

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

// ---

/// A slot that is filled on first use and shared afterwards.
#[derive(Debug)]
pub struct LazyCache<T> {
    // ---
    name: &'static str,
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> LazyCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value, running `load` first if the slot is empty.
    ///
    /// Concurrent callers wait for a single in-flight load. If `load`
    /// fails the error is returned and the slot stays empty, so the next
    /// call retries.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // ---
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }

        tracing::debug!("Cache '{}' empty, loading", self.name);
        let value = Arc::new(load().await?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Store `value` directly, replacing whatever was cached.
    pub async fn replace(&self, value: T) -> Arc<T> {
        // ---
        let value = Arc::new(value);
        *self.slot.lock().await = Some(Arc::clone(&value));
        tracing::debug!("Cache '{}' replaced", self.name);
        value
    }

    /// Drop the cached value; the next `get_or_load` reloads.
    pub async fn invalidate(&self) {
        // ---
        if self.slot.lock().await.take().is_some() {
            tracing::info!("Cache '{}' invalidated", self.name);
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_loads_once_until_invalidated() {
        // ---
        let cache: LazyCache<u32> = LazyCache::new("test");
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(7)
        };

        tokio_test::block_on(async {
            assert_eq!(*cache.get_or_load(load).await.unwrap(), 7);
            assert_eq!(*cache.get_or_load(load).await.unwrap(), 7);
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            cache.invalidate().await;
            assert!(!cache.is_loaded().await);
            assert_eq!(*cache.get_or_load(load).await.unwrap(), 7);
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        // ---
        let cache: LazyCache<u32> = LazyCache::new("test");
        tokio_test::block_on(async {
            let err = cache
                .get_or_load(|| async { Err::<u32, _>("boom") })
                .await
                .unwrap_err();
            assert_eq!(err, "boom");
            assert!(!cache.is_loaded().await);

            let value = cache.get_or_load(|| async { Ok::<_, &str>(3) }).await;
            assert_eq!(*value.unwrap(), 3);
        });
    }

    #[test]
    fn test_replace_overrides_cached_value() {
        // ---
        let cache: LazyCache<&str> = LazyCache::new("test");
        tokio_test::block_on(async {
            cache.replace("first").await;
            let value = cache
                .get_or_load(|| async { Ok::<_, ()>("never") })
                .await
                .unwrap();
            assert_eq!(*value, "first");
        });
    }
}
