//! Per-request memoization of resolver results.

use std::{collections::HashMap, future::Future, sync::Mutex};

use {
    futures::{
        FutureExt,
        future::{BoxFuture, Shared},
    },
    serde_json::Value,
    sha2::{Digest, Sha256},
};

use crate::error::ResolveError;

/// A memoized computation. Cloning shares the same underlying future.
pub type CachedFuture = Shared<BoxFuture<'static, Result<Value, ResolveError>>>;

/// Key/value store scoped to one request.
///
/// Values are stored as shared futures, so a second lookup while the first
/// computation is still running awaits the same work.
#[derive(Default)]
pub struct CacheContext {
    entries: Mutex<HashMap<String, CachedFuture>>,
}

impl CacheContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored future for `key`, or call `compute` once and store
    /// its future.
    ///
    /// `compute` runs while the entry map is locked, so it must only build
    /// the future and not touch this cache itself.
    pub fn cache<F, Fut>(&self, key: impl Into<String>, compute: F) -> CachedFuture
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
    {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(key.into())
            .or_insert_with(|| compute().boxed().shared())
            .clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stable cache key derived from the listed fields of `params`.
///
/// Fields are sorted by name; arrays and objects are JSON-encoded, strings
/// are used raw. Fields not listed in `used_fields` do not affect the key.
pub fn cache_key(params: &Value, used_fields: &[&str]) -> String {
    let mut names: Vec<&String> = params
        .as_object()
        .map(|obj| {
            obj.keys()
                .filter(|k| used_fields.contains(&k.as_str()))
                .collect()
        })
        .unwrap_or_default();
    names.sort();

    let mut data = String::new();
    for name in names {
        let value = &params[name.as_str()];
        data.push_str(name);
        data.push(':');
        match value {
            Value::String(s) => data.push_str(s),
            other => data.push_str(&other.to_string()),
        }
    }

    format!("{:x}", Sha256::digest(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use {
        super::*,
        serde_json::json,
        std::sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    #[tokio::test]
    async fn computes_once_per_key() {
        let cache = CacheContext::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"n": 1}))
            }
        };

        let first = cache.cache("user:1", make());
        let second = cache.cache("user:1", make());

        assert_eq!(first.await.unwrap(), json!({"n": 1}));
        assert_eq!(second.await.unwrap(), json!({"n": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn in_flight_future_is_shared() {
        let cache = CacheContext::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<Value>();

        let pending = cache.cache("slow", move || async move {
            rx.await.map_err(|_| ResolveError::opaque("dropped"))
        });
        let again = cache.cache("slow", || async { Ok(json!("never")) });

        tx.send(json!("done")).unwrap();
        assert_eq!(again.await.unwrap(), json!("done"));
        assert_eq!(pending.await.unwrap(), json!("done"));
    }

    #[tokio::test]
    async fn errors_are_memoized_too() {
        let cache = CacheContext::new();
        let failing = cache.cache("bad", || async { Err(ResolveError::opaque("boom")) });
        assert!(failing.await.is_err());
        let again = cache.cache("bad", || async { Ok(json!(1)) });
        assert!(again.await.is_err());
    }

    #[test]
    fn cache_key_ignores_unlisted_fields_and_order() {
        let a = cache_key(&json!({"id": 1, "q": "x", "noise": true}), &["q", "id"]);
        let b = cache_key(&json!({"q": "x", "id": 1}), &["id", "q"]);
        let c = cache_key(&json!({"q": "y", "id": 1}), &["id", "q"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn cache_key_encodes_nested_values() {
        let a = cache_key(&json!({"filter": {"a": 1}}), &["filter"]);
        let b = cache_key(&json!({"filter": {"a": 2}}), &["filter"]);
        assert_ne!(a, b);
    }
}
