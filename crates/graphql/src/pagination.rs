//! Per-request pagination hand-off between a list action and the
//! `pagination(key:)` query field.
//!
//! The action producing a page resolves the [`Deferred`] for its key; the
//! companion field awaits it. The schema has to let the producer run before
//! or alongside the consumer: if the consumer is resolved first and nothing
//! ever resolves the key, the wait ends with a timeout.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {serde_json::Value, tokio::sync::watch};

#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    #[error("pagination for key \"{0}\" is already resolved")]
    AlreadyResolved(String),

    #[error("pagination for key \"{0}\" was not resolved in time")]
    TimedOut(String),
}

/// Single-assignment value that any number of readers can await.
pub struct Deferred {
    key: String,
    tx: watch::Sender<Option<Value>>,
}

impl Deferred {
    fn new(key: String) -> Self {
        let (tx, _) = watch::channel(None);
        Self { key, tx }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Store the value. Only the first call succeeds.
    pub fn resolve(&self, value: Value) -> Result<(), PaginationError> {
        let stored = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        });
        if stored {
            Ok(())
        } else {
            Err(PaginationError::AlreadyResolved(self.key.clone()))
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait for the value, giving up after `timeout`.
    pub async fn wait(&self, timeout: Duration) -> Result<Value, PaginationError> {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            // The sender lives in `self`, so the channel cannot close here.
            rx.wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|slot| (*slot).clone())
        })
        .await;

        match waited {
            Ok(Some(value)) => Ok(value),
            _ => Err(PaginationError::TimedOut(self.key.clone())),
        }
    }
}

/// All pagination slots of one request.
#[derive(Default)]
pub struct PaginationSlots {
    slots: Mutex<HashMap<String, Arc<Deferred>>>,
}

impl PaginationSlots {
    /// Slot for `key`, created on first access.
    pub fn get(&self, key: &str) -> Arc<Deferred> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Deferred::new(key.to_string()))),
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use {super::*, serde_json::json};

    #[tokio::test]
    async fn consumer_waits_for_producer() {
        let slots = Arc::new(PaginationSlots::default());

        let consumer = {
            let slots = Arc::clone(&slots);
            tokio::spawn(async move { slots.get("users").wait(Duration::from_secs(5)).await })
        };

        tokio::task::yield_now().await;
        slots.get("users").resolve(json!({"total": 3})).unwrap();

        assert_eq!(consumer.await.unwrap().unwrap(), json!({"total": 3}));
    }

    #[tokio::test]
    async fn resolve_is_single_assignment() {
        let slots = PaginationSlots::default();
        let slot = slots.get("k");
        slot.resolve(json!(1)).unwrap();
        assert!(matches!(
            slot.resolve(json!(2)),
            Err(PaginationError::AlreadyResolved(_))
        ));
        assert_eq!(slot.wait(Duration::from_millis(10)).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn unresolved_slot_times_out() {
        let slots = PaginationSlots::default();
        let err = slots
            .get("never")
            .wait(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::TimedOut(ref k) if k == "never"));
        assert!(!slots.get("never").is_resolved());
    }
}
