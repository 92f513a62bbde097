//! Tab-scoped session markers written by bootstrap and consumed by the controller.

use std::sync::Arc;

use anyhow::{Context, Result};
use storage::KeyValueStore;
use tracing::warn;

pub const SESSION_ACTIVE_KEY: &str = "sessionActive";
pub const INITIAL_MESSAGE_KEY: &str = "initialMessage";
const SESSION_ACTIVE_VALUE: &str = "true";

#[derive(Clone)]
pub struct SessionMarkers {
    store: Arc<dyn KeyValueStore>,
}

impl SessionMarkers {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes the greeting, then the flag. Either both land or neither does.
    pub async fn begin(&self, greeting: &str) -> Result<()> {
        self.store
            .set(INITIAL_MESSAGE_KEY, greeting)
            .await
            .context("failed to store pending first turn")?;

        if let Err(err) = self
            .store
            .set(SESSION_ACTIVE_KEY, SESSION_ACTIVE_VALUE)
            .await
        {
            if let Err(cleanup) = self.store.remove(INITIAL_MESSAGE_KEY).await {
                warn!("markers: failed to roll back pending first turn: {cleanup:#}");
            }
            return Err(err.context("failed to set session flag"));
        }
        Ok(())
    }

    pub async fn is_active(&self) -> bool {
        match self.store.get(SESSION_ACTIVE_KEY).await {
            Ok(value) => value.as_deref() == Some(SESSION_ACTIVE_VALUE),
            Err(err) => {
                warn!("markers: session flag unreadable, treating as absent: {err:#}");
                false
            }
        }
    }

    /// Read-then-clear. Yields the greeting once; later calls return `None`.
    pub async fn take_first_turn(&self) -> Option<String> {
        match self.store.take(INITIAL_MESSAGE_KEY).await {
            Ok(value) => value.filter(|text| !text.trim().is_empty()),
            Err(err) => {
                warn!("markers: pending first turn unreadable: {err:#}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingStore;

    #[tokio::test]
    async fn first_turn_is_yielded_exactly_once() {
        let markers = SessionMarkers::new(Arc::new(CountingStore::default()));
        markers.begin("Welcome").await.expect("begin");

        assert!(markers.is_active().await);
        assert_eq!(markers.take_first_turn().await.as_deref(), Some("Welcome"));
        assert_eq!(markers.take_first_turn().await, None);
        assert!(markers.is_active().await, "flag survives consumption");
    }

    #[tokio::test]
    async fn flag_failure_rolls_back_greeting() {
        let store = Arc::new(CountingStore::default());
        store
            .fail_writes_for
            .lock()
            .await
            .push(SESSION_ACTIVE_KEY.to_string());
        let markers = SessionMarkers::new(store.clone());

        assert!(markers.begin("Welcome").await.is_err());

        assert!(!markers.is_active().await);
        assert_eq!(store.get(INITIAL_MESSAGE_KEY).await.expect("get"), None);
    }

    #[tokio::test]
    async fn absent_flag_reads_inactive() {
        let markers = SessionMarkers::new(Arc::new(CountingStore::default()));
        assert!(!markers.is_active().await);
        assert_eq!(markers.take_first_turn().await, None);
    }
}
