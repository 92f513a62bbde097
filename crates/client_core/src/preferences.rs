//! Durable setup-form preferences.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use shared::domain::SetupPreferences;
use storage::KeyValueStore;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

pub const PREFERENCES_KEY: &str = "interview.setup_preferences";

#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stamps `last_updated` and overwrites whatever was stored before.
    pub async fn save(&self, prefs: &SetupPreferences) -> Result<SetupPreferences> {
        let stamped = SetupPreferences {
            last_updated: Some(Utc::now()),
            ..prefs.clone()
        };
        let encoded =
            serde_json::to_string(&stamped).context("failed to encode setup preferences")?;
        self.store
            .set(PREFERENCES_KEY, &encoded)
            .await
            .context("failed to persist setup preferences")?;
        debug!("preferences: saved");
        Ok(stamped)
    }

    /// Last saved preferences, or empty defaults when nothing usable is stored.
    pub async fn load(&self) -> SetupPreferences {
        let raw = match self.store.get(PREFERENCES_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return SetupPreferences::default(),
            Err(err) => {
                warn!("preferences: read failed, using defaults: {err:#}");
                return SetupPreferences::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!("preferences: stored value is corrupt, using defaults: {err}");
            SetupPreferences::default()
        })
    }
}

enum WriterCommand {
    Record(SetupPreferences),
    Flush(oneshot::Sender<()>),
}

/// Coalesces keystroke-level form changes into one write per quiet period.
pub struct DebouncedPreferenceWriter {
    tx: mpsc::UnboundedSender<WriterCommand>,
    task: JoinHandle<()>,
}

impl DebouncedPreferenceWriter {
    pub fn spawn(store: PreferenceStore, quiet_period: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(store, quiet_period, rx));
        Self { tx, task }
    }

    pub fn record(&self, prefs: SetupPreferences) {
        if self.tx.send(WriterCommand::Record(prefs)).is_err() {
            warn!("preferences: writer task stopped; change dropped");
        }
    }

    /// Writes any pending change now and waits for it to land.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Flushes and stops the writer task.
    pub async fn close(self) {
        self.flush().await;
        drop(self.tx);
        let _ = self.task.await;
    }
}

async fn run_writer(
    store: PreferenceStore,
    quiet_period: Duration,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    let mut pending: Option<SetupPreferences> = None;
    loop {
        let command = if pending.is_some() {
            match tokio::time::timeout(quiet_period, rx.recv()).await {
                Ok(command) => command,
                Err(_) => {
                    write_pending(&store, &mut pending).await;
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(WriterCommand::Record(prefs)) => pending = Some(prefs),
            Some(WriterCommand::Flush(ack)) => {
                write_pending(&store, &mut pending).await;
                let _ = ack.send(());
            }
            None => {
                write_pending(&store, &mut pending).await;
                break;
            }
        }
    }
}

async fn write_pending(store: &PreferenceStore, pending: &mut Option<SetupPreferences>) {
    if let Some(prefs) = pending.take() {
        if let Err(err) = store.save(&prefs).await {
            warn!("preferences: debounced save failed: {err:#}");
        }
    }
}

#[cfg(test)]
#[path = "tests/preferences_tests.rs"]
mod tests;
