//! Fakes shared by the unit tests in this crate.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::protocol::{InitializeInterviewRequest, CHAT_PATH, INITIALIZE_PATH};
use storage::{KeyValueStore, MemoryKvStore};
use tokio::sync::{oneshot, Mutex};

use crate::{
    backend::InterviewBackend,
    capture::{ActiveCapture, CaptureDevice},
    error::{BackendError, DeviceError},
};

/// Memory store that counts writes and can be told to fail them.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryKvStore,
    pub writes: AtomicUsize,
    pub fail_writes_for: Mutex<Vec<String>>,
    pub fail_reads: std::sync::atomic::AtomicBool,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("read failure injected for '{key}'"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes_for.lock().await.iter().any(|k| k == key) {
            return Err(anyhow!("write failure injected for '{key}'"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.inner.take(key).await
    }
}

pub enum ChatReply {
    Now(std::result::Result<String, BackendError>),
    Gated(oneshot::Receiver<std::result::Result<String, BackendError>>),
}

pub fn chat_failure() -> BackendError {
    BackendError::network(CHAT_PATH, "connection reset")
}

/// Backend whose answers are scripted per test. Unscripted chats echo.
pub struct ScriptedBackend {
    pub greeting: Mutex<std::result::Result<String, BackendError>>,
    pub initialize_calls: Mutex<Vec<InitializeInterviewRequest>>,
    pub chat_replies: Mutex<VecDeque<ChatReply>>,
    pub chat_calls: Mutex<Vec<String>>,
    pub transcripts: Mutex<VecDeque<std::result::Result<Option<String>, BackendError>>>,
    pub uploads: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            greeting: Mutex::new(Ok("Welcome".to_string())),
            initialize_calls: Mutex::new(Vec::new()),
            chat_replies: Mutex::new(VecDeque::new()),
            chat_calls: Mutex::new(Vec::new()),
            transcripts: Mutex::new(VecDeque::new()),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub async fn fail_initialize(&self, err: BackendError) {
        *self.greeting.lock().await = Err(err);
    }

    pub async fn reply_with(&self, reply: std::result::Result<String, BackendError>) {
        self.chat_replies.lock().await.push_back(ChatReply::Now(reply));
    }

    /// Queues a reply that resolves only when the returned sender fires.
    pub async fn reply_later(
        &self,
    ) -> oneshot::Sender<std::result::Result<String, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.chat_replies.lock().await.push_back(ChatReply::Gated(rx));
        tx
    }

    pub async fn transcribe_with(
        &self,
        result: std::result::Result<Option<String>, BackendError>,
    ) {
        self.transcripts.lock().await.push_back(result);
    }

    pub async fn chat_calls(&self) -> Vec<String> {
        self.chat_calls.lock().await.clone()
    }
}

#[async_trait]
impl InterviewBackend for ScriptedBackend {
    async fn initialize_interview(
        &self,
        request: &InitializeInterviewRequest,
    ) -> std::result::Result<String, BackendError> {
        self.initialize_calls.lock().await.push(request.clone());
        self.greeting.lock().await.clone()
    }

    async fn chat(&self, message: &str) -> std::result::Result<String, BackendError> {
        self.chat_calls.lock().await.push(message.to_string());
        let reply = self.chat_replies.lock().await.pop_front();
        match reply {
            Some(ChatReply::Now(result)) => result,
            Some(ChatReply::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(BackendError::network(CHAT_PATH, "gate dropped"))),
            None => Ok(format!("reply: {message}")),
        }
    }

    async fn transcribe(
        &self,
        wav: Vec<u8>,
    ) -> std::result::Result<Option<String>, BackendError> {
        self.uploads.lock().await.push(wav);
        self.transcripts
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

pub fn initialize_failure(status: u16) -> BackendError {
    BackendError::Server {
        endpoint: INITIALIZE_PATH,
        status,
        message: "boom".to_string(),
    }
}

/// Capture device whose permission prompt can be held open and whose answer is scripted.
pub struct TestDevice {
    pub deny: Option<DeviceError>,
    pub prompt: Mutex<Option<oneshot::Receiver<()>>>,
    pub recording: Vec<u8>,
    pub arms: AtomicUsize,
}

impl TestDevice {
    pub fn granting(recording: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            deny: None,
            prompt: Mutex::new(None),
            recording: recording.to_vec(),
            arms: AtomicUsize::new(0),
        })
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            deny: Some(DeviceError::PermissionDenied("user dismissed prompt".into())),
            prompt: Mutex::new(None),
            recording: Vec::new(),
            arms: AtomicUsize::new(0),
        })
    }

    /// Holds the next permission prompt open until the returned sender fires.
    pub async fn hold_prompt(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.prompt.lock().await = Some(rx);
        tx
    }
}

struct TestCapture {
    recording: Vec<u8>,
}

#[async_trait]
impl ActiveCapture for TestCapture {
    async fn finish(self: Box<Self>) -> std::result::Result<Vec<u8>, DeviceError> {
        Ok(self.recording)
    }
}

#[async_trait]
impl CaptureDevice for TestDevice {
    async fn arm(&self) -> std::result::Result<Box<dyn ActiveCapture>, DeviceError> {
        self.arms.fetch_add(1, Ordering::SeqCst);
        let prompt = self.prompt.lock().await.take();
        if let Some(prompt) = prompt {
            let _ = prompt.await;
        }
        if let Some(err) = &self.deny {
            return Err(err.clone());
        }
        Ok(Box::new(TestCapture {
            recording: self.recording.clone(),
        }))
    }
}
