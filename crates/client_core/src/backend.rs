use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    error::ApiError,
    protocol::{
        ChatRequest, InitializeInterviewRequest, MessageResponse, TranscribeResponse, CHAT_PATH,
        INITIALIZE_PATH, TRANSCRIBE_FIELD, TRANSCRIBE_FILENAME, TRANSCRIBE_MIME, TRANSCRIBE_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::error::BackendError;

const ERROR_BODY_SNIPPET_CHARS: usize = 300;

/// The remote reasoning service. Opaque request/response plus transcription.
#[async_trait]
pub trait InterviewBackend: Send + Sync {
    async fn initialize_interview(
        &self,
        request: &InitializeInterviewRequest,
    ) -> std::result::Result<String, BackendError>;
    async fn chat(&self, message: &str) -> std::result::Result<String, BackendError>;
    /// `Ok(None)` means the backend recognized no speech.
    async fn transcribe(&self, wav: Vec<u8>) -> std::result::Result<Option<String>, BackendError>;
}

pub struct MissingInterviewBackend;

#[async_trait]
impl InterviewBackend for MissingInterviewBackend {
    async fn initialize_interview(
        &self,
        _request: &InitializeInterviewRequest,
    ) -> std::result::Result<String, BackendError> {
        Err(BackendError::network(
            INITIALIZE_PATH,
            "interview backend is unavailable",
        ))
    }

    async fn chat(&self, _message: &str) -> std::result::Result<String, BackendError> {
        Err(BackendError::network(
            CHAT_PATH,
            "interview backend is unavailable",
        ))
    }

    async fn transcribe(
        &self,
        _wav: Vec<u8>,
    ) -> std::result::Result<Option<String>, BackendError> {
        Err(BackendError::network(
            TRANSCRIBE_PATH,
            "interview backend is unavailable",
        ))
    }
}

pub struct HttpInterviewBackend {
    http: Client,
    server_url: String,
}

impl HttpInterviewBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, None)
    }

    pub fn with_timeout(server_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let parsed = Url::parse(server_url)
            .with_context(|| format!("invalid backend url '{server_url}'"))?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;
        Ok(Self {
            http,
            server_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> std::result::Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiError>(&body) {
            Ok(api_error) => api_error.error,
            Err(_) => body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect(),
        };
        return Err(BackendError::Server {
            endpoint,
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|err| BackendError::Decode {
            endpoint,
            message: err.to_string(),
        })
}

#[async_trait]
impl InterviewBackend for HttpInterviewBackend {
    async fn initialize_interview(
        &self,
        request: &InitializeInterviewRequest,
    ) -> std::result::Result<String, BackendError> {
        let response = self
            .http
            .post(self.endpoint(INITIALIZE_PATH))
            .json(request)
            .send()
            .await
            .map_err(|err| BackendError::network(INITIALIZE_PATH, err.to_string()))?;
        let body: MessageResponse = read_json(INITIALIZE_PATH, response).await?;
        debug!(chars = body.message.len(), "backend: session initialized");
        Ok(body.message)
    }

    async fn chat(&self, message: &str) -> std::result::Result<String, BackendError> {
        let response = self
            .http
            .post(self.endpoint(CHAT_PATH))
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await
            .map_err(|err| BackendError::network(CHAT_PATH, err.to_string()))?;
        let body: MessageResponse = read_json(CHAT_PATH, response).await?;
        Ok(body.message)
    }

    async fn transcribe(&self, wav: Vec<u8>) -> std::result::Result<Option<String>, BackendError> {
        let size_bytes = wav.len();
        let part = Part::bytes(wav)
            .file_name(TRANSCRIBE_FILENAME)
            .mime_str(TRANSCRIBE_MIME)
            .map_err(|err| BackendError::network(TRANSCRIBE_PATH, err.to_string()))?;
        let form = Form::new().part(TRANSCRIBE_FIELD, part);

        let response = self
            .http
            .post(self.endpoint(TRANSCRIBE_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|err| BackendError::network(TRANSCRIBE_PATH, err.to_string()))?;
        let body: TranscribeResponse = read_json(TRANSCRIBE_PATH, response).await?;
        debug!(size_bytes, "backend: audio transcribed");
        Ok(body.recognized())
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
