//! Ollama generator implementation for Calchat
//!
//! This module implements the Generator trait against an Ollama server
//! (local or remote), streaming NDJSON chunks from `/api/generate`.
//! Each call is a context-free single shot, no conversation state is
//! sent, which is exactly the clean-slate semantic `reset()` promises.

use crate::config::GeneratorConfig;
use crate::error::{CalchatError, Result};
use crate::generator::{ChunkSender, GenerationHandle, Generator};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Ollama-backed streaming generator
///
/// Connects to an Ollama server and streams completions for single-shot
/// prompts. The model must be verified present via [`load_model`] before
/// the first generation call; until then every call fails with
/// `SessionNotReady`.
///
/// [`load_model`]: OllamaGenerator::load_model
///
/// # Examples
///
/// ```no_run
/// use calchat::config::GeneratorConfig;
/// use calchat::generator::{Generator, OllamaGenerator};
///
/// # async fn example() -> calchat::error::Result<()> {
/// let generator = OllamaGenerator::new(GeneratorConfig::default())?;
/// generator.load_model().await?;
/// let mut handle = generator.stream_prompt("Reply with one word.").await?;
/// while let Some(chunk) = handle.next_chunk().await {
///     print!("{}", chunk?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct OllamaGenerator {
    client: Client,
    config: GeneratorConfig,
    ready: AtomicBool,
}

/// Request structure for Ollama's /api/generate endpoint
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// One NDJSON line from the /api/generate stream
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Response from Ollama's /api/tags endpoint
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

/// Model metadata from /api/tags
#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaGenerator {
    /// Creates a new Ollama generator
    ///
    /// # Errors
    ///
    /// Returns `CalchatError::Generation` if HTTP client initialization
    /// fails.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("calchat/0.2.0")
            .build()
            .map_err(|e| {
                CalchatError::Generation(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized Ollama generator: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self {
            client,
            config,
            ready: AtomicBool::new(false),
        })
    }

    /// Verifies the configured model is available on the server
    ///
    /// Must succeed once before any generation call; marks the session
    /// ready on success.
    ///
    /// # Errors
    ///
    /// Returns `CalchatError::Generation` if the server is unreachable
    /// or the model is not installed.
    pub async fn load_model(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.config.host);
        tracing::debug!("Checking model availability: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            CalchatError::Generation(format!("Failed to connect to Ollama server: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CalchatError::Generation(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let tags: TagsResponse = response.json().await.map_err(|e| {
            CalchatError::Generation(format!("Failed to parse Ollama tags response: {}", e))
        })?;

        let wanted = &self.config.model;
        let found = tags.models.iter().any(|tag| {
            tag.name == *wanted || tag.name.split(':').next() == wanted.split(':').next()
        });
        if !found {
            return Err(CalchatError::Generation(format!(
                "Model not installed on server: {}",
                wanted
            ))
            .into());
        }

        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("Model ready: {}", wanted);
        Ok(())
    }

    /// True once `load_model` has succeeded
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    /// No-op beyond the readiness check: `/api/generate` calls carry no
    /// conversation context, so every prompt already starts clean.
    async fn reset(&self) -> Result<()> {
        if !self.is_ready() {
            return Err(CalchatError::SessionNotReady.into());
        }
        Ok(())
    }

    async fn stream_prompt(&self, prompt: &str) -> Result<GenerationHandle> {
        if !self.is_ready() {
            return Err(CalchatError::SessionNotReady.into());
        }

        let url = format!("{}/api/generate", self.config.host);
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: true,
        };

        tracing::debug!("Sending generate request: {} prompt bytes", prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CalchatError::Generation(format!("Generate request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CalchatError::Generation(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let (handle, tx, token) = GenerationHandle::channel();
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            pump_ndjson_stream(byte_stream, tx, token).await;
        });

        Ok(handle)
    }
}

/// Reads the NDJSON byte stream and forwards response chunks
///
/// The cancellation token is checked before every yield; on
/// cancellation the channel is closed without draining the remainder of
/// the HTTP body.
async fn pump_ndjson_stream(
    mut byte_stream: impl futures::Stream<Item = std::result::Result<Bytes, reqwest::Error>>
        + Unpin
        + Send,
    tx: ChunkSender,
    token: CancellationToken,
) {
    let mut buffer = String::new();

    loop {
        let bytes = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Generation cancelled, dropping stream");
                return;
            }
            next = byte_stream.next() => match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    let _ = tx
                        .send(Err(
                            CalchatError::Generation(format!("Stream error: {}", e)).into()
                        ))
                        .await;
                    return;
                }
                None => break,
            },
        };

        buffer.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(newline) = buffer.find('\n') {
            let line: String = buffer.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<GenerateChunk>(line) {
                Ok(chunk) => {
                    if let Some(error) = chunk.error {
                        let _ = tx
                            .send(Err(CalchatError::Generation(error).into()))
                            .await;
                        return;
                    }
                    if token.is_cancelled() {
                        return;
                    }
                    if !chunk.response.is_empty()
                        && tx.send(Ok(chunk.response)).await.is_err()
                    {
                        return;
                    }
                    if chunk.done {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping unparseable stream line: {}", e);
                }
            }
        }
    }

    // Stream ended without a done marker; flush any trailing line
    let line = buffer.trim();
    if !line.is_empty() {
        if let Ok(chunk) = serde_json::from_str::<GenerateChunk>(line) {
            if !chunk.response.is_empty() && !token.is_cancelled() {
                let _ = tx.send(Ok(chunk.response)).await;
            }
        }
    }
}
