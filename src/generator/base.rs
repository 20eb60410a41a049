//! Generator trait and streaming handle types
//!
//! This module defines the Generator trait that all text-generation
//! backends must implement, along with the cancellable chunk-stream
//! handle shared by the orchestrator and the backends.

use crate::error::{CalchatError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Channel capacity for in-flight chunks
///
/// Kept small so backpressure holds the producer close to the
/// consumer and cancellation takes effect promptly.
const CHUNK_CHANNEL_SIZE: usize = 16;

/// Sender half used by chunk producers
pub type ChunkSender = mpsc::Sender<Result<String>>;

/// One in-flight streaming generation call
///
/// Owns the cancellation token and the receiving half of the chunk
/// channel. The sequence is single-pass and forward-only; restarting
/// requires a fresh `reset()` + `stream_prompt()` on the generator.
/// Exactly one live handle may exist system-wide; the orchestrator
/// enforces that invariant.
pub struct GenerationHandle {
    token: CancellationToken,
    chunks: mpsc::Receiver<Result<String>>,
}

impl GenerationHandle {
    /// Creates a handle from its parts, returning the producer sender
    ///
    /// The producer must check the returned token before yielding each
    /// chunk and close the channel once cancelled.
    pub fn channel() -> (Self, ChunkSender, CancellationToken) {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_SIZE);
        let token = CancellationToken::new();
        let handle = Self {
            token: token.clone(),
            chunks: rx,
        };
        (handle, tx, token)
    }

    /// Returns a clone of the cancellation token
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests cancellation of the stream
    ///
    /// The producer stops yielding further chunks; a chunk already in
    /// flight may still be observed.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Receives the next chunk, or `None` when the stream is finished
    pub async fn next_chunk(&mut self) -> Option<Result<String>> {
        self.chunks.recv().await
    }

    /// Drains the stream into the accumulated reply text
    ///
    /// Stops early (without error) when the stream is cancelled;
    /// propagates the first mid-stream error otherwise.
    pub async fn collect_text(&mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

// The receiver half has no useful Debug form; report the token state.
impl fmt::Debug for GenerationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationHandle")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Generator trait for streaming text backends
///
/// Each flow step is an independent single-shot exchange: `reset()`
/// clears any conversational context, then `stream_prompt()` sends one
/// prompt and exposes the reply as a lazy chunk sequence. Prior steps'
/// prompts and answers must not leak into later steps' context.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Clears conversational context so the next call starts clean
    ///
    /// # Errors
    ///
    /// Returns `CalchatError::SessionNotReady` if no model is loaded.
    async fn reset(&self) -> Result<()>;

    /// Sends one prompt and returns the reply as a cancellable stream
    ///
    /// # Errors
    ///
    /// Returns `CalchatError::SessionNotReady` if no model is loaded,
    /// or `CalchatError::Generation` if the backend rejects the call.
    async fn stream_prompt(&self, prompt: &str) -> Result<GenerationHandle>;
}

/// One scripted reply for [`ScriptedGenerator`]
#[derive(Debug, Clone)]
enum ScriptedReply {
    /// Stream these chunks, then finish
    Chunks(Vec<String>),
    /// Stream the chunks, then fail with the message
    Failure { chunks: Vec<String>, message: String },
}

/// Deterministic generator for tests and offline dry runs
///
/// Replies are consumed in FIFO order, one per `stream_prompt()` call,
/// each split into whitespace-preserving word chunks. An optional
/// per-chunk delay leaves room for cancellation mid-stream.
///
/// # Examples
///
/// ```
/// use calchat::generator::{Generator, ScriptedGenerator};
///
/// # async fn example() -> calchat::error::Result<()> {
/// let generator = ScriptedGenerator::new(vec!["1"]);
/// let mut handle = generator.stream_prompt("classify this").await?;
/// assert_eq!(handle.collect_text().await?, "1");
/// # Ok(())
/// # }
/// ```
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
    chunk_delay: Duration,
    ready: bool,
}

impl ScriptedGenerator {
    /// Creates a generator that replays `replies` in order
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| ScriptedReply::Chunks(split_chunks(r)))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
            chunk_delay: Duration::ZERO,
            ready: true,
        }
    }

    /// Creates a generator whose calls all fail with `SessionNotReady`
    pub fn not_ready() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            chunk_delay: Duration::ZERO,
            ready: false,
        }
    }

    /// Sets a delay before each chunk is yielded
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Enqueues a reply that streams `chunks` and then errors
    pub fn enqueue_failure(&self, chunks: Vec<&str>, message: &str) {
        self.replies
            .lock()
            .expect("scripted replies lock")
            .push_back(ScriptedReply::Failure {
                chunks: chunks.into_iter().map(str::to_string).collect(),
                message: message.to_string(),
            });
    }

    /// Returns the prompts received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("scripted prompts lock").clone()
    }
}

/// Splits a reply into word chunks, each keeping its trailing space
fn split_chunks(reply: &str) -> Vec<String> {
    let words: Vec<&str> = reply.split(' ').collect();
    let count = words.len();
    words
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            if i + 1 < count {
                format!("{} ", w)
            } else {
                w.to_string()
            }
        })
        .collect()
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn reset(&self) -> Result<()> {
        if !self.ready {
            return Err(CalchatError::SessionNotReady.into());
        }
        Ok(())
    }

    async fn stream_prompt(&self, prompt: &str) -> Result<GenerationHandle> {
        if !self.ready {
            return Err(CalchatError::SessionNotReady.into());
        }

        self.prompts
            .lock()
            .expect("scripted prompts lock")
            .push(prompt.to_string());

        let reply = self
            .replies
            .lock()
            .expect("scripted replies lock")
            .pop_front()
            .ok_or_else(|| CalchatError::Generation("scripted replies exhausted".to_string()))?;

        let (handle, tx, token) = GenerationHandle::channel();
        let delay = self.chunk_delay;

        tokio::spawn(async move {
            let (chunks, failure) = match reply {
                ScriptedReply::Chunks(chunks) => (chunks, None),
                ScriptedReply::Failure { chunks, message } => (chunks, Some(message)),
            };

            for chunk in chunks {
                if token.is_cancelled() {
                    return;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if token.is_cancelled() {
                    return;
                }
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }

            if let Some(message) = failure {
                let _ = tx.send(Err(CalchatError::Generation(message).into())).await;
            }
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_reply_collects() {
        let generator = ScriptedGenerator::new(vec!["hello there"]);
        let mut handle = generator.stream_prompt("hi").await.unwrap();
        assert_eq!(handle.collect_text().await.unwrap(), "hello there");
    }

    #[tokio::test]
    async fn test_scripted_chunks_are_incremental() {
        let generator = ScriptedGenerator::new(vec!["a b c"]);
        let mut handle = generator.stream_prompt("x").await.unwrap();

        let mut chunks = Vec::new();
        while let Some(chunk) = handle.next_chunk().await {
            chunks.push(chunk.unwrap());
        }
        assert_eq!(chunks, vec!["a ", "b ", "c"]);
    }

    #[tokio::test]
    async fn test_prompts_recorded_in_order() {
        let generator = ScriptedGenerator::new(vec!["1", "2"]);
        let _ = generator.stream_prompt("first").await.unwrap();
        let _ = generator.stream_prompt("second").await.unwrap();
        assert_eq!(generator.prompts(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let generator = ScriptedGenerator::new(vec![]);
        assert!(generator.stream_prompt("anything").await.is_err());
    }

    #[tokio::test]
    async fn test_not_ready_generator() {
        let generator = ScriptedGenerator::not_ready();
        let err = generator.stream_prompt("hi").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalchatError>(),
            Some(CalchatError::SessionNotReady)
        ));
        assert!(generator.reset().await.is_err());
    }

    #[tokio::test]
    async fn test_handle_debug_reports_cancellation() {
        let (handle, _tx, _token) = GenerationHandle::channel();
        assert!(format!("{:?}", handle).contains("cancelled: false"));
        handle.cancel();
        assert!(format!("{:?}", handle).contains("cancelled: true"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_chunks() {
        let generator =
            ScriptedGenerator::new(vec!["one two three four five"])
                .with_chunk_delay(Duration::from_millis(20));
        let mut handle = generator.stream_prompt("go").await.unwrap();

        let first = handle.next_chunk().await.unwrap().unwrap();
        assert_eq!(first, "one ");

        handle.cancel();
        // At most one chunk already in flight may still arrive
        let mut extra = 0;
        while handle.next_chunk().await.is_some() {
            extra += 1;
        }
        assert!(extra <= 1, "got {} chunks after cancellation", extra);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_propagates() {
        let generator = ScriptedGenerator::new(vec![]);
        generator.enqueue_failure(vec!["partial "], "backend exploded");

        let mut handle = generator.stream_prompt("go").await.unwrap();
        assert_eq!(handle.next_chunk().await.unwrap().unwrap(), "partial ");
        let err = handle.next_chunk().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("backend exploded"));
    }

    #[tokio::test]
    async fn test_collect_text_propagates_failure() {
        let generator = ScriptedGenerator::new(vec![]);
        generator.enqueue_failure(vec![], "boom");

        let mut handle = generator.stream_prompt("go").await.unwrap();
        assert!(handle.collect_text().await.is_err());
    }
}
