//! Streaming text generation for Calchat
//!
//! Defines the `Generator` trait, the cancellable `GenerationHandle`
//! stream, the Ollama-backed implementation, and a scripted in-memory
//! generator for tests.

pub mod base;
pub mod ollama;

pub use base::{ChunkSender, GenerationHandle, Generator, ScriptedGenerator};
pub use ollama::OllamaGenerator;
