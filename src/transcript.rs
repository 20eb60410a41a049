//! Transcript model for Calchat
//!
//! This module defines the chat transcript: an ordered, append-only
//! sequence of entries where only the last entry may be a live-updated
//! "pending" assistant entry showing streaming/status text.
//!
//! The transcript is an explicit observable state container: every
//! mutation broadcasts a fresh snapshot through a `tokio::sync::watch`
//! channel so the UI layer can render without holding any locks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::watch;
use uuid::Uuid;

/// Reference to an image attached to a user entry
pub type ImageRef = PathBuf;

/// Role of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Text typed (or scanned) by the user
    User,
    /// Text produced by the model, including streaming status
    Assistant,
    /// Errors and other out-of-band notices
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One entry in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Unique identifier for this entry
    pub id: Uuid,
    /// Who produced the entry
    pub role: Role,
    /// Entry text; for a pending entry this is live status/stream text
    pub text: String,
    /// True while this entry is being live-updated by an in-flight turn
    pub is_pending: bool,
    /// Image attached to the entry, if any
    pub attached_image: Option<ImageRef>,
}

impl TranscriptEntry {
    /// Creates a user entry, optionally carrying an attached image
    pub fn user(text: impl Into<String>, attached_image: Option<ImageRef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            text: text.into(),
            is_pending: false,
            attached_image,
        }
    }

    /// Creates a finalized assistant entry
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            text: text.into(),
            is_pending: false,
            attached_image: None,
        }
    }

    /// Creates a pending assistant entry for live status/stream updates
    pub fn pending(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            text: text.into(),
            is_pending: true,
            attached_image: None,
        }
    }

    /// Creates a system entry (errors and notices)
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::System,
            text: text.into(),
            is_pending: false,
            attached_image: None,
        }
    }
}

/// Observable transcript container
///
/// Invariant: at most one entry has `is_pending == true`, and when one
/// exists it is the last entry. The mutating methods below are the only
/// way entries change, and each one preserves the invariant and then
/// notifies watchers.
#[derive(Debug)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    notifier: watch::Sender<Vec<TranscriptEntry>>,
}

impl Transcript {
    /// Creates an empty transcript
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(Vec::new());
        Self {
            entries: Vec::new(),
            notifier,
        }
    }

    /// Subscribe to transcript snapshots
    ///
    /// The receiver observes a full snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TranscriptEntry>> {
        self.notifier.subscribe()
    }

    /// Returns the current entries
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the transcript has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true while a pending entry exists
    pub fn has_pending(&self) -> bool {
        self.entries.last().map(|e| e.is_pending).unwrap_or(false)
    }

    /// Appends a finalized entry
    ///
    /// Any existing pending entry is finalized first with its current
    /// text so the one-pending-and-last invariant holds.
    pub fn push(&mut self, entry: TranscriptEntry) {
        if let Some(last) = self.entries.last_mut() {
            last.is_pending = false;
        }
        self.entries.push(entry);
        self.notify();
    }

    /// Appends a pending assistant entry showing `status`
    ///
    /// push() finalizes any previous pending entry, so the new entry is
    /// the only pending one.
    pub fn begin_pending(&mut self, status: impl Into<String>) {
        self.push(TranscriptEntry::pending(status));
    }

    /// Replaces the text of the pending entry, keeping it pending
    ///
    /// No-op when no pending entry exists (e.g. the turn was cancelled
    /// between chunk arrivals).
    pub fn update_pending(&mut self, text: impl Into<String>) {
        if let Some(last) = self.entries.last_mut() {
            if last.is_pending {
                last.text = text.into();
                self.notify();
            }
        }
    }

    /// Finalizes the pending entry with `text` and clears its flag
    ///
    /// No-op when no pending entry exists.
    pub fn finalize_pending(&mut self, text: impl Into<String>) {
        if let Some(last) = self.entries.last_mut() {
            if last.is_pending {
                last.text = text.into();
                last.is_pending = false;
                self.notify();
            }
        }
    }

    /// Removes the pending entry entirely, if one exists
    ///
    /// Used when a turn fails before producing output: the status
    /// bubble disappears and an error entry takes its place.
    pub fn drop_pending(&mut self) {
        if self.has_pending() {
            self.entries.pop();
            self.notify();
        }
    }

    fn notify(&self) {
        // send_replace never fails even with zero receivers
        self.notifier.send_replace(self.entries.clone());
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
