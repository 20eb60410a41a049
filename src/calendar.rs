//! Calendar storage for Calchat
//!
//! Defines the `CalendarStore` trait the orchestrator talks to and an
//! in-memory implementation. The summary text produced here is fed
//! straight into model prompts as context, so its shape is part of the
//! conversational contract, not just display formatting.

use crate::error::{CalchatError, Result};

use chrono::{Months, NaiveDateTime};
use std::sync::Mutex;
use uuid::Uuid;

/// Maximum number of events included in one summary
pub const SUMMARY_EVENT_CAP: usize = 30;

/// Forward window, in months, searched when deleting by title
pub const DELETE_WINDOW_MONTHS: u32 = 6;

/// A single calendar event
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: String,
    pub notes: String,
}

impl CalendarEvent {
    pub fn new(
        title: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        location: &str,
        notes: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            start,
            end,
            location: location.to_string(),
            notes: notes.to_string(),
        }
    }
}

/// Storage boundary between the orchestrator and the calendar
///
/// Implementations must be safe to share across tasks; the
/// orchestrator holds the store behind an `Arc`.
pub trait CalendarStore: Send + Sync {
    /// Renders events with starts in `[start, end)` as prompt context
    ///
    /// Returns `"Access denied"` without access, `"No events."` when
    /// the window is empty, and otherwise day-grouped lines:
    ///
    /// ```text
    /// [ Monday, June 2, 2025 ]
    /// - Standup at 9:00 AM
    /// ```
    ///
    /// At most [`SUMMARY_EVENT_CAP`] events are included, earliest
    /// first.
    fn events_summary(&self, start: NaiveDateTime, end: NaiveDateTime) -> String;

    /// Adds an event
    ///
    /// # Errors
    ///
    /// Returns `CalchatError::Calendar` when access has not been
    /// granted.
    fn add_event(&self, event: CalendarEvent) -> Result<()>;

    /// Deletes the first event matching `title`, case-insensitively
    ///
    /// Only events starting within [`DELETE_WINDOW_MONTHS`] months of
    /// `now` are candidates; among duplicates the one with the
    /// earliest start wins. Returns whether anything was deleted.
    fn delete_event(&self, title: &str, now: NaiveDateTime) -> Result<bool>;

    /// Events starting within the next `days` days, earliest first
    fn upcoming_events(&self, now: NaiveDateTime, days: i64) -> Vec<CalendarEvent>;
}

/// In-memory calendar store
///
/// Holds events behind a mutex and mirrors the access-grant gate a
/// system calendar imposes: a store constructed with
/// [`without_access`] refuses summaries and writes the way a denied
/// permission prompt would.
///
/// [`without_access`]: MemoryCalendar::without_access
pub struct MemoryCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    access_granted: bool,
    delete_window_months: u32,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            access_granted: true,
            delete_window_months: DELETE_WINDOW_MONTHS,
        }
    }

    /// A store that behaves as if calendar access was denied
    pub fn without_access() -> Self {
        Self {
            access_granted: false,
            ..Self::new()
        }
    }

    /// Overrides the forward window searched by [`delete_event`]
    ///
    /// [`delete_event`]: CalendarStore::delete_event
    pub fn with_delete_window(mut self, months: u32) -> Self {
        self.delete_window_months = months;
        self
    }

    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<CalendarEvent>> {
        // A poisoned lock means a panic mid-mutation; the event list
        // itself is still structurally valid, so keep serving it.
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MemoryCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarStore for MemoryCalendar {
    fn events_summary(&self, start: NaiveDateTime, end: NaiveDateTime) -> String {
        if !self.access_granted {
            return "Access denied".to_string();
        }

        let mut events: Vec<CalendarEvent> = self
            .lock_events()
            .iter()
            .filter(|e| e.start >= start && e.start < end)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);

        if events.is_empty() {
            return "No events.".to_string();
        }

        let mut summary = String::new();
        let mut current_day = String::new();

        for event in events.iter().take(SUMMARY_EVENT_CAP) {
            let day_header = event.start.format("%A, %B %-d, %Y").to_string();
            if day_header != current_day {
                current_day = day_header.clone();
                summary.push_str(&format!("\n[ {} ]\n", day_header));
            }
            let time = event.start.format("%-I:%M %p").to_string();
            summary.push_str(&format!("- {} at {}\n", event.title, time));
        }

        summary
    }

    fn add_event(&self, event: CalendarEvent) -> Result<()> {
        if !self.access_granted {
            return Err(CalchatError::Calendar("Access denied".to_string()).into());
        }
        tracing::debug!("Adding event: {} at {}", event.title, event.start);
        self.lock_events().push(event);
        Ok(())
    }

    fn delete_event(&self, title: &str, now: NaiveDateTime) -> Result<bool> {
        if !self.access_granted {
            return Ok(false);
        }

        let window_end = now
            .checked_add_months(Months::new(self.delete_window_months))
            .ok_or_else(|| CalchatError::Calendar("Delete window overflow".to_string()))?;

        let wanted = title.to_lowercase();
        let mut events = self.lock_events();

        let target = events
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.start >= now && e.start < window_end && e.title.to_lowercase() == wanted
            })
            .min_by_key(|(_, e)| e.start)
            .map(|(idx, _)| idx);

        match target {
            Some(idx) => {
                let removed = events.remove(idx);
                tracing::info!("Deleted event: {} at {}", removed.title, removed.start);
                Ok(true)
            }
            None => {
                tracing::debug!("No deletable event titled: {}", title);
                Ok(false)
            }
        }
    }

    fn upcoming_events(&self, now: NaiveDateTime, days: i64) -> Vec<CalendarEvent> {
        if !self.access_granted {
            return Vec::new();
        }
        let window_end = now + chrono::Duration::days(days);
        let mut events: Vec<CalendarEvent> = self
            .lock_events()
            .iter()
            .filter(|e| e.start >= now && e.start < window_end)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);
        events
    }
}
