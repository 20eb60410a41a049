//! Event field extraction from labeled model output
//!
//! The extraction prompt asks the generator for an exact
//! `Title:/Date:/Location:/Description:` block, but the reply format is
//! not contractually guaranteed. Parsing is therefore a flat key
//! capture: labeled lines are taken, everything else is ignored, and
//! the date value runs through a fallback chain that absorbs both
//! machine-readable and natural-language answers.

use crate::parser::natural::detect_natural_date;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Default title when the reply carries no `Title:` line
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Structured event data extracted from a model reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEventData {
    /// Event title; `"Untitled Event"` when absent
    pub title: String,
    /// Event start; never absent, falls back to one hour from `now`
    pub date: NaiveDateTime,
    /// Location; empty when absent
    pub location: String,
    /// Free-form notes; empty when absent
    pub notes: String,
}

/// Extracts event fields from a semi-structured reply
///
/// Each line is matched case-insensitively against the leading labels
/// `Title:`, `Date:`, `Location:` and `Description:`; the remainder of
/// the line, trimmed, becomes that field's raw value. Unmatched lines
/// are ignored. The raw date resolves through an ordered chain, first
/// success wins:
///
/// 1. natural-language detection ("next Friday at 3pm")
/// 2. strict `YYYY-MM-DD HH:MM`
/// 3. strict `YYYY-MM-DD` (midnight)
/// 4. `now + 1 hour`
///
/// # Examples
///
/// ```
/// use calchat::parser::parse_event_fields;
/// use chrono::{NaiveDate, Utc};
///
/// let reply = "Title: Dentist\nDate: 2025-06-01 09:00\nLocation: None\nDescription: None";
/// let event = parse_event_fields(reply, Utc::now().naive_local());
/// assert_eq!(event.title, "Dentist");
/// assert_eq!(event.date.date(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
/// ```
pub fn parse_event_fields(text: &str, now: NaiveDateTime) -> ParsedEventData {
    let mut title = UNTITLED_EVENT.to_string();
    let mut location = String::new();
    let mut notes = String::new();
    let mut raw_date = String::new();

    for line in text.lines() {
        let lowered = line.to_lowercase();
        if lowered.starts_with("title:") {
            title = line["title:".len()..].trim().to_string();
        } else if lowered.starts_with("date:") {
            raw_date = line["date:".len()..].trim().to_string();
        } else if lowered.starts_with("location:") {
            location = line["location:".len()..].trim().to_string();
        } else if lowered.starts_with("description:") {
            notes = line["description:".len()..].trim().to_string();
        }
    }

    let date = resolve_date(&raw_date, now);

    ParsedEventData {
        title,
        date,
        location,
        notes,
    }
}

/// Runs the raw date value through the fallback chain
fn resolve_date(raw: &str, now: NaiveDateTime) -> NaiveDateTime {
    if let Some(detected) = detect_natural_date(raw, now) {
        return detected;
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return parsed;
    }
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
            return midnight;
        }
    }
    tracing::debug!("No parseable event date in {:?}, defaulting to now+1h", raw);
    now + Duration::hours(1)
}
