//! Rule-based natural-language date/time detection
//!
//! The generator is asked to emit machine-readable dates but sometimes
//! answers with phrases like "next Friday at 3pm" or "tomorrow morning".
//! This detector recognizes a bounded set of such phrases over chrono.
//! It is the first link in the event-date fallback chain; strict
//! `YYYY-MM-DD` formats are handled by the later links, so this module
//! deliberately ignores ISO-formatted input.
//!
//! Interpretation rules:
//! - "today" / "tomorrow" / "day after tomorrow" resolve relative to `now`
//! - a weekday name ("friday", "this friday", "next friday") resolves to
//!   the next future occurrence, 1 to 7 days ahead
//! - "in N days" counts from today
//! - "<month> <day>[, <year>]" and "<day> <month>[ <year>]" resolve to
//!   that calendar day; without a year, a date already past rolls into
//!   next year
//! - a clock time ("3pm", "15:30", "noon", "midnight") refines the
//!   resolved day; without one, noon is assumed
//!
//! A time on its own is not a detection: some day phrase must match.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use std::sync::OnceLock;

/// Default clock time when a phrase names a day but no time
const DEFAULT_HOUR: u32 = 12;

fn in_days_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"in (\d{1,3}) days?").expect("in-days pattern is valid"))
}

fn day_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)?\b").expect("day-number pattern is valid")
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})\b").expect("year pattern is valid"))
}

fn clock_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").expect("clock pattern is valid")
    })
}

/// Detects a natural-language date/time phrase in `text`
///
/// Returns the resolved timestamp, or `None` when no day phrase is
/// recognized.
///
/// # Examples
///
/// ```
/// use calchat::parser::detect_natural_date;
/// use chrono::{NaiveDate, Timelike};
///
/// let now = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_hms_opt(8, 0, 0).unwrap();
/// let detected = detect_natural_date("tomorrow at 3pm", now).unwrap();
/// assert_eq!(detected.date(), NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());
/// assert_eq!(detected.hour(), 15);
/// ```
pub fn detect_natural_date(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let lowered = text.to_lowercase();
    let day = detect_day(&lowered, now)?;
    let time = detect_time(&lowered).unwrap_or_else(|| {
        NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap_or_default()
    });
    Some(day.and_time(time))
}

/// Resolves the day component of a phrase, if any
fn detect_day(lowered: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    let today = now.date();

    if lowered.contains("day after tomorrow") {
        return Some(today + Duration::days(2));
    }
    if lowered.contains("tomorrow") {
        return Some(today + Duration::days(1));
    }
    if lowered.contains("today") || lowered.contains("tonight") {
        return Some(today);
    }

    if let Some(weekday) = detect_weekday(lowered) {
        let ahead = days_until(today.weekday(), weekday);
        return Some(today + Duration::days(ahead));
    }

    if let Some(caps) = in_days_re().captures(lowered) {
        if let Ok(n) = caps[1].parse::<i64>() {
            return Some(today + Duration::days(n));
        }
    }

    detect_month_day(lowered, today)
}

/// Finds a weekday name anywhere in the phrase
fn detect_weekday(lowered: &str) -> Option<Weekday> {
    const NAMES: &[(&str, Weekday)] = &[
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ];
    NAMES
        .iter()
        .find(|(name, _)| lowered.contains(name))
        .map(|(_, weekday)| *weekday)
}

/// Days until the next future occurrence of `target` (1..=7)
fn days_until(from: Weekday, target: Weekday) -> i64 {
    let diff = (target.num_days_from_monday() as i64 - from.num_days_from_monday() as i64)
        .rem_euclid(7);
    if diff == 0 {
        7
    } else {
        diff
    }
}

/// Resolves "<month> <day>[, <year>]" or "<day> <month>[ <year>]"
fn detect_month_day(lowered: &str, today: NaiveDate) -> Option<NaiveDate> {
    const MONTHS: &[(&str, u32)] = &[
        ("january", 1),
        ("february", 2),
        ("march", 3),
        ("april", 4),
        ("may", 5),
        ("june", 6),
        ("july", 7),
        ("august", 8),
        ("september", 9),
        ("october", 10),
        ("november", 11),
        ("december", 12),
    ];

    let (month_name, month) = MONTHS
        .iter()
        .find(|(name, _)| lowered.contains(&name[..3]))
        .copied()?;
    // Anchor on the month name (full or three-letter) to find the day nearby
    let anchor = lowered
        .find(month_name)
        .or_else(|| lowered.find(&month_name[..3]))?;

    // Search a window around the month name for the day number,
    // nudging the bounds onto char boundaries for non-ASCII input
    let mut window_start = anchor.saturating_sub(8);
    while !lowered.is_char_boundary(window_start) {
        window_start -= 1;
    }
    let mut window_end = (anchor + month_name.len() + 12).min(lowered.len());
    while !lowered.is_char_boundary(window_end) {
        window_end += 1;
    }
    let window = &lowered[window_start..window_end];

    let day: u32 = day_number_re().captures(window)?.get(1)?.as_str().parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }

    let year = year_re()
        .captures(lowered)
        .and_then(|caps| caps[1].parse::<i32>().ok());

    match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if candidate < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(candidate)
            }
        }
    }
}

/// Resolves a clock time in the phrase, if any
fn detect_time(lowered: &str) -> Option<NaiveTime> {
    if lowered.contains("noon") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if lowered.contains("midnight") {
        return NaiveTime::from_hms_opt(0, 0, 0);
    }

    // "3pm", "3:30 pm", "15:30"
    for caps in clock_time_re().captures_iter(lowered) {
        let minute: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let meridiem = caps.get(3).map(|m| m.as_str());
        // A bare number with neither minutes nor am/pm is too
        // ambiguous to treat as a time (it is usually a day number)
        if caps.get(2).is_none() && meridiem.is_none() {
            continue;
        }
        let mut hour: u32 = caps[1].parse().ok()?;
        match meridiem {
            Some("pm") if hour < 12 => hour += 12,
            Some("am") if hour == 12 => hour = 0,
            _ => {}
        }
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return Some(time);
        }
    }

    None
}
