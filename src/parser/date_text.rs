//! Date and date-range extraction from free model output
//!
//! The generator is prompted to answer "mostly" in `YYYY-MM-DD` form but
//! may wrap the date in commentary, so extraction is deliberately
//! permissive: only the first matching occurrence is used and trailing
//! prose is ignored.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2},\s?\d{4}-\d{2}-\d{2}").expect("range pattern is valid")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("date pattern is valid"))
}

/// Extracts a single date or a date pair from free text
///
/// Scans for a `"YYYY-MM-DD, YYYY-MM-DD"` range first; if both halves
/// parse as valid calendar dates they are returned in textual order
/// (no min/max reordering; the caller treats them as given). Otherwise
/// the first single `"YYYY-MM-DD"` token is tried. Matched digits that
/// fail calendar validation (e.g. day 32) yield an empty result.
///
/// # Examples
///
/// ```
/// use calchat::parser::parse_date_or_range;
/// use chrono::NaiveDate;
///
/// let dates = parse_date_or_range("Sure! The date is 2025-12-01.");
/// assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()]);
/// ```
pub fn parse_date_or_range(text: &str) -> Vec<NaiveDate> {
    if let Some(m) = range_re().find(text) {
        let halves: Vec<&str> = m.as_str().split(',').map(str::trim).collect();
        if halves.len() == 2 {
            let start = NaiveDate::parse_from_str(halves[0], "%Y-%m-%d");
            let end = NaiveDate::parse_from_str(halves[1], "%Y-%m-%d");
            if let (Ok(start), Ok(end)) = (start, end) {
                return vec![start, end];
            }
        }
    }

    if let Some(m) = date_re().find(text) {
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            return vec![date];
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_single_date_embedded_in_prose() {
        let dates = parse_date_or_range("The day you asked about is 2025-06-15, enjoy!");
        assert_eq!(dates, vec![d(2025, 6, 15)]);
    }

    #[test]
    fn test_bare_single_date() {
        assert_eq!(parse_date_or_range("2025-01-02"), vec![d(2025, 1, 2)]);
    }

    #[test]
    fn test_range_in_textual_order() {
        let dates = parse_date_or_range("That week runs 2025-12-07, 2025-12-01 roughly.");
        assert_eq!(dates, vec![d(2025, 12, 7), d(2025, 12, 1)]);
    }

    #[test]
    fn test_range_without_space_after_comma() {
        let dates = parse_date_or_range("2025-03-01,2025-03-07");
        assert_eq!(dates, vec![d(2025, 3, 1), d(2025, 3, 7)]);
    }

    #[test]
    fn test_no_dates() {
        assert!(parse_date_or_range("no dates here").is_empty());
    }

    #[test]
    fn test_invalid_day_yields_empty() {
        // Matches the digit pattern but is not a calendar date
        assert!(parse_date_or_range("maybe 2025-06-32?").is_empty());
    }

    #[test]
    fn test_invalid_month_yields_empty() {
        assert!(parse_date_or_range("2025-13-01").is_empty());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let dates = parse_date_or_range("either 2025-06-01 or 2025-06-08 works");
        assert_eq!(dates, vec![d(2025, 6, 1)]);
    }

    #[test]
    fn test_range_takes_priority_over_single() {
        let dates = parse_date_or_range("Definitely 2025-06-01, 2025-06-07. Or just 2025-06-03.");
        assert_eq!(dates, vec![d(2025, 6, 1), d(2025, 6, 7)]);
    }

    #[test]
    fn test_multiline_commentary() {
        let reply = "Let me think.\nThe range is:\n2025-11-24, 2025-11-30\nHowever...";
        assert_eq!(
            parse_date_or_range(reply),
            vec![d(2025, 11, 24), d(2025, 11, 30)]
        );
    }
}
