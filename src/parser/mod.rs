//! Text parsers for Calchat
//!
//! Best-effort extraction of typed data from unstructured generator
//! output: dates and date ranges, labeled event fields, and a bounded
//! natural-language date detector used by the field parser's fallback
//! chain. These are permissive grammars: the upstream generator's
//! output format is not contractually guaranteed.

pub mod date_text;
pub mod event_fields;
pub mod natural;

pub use date_text::parse_date_or_range;
pub use event_fields::{parse_event_fields, ParsedEventData, UNTITLED_EVENT};
pub use natural::detect_natural_date;
