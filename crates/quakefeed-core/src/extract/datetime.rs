use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

/// Accepted layouts, tried in order once the text has been tidied.
const FORMATS: &[&str] = &[
    "%B %d, %Y %I:%M %p",
    "%B %d %Y %I:%M %p",
    "%d %B %Y %I:%M %p",
    "%B %d, %Y %H:%M",
    "%d %B %Y %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
];

fn timezone_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*\(?\b(?:PST|PHT|UTC|GMT)\)?\s*$").expect("valid timezone pattern")
    })
}

fn dash_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+-\s+").expect("valid separator pattern"))
}

fn glued_meridiem() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d)([ap]m)\b").expect("valid meridiem pattern"))
}

/// Normalize an advisory timestamp into a calendar value.
///
/// Handles the `Month D, YYYY - HH:MM AM` layout used by the bulletins,
/// day-first and ISO-like variants, and a trailing timezone abbreviation.
/// The local wall-clock time is kept as written; no offset is applied.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let tidy = timezone_suffix().replace(text.trim(), "");
    let tidy = dash_separator().replace_all(&tidy, " ");
    let tidy = glued_meridiem().replace_all(&tidy, "$1 $2");
    let tidy = tidy.trim().trim_end_matches('.');

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(tidy, fmt).ok())
}
