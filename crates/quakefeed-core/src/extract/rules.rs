//! Independent field rules.
//!
//! Each rule is a pure function from normalized text to a [`FieldMatch`].
//! Patterns for one field are tried in order and the first one that matches
//! wins, even if its value later fails to parse.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use super::datetime::parse_timestamp;

/// Labels that open a field in an advisory. A field value runs until the
/// next one of these, a short label, a link, a hashtag, or the end of the text.
const LABELS: &str = r"date\s*(?:and|&)\s*time|date|time|magnitude|depth(?:\s*\(\s*km\s*\))?|location|reported\s+intensit(?:y|ies)|intensity|origin|expecting\s+damage|expecting\s+aftershocks|issued\s+on";

/// Abbreviated labels (`M=`, `D=`, `L=`). Case-sensitive.
const SHORT_LABELS: &str = r"[Mm][sSlLwWbB]?|D|L";

/// Outcome of applying one field rule.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMatch<T> {
    /// No pattern for this field matched.
    Missing,
    /// A pattern matched but its value did not parse.
    Malformed(String),
    Value(T),
}

impl<T> FieldMatch<T> {
    pub fn value(self) -> Option<T> {
        match self {
            FieldMatch::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldMatch::Missing)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, FieldMatch::Malformed(_))
    }
}

/// A matched date/time: the verbatim text plus its calendar value, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DateTimeMatch {
    pub text: String,
    pub parsed: Option<NaiveDateTime>,
}

/// Where a field value ends.
fn terminator() -> String {
    format!(
        r"(?:(?i:\s*-?\s*\b(?:{LABELS})\s*[=:])|\s*-?\s*\b(?:{SHORT_LABELS})\s*[=:]|(?i:\s+https?://|\s+#|\s*$))"
    )
}

/// Build a labelled pattern whose `v` group captures the field value.
fn labelled(label: &str) -> String {
    format!(r"{label}\s*[=:]\s*(?P<v>.+?){}", terminator())
}

fn compile(patterns: Vec<String>) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("field rule patterns are valid"))
        .collect()
}

fn trim_value(value: &str) -> &str {
    value
        .trim()
        .trim_end_matches(|c: char| c.is_whitespace() || c == '-')
}

/// Return the first capture of the first matching pattern, with the index
/// of that pattern, trimmed of surrounding whitespace and dangling ` -`
/// separators.
fn first_indexed_capture<'t>(patterns: &[Regex], text: &'t str) -> Option<(usize, &'t str)> {
    patterns.iter().enumerate().find_map(|(idx, re)| {
        re.captures(text)
            .and_then(|caps| caps.name("v"))
            .map(|m| trim_value(m.as_str()))
            .filter(|v| !v.is_empty())
            .map(|v| (idx, v))
    })
}

fn first_capture<'t>(patterns: &[Regex], text: &'t str) -> Option<&'t str> {
    first_indexed_capture(patterns, text).map(|(_, v)| v)
}

/// A standalone `Time = …` field. The `Time` inside a `Date and Time` label
/// does not count.
fn separate_time(text: &str) -> Option<&str> {
    time_patterns().iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let label_start = caps.get(0)?.start();
            let before = text[..label_start].trim_end().to_lowercase();
            if before.ends_with("and") || before.ends_with('&') {
                return None;
            }
            caps.name("v")
                .map(|m| trim_value(m.as_str()))
                .filter(|v| !v.is_empty())
        })
    })
}

/// Parse the leading token of a value as a finite decimal, ignoring a `km` unit.
fn parse_decimal(value: &str) -> Option<f64> {
    let token = value.split_whitespace().next()?;
    let token = token.trim_end_matches(',');
    let token = token
        .strip_suffix("km")
        .or_else(|| token.strip_suffix("KM"))
        .unwrap_or(token);
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn magnitude_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(vec![
            labelled(r"(?i:\bmagnitude)"),
            labelled(r"(?i:\bm[slwb]?)"),
            r"(?i)\bmagnitude\s+(?P<v>\d+(?:\.\d+)?)\b".to_string(),
            // Bare "M 4.2" is only trusted with a decimal, and case-sensitive.
            r"\bM[sSlLwWbB]?\s+(?P<v>\d+\.\d+)\b".to_string(),
        ])
    })
}

fn depth_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(vec![
            labelled(r"(?i:\bdepth(?:\s*\(\s*km\s*\))?)"),
            labelled(r"\bD"),
            r"(?i)\bdepth\s+of\s+(?P<v>\S+\s*km)\b".to_string(),
        ])
    })
}

fn datetime_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(vec![
            labelled(r"(?i:\bdate\s*(?:and|&)\s*time)"),
            labelled(r"(?i:\bdate)"),
            format!(
                r"(?i:\boccurred\s+on)\s+(?P<v>.+?)(?:(?i:\s*-?\s*\b(?:magnitude|depth|location|intensity)\b)|{})",
                terminator()
            ),
        ])
    })
}

/// Index of the bare `Date = …` pattern in [`datetime_patterns`].
const BARE_DATE: usize = 1;

fn time_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile(vec![labelled(r"(?i:\btime)")]))
}

fn location_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(vec![
            labelled(r"(?i:\blocation)"),
            labelled(r"\bL"),
        ])
    })
}

fn intensity_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile(vec![
            labelled(r"(?i:\breported\s+intensit(?:y|ies))"),
            labelled(r"(?i:\bintensity)"),
        ])
    })
}

pub fn magnitude(text: &str) -> FieldMatch<f64> {
    match first_capture(magnitude_patterns(), text) {
        None => FieldMatch::Missing,
        Some(raw) => match parse_decimal(raw) {
            Some(v) => FieldMatch::Value(v),
            None => FieldMatch::Malformed(raw.to_string()),
        },
    }
}

/// Depth in kilometres. Negative depths are malformed.
pub fn depth_km(text: &str) -> FieldMatch<f64> {
    match first_capture(depth_patterns(), text) {
        None => FieldMatch::Missing,
        Some(raw) => match parse_decimal(raw).filter(|v| *v >= 0.0) {
            Some(v) => FieldMatch::Value(v),
            None => FieldMatch::Malformed(raw.to_string()),
        },
    }
}

/// Date and time of the event.
///
/// A bare `Date = …` without a clock time is joined with a separate
/// `Time = …` field when the advisory splits them. Any other match is kept
/// verbatim.
pub fn datetime(text: &str) -> FieldMatch<DateTimeMatch> {
    let Some((pattern, raw)) = first_indexed_capture(datetime_patterns(), text) else {
        return FieldMatch::Missing;
    };

    let mut combined = raw.to_string();
    if pattern == BARE_DATE
        && !combined.contains(':')
        && let Some(time) = separate_time(text)
    {
        combined = format!("{combined} {time}");
    }

    match parse_timestamp(&combined) {
        Some(parsed) => FieldMatch::Value(DateTimeMatch {
            text: combined,
            parsed: Some(parsed),
        }),
        None => FieldMatch::Malformed(combined),
    }
}

pub fn location(text: &str) -> Option<String> {
    first_capture(location_patterns(), text).map(str::to_string)
}

pub fn intensity(text: &str) -> Option<String> {
    first_capture(intensity_patterns(), text).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADVISORY: &str = "Magnitude = 4.2 - Depth = 10 km - Date and Time = March 3, 2024 - 10:15 AM - Location = 017 km N 45° E of Sto. Domingo (Albay)";

    #[test]
    fn magnitude_labelled_and_bare_forms() {
        assert_eq!(magnitude(ADVISORY), FieldMatch::Value(4.2));
        assert_eq!(magnitude("M=5.1 felt in Davao"), FieldMatch::Value(5.1));
        assert_eq!(magnitude("Ms: 3.0"), FieldMatch::Value(3.0));
        assert_eq!(magnitude("a Magnitude 6 event"), FieldMatch::Value(6.0));
        assert_eq!(magnitude("strong M 6.4 quake"), FieldMatch::Value(6.4));
    }

    #[test]
    fn magnitude_non_numeric_is_malformed() {
        assert_eq!(
            magnitude("Magnitude = TBA - Location = Albay"),
            FieldMatch::Malformed("TBA".into())
        );
    }

    #[test]
    fn magnitude_ignores_words_containing_m() {
        assert!(magnitude("I'm 5 minutes away").is_missing());
        assert!(magnitude("item: 5").is_missing());
    }

    #[test]
    fn depth_variants() {
        assert_eq!(depth_km(ADVISORY), FieldMatch::Value(10.0));
        assert_eq!(depth_km("Depth (km) = 010"), FieldMatch::Value(10.0));
        assert_eq!(depth_km("at a depth of 33 km"), FieldMatch::Value(33.0));
        assert_eq!(depth_km("Depth: 5km"), FieldMatch::Value(5.0));
    }

    #[test]
    fn depth_malformed_and_negative() {
        assert!(depth_km("Depth = ?? km - Location = Albay").is_malformed());
        assert!(depth_km("Depth = -5 km").is_malformed());
        assert!(depth_km("no depth here").is_missing());
    }

    #[test]
    fn datetime_stops_at_next_label() {
        let FieldMatch::Value(m) = datetime(ADVISORY) else {
            panic!("expected a parsed datetime");
        };
        assert_eq!(m.text, "March 3, 2024 - 10:15 AM");
        assert_eq!(
            m.parsed.unwrap().format("%Y-%m-%dT%H:%M").to_string(),
            "2024-03-03T10:15"
        );
    }

    #[test]
    fn datetime_joins_separate_time_field() {
        let FieldMatch::Value(m) = datetime("Date: 03 Mar 2024 Time: 09:05 PM Magnitude = 3.1")
        else {
            panic!("expected a parsed datetime");
        };
        assert_eq!(m.text, "03 Mar 2024 09:05 PM");
    }

    #[test]
    fn datetime_unparseable_keeps_text() {
        assert_eq!(
            datetime("Date and Time = sometime last night - Magnitude = 2.0"),
            FieldMatch::Malformed("sometime last night".into())
        );
    }

    #[test]
    fn date_only_value_is_not_doubled() {
        assert_eq!(
            datetime("Date and Time = 03 March 2024 - Location = Albay"),
            FieldMatch::Malformed("03 March 2024".into())
        );
        assert_eq!(
            datetime("Date = 03 March 2024 - Location = Albay"),
            FieldMatch::Malformed("03 March 2024".into())
        );
    }

    #[test]
    fn and_time_label_is_not_a_separate_time() {
        assert_eq!(separate_time("Date and Time = 03 March 2024"), None);
        assert_eq!(separate_time("Date & Time: 03 March 2024"), None);
        assert_eq!(
            separate_time("Date: 03 Mar 2024 Time: 09:05 PM"),
            Some("09:05 PM")
        );
    }

    #[test]
    fn datetime_occurred_on_form() {
        let FieldMatch::Value(m) =
            datetime("Lindol occurred on March 3, 2024 - 10:15 AM - Magnitude 4.2")
        else {
            panic!("expected a parsed datetime");
        };
        assert_eq!(m.text, "March 3, 2024 - 10:15 AM");

        let FieldMatch::Value(m) = datetime("Tremor occurred on March 3, 2024 10:15 AM L=Albay")
        else {
            panic!("expected a parsed datetime");
        };
        assert_eq!(m.text, "March 3, 2024 10:15 AM");
    }

    #[test]
    fn short_labels_end_each_other() {
        let text = "M=4.2 D=10km L=Albay";
        assert_eq!(magnitude(text), FieldMatch::Value(4.2));
        assert_eq!(depth_km(text), FieldMatch::Value(10.0));
        assert_eq!(location(text).as_deref(), Some("Albay"));

        let text = "L=Sto. Domingo (Albay) D=10km M=4.2";
        assert_eq!(location(text).as_deref(), Some("Sto. Domingo (Albay)"));
        assert_eq!(depth_km(text), FieldMatch::Value(10.0));
    }

    #[test]
    fn short_labels_are_case_sensitive() {
        assert!(depth_km("d=10").is_missing());
        assert_eq!(location("l=Albay"), None);
    }

    #[test]
    fn location_runs_to_end_or_link() {
        assert_eq!(
            location(ADVISORY).as_deref(),
            Some("017 km N 45° E of Sto. Domingo (Albay)")
        );
        let linked =
            "Location = 12 km S of Hinatuan (Surigao del Sur) https://t.co/abc #EarthquakePH";
        assert_eq!(
            location(linked).as_deref(),
            Some("12 km S of Hinatuan (Surigao del Sur)")
        );
    }

    #[test]
    fn intensity_prefers_reported_label() {
        let text = "Location = Albay - Reported Intensity = Intensity III - Legazpi City - Expecting Damage: No";
        assert_eq!(
            intensity(text).as_deref(),
            Some("Intensity III - Legazpi City")
        );
        assert_eq!(intensity(ADVISORY), None);
    }
}
