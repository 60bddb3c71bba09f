//! Fact extraction: turns one captured message into an [`EarthquakeRecord`].

pub mod datetime;
pub mod rules;

use crate::models::{
    EarthquakeRecord, RecordField, RecordStatus, RejectReason, identity_key, normalize_text,
};
use rules::FieldMatch;

/// Words that mark a message as seismic even when no field rule matches.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "EARTHQUAKE",
    "MAGNITUDE",
    "LINDOL",
    "INTENSITY",
    "SEISMIC",
    "TREMOR",
];

/// Applies the field rules to a message and classifies it.
#[derive(Debug, Clone)]
pub struct FactExtractor {
    /// Upper-cased keywords.
    keywords: Vec<String>,
}

impl FactExtractor {
    pub fn new() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().copied())
    }

    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_uppercase())
                .collect(),
        }
    }

    fn has_keyword(&self, upper: &str) -> bool {
        self.keywords.iter().any(|k| upper.contains(k.as_str()))
    }

    /// Extract every field independently, then gate.
    ///
    /// Classification order:
    /// 1. no keyword and no field rule matched: `NOT_EARTHQUAKE_CONTENT`
    /// 2. no parseable magnitude: `MISSING_MAGNITUDE`
    /// 3. no location or no date/time: `NOT_EARTHQUAKE_CONTENT`
    ///
    /// Depth and date/time values that matched but failed to parse are
    /// left as `None` and listed in `partial_fields`.
    pub fn extract(&self, raw_text: &str) -> EarthquakeRecord {
        let text = normalize_text(raw_text);

        let magnitude = rules::magnitude(&text);
        let depth = rules::depth_km(&text);
        let datetime = rules::datetime(&text);
        let location = rules::location(&text);
        let intensity = rules::intensity(&text);

        let seismic = self.has_keyword(&text.to_uppercase())
            || !magnitude.is_missing()
            || !depth.is_missing()
            || !datetime.is_missing()
            || location.is_some()
            || intensity.is_some();

        let mut partial_fields = Vec::new();
        if depth.is_malformed() {
            partial_fields.push(RecordField::Depth);
        }

        let (datetime_text, datetime_parsed) = match datetime {
            FieldMatch::Missing => (None, None),
            FieldMatch::Malformed(text) => {
                partial_fields.push(RecordField::DateTime);
                (Some(text), None)
            }
            FieldMatch::Value(m) => (Some(m.text), m.parsed),
        };

        let magnitude = magnitude.value();
        let status = if !seismic {
            RecordStatus::Rejected(RejectReason::NotEarthquakeContent)
        } else if magnitude.is_none() {
            RecordStatus::Rejected(RejectReason::MissingMagnitude)
        } else if location.is_none() || datetime_text.is_none() {
            RecordStatus::Rejected(RejectReason::NotEarthquakeContent)
        } else {
            RecordStatus::Accepted
        };

        EarthquakeRecord {
            identity_key: identity_key(raw_text),
            magnitude,
            depth_km: depth.value(),
            datetime_text,
            datetime_parsed,
            location_text: location,
            intensity_text: intensity,
            raw_text: raw_text.to_string(),
            permalink: None,
            posted_at: None,
            status,
            partial_fields,
        }
    }
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new()
    }
}
