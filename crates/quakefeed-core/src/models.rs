use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// One captured, unstructured message snippet.
///
/// Produced by a [`crate::traits::MessageSource`] and consumed immediately by
/// the extractor. Has no identity of its own; the record derived from it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub text: String,
    /// Approximate position in capture order (per capture call).
    pub order: usize,
    /// Status URL of the post, when the source could resolve one.
    pub permalink: Option<String>,
    /// Platform timestamp of the post as rendered (`<time datetime>`).
    pub posted_at: Option<String>,
}

impl RawBlock {
    pub fn new(text: impl Into<String>, order: usize) -> Self {
        Self {
            text: text.into(),
            order,
            permalink: None,
            posted_at: None,
        }
    }

    pub fn with_permalink(mut self, permalink: impl Into<String>) -> Self {
        self.permalink = Some(permalink.into());
        self
    }

    pub fn with_posted_at(mut self, posted_at: impl Into<String>) -> Self {
        self.posted_at = Some(posted_at.into());
        self
    }
}

/// Why a block was not turned into an accepted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// The block failed the minimal-field gate.
    NotEarthquakeContent,
    /// The block looks seismic but has no parseable magnitude.
    MissingMagnitude,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotEarthquakeContent => "NOT_EARTHQUAKE_CONTENT",
            RejectReason::MissingMagnitude => "MISSING_MAGNITUDE",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Accepted,
    Rejected(RejectReason),
}

impl RecordStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RecordStatus::Accepted)
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            RecordStatus::Accepted => None,
            RecordStatus::Rejected(reason) => Some(*reason),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Accepted => write!(f, "ACCEPTED"),
            RecordStatus::Rejected(reason) => write!(f, "REJECTED({reason})"),
        }
    }
}

/// Optional fields whose rule matched but whose value could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Depth,
    DateTime,
}

/// The structured output of extraction.
///
/// Immutable once accepted: a corrected message arrives as a new capture
/// with a different identity key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarthquakeRecord {
    /// SHA-256 of the normalized, lowercased text.
    pub identity_key: String,
    pub magnitude: Option<f64>,
    pub depth_km: Option<f64>,
    pub datetime_text: Option<String>,
    pub datetime_parsed: Option<NaiveDateTime>,
    pub location_text: Option<String>,
    pub intensity_text: Option<String>,
    pub raw_text: String,
    pub permalink: Option<String>,
    pub posted_at: Option<String>,
    #[serde(flatten)]
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial_fields: Vec<RecordField>,
}

impl EarthquakeRecord {
    pub fn is_accepted(&self) -> bool {
        self.status.is_accepted()
    }

    /// Attach source metadata carried by the block this record came from.
    pub fn with_source(mut self, block: &RawBlock) -> Self {
        self.permalink = block.permalink.clone();
        self.posted_at = block.posted_at.clone();
        self
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collapse every whitespace run (including non-breaking and other Unicode
/// spaces, and line breaks) to a single ASCII space and trim the ends.
pub fn normalize_text(raw: &str) -> String {
    // `char::is_whitespace` covers U+00A0 and U+202F.
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic fingerprint of a message, stable across repeated captures.
pub fn identity_key(raw: &str) -> String {
    compute_hash(&normalize_text(raw).to_lowercase())
}
