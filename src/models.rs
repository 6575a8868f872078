//! Request/response models for the editorial backend and the console state.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File the backend writes editorial metadata into.
pub const METADATA_FILE_NAME: &str = "KOLEGIUM_META.md";

// === Content Analysis ===

/// Publishing platform suggested for a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    LinkedIn,
    Twitter,
    Newsletter,
    Blog,
    Other(String),
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Self::LinkedIn,
            "twitter" | "x" => Self::Twitter,
            "newsletter" => Self::Newsletter,
            "blog" => Self::Blog,
            _ => Self::Other(value),
        }
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkedIn => f.write_str("LinkedIn"),
            Self::Twitter => f.write_str("Twitter"),
            Self::Newsletter => f.write_str("Newsletter"),
            Self::Blog => f.write_str("Blog"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A publishable topic proposed by the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(default)]
    pub title: String,
    pub platform: Platform,
    #[serde(default)]
    pub viral_score: f64,
}

/// Result of a quick folder analysis.
///
/// Fields the console does not interpret (key themes, audience scores, ...)
/// are kept in `extra` so the assistant still sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub files_count: u64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub series_title: String,
    #[serde(default)]
    pub value_score: f64,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default, alias = "topTopics")]
    pub topics: Vec<Topic>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Score at or above which an analysis is flagged for immediate publication.
pub const HIGH_VALUE_SCORE: f64 = 8.0;

impl AnalysisResult {
    #[must_use]
    pub fn is_high_value(&self) -> bool {
        self.value_score >= HIGH_VALUE_SCORE
    }
}

/// An analysis stored in the history, stamped with when it completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub analyzed_at: DateTime<Utc>,
}

// === Folders & Style Guides ===

/// A raw content folder waiting for editorial work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFolder {
    pub name: String,
    #[serde(default)]
    pub files_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ContentFolder {
    #[must_use]
    pub fn new(name: impl Into<String>, files_count: u64) -> Self {
        Self {
            name: name.into(),
            files_count,
            path: None,
        }
    }
}

/// Response of the folder listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderListing {
    #[serde(default)]
    pub folders: Vec<ContentFolder>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl FolderListing {
    /// Reported total, falling back to the number of returned folders.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.unwrap_or(self.folders.len())
    }
}

/// Style guide documents keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleGuides {
    #[serde(default)]
    pub guides: BTreeMap<String, String>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl StyleGuides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guides.is_empty()
    }
}

// === Request Bodies ===

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeFolderRequest<'a> {
    pub folder_path: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveMetadataRequest<'a> {
    pub folder_path: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPipelineRequest<'a> {
    pub content_path: &'a str,
}

/// Acknowledgement of a metadata save. Usually an empty object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataReceipt {
    #[serde(default, alias = "file")]
    pub path: Option<String>,
}

impl MetadataReceipt {
    /// Name of the written artifact, as reported or the conventional default.
    #[must_use]
    pub fn artifact_name(&self) -> String {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .unwrap_or(METADATA_FILE_NAME)
            .to_string()
    }
}

// === Pipeline Events ===

/// Kind of a streamed pipeline event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    PhaseStart,
    PhaseEnd,
    #[default]
    Log,
    Result,
    Error,
    Complete,
    #[serde(other)]
    Other,
}

/// One record of the pipeline's server-sent event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    #[serde(rename = "type", default)]
    pub kind: PipelineEventKind,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<EventTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
}

/// When an event was emitted: epoch milliseconds or an ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    Millis(f64),
    Text(String),
}

impl EventTimestamp {
    /// Point in time as epoch milliseconds, if it can be read as one.
    ///
    /// Strings without an offset are local wall-clock times.
    #[must_use]
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            Self::Millis(ms) if ms.is_finite() => Some(*ms as i64),
            Self::Millis(_) => None,
            Self::Text(text) => {
                let text = text.trim();
                if let Ok(time) = DateTime::parse_from_rfc3339(text) {
                    return Some(time.timestamp_millis());
                }
                let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()?;
                Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|time| time.timestamp_millis())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn analysis_accepts_backend_shape() {
        let raw = json!({
            "folder": "2025-07-31-brainstorm",
            "filesCount": 3,
            "contentType": "GENERAL",
            "valueScore": 6.5,
            "recommendation": "Good potential.",
            "topTopics": [
                {"title": "5 Lessons", "platform": "LinkedIn", "viralScore": 6},
                {"title": "Deep dive", "platform": "Substack", "viralScore": 4}
            ],
            "key_themes": ["AI"],
            "confidence": 0.75
        });

        let parsed: AnalysisResult = serde_json::from_value(raw).expect("parse analysis");
        assert_eq!(parsed.files_count, 3);
        assert_eq!(parsed.series_title, "");
        assert_eq!(parsed.topics.len(), 2);
        assert_eq!(parsed.topics[0].platform, Platform::LinkedIn);
        assert_eq!(
            parsed.topics[1].platform,
            Platform::Other("Substack".to_string())
        );
        assert_eq!(parsed.extra.get("confidence"), Some(&json!(0.75)));
        assert!(!parsed.is_high_value());
    }

    #[test]
    fn record_serializes_flat_with_timestamp() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "folder": "f", "filesCount": 1, "valueScore": 9, "topics": []
        }))
        .expect("parse");
        let record = AnalysisRecord {
            result,
            analyzed_at: DateTime::parse_from_rfc3339("2025-08-01T10:00:00Z")
                .expect("ts")
                .with_timezone(&Utc),
        };
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["folder"], "f");
        assert_eq!(value["valueScore"], 9.0);
        assert_eq!(value["analyzedAt"], "2025-08-01T10:00:00Z");
    }

    #[test]
    fn folder_listing_defaults() {
        let listing: FolderListing = serde_json::from_value(json!({
            "status": "ok",
            "folders": [{"name": "a", "path": "/x/a", "type": "raw_content"}]
        }))
        .expect("parse listing");
        assert_eq!(listing.total(), 1);
        assert_eq!(listing.folders[0].files_count, 0);
    }

    #[test]
    fn pipeline_event_unknown_kind_is_other() {
        let event: PipelineEvent =
            serde_json::from_str(r#"{"type":"agent_thought","message":"hm","timestamp":1}"#)
                .expect("parse event");
        assert_eq!(event.kind, PipelineEventKind::Other);
        assert_eq!(event.summary, None);
    }

    #[test]
    fn pipeline_event_accepts_iso_timestamps() {
        let event: PipelineEvent = serde_json::from_value(json!({
            "type": "log",
            "message": "Writing draft",
            "timestamp": "2025-07-31T14:05:09.123456"
        }))
        .expect("parse event");
        let millis = event
            .timestamp
            .as_ref()
            .and_then(EventTimestamp::to_millis)
            .expect("readable timestamp");
        let local = Local.timestamp_millis_opt(millis).single().expect("local time");
        assert_eq!(local.format("%H:%M:%S").to_string(), "14:05:09");

        let zoned = EventTimestamp::Text("2025-07-31T14:05:09Z".into());
        assert_eq!(zoned.to_millis(), Some(1_753_970_709_000));
        assert_eq!(EventTimestamp::Millis(1.5e3).to_millis(), Some(1500));
        assert_eq!(EventTimestamp::Text("soon".into()).to_millis(), None);
    }

    #[test]
    fn receipt_falls_back_to_conventional_name() {
        assert_eq!(MetadataReceipt::default().artifact_name(), METADATA_FILE_NAME);
        let receipt: MetadataReceipt =
            serde_json::from_value(json!({"file": "x/META.md"})).expect("parse");
        assert_eq!(receipt.artifact_name(), "x/META.md");
    }
}
