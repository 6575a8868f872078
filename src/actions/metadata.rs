//! Editorial metadata action.

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::spec::{
    ActionContext, ActionError, ActionParameter, ActionResult, ActionSpec, optional_str,
    required_str,
};
use crate::models::AnalysisResult;

pub const NO_ANALYSIS_NOTE: &str = "No analysis - run analysis first";

pub struct SaveMetadataAction;

#[async_trait]
impl ActionSpec for SaveMetadataAction {
    fn name(&self) -> &'static str {
        "saveMetadata"
    }

    fn description(&self) -> &'static str {
        "Save editorial metadata for the editorial board into the content folder."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![
            ActionParameter::string("folderPath", "Path of the content folder", true),
            ActionParameter::string(
                "metadata",
                "Markdown to save. When omitted, a document is generated from the current analysis.",
                false,
            ),
        ]
    }

    async fn execute(&self, input: Value, context: &ActionContext) -> Result<ActionResult, ActionError> {
        let folder_path = required_str(&input, "folderPath")?.trim();
        let document = match optional_str(&input, "metadata") {
            Some(metadata) => metadata.to_string(),
            None => render_metadata_document(
                folder_path,
                context.state.current_analysis().as_ref(),
                Utc::now(),
            ),
        };

        let receipt = context
            .backend
            .save_metadata(folder_path, &document)
            .await
            .map_err(|err| ActionError::execution_failed(format!("Error saving metadata: {err}")))?;

        Ok(ActionResult::success(format!(
            "✅ Saved editorial metadata for folder {folder_path}. Created {}.",
            receipt.artifact_name()
        )))
    }
}

/// Markdown brief for the editorial board, built from an analysis.
#[must_use]
pub fn render_metadata_document(
    folder_path: &str,
    analysis: Option<&AnalysisResult>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut doc = String::from("# Editorial Board Metadata\n\n");
    let _ = writeln!(doc, "## Folder: {folder_path}");
    let _ = writeln!(
        doc,
        "Analysis date: {}\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    doc.push_str("## Content overview\n");

    match analysis {
        Some(analysis) => {
            let _ = writeln!(doc, "- Number of files: {}", analysis.files_count);
            let _ = writeln!(doc, "- Type: {}", analysis.content_type);
            let _ = writeln!(doc, "- Series title: {}", analysis.series_title);
            let _ = writeln!(doc, "- Value score: {}/10\n", analysis.value_score);
            doc.push_str("## Recommendation\n");
            let _ = writeln!(doc, "{}\n", analysis.recommendation);
            doc.push_str("## Topic proposals\n");
            for topic in &analysis.topics {
                let _ = writeln!(
                    doc,
                    "- **{}** ({}, potential: {}/10)",
                    topic.title, topic.platform, topic.viral_score
                );
            }
        }
        None => {
            let _ = writeln!(doc, "{NO_ANALYSIS_NOTE}");
        }
    }

    doc.push_str(
        "\n## How to use these materials\n\
         1. Review all files in numeric order\n\
         2. Extract key quotes and insights\n\
         3. Build a coherent narrative connecting the parts\n\
         4. Adapt tone and style to the target platform\n\
         5. Use controversial elements to increase engagement\n\
         \n## Additional notes\n\
         [Add your own observations after reading the materials]\n",
    );
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-08-01T10:00:00Z")
            .expect("time")
            .with_timezone(&Utc)
    }

    #[test]
    fn document_without_analysis_says_so() {
        let doc = render_metadata_document("content/raw/a", None, fixed_time());
        assert!(doc.contains("## Folder: content/raw/a"));
        assert!(doc.contains("Analysis date: 2025-08-01T10:00:00.000Z"));
        assert!(doc.contains(NO_ANALYSIS_NOTE));
        assert!(!doc.contains("## Recommendation"));
    }

    #[test]
    fn document_lists_analysis_details() {
        let analysis: AnalysisResult = serde_json::from_value(json!({
            "folder": "a",
            "filesCount": 4,
            "contentType": "SERIES",
            "seriesTitle": "Deep Dive",
            "valueScore": 8.5,
            "recommendation": "Publish as a series.",
            "topics": [{"title": "Why X", "platform": "LinkedIn", "viralScore": 7}]
        }))
        .expect("analysis");
        let doc = render_metadata_document("content/raw/a", Some(&analysis), fixed_time());
        assert!(doc.contains("- Number of files: 4"));
        assert!(doc.contains("- Type: SERIES"));
        assert!(doc.contains("- Series title: Deep Dive"));
        assert!(doc.contains("- Value score: 8.5/10"));
        assert!(doc.contains("Publish as a series."));
        assert!(doc.contains("- **Why X** (LinkedIn, potential: 7/10)"));
        assert!(!doc.contains(NO_ANALYSIS_NOTE));
    }
}
