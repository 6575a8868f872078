//! Quick folder analysis action.

use async_trait::async_trait;
use serde_json::Value;

use super::spec::{
    ActionContext, ActionError, ActionParameter, ActionResult, ActionSpec, required_str,
};
use crate::suggestions;

pub struct AnalyzeFolderAction;

#[async_trait]
impl ActionSpec for AnalyzeFolderAction {
    fn name(&self) -> &'static str {
        "analyzeFolder"
    }

    fn description(&self) -> &'static str {
        "QUICK folder analysis: value potential, content type, topic recommendations. Does NOT run the editorial pipeline."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![ActionParameter::string(
            "folderPath",
            "Path of the content folder, e.g. content/raw/2025-07-31-brainstorm",
            true,
        )]
    }

    async fn execute(&self, input: Value, context: &ActionContext) -> Result<ActionResult, ActionError> {
        let folder_path = required_str(&input, "folderPath")?.trim();
        let _busy = context.state.begin_analysis();

        let result = match context.backend.analyze_folder(folder_path).await {
            Ok(result) => result,
            Err(err) if err.is_transport() => {
                return Err(ActionError::execution_failed(format!(
                    "Connection error: could not reach the backend at {}. Make sure the server is running. ({err})",
                    context.backend.base_url()
                )));
            }
            Err(err) => {
                return Err(ActionError::execution_failed(format!("Analysis error: {err}")));
            }
        };

        let summary = format!(
            "Analyzed folder {folder_path}. Found {} files of type {}.",
            result.files_count, result.content_type
        );
        let derived = suggestions::after_analysis(folder_path, &result);
        context
            .state
            .record_analysis(context.writer, folder_path, result, derived);
        Ok(ActionResult::success(summary))
    }
}
