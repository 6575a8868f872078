//! Editorial pipeline action.

use async_trait::async_trait;
use serde_json::Value;

use super::spec::{
    ActionContext, ActionError, ActionParameter, ActionResult, ActionSpec, required_str,
};
use crate::console::{ConsoleError, JobReport};

pub struct RunEditorialPipelineAction;

#[async_trait]
impl ActionSpec for RunEditorialPipelineAction {
    fn name(&self) -> &'static str {
        "runEditorialPipeline"
    }

    fn description(&self) -> &'static str {
        "FULL editorial pipeline: normalization plus the editorial board review. Long-running, streams progress into the console."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![ActionParameter::string(
            "contentPath",
            "Path of the raw content to process",
            true,
        )]
    }

    async fn execute(&self, input: Value, context: &ActionContext) -> Result<ActionResult, ActionError> {
        let content_path = required_str(&input, "contentPath")?.trim();
        match context.console.run(content_path).await {
            Ok(report) => Ok(ActionResult::success(finished_message(&report))),
            Err(ConsoleError::Conflict { active }) => Err(ActionError::execution_failed(format!(
                "❌ A pipeline is already running for {active}. Wait for it to finish before starting another."
            ))),
            Err(ConsoleError::Start(err)) => Err(ActionError::execution_failed(format!(
                "❌ Pipeline error: {err}"
            ))),
            Err(ConsoleError::Read { source, report }) => {
                Err(ActionError::execution_failed(format!(
                    "❌ Pipeline error: {source}{}",
                    dropped_note(&report)
                )))
            }
        }
    }
}

fn finished_message(report: &JobReport) -> String {
    format!(
        "✅ Pipeline finished! Received {} events; see the console for details.{}",
        report.events,
        dropped_note(report)
    )
}

fn dropped_note(report: &JobReport) -> String {
    match report.dropped_lines {
        0 => String::new(),
        1 => " 1 malformed event line was skipped.".to_string(),
        n => format!(" {n} malformed event lines were skipped."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_message_mentions_dropped_lines_only_when_present() {
        let mut report = JobReport {
            events: 3,
            ..JobReport::default()
        };
        assert_eq!(
            finished_message(&report),
            "✅ Pipeline finished! Received 3 events; see the console for details."
        );
        report.dropped_lines = 2;
        assert!(finished_message(&report).ends_with("2 malformed event lines were skipped."));
    }
}
