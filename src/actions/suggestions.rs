//! Suggested-actions action.

use async_trait::async_trait;
use serde_json::Value;

use super::spec::{ActionContext, ActionError, ActionParameter, ActionResult, ActionSpec};

pub struct SetSuggestedActionsAction;

#[async_trait]
impl ActionSpec for SetSuggestedActionsAction {
    fn name(&self) -> &'static str {
        "setSuggestedActions"
    }

    fn description(&self) -> &'static str {
        "Set the suggested follow-up actions shown to the user, based on the current context."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        vec![ActionParameter::object(
            "actions",
            "Suggested actions",
            true,
            vec![ActionParameter::string_array(
                "suggestions",
                "Short follow-up prompts, in display order",
                true,
            )],
        )]
    }

    async fn execute(&self, input: Value, context: &ActionContext) -> Result<ActionResult, ActionError> {
        let suggestions: Vec<String> = input
            .pointer("/actions/suggestions")
            .and_then(Value::as_array)
            .ok_or_else(|| ActionError::missing_field("actions.suggestions"))?
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect();

        let count = suggestions.len();
        context.state.set_suggestions(context.writer, suggestions);
        Ok(ActionResult::success(format!(
            "✅ Set {count} suggested actions."
        )))
    }
}
