//! Registry of invocable actions.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::analyze::AnalyzeFolderAction;
use super::folders::ListContentFoldersAction;
use super::metadata::SaveMetadataAction;
use super::pipeline::RunEditorialPipelineAction;
use super::spec::{
    ActionContext, ActionError, ActionResult, ActionSpec, format_action_error, validate_input,
};
use super::suggestions::SetSuggestedActionsAction;
use crate::logging;

/// Public description of one action, as listed to the assistant.
#[derive(Debug, Clone, Serialize)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Ordered set of actions, unique by name.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: Vec<Arc<dyn ActionSpec>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionSpec>> {
        self.actions
            .iter()
            .find(|action| action.name() == name)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|action| action.name()).collect()
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.actions
            .iter()
            .map(|action| ActionDescriptor {
                name: action.name(),
                description: action.description(),
                parameters: action.input_schema(),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Validate and run one action, keeping the typed outcome.
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        context: &ActionContext,
    ) -> Result<ActionResult, ActionError> {
        let Some(action) = self.get(name) else {
            return Err(ActionError::not_available(format!(
                "unknown action (available: {})",
                self.names().join(", ")
            )));
        };
        validate_input(&action.parameters(), &input)?;
        action.execute(input, context).await
    }

    /// Run one action and always hand back text, success or not.
    pub async fn invoke(&self, name: &str, input: Value, context: &ActionContext) -> String {
        logging::info(format!("Invoking action {name} ({:?})", context.writer));
        match self.execute(name, input, context).await {
            Ok(result) => {
                logging::info(format!(
                    "Action {name} finished: {}",
                    if result.success { "ok" } else { "reported failure" }
                ));
                result.content
            }
            Err(err) => {
                logging::warn(format!("Action {name} failed: {err}"));
                format_action_error(&err, name)
            }
        }
    }
}

/// Builds an [`ActionRegistry`]. Registering a name twice keeps the later action.
#[derive(Default)]
#[must_use]
pub struct ActionRegistryBuilder {
    actions: Vec<Arc<dyn ActionSpec>>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, action: Arc<dyn ActionSpec>) -> Self {
        if let Some(existing) = self
            .actions
            .iter_mut()
            .find(|existing| existing.name() == action.name())
        {
            *existing = action;
        } else {
            self.actions.push(action);
        }
        self
    }

    pub fn with_folder_actions(self) -> Self {
        self.register(Arc::new(ListContentFoldersAction))
            .register(Arc::new(AnalyzeFolderAction))
    }

    pub fn with_metadata_action(self) -> Self {
        self.register(Arc::new(SaveMetadataAction))
    }

    pub fn with_suggestion_action(self) -> Self {
        self.register(Arc::new(SetSuggestedActionsAction))
    }

    pub fn with_pipeline_action(self) -> Self {
        self.register(Arc::new(RunEditorialPipelineAction))
    }

    /// The full editorial action set.
    pub fn with_editorial_actions(self) -> Self {
        self.with_folder_actions()
            .with_metadata_action()
            .with_suggestion_action()
            .with_pipeline_action()
    }

    #[must_use]
    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            actions: self.actions,
        }
    }
}
