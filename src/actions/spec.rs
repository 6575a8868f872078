//! Action trait, parameter schema, and shared helpers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::client::EditorialBackend;
use crate::console::PipelineConsole;
use crate::state::{StateStore, Writer};

// === Context ===

/// Everything an action handler may touch.
#[derive(Clone)]
pub struct ActionContext {
    pub backend: Arc<dyn EditorialBackend>,
    pub state: StateStore,
    pub console: PipelineConsole,
    /// Folder prefix used in user-facing prompts, e.g. `content/raw`.
    pub content_root: String,
    /// Who is invoking; recorded on suggestion writes.
    pub writer: Writer,
}

impl ActionContext {
    #[must_use]
    pub fn new(
        backend: Arc<dyn EditorialBackend>,
        state: StateStore,
        content_root: impl Into<String>,
    ) -> Self {
        let console = PipelineConsole::new(backend.clone(), state.clone());
        Self {
            backend,
            state,
            console,
            content_root: content_root.into(),
            writer: Writer::Assistant,
        }
    }

    /// Same context, invoked on behalf of another writer.
    #[must_use]
    pub fn as_writer(&self, writer: Writer) -> Self {
        Self {
            writer,
            ..self.clone()
        }
    }

    pub(crate) fn content_root(&self) -> &str {
        self.content_root.trim_end_matches('/')
    }
}

// === Parameters ===

/// Semantic type of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    String,
    StringArray,
    Object(Vec<ActionParameter>),
}

/// One declared parameter of an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionParameter {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

impl ActionParameter {
    #[must_use]
    pub fn string(name: &'static str, description: &'static str, required: bool) -> Self {
        Self {
            name,
            kind: ParamKind::String,
            description,
            required,
        }
    }

    #[must_use]
    pub fn string_array(name: &'static str, description: &'static str, required: bool) -> Self {
        Self {
            name,
            kind: ParamKind::StringArray,
            description,
            required,
        }
    }

    #[must_use]
    pub fn object(
        name: &'static str,
        description: &'static str,
        required: bool,
        fields: Vec<ActionParameter>,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Object(fields),
            description,
            required,
        }
    }

    fn schema(&self) -> Value {
        match &self.kind {
            ParamKind::String => json!({ "type": "string", "description": self.description }),
            ParamKind::StringArray => json!({
                "type": "array",
                "items": { "type": "string" },
                "description": self.description,
            }),
            ParamKind::Object(fields) => {
                let mut schema = object_schema(fields);
                if let Value::Object(map) = &mut schema {
                    map.insert("description".into(), Value::String(self.description.into()));
                }
                schema
            }
        }
    }
}

/// JSON schema for a list of parameters.
#[must_use]
pub fn object_schema(params: &[ActionParameter]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|param| (param.name.to_string(), param.schema()))
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|param| param.required)
        .map(|param| param.name)
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Check `input` against the declared parameters before a handler runs.
///
/// `null` input counts as an empty object. Undeclared keys are ignored.
pub fn validate_input(params: &[ActionParameter], input: &Value) -> Result<(), ActionError> {
    validate_fields(params, input, "")
}

fn validate_fields(params: &[ActionParameter], input: &Value, prefix: &str) -> Result<(), ActionError> {
    let empty = Map::new();
    let object = match input {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ActionError::invalid_input(format!(
                "Expected an object{}, got {}",
                if prefix.is_empty() {
                    String::new()
                } else {
                    format!(" for '{}'", prefix.trim_end_matches('.'))
                },
                type_name(other)
            )));
        }
    };

    for param in params {
        let path = format!("{prefix}{}", param.name);
        match object.get(param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(ActionError::missing_field(path));
                }
            }
            Some(value) => validate_value(param, value, &path)?,
        }
    }
    Ok(())
}

fn validate_value(param: &ActionParameter, value: &Value, path: &str) -> Result<(), ActionError> {
    match &param.kind {
        ParamKind::String => match value {
            Value::String(text) if param.required && text.trim().is_empty() => Err(
                ActionError::invalid_input(format!("Parameter '{path}' must not be empty")),
            ),
            Value::String(_) => Ok(()),
            other => Err(ActionError::invalid_input(format!(
                "Parameter '{path}' must be a string, got {}",
                type_name(other)
            ))),
        },
        ParamKind::StringArray => match value {
            Value::Array(items) => match items.iter().position(|item| !item.is_string()) {
                Some(idx) => Err(ActionError::invalid_input(format!(
                    "Parameter '{path}[{idx}]' must be a string, got {}",
                    type_name(&items[idx])
                ))),
                None => Ok(()),
            },
            other => Err(ActionError::invalid_input(format!(
                "Parameter '{path}' must be an array of strings, got {}",
                type_name(other)
            ))),
        },
        ParamKind::Object(fields) => validate_fields(fields, value, &format!("{path}.")),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a required string field. Call after [`validate_input`].
pub fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, ActionError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError::missing_field(field))
}

/// Read an optional string field; blank strings count as absent.
#[must_use]
pub fn optional_str<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

// === Results & Errors ===

/// Text handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub content: String,
    pub success: bool,
}

impl ActionResult {
    #[must_use]
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: true,
        }
    }

    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
    #[error("Missing required field: {field}")]
    MissingField { field: String },
    #[error("Not available: {message}")]
    NotAvailable { message: String },
    #[error("{message}")]
    ExecutionFailed { message: String },
}

impl ActionError {
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    #[must_use]
    pub fn not_available(message: impl Into<String>) -> Self {
        Self::NotAvailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }
}

/// Prose for an action failure, as handed back to the caller.
#[must_use]
pub fn format_action_error(err: &ActionError, action_name: &str) -> String {
    match err {
        ActionError::InvalidInput { message } => {
            format!("Invalid input for action '{action_name}': {message}")
        }
        ActionError::MissingField { field } => {
            format!("Action '{action_name}' is missing required parameter '{field}'")
        }
        ActionError::NotAvailable { message } => format!(
            "Action '{action_name}' is not available: {message}. Use one of the listed actions."
        ),
        ActionError::ExecutionFailed { message } => message.clone(),
    }
}

// === Trait ===

/// A named operation the assistant (or the user) may invoke.
#[async_trait]
pub trait ActionSpec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shown to the assistant to guide its choice of action.
    fn description(&self) -> &'static str;

    fn parameters(&self) -> Vec<ActionParameter>;

    fn input_schema(&self) -> Value {
        object_schema(&self.parameters())
    }

    /// Run the handler. Input has already passed [`validate_input`].
    async fn execute(&self, input: Value, context: &ActionContext)
    -> Result<ActionResult, ActionError>;
}
