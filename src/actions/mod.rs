//! Actions the assistant can invoke, and their registry.

// === Modules ===

pub mod analyze;
pub mod folders;
pub mod metadata;
pub mod pipeline;
pub mod registry;
pub mod spec;
pub mod suggestions;

// === Re-exports ===

pub use registry::{ActionDescriptor, ActionRegistry, ActionRegistryBuilder};
pub use spec::{
    ActionContext, ActionError, ActionParameter, ActionResult, ActionSpec, ParamKind,
    format_action_error,
};
