//! Session wiring: backend, state, action registry, and the ready event.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::actions::{ActionContext, ActionRegistry, ActionRegistryBuilder};
use crate::client::{BackendClient, EditorialBackend};
use crate::config::Config;
use crate::context::{self, ReadableSlice};
use crate::logging;
use crate::state::{StateStore, Writer};
use crate::suggestions;

const EVENT_CAPACITY: usize = 16;

/// Lifecycle events front ends can react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Startup data is loaded; the assistant surface may begin its first turn.
    Ready { folders: usize, style_guides: usize },
}

/// One running console: shared state plus the actions that act on it.
#[derive(Clone)]
pub struct Session {
    backend: Arc<dyn EditorialBackend>,
    state: StateStore,
    registry: ActionRegistry,
    content_root: String,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    #[must_use]
    pub fn new(backend: Arc<dyn EditorialBackend>, content_root: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            state: StateStore::new(),
            registry: ActionRegistryBuilder::new().with_editorial_actions().build(),
            content_root: content_root.into(),
            events,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = BackendClient::new(config).context("Failed to build backend client")?;
        Ok(Self::new(Arc::new(client), config.content_root()))
    }

    #[must_use]
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    #[must_use]
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn content_root(&self) -> &str {
        &self.content_root
    }

    #[must_use]
    pub fn backend_url(&self) -> &str {
        self.backend.base_url()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn action_context(&self, writer: Writer) -> ActionContext {
        ActionContext::new(self.backend.clone(), self.state.clone(), &self.content_root)
            .as_writer(writer)
    }

    /// Invoke an action by name. Always returns text.
    pub async fn invoke(&self, writer: Writer, name: &str, input: Value) -> String {
        let context = self.action_context(writer);
        self.registry.invoke(name, input, &context).await
    }

    #[must_use]
    pub fn readable_context(&self) -> Vec<ReadableSlice> {
        context::project(&self.state.snapshot())
    }

    /// Load style guides and folders, seed suggestions, then announce readiness.
    ///
    /// Backend failures are logged and leave the defaults in place.
    pub async fn initialize(&self) -> SessionEvent {
        match self.backend.list_style_guides().await {
            Ok(guides) => {
                logging::info(format!("Loaded {} style guides", guides.guides.len()));
                self.state.set_style_guides(guides);
            }
            Err(err) => logging::warn(format!("Failed to load style guides: {err}")),
        }

        match self.backend.list_content_folders().await {
            Ok(listing) => {
                let seeded = suggestions::on_startup(&self.content_root, &listing.folders);
                logging::info(format!("Loaded {} content folders", listing.folders.len()));
                self.state
                    .replace_folders(Writer::System, listing.folders, seeded);
            }
            Err(err) => logging::warn(format!("Failed to load content folders: {err}")),
        }

        let snapshot = self.state.snapshot();
        let event = SessionEvent::Ready {
            folders: snapshot.folders.len(),
            style_guides: snapshot.style_guides.guides.len(),
        };
        // No subscribers is fine; the caller still gets the event.
        let _ = self.events.send(event.clone());
        event
    }
}
