//! Folder listing action.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::Value;

use super::spec::{ActionContext, ActionError, ActionParameter, ActionResult, ActionSpec};
use crate::models::{ContentFolder, FolderListing};
use crate::suggestions;

pub struct ListContentFoldersAction;

#[async_trait]
impl ActionSpec for ListContentFoldersAction {
    fn name(&self) -> &'static str {
        "listContentFolders"
    }

    fn description(&self) -> &'static str {
        "Show the content folders available for analysis. Use this automatically at the start of a conversation."
    }

    fn parameters(&self) -> Vec<ActionParameter> {
        Vec::new()
    }

    async fn execute(
        &self,
        _input: Value,
        context: &ActionContext,
    ) -> Result<ActionResult, ActionError> {
        let listing = context
            .backend
            .list_content_folders()
            .await
            .map_err(|err| {
                ActionError::execution_failed(format!("Error while listing folders: {err}"))
            })?;

        let root = context.content_root();
        if listing.folders.is_empty() {
            context.state.replace_folders(context.writer, Vec::new(), None);
            return Ok(ActionResult::success(format!("No folders found in {root}/")));
        }

        let summary = format_listing(root, &listing);
        let derived = suggestions::after_listing(root, &listing.folders);
        context
            .state
            .replace_folders(context.writer, listing.folders, Some(derived));
        Ok(ActionResult::success(summary))
    }
}

fn format_listing(root: &str, listing: &FolderListing) -> String {
    let mut out = format!(
        "Refreshed the list! Found {} content folders:\n\n",
        listing.total()
    );
    for folder in &listing.folders {
        let _ = writeln!(out, "{}", folder_line(folder));
    }
    let _ = write!(
        out,
        "\nYou can analyze any of them with \"Analyze folder {root}/[folder-name]\""
    );
    out
}

fn folder_line(folder: &ContentFolder) -> String {
    let unit = if folder.files_count == 1 { "file" } else { "files" };
    format!("📁 {} ({} {unit})", folder.name, folder.files_count)
}
