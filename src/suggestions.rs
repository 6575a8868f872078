//! Suggested follow-up prompts derived from editorial state.

use crate::models::{AnalysisResult, ContentFolder};

/// Suggestions shown before anything has been loaded.
pub const INITIAL_SUGGESTIONS: [&str; 3] = [
    "Show available topics",
    "What's new in content?",
    "Which folders are waiting for analysis?",
];

pub const RATE_NEWEST_TOPICS: &str = "Rate the viral potential of the newest topics";
pub const ANALYZE_ANOTHER: &str = "Analyze another folder";
pub const PUBLISH_NOW: &str = "🔥 Publish now - high potential!";

/// Folders turned into explicit suggestions after a listing.
const LISTING_FOLDER_SUGGESTIONS: usize = 2;
/// Folders turned into suggestions when the session starts.
const STARTUP_FOLDER_SUGGESTIONS: usize = 3;

#[must_use]
pub fn initial() -> Vec<String> {
    INITIAL_SUGGESTIONS.iter().map(ToString::to_string).collect()
}

/// Prompt that asks for an analysis of one folder.
#[must_use]
pub fn analyze_folder_prompt(content_root: &str, folder: &ContentFolder) -> String {
    format!(
        "Analyze folder {}/{}",
        content_root.trim_end_matches('/'),
        folder.name
    )
}

/// After a listing: the first folders, then the fixed viral-potential prompt.
#[must_use]
pub fn after_listing(content_root: &str, folders: &[ContentFolder]) -> Vec<String> {
    folders
        .iter()
        .take(LISTING_FOLDER_SUGGESTIONS)
        .map(|folder| analyze_folder_prompt(content_root, folder))
        .chain(std::iter::once(RATE_NEWEST_TOPICS.to_string()))
        .collect()
}

/// After an analysis: save, run, analyze another. High-value results lead with "publish now".
#[must_use]
pub fn after_analysis(folder_path: &str, analysis: &AnalysisResult) -> Vec<String> {
    let mut suggestions = Vec::with_capacity(4);
    if analysis.is_high_value() {
        suggestions.push(PUBLISH_NOW.to_string());
    }
    suggestions.push(format!("Save editorial metadata for {folder_path}"));
    suggestions.push(format!("Run the editorial pipeline for {folder_path}"));
    suggestions.push(ANALYZE_ANOTHER.to_string());
    suggestions
}

/// At startup: one analyze prompt per top folder, or `None` to keep the defaults.
#[must_use]
pub fn on_startup(content_root: &str, folders: &[ContentFolder]) -> Option<Vec<String>> {
    if folders.is_empty() {
        return None;
    }
    Some(
        folders
            .iter()
            .take(STARTUP_FOLDER_SUGGESTIONS)
            .map(|folder| analyze_folder_prompt(content_root, folder))
            .collect(),
    )
}
