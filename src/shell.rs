//! Terminal presentation of the editorial state, plus the user's own affordances.
//!
//! Rendering is read-only. The affordances write through the same
//! [`StateStore`](crate::state::StateStore) operations the assistant uses,
//! tagged as [`Writer::User`].

use std::fmt::Write as _;

use colored::Colorize;
use serde_json::json;

use crate::actions::ActionDescriptor;
use crate::models::{AnalysisResult, ContentFolder};
use crate::session::Session;
use crate::state::{EditorialSnapshot, PipelinePhase, Writer};

pub const PROCESSING_TAIL: &str = "Processing...";

// === Rendering ===

#[must_use]
pub fn render_analysis(analysis: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("📊 {}", analysis.folder).bold());
    let score = format!("{}/10", analysis.value_score);
    let score = if analysis.is_high_value() {
        score.green().bold()
    } else {
        score.yellow()
    };
    let _ = writeln!(out, "  Value score:  {score}");
    let _ = writeln!(out, "  Files:        {}", analysis.files_count);
    let _ = writeln!(out, "  Content type: {}", analysis.content_type);
    if !analysis.series_title.is_empty() {
        let _ = writeln!(out, "  Series:       {}", analysis.series_title);
    }
    if !analysis.recommendation.is_empty() {
        let _ = writeln!(out, "  {}", analysis.recommendation.italic());
    }
    for topic in &analysis.topics {
        let _ = writeln!(
            out,
            "  {} {} ({}, {}/10)",
            "·".dimmed(),
            topic.title,
            topic.platform,
            topic.viral_score
        );
    }
    out
}

#[must_use]
pub fn render_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return format!("{}\n", "No suggested actions".dimmed());
    }
    let mut out = format!("{}\n", "🎯 Suggested actions:".bold());
    for (idx, suggestion) in suggestions.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {suggestion}", idx + 1);
    }
    out
}

#[must_use]
pub fn render_folders(content_root: &str, folders: &[ContentFolder]) -> String {
    if folders.is_empty() {
        return format!("{}\n", "No content folders loaded".dimmed());
    }
    let mut out = format!(
        "{}\n",
        format!("📂 Topics available for analysis ({}):", folders.len()).bold()
    );
    for (idx, folder) in folders.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} {}",
            idx + 1,
            folder.name.cyan(),
            format!("({} files, {}/{})", folder.files_count, content_root, folder.name).dimmed()
        );
    }
    let _ = writeln!(out, "{}", "💡 Use `pick <n>` to analyze a topic".dimmed());
    out
}

#[must_use]
pub fn render_console(lines: &[String], running: bool) -> String {
    let mut out = String::new();
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    if running {
        let _ = writeln!(out, "{}", PROCESSING_TAIL.yellow());
    }
    out
}

#[must_use]
pub fn render_state(content_root: &str, snapshot: &EditorialSnapshot) -> String {
    let mut out = String::new();
    if snapshot.analysis_loading {
        let _ = writeln!(out, "{}", "⏳ Analysis in progress...".yellow());
    }
    match &snapshot.analysis {
        Some(analysis) => out.push_str(&render_analysis(analysis)),
        None => {
            let _ = writeln!(out, "{}", "No analysis yet".dimmed());
        }
    }
    out.push('\n');
    out.push_str(&render_folders(content_root, &snapshot.folders));
    out.push('\n');
    out.push_str(&render_suggestions(&snapshot.suggestions));
    match snapshot.pipeline.phase {
        PipelinePhase::Idle if snapshot.console.is_empty() => {}
        phase => {
            out.push('\n');
            let _ = writeln!(out, "{}", "🚀 Pipeline console:".bold());
            out.push_str(&render_console(
                &snapshot.console,
                phase != PipelinePhase::Idle,
            ));
        }
    }
    out
}

#[must_use]
pub fn render_actions(descriptors: &[ActionDescriptor]) -> String {
    let mut out = String::new();
    for descriptor in descriptors {
        let _ = writeln!(out, "{}", descriptor.name.bold());
        let _ = writeln!(out, "  {}", descriptor.description);
        let required = descriptor.parameters["required"]
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        if !required.is_empty() {
            let _ = writeln!(out, "  {} {required}", "required:".dimmed());
        }
    }
    out
}

// === User Affordances ===

/// User-side writes into the shared editorial state.
#[derive(Clone)]
pub struct Shell {
    session: Session,
}

impl Shell {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Path of the 1-based folder entry, as the analysis action expects it.
    pub fn folder_path(&self, number: usize) -> Result<String, String> {
        let folders = self.session.state().folders();
        let folder = number
            .checked_sub(1)
            .and_then(|idx| folders.get(idx))
            .ok_or_else(|| format!("No folder #{number} (have {})", folders.len()))?;
        Ok(format!(
            "{}/{}",
            self.session.content_root().trim_end_matches('/'),
            folder.name
        ))
    }

    /// Analyze the 1-based folder entry on behalf of the user.
    pub async fn pick_folder(&self, number: usize) -> String {
        match self.folder_path(number) {
            Ok(path) => {
                self.session
                    .invoke(Writer::User, "analyzeFolder", json!({ "folderPath": path }))
                    .await
            }
            Err(message) => message,
        }
    }

    /// Replace the suggestion list directly, as the user.
    pub fn set_suggestions(&self, suggestions: Vec<String>) -> String {
        let count = suggestions.len();
        self.session
            .state()
            .set_suggestions(Writer::User, suggestions);
        format!("Set {count} suggested actions.")
    }

    /// Text of the 1-based suggestion entry.
    pub fn suggestion(&self, number: usize) -> Result<String, String> {
        let suggestions = self.session.state().suggestions();
        number
            .checked_sub(1)
            .and_then(|idx| suggestions.get(idx))
            .cloned()
            .ok_or_else(|| format!("No suggestion #{number} (have {})", suggestions.len()))
    }

    /// Copy the 1-based suggestion to the clipboard. Best effort.
    pub fn copy_suggestion(&self, number: usize) -> String {
        let text = match self.suggestion(number) {
            Ok(text) => text,
            Err(message) => return message,
        };
        match copy_to_clipboard(&text) {
            Ok(()) => format!("Copied: {text}"),
            Err(err) => format!("Could not copy to clipboard ({err}). Suggestion: {text}"),
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        render_state(self.session.content_root(), &self.session.state().snapshot())
    }
}

fn copy_to_clipboard(text: &str) -> Result<(), arboard::Error> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text.to_string())
}
