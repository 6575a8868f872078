//! Readable context projected from editorial state for the assistant.
//!
//! Every slice is regenerated from a [`EditorialSnapshot`]. Nothing here
//! mutates state. Missing data renders as an explicit placeholder so the
//! assistant can tell "no data" apart from an empty value.

use std::fmt::Write as _;

use serde::Serialize;

use crate::state::{EditorialSnapshot, PipelinePhase};
use crate::utils::pretty_json;

pub const NO_ANALYSIS: &str = "No analysis yet";
pub const NO_FOLDERS: &str = "No folders loaded yet";
pub const NO_HISTORY: &str = "No folders analyzed yet";
pub const NO_SUGGESTIONS: &str = "No actions suggested yet";
pub const NO_STYLE_GUIDES: &str = "Style guides not loaded yet";

/// Editorial rules the assistant should keep in mind on every turn.
pub const EDITORIAL_QUICK_REFERENCE: &str = "\
QUICK EDITORIAL REFERENCE:

AUDIENCE PRIORITIES:
1. Senior Developers (primary) - Need: efficiency, depth, no BS
2. Tech Leaders - Need: strategic insights, trend validation
3. AI Engineers - Need: practical implementation, real benchmarks
4. Startup Founders - Need: actionable intel, cost/benefit analysis

CONTENT SCORING:
- Originality: 0-100 (>70 required)
- Technical Depth: 0-100 (>60 required)
- Practical Value: 0-100 (>80 required)
- Viral Potential: 0-100 (aim for >50)

PLATFORM OPTIMIZATION:
- LinkedIn: Professional controversy + data = engagement
- Twitter: Sharp takes + threads = virality
- Newsletter: Deep dives + exclusive insights = loyalty

RED FLAGS TO CATCH:
- Generic AI hype without specific use cases
- Untested code examples
- Opinion without evidence
- Corporate speak infiltration
- Forced controversy

GOLDEN RULES:
1. \"If you wouldn't share it with your smartest friend, don't publish\"
2. \"Data beats opinion, story beats data, data + story beats everything\"
3. \"Write like you're explaining to a skeptical expert\"
";

/// One named, described block of context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadableSlice {
    pub name: &'static str,
    pub description: &'static str,
    pub value: String,
}

impl ReadableSlice {
    fn new(name: &'static str, description: &'static str, value: String) -> Self {
        Self {
            name,
            description,
            value,
        }
    }
}

/// Project every readable slice, in a stable order.
#[must_use]
pub fn project(snapshot: &EditorialSnapshot) -> Vec<ReadableSlice> {
    vec![
        ReadableSlice::new(
            "current_analysis",
            "Current analysis result",
            current_analysis(snapshot),
        ),
        ReadableSlice::new(
            "content_folders",
            "Available content folders loaded from the backend",
            content_folders(snapshot),
        ),
        ReadableSlice::new(
            "analysis_history",
            "Analysis history - which folders were already analyzed",
            analysis_history(snapshot),
        ),
        ReadableSlice::new(
            "suggested_actions",
            "Currently suggested quick actions for the user",
            suggested_actions(snapshot),
        ),
        ReadableSlice::new(
            "style_guides",
            "Complete style guide documentation",
            style_guides(snapshot),
        ),
        ReadableSlice::new(
            "editorial_quick_reference",
            "Editorial quick reference",
            EDITORIAL_QUICK_REFERENCE.to_string(),
        ),
        ReadableSlice::new(
            "pipeline_status",
            "Whether an editorial pipeline job is active",
            pipeline_status(snapshot),
        ),
    ]
}

/// Look up a single slice by name.
#[must_use]
pub fn slice(snapshot: &EditorialSnapshot, name: &str) -> Option<ReadableSlice> {
    project(snapshot).into_iter().find(|slice| slice.name == name)
}

/// Render all slices as one text block, ready to prepend to an assistant turn.
#[must_use]
pub fn render_for_prompt(slices: &[ReadableSlice]) -> String {
    let mut out = String::new();
    for (idx, slice) in slices.iter().enumerate() {
        if idx > 0 {
            out.push_str("\n\n");
        }
        let _ = writeln!(out, "## {} ({})", slice.description, slice.name);
        out.push_str(slice.value.trim_end());
    }
    out
}

fn current_analysis(snapshot: &EditorialSnapshot) -> String {
    snapshot
        .analysis
        .as_ref()
        .and_then(|analysis| serde_json::to_value(analysis).ok())
        .map_or_else(|| NO_ANALYSIS.to_string(), |value| pretty_json(&value))
}

fn content_folders(snapshot: &EditorialSnapshot) -> String {
    if snapshot.folders.is_empty() {
        return NO_FOLDERS.to_string();
    }
    let listed = snapshot
        .folders
        .iter()
        .map(|folder| format!("{} ({} files)", folder.name, folder.files_count))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Loaded {} folders: {listed}", snapshot.folders.len())
}

fn analysis_history(snapshot: &EditorialSnapshot) -> String {
    if snapshot.history.is_empty() {
        return NO_HISTORY.to_string();
    }
    serde_json::to_value(&snapshot.history)
        .map_or_else(|_| NO_HISTORY.to_string(), |value| pretty_json(&value))
}

fn suggested_actions(snapshot: &EditorialSnapshot) -> String {
    if snapshot.suggestions.is_empty() {
        NO_SUGGESTIONS.to_string()
    } else {
        snapshot.suggestions.join(", ")
    }
}

fn style_guides(snapshot: &EditorialSnapshot) -> String {
    if snapshot.style_guides.is_empty() {
        return NO_STYLE_GUIDES.to_string();
    }
    snapshot
        .style_guides
        .guides
        .iter()
        .map(|(file, content)| format!("=== {file} ===\n\n{content}"))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn pipeline_status(snapshot: &EditorialSnapshot) -> String {
    let status = &snapshot.pipeline;
    let path = status.content_path.as_deref().unwrap_or("?");
    match status.phase {
        PipelinePhase::Idle => "Idle".to_string(),
        PipelinePhase::Starting => format!("Starting for {path}"),
        PipelinePhase::Running => format!(
            "Running for {path} ({} lines, {} dropped)",
            snapshot.console.len(),
            status.dropped_lines
        ),
    }
}
