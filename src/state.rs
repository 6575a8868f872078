//! Authoritative editorial state.
//!
//! All application state lives behind one [`StateStore`]. Writers (assistant
//! actions, user affordances, the pipeline console) go through its explicit
//! operations; readers take a [`EditorialSnapshot`]. Writes are
//! last-writer-wins. Every write bumps a revision and notifies subscribers.
//!
//! The inner mutex is only held for the duration of a single operation and
//! never across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{AnalysisRecord, AnalysisResult, ContentFolder, StyleGuides};
use crate::suggestions;

/// Who performed a write. Recorded so suggestion races can be audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Writer {
    Assistant,
    User,
    System,
}

/// Lifecycle phase of the pipeline console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    #[default]
    Idle,
    /// Invocation accepted, waiting for the stream to open.
    Starting,
    Running,
}

/// Observable pipeline status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub phase: PipelinePhase,
    pub job_id: Option<String>,
    pub content_path: Option<String>,
    /// Malformed event lines dropped during the current (or last) job.
    pub dropped_lines: u64,
    /// Malformed event lines dropped since the store was created.
    pub dropped_lines_total: u64,
}

impl PipelineStatus {
    /// The job-running flag: true only while the stream is being consumed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == PipelinePhase::Running
    }
}

/// Point-in-time copy of the whole state.
#[derive(Debug, Clone, Serialize)]
pub struct EditorialSnapshot {
    pub revision: u64,
    pub analysis: Option<AnalysisResult>,
    pub analysis_loading: bool,
    pub folders: Vec<ContentFolder>,
    pub history: BTreeMap<String, AnalysisRecord>,
    pub suggestions: Vec<String>,
    pub suggestions_writer: Writer,
    pub pipeline: PipelineStatus,
    pub console: Vec<String>,
    #[serde(skip)]
    pub style_guides: StyleGuides,
}

#[derive(Debug)]
struct Inner {
    revision: u64,
    analysis: Option<AnalysisResult>,
    analyses_in_flight: usize,
    folders: Vec<ContentFolder>,
    history: BTreeMap<String, AnalysisRecord>,
    suggestions: Vec<String>,
    suggestions_writer: Writer,
    pipeline: PipelineStatus,
    console: Vec<String>,
    style_guides: StyleGuides,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            revision: 0,
            analysis: None,
            analyses_in_flight: 0,
            folders: Vec::new(),
            history: BTreeMap::new(),
            suggestions: suggestions::initial(),
            suggestions_writer: Writer::System,
            pipeline: PipelineStatus::default(),
            console: Vec::new(),
            style_guides: StyleGuides::default(),
        }
    }
}

/// Returned when a pipeline job is requested while another is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineBusy {
    pub content_path: Option<String>,
    pub phase: PipelinePhase,
}

/// A follower's position in the console of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleCursor {
    job_id: Option<String>,
    offset: usize,
}

/// Cloneable handle to the single state owner.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
    changes: watch::Sender<u64>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply one write and publish the new revision.
    fn write<R>(&self, apply: impl FnOnce(&mut Inner) -> R) -> R {
        let (out, revision) = {
            let mut inner = self.lock();
            let out = apply(&mut inner);
            inner.revision += 1;
            (out, inner.revision)
        };
        self.changes.send_replace(revision);
        out
    }

    /// Subscribe to revision changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> EditorialSnapshot {
        let inner = self.lock();
        EditorialSnapshot {
            revision: inner.revision,
            analysis: inner.analysis.clone(),
            analysis_loading: inner.analyses_in_flight > 0,
            folders: inner.folders.clone(),
            history: inner.history.clone(),
            suggestions: inner.suggestions.clone(),
            suggestions_writer: inner.suggestions_writer,
            pipeline: inner.pipeline.clone(),
            console: inner.console.clone(),
            style_guides: inner.style_guides.clone(),
        }
    }

    // === Narrow reads ===

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    #[must_use]
    pub fn current_analysis(&self) -> Option<AnalysisResult> {
        self.lock().analysis.clone()
    }

    #[must_use]
    pub fn folders(&self) -> Vec<ContentFolder> {
        self.lock().folders.clone()
    }

    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        self.lock().suggestions.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().analyses_in_flight > 0
    }

    #[must_use]
    pub fn pipeline_status(&self) -> PipelineStatus {
        self.lock().pipeline.clone()
    }

    #[must_use]
    pub fn is_pipeline_running(&self) -> bool {
        self.lock().pipeline.is_running()
    }

    /// Console lines from `offset` onwards.
    #[must_use]
    pub fn console_since(&self, offset: usize) -> Vec<String> {
        let inner = self.lock();
        inner.console.get(offset..).map(<[String]>::to_vec).unwrap_or_default()
    }

    #[must_use]
    pub fn console_len(&self) -> usize {
        self.lock().console.len()
    }

    /// Cursor positioned after the lines already in the console.
    #[must_use]
    pub fn console_cursor(&self) -> ConsoleCursor {
        let inner = self.lock();
        ConsoleCursor {
            job_id: inner.pipeline.job_id.clone(),
            offset: inner.console.len(),
        }
    }

    /// Lines appended since the cursor last read.
    ///
    /// When another job has claimed the console since then, reading restarts
    /// from that job's first line.
    pub fn read_console(&self, cursor: &mut ConsoleCursor) -> Vec<String> {
        let inner = self.lock();
        if inner.pipeline.job_id != cursor.job_id {
            cursor.job_id = inner.pipeline.job_id.clone();
            cursor.offset = 0;
        }
        let lines = inner
            .console
            .get(cursor.offset..)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        cursor.offset += lines.len();
        lines
    }

    // === Writes ===

    pub fn set_style_guides(&self, guides: StyleGuides) {
        self.write(|inner| inner.style_guides = guides);
    }

    /// Replace the folder list wholesale, together with the suggestions derived from it.
    pub fn replace_folders(
        &self,
        writer: Writer,
        folders: Vec<ContentFolder>,
        suggestions: Option<Vec<String>>,
    ) {
        self.write(|inner| {
            inner.folders = folders;
            if let Some(suggestions) = suggestions {
                inner.suggestions = suggestions;
                inner.suggestions_writer = writer;
            }
        });
    }

    /// Store a completed analysis: current result, history entry and suggestions.
    pub fn record_analysis(
        &self,
        writer: Writer,
        folder_path: &str,
        result: AnalysisResult,
        suggestions: Vec<String>,
    ) -> AnalysisRecord {
        let record = AnalysisRecord {
            result: result.clone(),
            analyzed_at: Utc::now(),
        };
        self.write(|inner| {
            inner.analysis = Some(result);
            inner.history.insert(folder_path.to_string(), record.clone());
            inner.suggestions = suggestions;
            inner.suggestions_writer = writer;
        });
        record
    }

    /// Replace the suggestion list. No merge, last writer wins.
    pub fn set_suggestions(&self, writer: Writer, suggestions: Vec<String>) {
        self.write(|inner| {
            inner.suggestions = suggestions;
            inner.suggestions_writer = writer;
        });
    }

    /// Mark an analysis as in flight until the returned guard drops.
    #[must_use = "the loading flag clears when the guard drops"]
    pub fn begin_analysis(&self) -> AnalysisGuard {
        self.write(|inner| inner.analyses_in_flight += 1);
        AnalysisGuard {
            store: self.clone(),
        }
    }

    /// Claim the pipeline console for a new job.
    ///
    /// Clears the console and enters `Starting`. Fails if a job is already
    /// starting or running. The claim is released when the guard drops.
    pub fn reserve_pipeline(&self, content_path: &str) -> Result<PipelineGuard, PipelineBusy> {
        let job_id = Uuid::new_v4().to_string();
        let claimed = job_id.clone();
        self.write(|inner| {
            if inner.pipeline.phase != PipelinePhase::Idle {
                return Err(PipelineBusy {
                    content_path: inner.pipeline.content_path.clone(),
                    phase: inner.pipeline.phase,
                });
            }
            inner.console.clear();
            inner.pipeline.phase = PipelinePhase::Starting;
            inner.pipeline.job_id = Some(claimed);
            inner.pipeline.content_path = Some(content_path.to_string());
            inner.pipeline.dropped_lines = 0;
            Ok(())
        })?;
        Ok(PipelineGuard {
            store: self.clone(),
            job_id,
        })
    }

    /// Append the rendered lines of one event as a single group.
    pub fn append_console(&self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        self.write(|inner| inner.console.extend(lines));
    }

    pub fn record_dropped_line(&self) {
        self.write(|inner| {
            inner.pipeline.dropped_lines += 1;
            inner.pipeline.dropped_lines_total += 1;
        });
    }
}

/// Clears one unit of the analysis loading flag on drop.
pub struct AnalysisGuard {
    store: StateStore,
}

impl Drop for AnalysisGuard {
    fn drop(&mut self) {
        self.store
            .write(|inner| inner.analyses_in_flight = inner.analyses_in_flight.saturating_sub(1));
    }
}

/// Exclusive claim on the pipeline console. Returns the console to `Idle` on drop.
pub struct PipelineGuard {
    store: StateStore,
    job_id: String,
}

impl PipelineGuard {
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The stream is open: raise the running flag.
    pub fn mark_running(&self) {
        self.store.write(|inner| {
            if inner.pipeline.job_id.as_deref() == Some(self.job_id.as_str()) {
                inner.pipeline.phase = PipelinePhase::Running;
            }
        });
    }
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        self.store.write(|inner| {
            if inner.pipeline.job_id.as_deref() == Some(self.job_id.as_str()) {
                inner.pipeline.phase = PipelinePhase::Idle;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn analysis(folder: &str, score: f64) -> AnalysisResult {
        serde_json::from_value(json!({
            "folder": folder,
            "filesCount": 2,
            "contentType": "GENERAL",
            "valueScore": score,
            "topics": []
        }))
        .expect("analysis")
    }

    #[test]
    fn starts_with_default_suggestions() {
        let store = StateStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.suggestions, suggestions::initial());
        assert_eq!(snapshot.suggestions_writer, Writer::System);
        assert!(!snapshot.analysis_loading);
        assert_eq!(snapshot.pipeline.phase, PipelinePhase::Idle);
    }

    #[test]
    fn history_overwrites_per_folder() {
        let store = StateStore::new();
        store.record_analysis(Writer::Assistant, "content/raw/a", analysis("a", 5.0), vec![]);
        store.record_analysis(Writer::Assistant, "content/raw/b", analysis("b", 6.0), vec![]);
        store.record_analysis(Writer::Assistant, "content/raw/a", analysis("a", 9.0), vec![]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.history["content/raw/a"].result.value_score, 9.0);
        assert_eq!(snapshot.analysis.expect("current").value_score, 9.0);
    }

    #[test]
    fn suggestions_last_writer_wins() {
        let store = StateStore::new();
        store.set_suggestions(Writer::Assistant, vec!["a".into(), "b".into()]);
        store.set_suggestions(Writer::User, vec!["c".into(), "c".into()]);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.suggestions, vec!["c".to_string(), "c".to_string()]);
        assert_eq!(snapshot.suggestions_writer, Writer::User);
    }

    #[test]
    fn analysis_guard_counts_overlapping_work() {
        let store = StateStore::new();
        let first = store.begin_analysis();
        let second = store.begin_analysis();
        drop(first);
        assert!(store.is_loading());
        drop(second);
        assert!(!store.is_loading());
    }

    #[test]
    fn pipeline_reservation_is_exclusive() {
        let store = StateStore::new();
        store.append_console(vec!["old".into()]);

        let guard = store.reserve_pipeline("content/raw/a").expect("first claim");
        assert_eq!(store.console_len(), 0);
        assert!(!store.is_pipeline_running());

        let Err(busy) = store.reserve_pipeline("content/raw/b") else {
            panic!("second claim should be rejected while the first is active");
        };
        assert_eq!(busy.content_path.as_deref(), Some("content/raw/a"));
        assert_eq!(busy.phase, PipelinePhase::Starting);

        guard.mark_running();
        assert!(store.is_pipeline_running());
        drop(guard);
        assert!(!store.is_pipeline_running());
        assert_eq!(store.pipeline_status().phase, PipelinePhase::Idle);
        assert!(store.reserve_pipeline("content/raw/b").is_ok());
    }

    #[test]
    fn console_cursor_skips_earlier_lines_and_follows_new_jobs() {
        let store = StateStore::new();
        let first = store.reserve_pipeline("content/raw/a").expect("first claim");
        store.append_console(vec!["a1".into(), "a2".into()]);

        let mut cursor = store.console_cursor();
        assert!(store.reserve_pipeline("content/raw/b").is_err());
        store.append_console(vec!["a3".into()]);
        assert_eq!(store.read_console(&mut cursor), vec!["a3".to_string()]);
        assert!(store.read_console(&mut cursor).is_empty());

        drop(first);
        let _second = store.reserve_pipeline("content/raw/b").expect("second claim");
        store.append_console(vec!["b1".into()]);
        assert_eq!(store.read_console(&mut cursor), vec!["b1".to_string()]);
    }

    #[test]
    fn writes_bump_revision_and_notify() {
        let store = StateStore::new();
        let receiver = store.subscribe();
        let before = store.revision();
        store.replace_folders(Writer::System, vec![ContentFolder::new("a", 1)], None);
        assert_eq!(store.revision(), before + 1);
        assert_eq!(*receiver.borrow(), before + 1);
    }

    #[test]
    fn console_since_handles_out_of_range() {
        let store = StateStore::new();
        store.append_console(vec!["a".into(), "b".into()]);
        assert_eq!(store.console_since(1), vec!["b".to_string()]);
        assert!(store.console_since(5).is_empty());
    }
}
