//! Streaming pipeline console.
//!
//! One job opens one server-sent event stream. Bytes are decoded into lines,
//! `data:` lines into [`PipelineEvent`]s, and each event into a group of
//! console lines appended to the shared state in stream order.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;

use crate::client::{BackendError, EditorialBackend};
use crate::logging;
use crate::models::{EventTimestamp, PipelineEvent, PipelineEventKind};
use crate::state::StateStore;
use crate::utils::pretty_json;

pub const SEPARATOR_CHAR: char = '━';
pub const SEPARATOR_WIDTH: usize = 50;
pub const RESULTS_HEADER: &str = "📊 RESULTS:";

// === Decoding ===

/// Longest line kept whole. Longer lines are cut and the rest continues as
/// the next line.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Splits a byte stream into text lines.
///
/// Bytes are buffered until a `\n` arrives, so a line (or a multi-byte
/// character) split across chunks is decoded once, whole.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline.
    scanned: usize,
}

impl SseLineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + pos;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
            self.scanned = start;
        }
        while self.buffer.len() - start > MAX_LINE_BYTES {
            let end = start + MAX_LINE_BYTES;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        lines
    }

    /// Flush a trailing line that was never terminated.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Classification of one decoded line.
#[derive(Debug)]
pub enum ParsedLine {
    /// Blank line, comment, or a field other than `data`.
    NotData,
    Event(PipelineEvent),
    Malformed(serde_json::Error),
}

/// Parse a single SSE line. Only `data:` lines carry events.
#[must_use]
pub fn parse_event_line(line: &str) -> ParsedLine {
    let Some(payload) = line.strip_prefix("data:") else {
        return ParsedLine::NotData;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim().is_empty() {
        return ParsedLine::NotData;
    }
    match serde_json::from_str::<PipelineEvent>(payload) {
        Ok(event) => ParsedLine::Event(event),
        Err(err) => ParsedLine::Malformed(err),
    }
}

// === Rendering ===

#[must_use]
pub fn separator() -> String {
    SEPARATOR_CHAR.to_string().repeat(SEPARATOR_WIDTH)
}

/// Local wall-clock time of an event, or now when absent or unreadable.
#[must_use]
pub fn format_event_time(timestamp: Option<&EventTimestamp>) -> String {
    let time = timestamp
        .and_then(EventTimestamp::to_millis)
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Local::now);
    time.format("%H:%M:%S").to_string()
}

/// Lines produced by one event, appended as a group.
#[must_use]
pub fn render_event(event: &PipelineEvent) -> Vec<String> {
    let mut lines = vec![format!(
        "[{}] {}",
        format_event_time(event.timestamp.as_ref()),
        event.message
    )];
    match event.kind {
        PipelineEventKind::PhaseStart => lines.push(separator()),
        PipelineEventKind::Result => {
            lines.push(String::new());
            lines.push(RESULTS_HEADER.to_string());
            lines.push(pretty_json(event.summary.as_ref().unwrap_or(&Value::Null)));
        }
        _ => {}
    }
    lines
}

// === Jobs ===

/// Summary of one finished (or broken) pipeline job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobReport {
    pub job_id: String,
    pub content_path: String,
    pub events: usize,
    pub lines: usize,
    pub dropped_lines: u64,
    pub completed: bool,
    pub errors: Vec<String>,
    pub summary: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("A pipeline job is already active for {active}")]
    Conflict { active: String },
    #[error("{0}")]
    Start(#[source] BackendError),
    #[error("{source}")]
    Read {
        #[source]
        source: BackendError,
        report: Box<JobReport>,
    },
}

/// Runs pipeline jobs against a backend, writing into the shared console.
#[derive(Clone)]
pub struct PipelineConsole {
    backend: Arc<dyn EditorialBackend>,
    state: StateStore,
}

impl PipelineConsole {
    #[must_use]
    pub fn new(backend: Arc<dyn EditorialBackend>, state: StateStore) -> Self {
        Self { backend, state }
    }

    /// Run one job to the end of its stream.
    ///
    /// The console is cleared when the job is accepted. The running flag is
    /// raised once the stream opens and always lowered before returning.
    pub async fn run(&self, content_path: &str) -> Result<JobReport, ConsoleError> {
        let guard = self
            .state
            .reserve_pipeline(content_path)
            .map_err(|busy| ConsoleError::Conflict {
                active: busy.content_path.unwrap_or_default(),
            })?;
        logging::info(format!(
            "Pipeline job {} starting for {content_path}",
            guard.job_id()
        ));

        let mut stream = match self.backend.start_pipeline(content_path).await {
            Ok(stream) => stream,
            Err(err) => {
                logging::warn(format!("Pipeline job {} failed to start: {err}", guard.job_id()));
                return Err(ConsoleError::Start(err));
            }
        };
        guard.mark_running();

        let mut report = JobReport {
            job_id: guard.job_id().to_string(),
            content_path: content_path.to_string(),
            ..JobReport::default()
        };
        let mut decoder = SseLineDecoder::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in decoder.push(&bytes) {
                        self.handle_line(&line, &mut report);
                    }
                }
                Err(err) => {
                    if let Some(line) = decoder.finish() {
                        self.handle_line(&line, &mut report);
                    }
                    logging::warn(format!(
                        "Pipeline job {} stream broke after {} events: {err}",
                        report.job_id, report.events
                    ));
                    return Err(ConsoleError::Read {
                        source: err,
                        report: Box::new(report),
                    });
                }
            }
        }
        if let Some(line) = decoder.finish() {
            self.handle_line(&line, &mut report);
        }

        logging::info(format!(
            "Pipeline job {} finished: {} events, {} dropped lines",
            report.job_id, report.events, report.dropped_lines
        ));
        Ok(report)
    }

    fn handle_line(&self, line: &str, report: &mut JobReport) {
        match parse_event_line(line) {
            ParsedLine::NotData => {}
            ParsedLine::Malformed(err) => {
                logging::warn(format!("Dropping malformed pipeline event line: {err}"));
                report.dropped_lines += 1;
                self.state.record_dropped_line();
            }
            ParsedLine::Event(event) => {
                let lines = render_event(&event);
                report.events += 1;
                report.lines += lines.len();
                match event.kind {
                    PipelineEventKind::Result => report.summary = event.summary.clone(),
                    PipelineEventKind::Error => report.errors.push(event.message.clone()),
                    PipelineEventKind::Complete => report.completed = true,
                    _ => {}
                }
                self.state.append_console(lines);
            }
        }
    }
}
