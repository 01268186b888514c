//! Normalization of stored page timings.
//!
//! Older episodes persisted their timings as a JSON string holding the
//! array, sometimes without `startTime` or `text`. The pipeline itself only
//! reads and writes structured records; this module converts stored values
//! into that shape.

use serde_json::Value;

use crate::models::config::{INTER_CLIP_SILENCE_MS, INTRO_SILENCE_MS};
use crate::models::error::PipelineError;
use crate::models::timing::TimingRecord;

/// Assumed page length when a record has no `endTime`.
pub const FALLBACK_PAGE_MS: u64 = 3000;

/// Separator line between pages in stored episode text.
pub const PAGE_SEPARATOR: &str = "---";

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Texts used to fill records whose `text` is missing, by position.
    pub page_texts: Option<Vec<String>>,
    /// Fill remaining missing texts with `"[페이지 N]"` instead of leaving them null.
    pub placeholder_text: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// The value was already a structured array with every field present.
    pub already_current: bool,
    pub parsed_from_string: bool,
    pub backfilled_start_times: usize,
    pub backfilled_end_times: usize,
    pub filled_texts: usize,
}

/// Normalize a stored timing value into structured records.
pub fn migrate_timings(
    value: &Value,
    options: &MigrationOptions,
) -> Result<(Vec<TimingRecord>, MigrationReport), PipelineError> {
    let mut report = MigrationReport::default();

    let parsed;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw)
                .map_err(|e| PipelineError::Migration(format!("timing string is not JSON: {}", e)))?;
            report.parsed_from_string = true;
            match &parsed {
                Value::Array(entries) => entries,
                other => return Err(PipelineError::Migration(format!("expected an array, found {}", kind(other)))),
            }
        }
        other => return Err(PipelineError::Migration(format!("expected an array, found {}", kind(other)))),
    };

    let mut records: Vec<TimingRecord> = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let object = entry
            .as_object()
            .ok_or_else(|| PipelineError::Migration(format!("record {} is {}, not an object", position, kind(entry))))?;

        let page_index = read_ms(object.get("pageIndex"), position, "pageIndex")?
            .map(|v| v as usize)
            .unwrap_or(position);

        let start_time_ms = match read_ms(object.get("startTime"), position, "startTime")? {
            Some(start) => start,
            None => {
                report.backfilled_start_times += 1;
                records
                    .last()
                    .map(|prev| prev.end_time_ms + INTER_CLIP_SILENCE_MS)
                    .unwrap_or(INTRO_SILENCE_MS)
            }
        };

        let end_time_ms = match read_ms(object.get("endTime"), position, "endTime")? {
            Some(end) => end,
            None => {
                report.backfilled_end_times += 1;
                start_time_ms + FALLBACK_PAGE_MS
            }
        };
        if start_time_ms >= end_time_ms {
            return Err(PipelineError::Migration(format!(
                "record {} starts at {}ms but ends at {}ms",
                position, start_time_ms, end_time_ms
            )));
        }

        let text = match object.get("text") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => {
                let filled = fill_text(options, position);
                if filled.is_some() {
                    report.filled_texts += 1;
                }
                filled
            }
            Some(other) => {
                return Err(PipelineError::Migration(format!(
                    "record {} has {} text",
                    position,
                    kind(other)
                )))
            }
        };

        records.push(TimingRecord {
            page_index,
            start_time_ms,
            end_time_ms,
            text,
        });
    }

    report.already_current = !report.parsed_from_string
        && report.backfilled_start_times == 0
        && report.backfilled_end_times == 0
        && report.filled_texts == 0;

    log::debug!(
        "Migrated {} timing records (from string: {}, start backfills: {}, end backfills: {})",
        records.len(),
        report.parsed_from_string,
        report.backfilled_start_times,
        report.backfilled_end_times
    );
    Ok((records, report))
}

/// Split stored episode text into pages on `---` separator lines.
///
/// Pages are trimmed; empty pages are dropped.
pub fn split_page_texts(content: &str) -> Vec<String> {
    let mut pages = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if line.trim() == PAGE_SEPARATOR {
            push_page(&mut pages, &current);
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_page(&mut pages, &current);
    pages
}

fn push_page(pages: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        pages.push(trimmed.to_string());
    }
}

fn fill_text(options: &MigrationOptions, position: usize) -> Option<String> {
    if let Some(text) = options.page_texts.as_ref().and_then(|texts| texts.get(position)) {
        return Some(text.clone());
    }
    options.placeholder_text.then(|| format!("[페이지 {}]", position + 1))
}

/// Millisecond fields may be stored as integers or floats.
fn read_ms(value: Option<&Value>, position: usize, field: &str) -> Result<Option<u64>, PipelineError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .map(Some)
            .ok_or_else(|| PipelineError::Migration(format!("record {} has negative {}", position, field))),
        Some(other) => Err(PipelineError::Migration(format!(
            "record {} has {} {}",
            position,
            kind(other),
            field
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
