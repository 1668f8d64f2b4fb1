//! Task directory fetcher
//!
//! Reads the directory grid through the spreadsheet backend and maps rows
//! into [`TaskRecord`]s.
//!
//! # Sheet layout
//!
//! ```text
//! row 1   operator notes
//! row 2   column headers
//! row 3+  one task per row
//! ```

use crate::config::DirectoryConfig;
use crate::error::{SyncError, SyncResult};
use crate::types::{ContentRefs, LanguagePair, TaskId, TaskRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use transync_content::{ContentError, Grid, ResponseCache, SheetsBackend};

/// Zero-based column positions of the directory grid
pub mod columns {
    /// A: optional task number
    pub const NUMBER: usize = 0;
    /// B: title
    pub const TITLE: usize = 1;
    /// C: episode
    pub const EPISODE: usize = 2;
    /// D: phase
    pub const PHASE: usize = 3;
    /// E: source language
    pub const SOURCE_LANG: usize = 4;
    /// F: target language
    pub const TARGET_LANG: usize = 5;
    /// G: baseline translation reference
    pub const BASELINE_REF: usize = 6;
    /// H: settings reference
    pub const SETTINGS_REF: usize = 7;
    /// I: context reference
    pub const CONTEXT_REF: usize = 8;
    /// J: source reference
    pub const SOURCE_REF: usize = 9;
    /// K: guide prompt reference
    pub const GUIDE_REF: usize = 10;
    /// L: basecamp prompt reference
    pub const BASECAMP_REF: usize = 11;
    /// M: backend status
    pub const STATUS: usize = 12;
    /// N: deadline
    pub const DEADLINE: usize = 13;
    /// O: priority
    pub const PRIORITY: usize = 14;

    /// Header must reach at least column L
    pub const REQUIRED_WIDTH: usize = BASECAMP_REF + 1;
}

/// Grid rows before the first task row
pub const HEADER_ROWS: usize = 2;

/// Fetches and parses the task directory
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    sheets: Arc<dyn SheetsBackend>,
    cache: ResponseCache<Grid>,
    config: DirectoryConfig,
}

impl DirectoryFetcher {
    /// Create fetcher
    #[must_use]
    pub fn new(sheets: Arc<dyn SheetsBackend>, cache: ResponseCache<Grid>, config: DirectoryConfig) -> Self {
        Self { sheets, cache, config }
    }

    /// Directory location
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    fn cache_key(&self) -> String {
        format!("directory:{}:{}", self.config.spreadsheet_id, self.config.qualified_range())
    }

    /// Fetch through the cache
    ///
    /// # Errors
    /// Returns [`SyncError::Content`] for origin failures and
    /// [`SyncError::MalformedDirectory`] for a grid of the wrong shape.
    pub async fn fetch(&self, force: bool) -> SyncResult<Vec<TaskRecord>> {
        let range = self.config.qualified_range();
        let grid = self
            .cache
            .fetch(&self.cache_key(), force, || async {
                self.sheets
                    .values(&self.config.spreadsheet_id, &range)
                    .await
                    .map_err(ContentError::from)
            })
            .await?;
        parse_rows(&grid)
    }

    /// Fetch bypassing cache freshness
    ///
    /// Origin pacing still applies: inside the minimum interval the
    /// stored grid is served, or [`ContentError::OriginThrottled`] comes
    /// back when there is none.
    ///
    /// # Errors
    /// Same as [`DirectoryFetcher::fetch`].
    pub async fn fetch_uncached(&self) -> SyncResult<Vec<TaskRecord>> {
        self.fetch(true).await
    }
}

fn cell(row: &[String], col: usize) -> &str {
    row.get(col).map_or("", |c| c.trim())
}

/// First digit of the phase cell, clamped into 1–4
#[must_use]
pub fn parse_phase(text: &str) -> u8 {
    text.chars()
        .find_map(|c| c.to_digit(10))
        .map_or(1, |d| u8::try_from(d.clamp(1, 4)).unwrap_or(1))
}

fn is_blank_row(row: &[String]) -> bool {
    let refs_blank = (columns::BASELINE_REF..=columns::BASECAMP_REF).all(|c| cell(row, c).is_empty());
    cell(row, columns::TITLE).is_empty() && refs_blank
}

/// Map a directory grid into task records
///
/// # Errors
/// Returns [`SyncError::MalformedDirectory`] when the notes or header row
/// is missing, or the header is narrower than columns A–L.
pub fn parse_rows(grid: &Grid) -> SyncResult<Vec<TaskRecord>> {
    if grid.len() < HEADER_ROWS {
        return Err(SyncError::malformed(format!(
            "expected notes and header rows, found {} row(s)",
            grid.len()
        )));
    }
    let header_width = grid[HEADER_ROWS - 1].len();
    if header_width < columns::REQUIRED_WIDTH {
        return Err(SyncError::malformed(format!(
            "header spans {header_width} column(s), expected at least {}",
            columns::REQUIRED_WIDTH
        )));
    }

    let data: Vec<(usize, &Vec<String>)> = grid
        .iter()
        .enumerate()
        .skip(HEADER_ROWS)
        .filter(|(_, row)| !is_blank_row(row))
        .map(|(idx, row)| (idx + 1, row))
        .collect();

    let mut number_counts: HashMap<u64, usize> = HashMap::new();
    for (_, row) in &data {
        if let Ok(n) = cell(row, columns::NUMBER).parse::<u64>() {
            *number_counts.entry(n).or_default() += 1;
        }
    }

    let explicit_id = |row: &[String]| {
        cell(row, columns::NUMBER)
            .parse::<u64>()
            .ok()
            .filter(|n| number_counts.get(n) == Some(&1))
    };
    let mut used: HashSet<u64> = data.iter().filter_map(|(_, row)| explicit_id(row.as_slice())).collect();

    let mut records = Vec::with_capacity(data.len());
    for (row_number, row) in data {
        let id = match explicit_id(row) {
            Some(id) => id,
            None => {
                let mut id = row_number as u64;
                while !used.insert(id) {
                    tracing::warn!(row = row_number, id, "row-derived task id taken, shifting");
                    id += 1;
                }
                id
            }
        };
        records.push(record_from_row(TaskId(id), row_number, row));
    }

    Ok(records)
}

fn record_from_row(id: TaskId, row_number: usize, row: &[String]) -> TaskRecord {
    let owned = |col| cell(row, col).to_string();
    TaskRecord {
        id,
        row: row_number,
        title: owned(columns::TITLE),
        episode: owned(columns::EPISODE),
        step_order: parse_phase(cell(row, columns::PHASE)),
        language_pair: LanguagePair::new(owned(columns::SOURCE_LANG), owned(columns::TARGET_LANG)),
        deadline: owned(columns::DEADLINE),
        priority: owned(columns::PRIORITY),
        refs: ContentRefs {
            source: owned(columns::SOURCE_REF),
            baseline_translation: owned(columns::BASELINE_REF),
            settings: owned(columns::SETTINGS_REF),
            context: owned(columns::CONTEXT_REF),
            guide_prompt: owned(columns::GUIDE_REF),
            basecamp_prompt: owned(columns::BASECAMP_REF),
        },
        status: owned(columns::STATUS),
    }
}

/// True if two directory snapshots differ in shape, ids, scalar fields,
/// any core content reference or an advisory field
///
/// Stops at the first difference.
#[must_use]
pub fn directory_differs(known: &[TaskRecord], fresh: &[TaskRecord]) -> bool {
    if known.len() != fresh.len() {
        return true;
    }
    known.iter().zip(fresh).any(|(a, b)| {
        a.id != b.id
            || a.refs.first_core_difference(&b.refs).is_some()
            || a.first_scalar_difference(b).is_some()
            || a.first_advisory_difference(b).is_some()
    })
}
