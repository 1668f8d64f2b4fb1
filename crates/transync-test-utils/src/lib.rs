//! Testing utilities for the transync workspace
//!
//! Scripted fakes for the origin and spreadsheet ports, plus directory
//! grid fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use transync_content::{Grid, HttpClient, HttpResponse, OriginError, SheetsBackend};

/// Document id long enough to match the host patterns
pub const DOC_ID: &str = "1DocAbCdEfGhIjKlMnOp";
pub const SHEET_ID: &str = "1SheetAbCdEfGhIjKlMn";
pub const FILE_ID: &str = "1FileAbCdEfGhIjKlMnO";

pub fn doc_url(id: &str) -> String {
    format!("https://docs.google.com/document/d/{id}/edit")
}

pub fn sheet_url(id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{id}/edit")
}

pub fn drive_url(id: &str) -> String {
    format!("https://drive.google.com/file/d/{id}/view?usp=sharing")
}

pub fn doc_export_url(id: &str) -> String {
    format!("https://docs.google.com/document/d/{id}/export?format=txt")
}

pub fn doc_preview_url(id: &str) -> String {
    format!("https://docs.google.com/document/d/{id}/preview")
}

pub fn doc_edit_url(id: &str) -> String {
    format!("https://docs.google.com/document/d/{id}/edit")
}

pub fn drive_view_url(id: &str) -> String {
    format!("https://drive.google.com/file/d/{id}/view")
}

pub fn drive_download_url(id: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={id}")
}

/// Fake origin answering from per-URL response queues
///
/// Responses are consumed in order; the last one repeats. Unknown URLs
/// answer 404. Every request is logged. An optional latency is applied to
/// every response.
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<String, VecDeque<Result<HttpResponse, OriginError>>>>,
    calls: Mutex<Vec<String>>,
    latency: Mutex<Duration>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: impl Into<String>, response: HttpResponse) -> &Self {
        self.routes.lock().entry(url.into()).or_default().push_back(Ok(response));
        self
    }

    pub fn respond_text(&self, url: impl Into<String>, body: &str) -> &Self {
        self.respond(url, HttpResponse::ok(body.as_bytes().to_vec()))
    }

    pub fn fail(&self, url: impl Into<String>, err: OriginError) -> &Self {
        self.routes.lock().entry(url.into()).or_default().push_back(Err(err));
        self
    }

    pub fn with_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock() = latency;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| *u == url).count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, OriginError> {
        self.calls.lock().push(url.to_string());
        let response = {
            let mut routes = self.routes.lock();
            match routes.get_mut(url) {
                None => Ok(HttpResponse::status(404)),
                Some(queue) if queue.len() > 1 => {
                    queue.pop_front().unwrap_or_else(|| Ok(HttpResponse::status(404)))
                }
                Some(queue) => queue.front().cloned().unwrap_or_else(|| Ok(HttpResponse::status(404))),
            }
        };
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response
    }
}

/// In-memory spreadsheet host
///
/// `values` answers a whole-tab range (`'Title'`) with that tab, and any
/// other range with the tab named before `!` or else the first tab.
#[derive(Debug, Default)]
pub struct FakeSheets {
    books: Mutex<HashMap<String, Vec<(String, Grid)>>>,
    failure: Mutex<Option<OriginError>>,
    value_calls: Mutex<usize>,
}

impl FakeSheets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_tab(&self, spreadsheet_id: &str, title: &str, grid: Grid) {
        let mut books = self.books.lock();
        let tabs = books.entry(spreadsheet_id.to_string()).or_default();
        match tabs.iter_mut().find(|(t, _)| t == title) {
            Some((_, existing)) => *existing = grid,
            None => tabs.push((title.to_string(), grid)),
        }
    }

    pub fn fail_with(&self, err: Option<OriginError>) {
        *self.failure.lock() = err;
    }

    pub fn value_calls(&self) -> usize {
        *self.value_calls.lock()
    }

    fn check_failure(&self) -> Result<(), OriginError> {
        match self.failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SheetsBackend for FakeSheets {
    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, OriginError> {
        self.check_failure()?;
        Ok(self
            .books
            .lock()
            .get(spreadsheet_id)
            .map(|tabs| tabs.iter().map(|(t, _)| t.clone()).collect())
            .unwrap_or_default())
    }

    async fn values(&self, spreadsheet_id: &str, range: &str) -> Result<Grid, OriginError> {
        *self.value_calls.lock() += 1;
        self.check_failure()?;
        let books = self.books.lock();
        let Some(tabs) = books.get(spreadsheet_id) else {
            return Err(OriginError::Status {
                status: 404,
                url: spreadsheet_id.to_string(),
            });
        };

        let wanted = range
            .split_once('!')
            .map_or(range, |(tab, _)| tab)
            .trim_matches('\'')
            .replace("''", "'");
        let tab = tabs
            .iter()
            .find(|(t, _)| *t == wanted)
            .or_else(|| tabs.first())
            .map(|(_, grid)| grid.clone())
            .unwrap_or_default();
        Ok(tab)
    }
}

/// One directory row, columns A–O
#[derive(Debug, Clone, Default)]
pub struct RowFixture {
    pub number: String,
    pub title: String,
    pub episode: String,
    pub phase: String,
    pub source_lang: String,
    pub target_lang: String,
    pub baseline_ref: String,
    pub settings_ref: String,
    pub context_ref: String,
    pub source_ref: String,
    pub guide_ref: String,
    pub basecamp_ref: String,
    pub status: String,
    pub deadline: String,
    pub priority: String,
}

impl RowFixture {
    pub fn new(number: u64, title: &str) -> Self {
        Self {
            number: number.to_string(),
            title: title.to_string(),
            episode: "1".to_string(),
            phase: "1".to_string(),
            source_lang: "ko".to_string(),
            target_lang: "en".to_string(),
            status: "대기".to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn source(mut self, url: impl Into<String>) -> Self {
        self.source_ref = url.into();
        self
    }

    #[must_use]
    pub fn baseline(mut self, url: impl Into<String>) -> Self {
        self.baseline_ref = url.into();
        self
    }

    #[must_use]
    pub fn settings(mut self, url: impl Into<String>) -> Self {
        self.settings_ref = url.into();
        self
    }

    #[must_use]
    pub fn context(mut self, url: impl Into<String>) -> Self {
        self.context_ref = url.into();
        self
    }

    #[must_use]
    pub fn phase(mut self, phase: &str) -> Self {
        self.phase = phase.to_string();
        self
    }

    #[must_use]
    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn cells(&self) -> Vec<String> {
        vec![
            self.number.clone(),
            self.title.clone(),
            self.episode.clone(),
            self.phase.clone(),
            self.source_lang.clone(),
            self.target_lang.clone(),
            self.baseline_ref.clone(),
            self.settings_ref.clone(),
            self.context_ref.clone(),
            self.source_ref.clone(),
            self.guide_ref.clone(),
            self.basecamp_ref.clone(),
            self.status.clone(),
            self.deadline.clone(),
            self.priority.clone(),
        ]
    }
}

pub fn header_row() -> Vec<String> {
    [
        "번호", "제목", "회차", "단계", "원문 언어", "번역 언어", "번역본", "설정", "맥락", "원문",
        "가이드", "베이스캠프", "상태", "마감", "우선순위",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Notes row, header row, then the given data rows
pub fn directory_grid(rows: &[RowFixture]) -> Grid {
    let mut grid = vec![vec!["operator notes".to_string()], header_row()];
    grid.extend(rows.iter().map(RowFixture::cells));
    grid
}

pub fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect()
}
