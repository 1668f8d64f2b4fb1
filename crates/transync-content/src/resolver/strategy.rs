//! Extraction strategies
//!
//! A strategy is one concrete attempt at turning a reference into text.
//! It answers `Some(text)` or `None`; judging plausibility is left to the
//! resolver so every strategy is held to the same bar.

use super::classify::{Endpoint, RefClass};
use super::transport::FetchChannel;
use crate::html::{html_to_text, looks_like_html_shell};
use crate::markdown::{render_markdown, SheetTab};
use crate::sheets::{whole_tab_range, SheetsBackend};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Everything a strategy needs for one resolution
#[derive(Debug)]
pub struct ResolveContext<'a> {
    /// Reference URL as given
    pub reference: &'a str,
    /// Class the reference was routed to
    pub class: &'a RefClass,
    /// Outbound channel
    pub channel: &'a FetchChannel,
    /// Spreadsheet backend, when configured
    pub sheets: Option<&'a Arc<dyn SheetsBackend>>,
    attempts: &'a AtomicUsize,
}

impl<'a> ResolveContext<'a> {
    /// Create context
    #[must_use]
    pub fn new(
        reference: &'a str,
        class: &'a RefClass,
        channel: &'a FetchChannel,
        sheets: Option<&'a Arc<dyn SheetsBackend>>,
        attempts: &'a AtomicUsize,
    ) -> Self {
        Self {
            reference,
            class,
            channel,
            sheets,
            attempts,
        }
    }

    /// Fetch through the channel, counting attempts
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        self.channel.fetch_text(url, self.attempts).await
    }

    /// Count an origin call made outside the channel
    pub fn count_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    /// Origin calls made so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// One extraction attempt
#[async_trait]
pub trait Strategy: Debug + Send + Sync {
    /// Label for logs
    fn name(&self) -> &'static str;

    /// Try to extract text
    async fn attempt(&self, ctx: &ResolveContext<'_>) -> Option<String>;
}

/// How a fetched body is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// Body is text already; an HTML answer means the endpoint failed
    PlainText,
    /// Body is markup to strip
    Html,
}

/// Fetch one endpoint shape and parse the body
#[derive(Debug, Clone, Copy)]
pub struct EndpointStrategy {
    endpoint: Endpoint,
    format: BodyFormat,
}

impl EndpointStrategy {
    /// Create strategy
    #[inline]
    #[must_use]
    pub const fn new(endpoint: Endpoint, format: BodyFormat) -> Self {
        Self { endpoint, format }
    }
}

#[async_trait]
impl Strategy for EndpointStrategy {
    fn name(&self) -> &'static str {
        self.endpoint.label()
    }

    async fn attempt(&self, ctx: &ResolveContext<'_>) -> Option<String> {
        let url = self.endpoint.url(ctx.reference, ctx.class)?;
        let body = ctx.fetch_text(&url).await?;
        match self.format {
            BodyFormat::PlainText if looks_like_html_shell(&body) => {
                tracing::debug!(strategy = self.name(), "plain-text endpoint answered with html");
                None
            }
            BodyFormat::PlainText => Some(body.replace("\r\n", "\n")),
            BodyFormat::Html => Some(html_to_text(&body)),
        }
    }
}

/// Enumerate every tab through the spreadsheet backend and render them
/// as one Markdown document
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetTabsStrategy;

#[async_trait]
impl Strategy for SpreadsheetTabsStrategy {
    fn name(&self) -> &'static str {
        "sheet-tabs"
    }

    async fn attempt(&self, ctx: &ResolveContext<'_>) -> Option<String> {
        let RefClass::Spreadsheet { sheet_id } = ctx.class else {
            return None;
        };
        let sheets = ctx.sheets?;
        let timeout = ctx.channel.attempt_timeout();

        ctx.count_attempt();
        let titles = match tokio::time::timeout(timeout, sheets.sheet_titles(sheet_id)).await {
            Ok(Ok(titles)) if !titles.is_empty() => titles,
            Ok(Ok(_)) => return None,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "sheet metadata call failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(?timeout, "sheet metadata call timed out");
                return None;
            }
        };

        let mut tabs = Vec::with_capacity(titles.len());
        for title in titles {
            ctx.count_attempt();
            let range = whole_tab_range(&title);
            match tokio::time::timeout(timeout, sheets.values(sheet_id, &range)).await {
                Ok(Ok(rows)) => tabs.push(SheetTab::new(title, rows)),
                Ok(Err(err)) => tracing::debug!(tab = %title, error = %err, "tab read failed, skipping"),
                Err(_) => tracing::warn!(tab = %title, "tab read timed out, skipping"),
            }
        }

        if tabs.is_empty() {
            None
        } else {
            Some(render_markdown(&tabs))
        }
    }
}

/// Ordered strategy chain for a class
///
/// Order is a reliability ranking; the raw reference is always last.
#[must_use]
pub fn chain_for(class: &RefClass) -> Vec<Arc<dyn Strategy>> {
    use BodyFormat::{Html, PlainText};

    let endpoint = |e, f| Arc::new(EndpointStrategy::new(e, f)) as Arc<dyn Strategy>;
    match class {
        RefClass::DocumentText { .. } => vec![
            endpoint(Endpoint::DocExportText, PlainText),
            endpoint(Endpoint::DocPreview, Html),
            endpoint(Endpoint::DocEdit, Html),
            endpoint(Endpoint::RawUrl, Html),
        ],
        RefClass::Spreadsheet { .. } => vec![
            Arc::new(SpreadsheetTabsStrategy) as Arc<dyn Strategy>,
            endpoint(Endpoint::SheetHtmlView, Html),
            endpoint(Endpoint::RawUrl, Html),
        ],
        RefClass::DriveText { .. } | RefClass::DriveFile { .. } => vec![
            endpoint(Endpoint::DriveDownload, PlainText),
            endpoint(Endpoint::RawUrl, Html),
        ],
        RefClass::GenericWeb => vec![endpoint(Endpoint::RawUrl, Html)],
    }
}
