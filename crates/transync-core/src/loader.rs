//! Task content loader and translation port
//!
//! Content is resolved lazily, when a consumer first needs a task's
//! documents. A reference that cannot be resolved degrades to empty text
//! for that field only.

use crate::error::TranslateError;
use crate::hashes::ContentHashStore;
use crate::types::{RefKind, TaskRecord};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use transync_content::ContentResolver;

/// Resolved documents of one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskContent {
    /// Text per reference kind; unresolved kinds are absent
    pub texts: BTreeMap<RefKind, String>,
    /// Kinds whose reference could not be resolved
    pub unresolved: Vec<RefKind>,
}

impl TaskContent {
    /// Text for `kind`, empty when missing
    #[must_use]
    pub fn text(&self, kind: RefKind) -> &str {
        self.texts.get(&kind).map_or("", String::as_str)
    }
}

/// Input of the translation function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Text to translate
    pub source_text: String,
    /// Target language
    pub target_language: String,
    /// Settings document
    pub settings_text: String,
    /// Guide prompt
    pub guide_text: String,
    /// Story context
    pub context_text: String,
    /// Requesting user
    pub user_identity: String,
}

/// Opaque translation function
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Produce a first-pass translation
    ///
    /// # Errors
    /// Returns a classified [`TranslateError`].
    async fn translate(&self, request: TranslationRequest) -> Result<String, TranslateError>;
}

/// Resolves every reference of a task
#[derive(Debug, Clone)]
pub struct TaskContentLoader {
    resolver: ContentResolver,
    hashes: ContentHashStore,
}

impl TaskContentLoader {
    /// Create loader
    #[must_use]
    pub fn new(resolver: ContentResolver, hashes: ContentHashStore) -> Self {
        Self { resolver, hashes }
    }

    /// Resolve every non-empty reference of `task` and record its hash
    pub async fn load(&self, task: &TaskRecord) -> TaskContent {
        let max = self.resolver.config().max_concurrent.max(1);
        let results: Vec<_> = stream::iter(task.refs.present())
            .map(|(kind, url)| async move { (kind, url, self.resolver.resolve_cached(url, false).await) })
            .buffer_unordered(max)
            .collect()
            .await;

        let mut content = TaskContent::default();
        for (kind, url, result) in results {
            match result {
                Ok(text) => {
                    self.hashes.record(task.id, kind, url, &text);
                    content.texts.insert(kind, text);
                }
                Err(err) => {
                    tracing::warn!(task = %task.id, %kind, url, error = %err, "reference unresolved, using empty text");
                    content.unresolved.push(kind);
                }
            }
        }
        content.unresolved.sort();
        content
    }

    /// Build a translation request for `task` and run it
    ///
    /// # Errors
    /// Returns [`TranslateError::Other`] when the source text is
    /// unavailable, otherwise whatever the translator reports.
    pub async fn first_pass(
        &self,
        task: &TaskRecord,
        translator: &dyn Translator,
        user: &str,
    ) -> Result<String, TranslateError> {
        let content = self.load(task).await;
        let source_text = content.text(RefKind::Source);
        if source_text.trim().is_empty() {
            return Err(TranslateError::Other(format!("source text of task {} is unavailable", task.id)));
        }

        let request = TranslationRequest {
            source_text: source_text.to_string(),
            target_language: task.language_pair.target.clone(),
            settings_text: content.text(RefKind::Settings).to_string(),
            guide_text: content.text(RefKind::GuidePrompt).to_string(),
            context_text: content.text(RefKind::Context).to_string(),
            user_identity: user.to_string(),
        };
        tracing::info!(task = %task.id, chars = request.source_text.chars().count(), "requesting first-pass translation");
        translator.translate(request).await
    }
}
