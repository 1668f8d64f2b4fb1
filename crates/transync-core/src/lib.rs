//! transync core - task directory synchronisation
//!
//! The engine that:
//! - Pulls the task directory from the spreadsheet backend
//! - Detects structural and content-level changes per task
//! - Merges fresh data without overwriting local work
//! - Derives each task's effective status from local signals
//! - Runs refreshes on demand and on a twice-daily schedule
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use transync_core::prelude::*;
//!
//! # async fn example(sync: Arc<TaskSync>) -> Result<(), Box<dyn std::error::Error>> {
//! let list = sync.refresh(false).await?;
//! for task in &list.tasks {
//!     println!("{} {} [{}]", task.record.id, task.record.title, task.status);
//! }
//! println!("updated {}", list.summary.updated);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod config;
pub mod detector;
pub mod directory;
pub mod error;
pub mod hashes;
pub mod loader;
pub mod merge;
pub mod schedule;
pub mod state;
pub mod status;
pub mod sync;
pub mod types;

// Re-exports for convenience
pub use config::{DirectoryConfig, ScheduleConfig, SyncConfig};
pub use detector::ChangeDetector;
pub use directory::{parse_rows, DirectoryFetcher};
pub use error::{StateError, SyncError, SyncResult, TranslateError};
pub use hashes::{ContentHashStore, ResolvedContent};
pub use loader::{TaskContent, TaskContentLoader, TranslationRequest, Translator};
pub use merge::{MergeDecision, MergeEngine, MergeOutcome, MergeSummary};
pub use schedule::{next_slot, RefreshScheduler};
pub use state::{
    DraftPrompt, FileStateStore, LocalSignals, MemoryStateStore, StateStore, SubmissionRecord,
};
pub use status::{derive_status, protection_state};
pub use sync::{AnnotatedTask, SyncServices, TaskList, TaskSync};
pub use types::{
    ContentRefs, EffectiveStatus, LanguagePair, ProtectionState, RefKind, TaskId, TaskRecord,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a sync
    pub use crate::{
        AnnotatedTask, EffectiveStatus, MergeSummary, ProtectionState, SyncConfig, SyncError,
        TaskId, TaskList, TaskRecord, TaskSync,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
