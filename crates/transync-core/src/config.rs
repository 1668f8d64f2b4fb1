//! Sync configuration
//!
//! Every section deserializes from a partial document; missing fields take
//! their defaults.

use crate::error::{SyncError, SyncResult};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use transync_content::{CacheConfig, ResolverConfig};

/// Where the task directory lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Spreadsheet holding the directory
    pub spreadsheet_id: String,
    /// Tab name
    pub sheet_name: String,
    /// A1 range inside the tab
    pub range: String,
    /// Sheets API key
    pub api_key: Option<String>,
}

impl DirectoryConfig {
    /// Directory on a spreadsheet with default tab and range
    #[must_use]
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            ..Self::default()
        }
    }

    /// With tab name
    #[inline]
    #[must_use]
    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Tab-qualified A1 range
    #[must_use]
    pub fn qualified_range(&self) -> String {
        format!("'{}'!{}", self.sheet_name.replace('\'', "''"), self.range)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Tasks".to_string(),
            range: "A1:O".to_string(),
            api_key: None,
        }
    }
}

/// Scheduled refresh times, local wall clock, `HH:MM`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Daily slots
    pub slots: Vec<String>,
}

impl ScheduleConfig {
    /// Parsed and sorted slots
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] for an unparseable slot or an empty
    /// list.
    pub fn parsed_slots(&self) -> SyncResult<Vec<NaiveTime>> {
        let mut slots = self
            .slots
            .iter()
            .map(|s| {
                NaiveTime::parse_from_str(s.trim(), "%H:%M")
                    .map_err(|e| SyncError::Config(format!("schedule slot {s:?}: {e}")))
            })
            .collect::<SyncResult<Vec<_>>>()?;
        if slots.is_empty() {
            return Err(SyncError::Config("schedule has no slots".to_string()));
        }
        slots.sort();
        slots.dedup();
        Ok(slots)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            slots: vec!["10:00".to_string(), "19:00".to_string()],
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory location
    pub directory: DirectoryConfig,
    /// Response cache tuning
    pub cache: CacheConfig,
    /// Resolver tuning
    pub resolver: ResolverConfig,
    /// Scheduled refresh slots
    pub schedule: ScheduleConfig,
    /// File for local state; in-memory when unset
    pub state_path: Option<PathBuf>,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With directory location
    #[inline]
    #[must_use]
    pub fn with_directory(mut self, directory: DirectoryConfig) -> Self {
        self.directory = directory;
        self
    }

    /// With state file
    #[inline]
    #[must_use]
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Check that the configuration can drive a sync
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] naming the first problem.
    pub fn validate(&self) -> SyncResult<()> {
        if self.directory.spreadsheet_id.trim().is_empty() {
            return Err(SyncError::Config("directory.spreadsheet_id is empty".to_string()));
        }
        if self.resolver.max_concurrent == 0 {
            return Err(SyncError::Config("resolver.max_concurrent must be positive".to_string()));
        }
        self.schedule.parsed_slots().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_slots_parse_sorted() {
        let cfg = ScheduleConfig {
            slots: vec!["19:00".into(), "10:00".into()],
        };
        let slots = cfg.parsed_slots().unwrap();
        assert_eq!(slots[0], NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(slots[1], NaiveTime::from_hms_opt(19, 0, 0).unwrap());
    }

    #[test]
    fn bad_slot_is_config_error() {
        let cfg = ScheduleConfig {
            slots: vec!["25:99".into()],
        };
        assert!(matches!(cfg.parsed_slots(), Err(SyncError::Config(_))));
    }

    #[test]
    fn qualified_range_quotes_tab() {
        let dir = DirectoryConfig::new("abc").with_sheet_name("작업 목록");
        assert_eq!(dir.qualified_range(), "'작업 목록'!A1:O");
    }

    #[test]
    fn validate_requires_spreadsheet() {
        assert!(SyncConfig::default().validate().is_err());
        let cfg = SyncConfig::new().with_directory(DirectoryConfig::new("abc"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let cfg: SyncConfig =
            serde_json::from_str(r#"{"directory":{"spreadsheet_id":"abc"},"cache":{"ttl_secs":60}}"#)
                .unwrap();
        assert_eq!(cfg.directory.sheet_name, "Tasks");
        assert_eq!(cfg.cache.ttl_secs, 60);
        assert_eq!(cfg.cache.min_call_interval_ms, 1000);
        assert_eq!(cfg.schedule.slots.len(), 2);
    }
}
