//! Config file loading
//!
//! A missing file means defaults. `TRANSYNC_SHEETS_API_KEY` overrides the
//! key from the file. Without a `state_path` the local state lives in
//! [`DEFAULT_STATE`] next to the config file, so the merged task list and
//! local signals carry over between runs.

use anyhow::{Context, Result};
use std::path::Path;
use transync_core::SyncConfig;

/// Environment variable holding the Sheets API key
pub(crate) const API_KEY_ENV: &str = "TRANSYNC_SHEETS_API_KEY";

/// Default config file name
pub(crate) const DEFAULT_CONFIG: &str = "transync.toml";

/// State file used when the config names none
pub(crate) const DEFAULT_STATE: &str = "transync-state.json";

/// Load configuration from `path`
pub(crate) fn load(path: &Path) -> Result<SyncConfig> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str::<SyncConfig>(&text)
            .with_context(|| format!("parsing {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            SyncConfig::default()
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    apply_api_key(&mut config, std::env::var(API_KEY_ENV).ok());
    apply_default_state(&mut config, path);
    Ok(config)
}

fn apply_default_state(config: &mut SyncConfig, config_path: &Path) {
    if config.state_path.is_none() {
        let dir = config_path.parent().unwrap_or_else(|| Path::new(""));
        config.state_path = Some(dir.join(DEFAULT_STATE));
    }
}

fn apply_api_key(config: &mut SyncConfig, from_env: Option<String>) {
    if let Some(key) = from_env.filter(|k| !k.trim().is_empty()) {
        config.directory.api_key = Some(key.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.directory.sheet_name, "Tasks");
        assert_eq!(config.state_path, Some(dir.path().join(DEFAULT_STATE)));
    }

    #[test]
    fn reads_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        std::fs::write(
            &path,
            r#"
state_path = "state.json"

[directory]
spreadsheet_id = "1AbC"
sheet_name = "작업"

[cache]
ttl_secs = 120

[schedule]
slots = ["09:30", "18:00"]

[[resolver.relays]]
name = "mirror"
url_prefix = "https://relay.test/?u="
envelope = { kind = "raw" }
"#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.directory.spreadsheet_id, "1AbC");
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.cache.min_call_interval_ms, 1000);
        assert_eq!(config.schedule.slots, vec!["09:30", "18:00"]);
        assert_eq!(config.resolver.relays.len(), 1);
        assert!(config.resolver.privileged);
        assert_eq!(config.state_path, Some(std::path::PathBuf::from("state.json")));
    }

    #[test]
    fn broken_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        std::fs::write(&path, "[directory\nspreadsheet_id = ").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn env_key_overrides_file() {
        let mut config = SyncConfig::default();
        config.directory.api_key = Some("from-file".into());
        apply_api_key(&mut config, Some(" from-env ".into()));
        assert_eq!(config.directory.api_key.as_deref(), Some("from-env"));
        apply_api_key(&mut config, Some("   ".into()));
        assert_eq!(config.directory.api_key.as_deref(), Some("from-env"));
    }
}
