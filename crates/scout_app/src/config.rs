//! Worker configuration, read from a RON file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! worker talking to `http://localhost:8000/api` with a visible browser.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use scout_core::UnlockRetryPolicy;
use scout_engine::{ApiSettings, BrowserSettings, DedupScope, QueueSettings};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub api_base_url: String,
    pub state_dir: PathBuf,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub tab_open_delay_ms: u64,
    pub pause_poll_interval_ms: u64,
    pub dedup_scope: DedupScope,
    pub unlock_max_attempts: u32,
    pub unlock_backoff_ms: u64,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Log the tabs instead of opening them.
    pub dry_run: bool,
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub sandbox: bool,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let queue = QueueSettings::default();
        let unlock = UnlockRetryPolicy::default();
        Self {
            api_base_url: api.base_url,
            state_dir: PathBuf::from("./scout_state"),
            connect_timeout_ms: millis(api.connect_timeout),
            request_timeout_ms: millis(api.request_timeout),
            tab_open_delay_ms: millis(queue.tab_open_delay),
            pause_poll_interval_ms: millis(queue.pause_poll_interval),
            dedup_scope: queue.dedup_scope,
            unlock_max_attempts: unlock.max_attempts,
            unlock_backoff_ms: millis(unlock.backoff),
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let browser = BrowserSettings::default();
        Self {
            dry_run: false,
            headless: browser.headless,
            executable: browser.executable,
            sandbox: browser.sandbox,
        }
    }
}

impl ScoutConfig {
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            tab_open_delay: Duration::from_millis(self.tab_open_delay_ms),
            pause_poll_interval: Duration::from_millis(self.pause_poll_interval_ms),
            dedup_scope: self.dedup_scope,
        }
    }

    /// At least one unlock attempt is always made.
    pub fn unlock_policy(&self) -> UnlockRetryPolicy {
        UnlockRetryPolicy {
            max_attempts: self.unlock_max_attempts.max(1),
            backoff: Duration::from_millis(self.unlock_backoff_ms),
        }
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            headless: self.browser.headless,
            executable: self.browser.executable.clone(),
            sandbox: self.browser.sandbox,
            ..BrowserSettings::default()
        }
    }
}

/// Reads the config file, or returns the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<ScoutConfig> {
    let Some(path) = path else {
        return Ok(ScoutConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<ScoutConfig> {
    Ok(ron::from_str(content)?)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_struct_uses_defaults() {
        let config = parse_config("()").unwrap();
        assert_eq!(config, ScoutConfig::default());
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.queue_settings().tab_open_delay, Duration::from_millis(500));
        assert_eq!(
            config.queue_settings().pause_poll_interval,
            Duration::from_millis(1000)
        );
        assert_eq!(config.unlock_policy(), UnlockRetryPolicy::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = parse_config(
            r#"(
                api_base_url: "https://scout.example.com/api",
                tab_open_delay_ms: 250,
                dedup_scope: category,
                unlock_max_attempts: 3,
                browser: (headless: true, dry_run: true),
            )"#,
        )
        .unwrap();

        assert_eq!(config.api_settings().base_url, "https://scout.example.com/api");
        assert_eq!(config.queue_settings().tab_open_delay, Duration::from_millis(250));
        assert_eq!(config.queue_settings().dedup_scope, DedupScope::Category);
        assert_eq!(config.unlock_policy().max_attempts, 3);
        assert!(config.browser.headless);
        assert!(config.browser.dry_run);
        assert!(config.browser.sandbox);
    }

    #[test]
    fn zero_attempts_still_unlocks_once() {
        let config = parse_config("(unlock_max_attempts: 0)").unwrap();
        assert_eq!(config.unlock_policy().max_attempts, 1);
    }

    #[test]
    fn mistyped_field_is_reported_with_context() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("scout.ron");
        fs::write(&path, "(api_base_url: 42)").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid config file"));
    }

    #[test]
    fn missing_path_means_defaults() {
        assert_eq!(load_config(None).unwrap(), ScoutConfig::default());
    }
}
