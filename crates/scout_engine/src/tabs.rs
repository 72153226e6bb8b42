use std::path::PathBuf;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use scout_logging::{scout_debug, scout_info};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TabError {
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("browser error: {0}")]
    Browser(String),
}

/// Opens pages in new browser tabs. Implementations return once the tab
/// exists; they do not wait for the page to load.
#[async_trait::async_trait]
pub trait TabOpener: Send + Sync {
    async fn open(&self, url: &str, active: bool) -> Result<(), TabError>;
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub window_size: (u32, u32),
    pub idle_timeout: Duration,
    pub sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            window_size: (1920, 1080),
            idle_timeout: Duration::from_secs(60 * 60),
            sandbox: true,
        }
    }
}

/// Chrome driven over the DevTools protocol.
pub struct ChromeTabOpener {
    browser: Browser,
}

impl ChromeTabOpener {
    pub fn launch(settings: &BrowserSettings) -> Result<Self, TabError> {
        let options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .path(settings.executable.clone())
            .window_size(Some(settings.window_size))
            .idle_browser_timeout(settings.idle_timeout)
            .sandbox(settings.sandbox)
            .build()
            .map_err(|err| TabError::Browser(err.to_string()))?;
        let browser = Browser::new(options).map_err(|err| TabError::Browser(err.to_string()))?;
        scout_info!("Browser launched (headless={})", settings.headless);
        Ok(Self { browser })
    }
}

#[async_trait::async_trait]
impl TabOpener for ChromeTabOpener {
    async fn open(&self, url: &str, active: bool) -> Result<(), TabError> {
        let url = validate_url(url)?;
        let browser = self.browser.clone();
        // headless_chrome is a blocking client.
        tokio::task::spawn_blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|err| TabError::Browser(err.to_string()))?;
            tab.navigate_to(url.as_str())
                .map_err(|err| TabError::Browser(err.to_string()))?;
            if active {
                tab.bring_to_front()
                    .map_err(|err| TabError::Browser(err.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|err| TabError::Browser(err.to_string()))?
    }
}

/// Logs instead of opening anything; for running against the API without a
/// browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunTabOpener;

#[async_trait::async_trait]
impl TabOpener for DryRunTabOpener {
    async fn open(&self, url: &str, active: bool) -> Result<(), TabError> {
        let url = validate_url(url)?;
        scout_debug!("dry run: would open {} (active={})", url, active);
        Ok(())
    }
}

fn validate_url(raw: &str) -> Result<Url, TabError> {
    Url::parse(raw).map_err(|err| TabError::InvalidUrl {
        url: raw.to_string(),
        message: err.to_string(),
    })
}
