use chrono::Utc;
use scout_core::ScrapeError;
use scout_logging::scout_error;

use crate::store::{DurableState, StoreError, StoreKey};

/// Append-only log of caught failures, persisted under `scrapeErrors`.
#[derive(Clone)]
pub struct ErrorLog {
    state: DurableState,
}

impl ErrorLog {
    pub fn new(state: DurableState) -> Self {
        Self { state }
    }

    /// Logs the failure and appends it to the persisted log. A store failure
    /// is logged and otherwise ignored.
    pub fn record(&self, context: &str, error: &str, url: Option<&str>) {
        match url {
            Some(url) => scout_error!("{}: {} (url={})", context, error, url),
            None => scout_error!("{}: {}", context, error),
        }

        let entry = ScrapeError {
            context: context.to_string(),
            error: error.to_string(),
            url: url.map(ToOwned::to_owned),
            time: Utc::now(),
        };
        let appended = self
            .state
            .modify(StoreKey::ScrapeErrors, |entries: Option<Vec<ScrapeError>>| {
                let mut entries = entries.unwrap_or_default();
                entries.push(entry);
                Some(entries)
            });
        if let Err(err) = appended {
            scout_error!("Failed to persist diagnostic entry: {}", err);
        }
    }

    pub fn entries(&self) -> Result<Vec<ScrapeError>, StoreError> {
        self.state.scrape_errors()
    }
}
