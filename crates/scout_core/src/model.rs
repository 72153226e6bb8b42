use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global pause/stop switches. `is_stopped` wins over `is_paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperFlags {
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub is_stopped: bool,
}

impl ScraperFlags {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn stopped() -> Self {
        Self {
            is_paused: false,
            is_stopped: true,
        }
    }

    pub fn status_label(&self) -> Option<&'static str> {
        if self.is_stopped {
            Some("stopped")
        } else if self.is_paused {
            Some("paused")
        } else {
            None
        }
    }
}

/// A unit of scraping work handed out by the remote API.
///
/// The API sends the identifier as `_id`; `id` is accepted as well. Fields
/// this worker does not interpret are kept in `extra` so the record can be
/// stored and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub category_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Category {
    pub fn new(id: impl Into<String>, category_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category_url: category_url.into(),
            category_name: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.category_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    #[default]
    Running,
    Done,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Running => "running",
            ProgressStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Scraped,
    Failed,
}

/// Per-category counters shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub total_listings: u64,
    #[serde(default)]
    pub scraped: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub status: ProgressStatus,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl Progress {
    pub fn started(category_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            category_id: Some(category_id.into()),
            last_updated: now,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: Outcome, now: DateTime<Utc>) {
        match outcome {
            Outcome::Scraped => self.scraped = self.scraped.saturating_add(1),
            Outcome::Failed => self.failed = self.failed.saturating_add(1),
        }
        self.last_updated = now;
    }

    pub fn set_total_listings(&mut self, total: u64, now: DateTime<Utc>) {
        self.total_listings = total;
        self.last_updated = now;
    }

    pub fn mark_done(&mut self, now: DateTime<Utc>) {
        self.status = ProgressStatus::Done;
        self.last_updated = now;
    }

    pub fn completed(&self) -> u64 {
        self.scraped + self.failed
    }

    /// Completion percentage, capped at 100. Zero while the total is unknown.
    pub fn percent(&self) -> u8 {
        if self.total_listings == 0 {
            return 0;
        }
        let ratio = self.completed() as f64 / self.total_listings as f64;
        (ratio * 100.0).round().min(100.0) as u8
    }
}

/// Checkpoint of the most recently opened detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOpened {
    #[serde(default)]
    pub parent_url: Option<String>,
    pub url: String,
    pub index: u64,
    pub timestamp: DateTime<Utc>,
}

/// One entry of the append-only diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeError {
    pub context: String,
    pub error: String,
    #[serde(default)]
    pub url: Option<String>,
    pub time: DateTime<Utc>,
}
