use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Category, Lifecycle, Progress, ScraperFlags};

/// Aggregate numbers and a coarse status string for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub phase: String,
    pub status: String,
    pub category_name: Option<String>,
    pub total_listings: u64,
    pub scraped: u64,
    pub failed: u64,
    pub percent: u8,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatusView {
    /// Flags override the progress status: stopped, then paused.
    pub fn build(
        lifecycle: &Lifecycle,
        flags: ScraperFlags,
        progress: Option<&Progress>,
        category: Option<&Category>,
    ) -> Self {
        let status = flags
            .status_label()
            .or_else(|| progress.map(|p| p.status.as_str()))
            .unwrap_or("N/A")
            .to_string();

        Self {
            phase: lifecycle.name().to_string(),
            status,
            category_name: category.and_then(|c| c.category_name.clone()),
            total_listings: progress.map_or(0, |p| p.total_listings),
            scraped: progress.map_or(0, |p| p.scraped),
            failed: progress.map_or(0, |p| p.failed),
            percent: progress.map_or(0, Progress::percent),
            last_updated: progress.map(|p| p.last_updated),
        }
    }
}
