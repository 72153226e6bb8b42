use chrono::Utc;
use scout_core::{Outcome, Progress};

use crate::store::{DurableState, StoreError, StoreKey};

/// Scraped/failed counters of the locked category, kept in the durable store.
///
/// Every operation is one atomic read-modify-write, so outcomes reported by
/// many tabs at once are never lost.
#[derive(Clone)]
pub struct ProgressTracker {
    state: DurableState,
}

impl ProgressTracker {
    pub fn new(state: DurableState) -> Self {
        Self { state }
    }

    pub fn initialize(&self, category_id: &str) -> Result<Progress, StoreError> {
        let progress = Progress::started(category_id, Utc::now());
        self.state.put(StoreKey::Progress, &progress)?;
        Ok(progress)
    }

    pub fn record_outcome(&self, outcome: Outcome) -> Result<Progress, StoreError> {
        self.apply(|progress| progress.record(outcome, Utc::now()))
    }

    pub fn set_total_listings(&self, total: u64) -> Result<Progress, StoreError> {
        self.apply(|progress| progress.set_total_listings(total, Utc::now()))
    }

    pub fn mark_done(&self) -> Result<Progress, StoreError> {
        self.apply(|progress| progress.mark_done(Utc::now()))
    }

    pub fn snapshot(&self) -> Result<Option<Progress>, StoreError> {
        self.state.progress()
    }

    fn apply(&self, change: impl FnOnce(&mut Progress)) -> Result<Progress, StoreError> {
        let updated = self
            .state
            .modify(StoreKey::Progress, |progress: Option<Progress>| {
                let mut progress = progress.unwrap_or_default();
                change(&mut progress);
                Some(progress)
            })?;
        Ok(updated.unwrap_or_default())
    }
}
