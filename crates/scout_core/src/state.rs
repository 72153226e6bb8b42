use std::time::Duration;

use crate::Category;

/// Session counter. Bumped by every start and stop so results of requests
/// issued by an earlier session can be recognised and dropped.
pub type Epoch = u64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    Locking,
    Scraping {
        category: Category,
    },
    Unlocking {
        category: Category,
        attempt: u32,
    },
    NoMoreWork,
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Locking => "locking",
            Lifecycle::Scraping { .. } => "scraping",
            Lifecycle::Unlocking { .. } => "unlocking",
            Lifecycle::NoMoreWork => "no_more_work",
        }
    }

    pub fn category(&self) -> Option<&Category> {
        match self {
            Lifecycle::Scraping { category } | Lifecycle::Unlocking { category, .. } => {
                Some(category)
            }
            Lifecycle::Idle | Lifecycle::Locking | Lifecycle::NoMoreWork => None,
        }
    }

    fn accepts_start(&self) -> bool {
        matches!(self, Lifecycle::Idle | Lifecycle::NoMoreWork)
    }
}

/// How often an unlock is attempted before the worker gives up and stays on
/// the current category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockRetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for UnlockRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoordinatorState {
    lifecycle: Lifecycle,
    epoch: Epoch,
    unlock_policy: UnlockRetryPolicy,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unlock_policy(unlock_policy: UnlockRetryPolicy) -> Self {
        Self {
            unlock_policy,
            ..Self::default()
        }
    }

    /// State of a worker restarted while it still held `category`.
    pub fn resume(category: Category, unlock_policy: UnlockRetryPolicy) -> Self {
        Self {
            lifecycle: Lifecycle::Scraping { category },
            epoch: 0,
            unlock_policy,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn unlock_policy(&self) -> UnlockRetryPolicy {
        self.unlock_policy
    }

    pub(crate) fn accepts_start(&self) -> bool {
        self.lifecycle.accepts_start()
    }

    pub(crate) fn begin_session(&mut self) -> Epoch {
        self.epoch += 1;
        self.lifecycle = Lifecycle::Locking;
        self.epoch
    }

    pub(crate) fn reset(&mut self) {
        self.epoch += 1;
        self.lifecycle = Lifecycle::Idle;
    }

    pub(crate) fn is_current(&self, epoch: Epoch) -> bool {
        self.epoch == epoch
    }

    pub(crate) fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }
}
