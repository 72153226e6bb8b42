//! Paced, flag-aware tab queue.
//!
//! URLs reported by listing agents are appended to a single FIFO and opened
//! one at a time by a drain task. At most one drain task runs per
//! orchestrator: the `active` flag is set under the queue lock by whoever
//! spawns the task, and cleared under the same lock when the task finds the
//! queue empty, so an `enqueue` racing with the end of a drain either lands
//! in the running task or starts a new one.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use scout_core::{LastOpened, ScraperFlags};
use scout_logging::{scout_debug, scout_info, scout_warn};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::ErrorLog;
use crate::store::{DurableState, StoreError, StoreKey};
use crate::tabs::TabOpener;

/// Which URLs an enqueue is deduplicated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// URLs currently waiting in the queue.
    #[default]
    Queue,
    /// Waiting URLs plus every URL opened since the current category was locked.
    Category,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub tab_open_delay: Duration,
    pub pause_poll_interval: Duration,
    pub dedup_scope: DedupScope,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            tab_open_delay: Duration::from_millis(500),
            pause_poll_interval: Duration::from_millis(1000),
            dedup_scope: DedupScope::Queue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnqueueStats {
    pub enqueued: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    queued: HashSet<String>,
    opened: HashSet<String>,
    parent_url: Option<String>,
    active: bool,
    generation: u64,
    cancel: CancellationToken,
}

impl QueueState {
    fn clear_pending(&mut self) {
        self.pending.clear();
        self.queued.clear();
    }
}

struct Inner {
    queue: Mutex<QueueState>,
    state: DurableState,
    opener: Arc<dyn TabOpener>,
    errors: ErrorLog,
    settings: QueueSettings,
}

#[derive(Clone)]
pub struct QueueOrchestrator {
    inner: Arc<Inner>,
}

impl QueueOrchestrator {
    pub fn new(state: DurableState, opener: Arc<dyn TabOpener>, settings: QueueSettings) -> Self {
        let errors = ErrorLog::new(state.clone());
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(QueueState::default()),
                state,
                opener,
                errors,
                settings,
            }),
        }
    }

    /// Appends the URLs not already known and makes sure a drain task runs.
    /// Nothing is enqueued while the durable stop flag is set.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, urls: Vec<String>) -> EnqueueStats {
        match self.inner.state.flags() {
            Ok(flags) if flags.is_stopped => {
                scout_debug!("Scraper stopped; ignoring {} urls", urls.len());
                return EnqueueStats::default();
            }
            Ok(_) => {}
            Err(err) => scout_warn!("Could not read flags before enqueue: {}", err),
        }

        let mut stats = EnqueueStats::default();
        let spawn = {
            let mut queue = self.lock();
            for url in urls {
                let known = queue.queued.contains(&url)
                    || (self.inner.settings.dedup_scope == DedupScope::Category
                        && queue.opened.contains(&url));
                if known {
                    stats.skipped += 1;
                    continue;
                }
                queue.queued.insert(url.clone());
                queue.pending.push_back(url);
                stats.enqueued += 1;
            }

            if !queue.active && !queue.pending.is_empty() {
                queue.active = true;
                Some((queue.generation, queue.cancel.clone()))
            } else {
                None
            }
        };

        if let Some((generation, cancel)) = spawn {
            scout_debug!("Starting drain loop (generation {})", generation);
            tokio::spawn(self.clone().drain(generation, cancel));
        } else if stats.enqueued > 0 {
            scout_debug!("Queue already processing; new URLs will be opened in turn.");
        }
        stats
    }

    /// Sets the stop flag, drops every pending URL and cancels the drain
    /// task's current wait. Category and progress records are deleted.
    pub fn stop(&self) -> Result<(), StoreError> {
        {
            let mut queue = self.lock();
            queue.clear_pending();
            queue.active = false;
            queue.generation += 1;
            queue.cancel.cancel();
            queue.cancel = CancellationToken::new();
        }
        self.inner.state.set_flags(ScraperFlags::stopped())?;
        self.inner
            .state
            .remove(&[StoreKey::CurrentCategory, StoreKey::Progress])?;
        scout_info!("Scraper stopped; queue cleared");
        Ok(())
    }

    pub fn set_parent(&self, parent_url: impl Into<String>) {
        self.lock().parent_url = Some(parent_url.into());
    }

    /// Forgets the URLs opened for the previous category.
    pub fn begin_category(&self) {
        self.lock().opened.clear();
    }

    pub fn pending(&self) -> Vec<String> {
        self.lock().pending.iter().cloned().collect()
    }

    pub fn is_draining(&self) -> bool {
        self.lock().active
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(self, generation: u64, cancel: CancellationToken) {
        let settings = self.inner.settings.clone();
        let mut index: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return;
            }

            // Flags are re-read on every step; another process may have
            // changed them since the last iteration.
            let flags = match self.inner.state.flags() {
                Ok(flags) => flags,
                Err(err) => {
                    scout_warn!("Could not read flags, holding queue: {}", err);
                    ScraperFlags {
                        is_paused: true,
                        is_stopped: false,
                    }
                }
            };

            if flags.is_stopped {
                let mut queue = self.lock();
                if queue.generation == generation {
                    queue.clear_pending();
                    queue.active = false;
                }
                scout_info!("Stop flag set; drain loop exiting");
                return;
            }

            if flags.is_paused {
                if !sleep_unless_cancelled(settings.pause_poll_interval, &cancel).await {
                    return;
                }
                continue;
            }

            let next = {
                let mut queue = self.lock();
                if queue.generation != generation {
                    return;
                }
                match queue.pending.pop_front() {
                    Some(url) => {
                        queue.queued.remove(&url);
                        queue.opened.insert(url.clone());
                        Some((url, queue.parent_url.clone()))
                    }
                    None => {
                        queue.active = false;
                        None
                    }
                }
            };
            let Some((url, parent_url)) = next else {
                scout_debug!("Queue drained after {} urls", index);
                return;
            };

            match self.inner.opener.open(&url, false).await {
                Ok(()) => {
                    let checkpoint = LastOpened {
                        parent_url,
                        url: url.clone(),
                        index,
                        timestamp: Utc::now(),
                    };
                    if let Err(err) = self.inner.state.set_last_opened(&checkpoint) {
                        scout_warn!("Failed to save last opened {}: {}", url, err);
                    } else {
                        scout_debug!("Saved last opened: {} at index: {}", url, index);
                    }
                }
                Err(err) => {
                    self.inner
                        .errors
                        .record("Failed to open tab", &err.to_string(), Some(&url));
                }
            }
            index += 1;

            if !sleep_unless_cancelled(settings.tab_open_delay, &cancel).await {
                return;
            }
        }
    }
}

/// Returns false when cancelled before the delay elapsed.
async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
