use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scout_core::{
    update, CoordinatorState, Effect, Epoch, LockOutcome, Msg, Reply, ScraperFlags, StatusView,
    UnlockRetryPolicy,
};
use scout_logging::{scout_debug, scout_error, scout_info, scout_warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api::{ErrorReport, ScoutApi};
use crate::diagnostics::ErrorLog;
use crate::progress::ProgressTracker;
use crate::queue::{QueueOrchestrator, QueueSettings};
use crate::store::{DurableState, StoreError, StoreKey};
use crate::tabs::TabOpener;

pub struct CoordinatorDeps {
    pub state: DurableState,
    pub api: Arc<dyn ScoutApi>,
    pub opener: Arc<dyn TabOpener>,
    pub queue: QueueSettings,
    pub unlock_policy: UnlockRetryPolicy,
}

struct Envelope {
    msg: Msg,
    reply: Option<oneshot::Sender<Reply>>,
}

/// Cheap, cloneable entry point into the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    queue: QueueOrchestrator,
}

impl CoordinatorHandle {
    /// Spawns the coordinator on the current Tokio runtime. The task ends
    /// once every handle is dropped.
    pub fn spawn(deps: CoordinatorDeps) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = QueueOrchestrator::new(deps.state.clone(), deps.opener.clone(), deps.queue);
        let runner = Runner {
            state: initial_state(&deps.state, deps.unlock_policy),
            progress: ProgressTracker::new(deps.state.clone()),
            errors: ErrorLog::new(deps.state.clone()),
            store: deps.state,
            api: deps.api,
            opener: deps.opener,
            queue: queue.clone(),
            results: tx.downgrade(),
            reply: None,
            done_waiters: Vec::new(),
        };
        let join = tokio::spawn(runner.run(rx));
        (Self { tx, queue }, join)
    }

    /// Fire-and-forget. Returns false if the coordinator is gone.
    pub fn send(&self, msg: Msg) -> bool {
        self.tx.send(Envelope { msg, reply: None }).is_ok()
    }

    /// Enqueues a message that expects an answer and hands back the receiver.
    /// The message takes its place in the mailbox before this returns.
    pub fn submit(&self, msg: Msg) -> Option<oneshot::Receiver<Reply>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                msg,
                reply: Some(reply_tx),
            })
            .ok()?;
        Some(reply_rx)
    }

    /// Sends a message that expects an answer. `None` when the message was
    /// dropped without one (e.g. a category-done signal cut short by stop).
    pub async fn request(&self, msg: Msg) -> Option<Reply> {
        self.submit(msg)?.await.ok()
    }

    pub fn queue(&self) -> &QueueOrchestrator {
        &self.queue
    }
}

/// A category still recorded as current was locked by a previous run and is
/// picked up again in `Scraping`.
fn initial_state(store: &DurableState, unlock_policy: UnlockRetryPolicy) -> CoordinatorState {
    match store.current_category() {
        Ok(Some(category)) => {
            scout_info!("Resuming category {}", category.id);
            CoordinatorState::resume(category, unlock_policy)
        }
        Ok(None) => CoordinatorState::with_unlock_policy(unlock_policy),
        Err(err) => {
            scout_warn!("Failed to read current category, starting idle: {}", err);
            CoordinatorState::with_unlock_policy(unlock_policy)
        }
    }
}

pub fn expects_reply(msg: &Msg) -> bool {
    matches!(msg, Msg::GetDeviceId | Msg::GetStatus | Msg::CategoryDone)
}

struct Runner {
    state: CoordinatorState,
    store: DurableState,
    api: Arc<dyn ScoutApi>,
    opener: Arc<dyn TabOpener>,
    queue: QueueOrchestrator,
    progress: ProgressTracker,
    errors: ErrorLog,
    results: mpsc::WeakUnboundedSender<Envelope>,
    /// Reply slot of the message being dispatched.
    reply: Option<oneshot::Sender<Reply>>,
    /// Category-done signals waiting for the unlock to succeed.
    done_waiters: Vec<oneshot::Sender<Reply>>,
}

impl Runner {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(Envelope { msg, reply }) = rx.recv().await {
            self.dispatch(msg, reply);
        }
        scout_debug!("Coordinator channel closed");
    }

    fn dispatch(&mut self, msg: Msg, reply: Option<oneshot::Sender<Reply>>) {
        scout_debug!("dispatch {:?}", msg);
        if matches!(msg, Msg::CategoryDone) {
            self.done_waiters.extend(reply);
        } else {
            self.reply = reply;
        }

        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        for effect in effects {
            self.execute(effect);
        }
        self.reply = None;
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::ClearFlags => {
                let result = self.store.set_flags(ScraperFlags::running());
                self.check("clear flags", result);
            }
            Effect::SetPaused(paused) => {
                let result = self.store.set_paused(paused).map(|_| ());
                self.check("set paused", result);
                scout_info!("Scraper {}", if paused { "paused" } else { "resumed" });
            }
            Effect::StopAll => {
                let result = self.queue.stop();
                self.check("stop", result);
                self.done_waiters.clear();
            }
            Effect::PersistSite(site) => {
                let result = self.store.set_site(&site);
                self.check("persist site", result);
                scout_info!("Site selected: {}", site);
            }
            Effect::SetParent(url) => {
                scout_info!("Parent URL set: {}", url);
                self.queue.set_parent(url);
            }
            Effect::EnqueueUrls(urls) => {
                let stats = self.queue.enqueue(urls);
                scout_debug!(
                    "Enqueued {} urls, skipped {} duplicates",
                    stats.enqueued,
                    stats.skipped
                );
            }
            Effect::SetTotalListings(total) => {
                let result = self.progress.set_total_listings(total).map(|_| ());
                self.check("set total listings", result);
            }
            Effect::RecordOutcome(outcome) => {
                let result = self.progress.record_outcome(outcome).map(|_| ());
                self.check("record outcome", result);
            }
            Effect::ReopenParent => self.reopen_parent(),
            Effect::ReplyDeviceId => {
                let device_id = self.store.device_id().unwrap_or_else(|err| {
                    scout_error!("Failed to read device id: {}", err);
                    None
                });
                self.respond(Reply::DeviceId { device_id });
            }
            Effect::ReplyStatus => {
                let view = self.status_view();
                self.respond(Reply::Status(view));
            }
            Effect::LockNext { epoch } => self.spawn_lock_next(epoch),
            Effect::Unlock {
                epoch,
                category_id,
                delay,
            } => self.spawn_unlock(epoch, category_id, delay),
            Effect::StoreCurrentCategory(category) => {
                scout_info!(
                    "Locked category {} ({})",
                    category.id,
                    category.category_name.as_deref().unwrap_or("unnamed")
                );
                let result = self.store.set_current_category(&category);
                self.check("store current category", result);
            }
            Effect::ClearCurrentCategory => {
                let result = self.store.remove(&[StoreKey::CurrentCategory]);
                self.check("clear current category", result);
            }
            Effect::InitProgress { category_id } => {
                let result = self.progress.initialize(&category_id).map(|_| ());
                self.check("initialize progress", result);
            }
            Effect::MarkProgressDone => {
                let result = self.progress.mark_done().map(|_| ());
                self.check("mark progress done", result);
            }
            Effect::ResetCategoryHistory => self.queue.begin_category(),
            Effect::OpenTab { url, active } => {
                self.spawn_open(url, active, "Failed to open category tab")
            }
            Effect::ReplyCategoryDone => {
                for waiter in self.done_waiters.drain(..) {
                    let _ = waiter.send(Reply::category_done());
                }
            }
            Effect::LogError { context, message } => self.log_error(context, message),
        }
    }

    fn respond(&mut self, reply: Reply) {
        if let Some(tx) = self.reply.take() {
            let _ = tx.send(reply);
        }
    }

    fn check(&self, what: &str, result: Result<(), StoreError>) {
        if let Err(err) = result {
            scout_error!("Store operation '{}' failed: {}", what, err);
        }
    }

    fn status_view(&self) -> StatusView {
        let flags = self.store.flags().unwrap_or_default();
        let progress = self.store.progress().ok().flatten();
        let category = self.store.current_category().ok().flatten();
        StatusView::build(
            self.state.lifecycle(),
            flags,
            progress.as_ref(),
            category.as_ref(),
        )
    }

    fn reopen_parent(&self) {
        let parent = match self.store.last_opened() {
            Ok(last) => last.and_then(|last| last.parent_url),
            Err(err) => {
                scout_error!("Failed to read last opened: {}", err);
                None
            }
        };
        match parent {
            Some(url) => {
                scout_info!("Reopening listing page {}", url);
                self.spawn_open(url, true, "Failed to reopen listing page");
            }
            None => scout_warn!("No parentUrl found in storage. Cannot resume category properly."),
        }
    }

    fn spawn_open(&self, url: String, active: bool, context: &'static str) {
        let opener = self.opener.clone();
        let errors = self.errors.clone();
        tokio::spawn(async move {
            if let Err(err) = opener.open(&url, active).await {
                errors.record(context, &err.to_string(), Some(&url));
            }
        });
    }

    fn spawn_lock_next(&self, epoch: Epoch) {
        let api = self.api.clone();
        let store = self.store.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let outcome = match store.device_id() {
                Ok(Some(device_id)) => match api.lock_next(&device_id).await {
                    Ok(Some(category)) => LockOutcome::Locked(category),
                    Ok(None) => {
                        scout_warn!("No more categories.");
                        LockOutcome::NoMoreWork
                    }
                    Err(err) => LockOutcome::Failed(err.to_string()),
                },
                Ok(None) => LockOutcome::MissingDeviceId,
                Err(err) => LockOutcome::Failed(err.to_string()),
            };
            post(&results, Msg::CategoryLocked { epoch, outcome });
        });
    }

    fn spawn_unlock(&self, epoch: Epoch, category_id: String, delay: Duration) {
        let api = self.api.clone();
        let store = self.store.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                scout_info!("Retrying unlock of {} in {:?}", category_id, delay);
                tokio::time::sleep(delay).await;
            }
            let result = match store.device_id() {
                Ok(Some(device_id)) => api
                    .unlock(&category_id, &device_id)
                    .await
                    .map_err(|err| err.to_string()),
                Ok(None) => Err("Missing device ID or current category.".to_string()),
                Err(err) => Err(err.to_string()),
            };
            if result.is_ok() {
                scout_info!("Unlocked category {}", category_id);
            }
            post(&results, Msg::CategoryUnlocked { epoch, result });
        });
    }

    fn log_error(&self, context: String, message: String) {
        self.errors.record(&context, &message, None);

        let site = match self.store.site() {
            Ok(Some(site)) => site,
            Ok(None) => return,
            Err(err) => {
                scout_warn!("Failed to read site for error report: {}", err);
                return;
            }
        };
        let api = self.api.clone();
        let report = ErrorReport {
            message,
            stack: None,
            url: None,
            time: Utc::now(),
            context,
        };
        tokio::spawn(async move {
            if let Err(err) = api.report_error(&site, &report).await {
                scout_warn!("Failed to report error to backend: {}", err);
            }
        });
    }
}

fn post(results: &mpsc::WeakUnboundedSender<Envelope>, msg: Msg) {
    if let Some(tx) = results.upgrade() {
        let _ = tx.send(Envelope { msg, reply: None });
    }
}
