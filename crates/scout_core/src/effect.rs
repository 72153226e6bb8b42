use std::time::Duration;

use crate::{Category, Epoch, Outcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Persist `{isPaused: false, isStopped: false}`.
    ClearFlags,
    /// Persist `isPaused`, leaving `isStopped` untouched.
    SetPaused(bool),
    /// Stop the queue, drop category and progress state.
    StopAll,
    PersistSite(String),
    SetParent(String),
    EnqueueUrls(Vec<String>),
    SetTotalListings(u64),
    RecordOutcome(Outcome),
    /// Reopen `lastOpened.parentUrl` in a tab.
    ReopenParent,
    ReplyDeviceId,
    ReplyStatus,
    LockNext { epoch: Epoch },
    Unlock {
        epoch: Epoch,
        category_id: String,
        delay: Duration,
    },
    StoreCurrentCategory(Category),
    ClearCurrentCategory,
    InitProgress { category_id: String },
    MarkProgressDone,
    /// Forget URLs opened for the previous category.
    ResetCategoryHistory,
    OpenTab { url: String, active: bool },
    ReplyCategoryDone,
    LogError { context: String, message: String },
}
