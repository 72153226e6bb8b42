use crate::{Category, Epoch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Operator started (or restarted) the worker.
    StartScraping,
    /// Operator paused tab opening.
    PauseScraping,
    /// Operator resumed; the last listing page is reopened.
    ResumeScraping,
    /// Reopen the last listing page without touching the flags.
    QuickResume,
    /// Operator stopped everything.
    StopScraping,
    /// Operator picked the site slug used for submissions.
    SiteSelected(String),
    /// Listing agent announced the page its URLs come from.
    SetParent(String),
    /// Listing agent discovered detail URLs.
    OpenUrls(Vec<String>),
    /// Listing agent counted the listings of the current category.
    ListingsCount(u64),
    /// Detail agent submitted a record.
    ScrapeSucceeded,
    /// Detail agent gave up on a page.
    ScrapeFailed,
    /// Agent asks for the persisted device id (reply expected).
    GetDeviceId,
    /// Operator asks for the status view (reply expected).
    GetStatus,
    /// Listing agent ran out of pages for the current category.
    CategoryDone,
    /// Result of a lock-next request issued in `epoch`.
    CategoryLocked { epoch: Epoch, outcome: LockOutcome },
    /// Result of an unlock request issued in `epoch`.
    CategoryUnlocked {
        epoch: Epoch,
        result: Result<(), String>,
    },
    /// Fallback for placeholder wiring.
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Locked(Category),
    NoMoreWork,
    MissingDeviceId,
    Failed(String),
}
