//! Scout engine: durable state, backend client, tab queue and the coordinator task.
mod api;
mod coordinator;
mod device;
mod diagnostics;
mod persist;
mod progress;
mod queue;
mod store;
mod tabs;

pub use api::{
    ApiClient, ApiError, ApiFailureKind, ApiSettings, ErrorReport, PropertyRecord, ScoutApi,
};
pub use coordinator::{expects_reply, CoordinatorDeps, CoordinatorHandle};
pub use device::ensure_device_id;
pub use diagnostics::ErrorLog;
pub use persist::{ensure_state_dir, AtomicFileWriter, PersistError};
pub use progress::ProgressTracker;
pub use queue::{DedupScope, EnqueueStats, QueueOrchestrator, QueueSettings};
pub use store::{Document, DurableState, FileStore, MemoryStore, Store, StoreError, StoreKey};
pub use tabs::{BrowserSettings, ChromeTabOpener, DryRunTabOpener, TabError, TabOpener};
