//! Scout core: data model, messages and the pure category lifecycle state machine.
mod effect;
mod model;
mod msg;
mod state;
mod update;
mod view_model;
pub mod wire;

pub use effect::Effect;
pub use model::{
    Category, LastOpened, Outcome, Progress, ProgressStatus, ScrapeError, ScraperFlags,
};
pub use msg::{LockOutcome, Msg};
pub use state::{CoordinatorState, Epoch, Lifecycle, UnlockRetryPolicy};
pub use update::update;
pub use view_model::StatusView;
pub use wire::{decode_message, Reply, WireError};
