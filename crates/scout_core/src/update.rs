use std::time::Duration;

use crate::{CoordinatorState, Effect, Lifecycle, LockOutcome, Msg, Outcome};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: CoordinatorState, msg: Msg) -> (CoordinatorState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartScraping => {
            if state.accepts_start() {
                let epoch = state.begin_session();
                vec![Effect::ClearFlags, Effect::LockNext { epoch }]
            } else {
                // A category is already held; only lift pause/stop.
                vec![Effect::ClearFlags]
            }
        }
        Msg::PauseScraping => vec![Effect::SetPaused(true)],
        Msg::ResumeScraping => vec![Effect::SetPaused(false), Effect::ReopenParent],
        Msg::QuickResume => vec![Effect::ReopenParent],
        Msg::StopScraping => {
            state.reset();
            vec![Effect::StopAll]
        }
        Msg::SiteSelected(site) => vec![Effect::PersistSite(site)],
        Msg::SetParent(url) => vec![Effect::SetParent(url)],
        Msg::OpenUrls(urls) => {
            if urls.is_empty() {
                Vec::new()
            } else {
                vec![Effect::EnqueueUrls(urls)]
            }
        }
        Msg::ListingsCount(count) => vec![Effect::SetTotalListings(count)],
        Msg::ScrapeSucceeded => vec![Effect::RecordOutcome(Outcome::Scraped)],
        Msg::ScrapeFailed => vec![Effect::RecordOutcome(Outcome::Failed)],
        Msg::GetDeviceId => vec![Effect::ReplyDeviceId],
        Msg::GetStatus => vec![Effect::ReplyStatus],
        Msg::CategoryDone => match state.lifecycle().clone() {
            Lifecycle::Scraping { category } => {
                let effect = Effect::Unlock {
                    epoch: state.epoch(),
                    category_id: category.id.clone(),
                    delay: Duration::ZERO,
                };
                state.set_lifecycle(Lifecycle::Unlocking {
                    category,
                    attempt: 1,
                });
                vec![effect]
            }
            // Unlocking: the in-flight unlock answers this signal too.
            Lifecycle::Unlocking { .. }
            | Lifecycle::Idle
            | Lifecycle::Locking
            | Lifecycle::NoMoreWork => Vec::new(),
        },
        Msg::CategoryLocked { epoch, outcome } => {
            if !state.is_current(epoch) || *state.lifecycle() != Lifecycle::Locking {
                return (state, Vec::new());
            }
            apply_lock_outcome(&mut state, outcome)
        }
        Msg::CategoryUnlocked { epoch, result } => {
            if !state.is_current(epoch) {
                return (state, Vec::new());
            }
            let Lifecycle::Unlocking { category, attempt } = state.lifecycle().clone() else {
                return (state, Vec::new());
            };
            match result {
                Ok(()) => {
                    state.set_lifecycle(Lifecycle::Locking);
                    vec![
                        Effect::ClearCurrentCategory,
                        Effect::MarkProgressDone,
                        Effect::ReplyCategoryDone,
                        Effect::LockNext { epoch },
                    ]
                }
                Err(message) => {
                    let policy = state.unlock_policy();
                    let mut effects = vec![Effect::LogError {
                        context: format!("Error unlocking category (attempt {attempt})"),
                        message,
                    }];
                    if attempt < policy.max_attempts {
                        effects.push(Effect::Unlock {
                            epoch,
                            category_id: category.id.clone(),
                            delay: policy.backoff,
                        });
                        state.set_lifecycle(Lifecycle::Unlocking {
                            category,
                            attempt: attempt + 1,
                        });
                    } else {
                        state.set_lifecycle(Lifecycle::Scraping { category });
                    }
                    effects
                }
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn apply_lock_outcome(state: &mut CoordinatorState, outcome: LockOutcome) -> Vec<Effect> {
    match outcome {
        LockOutcome::Locked(category) => {
            let effects = vec![
                Effect::StoreCurrentCategory(category.clone()),
                Effect::InitProgress {
                    category_id: category.id.clone(),
                },
                Effect::ResetCategoryHistory,
                Effect::OpenTab {
                    url: category.category_url.clone(),
                    active: true,
                },
            ];
            state.set_lifecycle(Lifecycle::Scraping { category });
            effects
        }
        LockOutcome::NoMoreWork => {
            state.set_lifecycle(Lifecycle::NoMoreWork);
            Vec::new()
        }
        LockOutcome::MissingDeviceId => {
            state.set_lifecycle(Lifecycle::Idle);
            vec![Effect::LogError {
                context: "start".to_string(),
                message: "No deviceId found, scraping will not start.".to_string(),
            }]
        }
        LockOutcome::Failed(message) => {
            state.set_lifecycle(Lifecycle::Idle);
            vec![Effect::LogError {
                context: "Error locking category".to_string(),
                message,
            }]
        }
    }
}
