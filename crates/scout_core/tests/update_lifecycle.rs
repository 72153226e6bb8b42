use std::sync::Once;
use std::time::Duration;

use pretty_assertions::assert_eq;
use scout_core::{
    update, Category, CoordinatorState, Effect, Lifecycle, LockOutcome, Msg, UnlockRetryPolicy,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scout_logging::initialize_for_tests);
}

fn category(id: &str) -> Category {
    Category::new(id, format!("https://listings.example.com/{id}")).with_name(id.to_uppercase())
}

/// Start a session and lock `id`, returning the state in `Scraping`.
fn scraping(state: CoordinatorState, id: &str) -> CoordinatorState {
    let (state, _) = update(state, Msg::StartScraping);
    let epoch = state.epoch();
    let (state, _) = update(
        state,
        Msg::CategoryLocked {
            epoch,
            outcome: LockOutcome::Locked(category(id)),
        },
    );
    state
}

#[test]
fn start_clears_flags_and_locks() {
    init_logging();
    let (state, effects) = update(CoordinatorState::new(), Msg::StartScraping);

    assert_eq!(*state.lifecycle(), Lifecycle::Locking);
    assert_eq!(
        effects,
        vec![Effect::ClearFlags, Effect::LockNext { epoch: 1 }]
    );
}

#[test]
fn locked_category_starts_scraping() {
    init_logging();
    let (state, _) = update(CoordinatorState::new(), Msg::StartScraping);
    let (state, effects) = update(
        state,
        Msg::CategoryLocked {
            epoch: 1,
            outcome: LockOutcome::Locked(category("c1")),
        },
    );

    assert_eq!(
        *state.lifecycle(),
        Lifecycle::Scraping {
            category: category("c1")
        }
    );
    assert_eq!(
        effects,
        vec![
            Effect::StoreCurrentCategory(category("c1")),
            Effect::InitProgress {
                category_id: "c1".to_string()
            },
            Effect::ResetCategoryHistory,
            Effect::OpenTab {
                url: "https://listings.example.com/c1".to_string(),
                active: true,
            },
        ]
    );
}

#[test]
fn no_more_work_opens_nothing() {
    init_logging();
    let (state, _) = update(CoordinatorState::new(), Msg::StartScraping);
    let (state, effects) = update(
        state,
        Msg::CategoryLocked {
            epoch: 1,
            outcome: LockOutcome::NoMoreWork,
        },
    );

    assert_eq!(*state.lifecycle(), Lifecycle::NoMoreWork);
    assert!(effects.is_empty());

    // A later start tries again.
    let (state, effects) = update(state, Msg::StartScraping);
    assert_eq!(*state.lifecycle(), Lifecycle::Locking);
    assert!(effects.contains(&Effect::LockNext { epoch: 2 }));
}

#[test]
fn missing_device_id_aborts_start() {
    init_logging();
    let (state, _) = update(CoordinatorState::new(), Msg::StartScraping);
    let (state, effects) = update(
        state,
        Msg::CategoryLocked {
            epoch: 1,
            outcome: LockOutcome::MissingDeviceId,
        },
    );

    assert_eq!(*state.lifecycle(), Lifecycle::Idle);
    assert!(matches!(effects.as_slice(), [Effect::LogError { .. }]));
}

#[test]
fn category_done_unlocks_once_before_locking_next() {
    init_logging();
    let state = scraping(CoordinatorState::new(), "c1");

    let (state, effects) = update(state, Msg::CategoryDone);
    assert_eq!(
        effects,
        vec![Effect::Unlock {
            epoch: 1,
            category_id: "c1".to_string(),
            delay: Duration::ZERO,
        }]
    );

    // A duplicate signal while the unlock is in flight issues nothing.
    let (state, effects) = update(state, Msg::CategoryDone);
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::CategoryUnlocked {
            epoch: 1,
            result: Ok(()),
        },
    );
    assert_eq!(*state.lifecycle(), Lifecycle::Locking);
    assert_eq!(
        effects,
        vec![
            Effect::ClearCurrentCategory,
            Effect::MarkProgressDone,
            Effect::ReplyCategoryDone,
            Effect::LockNext { epoch: 1 },
        ]
    );
}

#[test]
fn unlock_failure_without_retry_stays_on_category() {
    init_logging();
    let state = scraping(CoordinatorState::new(), "c1");
    let (state, _) = update(state, Msg::CategoryDone);

    let (state, effects) = update(
        state,
        Msg::CategoryUnlocked {
            epoch: 1,
            result: Err("http status 500".to_string()),
        },
    );

    assert_eq!(
        *state.lifecycle(),
        Lifecycle::Scraping {
            category: category("c1")
        }
    );
    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], Effect::LogError { .. }));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::LockNext { .. })));
}

#[test]
fn unlock_failure_retries_with_backoff_when_configured() {
    init_logging();
    let policy = UnlockRetryPolicy {
        max_attempts: 2,
        backoff: Duration::from_secs(3),
    };
    let state = scraping(CoordinatorState::with_unlock_policy(policy), "c1");
    let (state, _) = update(state, Msg::CategoryDone);

    let (state, effects) = update(
        state,
        Msg::CategoryUnlocked {
            epoch: 1,
            result: Err("network error".to_string()),
        },
    );
    assert_eq!(
        *state.lifecycle(),
        Lifecycle::Unlocking {
            category: category("c1"),
            attempt: 2
        }
    );
    assert_eq!(
        effects[1],
        Effect::Unlock {
            epoch: 1,
            category_id: "c1".to_string(),
            delay: Duration::from_secs(3),
        }
    );

    // Second failure exhausts the policy.
    let (state, effects) = update(
        state,
        Msg::CategoryUnlocked {
            epoch: 1,
            result: Err("network error".to_string()),
        },
    );
    assert!(matches!(state.lifecycle(), Lifecycle::Scraping { .. }));
    assert_eq!(effects.len(), 1);
}

#[test]
fn stop_resets_from_any_state_and_drops_stale_results() {
    init_logging();
    let (state, _) = update(CoordinatorState::new(), Msg::StartScraping);
    let (state, effects) = update(state, Msg::StopScraping);
    assert_eq!(*state.lifecycle(), Lifecycle::Idle);
    assert_eq!(effects, vec![Effect::StopAll]);

    // The lock request from the stopped session resolves late.
    let (state, effects) = update(
        state,
        Msg::CategoryLocked {
            epoch: 1,
            outcome: LockOutcome::Locked(category("late")),
        },
    );
    assert_eq!(*state.lifecycle(), Lifecycle::Idle);
    assert!(effects.is_empty());

    // Stale result from the first session is also ignored after a restart.
    let (state, _) = update(state, Msg::StartScraping);
    assert_eq!(state.epoch(), 3);
    let (state, effects) = update(
        state,
        Msg::CategoryLocked {
            epoch: 1,
            outcome: LockOutcome::Locked(category("late")),
        },
    );
    assert_eq!(*state.lifecycle(), Lifecycle::Locking);
    assert!(effects.is_empty());
}

#[test]
fn start_while_scraping_only_clears_flags() {
    init_logging();
    let state = scraping(CoordinatorState::new(), "c1");
    let (state, effects) = update(state, Msg::StartScraping);

    assert!(matches!(state.lifecycle(), Lifecycle::Scraping { .. }));
    assert_eq!(effects, vec![Effect::ClearFlags]);
}

#[test]
fn category_done_outside_scraping_is_ignored() {
    init_logging();
    let (state, effects) = update(CoordinatorState::new(), Msg::CategoryDone);
    assert_eq!(*state.lifecycle(), Lifecycle::Idle);
    assert!(effects.is_empty());
}

#[test]
fn resumed_category_is_unlocked_on_done() {
    init_logging();
    let state = CoordinatorState::resume(category("c1"), UnlockRetryPolicy::default());
    assert_eq!(
        *state.lifecycle(),
        Lifecycle::Scraping {
            category: category("c1")
        }
    );

    let (state, effects) = update(state, Msg::CategoryDone);
    assert_eq!(
        effects,
        vec![Effect::Unlock {
            epoch: 0,
            category_id: "c1".to_string(),
            delay: Duration::ZERO,
        }]
    );

    let (_, effects) = update(
        state,
        Msg::CategoryUnlocked {
            epoch: 0,
            result: Ok(()),
        },
    );
    assert!(effects.contains(&Effect::LockNext { epoch: 0 }));
}

#[test]
fn start_after_resume_does_not_lock_a_second_category() {
    init_logging();
    let state = CoordinatorState::resume(category("c1"), UnlockRetryPolicy::default());
    let (_, effects) = update(state, Msg::StartScraping);
    assert_eq!(effects, vec![Effect::ClearFlags]);
}
