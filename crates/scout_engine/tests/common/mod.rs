#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use scout_core::Category;
use scout_engine::{ApiError, ApiFailureKind, ErrorReport, ScoutApi, TabError, TabOpener};

/// Records every URL it is asked to open. URLs in `failing` return an error.
#[derive(Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<(String, bool)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingOpener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn urls(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TabOpener for RecordingOpener {
    async fn open(&self, url: &str, active: bool) -> Result<(), TabError> {
        self.opened.lock().unwrap().push((url.to_string(), active));
        if self.failing.lock().unwrap().contains(url) {
            return Err(TabError::Browser("tab crashed".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    LockNext(String),
    Unlock(String),
    ReportError(String),
}

/// Hands out categories in order and records the calls made against it.
#[derive(Default)]
pub struct FakeApi {
    categories: Mutex<VecDeque<Category>>,
    calls: Mutex<Vec<ApiCall>>,
    unlock_failures: Mutex<u32>,
}

impl FakeApi {
    pub fn with_categories(categories: Vec<Category>) -> Arc<Self> {
        Arc::new(Self {
            categories: Mutex::new(categories.into()),
            ..Self::default()
        })
    }

    pub fn fail_unlocks(&self, count: u32) {
        *self.unlock_failures.lock().unwrap() = count;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ScoutApi for FakeApi {
    async fn lock_next(&self, device_id: &str) -> Result<Option<Category>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(ApiCall::LockNext(device_id.to_string()));
        Ok(self.categories.lock().unwrap().pop_front())
    }

    async fn unlock(&self, category_id: &str, _device_id: &str) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(ApiCall::Unlock(category_id.to_string()));
        let mut failures = self.unlock_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ApiError {
                kind: ApiFailureKind::HttpStatus(500),
                message: "Failed with status 500".to_string(),
            });
        }
        Ok(())
    }

    async fn report_error(&self, site: &str, _report: &ErrorReport) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(ApiCall::ReportError(site.to_string()));
        Ok(())
    }
}

/// Lets spawned tasks run. Under a paused clock this also fires every timer
/// due within `ms`.
pub async fn settle(ms: u64) {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
