//! Common test utilities for worker integration tests
//!
//! Shared infrastructure on top of folio-test-utils: a progress collector
//! and helpers for building handler contexts.

#![allow(unused_imports)]
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use folio_worker::{JobContext, ProgressReporter, ProgressUpdate};

/// Reporter that records every update for assertions
#[derive(Clone, Default)]
pub struct CollectingProgress {
    updates: Arc<Mutex<Vec<ProgressUpdate>>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Progress values must never decrease within one job
    pub fn assert_monotonic(&self) {
        let updates = self.updates();
        for pair in updates.windows(2) {
            assert!(
                pair[1].progress >= pair[0].progress,
                "progress decreased: {:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

impl ProgressReporter for CollectingProgress {
    fn report(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// Build a job context wired to a fresh progress collector
pub fn tracked_context(job_id: &str) -> (JobContext, CollectingProgress) {
    let progress = CollectingProgress::new();
    let ctx = JobContext::new(job_id, Arc::new(progress.clone()));
    (ctx, progress)
}
