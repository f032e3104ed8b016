use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use starkforge_cheatcodes::CoveredLocation;
use tokio::sync::{Mutex, mpsc};

use crate::{CollectionResult, TestResult};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SharedStateError {
    #[error("No result arrived within {0:?}")]
    Timeout(Duration),
    #[error("Result channel closed before all results arrived")]
    Closed,
    #[error("Result channel is full")]
    Full,
}

/// Channels between the workers running test cases and the task
/// aggregating their results.
///
/// Both channels are bounded by the number of results the run expects, so
/// posting never waits on the aggregator.
#[derive(Debug)]
pub struct SharedRunState {
    results_tx: mpsc::Sender<TestResult>,
    results_rx: Mutex<mpsc::Receiver<TestResult>>,
    locations_tx: mpsc::Sender<Vec<CoveredLocation>>,
    locations_rx: Mutex<mpsc::Receiver<Vec<CoveredLocation>>>,
    any_failed_or_broken: AtomicBool,
    timeout: Duration,
}

impl SharedRunState {
    pub fn new(collection: &CollectionResult, timeout: Duration) -> Self {
        let capacity = collection.expected_results_count().max(1);
        let (results_tx, results_rx) = mpsc::channel(capacity);
        let (locations_tx, locations_rx) = mpsc::channel(collection.test_suites.len().max(1));
        Self {
            results_tx,
            results_rx: Mutex::new(results_rx),
            locations_tx,
            locations_rx: Mutex::new(locations_rx),
            any_failed_or_broken: AtomicBool::new(!collection.broken_test_suites.is_empty()),
            timeout,
        }
    }

    /// Posts `result` without blocking. Non-passing results raise the
    /// failure flag before they become visible to the aggregator.
    pub fn put_result(&self, result: TestResult) -> Result<(), SharedStateError> {
        if !result.is_passed() {
            self.any_failed_or_broken.store(true, Ordering::SeqCst);
        }
        self.results_tx.try_send(result).map_err(try_send_error)
    }

    /// Waits for the next result, in completion order.
    pub async fn get_result(&self) -> Result<TestResult, SharedStateError> {
        let mut rx = self.results_rx.lock().await;
        match tokio::time::timeout(self.timeout, rx.recv()).await {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(SharedStateError::Closed),
            Err(_) => Err(SharedStateError::Timeout(self.timeout)),
        }
    }

    pub fn put_covered_locations(
        &self,
        locations: Vec<CoveredLocation>,
    ) -> Result<(), SharedStateError> {
        self.locations_tx.try_send(locations).map_err(try_send_error)
    }

    /// Waits for the next covered-location report.
    pub async fn get_covered_locations(&self) -> Result<Vec<CoveredLocation>, SharedStateError> {
        let mut rx = self.locations_rx.lock().await;
        match tokio::time::timeout(self.timeout, rx.recv()).await {
            Ok(Some(locations)) => Ok(locations),
            Ok(None) => Err(SharedStateError::Closed),
            Err(_) => Err(SharedStateError::Timeout(self.timeout)),
        }
    }

    pub fn any_failed_or_broken(&self) -> bool {
        self.any_failed_or_broken.load(Ordering::SeqCst)
    }
}

fn try_send_error<T>(error: mpsc::error::TrySendError<T>) -> SharedStateError {
    match error {
        mpsc::error::TrySendError::Full(_) => SharedStateError::Full,
        mpsc::error::TrySendError::Closed(_) => SharedStateError::Closed,
    }
}
