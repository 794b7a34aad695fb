//! Start and finish events of build operations.

use std::error::Error;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// The failure an operation finished with, shared between every listener.
pub type OperationFailure = Arc<dyn Error + Send + Sync>;

/// Milliseconds since the epoch; wall-clock, matching what tooling clients
/// display.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationStarted {
    pub start_time: u64,
}

impl OperationStarted {
    pub fn now() -> Self {
        Self {
            start_time: now_millis(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationFinished {
    pub start_time: u64,
    pub end_time: u64,
    pub failure: Option<OperationFailure>,
}

impl OperationFinished {
    pub fn now(started: OperationStarted, failure: Option<OperationFailure>) -> Self {
        Self {
            start_time: started.start_time,
            end_time: now_millis(),
            failure,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_preserves_start_time() {
        let started = OperationStarted::now();
        let finished = OperationFinished::now(started, None);
        assert_eq!(finished.start_time, started.start_time);
        assert!(finished.end_time >= finished.start_time);
        assert!(!finished.is_failed());
    }

    #[test]
    fn failure_is_shared_not_cloned() {
        let failure: OperationFailure = Arc::new(std::io::Error::other("task failed"));
        let finished = OperationFinished::now(OperationStarted::now(), Some(failure.clone()));
        assert!(finished.is_failed());
        assert_eq!(finished.failure.unwrap().to_string(), "task failed");
    }
}
