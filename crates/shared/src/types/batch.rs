//! Per-item outcome reports for bulk operations.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// An item of a bulk request that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Position of the item in the request.
    pub index: usize,
    /// Why it failed.
    pub error: AppError,
}

/// Outcome of a bulk operation that never aborts on the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport<T> {
    /// Successful results with their request position.
    pub succeeded: Vec<(usize, T)>,
    /// Failed items.
    pub failures: Vec<BatchFailure>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of the item at `index`.
    pub fn record<E: Into<AppError>>(&mut self, index: usize, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.succeeded.push((index, value)),
            Err(err) => self.failures.push(BatchFailure {
                index,
                error: err.into(),
            }),
        }
    }

    /// True when every item succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of items processed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    /// True when nothing was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
