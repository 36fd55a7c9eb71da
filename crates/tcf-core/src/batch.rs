//! Batch operation executor
//!
//! Runs independent sub-operations one after another. A failing item is
//! recorded at its index and the batch moves on; `success` holds only when no
//! item failed. With pre-flight validation on, every item is checked first
//! and a single invalid item rejects the whole batch before anything runs.

use crate::error::ForgeResult;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Failure of one batch item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    /// Item position in the request
    pub index: usize,
    /// Error message
    pub message: String,
    /// Whether the item may succeed if retried
    pub retryable: bool,
}

/// Aggregated batch outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult<T> {
    /// No item failed
    pub success: bool,
    /// Per-item output, `None` where the item failed or never ran
    pub results: Vec<Option<T>>,
    /// Items that completed
    pub succeeded: usize,
    /// Items that failed (or were invalid in a rejected batch)
    pub failed: usize,
    /// Failures in index order
    pub errors: Vec<BatchItemError>,
    /// Pre-flight validation rejected the batch; no item ran
    #[serde(default)]
    pub rejected: bool,
    /// Pre-flight verdict per item (empty when validation is off)
    #[serde(default)]
    pub validity: Vec<bool>,
}

impl<T> BatchResult<T> {
    fn with_capacity(len: usize) -> Self {
        Self {
            success: true,
            results: Vec::with_capacity(len),
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
            rejected: false,
            validity: Vec::new(),
        }
    }

    /// Total items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if the batch had no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Error recorded for an item
    #[must_use]
    pub fn error_at(&self, index: usize) -> Option<&BatchItemError> {
        self.errors.iter().find(|e| e.index == index)
    }

    /// Outputs of items that completed
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.results.iter().flatten()
    }
}

/// Sequential batch runner
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchExecutor {
    preflight: bool,
}

impl BatchExecutor {
    /// Executor with pre-flight validation on or off
    #[inline]
    #[must_use]
    pub fn new(preflight: bool) -> Self {
        Self { preflight }
    }

    /// Check if pre-flight validation runs
    #[inline]
    #[must_use]
    pub fn preflight(&self) -> bool {
        self.preflight
    }

    /// Run a batch
    ///
    /// `validate` is only consulted when pre-flight validation is on.
    pub async fn run<I, T, V, F, Fut>(&self, items: Vec<I>, validate: V, mut op: F) -> BatchResult<T>
    where
        V: Fn(&I) -> Result<(), String>,
        F: FnMut(usize, I) -> Fut,
        Fut: Future<Output = ForgeResult<T>>,
    {
        let mut result = BatchResult::with_capacity(items.len());

        if self.preflight {
            result.validity = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let verdict = validate(item);
                result.validity.push(verdict.is_ok());
                if let Err(message) = verdict {
                    result.errors.push(BatchItemError {
                        index,
                        message,
                        retryable: false,
                    });
                }
            }
            if !result.errors.is_empty() {
                result.rejected = true;
                result.failed = result.errors.len();
                result.success = false;
                result.results = items.iter().map(|_| None).collect();
                tracing::warn!(items = items.len(), invalid = result.failed, "batch rejected by pre-flight validation");
                return result;
            }
        }

        let total = items.len();
        for (index, item) in items.into_iter().enumerate() {
            match op(index, item).await {
                Ok(output) => {
                    result.succeeded += 1;
                    result.results.push(Some(output));
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "batch item failed");
                    result.failed += 1;
                    result.errors.push(BatchItemError {
                        index,
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                    });
                    result.results.push(None);
                }
            }
        }

        result.success = result.failed == 0;
        tracing::info!(total, succeeded = result.succeeded, failed = result.failed, "batch finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;

    async fn double_odd(_: usize, n: u32) -> ForgeResult<u32> {
        if n % 2 == 0 {
            Err(ForgeError::invalid_config(format!("{n} is even")))
        } else {
            Ok(n * 2)
        }
    }

    #[tokio::test]
    async fn failures_do_not_halt_batch() {
        let result = BatchExecutor::default()
            .run(vec![1, 2, 3, 4, 5], |_| Ok(()), double_odd)
            .await;

        assert!(!result.success);
        assert_eq!(result.succeeded, 3);
        assert_eq!(result.failed, 2);
        assert_eq!(result.results, vec![Some(2), None, Some(6), None, Some(10)]);
        assert_eq!(result.errors.iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 3]);
        assert!(result.error_at(3).unwrap().message.contains("4 is even"));
        assert!(result.validity.is_empty());
    }

    #[tokio::test]
    async fn all_ok_is_success() {
        let result = BatchExecutor::new(true)
            .run(vec![1, 3], |_| Ok(()), double_odd)
            .await;
        assert!(result.success);
        assert_eq!(result.validity, vec![true, true]);
        assert_eq!(result.successes().copied().collect::<Vec<_>>(), vec![2, 6]);
    }

    #[tokio::test]
    async fn preflight_rejects_before_any_item_runs() {
        let mut ran = 0;
        let result = BatchExecutor::new(true)
            .run(
                vec![1, 0, 3],
                |n: &u32| if *n == 0 { Err("zero".to_string()) } else { Ok(()) },
                |_, n| {
                    ran += 1;
                    double_odd(0, n)
                },
            )
            .await;

        assert_eq!(ran, 0);
        assert!(result.rejected);
        assert!(!result.success);
        assert_eq!(result.validity, vec![true, false, true]);
        assert_eq!(result.failed, 1);
        assert_eq!(result.results, vec![None, None, None]);
    }

    #[tokio::test]
    async fn empty_batch_succeeds() {
        let result = BatchExecutor::default()
            .run(Vec::<u32>::new(), |_| Ok(()), double_odd)
            .await;
        assert!(result.success);
        assert!(result.is_empty());
    }
}
