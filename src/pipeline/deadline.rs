//! Deadline enforcement for potentially slow operations.

use std::future::Future;
use std::time::Duration;

use crate::FathomError;

/// Race `operation` against a deadline.
///
/// Returns the operation's own result if it settles in time, otherwise
/// `FathomError::Timeout { label, deadline_ms }`. On timeout the future is
/// dropped — the wait is abandoned, but any in-flight upstream request keeps
/// running on the server side. Callers must not assume resource cleanup.
///
/// A zero deadline fails immediately without polling the operation.
pub async fn with_deadline<T, F>(
    operation: F,
    deadline_ms: u64,
    label: &str,
) -> Result<T, FathomError>
where
    F: Future<Output = Result<T, FathomError>>,
{
    if deadline_ms == 0 {
        return Err(FathomError::Timeout {
            label: label.to_string(),
            deadline_ms,
        });
    }

    match tokio::time::timeout(Duration::from_millis(deadline_ms), operation).await {
        Ok(result) => result,
        Err(_elapsed) => Err(FathomError::Timeout {
            label: label.to_string(),
            deadline_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let result = with_deadline(async { Ok::<_, FathomError>(42) }, 1_000, "fast").await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let start = Instant::now();
        let result = with_deadline(
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, FathomError>(())
            },
            50,
            "slow",
        )
        .await;

        match result {
            Err(FathomError::Timeout { label, deadline_ms }) => {
                assert_eq!(label, "slow");
                assert_eq!(deadline_ms, 50);
            }
            other => panic!("Expected timeout, got {:?}", other.is_ok()),
        }
        // The wait is abandoned at the deadline, not at the operation's pace.
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_zero_deadline_fails_immediately() {
        let result = with_deadline(
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, FathomError>(())
            },
            0,
            "zero",
        )
        .await;
        assert!(matches!(
            result,
            Err(FathomError::Timeout { deadline_ms: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_operation_error_propagates() {
        let result = with_deadline(
            async { Err::<(), _>(FathomError::Validation("bad input".into())) },
            1_000,
            "failing",
        )
        .await;
        assert!(matches!(result, Err(FathomError::Validation(_))));
    }
}
