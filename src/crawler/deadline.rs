use crate::NavigationError;
use std::future::Future;
use std::time::Duration;

/// Runs a navigator call under a deadline
///
/// An elapsed deadline becomes a recoverable [`NavigationError::Timeout`]
/// naming `operation`.
pub async fn with_deadline<T, F>(
    operation: &str,
    after: Duration,
    future: F,
) -> Result<T, NavigationError>
where
    F: Future<Output = Result<T, NavigationError>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(NavigationError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}
