use crate::config::RetryPolicy;
use crate::error::{PipelineError, Result};

/// Runs a collaborator call under the configured timeout, retrying with
/// exponential backoff until the budget is spent. The last error wins.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 0..=policy.retries {
        if attempt > 0 {
            tokio::time::sleep(policy.backoff(attempt)).await;
        }
        match tokio::time::timeout(policy.timeout(), op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_error = Some(e),
            Err(_) => {
                last_error = Some(PipelineError::CollaboratorError(format!(
                    "call timed out after {}ms (attempt {})",
                    policy.timeout_ms,
                    attempt + 1
                )));
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| PipelineError::CollaboratorError("retry budget exhausted".to_string())))
}
