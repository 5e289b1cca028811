//! Exponential-backoff retry for model API calls

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};

use super::LlmError;

/// Retries after the first attempt
const MAX_RETRIES: u32 = 3;

const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Fallback when a 429 carries no usable `retry-after`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Send the request produced by `build`, retrying transient failures
///
/// `build` runs once per attempt because a `RequestBuilder` is consumed by
/// `send`. A 429 is returned at once as [`LlmError::RateLimited`].
pub(super) async fn send_with_retry<F>(build: F, timeout: Duration) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0u32;
    loop {
        let error = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => status_error(response).await,
            Err(e) if e.is_timeout() => LlmError::Timeout(timeout),
            Err(e) => LlmError::Network(e),
        };

        if !error.is_transient() || attempt == MAX_RETRIES {
            debug!(attempt, %error, "send_with_retry: giving up");
            return Err(error);
        }

        attempt += 1;
        let backoff = INITIAL_BACKOFF * 2u32.pow(attempt - 1);
        warn!(
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            %error,
            "Retrying model call after transient error"
        );
        tokio::time::sleep(backoff).await;
    }
}

async fn status_error(response: Response) -> LlmError {
    let status = response.status().as_u16();
    if status == 429 {
        let secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return LlmError::RateLimited {
            retry_after: Duration::from_secs(secs),
        };
    }
    let message = response.text().await.unwrap_or_default();
    LlmError::ApiError { status, message }
}
