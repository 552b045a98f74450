// src/services/retry.rs
use crate::errors::RenderError;
use log::warn;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Substrings that mark a failure as transient. This list is a policy,
/// not a guaranteed classifier; tune it as new failure shapes appear.
const TRANSIENT_MARKERS: [&str; 10] = [
    "500",
    "internal error",
    "503",
    "overloaded",
    "429",
    "rate limit",
    "unavailable",
    "fetch",
    "network",
    "failed to load",
];

const AUTH_REQUIRED_MARKERS: [&str; 3] = [
    "requested entity was not found",
    "api_key_required",
    "api key not valid",
];

const AUTH_REVOKED_MARKERS: [&str; 2] = ["leaked", "permission_denied"];

/// Classifies a flat failure message into the error taxonomy. Fatal auth
/// failures are checked before the transient markers so a message like
/// "permission_denied (503)" is never retried.
pub fn classify_failure(message: &str) -> RenderError {
    let lower = message.to_lowercase();

    if AUTH_REQUIRED_MARKERS.iter().any(|m| lower.contains(m)) {
        return RenderError::AuthRequired(message.to_string());
    }
    if AUTH_REVOKED_MARKERS.iter().any(|m| lower.contains(m)) {
        return RenderError::AuthRevoked(message.to_string());
    }
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return RenderError::Transient(message.to_string());
    }
    RenderError::Unclassified(message.to_string())
}

/// Runs `operation` up to `max_attempts` times, sleeping with exponential
/// backoff plus jitter between transient failures. Fatal errors surface
/// immediately; on exhaustion the last classified error is returned.
pub async fn invoke_with_retry<T, F, Fut>(
    max_attempts: u32,
    mut operation: F,
) -> Result<T, RenderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RenderError>>,
{
    let mut last_error = RenderError::Unclassified("No attempts made".to_string());

    for attempt in 0..max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(RenderError::Transient(message)) if attempt + 1 < max_attempts => {
                let delay = backoff_delay(attempt);
                warn!(
                    "Model busy ({}), retrying in {}ms (attempt {}/{})",
                    message,
                    delay.as_millis(),
                    attempt + 1,
                    max_attempts
                );
                tokio::time::sleep(delay).await;
                last_error = RenderError::Transient(message);
            }
            Err(other) => return Err(other),
        }
    }

    Err(last_error)
}

fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 2u64.pow(attempt + 1) * 1000;
    let jitter_ms = rand::thread_rng().gen_range(0..1000);
    Duration::from_millis(base_ms + jitter_ms)
}
