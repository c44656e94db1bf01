//! Retry logic with exponential backoff
//!
//! Only the worker's calls back into the archive API go through here. The
//! archival pipeline and media fetches deliberately do not retry; a failed
//! asset is omitted and a failed run is simply triggered again later.
//!
//! # Example
//!
//! ```no_run
//! use tidyfeed_archive::retry::{IsRetryable, with_retry};
//! use tidyfeed_archive::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum ClaimError {
//!     Unavailable,
//!     Rejected,
//! }
//!
//! impl std::fmt::Display for ClaimError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for ClaimError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, ClaimError::Unavailable)
//!     }
//! }
//!
//! # async fn example() -> Result<(), ClaimError> {
//! let claimed = with_retry(&RetryConfig::default(), || async {
//!     Ok::<_, ClaimError>(vec!["job-1"])
//! })
//! .await?;
//! assert_eq!(claimed.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Splits failures into worth-retrying and final
///
/// Transient failures (timeouts, refused connections, rate limiting) return `true`.
/// Permanent failures (bad request, state conflicts, missing content) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::TransientFetch { .. } => true,
            Error::PermanentSource { .. } => false,
            Error::Job(_) => false,
            Error::Storage(_) => false,
            Error::Database(_) | Error::Sqlx(_) => false,
            Error::Config { .. } => false,
            Error::InvalidPayload(_) | Error::InvalidUrl(_) => false,
            Error::NotFound(_) => false,
            Error::ShuttingDown => false,
            Error::Serialization(_) => false,
            Error::ApiServerError(_) => false,
            Error::ExternalTool(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Run `operation`, retrying transient failures with exponential backoff
///
/// `config.max_attempts` counts retries, so the operation runs at most
/// `max_attempts + 1` times. Non-retryable errors are returned immediately;
/// otherwise the last error is returned once retries run out.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retries = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(retries, "Call succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            tracing::debug!(error = %err, "Not retrying permanent failure");
            return Err(err);
        }
        if retries >= config.max_attempts {
            tracing::error!(error = %err, retries, "Giving up after retries");
            return Err(err);
        }

        let wait = backoff_delay(config, retries);
        retries += 1;
        tracing::warn!(
            error = %err,
            retry = retries,
            of = config.max_attempts,
            wait_ms = wait.as_millis() as u64,
            "Transient failure, retrying"
        );
        tokio::time::sleep(wait).await;
    }
}

/// Delay before retry number `retry + 1`, capped at `max_delay`
fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    let factor = config.backoff_multiplier.max(1.0).powi(retry.min(64) as i32);
    let base = config
        .initial_delay
        .mul_f64(factor.min(1e6))
        .min(config.max_delay);
    if config.jitter { add_jitter(base) } else { base }
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    delay.mul_f64(factor)
}
