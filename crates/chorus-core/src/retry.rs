//! Retry with exponential backoff for model calls.

use chorus_types::ApiError;
use rand::Rng;

/// Default retries for transient model errors.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Configuration for retry behavior on transient model errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Initial delay in milliseconds before the first retry.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds between retries.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
        }
    }
}

/// Returns `true` if the error is transient and the call should be retried.
pub fn is_retryable(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::RateLimited { .. }
            | ApiError::Overloaded
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout
    )
}

/// Calculate the delay in milliseconds before the next retry attempt.
///
/// A server-supplied `retry_after_ms` wins, clamped to `max_delay_ms`.
/// Otherwise `initial_delay_ms * backoff_factor^attempt` with ±25% jitter,
/// clamped to `max_delay_ms`.
pub fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> u64 {
    if let Some(server_delay) = retry_after_ms {
        return server_delay.min(config.max_delay_ms);
    }

    let base = config.initial_delay_ms as f64 * config.backoff_factor.powi(attempt as i32);
    let clamped = base.min(config.max_delay_ms as f64);

    let jitter_factor = rand::rng().random_range(0.75..=1.25);
    let jittered = clamped * jitter_factor;

    (jittered as u64).min(config.max_delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 60_000);
        assert!((config.backoff_factor - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(is_retryable(&ApiError::RateLimited {
            retry_after_ms: None,
        }));
        assert!(is_retryable(&ApiError::Overloaded));
        assert!(is_retryable(&ApiError::Server {
            status: 500,
            message: "internal error".into(),
        }));
        assert!(is_retryable(&ApiError::Network("connection refused".into())));
        assert!(is_retryable(&ApiError::Timeout));
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!is_retryable(&ApiError::Auth {
            message: "invalid key".into(),
        }));
        assert!(!is_retryable(&ApiError::BadRequest {
            message: "bad input".into(),
        }));
        assert!(!is_retryable(&ApiError::Parse("not json".into())));
    }

    #[test]
    fn calculate_delay_exponential() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
        };

        // Attempt 0: base 1000, ±25% → [750, 1250]
        let delay0 = calculate_delay(&config, 0, None);
        assert!((750..=1250).contains(&delay0), "delay0={delay0}");

        // Attempt 2: base 4000, ±25% → [3000, 5000]
        let delay2 = calculate_delay(&config, 2, None);
        assert!((3000..=5000).contains(&delay2), "delay2={delay2}");
    }

    #[test]
    fn calculate_delay_respects_retry_after() {
        let config = RetryConfig::default();
        assert_eq!(calculate_delay(&config, 0, Some(5000)), 5000);
    }

    #[test]
    fn calculate_delay_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_factor: 10.0,
        };
        assert!(calculate_delay(&config, 5, None) <= 5000);
        assert_eq!(calculate_delay(&config, 0, Some(30_000)), 5000);
    }
}
