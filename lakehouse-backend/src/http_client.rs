//! Shared HTTP plumbing for network backends.
//!
//! Sends a prepared `RequestBuilder`, logs it, classifies transport-level
//! failures (timeouts, 429, 502-504) and retries the transient ones. Status
//! codes the backend understands itself (401, 403, 404, ...) are returned to
//! the caller untouched for its own [`ErrorMapper`](crate::traits::ErrorMapper).

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::error::{BackendFailure, OpsError};
use crate::utils::log_sanitizer::truncate_for_log;

/// Upper bound honoured for a server-sent `Retry-After`.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// HTTP tool function set
pub struct HttpUtils;

impl HttpUtils {
    /// Performs an HTTP request and returns `(status, body)`.
    ///
    /// # Errors
    /// * `Backend/Timeout` when the request timed out
    /// * `Backend/RateLimited` on HTTP 429
    /// * `Backend/Network` on connection failures and HTTP 502-504
    pub async fn execute_request(
        request_builder: RequestBuilder,
        backend: &str,
        method_name: &str,
        operation: &str,
    ) -> Result<(u16, String), OpsError> {
        log::debug!("[{backend}] {method_name} {operation}");

        let response = request_builder.send().await.map_err(|e| {
            let failure = if e.is_timeout() {
                BackendFailure::Timeout
            } else {
                BackendFailure::Network
            };
            OpsError::Backend {
                backend: backend.to_string(),
                failure,
                detail: e.to_string(),
            }
        })?;

        let status_code = response.status().as_u16();
        log::debug!("[{backend}] Response Status: {status_code}");

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        if status_code == 429 {
            log::warn!("[{backend}] Rate limited (HTTP 429), retry_after={retry_after:?}");
            return Err(OpsError::Backend {
                backend: backend.to_string(),
                failure: BackendFailure::RateLimited { retry_after },
                detail: response.text().await.unwrap_or_default(),
            });
        }

        if matches!(status_code, 502..=504) {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{backend}] Server error (HTTP {status_code})");
            return Err(OpsError::Backend {
                backend: backend.to_string(),
                failure: BackendFailure::Network,
                detail: format!("HTTP {status_code}: {}", truncate_for_log(&body)),
            });
        }

        let response_text = response.text().await.map_err(|e| OpsError::Backend {
            backend: backend.to_string(),
            failure: BackendFailure::Network,
            detail: format!("Failed to read response body: {e}"),
        })?;

        log::debug!(
            "[{backend}] Response Body: {}",
            truncate_for_log(&response_text)
        );

        Ok((status_code, response_text))
    }

    /// Parses a JSON body, logging a truncated copy on failure.
    pub fn parse_json<T>(response_text: &str, backend: &str) -> Result<T, OpsError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(response_text).map_err(|e| {
            log::error!("[{backend}] JSON parse failed: {e}");
            log::error!("[{backend}] Raw response: {}", truncate_for_log(response_text));
            OpsError::Backend {
                backend: backend.to_string(),
                failure: BackendFailure::Parse,
                detail: e.to_string(),
            }
        })
    }

    /// [`execute_request`](Self::execute_request) with retries.
    ///
    /// Only transient failures (network, timeout, rate limit) are retried,
    /// with exponential backoff starting at 100ms and capped at 10s. A
    /// `Retry-After` from the server takes precedence (capped at 30s).
    pub async fn execute_request_with_retry(
        request_builder: RequestBuilder,
        backend: &str,
        method_name: &str,
        operation: &str,
        max_retries: u32,
    ) -> Result<(u16, String), OpsError> {
        if max_retries == 0 {
            return Self::execute_request(request_builder, backend, method_name, operation).await;
        }

        let mut last_error = None;

        for attempt in 0..=max_retries {
            let Some(req) = request_builder.try_clone() else {
                log::warn!("[{backend}] Cannot clone request, disabling retry");
                return Self::execute_request(request_builder, backend, method_name, operation)
                    .await;
            };

            match Self::execute_request(req, backend, method_name, operation).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < max_retries && e.is_retryable() => {
                    let delay = retry_delay(&e, attempt);
                    log::warn!(
                        "[{}] Request failed (attempt {}/{}), retrying in {:.1}s: {}",
                        backend,
                        attempt + 1,
                        max_retries,
                        delay.as_secs_f32(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| OpsError::Backend {
            backend: backend.to_string(),
            failure: BackendFailure::Network,
            detail: "All retries exhausted with no error captured".to_string(),
        }))
    }
}

fn retry_delay(error: &OpsError, attempt: u32) -> Duration {
    if let OpsError::Backend {
        failure: BackendFailure::RateLimited {
            retry_after: Some(secs),
        },
        ..
    } = error
    {
        Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS))
    } else {
        backoff_delay(attempt)
    }
}

/// 100ms, 200ms, 400ms, ... capped at 10s.
fn backoff_delay(attempt: u32) -> Duration {
    let capped_attempt = attempt.min(20);
    let delay_ms = 100_u64.saturating_mul(1_u64 << capped_attempt);
    Duration::from_millis(delay_ms.min(10_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(failure: BackendFailure) -> OpsError {
        OpsError::Backend {
            backend: "test".into(),
            failure,
            detail: "err".into(),
        }
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn backoff_capped_at_10s() {
        assert_eq!(backoff_delay(7), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn retry_after_takes_precedence() {
        let e = failure(BackendFailure::RateLimited {
            retry_after: Some(3),
        });
        assert_eq!(retry_delay(&e, 5), Duration::from_secs(3));
        let e = failure(BackendFailure::RateLimited {
            retry_after: Some(600),
        });
        assert_eq!(retry_delay(&e, 0), Duration::from_secs(30));
    }

    #[test]
    fn network_errors_use_backoff() {
        assert_eq!(
            retry_delay(&failure(BackendFailure::Network), 2),
            Duration::from_millis(400)
        );
    }

    #[test]
    fn parse_json_invalid_is_parse_failure() {
        let result: Result<serde_json::Value, OpsError> = HttpUtils::parse_json("{oops", "test");
        assert!(
            matches!(
                &result,
                Err(OpsError::Backend {
                    failure: BackendFailure::Parse,
                    ..
                })
            ),
            "unexpected parse result: {result:?}"
        );
    }
}
