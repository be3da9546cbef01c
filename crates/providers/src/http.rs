//! HTTP plumbing shared by the hosted providers: client construction and
//! status classification into [`CompletionError`].

use askdesk_core::CompletionError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tracing::warn;

/// Longest slice of an error body kept in a `Transient` message.
const MAX_ERROR_BODY: usize = 512;

/// Build a client with a whole-request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Map a transport-level failure (connect, timeout, body read).
pub(crate) fn network_error(provider: &str, err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        warn!(provider, "Provider request timed out");
        CompletionError::Transient("request timed out".into())
    } else {
        warn!(provider, error = %err, "Provider request failed");
        CompletionError::Transient(format!("network error: {err}"))
    }
}

/// Classify a non-success response.
///
/// - 429, or a body reporting `RESOURCE_EXHAUSTED` → `QuotaExceeded`
/// - 401 / 403, or a body reporting `API_KEY_INVALID` → `Unauthorized`
/// - anything else → `Transient`
pub(crate) fn classify_status(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> CompletionError {
    warn!(provider, status = status.as_u16(), body = %truncate(body), "Provider returned error");

    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        let retry_after_secs = retry_after(headers).or_else(|| body_retry_delay(body));
        return CompletionError::QuotaExceeded { retry_after_secs };
    }

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || body.contains("API_KEY_INVALID")
    {
        return CompletionError::Unauthorized(format!("HTTP {}", status.as_u16()));
    }

    CompletionError::Transient(format!("HTTP {}: {}", status.as_u16(), truncate(body)))
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Gemini reports its hint inside the error body as
/// `error.details[].retryDelay = "27s"`.
fn body_retry_delay(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/details")?
        .as_array()?
        .iter()
        .filter_map(|d| d.get("retryDelay").and_then(|v| v.as_str()))
        .find_map(|delay| {
            let secs = delay.trim().strip_suffix('s')?;
            secs.parse::<f64>().ok().map(|s| s.ceil() as u64)
        })
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn too_many_requests_is_quota() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        let err = classify_status("test", StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert_eq!(
            err,
            CompletionError::QuotaExceeded {
                retry_after_secs: Some(12)
            }
        );
    }

    #[test]
    fn resource_exhausted_body_is_quota_with_delay() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","details":[
            {"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"26.5s"}]}}"#;
        let err = classify_status("gemini", StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), body);
        assert_eq!(
            err,
            CompletionError::QuotaExceeded {
                retry_after_secs: Some(27)
            }
        );
    }

    #[test]
    fn auth_statuses_are_unauthorized() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = classify_status("test", status, &HeaderMap::new(), "nope");
            assert!(matches!(err, CompletionError::Unauthorized(_)));
        }

        let body = r#"{"error":{"code":400,"details":[{"reason":"API_KEY_INVALID"}]}}"#;
        let err = classify_status("gemini", StatusCode::BAD_REQUEST, &HeaderMap::new(), body);
        assert!(matches!(err, CompletionError::Unauthorized(_)));
    }

    #[test]
    fn everything_else_is_transient() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = classify_status("test", status, &HeaderMap::new(), "oops");
            assert!(matches!(err, CompletionError::Transient(_)), "{status}");
        }
    }

    #[test]
    fn http_date_retry_after_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY * 3);
        let CompletionError::Transient(msg) =
            classify_status("test", StatusCode::BAD_GATEWAY, &HeaderMap::new(), &body)
        else {
            panic!("expected transient");
        };
        assert!(msg.len() < MAX_ERROR_BODY + 32);
    }
}
