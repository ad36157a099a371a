// src/errors/mapping.rs
//! Translation between typed errors and the plain field mappings used by
//! external control layers.
//!
//! A mapping looks like
//! `{"type": "http", "code": 403, "message": "Forbidden", "body": "nope"}`;
//! retry errors add `"retry-seconds"`.

use super::error::Error;
use super::http_error::{reason_phrase, HttpError, ProxyError};
use bytes::Bytes;
use hyper::StatusCode;
use serde_json::{json, Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Unsupported error type, expected an object")]
    UnsupportedType,

    #[error("Expected 'code' parameter")]
    MissingCode,

    #[error("Parameter 'code' should be integer")]
    CodeNotInteger,

    #[error("Parameter 'code' is not a valid HTTP status: {0}")]
    InvalidStatus(i64),

    #[error("Parameter 'message' should be a string")]
    MessageNotString,

    #[error("Expected 'body' parameter")]
    MissingBody,

    #[error("Failed to serialize body to json: {0}")]
    Body(#[from] serde_json::Error),

    #[error("Expected 'retry-seconds' parameter")]
    MissingRetrySeconds,

    #[error("Parameter 'retry-seconds' should be a non-negative integer")]
    RetrySecondsNotInteger,
}

/// Typed error → field mapping.
pub fn error_to_fields(err: &Error) -> Map<String, Value> {
    let value = match err {
        Error::Proxy(ProxyError::Retry(retry)) => {
            let text = reason_phrase(StatusCode::TOO_MANY_REQUESTS);
            json!({
                "type": "retry",
                "retry-seconds": retry.seconds(),
                "code": StatusCode::TOO_MANY_REQUESTS.as_u16(),
                "message": text,
                "body": text,
            })
        }
        Error::Proxy(ProxyError::Http(http)) => json!({
            "type": "http",
            "code": http.status().as_u16(),
            "message": http.message(),
            "body": http.body().map(body_to_value).unwrap_or(Value::Null),
        }),
        other => json!({
            "type": "internal",
            "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            "body": reason_phrase(StatusCode::INTERNAL_SERVER_ERROR),
            "message": other.to_string(),
        }),
    };

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Field mapping → typed error. Malformed input is rejected, never coerced.
pub fn error_from_fields(value: &Value) -> Result<ProxyError, MappingError> {
    let fields = value.as_object().ok_or(MappingError::UnsupportedType)?;

    let code = fields.get("code").ok_or(MappingError::MissingCode)?;
    let code = as_integer(code).ok_or(MappingError::CodeNotInteger)?;
    let status = u16::try_from(code)
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or(MappingError::InvalidStatus(code))?;

    let message = match fields.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(_) => return Err(MappingError::MessageNotString),
        None => reason_phrase(status).to_string(),
    };

    let body = match fields.get("body").ok_or(MappingError::MissingBody)? {
        Value::Null => None,
        body => Some(Bytes::from(serde_json::to_vec(body)?)),
    };

    if fields.get("type").and_then(Value::as_str) == Some("retry") {
        let seconds = fields
            .get("retry-seconds")
            .ok_or(MappingError::MissingRetrySeconds)?;
        let seconds = as_integer(seconds)
            .and_then(|s| u64::try_from(s).ok())
            .ok_or(MappingError::RetrySecondsNotInteger)?;
        return Ok(ProxyError::retry(seconds));
    }

    Ok(ProxyError::Http(HttpError::new(status, message, body)))
}

// Script layers hand numbers over as floats; accept those with no fractional part.
fn as_integer(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(number) => number,
        _ => return None,
    };
    if let Some(i) = number.as_i64() {
        return Some(i);
    }
    let f = number.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn body_to_value(body: &Bytes) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_http_mapping() {
        let err = error_from_fields(&json!({
            "code": 403,
            "message": "Forbidden",
            "body": "nope",
        }))
        .unwrap();

        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), "Forbidden");
        match err {
            ProxyError::Http(http) => assert_eq!(http.body().unwrap(), &Bytes::from_static(br#""nope""#)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn message_defaults_to_reason_phrase() {
        let err = error_from_fields(&json!({"code": 404.0, "body": {"a": 1}})).unwrap();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "Not Found");
    }

    #[test]
    fn rejects_malformed_mappings() {
        assert!(matches!(
            error_from_fields(&json!({"message": "x", "body": "x"})),
            Err(MappingError::MissingCode)
        ));
        assert!(matches!(
            error_from_fields(&json!({"code": 403})),
            Err(MappingError::MissingBody)
        ));
        assert!(matches!(
            error_from_fields(&json!({"code": 403.5, "body": "x"})),
            Err(MappingError::CodeNotInteger)
        ));
        assert!(matches!(
            error_from_fields(&json!({"code": "403", "body": "x"})),
            Err(MappingError::CodeNotInteger)
        ));
        assert!(matches!(
            error_from_fields(&json!({"code": 403, "message": 1, "body": "x"})),
            Err(MappingError::MessageNotString)
        ));
        assert!(matches!(
            error_from_fields(&json!({"code": 42, "body": "x"})),
            Err(MappingError::InvalidStatus(42))
        ));
        assert!(matches!(
            error_from_fields(&json!(["code", 403])),
            Err(MappingError::UnsupportedType)
        ));
    }

    #[test]
    fn retry_errors_translate_both_ways() {
        let fields = error_to_fields(&Error::from(ProxyError::retry(5)));
        assert_eq!(fields["type"], "retry");
        assert_eq!(fields["retry-seconds"], 5);
        assert_eq!(fields["code"], 429);

        let back = error_from_fields(&Value::Object(fields)).unwrap();
        assert_eq!(back, ProxyError::retry(5));
    }

    #[test]
    fn http_errors_translate_both_ways() {
        let expected = ProxyError::Http(HttpError::new(
            StatusCode::FORBIDDEN,
            "Go away",
            Some(Bytes::from_static(br#"{"reason":"nope"}"#)),
        ));
        let fields = error_to_fields(&Error::from(expected.clone()));
        assert_eq!(fields["body"]["reason"], "nope");

        assert_eq!(error_from_fields(&Value::Object(fields)).unwrap(), expected);

        let bare = ProxyError::from_status(StatusCode::BAD_GATEWAY);
        let fields = error_to_fields(&Error::from(bare.clone()));
        assert_eq!(error_from_fields(&Value::Object(fields)).unwrap(), bare);
    }

    #[test]
    fn other_errors_become_internal() {
        let fields = error_to_fields(&Error::NoAvailableEndpoints);
        assert_eq!(fields["type"], "internal");
        assert_eq!(fields["code"], 500);
        assert_eq!(fields["message"], "No available endpoints");
    }
}
