//! Uniform response envelope for every registry operation.

use serde::Serialize;
use warden_core::error::{ErrorKind, WardenError, WardenResult};

/// `{success: true, data}` or `{success: false, error, error_kind}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(err: &WardenError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

impl<T> From<WardenResult<T>> for Envelope<T> {
    fn from(result: WardenResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_omits_error_fields() {
        let envelope: Envelope<bool> = Ok(true).into();
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({"success": true, "data": true}));
    }

    #[test]
    fn failure_carries_message_and_kind() {
        let envelope: Envelope<bool> =
            Err(WardenError::conflict("membership", "already invited")).into();
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error_kind"], json!("conflict"));
        assert!(value["error"].as_str().unwrap().contains("already invited"));
        assert!(value.get("data").is_none());
    }
}
