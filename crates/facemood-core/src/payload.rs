//! The single status record printed per invocation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format of the `time` field.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const MSG_IMAGE_NOT_FOUND: &str = "Image file not found";
pub const MSG_STORE_NOT_FOUND: &str = "Encoding file not found";
pub const MSG_IMAGE_DECODE: &str = "Failed to load image";
pub const MSG_NO_FACE: &str = "No face detected in the image";
pub const MSG_NOT_RECOGNIZED: &str = "Face not recognized with sufficient accuracy";

/// Used only if serialization itself fails.
const FALLBACK_JSON: &str =
    r#"{"status":"error","message":"Failed to serialize result","name":null,"emotion":null,"time":null}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Status payload consumed by the application shell.
///
/// Every field is serialized, unset ones as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub status: Status,
    pub message: Option<String>,
    pub name: Option<String>,
    pub emotion: Option<String>,
    pub time: Option<String>,
}

impl ResultPayload {
    pub fn new(
        status: Status,
        message: Option<String>,
        name: Option<String>,
        emotion: Option<String>,
        time: Option<String>,
    ) -> Self {
        Self { status, message, name, emotion, time }
    }

    pub fn success(name: impl Into<String>, emotion: impl Into<String>, time: NaiveDateTime) -> Self {
        Self::new(
            Status::Success,
            None,
            Some(name.into()),
            Some(emotion.into()),
            Some(time.format(TIME_FORMAT).to_string()),
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, Some(message.into()), None, None, None)
    }

    /// Recognized, but the emotion could not be determined.
    pub fn emotion_undetected(name: &str) -> Self {
        Self::error(format!("Hey {name}, your emotion is not detected. Please try again."))
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Compact JSON with keys in declaration order.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize result payload");
            FALLBACK_JSON.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_error_payload_has_all_keys() {
        let json = ResultPayload::error(MSG_IMAGE_NOT_FOUND).to_json();
        assert_eq!(
            json,
            r#"{"status":"error","message":"Image file not found","name":null,"emotion":null,"time":null}"#
        );
    }

    #[test]
    fn test_success_payload() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 3)
            .unwrap();
        let payload = ResultPayload::success("alice", "happy", time);
        assert!(payload.is_success());
        assert_eq!(
            payload.to_json(),
            r#"{"status":"success","message":null,"name":"alice","emotion":"happy","time":"2024-03-09 07:05:03"}"#
        );
    }

    #[test]
    fn test_emotion_undetected_message() {
        let payload = ResultPayload::emotion_undetected("bob");
        assert_eq!(payload.status, Status::Error);
        assert_eq!(
            payload.message.as_deref(),
            Some("Hey bob, your emotion is not detected. Please try again.")
        );
        assert!(payload.name.is_none());
    }

    #[test]
    fn test_fallback_is_valid_payload() {
        let parsed: ResultPayload = serde_json::from_str(FALLBACK_JSON).unwrap();
        assert_eq!(parsed.status, Status::Error);
    }
}
