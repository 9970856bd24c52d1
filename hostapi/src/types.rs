//! Records that cross the host bridge.
//!
//! These are the typed forms of what the guest sees as raw strings: the
//! decoded request, the response envelope, the read notification and the
//! mount descriptor. Configuration for the HTTP transport lives here too so
//! that transports outside the sandbox crate can share it.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::StatusCode;

/// Header attached to every outgoing request. Not configurable.
pub const CONTENT_TYPE_HEADER: (&str, &str) = ("content-type", "application/json");

/// Virtual path under which the host directory is exposed.
pub const MOUNT_POINT: &str = "/axolotl";

/// Command tag of the read-receipt notification.
pub const READ_NOTIFICATION_CMD: &str = "rr";

/// A request decoded from guest memory. Built per call, dropped after the
/// blocking request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
    /// Upper-cased HTTP method.
    pub method: String,
    pub body: String,
}

impl RequestDescriptor {
    /// Build a descriptor, normalizing the method to upper case.
    ///
    /// Returns `None` if the method is empty or contains characters that
    /// cannot appear in an HTTP token (RFC 9110 `tchar`).
    pub fn new(url: impl Into<String>, method: &str, body: impl Into<String>) -> Option<Self> {
        let method = method.trim();
        if method.is_empty() || !method.bytes().all(is_token_char) {
            return None;
        }
        Some(Self {
            url: url.into(),
            method: method.to_ascii_uppercase(),
            body: body.into(),
        })
    }

    /// The fixed headers sent with every request.
    pub fn headers(&self) -> [(&'static str, &'static str); 1] {
        [CONTENT_TYPE_HEADER]
    }
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Result of a bridged request: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// HTTP status, or a negative `StatusCode` when no response was obtained.
    pub status_code: i32,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: i32::from(status_code),
            body: body.into(),
        }
    }

    /// Envelope for a request that never produced a response.
    pub fn network_failure() -> Self {
        Self {
            status_code: StatusCode::NetworkFailure.as_i32(),
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// The read-receipt command the guest sends to its peers.
///
/// Serializes as `{"cmd":"rr","rr_time":"<ISO-8601>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadNotification {
    pub cmd: &'static str,
    pub rr_time: String,
}

impl ReadNotification {
    /// Notification stamped with the current instant.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Notification stamped with `instant`: UTC, millisecond precision,
    /// `Z` designator.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            cmd: READ_NOTIFICATION_CMD,
            rr_time: instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Compact JSON encoding.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Host directory bound at a virtual mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDescriptor {
    pub host_root: PathBuf,
    pub mount_point: &'static str,
}

impl MountDescriptor {
    pub fn new(host_root: impl Into<PathBuf>) -> Self {
        Self {
            host_root: host_root.into(),
            mount_point: MOUNT_POINT,
        }
    }
}

/// Settings for the blocking HTTP transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpConfig {
    /// Whole-request timeout. `None` blocks until the network stack gives up.
    pub timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_method_normalized() {
        let req = RequestDescriptor::new("http://host/api", "post", "{}").unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.headers(), [("content-type", "application/json")]);
    }

    #[test]
    fn test_request_rejects_bad_method() {
        assert!(RequestDescriptor::new("http://host", "", "").is_none());
        assert!(RequestDescriptor::new("http://host", "GE T", "").is_none());
        assert!(RequestDescriptor::new("http://host", "GET\r\n", "").is_some());
        assert!(RequestDescriptor::new("http://host", "GET(", "").is_none());
        assert!(RequestDescriptor::new("http://host", "PÖST", "").is_none());
    }

    #[test]
    fn test_request_accepts_extension_methods() {
        for method in ["M-SEARCH", "x_sync.v2", "PROPFIND", "BIND~1"] {
            let req = RequestDescriptor::new("http://host", method, "").unwrap();
            assert_eq!(req.method, method.to_ascii_uppercase());
        }
    }

    #[test]
    fn test_envelope_success_range() {
        assert!(ResponseEnvelope::new(200, "ok").is_success());
        assert!(ResponseEnvelope::new(204, "").is_success());
        assert!(!ResponseEnvelope::new(404, "").is_success());
        let failed = ResponseEnvelope::network_failure();
        assert!(!failed.is_success());
        assert_eq!(failed.status_code, -1);
        assert!(failed.body.is_empty());
    }

    #[test]
    fn test_notification_encoding() {
        let instant = Utc.with_ymd_and_hms(2016, 3, 4, 5, 6, 7).unwrap();
        let note = ReadNotification::at(instant);
        assert_eq!(
            note.to_json().unwrap(),
            r#"{"cmd":"rr","rr_time":"2016-03-04T05:06:07.000Z"}"#
        );
    }

    #[test]
    fn test_notification_timestamp_parses_back() {
        let note = ReadNotification::now();
        let parsed = DateTime::parse_from_rfc3339(&note.rr_time).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert!(note.rr_time.ends_with('Z'));
    }

    #[test]
    fn test_notifications_one_second_apart_differ() {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = first + chrono::Duration::seconds(1);
        assert_ne!(
            ReadNotification::at(first).rr_time,
            ReadNotification::at(second).rr_time
        );
    }

    #[test]
    fn test_mount_descriptor_fixed_point() {
        let desc = MountDescriptor::new("/srv/data");
        assert_eq!(desc.mount_point, "/axolotl");
        assert_eq!(desc.host_root, PathBuf::from("/srv/data"));
    }
}
