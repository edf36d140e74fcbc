// src/models/events.rs
//! Locally recorded activity waiting to be reconciled with the authority.
//!
//! Both records are immutable once created and only leave the device through
//! a confirmed batch upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one scan at this device.
///
/// The authority stores scans as references to a previously uploaded
/// credential (by `jti`), so scans are always uploaded after credentials.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub jti: String,
    pub verified: bool,
    pub scanned_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(jti: impl Into<String>, verified: bool, scanned_at: DateTime<Utc>) -> Self {
        Self {
            jti: jti.into(),
            verified,
            scanned_at,
        }
    }
}

/// A credential seen at this device, kept in its raw compact form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingCredential {
    pub raw_token: String,
    pub scanned_at: DateTime<Utc>,
}

impl PendingCredential {
    pub fn new(raw_token: impl Into<String>, scanned_at: DateTime<Utc>) -> Self {
        Self {
            raw_token: raw_token.into(),
            scanned_at,
        }
    }
}

/// Batch upload acknowledgement returned by the authority.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchAck {
    /// Number of items the authority stored
    pub uploaded: usize,
    /// Number of items the authority received
    pub total: usize,
}

impl BatchAck {
    /// A batch is confirmed only when every submitted item was stored.
    pub fn confirms(&self, submitted: usize) -> bool {
        self.uploaded >= submitted && self.uploaded >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_event_wire_format() {
        let at = DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let value = serde_json::to_value(ScanEvent::new("c1", true, at)).unwrap();

        assert_eq!(value["jti"], "c1");
        assert_eq!(value["verified"], true);
        assert!(value.get("scannedAt").is_some());
    }

    #[test]
    fn test_partial_ack_does_not_confirm() {
        assert!(BatchAck { uploaded: 2, total: 2 }.confirms(2));
        assert!(!BatchAck { uploaded: 1, total: 2 }.confirms(2));
        // The authority saw fewer items than were sent
        assert!(!BatchAck { uploaded: 1, total: 1 }.confirms(2));
    }
}
