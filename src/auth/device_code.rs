use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest expiry honored for a device code (one day).
pub const MAX_EXPIRES_IN_SECS: u64 = 24 * 60 * 60;

/// Device code issued by the backend for the user to enter on another device.
///
/// # Example
/// ```
/// use devicelink::auth::DeviceCode;
/// use chrono::Utc;
///
/// let code = DeviceCode {
///     code: "ABCD-EFGH".to_string(),
///     verification_url: "https://trakt.tv/activate".to_string(),
///     expires_in_secs: 600,
///     issued_at: Utc::now(),
/// };
/// assert!(code.remaining(Utc::now()) > std::time::Duration::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCode {
    pub code: String,
    pub verification_url: String,
    pub expires_in_secs: u64,
    pub issued_at: DateTime<Utc>,
}

impl DeviceCode {
    /// Expiry window, capped at [`MAX_EXPIRES_IN_SECS`].
    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in_secs.min(MAX_EXPIRES_IN_SECS))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.expires_in())
            .ok()
            .and_then(|window| self.issued_at.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Time left before the code expires, saturating at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at() - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Body of the backend's device-code endpoint.
///
/// An empty `code` means the backend has not obtained one from the provider yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceCodeResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub verification_url: String,
    #[serde(default)]
    pub expires_in: u64,
}

impl DeviceCodeResponse {
    pub fn is_issued(&self) -> bool {
        !self.code.is_empty()
    }

    /// Convert an issued response into a [`DeviceCode`] stamped at `issued_at`.
    pub fn into_device_code(self, issued_at: DateTime<Utc>) -> Option<DeviceCode> {
        if !self.is_issued() {
            return None;
        }
        Some(DeviceCode {
            code: self.code,
            verification_url: self.verification_url,
            expires_in_secs: self.expires_in.min(MAX_EXPIRES_IN_SECS),
            issued_at,
        })
    }
}
