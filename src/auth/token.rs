use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access token obtained once the user completed the device flow.
///
/// `access_token` is never empty; an empty token from the backend means
/// "not issued yet" and never becomes a `Token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub obtained_at: DateTime<Utc>,
}

impl Token {
    pub fn new(access_token: impl Into<String>, obtained_at: DateTime<Utc>) -> Option<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return None;
        }
        Some(Self {
            access_token,
            obtained_at,
        })
    }
}

/// Body of the backend's token endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenResponse {
    pub fn into_token(self, obtained_at: DateTime<Utc>) -> Option<Token> {
        self.access_token
            .and_then(|value| Token::new(value, obtained_at))
    }
}
