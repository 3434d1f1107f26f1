//! Token set model and the rules for folding token endpoint responses into it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Safety margin before expiry within which a token is treated as expired.
pub const REFRESH_BUFFER_SECS: u64 = eventcast_config::DEFAULT_REFRESH_BUFFER_SECS;

/// The persisted credential set for the authenticated user.
///
/// Serialized as `{access_token, refresh_token?, scope, token_type, expiry_date}`
/// with `expiry_date` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiry_date: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Success body of the token endpoint, for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenSet {
    /// Build a token set from a fresh authorization-code exchange.
    ///
    /// `requested_scope` stands in when the provider does not echo the scope.
    pub fn from_response(response: TokenResponse, requested_scope: &str, now: DateTime<Utc>) -> Self {
        Self {
            expiry_date: expiry_from(response.expires_in, now),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            scope: response.scope.unwrap_or_else(|| requested_scope.to_string()),
            token_type: response.token_type.unwrap_or_else(default_token_type),
        }
    }

    /// Fold a refresh-grant response into this token set.
    ///
    /// Precedence: every value in `response` wins. `refresh_token`, `scope`
    /// and `token_type` fall back to the current value when the response
    /// omits them, so a refresh never loses the stored refresh token.
    pub fn merge_refresh(&self, response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            expiry_date: expiry_from(response.expires_in, now),
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .filter(|t| !t.is_empty())
                .or_else(|| self.refresh_token.clone()),
            scope: response.scope.unwrap_or_else(|| self.scope.clone()),
            token_type: response
                .token_type
                .unwrap_or_else(|| self.token_type.clone()),
        }
    }

    /// Time left before `expiry_date`; negative once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expiry_date - now
    }

    /// Whether the token is inside `buffer` of its expiry (or past it).
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.remaining(now) < buffer
    }
}

fn expiry_from(expires_in: Option<u64>, now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    now + Duration::seconds(secs.min(i32::MAX as u64) as i64)
}
