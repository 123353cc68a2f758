use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials for one authorized Dropbox account.
///
/// Persisted as JSON (camelCase keys) in the secure store. A refresh replaces
/// `access_token`, `token_type` and `expires_at`; the remaining fields are
/// kept from the original exchange.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug` implementation
/// redacts sensitive information.
///
/// # Examples
///
/// ```
/// use core_auth::Credentials;
/// use chrono::{Duration, Utc};
///
/// let credentials = Credentials {
///     access_token: "sl.B...".to_string(),
///     token_type: "bearer".to_string(),
///     expires_at: Utc::now() + Duration::hours(4),
///     refresh_token: "rt...".to_string(),
///     scope: "files.content.read".to_string(),
///     uid: "12345".to_string(),
///     account_id: "dbid:AAH...".to_string(),
/// };
///
/// assert!(!credentials.is_expired(Utc::now()));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// The access token used for API requests
    pub access_token: String,
    /// Scheme for the `Authorization` header, usually `bearer`
    pub token_type: String,
    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,
    /// The refresh token used to obtain new access tokens
    pub refresh_token: String,
    pub scope: String,
    pub uid: String,
    pub account_id: String,
}

impl Credentials {
    /// `true` once `now` has reached the expiry instant.
    ///
    /// There is no early-refresh buffer: a token expiring exactly at `now`
    /// counts as expired, one second later does not.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Get the time remaining until token expiration
    ///
    /// Returns `None` if the token is already expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_expired(now) {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("uid", &self.uid)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Body of a successful authorization-code exchange.
///
/// Dropbox answers in snake_case; camelCase spellings are accepted too.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "tokenType")]
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(alias = "expiresIn")]
    pub expires_in: i64,
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
    pub scope: String,
    pub uid: String,
    #[serde(alias = "accountId")]
    pub account_id: String,
}

impl TokenResponse {
    /// Build the credential record, anchoring the expiry at `now`.
    pub fn into_credentials(self, now: DateTime<Utc>) -> Result<Credentials> {
        Ok(Credentials {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_at: expiry(now, self.expires_in)?,
            refresh_token: self.refresh_token,
            scope: self.scope,
            uid: self.uid,
            account_id: self.account_id,
        })
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("uid", &self.uid)
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

/// Body of a successful refresh-token grant.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "tokenType")]
    pub token_type: String,
    #[serde(alias = "expiresIn")]
    pub expires_in: i64,
}

impl RefreshResponse {
    /// Replace the short-lived parts of `credentials`.
    ///
    /// Leaves `credentials` untouched when `expires_in` is unusable.
    pub fn apply_to(&self, credentials: &mut Credentials, now: DateTime<Utc>) -> Result<()> {
        let expires_at = expiry(now, self.expires_in)?;
        credentials.access_token = self.access_token.clone();
        credentials.token_type = self.token_type.clone();
        credentials.expires_at = expires_at;
        Ok(())
    }
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// `now + expires_in`, rejecting negative lifetimes and instants chrono
/// cannot represent.
fn expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>> {
    if expires_in < 0 {
        return Err(AuthError::InvalidExpiry(expires_in));
    }

    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or(AuthError::InvalidExpiry(expires_in))
}

/// Where the authorization flow currently stands.
///
/// # State Transitions
///
/// ```text
/// SignedOut -> PendingRedirect -> SignedIn
///     ^             |                |
///     +-------------+----------------+
/// ```
///
/// # Examples
///
/// ```
/// use core_auth::AuthState;
///
/// let state = AuthState::SignedOut;
/// assert!(!state.is_authenticated());
///
/// let state = AuthState::SignedIn;
/// assert!(state.is_authenticated());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    /// No stored credentials and no pending flow
    #[default]
    SignedOut,
    /// A verifier is cached and the redirect has not arrived yet
    PendingRedirect,
    /// Credentials are stored
    SignedIn,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, AuthState::PendingRedirect)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::SignedOut => write!(f, "Signed Out"),
            AuthState::PendingRedirect => write!(f, "Waiting for redirect..."),
            AuthState::SignedIn => write!(f, "Signed In"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(expires_at: DateTime<Utc>) -> Credentials {
        Credentials {
            access_token: "access".to_string(),
            token_type: "bearer".to_string(),
            expires_at,
            refresh_token: "refresh".to_string(),
            scope: "files.metadata.read".to_string(),
            uid: "42".to_string(),
            account_id: "dbid:abc".to_string(),
        }
    }

    #[test]
    fn test_credentials_expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert!(sample(now).is_expired(now));
        assert!(sample(now - Duration::seconds(1)).is_expired(now));
        assert!(!sample(now + Duration::seconds(1)).is_expired(now));
    }

    #[test]
    fn test_credentials_time_until_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let credentials = sample(now + Duration::minutes(10));
        assert_eq!(
            credentials.time_until_expiry(now),
            Some(Duration::minutes(10))
        );
        assert_eq!(sample(now).time_until_expiry(now), None);
    }

    #[test]
    fn test_credentials_serialize_camel_case() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(sample(now)).unwrap();

        assert_eq!(json["accessToken"], "access");
        assert_eq!(json["tokenType"], "bearer");
        assert_eq!(json["refreshToken"], "refresh");
        assert_eq!(json["accountId"], "dbid:abc");
        assert!(json.get("expiresAt").is_some());

        let back: Credentials = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample(now));
    }

    #[test]
    fn test_credentials_debug_redacts_tokens() {
        let debug = format!("{:?}", sample(Utc::now()));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("\"access\""));
        assert!(!debug.contains("\"refresh\""));
    }

    #[test]
    fn test_token_response_accepts_mixed_casing() {
        let body = r#"{
            "access_token": "at",
            "token_type": "bearer",
            "expiresIn": 14400,
            "refresh_token": "rt",
            "scope": "account_info.read",
            "uid": "1",
            "accountId": "dbid:1"
        }"#;
        let response: TokenResponse = serde_json::from_str(body).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let credentials = response.into_credentials(now).unwrap();

        assert_eq!(credentials.access_token, "at");
        assert_eq!(credentials.account_id, "dbid:1");
        assert_eq!(credentials.expires_at, now + Duration::seconds(14400));
    }

    #[test]
    fn test_token_response_requires_every_field() {
        let body = r#"{"access_token": "at", "token_type": "bearer", "expires_in": 10}"#;
        assert!(serde_json::from_str::<TokenResponse>(body).is_err());
    }

    #[test]
    fn test_refresh_response_keeps_long_lived_fields() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut credentials = sample(now - Duration::hours(1));
        let refresh: RefreshResponse = serde_json::from_str(
            r#"{"access_token": "new", "token_type": "Bearer", "expires_in": 3600}"#,
        )
        .unwrap();

        refresh.apply_to(&mut credentials, now).unwrap();

        assert_eq!(credentials.access_token, "new");
        assert_eq!(credentials.token_type, "Bearer");
        assert_eq!(credentials.expires_at, now + Duration::hours(1));
        assert_eq!(credentials.refresh_token, "refresh");
        assert_eq!(credentials.uid, "42");
    }

    #[test]
    fn test_out_of_range_lifetime_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let body = r#"{
            "access_token": "at",
            "token_type": "bearer",
            "expires_in": 9223372036854775807,
            "refresh_token": "rt",
            "scope": "",
            "uid": "1",
            "account_id": "dbid:1"
        }"#;
        let response: TokenResponse = serde_json::from_str(body).unwrap();

        assert!(matches!(
            response.into_credentials(now),
            Err(AuthError::InvalidExpiry(i64::MAX))
        ));

        let mut credentials = sample(now);
        for expires_in in [-1, i64::MAX / 1000] {
            let refresh = RefreshResponse {
                access_token: "new".to_string(),
                token_type: "bearer".to_string(),
                expires_in,
            };
            assert!(matches!(
                refresh.apply_to(&mut credentials, now),
                Err(AuthError::InvalidExpiry(_))
            ));
        }
        assert_eq!(credentials, sample(now));
    }

    #[test]
    fn test_auth_state_helpers() {
        assert!(!AuthState::SignedOut.is_authenticated());
        assert!(AuthState::PendingRedirect.is_in_progress());
        assert!(AuthState::SignedIn.is_authenticated());
        assert_eq!(AuthState::default(), AuthState::SignedOut);
        assert_eq!(format!("{}", AuthState::SignedIn), "Signed In");
    }
}
