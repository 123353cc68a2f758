//! Dropbox OAuth 2.0 endpoints (authorization code + PKCE, refresh grant).
//!
//! # Overview
//!
//! [`OAuthFlow`] is stateless: it builds the authorization URL and performs
//! the two token-endpoint calls. Verifier caching, persistence and state
//! tracking live in [`AuthManager`](crate::AuthManager).
//!
//! # Security
//!
//! - Only the S256 challenge appears in the authorization URL
//! - Codes, verifiers and tokens are never logged
//! - Requests are sent once; failures are not retried

use crate::error::{AuthError, Result};
use crate::types::{RefreshResponse, TokenResponse};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::{CoreConfig, Endpoints};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Client-side half of the Dropbox authorization flow.
pub struct OAuthFlow {
    app_key: String,
    redirect_uri: String,
    scope: Option<String>,
    endpoints: Endpoints,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlow {
    pub fn new(
        app_key: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: Option<String>,
        endpoints: Endpoints,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            redirect_uri: redirect_uri.into(),
            scope,
            endpoints,
            http_client,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.app_key.clone(),
            config.redirect_uri.clone(),
            config.auth_scope.clone(),
            config.endpoints.clone(),
            Arc::clone(&config.http_client),
        )
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Build the URL the user must visit to grant access.
    ///
    /// Query parameters are emitted in a fixed order; `scope` is appended
    /// last and only when configured.
    #[instrument(skip(self, challenge))]
    pub fn authorize_url(&self, challenge: &str) -> Result<String> {
        let mut url = Url::parse(&self.endpoints.authorize_url())
            .map_err(|e| AuthError::InvalidUrl(format!("Invalid authorize URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.app_key);
            query.append_pair("code_challenge", challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("disable_signup", "true");
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("token_access_type", "offline");
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
        }

        debug!("Built authorization URL");
        Ok(url.into())
    }

    /// Exchange an authorization code for a full token set.
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        let form = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", verifier),
            ("client_id", self.app_key.as_str()),
        ];

        debug!("Exchanging authorization code for tokens");
        let response = self.post_form(&form).await?;
        let token: TokenResponse = decode(&response, "token response")?;

        info!(expires_in = token.expires_in, "Exchanged code for tokens");
        Ok(token)
    }

    /// Obtain a new access token with a refresh token.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.app_key.as_str()),
        ];

        debug!("Refreshing access token");
        let response = self.post_form(&form).await?;
        let refreshed: RefreshResponse = decode(&response, "refresh response")?;

        info!(expires_in = refreshed.expires_in, "Refreshed access token");
        Ok(refreshed)
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<HttpResponse> {
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| AuthError::serialization("token request form", e))?;

        let request =
            HttpRequest::new(HttpMethod::Post, self.endpoints.token_url()).form(body);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(AuthError::from_transport)?;

        if !response.is_success() {
            warn!(
                status = response.status,
                body_len = response.body.len(),
                "Token endpoint rejected request"
            );
            return Err(AuthError::Response {
                status: response.status,
                body: response.body,
            });
        }

        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse, context: &str) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| AuthError::serialization(context, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn flow(http: MockHttpClient, scope: Option<&str>) -> OAuthFlow {
        OAuthFlow::new(
            "app-key",
            "db-app-key://oauth",
            scope.map(str::to_string),
            Endpoints::single_host("https://dropbox.test"),
            Arc::new(http),
        )
    }

    const TOKEN_BODY: &str = r#"{
        "access_token": "at",
        "token_type": "bearer",
        "expires_in": 14400,
        "refresh_token": "rt",
        "scope": "files.content.read",
        "uid": "7",
        "account_id": "dbid:7"
    }"#;

    #[test]
    fn test_authorize_url_parameter_order() {
        let url = flow(MockHttpClient::new(), None)
            .authorize_url("challenge")
            .unwrap();

        assert_eq!(
            url,
            "https://dropbox.test/oauth2/authorize?client_id=app-key&code_challenge=challenge\
             &code_challenge_method=S256&disable_signup=true\
             &redirect_uri=db-app-key%3A%2F%2Foauth&response_type=code&token_access_type=offline"
        );
    }

    #[test]
    fn test_authorize_url_appends_scope_last() {
        let url = flow(MockHttpClient::new(), Some("files.content.read account_info.read"))
            .authorize_url("c")
            .unwrap();

        assert!(url.ends_with("&token_access_type=offline&scope=files.content.read+account_info.read"));
    }

    #[tokio::test]
    async fn test_exchange_code_request_shape() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Post
                    && request.url == "https://dropbox.test/oauth2/token"
                    && request.headers.get("Content-Type").map(String::as_str)
                        == Some("application/x-www-form-urlencoded")
                    && request.body.as_deref()
                        == Some(
                            &b"code=the-code&grant_type=authorization_code\
                               &redirect_uri=db-app-key%3A%2F%2Foauth\
                               &code_verifier=the-verifier&client_id=app-key"[..],
                        )
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, TOKEN_BODY)));

        let token = flow(http, None)
            .exchange_code("the-code", "the-verifier")
            .await
            .unwrap();

        assert_eq!(token.access_token, "at");
        assert_eq!(token.expires_in, 14400);
    }

    #[tokio::test]
    async fn test_exchange_code_non_success_keeps_body() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(500, "Error!!!")));

        let error = flow(http, None).exchange_code("c", "v").await.unwrap_err();

        match error {
            AuthError::Response { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(&body[..], b"Error!!!");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_malformed_body() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token": "only"}"#)));

        let error = flow(http, None).exchange_code("c", "v").await.unwrap_err();
        assert!(matches!(error, AuthError::SerializationFailed { .. }));
    }

    #[tokio::test]
    async fn test_refresh_request_shape() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.body.as_deref()
                    == Some(&b"grant_type=refresh_token&refresh_token=rt&client_id=app-key"[..])
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"access_token": "at2", "token_type": "bearer", "expires_in": 60}"#,
                ))
            });

        let refreshed = flow(http, None).refresh("rt").await.unwrap();
        assert_eq!(refreshed.access_token, "at2");
        assert_eq!(refreshed.expires_in, 60);
    }

    #[tokio::test]
    async fn test_transport_failure_is_sent_once() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("connection reset".into())));

        let error = flow(http, None).refresh("rt").await.unwrap_err();
        assert!(matches!(error, AuthError::NetworkError(_)));
    }
}
