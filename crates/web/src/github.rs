//! GitHub OAuth client.
//!
//! Sign-in uses the OAuth web flow: redirect to [`GitHubClient::authorize_url`],
//! exchange the returned code for an access token, then read the account and
//! its primary email address with that token.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use screencast_core::{Email, GitHubUserId};

use crate::config::GitHubConfig;

/// Scopes requested during authorization.
const OAUTH_SCOPE: &str = "user:email";

/// Errors that can occur when talking to GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The OAuth code exchange was refused.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// The account has no verified primary email.
    #[error("no verified primary email on GitHub account")]
    NoPrimaryEmail,

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// An OAuth access token.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// A GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: GitHubUserId,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// An account together with the token that read it.
#[derive(Debug, Clone)]
pub struct GitHubUserEnvelope {
    pub access_token: AccessToken,
    pub user: GitHubUser,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Body of a code exchange. GitHub answers 200 even when it refuses the code.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Token(AccessToken),
    Error {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

/// GitHub OAuth and REST client.
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    api_base: String,
    oauth_base: String,
}

impl GitHubClient {
    /// Create a new GitHub client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        // GitHub rejects requests without a user agent
        headers.insert(USER_AGENT, HeaderValue::from_static("screencast-web"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            oauth_base: config.oauth_base.trim_end_matches('/').to_string(),
        })
    }

    /// URL to send the browser to for authorization.
    ///
    /// `callback` is the absolute URL GitHub redirects back to with `?code=`;
    /// `state` is echoed back unchanged and must be checked on return.
    #[must_use]
    pub fn authorize_url(&self, callback: &str, state: &str) -> String {
        format!(
            "{}/login/oauth/authorize?client_id={}&redirect_uri={}&scope={}&state={}",
            self.oauth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(callback),
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `GitHubError::OAuth` if GitHub refuses the code.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, GitHubError> {
        let url = format!("{}/login/oauth/access_token", self.oauth_base);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("code", code),
            ])
            .send()
            .await?;

        match read_json::<TokenResponse>(response).await? {
            TokenResponse::Token(token) => Ok(token),
            TokenResponse::Error {
                error,
                error_description,
            } => Err(GitHubError::OAuth(error_description.unwrap_or(error))),
        }
    }

    /// Fetch the account the token belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self, token))]
    pub async fn fetch_user(&self, token: &AccessToken) -> Result<GitHubUser, GitHubError> {
        let response = self
            .client
            .get(format!("{}/user", self.api_base))
            .header("Authorization", format!("token {}", token.access_token))
            .send()
            .await?;
        read_json(response).await
    }

    /// Fetch the account's verified primary email address.
    ///
    /// # Errors
    ///
    /// Returns `GitHubError::NoPrimaryEmail` if none is verified and primary.
    #[instrument(skip(self, token))]
    pub async fn fetch_primary_email(&self, token: &AccessToken) -> Result<Email, GitHubError> {
        let response = self
            .client
            .get(format!("{}/user/emails", self.api_base))
            .header("Authorization", format!("token {}", token.access_token))
            .send()
            .await?;
        let emails: Vec<GitHubEmail> = read_json(response).await?;
        primary_email(&emails)
    }

    /// Exchange a code and read the account in one go.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub async fn authenticate(
        &self,
        code: &str,
    ) -> Result<(GitHubUserEnvelope, Email), GitHubError> {
        let access_token = self.exchange_code(code).await?;
        let user = self.fetch_user(&access_token).await?;
        let email = self.fetch_primary_email(&access_token).await?;
        Ok((GitHubUserEnvelope { access_token, user }, email))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GitHubError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GitHubError::Api {
            status: status.as_u16(),
            message,
        });
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| GitHubError::Parse(e.to_string()))
}

fn primary_email(emails: &[GitHubEmail]) -> Result<Email, GitHubError> {
    let found = emails
        .iter()
        .find(|e| e.primary && e.verified)
        .ok_or(GitHubError::NoPrimaryEmail)?;
    Email::parse(&found.email).map_err(|e| GitHubError::Parse(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_authorize_url_encodes_callback() {
        let client = GitHubClient::new(&test_config().github).unwrap();
        let url = client.authorize_url("http://localhost:8080/github-auth?redirect=/account", "abc");
        assert!(url.starts_with("https://github.com/login/oauth/authorize?client_id=gh-client-id"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fgithub-auth%3Fredirect%3D%2Faccount"
        ));
        assert!(url.ends_with("scope=user%3Aemail&state=abc"));
    }

    #[test]
    fn test_primary_email_requires_verified_primary() {
        let emails: Vec<GitHubEmail> = serde_json::from_str(
            r#"[
                {"email": "old@example.com", "primary": false, "verified": true},
                {"email": "blob@example.com", "primary": true, "verified": true}
            ]"#,
        )
        .unwrap();
        assert_eq!(primary_email(&emails).unwrap().as_str(), "blob@example.com");

        let unverified: Vec<GitHubEmail> = serde_json::from_str(
            r#"[{"email": "blob@example.com", "primary": true, "verified": false}]"#,
        )
        .unwrap();
        assert!(matches!(
            primary_email(&unverified),
            Err(GitHubError::NoPrimaryEmail)
        ));
    }

    #[test]
    fn test_token_response_variants() {
        let ok: TokenResponse = serde_json::from_str(r#"{"access_token":"gho_abc"}"#).unwrap();
        assert!(matches!(ok, TokenResponse::Token(t) if t.access_token == "gho_abc"));

        let err: TokenResponse = serde_json::from_str(
            r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#,
        )
        .unwrap();
        assert!(matches!(err, TokenResponse::Error { .. }));
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken {
            access_token: "gho_secret".into(),
        };
        assert!(!format!("{token:?}").contains("gho_secret"));
    }

    #[test]
    fn test_github_user_decodes_numeric_id() {
        let user: GitHubUser =
            serde_json::from_str(r#"{"id": 1, "login": "blob", "name": null}"#).unwrap();
        assert_eq!(user.id.as_i64(), 1);
        assert_eq!(user.name, None);
    }
}
