use std::net::TcpListener;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
// Alternatively, this can be oauth2::curl::http_client or a custom.
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, RedirectUrl, RefreshToken, RequestTokenError,
    TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::redirect::wait_for_redirect;
use super::{OauthClient, CALENDAR_READONLY};
use crate::auth::{Authorizer, Credential};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

fn default_auth_uri() -> String {
    AUTH_URL.to_owned()
}

fn default_token_uri() -> String {
    TOKEN_URL.to_owned()
}

/// The OAuth client identity from the `credentials.json` downloaded from Google Cloud Console.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| {
                anyhow!("client secrets must contain an \"installed\" or \"web\" section")
            })
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path).with_context(|| {
            format!(
                "failed to read client secrets from {} (download them from the Google Cloud Console)",
                path.display()
            )
        })?;
        Self::from_json(&json)
            .with_context(|| format!("invalid client secrets in {}", path.display()))
    }
}

pub struct GoogleOauthClient {
    inner: BasicClient,
    client_id: String,
    client_secret: Option<String>,
    token_uri: String,
}

impl GoogleOauthClient {
    pub fn new(
        client_id: &str,
        client_secret: Option<&str>,
        auth_url: &str,
        token_url: &str,
    ) -> anyhow::Result<Self> {
        let client = BasicClient::new(
            ClientId::new(client_id.to_owned()),
            client_secret.map(|s| ClientSecret::new(s.to_owned())),
            AuthUrl::new(auth_url.to_owned()).context("invalid authorization endpoint URL")?,
            Some(TokenUrl::new(token_url.to_owned()).context("invalid token endpoint URL")?),
        )
        .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            inner: client,
            client_id: client_id.to_owned(),
            client_secret: client_secret.map(str::to_owned),
            token_uri: token_url.to_owned(),
        })
    }

    pub fn from_secrets(secrets: &ClientSecrets) -> anyhow::Result<Self> {
        Self::new(
            &secrets.client_id,
            secrets.client_secret.as_deref(),
            &secrets.auth_uri,
            &secrets.token_uri,
        )
    }

    pub fn from_credential(credential: &Credential) -> anyhow::Result<Self> {
        Self::new(
            &credential.client_id,
            credential.client_secret.as_deref(),
            AUTH_URL,
            &credential.token_uri,
        )
    }

    pub async fn refresh_access_token(
        &self,
        credential: &Credential,
    ) -> anyhow::Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| anyhow!("credential has no refresh token"))?;

        let token = self
            .inner
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(token_error)
            .context("token endpoint rejected the refresh token")?;

        Ok(self.credential_from(&token, Some(refresh_token)))
    }

    /// Installed-app flow: open the consent page, catch the loopback redirect, and
    /// exchange the code for tokens.
    pub async fn get_authorization_code(&self) -> anyhow::Result<Credential> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let client = self.inner.clone().set_redirect_uri(loopback_redirect(port)?);

        let (authorize_url, csrf_state, pkce_code_verifier) =
            client.get_authorization_url(&[CALENDAR_READONLY], &[("access_type", "offline")]);

        println!("Please visit this URL to authorize this application: {authorize_url}");
        if let Err(err) = webbrowser::open(authorize_url.as_str()) {
            warn!(error = %err, "failed to open web browser");
        }

        let code =
            tokio::task::spawn_blocking(move || wait_for_redirect(listener, &csrf_state)).await??;
        info!("received authorization code");

        // Exchange the code with a token.
        let token = client
            .exchange_code(code)
            // Send the PKCE code verifier in the token request
            .set_pkce_verifier(pkce_code_verifier)
            .request_async(async_http_client)
            .await
            .map_err(token_error)
            .context("failed to exchange the authorization code")?;

        Ok(self.credential_from(&token, None))
    }

    fn credential_from(
        &self,
        token: &BasicTokenResponse,
        previous_refresh: Option<String>,
    ) -> Credential {
        let expiry = token
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        let scopes = token
            .scopes()
            .map(|scopes| scopes.iter().map(|s| (**s).clone()).collect())
            .unwrap_or_else(|| vec![CALENDAR_READONLY.to_owned()]);

        Credential {
            token: token.access_token().secret().to_owned(),
            refresh_token: token
                .refresh_token()
                .map(|t| t.secret().to_owned())
                .or(previous_refresh),
            token_uri: self.token_uri.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes,
            expiry,
        }
    }
}

// The listener binds IPv4 loopback, so the browser must not resolve `localhost` to `::1`.
fn loopback_redirect(port: u16) -> anyhow::Result<RedirectUrl> {
    RedirectUrl::new(format!("http://127.0.0.1:{port}/")).context("invalid redirect URL")
}

// The error response body is not part of the source chain, so spell it out.
fn token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> anyhow::Error
where
    RE: std::error::Error + Send + Sync + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => {
            anyhow!("token endpoint returned {response}")
        }
        other => anyhow::Error::new(other),
    }
}

/// Refreshes from the credential itself and reads the client secrets file only when the
/// user has to go through consent again.
pub struct GoogleAuthorizer {
    secrets_path: PathBuf,
}

impl GoogleAuthorizer {
    pub fn new(secrets_path: impl Into<PathBuf>) -> Self {
        Self {
            secrets_path: secrets_path.into(),
        }
    }
}

#[async_trait]
impl Authorizer for GoogleAuthorizer {
    async fn refresh(&self, credential: &Credential) -> anyhow::Result<Credential> {
        GoogleOauthClient::from_credential(credential)?
            .refresh_access_token(credential)
            .await
    }

    async fn authorize(&self) -> anyhow::Result<Credential> {
        let secrets = ClientSecrets::from_file(&self.secrets_path)?;
        GoogleOauthClient::from_secrets(&secrets)?
            .get_authorization_code()
            .await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn expired_credential(token_uri: String) -> Credential {
        Credential {
            token: "old-access".to_owned(),
            refresh_token: Some("long-lived".to_owned()),
            token_uri,
            client_id: "client-123".to_owned(),
            client_secret: Some("shh".to_owned()),
            scopes: vec![CALENDAR_READONLY.to_owned()],
            expiry: Some(Utc::now() - Duration::hours(1)),
        }
    }

    #[test]
    fn test_client_secrets_installed() {
        let secrets = ClientSecrets::from_json(
            r#"{"installed": {
                "client_id": "123.apps.googleusercontent.com",
                "project_id": "weektally",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "GOCSPX-secret",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )
        .unwrap();

        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret.as_deref(), Some("GOCSPX-secret"));
        assert_eq!(secrets.token_uri, TOKEN_URL);
    }

    #[test]
    fn test_client_secrets_web_with_defaults() {
        let secrets = ClientSecrets::from_json(r#"{"web": {"client_id": "abc"}}"#).unwrap();
        assert_eq!(secrets.client_id, "abc");
        assert_eq!(secrets.client_secret, None);
        assert_eq!(secrets.auth_uri, AUTH_URL);
        assert_eq!(secrets.token_uri, TOKEN_URL);
    }

    #[test]
    fn test_loopback_redirect_uses_ipv4_literal() {
        let redirect = loopback_redirect(8765).unwrap();
        assert_eq!(redirect.as_str(), "http://127.0.0.1:8765/");

        let url = redirect.url();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(8765));
    }

    #[test]
    fn test_client_secrets_without_section() {
        let err = ClientSecrets::from_json(r#"{"other": {}}"#).unwrap_err();
        assert!(err.to_string().contains("installed"));
    }

    #[test]
    fn test_missing_client_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientSecrets::from_file(&dir.path().join("credentials.json")).unwrap_err();
        assert!(err.to_string().contains("credentials.json"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=long-lived"))
            .and(body_string_contains("client_id=client-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "token_type": "Bearer",
                "expires_in": 3599,
                "scope": CALENDAR_READONLY,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = expired_credential(format!("{}/token", server.uri()));
        let refreshed = GoogleAuthorizer::new("unused.json")
            .refresh(&credential)
            .await
            .unwrap();

        assert_eq!(refreshed.token, "new-access");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("long-lived"));
        assert_eq!(refreshed.client_id, "client-123");
        assert_eq!(refreshed.scopes, vec![CALENDAR_READONLY.to_owned()]);
        assert!(refreshed.is_valid(Utc::now()));
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked.",
            })))
            .mount(&server)
            .await;

        let credential = expired_credential(format!("{}/token", server.uri()));
        let err = GoogleAuthorizer::new("unused.json")
            .refresh(&credential)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("invalid_grant"));
    }
}
