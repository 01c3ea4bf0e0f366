use crate::cli::DigikeyConfig;
use chrono::{DateTime, Utc};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthType, AuthUrl, AuthorizationCode,
    ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken, TokenResponse, TokenUrl,
};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 1800;

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Invalid OAuth configuration: {0}")]
    Config(String),

    #[error("Token request failed: {0}")]
    TokenRequest(String),
}

/// OAuth endpoints and client credentials
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn digikey(config: &DigikeyConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            redirect_url: config.redirect_url.clone(),
            scopes: Vec::new(),
        }
    }
}

/// Tokens returned by the token endpoint
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub created_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
}

/// Authorization-code flow client
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: BasicClient,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, OAuthError> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| OAuthError::Config(format!("auth_url: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| OAuthError::Config(format!("token_url: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| OAuthError::Config(format!("redirect_url: {}", e)))?;

        // DigiKey expects client credentials in the form body
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url);

        Ok(Self { config, client })
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Consent page URL and the CSRF state it carries
    pub fn authorize_url(&self) -> (Url, String) {
        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.config.scopes {
            request = request.add_scope(oauth2::Scope::new(scope.clone()));
        }
        let (url, csrf) = request.url();
        (url, csrf.secret().clone())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, OAuthError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.trim().to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| OAuthError::TokenRequest(describe_token_error(&e)))?;

        Ok(to_token_set(&response))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OAuthError> {
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| OAuthError::TokenRequest(describe_token_error(&e)))?;

        Ok(to_token_set(&response))
    }
}

fn to_token_set(response: &oauth2::basic::BasicTokenResponse) -> TokenSet {
    let created_utc = Utc::now();
    let lifetime = response
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

    TokenSet {
        access_token: SecretString::new(response.access_token().secret().clone()),
        refresh_token: response
            .refresh_token()
            .map(|t| SecretString::new(t.secret().clone())),
        created_utc,
        expires_utc: created_utc + lifetime,
    }
}

fn describe_token_error<RE, T>(err: &oauth2::RequestTokenError<RE, T>) -> String
where
    RE: std::error::Error + 'static,
    T: oauth2::ErrorResponse + 'static,
{
    match err {
        oauth2::RequestTokenError::ServerResponse(resp) => format!("server response: {:?}", resp),
        oauth2::RequestTokenError::Request(e) => format!("request: {}", e),
        oauth2::RequestTokenError::Parse(e, _) => format!("parse: {}", e),
        oauth2::RequestTokenError::Other(msg) => msg.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn config(token_url: String) -> OAuthConfig {
        OAuthConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            auth_url: "https://sandbox-api.digikey.com/v1/oauth2/authorize".to_string(),
            token_url,
            redirect_url: "http://127.0.0.1:8090/Authorization/Authorize".to_string(),
            scopes: Vec::new(),
        }
    }

    #[test]
    fn test_authorize_url_carries_client_and_state() {
        let client = OAuthClient::new(config("https://example.com/token".to_string())).unwrap();
        let (url, state) = client.authorize_url();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(pairs.get("state"), Some(&state));
        assert_eq!(
            pairs.get("redirect_uri").map(String::as_str),
            Some("http://127.0.0.1:8090/Authorization/Authorize")
        );
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let result = OAuthClient::new(config("not a url".to_string()));
        assert!(matches!(result, Err(OAuthError::Config(_))));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/oauth2/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                mockito::Matcher::UrlEncoded("code".into(), "abc".into()),
                mockito::Matcher::UrlEncoded("client_id".into(), "client-1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at-1","refresh_token":"rt-1","expires_in":1799,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(config(format!("{}/v1/oauth2/token", server.url()))).unwrap();
        let tokens = client.exchange_code("abc").await.unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.access_token.expose_secret(), "at-1");
        assert_eq!(tokens.refresh_token.unwrap().expose_secret(), "rt-1");
        assert!(tokens.expires_utc > tokens.created_utc);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/oauth2/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(config(format!("{}/v1/oauth2/token", server.url()))).unwrap();
        let result = client.refresh("stale").await;
        assert!(matches!(result, Err(OAuthError::TokenRequest(_))));
    }
}
