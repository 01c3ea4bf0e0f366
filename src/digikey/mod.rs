pub mod browser;
pub mod error;
pub mod models;

use crate::auth::{AuthorizationCache, DigikeyAuthorization, OAuthClient, OAuthConfig, TokenStore};
use crate::cli::DigikeyConfig;
use async_trait::async_trait;
use browser::{BrowserLauncher, SystemBrowser};
use chrono::{DateTime, Utc};
use error::DigikeyError;
use models::{KeywordSearchRequest, KeywordSearchResponse, Product};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

/// Key under which the credential is saved in the token store
pub const PROVIDER_KEY: &str = "DigikeyApi";

/// Product fields requested from the keyword search
const INCLUDED_FIELDS: &[&str] = &[
    "DigiKeyPartNumber",
    "QuantityAvailable",
    "Manufacturer",
    "ManufacturerPartNumber",
    "PrimaryDatasheet",
    "PrimaryPhoto",
    "ProductDescription",
    "DetailedDescription",
    "MinimumOrderQuantity",
    "NonStock",
    "UnitPrice",
    "StandardPricing",
    "ProductStatus",
    "ProductUrl",
    "Category",
    "Family",
    "Parameters",
];

/// Part search backend used by the metadata lookup
#[async_trait]
pub trait PartSearchProvider: Send + Sync {
    async fn search(&self, part_number: &str) -> Result<Vec<Product>, DigikeyError>;
}

/// Snapshot of the authorization for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationStatus {
    pub configured: bool,
    pub authorized: bool,
    pub pending: bool,
    pub expires_utc: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// DigiKey Product Search client with OAuth authorization handling
pub struct DigikeyApi {
    config: DigikeyConfig,
    oauth: OAuthClient,
    token_store: TokenStore,
    authorization: AuthorizationCache,
    browser: Arc<dyn BrowserLauncher>,
    client: Client,
    authorization_timeout: Duration,
    /// Serializes browser authorization flows
    flow_lock: Mutex<()>,
}

impl DigikeyApi {
    pub fn new(config: DigikeyConfig, token_store: TokenStore) -> Result<Self, DigikeyError> {
        Self::with_browser(config, token_store, Arc::new(SystemBrowser))
    }

    pub fn with_browser(
        config: DigikeyConfig,
        token_store: TokenStore,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Result<Self, DigikeyError> {
        let oauth = OAuthClient::new(OAuthConfig::digikey(&config))?;
        let authorization_timeout = config.authorization_timeout();

        Ok(Self {
            config,
            oauth,
            token_store,
            authorization: AuthorizationCache::new(),
            browser,
            client: Client::new(),
            authorization_timeout,
            flow_lock: Mutex::new(()),
        })
    }

    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    /// Keyword search for a part number, authorizing first if needed
    pub async fn get_product_information(&self, part_number: &str) -> Result<Vec<Product>, DigikeyError> {
        let authorization = self
            .authorize()
            .await?
            .filter(|a| a.is_authorized())
            .ok_or_else(|| DigikeyError::Unauthorized("Unable to authenticate with DigiKey".to_string()))?;

        self.wrap_api_request(authorization, |auth| self.keyword_search(auth, part_number))
            .await
    }

    /// Run a request; on 401 refresh once and rerun, and if the refresh fails
    /// forget all credentials, authorize from scratch and rerun.
    async fn wrap_api_request<T, F, Fut>(
        &self,
        authorization: DigikeyAuthorization,
        request: F,
    ) -> Result<T, DigikeyError>
    where
        F: Fn(DigikeyAuthorization) -> Fut,
        Fut: Future<Output = Result<T, DigikeyError>>,
    {
        match request(authorization.clone()).await {
            Err(e) if e.is_unauthorized() => {
                info!("🔄 DigiKey rejected the access token, refreshing...");
            }
            other => return other,
        }

        if let Some(refreshed) = self.refresh_authorization(&authorization).await {
            return request(refreshed).await;
        }

        warn!("⚠️ Token refresh failed, restarting DigiKey authorization");
        self.forget_authentication_tokens()?;

        let fresh = self
            .authorize()
            .await?
            .filter(|a| a.is_authorized())
            .ok_or_else(|| DigikeyError::Unauthorized("Unable to re-authenticate with DigiKey".to_string()))?;

        request(fresh).await
    }

    /// Refresh grant; saves the new credential to memory and disk.
    /// `None` when there is no refresh token or the grant fails.
    async fn refresh_authorization(&self, authorization: &DigikeyAuthorization) -> Option<DigikeyAuthorization> {
        let refresh_token = authorization.refresh_token()?;

        let tokens = match self.oauth.refresh(refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("❌ Failed to refresh DigiKey token: {}", e);
                return None;
            }
        };

        let refreshed = DigikeyAuthorization {
            client_id: self.oauth.client_id().to_string(),
            access_token: Some(tokens.access_token),
            // Keep the old refresh token if the server did not rotate it
            refresh_token: tokens.refresh_token.or_else(|| authorization.refresh_token.clone()),
            created_utc: tokens.created_utc,
            expires_utc: Some(tokens.expires_utc),
            authorization_received: true,
            state: None,
            error: None,
        };

        if !refreshed.is_authorized() {
            warn!("⚠️ DigiKey refresh returned an unusable token");
            return None;
        }

        self.authorization.set(refreshed.clone());
        self.save_credential(&refreshed);
        info!("✅ DigiKey token refreshed");
        Some(refreshed)
    }

    /// Drop the in-memory authorization and the saved credential
    pub fn forget_authentication_tokens(&self) -> Result<(), DigikeyError> {
        self.authorization.clear();
        self.token_store
            .remove(PROVIDER_KEY)
            .map_err(|e| DigikeyError::StorageError(e.to_string()))
    }

    /// Memory, then disk, then the browser consent flow.
    /// `Ok(None)` when the callback did not arrive in time.
    pub async fn authorize(&self) -> Result<Option<DigikeyAuthorization>, DigikeyError> {
        if let Some(current) = self.authorization.current() {
            if current.is_authorized() {
                return Ok(Some(current));
            }
        }

        if let Some(credential) = self.token_store.get(PROVIDER_KEY) {
            let saved = DigikeyAuthorization::from_credential(self.oauth.client_id(), &credential);
            if saved.is_authorized() {
                debug!("Reusing saved DigiKey credential");
                self.authorization.set(saved.clone());
                return Ok(Some(saved));
            }

            info!("🔄 Saved DigiKey credential expired, refreshing...");
            if let Some(refreshed) = self.refresh_authorization(&saved).await {
                return Ok(Some(refreshed));
            }
            self.forget_authentication_tokens()?;
        }

        self.run_browser_flow().await
    }

    async fn run_browser_flow(&self) -> Result<Option<DigikeyAuthorization>, DigikeyError> {
        if !self.config.is_configured() {
            return Err(DigikeyError::ConfigError(
                "DigiKey client_id and client_secret must be configured".to_string(),
            ));
        }

        let _guard = self.flow_lock.lock().await;

        // Another flow may have finished while we waited for the lock
        if let Some(current) = self.authorization.current() {
            if current.is_authorized() {
                return Ok(Some(current));
            }
        }

        let (auth_url, state) = self.oauth.authorize_url();
        self.authorization
            .set(DigikeyAuthorization::pending(self.oauth.client_id(), Some(state)));

        info!("🌐 Opening DigiKey consent page");
        if let Err(e) = self.browser.open(auth_url.as_str()) {
            warn!("⚠️ Failed to launch browser: {}", e);
            info!("🔗 Open this URL to authorize DigiKey access: {}", auth_url);
        }

        match self.authorization.wait_for_received(self.authorization_timeout).await {
            Some(received) => {
                if received.is_authorized() {
                    info!("✅ DigiKey authorization received");
                } else {
                    warn!(
                        "❌ DigiKey authorization failed: {}",
                        received.error.as_deref().unwrap_or("no access token")
                    );
                }
                Ok(Some(received))
            }
            None => {
                warn!(
                    "⏱️ No DigiKey authorization within {}s",
                    self.authorization_timeout.as_secs()
                );
                self.authorization
                    .expire_pending("Timed out waiting for DigiKey authorization");
                Ok(None)
            }
        }
    }

    /// Handle the OAuth redirect: check state, exchange the code, publish and save
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: Option<&str>,
    ) -> Result<DigikeyAuthorization, DigikeyError> {
        self.verify_state(state)?;

        let tokens = match self.oauth.exchange_code(code).await {
            Ok(tokens) => tokens,
            Err(e) => {
                self.record_failure(&e.to_string());
                return Err(e.into());
            }
        };

        let authorization = DigikeyAuthorization {
            client_id: self.oauth.client_id().to_string(),
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
            created_utc: tokens.created_utc,
            expires_utc: Some(tokens.expires_utc),
            authorization_received: true,
            state: None,
            error: None,
        };

        self.save_credential(&authorization);
        self.authorization.set(authorization.clone());
        Ok(authorization)
    }

    /// Record a failed redirect (consent denied) so a waiting flow stops
    pub fn fail_authorization(&self, reason: &str, state: Option<&str>) -> Result<(), DigikeyError> {
        self.verify_state(state)?;
        self.record_failure(reason);
        Ok(())
    }

    fn record_failure(&self, reason: &str) {
        self.authorization
            .set(DigikeyAuthorization::failed(self.oauth.client_id(), reason));
    }

    /// A redirect must carry the CSRF state of the flow we started
    fn verify_state(&self, state: Option<&str>) -> Result<(), DigikeyError> {
        let Some(expected) = self.authorization.pending_state() else {
            warn!("⚠️ OAuth callback with no authorization in progress, ignoring");
            return Err(DigikeyError::Unauthorized(
                "No DigiKey authorization is in progress".to_string(),
            ));
        };
        if state != Some(expected.as_str()) {
            warn!("⚠️ OAuth callback state mismatch, ignoring");
            return Err(DigikeyError::Unauthorized("OAuth state mismatch".to_string()));
        }
        Ok(())
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        let current = self.authorization.current();
        let saved = self.token_store.get(PROVIDER_KEY);

        AuthorizationStatus {
            configured: self.config.is_configured(),
            authorized: current.as_ref().is_some_and(|a| a.is_authorized())
                || saved.as_ref().is_some_and(|c| !c.is_expired()),
            pending: self.authorization.is_waiting(),
            expires_utc: current
                .as_ref()
                .and_then(|a| a.expires_utc)
                .or_else(|| saved.as_ref().map(|c| c.date_expires_utc)),
            error: current.and_then(|a| a.error),
        }
    }

    fn save_credential(&self, authorization: &DigikeyAuthorization) {
        let Some(credential) = authorization.to_credential(PROVIDER_KEY) else {
            return;
        };
        if let Err(e) = self.token_store.save(credential) {
            error!("Failed to save DigiKey credential: {}", e);
        }
    }

    fn search_url(&self) -> Result<Url, DigikeyError> {
        let base = self.config.api_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/Search/v3/Products/Keyword", base))
            .map_err(|e| DigikeyError::ConfigError(format!("api_url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("Includes", &format!("Products({})", INCLUDED_FIELDS.join(",")));
        Ok(url)
    }

    fn create_request(&self, authorization: &DigikeyAuthorization, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("X-DIGIKEY-Client-Id", &authorization.client_id)
            .bearer_auth(authorization.access_token())
            .header("X-DIGIKEY-Locale-Site", &self.config.locale_site)
            .header("X-DIGIKEY-Locale-Language", &self.config.locale_language)
            .header("X-DIGIKEY-Locale-Currency", &self.config.locale_currency)
    }

    async fn keyword_search(
        &self,
        authorization: DigikeyAuthorization,
        part_number: &str,
    ) -> Result<Vec<Product>, DigikeyError> {
        let url = self.search_url()?;
        let body = KeywordSearchRequest {
            keywords: part_number.to_string(),
        };

        let response = self
            .create_request(&authorization, Method::POST, url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DigikeyError::Unauthorized("DigiKey rejected the access token".to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DigikeyError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let response_text = response.text().await?;
        debug!("DigiKey keyword search response: {}", response_text);

        let results: KeywordSearchResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse DigiKey response: {}", e);
            e
        })?;

        Ok(results.products)
    }
}

#[async_trait]
impl PartSearchProvider for DigikeyApi {
    async fn search(&self, part_number: &str) -> Result<Vec<Product>, DigikeyError> {
        self.get_product_information(part_number).await
    }
}
