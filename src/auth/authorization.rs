//! In-process authorization slot shared by the API client and the OAuth
//! redirect handler.

use crate::auth::token_store::OAuthCredential;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::sync::watch;

/// Current state of the DigiKey authorization
#[derive(Debug, Clone)]
pub struct DigikeyAuthorization {
    pub client_id: String,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub created_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
    /// Set once the redirect callback arrived, whether it succeeded or not
    pub authorization_received: bool,
    /// CSRF state sent with the consent URL
    pub state: Option<String>,
    pub error: Option<String>,
}

impl DigikeyAuthorization {
    /// A pending authorization waiting for the redirect callback
    pub fn pending(client_id: impl Into<String>, state: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: None,
            refresh_token: None,
            created_utc: Utc::now(),
            expires_utc: None,
            authorization_received: false,
            state,
            error: None,
        }
    }

    /// A failed callback (consent denied, exchange failed)
    pub fn failed(client_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            authorization_received: true,
            error: Some(error.into()),
            ..Self::pending(client_id, None)
        }
    }

    pub fn from_credential(client_id: impl Into<String>, credential: &OAuthCredential) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: Some(credential.access_token.clone()),
            refresh_token: Some(credential.refresh_token.clone()),
            created_utc: credential.date_created_utc,
            expires_utc: Some(credential.date_expires_utc),
            authorization_received: true,
            state: None,
            error: None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        let has_token = self
            .access_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty());
        let not_expired = self.expires_utc.map_or(true, |exp| Utc::now() < exp);
        has_token && not_expired
    }

    pub fn access_token(&self) -> &str {
        self.access_token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .unwrap_or_default()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.is_empty())
    }

    /// Persistable form; `None` unless authorized
    pub fn to_credential(&self, provider: &str) -> Option<OAuthCredential> {
        if !self.is_authorized() {
            return None;
        }
        Some(OAuthCredential {
            provider: provider.to_string(),
            access_token: self.access_token.clone()?,
            refresh_token: self
                .refresh_token
                .clone()
                .unwrap_or_else(|| SecretString::new(String::new())),
            date_created_utc: self.created_utc,
            date_expires_utc: self.expires_utc.unwrap_or_else(|| self.created_utc + chrono::Duration::hours(1)),
        })
    }
}

/// Single cached authorization guarded by a watch channel so the flow can
/// wait for the callback without polling.
#[derive(Debug)]
pub struct AuthorizationCache {
    slot: watch::Sender<Option<DigikeyAuthorization>>,
}

impl Default for AuthorizationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationCache {
    pub fn new() -> Self {
        let (slot, _rx) = watch::channel(None);
        Self { slot }
    }

    pub fn current(&self) -> Option<DigikeyAuthorization> {
        self.slot.borrow().clone()
    }

    pub fn set(&self, authorization: DigikeyAuthorization) {
        self.slot.send_replace(Some(authorization));
    }

    pub fn clear(&self) {
        self.slot.send_replace(None);
    }

    /// The pending authorization's CSRF state, if a flow is in progress
    pub fn pending_state(&self) -> Option<String> {
        self.slot
            .borrow()
            .as_ref()
            .filter(|a| !a.authorization_received)
            .and_then(|a| a.state.clone())
    }

    /// True while a flow is waiting on its callback and has not timed out
    pub fn is_waiting(&self) -> bool {
        self.slot
            .borrow()
            .as_ref()
            .is_some_and(|a| !a.authorization_received && a.error.is_none())
    }

    /// Mark the pending flow as abandoned. The CSRF state is kept so a late
    /// callback for the same flow is still accepted.
    pub fn expire_pending(&self, reason: &str) {
        self.slot.send_if_modified(|slot| match slot {
            Some(pending) if !pending.authorization_received && pending.error.is_none() => {
                pending.error = Some(reason.to_string());
                true
            }
            _ => false,
        });
    }

    /// Wait until a callback has been recorded, or give up after `timeout`.
    pub async fn wait_for_received(&self, timeout: Duration) -> Option<DigikeyAuthorization> {
        let mut rx = self.slot.subscribe();
        let wait = rx.wait_for(|slot| slot.as_ref().is_some_and(|a| a.authorization_received));

        let received = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(auth)) => auth.clone(),
            Ok(Err(_)) | Err(_) => None,
        };
        received
    }
}
