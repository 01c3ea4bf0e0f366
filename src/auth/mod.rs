pub mod authorization;
pub mod oauth;
pub mod token_store;

pub use authorization::{AuthorizationCache, DigikeyAuthorization};
pub use oauth::{OAuthClient, OAuthConfig, OAuthError, TokenSet};
pub use token_store::{OAuthCredential, TokenStore};
