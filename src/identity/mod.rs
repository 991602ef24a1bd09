//! Identity provider client
//!
//! The sign-in handshake itself is delegated to an external identity
//! provider. This module describes that collaborator as a trait and
//! ships the Microsoft identity platform implementation.

mod claims;
mod microsoft;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

pub use claims::{ClientInfo, IdTokenClaims, decode_client_info, decode_id_token};
pub use microsoft::{MicrosoftIdentityClient, OIDC_SCOPES, ProviderMetadata};

/// How the provider delivers the authorization response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Query,
    Fragment,
    /// Auto-submitted HTML form posted to the redirect URI
    FormPost,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Query => "query",
            ResponseMode::Fragment => "fragment",
            ResponseMode::FormPost => "form_post",
        }
    }
}

/// Parameters for building an authorization URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationUrlRequest {
    pub response_mode: ResponseMode,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Opaque value echoed back by the provider
    pub state: String,
}

/// Parameters for redeeming an authorization code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeRequest {
    pub code: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Every field the provider posted back to the redirect URI
///
/// Kept verbatim so the provider client can inspect fields such as
/// `error` or `client_info` that the route handler does not care about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CallbackPayload(HashMap<String, String>);

impl CallbackPayload {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn code(&self) -> Option<&str> {
        self.get("code").filter(|code| !code.is_empty())
    }

    pub fn state(&self) -> Option<&str> {
        self.get("state")
    }

    /// Provider error code and description, if the sign-in was refused
    pub fn error(&self) -> Option<(&str, Option<&str>)> {
        self.get("error")
            .map(|error| (error, self.get("error_description")))
    }
}

impl<K, V> FromIterator<(K, V)> for CallbackPayload
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Provider-issued account identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// `uid.utid` from client info, stable across tenants
    pub home_account_id: String,
    /// Authority host that issued the account
    pub environment: String,
    pub tenant_id: String,
    pub username: String,
    /// Object id (or subject) within the tenant
    pub local_account_id: String,
    pub name: Option<String>,
}

/// Result of a successful code redemption
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub account: Account,
    pub id_token: String,
    pub access_token: String,
    /// Scopes the provider actually granted
    pub scopes: Vec<String>,
    pub expires_on: Option<DateTime<Utc>>,
}

/// External identity provider
///
/// Both calls may suspend on network I/O; neither retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the URL the browser is sent to for sign-in
    async fn authorization_url(&self, request: &AuthorizationUrlRequest) -> Result<Url>;

    /// Exchange an authorization code for an account and tokens
    ///
    /// # Errors
    /// `AuthenticationFailed` when the provider refuses the code or the
    /// payload carries a provider error; `HttpClient`/`IdentityProvider`
    /// when the provider cannot be reached or answers nonsense.
    async fn acquire_token_by_code(
        &self,
        request: &AuthorizationCodeRequest,
        payload: &CallbackPayload,
    ) -> Result<AuthenticationResult>;
}
