//! Microsoft identity platform client
//!
//! Implements the confidential-client authorization code flow against a
//! v2.0 authority such as `https://login.microsoftonline.com/consumers/`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use super::{
    Account, AuthenticationResult, AuthorizationCodeRequest, AuthorizationUrlRequest,
    CallbackPayload, IdTokenClaims, IdentityProvider, decode_client_info, decode_id_token,
};
use crate::config::AuthConfig;
use crate::error::{AppError, Result};

/// Scopes the platform always adds to an interactive sign-in
pub const OIDC_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Subset of the authority's OpenID discovery document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub issuer: String,
}

/// Token endpoint success response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: Option<String>,
    scope: Option<String>,
    expires_in: Option<i64>,
    client_info: Option<String>,
}

/// Token endpoint error response
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Confidential client for the Microsoft identity platform
///
/// Authority metadata is discovered on first use and cached for the
/// lifetime of the client.
pub struct MicrosoftIdentityClient {
    http_client: reqwest::Client,
    authority: Url,
    client_id: String,
    client_secret: String,
    metadata: OnceCell<ProviderMetadata>,
}

impl MicrosoftIdentityClient {
    /// Create a client for the configured authority
    ///
    /// # Errors
    /// Returns a configuration error if the authority is not a valid URL
    pub fn new(config: &AuthConfig, http_client: reqwest::Client) -> Result<Self> {
        let mut authority = config.authority.clone();
        if !authority.ends_with('/') {
            authority.push('/');
        }
        let authority = Url::parse(&authority)
            .map_err(|e| AppError::Config(format!("auth.authority is not a valid URL: {e}")))?;

        Ok(Self {
            http_client,
            authority,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            metadata: OnceCell::new(),
        })
    }

    /// Seed the metadata cache, skipping discovery
    pub fn with_metadata(mut self, metadata: ProviderMetadata) -> Self {
        self.metadata = OnceCell::new_with(Some(metadata));
        self
    }

    /// Host name of the authority, used as the account environment
    pub fn environment(&self) -> &str {
        self.authority.host_str().unwrap_or_default()
    }

    async fn metadata(&self) -> Result<&ProviderMetadata> {
        self.metadata
            .get_or_try_init(|| async {
                let discovery_url = self
                    .authority
                    .join("v2.0/.well-known/openid-configuration")
                    .map_err(|e| AppError::Config(e.to_string()))?;

                tracing::debug!(url = %discovery_url, "Discovering authority metadata");

                let response = self
                    .http_client
                    .get(discovery_url)
                    .send()
                    .await?
                    .error_for_status()?;
                let metadata: ProviderMetadata = response.json().await?;

                tracing::info!(
                    issuer = %metadata.issuer,
                    "Authority metadata resolved"
                );
                Ok::<_, AppError>(metadata)
            })
            .await
    }

    fn build_account(&self, claims: IdTokenClaims, home_account_id: Option<String>) -> Result<Account> {
        let local_account_id = claims
            .oid
            .or(claims.sub)
            .ok_or_else(|| {
                AppError::IdentityProvider("id_token has neither oid nor sub".to_string())
            })?;
        let tenant_id = claims.tid.unwrap_or_default();
        let home_account_id =
            home_account_id.unwrap_or_else(|| format!("{}.{}", local_account_id, tenant_id));

        Ok(Account {
            home_account_id,
            environment: self.environment().to_string(),
            tenant_id,
            username: claims
                .preferred_username
                .or(claims.email)
                .unwrap_or_default(),
            local_account_id,
            name: claims.name,
        })
    }
}

/// Requested scopes plus the OIDC scopes, deduplicated case-insensitively
fn merged_scopes(requested: &[String]) -> String {
    let mut scopes: Vec<String> = Vec::with_capacity(requested.len() + OIDC_SCOPES.len());
    let candidates = requested
        .iter()
        .cloned()
        .chain(OIDC_SCOPES.iter().map(|s| s.to_string()));
    for scope in candidates {
        if !scopes.iter().any(|s| s.eq_ignore_ascii_case(&scope)) {
            scopes.push(scope);
        }
    }
    scopes.join(" ")
}

#[async_trait]
impl IdentityProvider for MicrosoftIdentityClient {
    async fn authorization_url(&self, request: &AuthorizationUrlRequest) -> Result<Url> {
        let metadata = self.metadata().await?;
        let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
            AppError::IdentityProvider(format!("invalid authorization_endpoint: {e}"))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("scope", &merged_scopes(&request.scopes))
                .append_pair("redirect_uri", &request.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("response_mode", request.response_mode.as_str())
                .append_pair("client_info", "1");
            if !request.state.is_empty() {
                query.append_pair("state", &request.state);
            }
        }

        Ok(url)
    }

    async fn acquire_token_by_code(
        &self,
        request: &AuthorizationCodeRequest,
        payload: &CallbackPayload,
    ) -> Result<AuthenticationResult> {
        if let Some((error, description)) = payload.error() {
            return Err(AppError::AuthenticationFailed(match description {
                Some(description) => format!("{error}: {description}"),
                None => error.to_string(),
            }));
        }

        let metadata = self.metadata().await?;
        let scope = merged_scopes(&request.scopes);
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", request.code.as_str()),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("client_info", "1"),
        ];

        let response = self
            .http_client
            .post(&metadata.token_endpoint)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(error) => AppError::AuthenticationFailed(match error.error_description {
                    Some(description) => format!("{}: {}", error.error, description),
                    None => error.error,
                }),
                Err(_) => AppError::IdentityProvider(format!(
                    "token endpoint returned {status}"
                )),
            });
        }

        let token: TokenResponse = response.json().await?;
        let id_token = token.id_token.ok_or_else(|| {
            AppError::IdentityProvider("token response did not include an id_token".to_string())
        })?;
        let claims = decode_id_token(&id_token)?;

        let home_account_id = match payload.get("client_info").or(token.client_info.as_deref()) {
            Some(raw) => Some(decode_client_info(raw)?.home_account_id()),
            None => None,
        };
        let account = self.build_account(claims, home_account_id)?;

        let scopes = token
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(ToOwned::to_owned)
            .collect();

        Ok(AuthenticationResult {
            account,
            id_token,
            access_token: token.access_token,
            scopes,
            expires_on: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }
}
