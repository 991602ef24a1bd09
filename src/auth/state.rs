//! Login state round-tripped through the identity provider
//!
//! The provider echoes `state` back untouched, so it carries the URL the
//! user originally asked for. It is not signed: a forged value can only
//! choose a redirect target, and only local paths are honoured.

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Where to land after the default post-login redirect
pub const DEFAULT_LANDING_PATH: &str = "/";

/// Context preserved across one login round trip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    #[serde(rename = "originalUrl", default)]
    pub original_url: Option<String>,
}

impl LoginState {
    pub fn new(original_url: Option<String>) -> Self {
        Self { original_url }
    }

    /// Base64 (standard alphabet, padded) of the JSON form
    pub fn encode(&self) -> Result<String, AppError> {
        let json = serde_json::to_vec(self).map_err(|e| AppError::Internal(e.into()))?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    /// Decode a state value, accepting either base64 alphabet with or
    /// without padding. Returns `None` for anything malformed.
    pub fn decode(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();

        let bytes = general_purpose::STANDARD_NO_PAD.decode(normalized).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Post-login redirect target
    ///
    /// Falls back to [`DEFAULT_LANDING_PATH`] when no URL was recorded or the
    /// recorded one points off-site.
    pub fn redirect_target(&self) -> &str {
        match self.original_url.as_deref() {
            Some(url) if is_local_path(url) => url,
            Some("") | None => DEFAULT_LANDING_PATH,
            Some(url) => {
                tracing::warn!(original_url = %url, "Ignoring non-local post-login redirect");
                DEFAULT_LANDING_PATH
            }
        }
    }
}

/// Resolve the redirect target for a raw `state` value
pub fn redirect_target_for(raw_state: Option<&str>) -> String {
    match raw_state.and_then(LoginState::decode) {
        Some(state) => state.redirect_target().to_string(),
        None => {
            tracing::debug!("Login state missing or malformed; using default landing path");
            DEFAULT_LANDING_PATH.to_string()
        }
    }
}

/// Whether `url` is a same-origin absolute path that is safe to place in a
/// `Location` header.
pub fn is_local_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.starts_with("/\\")
        && url.chars().all(|c| c.is_ascii_graphic())
}
