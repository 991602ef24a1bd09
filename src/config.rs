//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (SIGNIN_GATE__*)
//! 4. The flat `CLIENT_ID`, `CLIENT_SECRET` and `COOKIE_SECRET` variables

use serde::Deserialize;

/// Default identity-provider authority (Microsoft personal accounts)
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/consumers/";

/// Default callback URI registered with the identity provider
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/redirect";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub host: String,
    /// Port number (default: 8080)
    pub port: u16,
}

/// Identity provider and session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Application (client) id registered with the provider
    pub client_id: String,
    /// Client secret registered with the provider
    pub client_secret: String,
    /// Secret used to sign the session cookie (32+ bytes)
    pub cookie_secret: String,
    /// Authority base URL, with trailing slash
    pub authority: String,
    /// Callback URI the provider posts the authorization code to
    pub redirect_uri: String,
}

impl AuthConfig {
    /// Whether the session cookie should carry the `Secure` attribute
    ///
    /// Follows the scheme of the callback URI: a plain-http callback means
    /// the browser never sees this server over TLS.
    pub fn use_secure_cookies(&self) -> bool {
        url::Url::parse(&self.redirect_uri)
            .map(|url| url.scheme().eq_ignore_ascii_case("https"))
            .unwrap_or(false)
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SIGNIN_GATE__*)
    /// 5. `CLIENT_ID`, `CLIENT_SECRET`, `COOKIE_SECRET`
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("auth.authority", DEFAULT_AUTHORITY)?
            .set_default("auth.redirect_uri", DEFAULT_REDIRECT_URI)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SIGNIN_GATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("auth.client_id", std::env::var("CLIENT_ID").ok())?
            .set_override_option("auth.client_secret", std::env::var("CLIENT_SECRET").ok())?
            .set_override_option("auth.cookie_secret", std::env::var("COOKIE_SECRET").ok())?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Check invariants that deserialization cannot express
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        const MIN_COOKIE_SECRET_BYTES: usize = 32;

        if self.auth.client_id.trim().is_empty() {
            return Err(AppError::Config("auth.client_id must not be empty".to_string()));
        }

        if self.auth.client_secret.trim().is_empty() {
            return Err(AppError::Config(
                "auth.client_secret must not be empty".to_string(),
            ));
        }

        if self.auth.cookie_secret.len() < MIN_COOKIE_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.cookie_secret must be at least {} bytes",
                MIN_COOKIE_SECRET_BYTES
            )));
        }

        let authority = url::Url::parse(&self.auth.authority)
            .map_err(|e| AppError::Config(format!("auth.authority is not a valid URL: {e}")))?;
        if authority.scheme() != "https" {
            return Err(AppError::Config(
                "auth.authority must use https".to_string(),
            ));
        }

        url::Url::parse(&self.auth.redirect_uri)
            .map_err(|e| AppError::Config(format!("auth.redirect_uri is not a valid URL: {e}")))?;

        if !self.auth.use_secure_cookies() {
            tracing::warn!(
                redirect_uri = %self.auth.redirect_uri,
                "Using insecure session cookies for local development"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            auth: AuthConfig {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                cookie_secret: "x".repeat(32),
                authority: DEFAULT_AUTHORITY.to_string(),
                redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults_with_credentials() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert!(!config.auth.use_secure_cookies());
    }

    #[test]
    fn validate_rejects_short_cookie_secret() {
        let mut config = valid_config();
        config.auth.cookie_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("cookie secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.cookie_secret")
        ));
    }

    #[test]
    fn validate_rejects_missing_client_credentials() {
        let mut config = valid_config();
        config.auth.client_id = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.auth.client_secret = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_plain_http_authority() {
        let mut config = valid_config();
        config.auth.authority = "http://login.example.com/common/".to_string();

        let error = config.validate().expect_err("authority must be https");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("https")
        ));
    }

    #[test]
    fn secure_cookies_follow_redirect_uri_scheme() {
        let mut config = valid_config();
        config.auth.redirect_uri = "https://app.example.com/redirect".to_string();
        assert!(config.auth.use_secure_cookies());
    }
}
