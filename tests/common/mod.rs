//! Common test utilities for E2E tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::header::{LOCATION, SET_COOKIE};
use signin_gate::error::{AppError, Result};
use signin_gate::identity::{
    Account, AuthenticationResult, AuthorizationCodeRequest, AuthorizationUrlRequest,
    CallbackPayload, IdentityProvider,
};
use signin_gate::{AppState, config};
use tokio::net::TcpListener;
use url::Url;

/// Authorization code the fake provider accepts
pub const VALID_CODE: &str = "valid-code";

/// Username the fake provider issues for [`VALID_CODE`]
pub const USERNAME: &str = "ada@example.com";

/// Authorization endpoint of the fake provider
pub const AUTHORIZE_ENDPOINT: &str = "https://login.example.test/consumers/oauth2/v2.0/authorize";

/// In-process identity provider
///
/// Accepts [`VALID_CODE`] (and `valid-code:<username>`) when the requested
/// scopes match the login scopes; anything else is rejected the way the
/// real provider rejects a bad grant.
#[derive(Default)]
pub struct FakeIdentityProvider {
    pub authorization_requests: Mutex<Vec<AuthorizationUrlRequest>>,
    pub redemptions: Mutex<Vec<(AuthorizationCodeRequest, CallbackPayload)>>,
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn authorization_url(&self, request: &AuthorizationUrlRequest) -> Result<Url> {
        self.authorization_requests
            .lock()
            .unwrap()
            .push(request.clone());

        let mut url = Url::parse(AUTHORIZE_ENDPOINT).unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", "test-client-id")
            .append_pair("response_mode", request.response_mode.as_str())
            .append_pair("redirect_uri", &request.redirect_uri)
            .append_pair("scope", &request.scopes.join(" "))
            .append_pair("state", &request.state);
        Ok(url)
    }

    async fn acquire_token_by_code(
        &self,
        request: &AuthorizationCodeRequest,
        payload: &CallbackPayload,
    ) -> Result<AuthenticationResult> {
        self.redemptions
            .lock()
            .unwrap()
            .push((request.clone(), payload.clone()));

        if let Some((error, _)) = payload.error() {
            return Err(AppError::AuthenticationFailed(error.to_string()));
        }
        if request.scopes != ["user.read"] {
            return Err(AppError::AuthenticationFailed("invalid_scope".to_string()));
        }

        let username = match request.code.as_str() {
            VALID_CODE => USERNAME.to_string(),
            code => match code.strip_prefix("valid-code:") {
                Some(username) => username.to_string(),
                None => {
                    return Err(AppError::AuthenticationFailed(
                        "invalid_grant: AADSTS70000".to_string(),
                    ));
                }
            },
        };

        Ok(AuthenticationResult {
            account: Account {
                home_account_id: "uid-1.tenant-1".to_string(),
                environment: "login.example.test".to_string(),
                tenant_id: "tenant-1".to_string(),
                username,
                local_account_id: "uid-1".to_string(),
                name: Some("Ada Lovelace".to_string()),
            },
            id_token: "eyJhbGciOiJub25lIn0.e30.".to_string(),
            access_token: "access-token".to_string(),
            scopes: vec!["User.Read".to_string()],
            expires_on: None,
        })
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub identity: Arc<FakeIdentityProvider>,
    /// Client that never follows redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            auth: config::AuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                cookie_secret: "test-cookie-secret-32-bytes-long!!".to_string(),
                authority: config::DEFAULT_AUTHORITY.to_string(),
                redirect_uri: config::DEFAULT_REDIRECT_URI.to_string(),
            },
        };

        let identity = Arc::new(FakeIdentityProvider::default());
        let state = AppState::with_identity(config, identity.clone());

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = signin_gate::build_router(state);

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            identity,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `path`, sending `cookie` if given
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// POST the provider callback form, sending `cookie` if given
    pub async fn post_callback(
        &self,
        form: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self.client.post(self.url("/redirect")).form(form);
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// Complete a sign-in that returns to `original_url`; returns the
    /// session cookie
    pub async fn sign_in(&self, original_url: &str) -> String {
        let state = encode_state(original_url);
        let response = self
            .post_callback(&[("code", VALID_CODE), ("state", &state)], None)
            .await;
        assert_eq!(response.status(), 302);
        session_cookie(&response).expect("sign-in sets the session cookie")
    }
}

/// Base64 JSON login state, as the login handler produces it
pub fn encode_state(original_url: &str) -> String {
    general_purpose::STANDARD.encode(serde_json::json!({ "originalUrl": original_url }).to_string())
}

/// `sid=...` pair from the response's Set-Cookie headers
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .find(|pair| pair.starts_with("sid="))
        .map(ToString::to_string)
}

/// Location header of a redirect response
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Value of `key` in the query string of `url` (absolute or path-relative)
pub fn query_value(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse("http://localhost").unwrap().join(url))
        .unwrap();
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
