//! Session management
//!
//! Session records live server-side in the `tower-sessions` store; the
//! browser only holds a signed cookie carrying the session id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tower_sessions::Session;
use tower_sessions::cookie::Key;

use crate::error::AppError;
use crate::identity::{Account, AuthenticationResult};

/// Session key the authentication record is stored under
pub const SESSION_KEY: &str = "auth";

/// Name of the session cookie
pub const SESSION_COOKIE_NAME: &str = "sid";

/// Authentication record of one browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub authenticated: bool,
    pub account: Account,
    pub id_token: String,
    /// Copy of `account.username` for display
    pub user: String,
    pub authenticated_at: DateTime<Utc>,
}

impl From<AuthenticationResult> for AuthSession {
    fn from(result: AuthenticationResult) -> Self {
        Self {
            authenticated: true,
            user: result.account.username.clone(),
            account: result.account,
            id_token: result.id_token,
            authenticated_at: Utc::now(),
        }
    }
}

/// Read the authentication record, if any
///
/// A store failure or a record of the wrong shape reads as "no session":
/// the caller will send the user through login again.
pub async fn load(session: &Session) -> Option<AuthSession> {
    match session.get::<AuthSession>(SESSION_KEY).await {
        Ok(record) => record,
        Err(error) => {
            tracing::warn!(%error, "Unreadable session record; treating as anonymous");
            None
        }
    }
}

/// Replace whatever the session held with a fresh authenticated record
///
/// The session id is rotated so an id planted before login is useless
/// afterwards.
pub async fn establish(session: &Session, record: &AuthSession) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.clear().await;
    session.insert(SESSION_KEY, record).await?;
    Ok(())
}

/// Destroy the session. Destroying an absent session is a no-op.
pub async fn destroy(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

/// Derive the 64-byte cookie signing key from the configured secret
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}
