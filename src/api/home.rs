//! Catch-all application page

use axum::response::Html;

use crate::auth::CurrentUser;

/// GET * (behind the auth gate)
///
/// Greets the signed-in user by the username stored in the session.
pub async fn greet(CurrentUser(session): CurrentUser) -> Html<String> {
    Html(format!(
        "Hello {}!",
        html_escape::encode_text(&session.user)
    ))
}
