//! Bridge between the session cookie and the core session store.

use axum_extra::extract::CookieJar;
use rapc_core::session::Session;

use super::cookies::{SESSION_COOKIE, clear_session_cookie, session_cookie};
use crate::AppState;

/// Open the session named by the request's cookie, or a fresh one.
pub async fn open(state: &AppState, jar: &CookieJar) -> Session {
    let id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    state.sessions.load(id.as_deref()).await
}

/// Reflect the session's state in the response cookies.
///
/// A destroyed session clears the cookie; a persisted one refreshes it; a
/// session that was never written leaves the jar untouched.
pub fn attach(jar: CookieJar, session: &Session, state: &AppState) -> CookieJar {
    let secure = state.config.cookie_secure;
    if session.is_destroyed() {
        jar.add(clear_session_cookie(secure))
    } else if session.is_persisted() {
        jar.add(session_cookie(
            session.id(),
            state.config.session_max_age_secs,
            secure,
        ))
    } else {
        jar
    }
}
