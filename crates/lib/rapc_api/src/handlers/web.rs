//! Browser pages backed by the server-side session.
//!
//! Pages are plain HTML with a little inline script that calls the JSON API;
//! the session cookie carries the identity between requests.

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Form};
use axum_extra::extract::CookieJar;
use rapc_core::auth::AuthError;
use rapc_core::models::payload::ValidateResetTokenPayload;
use rapc_core::session::{self, FlashError, FlashInfo, Session};
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::TokenSessionForm;
use crate::services;

const HOME: &str = "/dashboard";

const SCRIPT: &str = r#"<script>
async function sendJson(method, url, body) {
  const res = await fetch(url, {
    method,
    credentials: "same-origin",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(body),
  });
  const json = await res.json().catch(() => ({}));
  return [res.ok, json];
}
function showMessage(json) {
  const lines = json.errors || [json.message || json.success || ""];
  document.getElementById("message").textContent = lines.join("\n");
}
function submitToken(token) {
  const form = document.getElementById("token-form");
  form.token.value = token;
  form.submit();
}
function field(name) {
  return document.querySelector("[name=" + name + "]").value;
}
</script>"#;

const TOKEN_FORM: &str = r#"<form id="token-form" method="post" action="/submit-token-session" hidden>
<input type="hidden" name="token">
</form>"#;

const LOGIN_BODY: &str = r#"<h1>Sign in</h1>
<form onsubmit="event.preventDefault(); login();">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<label><input type="checkbox" name="rememberMe"> Remember me</label>
<button type="submit">Sign in</button>
</form>
<p><a href="/forgot-password">Forgot password?</a></p>
<script>
async function login() {
  const [ok, json] = await sendJson("POST", "/api/login", {
    email: field("email"),
    password: field("password"),
    rememberMe: document.querySelector("[name=rememberMe]").checked,
  });
  if (ok) submitToken(json.token); else showMessage(json);
}
</script>"#;

const GUEST_BUTTON: &str = r#"<p><button onclick="guest()">Continue as guest</button></p>
<script>
async function guest() {
  const [ok, json] = await sendJson("POST", "/api/guest-login", {});
  if (ok) submitToken(json.token); else showMessage(json);
}
</script>"#;

const RENEW_BODY: &str = r#"<h1>Choose a new password</h1>
<form onsubmit="event.preventDefault(); renew();">
<label>New password <input type="password" name="password" required></label>
<label>Confirm <input type="password" name="confirmPassword" required></label>
<button type="submit">Save</button>
</form>
<script>
async function renew() {
  const [ok, json] = await sendJson("PUT", "/api/renew-password", {
    password: field("password"),
    confirmPassword: field("confirmPassword"),
  });
  if (ok) window.location = "/dashboard"; else showMessage(json);
}
</script>"#;

const FORGOT_BODY: &str = r#"<h1>Forgot password</h1>
<form onsubmit="event.preventDefault(); requestReset();">
<label>Email <input type="email" name="email" required></label>
<button type="submit">Send reset link</button>
</form>
<p><a href="/login">Back to sign in</a></p>
<script>
async function requestReset() {
  const [, json] = await sendJson("POST", "/api/request-reset", { email: field("email") });
  showMessage(json);
}
</script>"#;

const RESET_SCRIPT: &str = r#"<script>
async function resetPassword() {
  const [ok, json] = await sendJson("POST", "/api/reset-password", {
    email: field("email"),
    token: field("token"),
    password: field("password"),
    confirmPassword: field("confirmPassword"),
  });
  if (ok) submitToken(json.token); else showMessage(json);
}
</script>"#;

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, flash: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{} | Rap-C</title></head>\n\
         <body>\n{SCRIPT}\n<div id=\"message\" role=\"status\">{flash}</div>\n{body}\n{TOKEN_FORM}\n</body></html>",
        escape_html(title),
    ))
}

/// Consume the flash error and info messages as HTML.
async fn take_flash(session: &mut Session) -> AppResult<String> {
    let mut lines = Vec::new();
    if let Some(error) = session::take_error(session).await? {
        lines.push(format!(
            "<p class=\"error\" data-code=\"{}\">{}</p>",
            escape_html(&error.code),
            escape_html(&error.message)
        ));
    }
    if let Some(info) = session::take_info(session).await? {
        for message in info.messages() {
            lines.push(format!("<p class=\"info\">{}</p>", escape_html(&message)));
        }
    }
    Ok(lines.join("\n"))
}

/// Local paths only.
fn safe_return_path(path: &str) -> Option<&str> {
    (path.starts_with('/') && !path.starts_with("//")).then_some(path)
}

/// `GET /`
pub async fn index() -> Redirect {
    Redirect::to("/login")
}

/// `GET /login`: sign-in page, or straight home when already signed in.
pub async fn login_page(State(state): State<AppState>, jar: CookieJar) -> AppResult<Response> {
    let mut session = services::session::open(&state, &jar).await;
    let guest_accepted = state.config.enable_guest_login;
    if session::validate_stored_token(&session, &state.auth, guest_accepted)
        .await
        .is_ok()
    {
        return Ok(Redirect::to(HOME).into_response());
    }

    let flash = take_flash(&mut session).await?;
    let mut body = LOGIN_BODY.to_string();
    if guest_accepted {
        body.push_str(GUEST_BUTTON);
    }
    let jar = services::session::attach(jar, &session, &state);
    Ok((jar, page("Sign in", &flash, &body)).into_response())
}

/// `POST /submit-token-session`: keep an API token in the session.
///
/// On success the session moves to a fresh id before the token is stored.
pub async fn submit_token_session(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<TokenSessionForm>,
) -> AppResult<Response> {
    let mut session = services::session::open(&state, &jar).await;
    let guest_accepted = state.config.enable_guest_login;

    let target = match state.auth.validate_token(&form.token, guest_accepted).await {
        Ok(user) => {
            session.regenerate().await?;
            session::save_token(&mut session, &form.token).await?;
            session::set_info(
                &mut session,
                FlashInfo::Single(format!("Welcome, {}.", user.full_name)),
            )
            .await?;
            info!(user_id = user.id, "token stored in session");
            match session::take_prev_route(&mut session).await? {
                Some((method, path)) if method == "GET" => {
                    safe_return_path(&path).unwrap_or(HOME).to_string()
                }
                _ => HOME.to_string(),
            }
        }
        Err(e) => {
            let e = match e {
                AuthError::UserNotFound => AuthError::TokenMismatch,
                other => other,
            };
            let rejected = AppError::from(e);
            session::set_error(
                &mut session,
                FlashError {
                    status: rejected.status().as_u16(),
                    code: rejected.code().to_string(),
                    message: rejected.public_message().to_string(),
                },
            )
            .await?;
            "/login".to_string()
        }
    };

    let jar = services::session::attach(jar, &session, &state);
    Ok((jar, Redirect::to(&target)).into_response())
}

/// `POST /logout`
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> AppResult<Response> {
    let mut session = services::session::open(&state, &jar).await;
    session::logout(&mut session).await?;
    let jar = services::session::attach(jar, &session, &state);
    Ok((jar, Redirect::to("/login")).into_response())
}

/// `GET /renew-password`
pub async fn renew_password_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(identity): Extension<AuthenticatedUser>,
) -> AppResult<Response> {
    let mut session = services::session::open(&state, &jar).await;
    let mut flash = take_flash(&mut session).await?;
    if identity.user.password_must_change {
        flash.push_str("\n<p class=\"info\">Please choose a new password before continuing.</p>");
    }
    let jar = services::session::attach(jar, &session, &state);
    Ok((jar, page("Renew password", &flash, RENEW_BODY)).into_response())
}

/// `GET /forgot-password`
pub async fn forgot_password_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Response> {
    let mut session = services::session::open(&state, &jar).await;
    let flash = take_flash(&mut session).await?;
    let jar = services::session::attach(jar, &session, &state);
    Ok((jar, page("Forgot password", &flash, FORGOT_BODY)).into_response())
}

/// `GET /reset-password?email=…&token=…`: 404 unless the link is valid.
pub async fn reset_password_page(
    State(state): State<AppState>,
    Query(query): Query<ValidateResetTokenPayload>,
) -> AppResult<Html<String>> {
    state
        .auth
        .validate_reset_token(&query.email, &query.token)
        .await?;

    let body = format!(
        "<h1>Reset password</h1>\n\
         <form onsubmit=\"event.preventDefault(); resetPassword();\">\n\
         <input type=\"hidden\" name=\"email\" value=\"{}\">\n\
         <input type=\"hidden\" name=\"token\" value=\"{}\">\n\
         <label>New password <input type=\"password\" name=\"password\" required></label>\n\
         <label>Confirm <input type=\"password\" name=\"confirmPassword\" required></label>\n\
         <button type=\"submit\">Reset</button>\n\
         </form>\n{RESET_SCRIPT}",
        escape_html(&query.email),
        escape_html(&query.token),
    );
    Ok(page("Reset password", "", &body))
}

/// `GET /dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(identity): Extension<AuthenticatedUser>,
) -> AppResult<Response> {
    let mut session = services::session::open(&state, &jar).await;
    let flash = take_flash(&mut session).await?;
    let user = &identity.user;
    let body = format!(
        "<h1>Dashboard</h1>\n<p>Signed in as <strong>{}</strong> ({})</p>\n\
         <form method=\"post\" action=\"/logout\"><button type=\"submit\">Sign out</button></form>",
        escape_html(&user.full_name),
        escape_html(&user.username),
    );
    let jar = services::session::attach(jar, &session, &state);
    Ok((jar, page("Dashboard", &flash, &body)).into_response())
}
