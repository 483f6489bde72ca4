//! Login, token validation and account management.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::jwt::{self, JwtSettings};
use super::password::{generate_strong_password, hash_password, verify_password};
use super::store::CredentialStore;
use super::{AuthError, LoginFailure};
use crate::models::auth::{NewUser, User};
use crate::models::payload::{AttemptLoginPayload, CreateUserPayload, RenewPasswordPayload};
use crate::validation::Validator;

/// Guest account configuration.
#[derive(Debug, Clone, Default)]
pub struct GuestSettings {
    pub enabled: bool,
    pub email: String,
    pub password: String,
}

/// Everything the auth service needs besides its store.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt: JwtSettings,
    pub guest: GuestSettings,
}

/// Authentication use cases over a credential store.
///
/// Cheap to clone; all state is behind `Arc`.
#[derive(Clone)]
pub struct AuthService {
    pub(super) store: Arc<dyn CredentialStore>,
    pub(super) validator: Arc<Validator>,
    pub(super) settings: Arc<AuthSettings>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        validator: Arc<Validator>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            validator,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn guest_login_enabled(&self) -> bool {
        self.settings.guest.enabled
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// Check an email/password pair.
    ///
    /// Unknown email, wrong password and a disabled account all fail with
    /// `LoginFailed`; only the log line tells them apart.
    #[instrument(skip_all, fields(email = %payload.email))]
    pub async fn attempt_login(&self, payload: &AttemptLoginPayload) -> Result<User, AuthError> {
        let errors = payload.validate(&self.validator);
        if !errors.is_empty() {
            return Err(AuthError::ValidationFailed(errors));
        }

        let Some(user) = self.store.find_user_by_email(&payload.email).await? else {
            return Err(login_failed(LoginFailure::UnknownEmail));
        };
        if !verify_password(&payload.password, &user.password_hash) {
            return Err(login_failed(LoginFailure::WrongPassword));
        }
        if user.disabled {
            return Err(login_failed(LoginFailure::Disabled));
        }

        info!(user_id = user.id, "login succeeded");
        Ok(user)
    }

    /// Log in with the configured guest credentials.
    #[instrument(skip_all)]
    pub async fn attempt_guest_login(&self) -> Result<User, AuthError> {
        let guest = &self.settings.guest;
        if !guest.enabled {
            return Err(AuthError::GuestLoginForbidden);
        }
        let payload = AttemptLoginPayload {
            email: guest.email.clone(),
            password: guest.password.clone(),
            remember_me: false,
        };
        let user = self.attempt_login(&payload).await?;
        if !user.is_guest {
            warn!(user_id = user.id, "configured guest account is not flagged as guest");
            return Err(AuthError::NotActuallyGuest);
        }
        Ok(user)
    }

    /// Sign an identity token for `user`.
    pub fn issue_token(&self, user: &User, remember: bool) -> Result<String, AuthError> {
        jwt::issue_token(user, remember, &self.settings.jwt)
    }

    /// Resolve a token to a live user.
    ///
    /// The claims must still match the stored user: same id and username, not
    /// disabled, and not a guest unless `guest_accepted`.
    pub async fn validate_token(&self, token: &str, guest_accepted: bool) -> Result<User, AuthError> {
        let claims = jwt::decode_token(token, &self.settings.jwt.secret)?;
        if claims.email.is_empty() {
            return Err(AuthError::TokenInvalid("missing email claim".into()));
        }

        let user = self
            .store
            .find_user_by_email(&claims.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.id != claims.id || user.username != claims.user_name || user.disabled {
            return Err(AuthError::TokenMismatch);
        }
        if user.is_guest && !guest_accepted {
            return Err(AuthError::GuestForbidden);
        }
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Account management
    // ------------------------------------------------------------------

    /// Replace the signed-in user's password and clear the must-change flag.
    #[instrument(skip_all, fields(user_id = user.id))]
    pub async fn renew_password(
        &self,
        user: &User,
        payload: &RenewPasswordPayload,
    ) -> Result<User, AuthError> {
        let errors = payload.validate(&self.validator);
        if !errors.is_empty() {
            return Err(AuthError::ValidationFailed(errors));
        }
        if verify_password(&payload.password, &user.password_hash) {
            return Err(AuthError::PasswordUnchanged);
        }

        let hash = hash_password(&payload.password)?;
        let updated = self
            .store
            .update_password(user.id, &hash, false, &user.username)
            .await?;
        info!("password renewed");
        Ok(updated)
    }

    /// Create an account with a generated password.
    ///
    /// Returns the stored user and the plaintext password, which is not kept
    /// anywhere else.
    #[instrument(skip_all, fields(author = %author.username, username = %payload.username))]
    pub async fn create_user(
        &self,
        payload: &CreateUserPayload,
        author: &User,
    ) -> Result<(User, String), AuthError> {
        let errors = payload.validate(&self.validator);
        if !errors.is_empty() {
            return Err(AuthError::ValidationFailed(errors));
        }

        let password = generate_strong_password()?;
        let user = self
            .store
            .create_user(NewUser {
                username: payload.username.clone(),
                full_name: payload.full_name.clone(),
                email: payload.email.clone(),
                password_hash: hash_password(&password)?,
                password_must_change: true,
                is_guest: payload.is_guest,
                created_by: author.username.clone(),
            })
            .await?;
        info!(user_id = user.id, "user created");
        Ok((user, password))
    }
}

pub(super) fn login_failed(reason: LoginFailure) -> AuthError {
    warn!(?reason, "login failed");
    AuthError::LoginFailed(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::MemoryCredentialStore;

    const SECRET: &str = "unit-test-secret";

    fn service_with(store: Arc<MemoryCredentialStore>, guest: GuestSettings) -> AuthService {
        AuthService::new(
            store,
            Arc::new(Validator::new()),
            AuthSettings {
                jwt: JwtSettings::new(SECRET),
                guest,
            },
        )
    }

    async fn add_user(
        store: &MemoryCredentialStore,
        username: &str,
        email: &str,
        password: &str,
        is_guest: bool,
    ) -> User {
        store
            .create_user(NewUser {
                username: username.into(),
                full_name: username.into(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
                password_must_change: false,
                is_guest,
                created_by: "SYSTEM".into(),
            })
            .await
            .unwrap()
    }

    fn login(email: &str, password: &str) -> AttemptLoginPayload {
        AttemptLoginPayload {
            email: email.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    #[tokio::test]
    async fn login_failures_share_one_error() {
        let store = Arc::new(MemoryCredentialStore::new());
        add_user(&store, "alice", "alice@x.com", "pw-alice", false).await;
        add_user(&store, "dave", "dave@x.com", "pw-dave", false).await;
        store.set_disabled("dave@x.com", true).await;
        let auth = service_with(store, GuestSettings::default());

        let unknown = auth.attempt_login(&login("nobody@x.com", "x")).await.unwrap_err();
        let wrong = auth.attempt_login(&login("alice@x.com", "nope")).await.unwrap_err();
        let disabled = auth.attempt_login(&login("dave@x.com", "pw-dave")).await.unwrap_err();

        assert!(matches!(unknown, AuthError::LoginFailed(LoginFailure::UnknownEmail)));
        assert!(matches!(wrong, AuthError::LoginFailed(LoginFailure::WrongPassword)));
        assert!(matches!(disabled, AuthError::LoginFailed(LoginFailure::Disabled)));
        assert_eq!(unknown.public_message(), wrong.public_message());
        assert_eq!(wrong.public_message(), disabled.public_message());
    }

    #[tokio::test]
    async fn login_validates_payload_first() {
        let auth = service_with(Arc::new(MemoryCredentialStore::new()), GuestSettings::default());
        let err = auth.attempt_login(&login("not-an-email", "")).await.unwrap_err();
        match err {
            AuthError::ValidationFailed(errors) => {
                assert_eq!(errors, vec!["invalid email", "field `password` is required"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn issued_token_validates_to_same_user() {
        let store = Arc::new(MemoryCredentialStore::new());
        add_user(&store, "alice", "alice@x.com", "pw", false).await;
        let auth = service_with(store, GuestSettings::default());

        let user = auth.attempt_login(&login("alice@x.com", "pw")).await.unwrap();
        let token = auth.issue_token(&user, false).unwrap();
        let resolved = auth.validate_token(&token, false).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.username, "alice");
    }

    #[tokio::test]
    async fn disabling_user_invalidates_outstanding_token() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = add_user(&store, "alice", "alice@x.com", "pw", false).await;
        let auth = service_with(store.clone(), GuestSettings::default());
        let token = auth.issue_token(&user, false).unwrap();

        store.set_disabled("alice@x.com", true).await;
        let err = auth.validate_token(&token, true).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenMismatch));
    }

    #[tokio::test]
    async fn token_for_unknown_email_is_user_not_found() {
        let auth = service_with(Arc::new(MemoryCredentialStore::new()), GuestSettings::default());
        let ghost = User {
            id: 1,
            username: "ghost".into(),
            full_name: "Ghost".into(),
            email: "ghost@x.com".into(),
            password_hash: String::new(),
            password_must_change: false,
            disabled: false,
            is_guest: false,
            created_at: chrono::Utc::now(),
            created_by: "SYSTEM".into(),
            updated_at: chrono::Utc::now(),
            updated_by: "SYSTEM".into(),
        };
        let token = auth.issue_token(&ghost, false).unwrap();
        let err = auth.validate_token(&token, true).await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn token_with_stale_username_is_mismatch() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut user = add_user(&store, "alice", "alice@x.com", "pw", false).await;
        let auth = service_with(store, GuestSettings::default());
        user.username = "alice-old".into();
        let token = auth.issue_token(&user, false).unwrap();
        let err = auth.validate_token(&token, false).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenMismatch));
    }

    #[tokio::test]
    async fn guest_token_depends_on_caller() {
        let store = Arc::new(MemoryCredentialStore::new());
        add_user(&store, "guest", "guest@x.com", "guest-pw", true).await;
        let auth = service_with(
            store,
            GuestSettings {
                enabled: true,
                email: "guest@x.com".into(),
                password: "guest-pw".into(),
            },
        );

        let guest = auth.attempt_guest_login().await.unwrap();
        let token = auth.issue_token(&guest, false).unwrap();
        assert!(auth.validate_token(&token, true).await.is_ok());
        let err = auth.validate_token(&token, false).await.unwrap_err();
        assert!(matches!(err, AuthError::GuestForbidden));
    }

    #[tokio::test]
    async fn guest_login_disabled_or_misconfigured() {
        let store = Arc::new(MemoryCredentialStore::new());
        add_user(&store, "alice", "alice@x.com", "pw", false).await;

        let disabled = service_with(store.clone(), GuestSettings::default());
        assert!(matches!(
            disabled.attempt_guest_login().await,
            Err(AuthError::GuestLoginForbidden)
        ));

        let misconfigured = service_with(
            store,
            GuestSettings {
                enabled: true,
                email: "alice@x.com".into(),
                password: "pw".into(),
            },
        );
        assert!(matches!(
            misconfigured.attempt_guest_login().await,
            Err(AuthError::NotActuallyGuest)
        ));
    }

    #[tokio::test]
    async fn renew_password_rejects_same_password() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = add_user(&store, "alice", "alice@x.com", "pw", false).await;
        let auth = service_with(store, GuestSettings::default());

        let same = RenewPasswordPayload {
            password: "pw".into(),
            confirm_password: "pw".into(),
        };
        assert!(matches!(
            auth.renew_password(&user, &same).await,
            Err(AuthError::PasswordUnchanged)
        ));

        let mismatch = RenewPasswordPayload {
            password: "new".into(),
            confirm_password: "other".into(),
        };
        assert!(matches!(
            auth.renew_password(&user, &mismatch).await,
            Err(AuthError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn renew_password_clears_must_change() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = store
            .create_user(NewUser {
                username: "bob".into(),
                full_name: "Bob".into(),
                email: "bob@x.com".into(),
                password_hash: hash_password("first").unwrap(),
                password_must_change: true,
                is_guest: false,
                created_by: "SYSTEM".into(),
            })
            .await
            .unwrap();
        let auth = service_with(store, GuestSettings::default());

        let payload = RenewPasswordPayload {
            password: "second".into(),
            confirm_password: "second".into(),
        };
        let updated = auth.renew_password(&user, &payload).await.unwrap();
        assert!(!updated.password_must_change);
        assert_eq!(updated.updated_by, "bob");
        assert!(auth.attempt_login(&login("bob@x.com", "second")).await.is_ok());
        assert!(auth.attempt_login(&login("bob@x.com", "first")).await.is_err());
    }

    #[tokio::test]
    async fn create_user_returns_working_generated_password() {
        let store = Arc::new(MemoryCredentialStore::new());
        let admin = add_user(&store, "admin", "admin@x.com", "pw", false).await;
        let auth = service_with(store, GuestSettings::default());

        let payload = CreateUserPayload {
            username: "carol".into(),
            full_name: "Carol".into(),
            email: "carol@x.com".into(),
            is_guest: false,
        };
        let (user, password) = auth.create_user(&payload, &admin).await.unwrap();
        assert!(user.password_must_change);
        assert_eq!(user.created_by, "admin");

        let logged_in = auth.attempt_login(&login("carol@x.com", &password)).await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            auth.create_user(&payload, &admin).await,
            Err(AuthError::Conflict(_))
        ));
    }
}
