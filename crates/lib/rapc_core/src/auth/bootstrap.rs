//! Startup seeding of the first member and the guest account.

use tracing::{info, warn};

use super::password::hash_password;
use super::service::AuthService;
use super::AuthError;
use crate::models::auth::{NewUser, SYSTEM_USERNAME};
use crate::models::payload::CreateUserPayload;
use crate::validation::MAX_PASSWORD_BYTES;

/// Credentials for the account created when no member exists yet.
#[derive(Debug, Clone)]
pub struct FirstUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct SeedSettings {
    pub first_user: Option<FirstUser>,
}

/// What `seed_users` created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub first_user_created: bool,
    pub guest_created: bool,
}

/// Guest account identity.
pub const GUEST_USERNAME: &str = "guest";
const GUEST_FULL_NAME: &str = "Guest";

/// Make sure a usable member exists and, when guest login is on, a guest.
///
/// The first user must change their password on first login.
pub async fn seed_users(auth: &AuthService, seed: &SeedSettings) -> Result<SeedReport, AuthError> {
    let mut report = SeedReport::default();
    let store = auth.store();

    if !store.has_active_member().await? {
        match &seed.first_user {
            Some(first) => {
                let payload = CreateUserPayload {
                    username: first.username.clone(),
                    full_name: first.full_name.clone(),
                    email: first.email.clone(),
                    is_guest: false,
                };
                let mut errors = payload.validate(auth.validator());
                let validator = auth.validator();
                if validator.required("password", &first.password, &mut errors) {
                    validator.max_bytes(
                        "password",
                        &first.password,
                        MAX_PASSWORD_BYTES,
                        &mut errors,
                    );
                }
                if !errors.is_empty() {
                    return Err(AuthError::ValidationFailed(errors));
                }

                let user = store
                    .create_user(NewUser {
                        username: payload.username,
                        full_name: payload.full_name,
                        email: payload.email,
                        password_hash: hash_password(&first.password)?,
                        password_must_change: true,
                        is_guest: false,
                        created_by: SYSTEM_USERNAME.to_string(),
                    })
                    .await?;
                info!(user_id = user.id, username = %user.username, "created first user");
                report.first_user_created = true;
            }
            None => warn!("no active user exists and no first user is configured"),
        }
    }

    let guest = &auth.settings().guest;
    if guest.enabled && !store.has_guest().await? {
        if guest.email.is_empty() || guest.password.is_empty() {
            warn!("guest login is enabled but guest credentials are not configured");
        } else {
            let user = store
                .create_user(NewUser {
                    username: GUEST_USERNAME.to_string(),
                    full_name: GUEST_FULL_NAME.to_string(),
                    email: guest.email.clone(),
                    password_hash: hash_password(&guest.password)?,
                    password_must_change: false,
                    is_guest: true,
                    created_by: SYSTEM_USERNAME.to_string(),
                })
                .await?;
            info!(user_id = user.id, "created guest user");
            report.guest_created = true;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::jwt::JwtSettings;
    use crate::auth::memory::MemoryCredentialStore;
    use crate::auth::service::{AuthSettings, GuestSettings};
    use crate::models::payload::AttemptLoginPayload;
    use crate::validation::Validator;

    fn service(guest: GuestSettings) -> AuthService {
        AuthService::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(Validator::new()),
            AuthSettings {
                jwt: JwtSettings::new("s"),
                guest,
            },
        )
    }

    fn first_user() -> SeedSettings {
        SeedSettings {
            first_user: Some(FirstUser {
                username: "admin".into(),
                full_name: "Administrator".into(),
                email: "admin@x.com".into(),
                password: "change-me".into(),
            }),
        }
    }

    #[tokio::test]
    async fn seeds_first_user_once() {
        let auth = service(GuestSettings::default());
        let report = seed_users(&auth, &first_user()).await.unwrap();
        assert!(report.first_user_created);
        assert!(!report.guest_created);

        let user = auth
            .attempt_login(&AttemptLoginPayload {
                email: "admin@x.com".into(),
                password: "change-me".into(),
                remember_me: false,
            })
            .await
            .unwrap();
        assert!(user.password_must_change);
        assert_eq!(user.created_by, SYSTEM_USERNAME);

        let again = seed_users(&auth, &first_user()).await.unwrap();
        assert_eq!(again, SeedReport::default());
    }

    #[tokio::test]
    async fn seeds_guest_when_enabled() {
        let auth = service(GuestSettings {
            enabled: true,
            email: "guest@x.com".into(),
            password: "guest-pw".into(),
        });
        let report = seed_users(&auth, &first_user()).await.unwrap();
        assert!(report.guest_created);

        let guest = auth.attempt_guest_login().await.unwrap();
        assert!(guest.is_guest);
        assert!(!seed_users(&auth, &first_user()).await.unwrap().guest_created);
    }

    #[tokio::test]
    async fn invalid_first_user_is_rejected() {
        let auth = service(GuestSettings::default());
        let seed = SeedSettings {
            first_user: Some(FirstUser {
                username: "bad name".into(),
                full_name: "Bad".into(),
                email: "bad@x.com".into(),
                password: String::new(),
            }),
        };
        assert!(matches!(
            seed_users(&auth, &seed).await,
            Err(AuthError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn overlong_first_password_is_rejected() {
        let auth = service(GuestSettings::default());
        let seed = SeedSettings {
            first_user: Some(FirstUser {
                username: "admin".into(),
                full_name: "Admin".into(),
                email: "admin@x.com".into(),
                password: "x".repeat(73),
            }),
        };
        match seed_users(&auth, &seed).await {
            Err(AuthError::ValidationFailed(errors)) => {
                assert_eq!(errors, vec!["field `password` must be at most 72 bytes"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!auth.store().has_active_member().await.unwrap());
    }
}
