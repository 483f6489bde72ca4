//! Request payloads accepted by the auth services.
//!
//! Every field defaults to empty so a missing field is reported by
//! `validate` instead of failing deserialization.

use serde::Deserialize;

use crate::validation::{MAX_PASSWORD_BYTES, Validator};

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 30;
/// Maximum full-name length.
pub const MAX_FULL_NAME_LENGTH: usize = 100;
/// Maximum stored email length.
pub const MAX_EMAIL_LENGTH: usize = 100;

/// Credential attempt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttemptLoginPayload {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

impl AttemptLoginPayload {
    pub fn validate(&self, v: &Validator) -> Vec<String> {
        let mut errors = Vec::new();
        v.email("email", &self.email, &mut errors);
        v.required("password", &self.password, &mut errors);
        errors
    }
}

/// New password for the signed-in user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenewPasswordPayload {
    pub password: String,
    pub confirm_password: String,
}

impl RenewPasswordPayload {
    pub fn validate(&self, v: &Validator) -> Vec<String> {
        let mut errors = Vec::new();
        if v.required("password", &self.password, &mut errors) {
            v.max_bytes("password", &self.password, MAX_PASSWORD_BYTES, &mut errors);
        }
        v.confirmation(
            "confirmPassword",
            &self.confirm_password,
            &self.password,
            &mut errors,
        );
        errors
    }
}

/// Forgot-password request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestResetPayload {
    pub email: String,
}

impl RequestResetPayload {
    pub fn validate(&self, v: &Validator) -> Vec<String> {
        let mut errors = Vec::new();
        v.email("email", &self.email, &mut errors);
        errors
    }
}

/// Reset link parameters (`?email=…&token=…`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidateResetTokenPayload {
    pub email: String,
    pub token: String,
}

impl ValidateResetTokenPayload {
    pub fn validate(&self, v: &Validator) -> Vec<String> {
        let mut errors = Vec::new();
        v.email("email", &self.email, &mut errors);
        v.required("token", &self.token, &mut errors);
        errors
    }
}

/// Reset submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordPayload {
    pub email: String,
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordPayload {
    pub fn validate(&self, v: &Validator) -> Vec<String> {
        let mut errors = Vec::new();
        v.email("email", &self.email, &mut errors);
        v.required("token", &self.token, &mut errors);
        if v.required("password", &self.password, &mut errors) {
            v.max_bytes("password", &self.password, MAX_PASSWORD_BYTES, &mut errors);
        }
        v.confirmation(
            "confirmPassword",
            &self.confirm_password,
            &self.password,
            &mut errors,
        );
        errors
    }
}

/// Account creation by an existing member.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[serde(rename = "userName")]
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_guest: bool,
}

impl CreateUserPayload {
    pub fn validate(&self, v: &Validator) -> Vec<String> {
        let mut errors = Vec::new();
        if v.required("userName", &self.username, &mut errors) {
            v.max_len("userName", &self.username, MAX_USERNAME_LENGTH, &mut errors);
            if !v.is_username(&self.username) {
                errors.push(
                    "field `userName` may only contain letters, digits, '.', '_' and '-'"
                        .to_string(),
                );
            }
        }
        if v.required("fullName", &self.full_name, &mut errors) {
            v.max_len("fullName", &self.full_name, MAX_FULL_NAME_LENGTH, &mut errors);
        }
        v.email("email", &self.email, &mut errors);
        v.max_len("email", &self.email, MAX_EMAIL_LENGTH, &mut errors);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_payload_reports_every_failed_field() {
        let v = Validator::new();
        let payload = AttemptLoginPayload::default();
        assert_eq!(
            payload.validate(&v),
            vec!["field `email` is required", "field `password` is required"]
        );
    }

    #[test]
    fn login_payload_deserializes_camel_case() {
        let payload: AttemptLoginPayload = serde_json::from_str(
            r#"{"email":"a@b.com","password":"pw","rememberMe":true}"#,
        )
        .unwrap();
        assert!(payload.remember_me);
        assert!(payload.validate(&Validator::new()).is_empty());
    }

    #[test]
    fn renew_payload_requires_matching_confirmation() {
        let v = Validator::new();
        let payload = RenewPasswordPayload {
            password: "one".into(),
            confirm_password: "two".into(),
        };
        assert_eq!(payload.validate(&v), vec!["password confirmation is not same"]);
    }

    #[test]
    fn overlong_passwords_are_rejected() {
        let v = Validator::new();
        let long = "p".repeat(MAX_PASSWORD_BYTES + 1);
        let renew = RenewPasswordPayload {
            password: long.clone(),
            confirm_password: long.clone(),
        };
        assert_eq!(
            renew.validate(&v),
            vec!["field `password` must be at most 72 bytes"]
        );

        let reset = ResetPasswordPayload {
            email: "a@b.com".into(),
            token: "tok".into(),
            password: long.clone(),
            confirm_password: long,
        };
        assert_eq!(
            reset.validate(&v),
            vec!["field `password` must be at most 72 bytes"]
        );
    }

    #[test]
    fn reset_payload_missing_token() {
        let v = Validator::new();
        let payload = ResetPasswordPayload {
            email: "a@b.com".into(),
            token: String::new(),
            password: "pw".into(),
            confirm_password: "pw".into(),
        };
        assert_eq!(payload.validate(&v), vec!["field `token` is required"]);
    }

    #[test]
    fn create_user_rejects_bad_username() {
        let v = Validator::new();
        let payload = CreateUserPayload {
            username: "bad name".into(),
            full_name: "Bad Name".into(),
            email: "bad@x.com".into(),
            is_guest: false,
        };
        let errors = payload.validate(&v);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("userName"));
    }

    #[test]
    fn create_user_rejects_long_username() {
        let v = Validator::new();
        let payload = CreateUserPayload {
            username: "a".repeat(31),
            full_name: "Long".into(),
            email: "long@x.com".into(),
            is_guest: false,
        };
        assert_eq!(
            payload.validate(&v),
            vec!["field `userName` must be at most 30 characters"]
        );
    }
}
