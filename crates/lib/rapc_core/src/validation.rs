//! Payload validation service.
//!
//! A `Validator` is built once at startup and handed to the services that
//! need it. Payloads report problems as a list of human-readable messages
//! (empty = valid).

use regex::Regex;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
const USERNAME_PATTERN: &str = r"^[a-zA-Z0-9._-]+$";

/// Maximum length of an email address (RFC 5321).
const MAX_EMAIL_LENGTH: usize = 254;

/// bcrypt ignores everything past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Compiled validation rules.
#[derive(Debug, Clone)]
pub struct Validator {
    email: Regex,
    username: Regex,
}

impl Validator {
    /// Compile the validation rules.
    pub fn new() -> Self {
        Self {
            email: Regex::new(EMAIL_PATTERN).expect("email pattern compiles"),
            username: Regex::new(USERNAME_PATTERN).expect("username pattern compiles"),
        }
    }

    /// Whether `value` is a well-formed email address.
    pub fn is_email(&self, value: &str) -> bool {
        value.len() <= MAX_EMAIL_LENGTH && self.email.is_match(value)
    }

    /// Whether `value` only contains letters, digits, `.`, `_` or `-`.
    pub fn is_username(&self, value: &str) -> bool {
        self.username.is_match(value)
    }

    /// Push the standard "required" message when `value` is blank.
    /// Returns `true` when the value is present.
    pub fn required(&self, field: &str, value: &str, errors: &mut Vec<String>) -> bool {
        if value.trim().is_empty() {
            errors.push(format!("field `{field}` is required"));
            false
        } else {
            true
        }
    }

    /// Required + well-formed email.
    pub fn email(&self, field: &str, value: &str, errors: &mut Vec<String>) {
        if self.required(field, value, errors) && !self.is_email(value) {
            errors.push("invalid email".to_string());
        }
    }

    /// Required + equal to `expected`.
    pub fn confirmation(&self, field: &str, value: &str, expected: &str, errors: &mut Vec<String>) {
        if self.required(field, value, errors) && value != expected {
            errors.push("password confirmation is not same".to_string());
        }
    }

    /// Reject values longer than `max` characters.
    pub fn max_len(&self, field: &str, value: &str, max: usize, errors: &mut Vec<String>) {
        if value.chars().count() > max {
            errors.push(format!("field `{field}` must be at most {max} characters"));
        }
    }

    /// Reject values whose UTF-8 encoding exceeds `max` bytes.
    pub fn max_bytes(&self, field: &str, value: &str, max: usize, errors: &mut Vec<String>) {
        if value.len() > max {
            errors.push(format!("field `{field}` must be at most {max} bytes"));
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_email() {
        let v = Validator::new();
        assert!(v.is_email("a@b.com"));
        assert!(v.is_email("first.last+tag@sub.example.org"));
    }

    #[test]
    fn rejects_malformed_email() {
        let v = Validator::new();
        assert!(!v.is_email("a@b"));
        assert!(!v.is_email("not-an-email"));
        assert!(!v.is_email("@b.com"));
    }

    #[test]
    fn username_rules() {
        let v = Validator::new();
        assert!(v.is_username("alice.smith_01-x"));
        assert!(!v.is_username("alice smith"));
        assert!(!v.is_username("alice<script>"));
    }

    #[test]
    fn required_reports_field_name() {
        let v = Validator::new();
        let mut errors = Vec::new();
        assert!(!v.required("email", "  ", &mut errors));
        assert_eq!(errors, vec!["field `email` is required"]);
    }

    #[test]
    fn email_reports_required_before_format() {
        let v = Validator::new();
        let mut errors = Vec::new();
        v.email("email", "", &mut errors);
        assert_eq!(errors, vec!["field `email` is required"]);

        let mut errors = Vec::new();
        v.email("email", "nope", &mut errors);
        assert_eq!(errors, vec!["invalid email"]);
    }

    #[test]
    fn max_bytes_counts_encoded_length() {
        let v = Validator::new();
        let mut errors = Vec::new();
        v.max_bytes("password", &"a".repeat(72), MAX_PASSWORD_BYTES, &mut errors);
        assert!(errors.is_empty());

        // 37 two-byte characters.
        v.max_bytes("password", &"é".repeat(37), MAX_PASSWORD_BYTES, &mut errors);
        assert_eq!(errors, vec!["field `password` must be at most 72 bytes"]);
    }

    #[test]
    fn confirmation_mismatch() {
        let v = Validator::new();
        let mut errors = Vec::new();
        v.confirmation("confirmPassword", "abc", "abd", &mut errors);
        assert_eq!(errors, vec!["password confirmation is not same"]);
    }
}
