//! Password hashing via bcrypt, generation and strength scoring.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::AuthError;
use crate::validation::MAX_PASSWORD_BYTES;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Length of generated passwords.
const GENERATED_LENGTH: usize = 16;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SPECIALS: &[u8] = b"!@#$%^&*()-_=+[]{}|;:,.<>?/`~";

/// Hash a password with bcrypt (cost 10).
///
/// Passwords longer than [`MAX_PASSWORD_BYTES`] are refused rather than
/// silently truncated.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::ValidationFailed(vec![format!(
            "field `password` must be at most {MAX_PASSWORD_BYTES} bytes"
        )]));
    }
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
///
/// A malformed hash or an overlong password counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    password.len() <= MAX_PASSWORD_BYTES && bcrypt::verify(password, hash).unwrap_or(false)
}

/// Generate a random 16-character password containing at least one letter,
/// one digit and one special character.
pub fn generate_strong_password() -> Result<String, AuthError> {
    let mut rng = StdRng::try_from_os_rng()
        .map_err(|e| AuthError::Internal(format!("random source unavailable: {e}")))?;

    let all: Vec<u8> = [LETTERS, DIGITS, SPECIALS].concat();
    let mut chars = Vec::with_capacity(GENERATED_LENGTH);
    chars.push(pick(&mut rng, LETTERS));
    chars.push(pick(&mut rng, DIGITS));
    chars.push(pick(&mut rng, SPECIALS));
    while chars.len() < GENERATED_LENGTH {
        chars.push(pick(&mut rng, &all));
    }
    chars.shuffle(&mut rng);

    Ok(chars.into_iter().map(char::from).collect())
}

fn pick(rng: &mut StdRng, set: &[u8]) -> u8 {
    set[rng.random_range(0..set.len())]
}

/// Score a password from 0 to 100.
///
/// Length contributes up to 25 points, then 15 for an uppercase letter,
/// 15 for a lowercase letter, 20 for a digit and 25 for anything else.
pub fn check_password_strength(password: &str) -> u8 {
    let len = password.chars().count();
    let mut score: u32 = if len >= 8 { 25 } else { 3 * len as u32 };

    if password.chars().any(|c| c.is_ascii_uppercase()) {
        score += 15;
    }
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        score += 15;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 20;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        score += 25;
    }

    score.min(100) as u8
}
