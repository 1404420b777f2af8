use rand::Rng;

use crate::error::{AppError, AppResult};

pub const USERNAME_MAX_CHARS: usize = 30;

/// Hash on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(plaintext: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hash task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Hashing failed: {}", e)))
}

/// Constant-time check against a stored hash. Unreadable hashes never match.
pub async fn verify_password(plaintext: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(format!("Verify task failed: {}", e)))
}

pub fn check_password_strength(password: &str, min_len: usize) -> AppResult<()> {
    if password.chars().count() < min_len {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            min_len
        )));
    }
    Ok(())
}

/// Trimmed, lower-cased email with exactly one `@` and something on both sides.
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && domain.contains('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    Ok(email)
}

/// Lower-case with all whitespace removed.
pub fn normalize_username(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(AppError::BadRequest(format!(
            "Username must be at most {} characters",
            USERNAME_MAX_CHARS
        )));
    }
    Ok(())
}

/// Starting username for a new account: the email's local part.
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let name: String = normalize_username(local)
        .chars()
        .take(USERNAME_MAX_CHARS - 5)
        .collect();
    if name.is_empty() {
        "user".to_string()
    } else {
        name
    }
}

/// `base` plus four random digits, used when the plain name is taken.
pub fn with_suffix<R: Rng + ?Sized>(base: &str, rng: &mut R) -> String {
    format!("{}{:04}", base, rng.gen_range(0..10_000))
}
