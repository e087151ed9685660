use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};

use crate::error::{Error, HtmlError};

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            log::error!("Failed to hash password: {e}");
            HtmlError::InternalServerError.default()
        })?
        .to_string())
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let argon2 = Argon2::default();
    match PasswordHash::new(password_hash) {
        Ok(parsed_hash) => argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is malformed: {e}");
            false
        }
    }
}

pub fn generate_access_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
