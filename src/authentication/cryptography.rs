//! Argon2id password storage. Hashing is CPU bound, so the public functions run
//! it on tokio's blocking pool and report failures as `ApiError::Internal`.

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::ApiError;

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

fn hash_now(password: &[u8]) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
}

/// A wrong password is `Ok(false)`. Only an unreadable stored hash is an error.
fn matches_now(password: &[u8], stored: &str) -> Result<bool, password_hash::Error> {
    let stored = PasswordHash::new(stored)?;
    match hasher().verify_password(password, &stored) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn off_the_runtime<T, F>(action: &'static str, job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, password_hash::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ApiError::Internal(format!("password {action} task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("password {action} failed: {e}")))
}

/// Produces a salted PHC string for storage in `users.password`.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    off_the_runtime("hashing", move || hash_now(password.as_bytes())).await
}

pub async fn password_matches(password: String, stored: String) -> Result<bool, ApiError> {
    off_the_runtime("verification", move || {
        matches_now(password.as_bytes(), &stored)
    })
    .await
}
