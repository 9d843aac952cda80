//! Password hashing. Stored credentials are argon2id PHC strings.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand_core::OsRng;

use crate::{Error, Result};

/// Hash `plaintext` with a fresh random salt.
pub fn hash_credential(plaintext: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(plaintext.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::Hash(e.to_string()))
}

/// Whether `candidate` matches the stored `hash`. A malformed hash never
/// matches.
pub fn verify_credential(hash: &str, candidate: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(candidate.as_bytes(), &parsed)
    .is_ok()
}
