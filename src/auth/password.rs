use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(pub String);

/// One-way password hashing.
///
/// `hash` must salt every call, so the same input yields different digests.
/// `verify` answers `false` for a wrong password and for a digest it cannot
/// parse; callers never learn which.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, HashError>;
    fn verify(&self, hash: &str, plain: &str) -> bool;
}

/// Argon2id with the crate's default cost parameters.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: argon2::Params) -> Self {
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashError(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, hash: &str, plain: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        self.argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}
