//! Password hashing.

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("empty password salt")]
    EmptySalt,
    #[error("empty password")]
    EmptyPassword,
    #[error("argon2id failure")]
    Argon2(#[source] argon2::Error),
}

/// Deterministic one-way transform of plaintext passwords.
///
/// The same input always yields the same digest, so digests can be compared
/// inside store lookups. Any salt is part of the hasher's construction.
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    /// Returns an error if the password cannot be hashed.
    fn hash(&self, password: &str) -> Result<String, HashError>;
}

/// Argon2id with a salt fixed at construction, rendered as lowercase hex.
///
/// The configured salt is stretched through SHA-256 so that short values still
/// meet Argon2's minimum salt length.
pub struct Argon2Hasher {
    salt: [u8; 32],
    params: Params,
}

impl Argon2Hasher {
    /// Argon2id with the library's default cost parameters.
    ///
    /// # Errors
    /// Returns [`HashError::EmptySalt`] if the salt is empty.
    pub fn new(salt: &SecretString) -> Result<Self, HashError> {
        Self::with_params(salt, Params::default())
    }

    /// # Errors
    /// Returns [`HashError::EmptySalt`] if the salt is empty.
    pub fn with_params(salt: &SecretString, params: Params) -> Result<Self, HashError> {
        let salt = salt.expose_secret();
        if salt.is_empty() {
            return Err(HashError::EmptySalt);
        }
        Ok(Self {
            salt: Sha256::digest(salt.as_bytes()).into(),
            params,
        })
    }
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("salt", &"***")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .finish()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        if password.is_empty() {
            return Err(HashError::EmptyPassword);
        }
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut output = vec![0u8; self.params.output_len().unwrap_or(Params::DEFAULT_OUTPUT_LEN)];
        argon2
            .hash_password_into(password.as_bytes(), &self.salt, &mut output)
            .map_err(HashError::Argon2)?;
        Ok(hex::encode(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn hasher(salt: &str) -> Result<Argon2Hasher> {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None)?;
        Ok(Argon2Hasher::with_params(
            &SecretString::from(salt.to_string()),
            params,
        )?)
    }

    #[test]
    fn hash_is_deterministic() -> Result<()> {
        let hasher = hasher("pepper")?;
        assert_eq!(hasher.hash("pw123")?, hasher.hash("pw123")?);
        assert_ne!(hasher.hash("pw123")?, hasher.hash("pw124")?);
        Ok(())
    }

    #[test]
    fn salt_changes_digest() -> Result<()> {
        assert_ne!(hasher("a")?.hash("pw123")?, hasher("b")?.hash("pw123")?);
        Ok(())
    }

    #[test]
    fn digest_is_not_plain_sha256() -> Result<()> {
        let digest = hasher("salt")?.hash("password")?;
        assert_eq!(digest.len(), Params::DEFAULT_OUTPUT_LEN * 2);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let mut sha = Sha256::new();
        sha.update(b"password");
        sha.update(b"salt");
        assert_ne!(digest, hex::encode(sha.finalize()));
        Ok(())
    }

    #[test]
    fn cost_parameters_change_digest() -> Result<()> {
        let salt = SecretString::from("salt".to_string());
        let cheap = hasher("salt")?;
        let costlier =
            Argon2Hasher::with_params(&salt, Params::new(Params::MIN_M_COST, 2, 1, None)?)?;
        assert_ne!(cheap.hash("pw123")?, costlier.hash("pw123")?);
        Ok(())
    }

    #[test]
    fn short_salt_is_accepted() -> Result<()> {
        let digest = hasher("s")?.hash("pw123")?;
        assert!(!digest.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_empty_salt_and_password() -> Result<()> {
        assert!(matches!(
            Argon2Hasher::new(&SecretString::from(String::new())),
            Err(HashError::EmptySalt)
        ));
        assert!(matches!(
            hasher("salt")?.hash(""),
            Err(HashError::EmptyPassword)
        ));
        Ok(())
    }

    #[test]
    fn debug_hides_salt() -> Result<()> {
        let rendered = format!("{:?}", hasher("top-secret")?);
        assert!(!rendered.contains("top-secret"));
        Ok(())
    }
}
