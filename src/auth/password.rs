use bcrypt::{hash, verify, DEFAULT_COST};
use thiserror::Error;

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password is required")]
    Empty,

    #[error("Password exceeds {max} bytes")]
    TooLong { max: usize },

    #[error("Password does not match")]
    Mismatch,

    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// A bcrypt hash. Outside this crate it can only be obtained from
/// [`CredentialVerifier::hash`], so the password-writing repository method
/// cannot be handed a plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a value read back from the store.
    pub(crate) fn from_stored(hashed: impl Into<String>) -> Self {
        Self(hashed.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Stateless bcrypt hash/verify. Both operations are CPU bound and blocking.
#[derive(Debug, Clone, Copy)]
pub struct CredentialVerifier {
    cost: u32,
}

impl CredentialVerifier {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }

    pub fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordError> {
        if plaintext.is_empty() {
            return Err(PasswordError::Empty);
        }
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong {
                max: MAX_PASSWORD_BYTES,
            });
        }

        hash(plaintext, self.cost)
            .map(PasswordHash)
            .map_err(|err| PasswordError::Hashing(err.to_string()))
    }

    /// Comparison happens inside bcrypt in constant time.
    pub fn verify(&self, hashed: &PasswordHash, plaintext: &str) -> Result<(), PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::Mismatch);
        }

        match verify(plaintext, hashed.as_str()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(PasswordError::Mismatch),
            Err(_) => Err(PasswordError::MalformedHash),
        }
    }

    /// Run [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, plaintext: String) -> Result<PasswordHash, PasswordError> {
        let verifier = *self;
        tokio::task::spawn_blocking(move || verifier.hash(&plaintext))
            .await
            .map_err(|err| PasswordError::Hashing(err.to_string()))?
    }

    /// Run [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(
        &self,
        hashed: PasswordHash,
        plaintext: String,
    ) -> Result<(), PasswordError> {
        let verifier = *self;
        tokio::task::spawn_blocking(move || verifier.verify(&hashed, &plaintext))
            .await
            .map_err(|err| PasswordError::Hashing(err.to_string()))?
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new(Some(DEFAULT_COST))
    }
}
