//! Credential hashing.

use bcrypt::BcryptError;

/// Work factor used for newly created hashes.
pub const DEFAULT_COST: u32 = 12;

/// Longest plaintext bcrypt will take into account.
pub const MAX_PASSWORD_LEN: usize = 72;

#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(#[from] BcryptError);

/// A bcrypt hash of a user's password. Never holds the plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash `plaintext` with the given bcrypt cost.
    pub fn new(plaintext: &str, cost: u32) -> Result<Self, PasswordError> {
        Ok(Self(bcrypt::hash(plaintext, cost)?))
    }

    /// Wrap a hash previously produced by [`PasswordHash::new`].
    pub fn from_stored(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Check `plaintext` against the hash.
    ///
    /// A mismatch is `Ok(false)`; `Err` means the stored hash is unusable.
    pub fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
        Ok(bcrypt::verify(plaintext, &self.0)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}
