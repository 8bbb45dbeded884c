use std::fmt;

use anyhow::Context;
use data_encoding::BASE32_NOPAD;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Length of a rendered plaintext: 16 random bytes in unpadded base32.
pub const PLAINTEXT_LEN: usize = 26;

/// What a token is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token at rest: only the digest of the plaintext is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub scope: Scope,
    pub expiry: OffsetDateTime,
}

impl StoredToken {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiry <= now
    }
}

/// A token at issuance. The plaintext exists only here and in the response
/// sent to the client; stores accept the [`StoredToken`] half.
pub struct IssuedToken {
    plaintext: String,
    record: StoredToken,
}

impl IssuedToken {
    pub fn generate(user_id: i64, scope: Scope, ttl: Duration) -> anyhow::Result<Self> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate token")?;
        let plaintext = BASE32_NOPAD.encode(&bytes);
        let record = StoredToken {
            hash: hash_plaintext(&plaintext),
            user_id,
            scope,
            expiry: OffsetDateTime::now_utc() + ttl,
        };
        Ok(Self { plaintext, record })
    }

    pub fn plaintext(&self) -> &str {
        &self.plaintext
    }

    pub fn expiry(&self) -> OffsetDateTime {
        self.record.expiry
    }

    pub fn record(&self) -> &StoredToken {
        &self.record
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"<redacted>")
            .field("record", &self.record)
            .finish()
    }
}

/// SHA-256 of the plaintext; this is what lookups compare.
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}
