use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const NONCE_LIFETIME_SECS: i64 = 60 * 60 * 24;
const SECRET_BYTES: usize = 32;
const NONCE_BYTES: usize = 10;

/// Action name the consolidation trigger is signed for.
pub const CONSOLIDATE_ACTION: &str = "consolidate";

/// Issues and checks anti-forgery nonces.
///
/// A nonce is bound to an action and to a half-lifetime tick, and is
/// accepted during the tick it was issued in and the one after.
pub struct NonceSigner {
    secret: Vec<u8>,
}

impl NonceSigner {
    #[must_use]
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Generates a fresh hex-encoded secret.
    #[must_use]
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill(&mut bytes);
        hex::encode(bytes)
    }

    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| Error::Config(format!("invalid nonce secret: {e}")))?;
        if bytes.len() < SECRET_BYTES {
            return Err(Error::Config("nonce secret is too short".to_string()));
        }
        Ok(Self::new(bytes))
    }

    /// Reads the secret written by `admin init`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read nonce secret {}: {e}", path.display()))
        })?;
        Self::from_hex(&content)
    }

    #[must_use]
    pub fn create(&self, action: &str, now: DateTime<Utc>) -> String {
        self.digest(action, tick(now))
    }

    pub fn verify(&self, action: &str, nonce: &str, now: DateTime<Utc>) -> Result<()> {
        let current = tick(now);
        let valid = [current, current - 1]
            .iter()
            .any(|t| constant_time_eq(self.digest(action, *t).as_bytes(), nonce.as_bytes()));

        if valid { Ok(()) } else { Err(Error::InvalidNonce) }
    }

    fn digest(&self, action: &str, tick: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(b"|");
        hasher.update(action.as_bytes());
        hasher.update(b"|");
        hasher.update(tick.to_string().as_bytes());
        hex::encode(&hasher.finalize()[..NONCE_BYTES])
    }
}

fn tick(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(NONCE_LIFETIME_SECS / 2)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
