//! # Draw Randomness
//!
//! Every draw request gets its own `ChaCha20Rng`, seeded from a server secret
//! the client never sees:
//!
//! ```text
//! seed = SipHash-2-4-128(secret[0..2], subject ‖ scope ‖ nonce)
//!      ‖ SipHash-2-4-128(secret[2..4], subject ‖ scope ‖ nonce)
//! ```
//!
//! The nonce is a process-wide monotonic counter, so two identical requests
//! never share a stream. Knowing the subject and pool is not enough to
//! pre-compute outcomes without the secret.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use siphasher::sip128::{Hash128, Hasher128, SipHasher24};

use crate::error::ConfigError;

/// Server-side secret for draw seeding.
///
/// The secret must come from a CSPRNG and must never be logged; `Debug`
/// redacts it.
#[derive(Clone)]
pub struct SecureSeed {
    secret: [u64; 4],
}

impl SecureSeed {
    /// Creates a seed from 32 secret bytes.
    #[must_use]
    pub fn new(secret: &[u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(secret.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        Self { secret: words }
    }

    /// Parses 64 hexadecimal characters.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for the wrong length or a non-hex digit.
    pub fn from_hex(text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        if text.len() != 64 || !text.is_ascii() {
            return Err(ConfigError::Invalid(
                "rng_secret must be 64 hex characters".to_string(),
            ));
        }
        let mut bytes = [0u8; 32];
        for (byte, pair) in bytes.iter_mut().zip(text.as_bytes().chunks_exact(2)) {
            let pair = std::str::from_utf8(pair)
                .map_err(|_| ConfigError::Invalid("rng_secret is not ascii".to_string()))?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                ConfigError::Invalid(format!("rng_secret has a non-hex digit in '{pair}'"))
            })?;
        }
        Ok(Self::new(&bytes))
    }

    /// A fixed seed for tests and local runs (NOT FOR PRODUCTION).
    #[must_use]
    pub const fn test_seed() -> Self {
        Self {
            secret: [
                0x1234_5678_9ABC_DEF0,
                0xFEDC_BA98_7654_3210,
                0xAAAA_BBBB_CCCC_DDDD,
                0x1111_2222_3333_4444,
            ],
        }
    }

    /// Derives the 32-byte ChaCha seed for one request.
    #[must_use]
    pub fn derive(&self, subject: &str, scope: &str, nonce: u64) -> [u8; 32] {
        let low = keyed_hash(self.secret[0], self.secret[1], subject, scope, nonce);
        let high = keyed_hash(self.secret[2], self.secret[3], subject, scope, nonce);

        let mut seed = [0u8; 32];
        for (chunk, word) in seed
            .chunks_exact_mut(8)
            .zip([low.h1, low.h2, high.h1, high.h2])
        {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        seed
    }
}

#[inline]
fn keyed_hash(k0: u64, k1: u64, subject: &str, scope: &str, nonce: u64) -> Hash128 {
    let mut hasher = SipHasher24::new_with_keys(k0, k1);
    // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
    hasher.write_usize(subject.len());
    hasher.write(subject.as_bytes());
    hasher.write_usize(scope.len());
    hasher.write(scope.as_bytes());
    hasher.write_u64(nonce);
    hasher.finish128()
}

impl Default for SecureSeed {
    fn default() -> Self {
        Self::test_seed()
    }
}

impl std::fmt::Debug for SecureSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSeed")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Hands out one fresh RNG per request.
#[derive(Debug)]
pub struct RngFactory {
    seed: SecureSeed,
    nonce: AtomicU64,
}

impl RngFactory {
    /// Creates a factory over `seed`.
    #[must_use]
    pub const fn new(seed: SecureSeed) -> Self {
        Self {
            seed,
            nonce: AtomicU64::new(0),
        }
    }

    /// A new RNG for `subject` drawing from `scope`; consumes one nonce.
    #[must_use]
    pub fn rng_for(&self, subject: &str, scope: &str) -> ChaCha20Rng {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        ChaCha20Rng::from_seed(self.seed.derive(subject, scope, nonce))
    }

    /// Nonces handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.nonce.load(Ordering::Relaxed)
    }
}
