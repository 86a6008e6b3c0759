//! Session identifier generation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::config::DEFAULT_ID_BYTES;
use crate::error::{Error, Result};

/// Characters of an identifier that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

/// Loggable form of a session identifier.
///
/// Identifiers are bearer credentials, so logs only carry a prefix.
pub(crate) fn log_id(id: &str) -> &str {
    id.get(..LOG_PREFIX_LEN).unwrap_or(id)
}

/// Source of fresh session identifiers.
///
/// Closures returning `Result<String>` implement this too, which keeps
/// tests free of real randomness.
pub trait IdGenerator: Send + Sync + 'static {
    /// Produce a new candidate identifier.
    fn generate(&self) -> Result<String>;
}

impl<F> IdGenerator for F
where
    F: Fn() -> Result<String> + Send + Sync + 'static,
{
    fn generate(&self) -> Result<String> {
        self()
    }
}

/// Identifiers drawn from the operating system RNG.
///
/// Each identifier is `byte_len` random bytes, encoded as unpadded
/// URL-safe base64, so every token has the same length and can travel in
/// a cookie or header without escaping.
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    byte_len: usize,
}

impl RandomIdGenerator {
    /// Create a generator drawing `byte_len` bytes per identifier.
    pub fn new(byte_len: usize) -> Self {
        Self { byte_len }
    }

    /// Bytes of entropy per identifier.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Length of every token this generator produces.
    pub fn token_len(&self) -> usize {
        (self.byte_len * 4).div_ceil(3)
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_BYTES)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> Result<String> {
        let mut bytes = vec![0u8; self.byte_len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::RandomSourceExhausted(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tokens_are_fixed_length_and_url_safe() {
        let generator = RandomIdGenerator::new(32);
        assert_eq!(generator.token_len(), 43);

        for _ in 0..50 {
            let id = generator.generate().unwrap();
            assert_eq!(id.len(), generator.token_len());
            assert!(
                id.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
                "unexpected character in {id}"
            );
        }
    }

    #[test]
    fn test_token_len_for_odd_widths() {
        let generator = RandomIdGenerator::new(16);
        assert_eq!(generator.generate().unwrap().len(), generator.token_len());
        assert_eq!(generator.token_len(), 22);
    }

    #[test]
    fn test_tokens_are_distinct() {
        let generator = RandomIdGenerator::default();
        let ids: HashSet<String> = (0..1000).map(|_| generator.generate().unwrap()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_log_id_truncates() {
        assert_eq!(log_id("abcdefghijklmnop"), "abcdefgh");
        assert_eq!(log_id("short"), "short");
    }

    #[test]
    fn test_closure_generator() {
        let generator = || -> Result<String> { Ok("fixed".to_string()) };
        assert_eq!(IdGenerator::generate(&generator).unwrap(), "fixed");
    }
}
