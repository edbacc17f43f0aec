use crate::{Generator, ALPHABET, DEFAULT_CODE_LENGTH};
use rand::Rng;
use shorty_core::ShortCode;

/// Draws each character uniformly at random from [`ALPHABET`].
///
/// With the default length of 6 the keyspace is 62^6 (about 5.7e10) codes.
/// Uniqueness is not guaranteed here; the engine retries on collision.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_CODE_LENGTH)
    }

    /// Creates a generator producing codes of `length` characters.
    ///
    /// Lengths below 3 are raised to 3 to keep the keyspace from
    /// collapsing.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.max(3),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortCode {
        let mut rng = rand::rng();
        let code: String = (0..self.length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        ShortCode::new(code)
    }
}
