//! Verification code generation.

use rand::{Rng, rngs::OsRng};

/// Base32 alphabet used for one-time secrets.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Produces random single-use codes. No uniqueness guarantee beyond collision
/// resistance at the requested length.
pub trait CodeGenerator: Send + Sync {
    fn random(&self, length: usize) -> String;
}

#[derive(Clone, Debug, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn random(&self, length: usize) -> String {
        let length = length.max(1);
        let mut rng = OsRng;
        (0..length)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_respects_length_and_alphabet() {
        let code = RandomCodeGenerator.random(8);
        assert_eq!(code.len(), 8);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn zero_length_is_normalized() {
        assert_eq!(RandomCodeGenerator.random(0).len(), 1);
    }

    #[test]
    fn codes_differ() {
        let first = RandomCodeGenerator.random(16);
        let second = RandomCodeGenerator.random(16);
        assert_ne!(first, second);
    }
}
