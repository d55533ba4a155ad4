//! Proof-of-work admission puzzle.
//!
//! Independent, stateless utility: a client asked to prove work must
//! find a nonce whose SHA-256 over `data ++ nonce` hex-encodes to a
//! string with `difficulty` leading zeros. Verification is one hash;
//! solving costs `16^difficulty` expected attempts.

use sha2::{Digest, Sha256};

/// Hash-puzzle generator and verifier.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: usize,
    target: String,
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            target: "0".repeat(difficulty),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Solve the puzzle: smallest nonce (counted from 0) satisfying the
    /// difficulty predicate.
    pub fn generate_nonce(&self, data: &str) -> String {
        let mut nonce: u64 = 0;
        loop {
            if self.hash_hex(data, &nonce.to_string()).starts_with(&self.target) {
                return nonce.to_string();
            }
            nonce += 1;
        }
    }

    /// Recompute the hash and check the difficulty predicate.
    pub fn verify(&self, data: &str, nonce: &str) -> bool {
        self.hash_hex(data, nonce).starts_with(&self.target)
    }

    fn hash_hex(&self, data: &str, nonce: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hasher.update(nonce.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_nonce_verifies() {
        // Difficulty 2 keeps the expected work at 256 attempts.
        let pow = ProofOfWork::new(2);
        let nonce = pow.generate_nonce("challenge-data");
        assert!(pow.verify("challenge-data", &nonce));
    }

    #[test]
    fn nonce_is_deterministic_for_fixed_input() {
        let pow = ProofOfWork::new(2);
        assert_eq!(pow.generate_nonce("abc"), pow.generate_nonce("abc"));
    }

    #[test]
    fn wrong_nonce_fails_verification() {
        let pow = ProofOfWork::new(3);
        // A fixed arbitrary nonce has a 16^-3 chance of passing.
        assert!(!pow.verify("challenge-data", "12345"));
    }

    #[test]
    fn nonce_does_not_transfer_between_payloads() {
        let pow = ProofOfWork::new(2);
        let nonce = pow.generate_nonce("payload-a");
        assert!(!pow.verify("payload-b", &nonce) || nonce == pow.generate_nonce("payload-b"));
    }

    #[test]
    fn zero_difficulty_accepts_anything() {
        let pow = ProofOfWork::new(0);
        assert_eq!(pow.generate_nonce("x"), "0");
        assert!(pow.verify("x", "anything"));
    }
}
