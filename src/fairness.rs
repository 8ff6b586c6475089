//! Per-round seed commitments.
//!
//! Every round draws all of its randomness from one 32-byte seed chosen when
//! the stake is taken. The SHA-256 of that seed is available from the moment
//! the round starts, so the outcome is fixed before any animation runs. After
//! settlement the seed itself is revealed and anyone can check it against the
//! commitment and replay the draw.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Secret seed for a single round
#[derive(Clone)]
pub struct RoundSeed {
    seed: [u8; 32],
}

impl RoundSeed {
    /// Fresh seed from the operating system
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self { seed }
    }

    /// Seed derived from a caller-supplied generator (deterministic sessions and tests)
    pub fn from_rng<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { seed }
    }

    pub fn from_bytes(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    /// Hex-encoded SHA-256 of the seed
    pub fn commitment(&self) -> String {
        hex::encode(Sha256::digest(self.seed))
    }

    /// Generator every draw of the round comes from
    pub fn rng(&self) -> StdRng {
        StdRng::from_seed(self.seed)
    }

    pub fn reveal(&self) -> SeedReveal {
        SeedReveal {
            commitment: self.commitment(),
            seed: hex::encode(self.seed),
        }
    }
}

impl std::fmt::Debug for RoundSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The seed stays secret until settlement.
        f.debug_struct("RoundSeed")
            .field("commitment", &self.commitment())
            .finish()
    }
}

/// Seed and commitment published with a settled round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedReveal {
    pub commitment: String,
    pub seed: String,
}

impl SeedReveal {
    /// Check that the revealed seed hashes to the commitment
    pub fn verify(&self) -> Result<bool, String> {
        let seed = hex::decode(&self.seed).map_err(|e| format!("Invalid seed hex: {}", e))?;
        if seed.len() != 32 {
            return Err(format!("Seed must be 32 bytes, got {}", seed.len()));
        }
        Ok(hex::encode(Sha256::digest(&seed)) == self.commitment)
    }

    /// Rebuild the round generator from the revealed seed
    pub fn replay_rng(&self) -> Result<StdRng, String> {
        let seed = hex::decode(&self.seed).map_err(|e| format!("Invalid seed hex: {}", e))?;
        let seed: [u8; 32] = seed.try_into().map_err(|_| "Seed must be 32 bytes".to_string())?;
        Ok(StdRng::from_seed(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_reveal_verifies() {
        let seed = RoundSeed::generate();
        let reveal = seed.reveal();
        assert_eq!(reveal.commitment, seed.commitment());
        assert!(reveal.verify().unwrap());
    }

    #[test]
    fn test_tampered_seed_fails() {
        let mut reveal = RoundSeed::from_bytes([7u8; 32]).reveal();
        reveal.seed = hex::encode([8u8; 32]);
        assert!(!reveal.verify().unwrap());

        reveal.seed = "zz".to_string();
        assert!(reveal.verify().is_err());
    }

    #[test]
    fn test_replay_reproduces_draws() {
        let seed = RoundSeed::from_bytes([3u8; 32]);
        let original: Vec<u32> = {
            let mut rng = seed.rng();
            (0..8).map(|_| rng.gen()).collect()
        };

        let mut replay = seed.reveal().replay_rng().unwrap();
        let replayed: Vec<u32> = (0..8).map(|_| replay.gen()).collect();
        assert_eq!(original, replayed);
    }
}
