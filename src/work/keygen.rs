//! Key-pair generation as a CPU-bound stand-in for real work.

use alloy::signers::local::PrivateKeySigner;
use rand::Rng;

use crate::config::WorkConfig;
use crate::work::{SimulatedWork, WorkArtifact};

/// Generates a random number of secp256k1 key pairs per request.
///
/// The round count varies per call, which gives the latency spread.
#[derive(Debug, Clone)]
pub struct KeypairWork {
    min_rounds: u32,
    max_rounds: u32,
}

impl KeypairWork {
    pub fn new(min_rounds: u32, max_rounds: u32) -> Self {
        let min_rounds = min_rounds.max(1);
        Self {
            min_rounds,
            max_rounds: max_rounds.max(min_rounds),
        }
    }

    pub fn from_config(config: &WorkConfig) -> Self {
        Self::new(config.min_rounds, config.max_rounds)
    }
}

impl SimulatedWork for KeypairWork {
    fn perform(&self, _id: u64) -> WorkArtifact {
        let rounds = rand::thread_rng().gen_range(self.min_rounds..=self.max_rounds);

        let mut signer = PrivateKeySigner::random();
        for _ in 1..rounds {
            signer = PrivateKeySigner::random();
        }

        WorkArtifact {
            key: signer.address().to_string(),
            rounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_within_bounds() {
        let work = KeypairWork::new(2, 3);
        for id in 0..5 {
            let artifact = work.perform(id);
            assert!((2..=3).contains(&artifact.rounds));
            assert!(artifact.key.starts_with("0x"));
            assert_eq!(artifact.key.len(), 42);
        }
    }

    #[test]
    fn test_degenerate_bounds_are_fixed_up() {
        let work = KeypairWork::new(0, 0);
        assert_eq!(work.perform(0).rounds, 1);
    }
}
