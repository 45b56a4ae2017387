use crate::core::Block;
use data_encoding::HEXLOWER;
use log::debug;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

/// Attempts between checks of the abort signal
pub const CHECK_INTERVAL: u64 = 4096;

pub enum MiningOutcome {
    Found { nonce: u64, hash: String },
    Aborted { attempts: u64 },
}

pub struct ProofOfWork {
    prefix: Vec<u8>,
    target: BigInt,
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new_proof_of_work(block: &Block) -> ProofOfWork {
        let difficulty = block.get_difficulty();
        ProofOfWork {
            prefix: block.header_prefix(),
            target: Self::target_for(difficulty),
            difficulty,
        }
    }

    /// 2^(256 - difficulty): a hash below it has `difficulty` leading zero bits
    pub fn target_for(difficulty: u32) -> BigInt {
        let mut target = BigInt::from(1);
        target.shl_assign(256u32.saturating_sub(difficulty));
        target
    }

    /// Check a block's stored nonce against the difficulty it records
    pub fn validate(block: &Block) -> bool {
        let pow = ProofOfWork::new_proof_of_work(block);
        let hash = Block::hash_with_nonce(&pow.prefix, block.get_nonce());
        pow.meets_target(&hash)
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    /// Search nonces from zero until the target is met. `should_abort` is
    /// polled every [`CHECK_INTERVAL`] attempts.
    pub fn run(&self, should_abort: &dyn Fn() -> bool) -> MiningOutcome {
        let mut nonce: u64 = 0;
        loop {
            if nonce % CHECK_INTERVAL == 0 && nonce > 0 && should_abort() {
                debug!("Proof-of-work aborted after {nonce} attempts");
                return MiningOutcome::Aborted { attempts: nonce };
            }
            let hash = Block::hash_with_nonce(&self.prefix, nonce);
            if self.meets_target(&hash) {
                debug!(
                    "Proof-of-work found nonce {nonce} at difficulty {}",
                    self.difficulty
                );
                return MiningOutcome::Found {
                    nonce,
                    hash: HEXLOWER.encode(&hash),
                };
            }
            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => return MiningOutcome::Aborted { attempts: nonce },
            };
        }
    }
}
