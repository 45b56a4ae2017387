use crate::core::block::BlockSummary;
use crate::core::ledger::Ledger;
use crate::core::proof_of_work::{MiningOutcome, ProofOfWork};
use crate::error::{IntegrityViolation, LedgerError, Result};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// How many times a build restarts after the tip moved underneath it
pub const MAX_STALE_RETRIES: usize = 3;

/// Shared flag that stops a running search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Turns the mempool of one ledger into a block
pub struct Miner<'a> {
    ledger: &'a Ledger,
    cancel: CancelToken,
}

impl<'a> Miner<'a> {
    pub fn new(ledger: &'a Ledger) -> Miner<'a> {
        Miner {
            ledger,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(ledger: &'a Ledger, cancel: CancelToken) -> Miner<'a> {
        Miner { ledger, cancel }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn mine(&self) -> Result<BlockSummary> {
        let _session = self.ledger.begin_mining();

        for attempt in 0..=MAX_STALE_RETRIES {
            let candidate = self.ledger.build_candidate()?;
            let expected_tip = candidate.get_previous_hash().to_string();
            info!(
                "Mining block {} of '{}' with {} transactions (difficulty: {})",
                candidate.get_index(),
                self.ledger.name(),
                candidate.get_transactions().len(),
                candidate.get_difficulty()
            );

            let pow = ProofOfWork::new_proof_of_work(&candidate);
            let should_abort =
                || self.cancel.is_cancelled() || self.ledger.tip_hash() != expected_tip;
            let outcome = thread::scope(|scope| scope.spawn(|| pow.run(&should_abort)).join())
                .map_err(|_| LedgerError::Mining("proof-of-work worker panicked".to_string()))?;

            match outcome {
                MiningOutcome::Found { nonce, hash } => {
                    match self.ledger.append_block(candidate.seal(nonce, hash)) {
                        Ok(summary) => return Ok(summary),
                        Err(LedgerError::ChainIntegrity {
                            violation:
                                IntegrityViolation::IndexOutOfSequence
                                | IntegrityViolation::BadPreviousHash,
                            ..
                        }) => {
                            warn!("Tip moved before block could be appended (attempt {attempt})");
                        }
                        Err(e) => return Err(e),
                    }
                }
                MiningOutcome::Aborted { attempts } => {
                    if self.cancel.is_cancelled() {
                        warn!("Mining cancelled after {attempts} attempts");
                        return Err(LedgerError::Mining("mining was cancelled".to_string()));
                    }
                    warn!("Tip moved after {attempts} attempts; restarting on the new tip");
                }
            }
        }

        Err(LedgerError::Mining(format!(
            "chain tip kept moving; gave up after {} attempts",
            MAX_STALE_RETRIES + 1
        )))
    }
}
