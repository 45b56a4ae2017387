//! Ledger integration tests
//!
//! End-to-end flows across the ledger, its sled store and the notary and
//! dead-drop services.

use datum_chain::core::{fold_balance, ChainRegistry};
use datum_chain::{
    ChainConfig, DeadDrop, IntegrityViolation, Ledger, LedgerError, Notary, VerificationResult,
    Wallet,
};
use std::collections::BTreeMap;
use std::fs;
use std::thread;
use tempfile::tempdir;

fn config_with(name: &str, difficulty: u32, premine: &[(&Wallet, u64)]) -> ChainConfig {
    let premine: BTreeMap<String, u64> = premine
        .iter()
        .map(|(wallet, amount)| (wallet.get_address(), *amount))
        .collect();
    ChainConfig::new(name)
        .with_difficulty(difficulty)
        .with_premine(premine)
}

#[test]
fn test_new_chain_has_premined_genesis() {
    let alice = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("genesis", 4, &[(&alice, 100)])).unwrap();

    assert_eq!(ledger.height(), 0);
    assert_eq!(ledger.balance_of(&alice.get_address()), 100);
    assert!(ledger.validate_chain().is_ok());
}

#[test]
fn test_transfer_is_pending_until_mined() {
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("transfer", 6, &[(&alice, 100)])).unwrap();

    ledger
        .submit_transfer(&alice, &bob.get_address(), 30)
        .unwrap();
    assert_eq!(ledger.balance_of(&alice.get_address()), 100);
    assert_eq!(ledger.balance_of(&bob.get_address()), 0);

    let summary = ledger.mine().unwrap();
    assert_eq!(summary.index, 1);
    assert_eq!(summary.transaction_count, 1);
    assert_eq!(ledger.balance_of(&alice.get_address()), 70);
    assert_eq!(ledger.balance_of(&bob.get_address()), 30);
    assert!(ledger.pending_transactions().is_empty());
    assert!(ledger.validate_chain().is_ok());
}

#[test]
fn test_transfers_conserve_total_supply() {
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();
    let carol = Wallet::new().unwrap();
    let ledger =
        Ledger::in_memory(config_with("supply", 4, &[(&alice, 100), (&bob, 50)])).unwrap();

    ledger.submit_transfer(&alice, &bob.get_address(), 40).unwrap();
    ledger.submit_transfer(&bob, &carol.get_address(), 50).unwrap();
    ledger.mine().unwrap();
    ledger.submit_transfer(&bob, &alice.get_address(), 40).unwrap();
    ledger.submit_transfer(&carol, &alice.get_address(), 25).unwrap();
    ledger.mine().unwrap();

    let total: u64 = [&alice, &bob, &carol]
        .iter()
        .map(|wallet| ledger.balance_of(&wallet.get_address()))
        .sum();
    assert_eq!(total, 150);
    assert_eq!(ledger.balance_of(&alice.get_address()), 125);
    assert_eq!(ledger.balance_of(&bob.get_address()), 0);
    assert_eq!(ledger.balance_of(&carol.get_address()), 25);

    // Replaying every block by hand agrees with the ledger.
    let replayed = ledger.with_blocks(|blocks| {
        fold_balance(
            blocks.iter().flat_map(|block| block.get_transactions()),
            &alice.get_address(),
        )
    });
    assert_eq!(replayed, 125);
}

#[test]
fn test_overdraft_leaves_mempool_untouched() {
    let alice = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("overdraft", 4, &[(&alice, 10)])).unwrap();

    let err = ledger.submit_transfer(&alice, "bob", 11).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            required: 11,
            available: 10,
            ..
        }
    ));
    assert!(ledger.pending_transactions().is_empty());

    // Nobody without a premine can send anything.
    let stranger = Wallet::new().unwrap();
    assert!(ledger.submit_transfer(&stranger, "bob", 1).is_err());
    assert!(ledger.pending_transactions().is_empty());
}

#[test]
fn test_zero_amount_transfer_rejected() {
    let alice = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("zero", 4, &[(&alice, 10)])).unwrap();

    assert!(matches!(
        ledger.submit_transfer(&alice, "bob", 0),
        Err(LedgerError::InvalidTransaction(_))
    ));
}

#[test]
fn test_empty_blocks_keep_chain_valid() {
    let ledger = Ledger::in_memory(ChainConfig::new("empty").with_difficulty(4)).unwrap();

    ledger.mine().unwrap();
    let second = ledger.mine().unwrap();

    assert_eq!(second.index, 2);
    assert_eq!(second.transaction_count, 0);
    assert!(ledger.validate_chain().is_ok());
}

#[test]
fn test_mining_reward_credits_miner() {
    let config = ChainConfig::new("reward")
        .with_difficulty(4)
        .with_mining_reward("miner", 7);
    let ledger = Ledger::in_memory(config).unwrap();

    ledger.mine().unwrap();
    ledger.mine().unwrap();
    assert_eq!(ledger.balance_of("miner"), 14);
}

#[test]
fn test_notarize_then_verify_and_detect_change() {
    let alice = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("notary", 4, &[])).unwrap();
    let notary = Notary::new(&ledger);

    notary
        .notarize(&alice, "alice", "contract.pdf", b"original terms")
        .unwrap();
    // Pending records prove nothing yet.
    assert_eq!(
        notary.verify(Some("contract.pdf"), b"original terms"),
        VerificationResult::NotFound
    );

    ledger.mine().unwrap();
    match notary.verify(Some("contract.pdf"), b"original terms") {
        VerificationResult::Verified {
            first_seen_block_index,
            owner,
            ..
        } => {
            assert_eq!(first_seen_block_index, 1);
            assert_eq!(owner, "alice");
        }
        other => panic!("expected Verified, got {other:?}"),
    }

    assert!(matches!(
        notary.verify(Some("contract.pdf"), b"original terms, amended"),
        VerificationResult::Modified {
            latest_block_index: 1,
            ..
        }
    ));
    assert_eq!(
        notary.verify(None, b"original terms, amended"),
        VerificationResult::NotFound
    );
}

#[test]
fn test_notarize_file_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.txt");
    fs::write(&path, b"quarterly numbers").unwrap();

    let alice = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("files", 4, &[])).unwrap();
    let notary = Notary::new(&ledger);
    notary.notarize_file(&alice, "alice", &path).unwrap();
    ledger.mine().unwrap();

    assert!(matches!(
        notary.verify_file(&path).unwrap(),
        VerificationResult::Verified { .. }
    ));

    fs::write(&path, b"quarterly numbers (revised)").unwrap();
    notary.notarize_file(&alice, "alice", &path).unwrap();
    ledger.mine().unwrap();

    let history = notary.history("report.txt");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].block_index, 1);
    assert_eq!(history[1].block_index, 2);
    assert_ne!(history[0].file_hash, history[1].file_hash);
}

#[test]
fn test_dead_drop_round_trip() {
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("drop", 4, &[])).unwrap();
    let dead_drop = DeadDrop::new(&ledger);

    let id = dead_drop
        .send_message(&alice, &bob.get_inbox_key(), b"meet at noon")
        .unwrap();
    ledger.mine().unwrap();

    assert_eq!(dead_drop.receive_message(&bob, &id).unwrap(), b"meet at noon");

    let inbox = dead_drop.inbox(&bob.get_inbox_key()).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].transaction_id, id);
    assert_eq!(inbox[0].sender, alice.get_address());
    assert!(dead_drop.inbox(&alice.get_inbox_key()).unwrap().is_empty());
}

#[test]
fn test_dead_drop_wrong_recipient_cannot_read() {
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();
    let eve = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("eve", 4, &[])).unwrap();
    let dead_drop = DeadDrop::new(&ledger);

    let id = dead_drop
        .send_message(&alice, &bob.get_inbox_key(), b"for bob only")
        .unwrap();
    ledger.mine().unwrap();

    assert!(matches!(
        dead_drop.receive_message(&eve, &id),
        Err(LedgerError::Decryption(_))
    ));
    assert!(matches!(
        dead_drop.receive_message(&bob, "no-such-id"),
        Err(LedgerError::NotFound(_))
    ));
}

#[test]
fn test_chain_and_pending_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("persisted");
    let alice = Wallet::new().unwrap();
    let bob = Wallet::new().unwrap();

    let pending_id = {
        let ledger = Ledger::open(config_with("persisted", 4, &[(&alice, 100)]), &path).unwrap();
        ledger.submit_transfer(&alice, &bob.get_address(), 30).unwrap();
        ledger.mine().unwrap();
        ledger.submit_transfer(&alice, &bob.get_address(), 5).unwrap()
    };

    // Different settings on reopen; the stored chain keeps its own.
    let ledger = Ledger::open(ChainConfig::new("persisted").with_difficulty(12), &path).unwrap();
    assert_eq!(ledger.config().difficulty, 4);
    assert_eq!(ledger.height(), 1);
    assert_eq!(ledger.balance_of(&bob.get_address()), 30);

    let pending = ledger.pending_transactions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id(), pending_id);

    ledger.mine().unwrap();
    assert_eq!(ledger.balance_of(&bob.get_address()), 35);
    assert!(ledger.validate_chain().is_ok());
}

#[test]
fn test_corrupt_block_fails_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt");
    {
        let ledger = Ledger::open(ChainConfig::new("corrupt").with_difficulty(4), &path).unwrap();
        ledger.mine().unwrap();
    }
    {
        let db = sled::open(&path).unwrap();
        let blocks = db.open_tree("blocks").unwrap();
        blocks.insert(&1u64.to_be_bytes()[..], &b"not a block"[..]).unwrap();
        db.flush().unwrap();
    }

    let result = Ledger::open(ChainConfig::new("corrupt").with_difficulty(4), &path);
    assert!(matches!(result, Err(LedgerError::Encoding(_))));
}

#[test]
fn test_reordered_blocks_fail_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reordered");
    {
        let ledger = Ledger::open(ChainConfig::new("reordered").with_difficulty(4), &path).unwrap();
        ledger.mine().unwrap();
        ledger.mine().unwrap();
    }
    {
        let db = sled::open(&path).unwrap();
        let blocks = db.open_tree("blocks").unwrap();
        let first = blocks.get(1u64.to_be_bytes()).unwrap().unwrap();
        let second = blocks.get(2u64.to_be_bytes()).unwrap().unwrap();
        blocks.insert(&1u64.to_be_bytes()[..], second).unwrap();
        blocks.insert(&2u64.to_be_bytes()[..], first).unwrap();
        db.flush().unwrap();
    }

    let result = Ledger::open(ChainConfig::new("reordered").with_difficulty(4), &path);
    assert_eq!(
        result.err(),
        Some(LedgerError::ChainIntegrity {
            index: 1,
            violation: IntegrityViolation::IndexOutOfSequence,
        })
    );
}

#[test]
fn test_submissions_during_mining() {
    let alice = Wallet::new().unwrap();
    let ledger = Ledger::in_memory(config_with("busy", 14, &[(&alice, 1_000)])).unwrap();

    thread::scope(|scope| {
        let miner = scope.spawn(|| ledger.mine());
        for _ in 0..10 {
            ledger.submit_transfer(&alice, "bob", 1).unwrap();
            assert!(ledger.balance_of(&alice.get_address()) >= 990);
        }
        miner.join().unwrap().unwrap();
    });

    // Whatever missed the first block is still pending; mine it too.
    if !ledger.pending_transactions().is_empty() {
        ledger.mine().unwrap();
    }
    assert!(ledger.pending_transactions().is_empty());
    assert_eq!(ledger.balance_of("bob"), 10);
    assert_eq!(ledger.balance_of(&alice.get_address()), 990);
    assert!(ledger.validate_chain().is_ok());
}

#[test]
fn test_registry_keeps_chains_apart() {
    let dir = tempdir().unwrap();
    let registry = ChainRegistry::new(dir.path());
    let alice = Wallet::new().unwrap();

    let main = registry
        .open(config_with("main", 4, &[(&alice, 100)]))
        .unwrap();
    let audit = registry.open(config_with("audit", 4, &[])).unwrap();

    main.submit_transfer(&alice, "bob", 10).unwrap();
    main.mine().unwrap();

    assert_eq!(main.height(), 1);
    assert_eq!(audit.height(), 0);
    assert_eq!(audit.balance_of(&alice.get_address()), 0);
    assert_eq!(registry.names(), vec!["audit".to_string(), "main".to_string()]);
}
