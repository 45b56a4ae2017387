//! Services built on the ledger: file notarization and dead-drop messaging

pub mod dead_drop;
pub mod notary;

pub use dead_drop::{receive, seal, DeadDrop, InboxEntry, DEAD_DROP_INFO};
pub use notary::{NotarizationRecord, Notary, VerificationResult};
