//! Lending and repair engine for a university library.
//!
//! Members borrow physical copies of catalogued resources under a borrow
//! limit that grows with clean returns. Every successful borrow and return is
//! written to an append-only ledger, and damaged copies go through a
//! probabilistic repair workflow with a sweep for archived resources.
//!
//! The engine is safe to share between threads: each resource and each member
//! account is locked independently, so unrelated requests never contend.

pub mod catalog;
pub mod config;
pub mod copy_pool;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod member;
pub mod observers;
pub mod ranking;
pub mod repair;
pub mod resource;
pub mod timestamp;

pub use catalog::Catalog;
pub use config::LibraryConfig;
pub use copy_pool::{CopyId, CopyPool, PhysicalCopy};
pub use engine::{BorrowReceipt, EngineSnapshot, LendingEngine, ReturnReceipt};
pub use error::{ConfigError, IngestError, LendingError};
pub use ingest::IngestReport;
pub use ledger::{Transaction, TransactionKind, TransactionLedger};
pub use member::{MemberAccount, MemberId, MemberKind};
pub use observers::{LendingEvent, LendingObserver, NotificationService, TransitionLogger};
pub use repair::{
    FixedPolicy, RandomPolicy, RepairDecision, RepairPolicy, RepairWorkflow, ScriptedPolicy,
    SweepReport,
};
pub use resource::{Resource, ResourceId, ResourceKind};
