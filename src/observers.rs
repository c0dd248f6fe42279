use tracing::{debug, info};

use crate::{
    copy_pool::CopyId,
    error::LendingError,
    ledger::TransactionId,
    member::MemberId,
    repair::{RepairDecision, SweepReport},
    resource::ResourceId,
};

/// Something that happened in the lending engine
#[derive(Debug, Clone, PartialEq)]
pub enum LendingEvent {
    /// A copy was lent
    Borrowed {
        /// Borrowing member
        member: MemberId,
        /// Resource lent
        resource: ResourceId,
        /// Copy handed out
        copy: CopyId,
        /// Ledger entry
        transaction: TransactionId,
    },
    /// A copy came back
    Returned {
        /// Returning member
        member: MemberId,
        /// Resource returned
        resource: ResourceId,
        /// Copy taken back
        copy: CopyId,
        /// Whether it came back damaged
        damaged: bool,
        /// Ledger entry
        transaction: TransactionId,
    },
    /// A request was refused or named something unknown
    Rejected {
        /// Why it did not go through
        error: LendingError,
    },
    /// A clean return raised the member's entitlement
    LoyaltyRaised {
        /// Member rewarded
        member: MemberId,
        /// New borrow limit
        borrow_limit: usize,
        /// New loyalty point total
        loyalty_points: u32,
    },
    /// The repair workflow handled a damaged resource
    RepairDecided {
        /// Resource handled
        resource: ResourceId,
        /// Outcome
        decision: RepairDecision,
    },
    /// A maintenance sweep over the archive finished
    SweepFinished(SweepReport),
}

/// Trait for lending event observation
pub trait LendingObserver: Send + Sync {
    /// Called after the engine applied a change or refused a request
    fn on_event(&self, event: &LendingEvent);
}

/// Logs every event through `tracing`
#[derive(Debug)]
pub struct TransitionLogger;

impl LendingObserver for TransitionLogger {
    fn on_event(&self, event: &LendingEvent) {
        debug!(target: "circulation::transitions", ?event, "lending event");
    }
}

/// Announces the events a member or librarian would be told about
#[derive(Debug)]
pub struct NotificationService;

impl LendingObserver for NotificationService {
    fn on_event(&self, event: &LendingEvent) {
        match event {
            LendingEvent::Borrowed { member, resource, .. } => {
                info!(target: "circulation::notify", %member, %resource, "resource has been checked out");
            }
            LendingEvent::Returned { member, resource, damaged: true, .. } => {
                info!(target: "circulation::notify", %member, %resource, "resource returned damaged, sent for repair");
            }
            LendingEvent::LoyaltyRaised { member, borrow_limit, .. } => {
                info!(target: "circulation::notify", %member, borrow_limit, "borrow limit raised");
            }
            LendingEvent::RepairDecided {
                resource,
                decision: RepairDecision::Repaired { restored, .. },
            } if *restored > 0 => {
                info!(target: "circulation::notify", %resource, restored, "resource has been repaired");
            }
            _ => {}
        }
    }
}
