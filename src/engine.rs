use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    catalog::{Catalog, ResourceHandle},
    config::LibraryConfig,
    copy_pool::{CopyId, CopyRepair},
    error::LendingError,
    ledger::{Transaction, TransactionId, TransactionKind, TransactionLedger},
    member::{MemberAccount, MemberId, MemberKind},
    observers::{LendingEvent, LendingObserver, NotificationService, TransitionLogger},
    repair::{RandomPolicy, RepairDecision, RepairPolicy, RepairStats, RepairWorkflow, SweepReport},
    resource::Resource,
};

/// Shared handle to one member account
type MemberHandle = Arc<Mutex<MemberAccount>>;

/// Registered members and their lookup index
#[derive(Debug, Default)]
struct MemberRegistry {
    /// Accounts in registration order
    order: Vec<MemberHandle>,
    /// Position of each account in `order`
    index: HashMap<MemberId, usize>,
}

/// Proof of a successful borrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BorrowReceipt {
    /// Ledger entry
    pub transaction: TransactionId,
    /// Copy handed out
    pub copy: CopyId,
}

/// Proof of a successful return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReturnReceipt {
    /// Ledger entry
    pub transaction: TransactionId,
    /// Copy taken back
    pub copy: CopyId,
    /// Whether this return raised the member's borrow limit
    pub loyalty_raised: bool,
    /// What the repair workflow did, for damaged returns
    pub repair: Option<RepairDecision>,
}

/// Serializable picture of the whole engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSnapshot {
    /// Catalog in catalog order
    pub resources: Vec<Resource>,
    /// Members in registration order
    pub members: Vec<MemberAccount>,
    /// Ledger, oldest first
    pub transactions: Vec<Transaction>,
    /// Repair counters and archive
    pub repair: RepairStats,
}

/// Orchestrates members, catalog, ledger and repairs
///
/// Every operation locks the member before the resource, and the ledger or
/// the repair state only after the resource, so concurrent callers cannot
/// deadlock. Ledger entries are written while the member is still locked, so
/// one member's entries appear in the order their requests took effect.
pub struct LendingEngine {
    /// Active configuration
    config: LibraryConfig,
    /// Resources
    catalog: Catalog,
    /// Member accounts
    members: RwLock<MemberRegistry>,
    /// Borrow and return history
    ledger: TransactionLedger,
    /// Damage handling
    repair: RepairWorkflow,
    /// Registered event observers
    observers: RwLock<Vec<Box<dyn LendingObserver>>>,
}

impl fmt::Debug for LendingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LendingEngine")
            .field("config", &self.config)
            .field("resources", &self.catalog.len())
            .field("members", &self.members.read().order.len())
            .field("transactions", &self.ledger.len())
            .field("repair", &self.repair)
            .field("observers_count", &self.observers.read().len())
            .finish()
    }
}

impl Default for LendingEngine {
    fn default() -> Self {
        Self::new(LibraryConfig::default())
    }
}

impl LendingEngine {
    /// Create an engine whose repair draws come from a standard RNG
    ///
    /// The RNG is seeded from `config.repair.seed` when set.
    #[must_use]
    pub fn new(config: LibraryConfig) -> Self {
        let policy: Box<dyn RepairPolicy> = match config.repair.seed {
            Some(seed) => Box::new(RandomPolicy::seeded(seed)),
            None => Box::new(RandomPolicy::new()),
        };
        Self::with_policy(config, policy)
    }

    /// Create an engine with an explicit repair draw source
    #[must_use]
    pub fn with_policy(config: LibraryConfig, policy: Box<dyn RepairPolicy>) -> Self {
        let repair = RepairWorkflow::new(policy, config.repair.clone());
        Self {
            config,
            catalog: Catalog::new(),
            members: RwLock::new(MemberRegistry::default()),
            ledger: TransactionLedger::new(),
            repair,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Attach the logging and notification observers
    #[must_use]
    pub fn with_standard_observers(self) -> Self {
        self.register_observer(Box::new(TransitionLogger));
        self.register_observer(Box::new(NotificationService));
        self
    }

    /// Register an observer to be notified of lending events
    pub fn register_observer(&self, observer: Box<dyn LendingObserver>) {
        self.observers.write().push(observer);
    }

    /// Notify every observer
    fn notify(&self, event: &LendingEvent) {
        for observer in self.observers.read().iter() {
            observer.on_event(event);
        }
    }

    /// Log and publish a refusal, then hand it back
    fn reject<T>(&self, error: LendingError) -> Result<T, LendingError> {
        debug!(%error, "request rejected");
        self.notify(&LendingEvent::Rejected { error: error.clone() });
        Err(error)
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Add a resource to the end of the catalog
    ///
    /// # Errors
    ///
    /// Returns `LendingError::DuplicateResource` if the id is taken.
    pub fn add_resource(&self, resource: Resource) -> Result<(), LendingError> {
        let id = resource.id().clone();
        self.catalog.add(resource)?;
        info!(resource = %id, "resource catalogued");
        Ok(())
    }

    /// Register a member account as given
    ///
    /// # Errors
    ///
    /// Returns `LendingError::DuplicateMember` if the id is taken.
    pub fn register_member(&self, member: MemberAccount) -> Result<(), LendingError> {
        let mut registry = self.members.write();
        if registry.index.contains_key(member.id()) {
            return Err(LendingError::DuplicateMember(member.id().clone()));
        }
        let id = member.id().clone();
        let position = registry.order.len();
        registry.index.insert(id.clone(), position);
        registry.order.push(Arc::new(Mutex::new(member)));
        info!(member = %id, "member registered");
        Ok(())
    }

    /// Build an account with the configured entitlement and register it
    ///
    /// # Errors
    ///
    /// Returns `LendingError::DuplicateMember` if the id is taken.
    pub fn enroll(
        &self,
        id: impl Into<MemberId>,
        name: impl Into<String>,
        email: impl Into<String>,
        kind: MemberKind,
    ) -> Result<(), LendingError> {
        let member = MemberAccount::new(id, name, email, kind).with_entitlement(
            self.config.lending.initial_borrow_limit,
            self.config.lending.loyalty_interval,
        );
        self.register_member(member)
    }

    /// Look up a member handle
    fn member_handle(&self, id: &str) -> Result<MemberHandle, LendingError> {
        let registry = self.members.read();
        registry
            .index
            .get(id)
            .and_then(|&i| registry.order.get(i))
            .map(Arc::clone)
            .ok_or_else(|| LendingError::MemberNotFound(MemberId::new(id)))
    }

    /// Look up a resource handle
    fn resource_handle(&self, id: &str) -> Result<ResourceHandle, LendingError> {
        self.catalog.handle(id).ok_or_else(|| LendingError::ResourceNotFound(id.into()))
    }

    /// Resolve both parties of a request
    fn resolve(
        &self,
        member_id: &str,
        resource_id: &str,
    ) -> Result<(MemberHandle, ResourceHandle), LendingError> {
        Ok((self.member_handle(member_id)?, self.resource_handle(resource_id)?))
    }

    /// Lend the first available copy of a resource to a member
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` or `ResourceNotFound` for unknown ids,
    /// `BorrowLimitReached` if the member is at their limit and
    /// `NoCopyAvailable` if nothing is on the shelf. No state changes and no
    /// ledger entry is written in any of these cases.
    pub fn borrow(&self, member_id: &str, resource_id: &str) -> Result<BorrowReceipt, LendingError> {
        let (member, resource) = match self.resolve(member_id, resource_id) {
            Ok(handles) => handles,
            Err(error) => return self.reject(error),
        };

        let outcome = {
            let mut account = member.lock();
            let mut item = resource.lock();
            account.borrow(&mut item).map(|copy| {
                let transaction =
                    self.ledger.record(TransactionKind::Borrow, account.id(), item.id());
                (copy, transaction, account.id().clone(), item.id().clone())
            })
        };
        let (copy, transaction, member_id, resource_id) = match outcome {
            Ok(parts) => parts,
            Err(error) => return self.reject(error),
        };

        info!(member = %member_id, resource = %resource_id, %copy, %transaction, "borrowed");
        self.notify(&LendingEvent::Borrowed {
            member: member_id,
            resource: resource_id,
            copy,
            transaction,
        });
        Ok(BorrowReceipt { transaction, copy })
    }

    /// Take back a copy of a resource from a member
    ///
    /// A damaged return flags the copy and hands the resource to the repair
    /// workflow after the ledger entry is written.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` or `ResourceNotFound` for unknown ids and
    /// `NotHeld` if the member holds no copy of the resource. With
    /// `audit_unmatched_returns` set, a `NotHeld` return is still written to
    /// the ledger, and still forwarded to repair if reported damaged.
    pub fn return_resource(
        &self,
        member_id: &str,
        resource_id: &str,
        damaged: bool,
    ) -> Result<ReturnReceipt, LendingError> {
        let (member, resource) = match self.resolve(member_id, resource_id) {
            Ok(handles) => handles,
            Err(error) => return self.reject(error),
        };

        let (outcome, account_view) = {
            let mut account = member.lock();
            let mut item = resource.lock();
            let outcome = match account.return_resource(&mut item, damaged) {
                Ok(returned) => {
                    let transaction =
                        self.ledger.record(TransactionKind::Return, account.id(), item.id());
                    Ok((returned, transaction))
                }
                Err(error) => {
                    let audited = self.config.lending.audit_unmatched_returns.then(|| {
                        self.ledger.record(TransactionKind::Return, account.id(), item.id())
                    });
                    Err((error, audited))
                }
            };
            let view = (
                account.id().clone(),
                item.id().clone(),
                account.borrow_limit(),
                account.loyalty_points(),
            );
            (outcome, view)
        };
        let (member_id, resource_id, borrow_limit, loyalty_points) = account_view;

        let (returned, transaction) = match outcome {
            Ok(parts) => parts,
            Err((error, audited)) => {
                if let Some(transaction) = audited {
                    info!(member = %member_id, resource = %resource_id, %transaction, "unmatched return audited");
                    if damaged {
                        self.send_to_repair(&resource);
                    }
                }
                return self.reject(error);
            }
        };

        info!(member = %member_id, resource = %resource_id, copy = %returned.copy, damaged, %transaction, "returned");
        self.notify(&LendingEvent::Returned {
            member: member_id.clone(),
            resource: resource_id,
            copy: returned.copy,
            damaged,
            transaction,
        });
        if returned.loyalty_raised {
            info!(member = %member_id, borrow_limit, loyalty_points, "loyalty ratchet");
            self.notify(&LendingEvent::LoyaltyRaised {
                member: member_id,
                borrow_limit,
                loyalty_points,
            });
        }

        let repair = damaged.then(|| self.send_to_repair(&resource));
        Ok(ReturnReceipt {
            transaction,
            copy: returned.copy,
            loyalty_raised: returned.loyalty_raised,
            repair,
        })
    }

    /// Hand a resource to the repair workflow and publish the outcome
    fn send_to_repair(&self, resource: &ResourceHandle) -> RepairDecision {
        let (resource_id, decision) = {
            let mut item = resource.lock();
            let decision = self.repair.request_repair(&mut item);
            (item.id().clone(), decision)
        };
        self.notify(&LendingEvent::RepairDecided { resource: resource_id, decision });
        decision
    }

    /// Retry every archived resource that still has damaged copies
    ///
    /// Safe to call from a maintenance thread while lending continues.
    pub fn repair_sweep(&self) -> SweepReport {
        let report = self.repair.periodic_repair(&self.catalog);
        self.notify(&LendingEvent::SweepFinished(report));
        report
    }

    /// Repair one copy directly against the configured threshold
    ///
    /// A cleared copy goes straight back on the shelf; a copy damaged more
    /// often than the threshold allows is withdrawn.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown resource and `CopyNotFound`
    /// if the copy is not in its pool.
    pub fn repair_copy(&self, resource_id: &str, copy: CopyId) -> Result<CopyRepair, LendingError> {
        let resource = self.resource_handle(resource_id)?;
        let mut item = resource.lock();
        match item.repair(copy, self.config.repair.threshold) {
            CopyRepair::NotFound => {
                Err(LendingError::CopyNotFound { resource: item.id().clone(), copy })
            }
            CopyRepair::Cleared => {
                item.return_copy(copy);
                debug!(resource = resource_id, %copy, "copy repaired and shelved");
                Ok(CopyRepair::Cleared)
            }
            CopyRepair::Removed => {
                warn!(resource = resource_id, %copy, "copy withdrawn after repeated damage");
                Ok(CopyRepair::Removed)
            }
            CopyRepair::Untouched => Ok(CopyRepair::Untouched),
        }
    }

    /// Add a fresh copy to a resource
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown resource.
    pub fn add_copy(&self, resource_id: &str) -> Result<CopyId, LendingError> {
        let copy = self.resource_handle(resource_id)?.lock().add_copy();
        debug!(resource = resource_id, %copy, "copy added");
        Ok(copy)
    }

    /// Create the digital edition of a resource
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown resource.
    pub fn create_digital_version(&self, resource_id: &str) -> Result<(), LendingError> {
        self.resource_handle(resource_id)?.lock().create_digital_version();
        Ok(())
    }

    /// Count a view of a digital edition; `false` if there is none
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown resource.
    pub fn record_view(&self, resource_id: &str) -> Result<bool, LendingError> {
        Ok(self.resource_handle(resource_id)?.lock().record_view())
    }

    /// Count a download of a digital edition; `false` if there is none
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown resource.
    pub fn record_download(&self, resource_id: &str) -> Result<bool, LendingError> {
        Ok(self.resource_handle(resource_id)?.lock().record_download())
    }

    /// Copy of one resource
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<Resource> {
        self.catalog.handle(id).map(|h| h.lock().clone())
    }

    /// Copy of one member account
    #[must_use]
    pub fn member(&self, id: &str) -> Option<MemberAccount> {
        self.member_handle(id).ok().map(|h| h.lock().clone())
    }

    /// Copy of every resource in catalog order
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.catalog.snapshot()
    }

    /// Copy of every member in registration order
    #[must_use]
    pub fn members(&self) -> Vec<MemberAccount> {
        let handles: Vec<MemberHandle> = self.members.read().order.clone();
        handles.iter().map(|h| h.lock().clone()).collect()
    }

    /// The resource catalog
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The transaction ledger
    #[must_use]
    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// Repair counters and archive
    #[must_use]
    pub fn repair_stats(&self) -> RepairStats {
        self.repair.stats()
    }

    /// The most borrowed resource, earliest on ties
    #[must_use]
    pub fn most_popular(&self) -> Option<Resource> {
        self.catalog.most_popular()
    }

    /// The `k` most borrowed resources
    #[must_use]
    pub fn most_popular_top(&self, k: usize) -> Vec<Resource> {
        self.catalog.most_popular_top(k)
    }

    /// The configured number of most borrowed resources
    #[must_use]
    pub fn popularity_report(&self) -> Vec<Resource> {
        self.most_popular_top(self.config.lending.top_k)
    }

    /// The digital edition with the most views
    #[must_use]
    pub fn most_viewed_digital(&self) -> Option<Resource> {
        self.catalog.most_viewed_digital()
    }

    /// The digital edition with the most downloads
    #[must_use]
    pub fn most_downloaded_digital(&self) -> Option<Resource> {
        self.catalog.most_downloaded_digital()
    }

    /// Resources whose title contains `needle`, ignoring case
    #[must_use]
    pub fn search_by_title(&self, needle: &str) -> Vec<Resource> {
        self.catalog.search_by_title(needle)
    }

    /// Resources whose author contains `needle`, ignoring case
    #[must_use]
    pub fn search_by_author(&self, needle: &str) -> Vec<Resource> {
        self.catalog.search_by_author(needle)
    }

    /// Serializable picture of the current state
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            resources: self.resources(),
            members: self.members(),
            transactions: self.ledger.entries(),
            repair: self.repair.stats(),
        }
    }
}

#[cfg(test)]
mod tests;
