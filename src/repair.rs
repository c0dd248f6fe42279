//! Stochastic repair of damaged resources.
//!
//! A damaged return hands the resource to [`RepairWorkflow::request_repair`],
//! which draws a value from its [`RepairPolicy`]. Draws at or below the
//! archive probability move the resource to the archive; anything else
//! repairs every damaged copy at once. Archived resources are retried by
//! [`RepairWorkflow::periodic_repair`], meant to run as a maintenance task
//! off the request path.

use std::{collections::VecDeque, fmt};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    catalog::Catalog,
    config::RepairConfig,
    resource::{Resource, ResourceId},
};

/// Source of the uniform draw behind each repair decision
pub trait RepairPolicy: Send + Sync + fmt::Debug {
    /// A value in `[0, 1)`
    fn draw(&self) -> f64;
}

/// Draws from a standard RNG, optionally seeded for reproducible runs
#[derive(Debug)]
pub struct RandomPolicy {
    /// Generator behind the draws
    rng: Mutex<StdRng>,
}

impl RandomPolicy {
    /// Seed from the operating system
    #[must_use]
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_os_rng()) }
    }

    /// Seed deterministically
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RepairPolicy for RandomPolicy {
    fn draw(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }
}

/// Always draws the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub f64);

impl FixedPolicy {
    /// A policy that always lands on the archive branch
    #[must_use]
    pub fn archive() -> Self {
        Self(0.0)
    }

    /// A policy that always lands on the repair branch
    #[must_use]
    pub fn repair() -> Self {
        Self(0.999)
    }
}

impl RepairPolicy for FixedPolicy {
    fn draw(&self) -> f64 {
        self.0
    }
}

/// Replays a fixed sequence of draws, then repeats a fallback value
#[derive(Debug)]
pub struct ScriptedPolicy {
    /// Draws still to be replayed
    draws: Mutex<VecDeque<f64>>,
    /// Value used once the script runs out
    fallback: f64,
}

impl ScriptedPolicy {
    /// Replay `draws` in order, then keep returning `fallback`
    pub fn new(draws: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self { draws: Mutex::new(draws.into_iter().collect()), fallback }
    }
}

impl RepairPolicy for ScriptedPolicy {
    fn draw(&self) -> f64 {
        self.draws.lock().pop_front().unwrap_or(self.fallback)
    }
}

/// What a single repair request did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RepairDecision {
    /// The resource went to the archive to await a later sweep
    Archived,
    /// Damaged copies were handled on the spot
    Repaired {
        /// Copies cleared and put back on the shelf
        restored: usize,
    },
}

/// Summary of one maintenance sweep over the archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SweepReport {
    /// Archive entries looked at
    pub examined: usize,
    /// Entries that still had damaged copies and were retried
    pub retried: usize,
    /// Retries that ended in a repair
    pub repaired: usize,
    /// Retries that landed back in the archive
    pub rearchived: usize,
    /// Entries dropped from the archive
    pub pruned: usize,
}

/// Read-only view of the workflow's counters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepairStats {
    /// Lifetime number of repair requests
    pub repair_count: u64,
    /// Archived resources in archival order
    pub archived: Vec<ResourceId>,
}

/// Mutable state shared by request handling and the sweep
#[derive(Debug, Default)]
struct RepairState {
    /// Lifetime number of repair requests
    repair_count: u64,
    /// Archived resources in archival order, each listed once
    archived: Vec<ResourceId>,
}

/// Decides between repairing and archiving damaged resources
///
/// The state lock is only ever taken while holding at most one resource lock,
/// and never held while acquiring one.
#[derive(Debug)]
pub struct RepairWorkflow {
    /// Counters and archive
    state: Mutex<RepairState>,
    /// Source of the repair-or-archive draw
    policy: Box<dyn RepairPolicy>,
    /// Thresholds and archive handling
    config: RepairConfig,
}

impl RepairWorkflow {
    /// Create a workflow with the given draw source
    #[must_use]
    pub fn new(policy: Box<dyn RepairPolicy>, config: RepairConfig) -> Self {
        Self { state: Mutex::new(RepairState::default()), policy, config }
    }

    /// Handle one repair request for `resource`
    ///
    /// Always counts the request. An archived resource is appended to the
    /// archive, once per request unless `dedupe_archive` is set. On the repair
    /// branch every damaged copy is cleared and put back on the shelf.
    pub fn request_repair(&self, resource: &mut Resource) -> RepairDecision {
        let draw = self.policy.draw();
        {
            let mut state = self.state.lock();
            state.repair_count = state.repair_count.saturating_add(1);
            if draw <= self.config.archive_probability {
                if !(self.config.dedupe_archive && state.archived.contains(resource.id())) {
                    state.archived.push(resource.id().clone());
                }
                info!(resource = %resource.id(), draw, "resource archived pending repair");
                return RepairDecision::Archived;
            }
        }

        let mut restored = 0usize;
        for copy in resource.damaged_copies() {
            if resource.restore(copy) {
                restored = restored.saturating_add(1);
            }
        }
        info!(resource = %resource.id(), draw, restored, "resource repaired");
        RepairDecision::Repaired { restored }
    }

    /// Retry every archived resource that still has a damaged copy
    ///
    /// Works from a snapshot of the archive so the state lock is free while
    /// resources are locked one at a time.
    pub fn periodic_repair(&self, catalog: &Catalog) -> SweepReport {
        let snapshot = self.state.lock().archived.clone();
        let mut report = SweepReport::default();
        let mut resolved = Vec::new();

        for id in snapshot {
            report.examined = report.examined.saturating_add(1);
            let Some(handle) = catalog.handle(id.as_str()) else {
                debug!(resource = %id, "archived resource no longer catalogued");
                continue;
            };
            let mut resource = handle.lock();
            if !resource.has_damaged_copies() {
                resolved.push(id);
                continue;
            }
            report.retried = report.retried.saturating_add(1);
            match self.request_repair(&mut resource) {
                RepairDecision::Archived => {
                    report.rearchived = report.rearchived.saturating_add(1);
                }
                RepairDecision::Repaired { .. } => {
                    report.repaired = report.repaired.saturating_add(1);
                    if !resource.has_damaged_copies() {
                        resolved.push(id);
                    }
                }
            }
        }

        if self.config.prune_repaired_archive && !resolved.is_empty() {
            let mut state = self.state.lock();
            let before = state.archived.len();
            state.archived.retain(|id| !resolved.contains(id));
            report.pruned = before.saturating_sub(state.archived.len());
        }

        info!(
            examined = report.examined,
            retried = report.retried,
            repaired = report.repaired,
            rearchived = report.rearchived,
            pruned = report.pruned,
            "repair sweep finished"
        );
        report
    }

    /// Lifetime number of repair requests
    #[must_use]
    pub fn repair_count(&self) -> u64 {
        self.state.lock().repair_count
    }

    /// Archived resources in archival order
    #[must_use]
    pub fn archived(&self) -> Vec<ResourceId> {
        self.state.lock().archived.clone()
    }

    /// Counters and archive in one consistent read
    #[must_use]
    pub fn stats(&self) -> RepairStats {
        let state = self.state.lock();
        RepairStats { repair_count: state.repair_count, archived: state.archived.clone() }
    }
}
