use std::{
    sync::{Arc, Barrier},
    thread,
};

use parking_lot::Mutex;

use super::LendingEngine;
use crate::{
    config::LibraryConfig,
    error::LendingError,
    ledger::TransactionKind,
    member::{MemberAccount, MemberKind},
    observers::{LendingEvent, LendingObserver},
    repair::{FixedPolicy, RepairDecision},
    resource::{Resource, ResourceId, ResourceKind},
};

/// Collects every event it sees
#[derive(Debug, Default)]
struct Recorder(Arc<Mutex<Vec<LendingEvent>>>);

impl LendingObserver for Recorder {
    fn on_event(&self, event: &LendingEvent) {
        self.0.lock().push(event.clone());
    }
}

/// Engine with a fixed repair policy and the given resources and members
fn engine_with(policy: FixedPolicy, resources: &[(&str, u32)], members: &[&str]) -> LendingEngine {
    engine_configured(LibraryConfig::default(), policy, resources, members)
}

/// Same as `engine_with` but with an explicit config
fn engine_configured(
    config: LibraryConfig,
    policy: FixedPolicy,
    resources: &[(&str, u32)],
    members: &[&str],
) -> LendingEngine {
    let engine = LendingEngine::with_policy(config, Box::new(policy));
    for (id, copies) in resources {
        let resource = Resource::new(*id, format!("Title {id}"), ResourceKind::book())
            .with_author("Author")
            .with_copies(*copies);
        assert!(engine.add_resource(resource).is_ok());
    }
    for id in members {
        assert!(engine.enroll(*id, format!("Member {id}"), "m@example.edu", MemberKind::Alumni).is_ok());
    }
    engine
}

/// Lend `resource` to `member` and take it back clean, `times` times
fn lend_times(engine: &LendingEngine, member: &str, resource: &str, times: usize) {
    for _ in 0..times {
        assert!(engine.borrow(member, resource).is_ok());
        assert!(engine.return_resource(member, resource, false).is_ok());
    }
}

#[test]
fn test_single_copy_is_shared_in_turn() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 1)], &["A", "B"]);

    assert!(engine.borrow("A", "R1").is_ok());
    assert_eq!(engine.ledger().len(), 1);

    assert_eq!(engine.borrow("B", "R1"), Err(LendingError::NoCopyAvailable("R1".into())));
    assert_eq!(engine.ledger().len(), 1);

    assert!(engine.return_resource("A", "R1", false).is_ok());
    assert_eq!(engine.resource("R1").map(|r| r.available_copies()), Some(1));
    assert_eq!(engine.ledger().len(), 2);

    assert!(engine.borrow("B", "R1").is_ok());
    let kinds: Vec<_> = engine.ledger().entries().iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TransactionKind::Borrow, TransactionKind::Return, TransactionKind::Borrow]
    );
}

#[test]
fn test_unknown_ids_are_reported_without_side_effects() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 1)], &["A"]);

    let missing_member = engine.borrow("Z", "R1");
    let missing_resource = engine.borrow("A", "R9");
    assert!(matches!(missing_member, Err(LendingError::MemberNotFound(_))));
    assert!(matches!(missing_resource, Err(LendingError::ResourceNotFound(_))));
    assert!(missing_member.err().is_some_and(|e| e.is_not_found()));

    assert!(matches!(
        engine.return_resource("Z", "R1", true),
        Err(LendingError::MemberNotFound(_))
    ));
    assert!(engine.ledger().is_empty());
    assert_eq!(engine.repair_stats().repair_count, 0);
    assert_eq!(engine.resource("R1").map(|r| r.borrow_count()), Some(0));
}

#[test]
fn test_limit_refusal_is_a_decline_not_a_lookup_failure() {
    let engine =
        engine_with(FixedPolicy::repair(), &[("R1", 1), ("R2", 1), ("R3", 1), ("R4", 1)], &["A"]);
    for id in ["R1", "R2", "R3"] {
        assert!(engine.borrow("A", id).is_ok());
    }

    let refused = engine.borrow("A", "R4");
    assert!(refused.as_ref().err().is_some_and(LendingError::is_declined));
    assert!(matches!(refused, Err(LendingError::BorrowLimitReached { limit: 3, .. })));
    assert_eq!(engine.ledger().len(), 3);
    assert_eq!(engine.resource("R4").map(|r| r.available_copies()), Some(1));
}

#[test]
fn test_unmatched_return_is_rejected_and_not_logged() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 1)], &["A"]);

    let result = engine.return_resource("A", "R1", false);

    assert!(matches!(result, Err(LendingError::NotHeld { .. })));
    assert!(engine.ledger().is_empty());
}

#[test]
fn test_audited_unmatched_return_is_logged_and_still_reported() {
    let mut config = LibraryConfig::default();
    config.lending.audit_unmatched_returns = true;
    let engine = engine_configured(config, FixedPolicy::archive(), &[("R1", 1)], &["A"]);

    let result = engine.return_resource("A", "R1", true);

    assert!(matches!(result, Err(LendingError::NotHeld { .. })));
    assert_eq!(engine.ledger().last().map(|t| t.kind), Some(TransactionKind::Return));
    assert_eq!(engine.repair_stats().repair_count, 1);
}

#[test]
fn test_damaged_return_goes_through_repair() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 1)], &["A"]);
    assert!(engine.borrow("A", "R1").is_ok());

    let receipt = engine.return_resource("A", "R1", true);

    assert!(receipt.is_ok());
    assert_eq!(
        receipt.ok().and_then(|r| r.repair),
        Some(RepairDecision::Repaired { restored: 1 })
    );
    let resource = engine.resource("R1");
    assert_eq!(resource.as_ref().map(Resource::available_copies), Some(1));
    assert_eq!(
        resource.and_then(|r| r.copies().next().map(crate::copy_pool::PhysicalCopy::damage_count)),
        Some(1)
    );
    assert_eq!(engine.repair_stats().repair_count, 1);
}

#[test]
fn test_archived_resource_waits_for_the_sweep() {
    let engine = engine_with(FixedPolicy::archive(), &[("R1", 1)], &["A", "B"]);
    assert!(engine.borrow("A", "R1").is_ok());
    assert!(engine.return_resource("A", "R1", true).is_ok());

    assert_eq!(engine.repair_stats().archived, vec![ResourceId::from("R1")]);
    assert_eq!(engine.borrow("B", "R1"), Err(LendingError::NoCopyAvailable("R1".into())));

    let report = engine.repair_sweep();
    assert_eq!(report.retried, 1);
    assert_eq!(report.rearchived, 1);
    assert_eq!(engine.repair_stats().repair_count, 2);
}

#[test]
fn test_three_clean_returns_raise_the_limit() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 1)], &["A"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    engine.register_observer(Box::new(Recorder(Arc::clone(&events))));

    lend_times(&engine, "A", "R1", 3);

    let member = engine.member("A");
    assert_eq!(member.as_ref().map(MemberAccount::borrow_limit), Some(4));
    assert_eq!(member.as_ref().map(MemberAccount::loyalty_points), Some(1));
    assert_eq!(member.map(|m| m.history().len()), Some(3));
    let raised = events
        .lock()
        .iter()
        .filter(|e| matches!(e, LendingEvent::LoyaltyRaised { borrow_limit: 4, .. }))
        .count();
    assert_eq!(raised, 1);
}

#[test]
fn test_observers_see_refusals() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 0)], &["A"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    engine.register_observer(Box::new(Recorder(Arc::clone(&events))));

    assert!(engine.borrow("A", "R1").is_err());

    let seen = events.lock().clone();
    assert_eq!(
        seen,
        vec![LendingEvent::Rejected { error: LendingError::NoCopyAvailable("R1".into()) }]
    );
}

#[test]
fn test_ties_in_popularity_go_to_the_first_catalogued() {
    let engine = engine_with(FixedPolicy::repair(), &[("A", 1), ("B", 1), ("C", 1)], &["M"]);
    lend_times(&engine, "M", "A", 5);
    lend_times(&engine, "M", "B", 5);
    lend_times(&engine, "M", "C", 2);

    let top: Vec<String> =
        engine.most_popular_top(1).iter().map(|r| r.id().to_string()).collect();
    assert_eq!(top, vec!["A"]);
    assert_eq!(engine.most_popular().map(|r| r.id().to_string()), Some("A".to_string()));
    assert_eq!(engine.popularity_report().len(), 3);
}

#[test]
fn test_duplicate_ids_are_refused() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 1)], &["A"]);
    let again = Resource::new("R1", "Other", ResourceKind::book());
    assert_eq!(engine.add_resource(again), Err(LendingError::DuplicateResource("R1".into())));
    assert!(matches!(
        engine.enroll("A", "Other", "x@example.edu", MemberKind::student()),
        Err(LendingError::DuplicateMember(_))
    ));
}

#[test]
fn test_copy_management_and_digital_usage() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 0)], &["A"]);
    assert!(engine.add_copy("R1").is_ok());
    assert!(engine.borrow("A", "R1").is_ok());

    assert_eq!(engine.record_view("R1"), Ok(false));
    assert!(engine.create_digital_version("R1").is_ok());
    assert_eq!(engine.record_view("R1"), Ok(true));
    assert_eq!(engine.record_download("R1"), Ok(true));
    assert_eq!(engine.most_viewed_digital().map(|r| r.id().to_string()), Some("R1".to_string()));
    assert!(engine.most_downloaded_digital().is_some());
    assert!(matches!(engine.add_copy("R9"), Err(LendingError::ResourceNotFound(_))));
}

#[test]
fn test_direct_copy_repair_reports_unknown_copies() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 1), ("R2", 3)], &["A"]);
    let foreign = engine.resource("R2").and_then(|r| r.copies().last().map(crate::copy_pool::PhysicalCopy::id));
    assert!(matches!(
        foreign.map(|c| engine.repair_copy("R1", c)),
        Some(Err(LendingError::CopyNotFound { .. }))
    ));
    let copy = engine.resource("R1").and_then(|r| r.copies().next().map(crate::copy_pool::PhysicalCopy::id));
    assert!(copy.is_some());
    let Some(copy) = copy else { return };

    assert_eq!(engine.repair_copy("R1", copy), Ok(crate::copy_pool::CopyRepair::Untouched));

    let receipt = engine.borrow("A", "R1");
    assert!(receipt.is_ok());
    assert!(engine.return_resource("A", "R1", false).is_ok());
    if let Some(handle) = engine.catalog().handle("R1") {
        assert!(handle.lock().mark_damaged(copy));
    }
    assert_eq!(engine.repair_copy("R1", copy), Ok(crate::copy_pool::CopyRepair::Cleared));
    assert_eq!(engine.resource("R1").map(|r| r.available_copies()), Some(1));
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_directly_repaired_copy_goes_back_on_the_shelf() {
    let engine = engine_with(FixedPolicy::archive(), &[("R1", 1)], &["A", "B"]);
    let copy = engine.borrow("A", "R1").unwrap().copy;
    assert!(engine.return_resource("A", "R1", true).is_ok());
    assert_eq!(engine.borrow("B", "R1"), Err(LendingError::NoCopyAvailable("R1".into())));

    assert_eq!(engine.repair_copy("R1", copy), Ok(crate::copy_pool::CopyRepair::Cleared));

    let resource = engine.resource("R1").unwrap();
    assert_eq!(resource.available_copies(), 1);
    assert!(!resource.has_damaged_copies());
    assert!(engine.borrow("B", "R1").is_ok());
    // nothing left for the sweep to retry
    assert_eq!(engine.repair_sweep().retried, 0);
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_ledger_keeps_each_members_borrows_and_returns_in_order() {
    let engine = Arc::new(engine_with(FixedPolicy::repair(), &[("R1", 1)], &["A"]));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // any thread may take back the copy another one borrowed
                for _ in 0..200 {
                    let _borrowed = engine.borrow("A", "R1").is_ok();
                    let _returned = engine.return_resource("A", "R1", false).is_ok();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    if engine.member("A").is_some_and(|m| m.holds("R1")) {
        assert!(engine.return_resource("A", "R1", false).is_ok());
    }

    let entries = engine.ledger().for_member("A");
    assert!(!entries.is_empty());
    for (position, entry) in entries.iter().enumerate() {
        let expected =
            if position % 2 == 0 { TransactionKind::Borrow } else { TransactionKind::Return };
        assert_eq!(entry.kind, expected, "entry {} out of order", entry.id);
    }
    assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_snapshot_serializes_to_json() {
    let engine = engine_with(FixedPolicy::repair(), &[("R1", 2)], &["A"]);
    assert!(engine.borrow("A", "R1").is_ok());

    let json = serde_json::to_value(engine.snapshot()).unwrap();

    assert_eq!(json["resources"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["transactions"][0]["kind"], "Borrow");
    assert_eq!(json["members"][0]["holdings"][0]["resource"], "R1");
    assert_eq!(json["repair"]["repair_count"], 0);
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_concurrent_borrowers_never_share_a_copy() {
    let members: Vec<String> = (0..16).map(|i| format!("M{i}")).collect();
    let member_refs: Vec<&str> = members.iter().map(String::as_str).collect();
    let engine = Arc::new(engine_with(FixedPolicy::repair(), &[("R1", 3)], &member_refs));
    let barrier = Arc::new(Barrier::new(members.len()));

    let handles: Vec<_> = members
        .iter()
        .cloned()
        .map(|member| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.borrow(&member, "R1").is_ok()
            })
        })
        .collect();
    let successes = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

    assert_eq!(successes, 3);
    assert_eq!(engine.ledger().len(), 3);
    let resource = engine.resource("R1").unwrap();
    assert_eq!(resource.available_copies(), 0);
    assert_eq!(resource.borrow_count(), 3);
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_concurrent_borrows_by_one_member_respect_the_limit() {
    let resources: Vec<(String, u32)> = (0..12).map(|i| (format!("R{i}"), 1)).collect();
    let resource_refs: Vec<(&str, u32)> = resources.iter().map(|(id, n)| (id.as_str(), *n)).collect();
    let engine = Arc::new(engine_with(FixedPolicy::repair(), &resource_refs, &["A"]));
    let barrier = Arc::new(Barrier::new(resources.len()));

    let handles: Vec<_> = resources
        .iter()
        .map(|(id, _)| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.borrow("A", &id).is_ok()
            })
        })
        .collect();
    let successes = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

    let member = engine.member("A").unwrap();
    assert_eq!(successes, 3);
    assert_eq!(member.holdings().len(), 3);
    assert!(member.holdings().len() <= member.borrow_limit());
    let lent: usize = engine.resources().iter().map(Resource::borrowed_copies).sum();
    assert_eq!(lent, 3);
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_sweep_runs_alongside_lending() {
    let engine = Arc::new(engine_with(FixedPolicy(0.2), &[("R1", 4), ("R2", 4)], &["A", "B"]));
    for member in ["A", "B"] {
        assert!(engine.borrow(member, "R1").is_ok());
        assert!(engine.return_resource(member, "R1", true).is_ok());
    }
    assert_eq!(engine.repair_stats().archived.len(), 2);

    let sweeper = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..50 {
                engine.repair_sweep();
            }
        })
    };
    for _ in 0..50 {
        lend_times(&engine, "A", "R2", 1);
    }
    sweeper.join().unwrap();

    let r1 = engine.resource("R1").unwrap();
    assert_eq!(r1.available_copies() + r1.borrowed_copies(), r1.total_copies());
    assert_eq!(engine.resource("R2").map(|r| r.available_copies()), Some(4));
}
