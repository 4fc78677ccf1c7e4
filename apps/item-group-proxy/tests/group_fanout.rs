//! Group Fan-Out Integration Tests
//!
//! Exercises the group index through the public API: group assignment,
//! merges, bulk status application and removal.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;

use item_group_proxy::{
    ClientToken, GroupId, GroupIndex, ModelType, Status, StreamHandle, StreamStatus,
};
use proptest::prelude::*;

const H1: StreamHandle = StreamHandle(1);
const H2: StreamHandle = StreamHandle(2);

fn g(id: u8) -> GroupId {
    GroupId::new(vec![0, id])
}

fn index_with(handles: &[StreamHandle]) -> GroupIndex {
    let mut index = GroupIndex::new();
    for &handle in handles {
        assert!(index.add_subscription(
            "svcA",
            handle,
            ClientToken(handle.0 + 100),
            format!("ITEM{}", handle.0),
            ModelType::MarketPrice,
        ));
    }
    index
}

fn visit_group(index: &mut GroupIndex, group: &GroupId, status: &Status) -> Vec<StreamHandle> {
    let mut visited = Vec::new();
    index.apply_status_to_group("svcA", group, status, |sub, _| visited.push(sub.handle));
    visited
}

#[test]
fn terminal_group_status_visits_and_discards_members() {
    let mut index = index_with(&[H1, H2]);
    index.assign_group(H1, &g(1));
    index.assign_group(H2, &g(1));

    let visited = visit_group(&mut index, &g(1), &Status::closed("source down"));

    assert_eq!(visited, vec![H1, H2]);
    assert!(!index.contains_group("svcA", &g(1)));
    assert!(!index.assign_group(H1, &g(1)));
    assert!(index.subscription(H1).is_none());
    assert!(index.is_empty());
}

#[test]
fn merged_group_receives_status_for_both_members() {
    let mut index = index_with(&[H1, H2]);
    index.assign_group(H1, &g(1));
    index.assign_group(H2, &g(2));

    assert_eq!(index.merge_group("svcA", &g(1), &g(2)), 1);

    let visited = visit_group(&mut index, &g(2), &Status::suspect("stale"));

    assert_eq!(visited, vec![H1, H2]);
    assert!(index.contains_group("svcA", &g(1)));
    assert!(index.group_members("svcA", &g(1)).is_empty());
    assert_eq!(index.group_members("svcA", &g(2)), vec![H1, H2]);
}

#[test]
fn merge_then_terminal_reaches_every_member() {
    let mut index = index_with(&[StreamHandle(1), StreamHandle(2), StreamHandle(3)]);
    index.assign_group(StreamHandle(1), &g(1));
    index.assign_group(StreamHandle(2), &g(1));
    index.assign_group(StreamHandle(3), &g(2));

    index.merge_group("svcA", &g(1), &g(2));
    let visited = visit_group(&mut index, &g(2), &Status::closed_recover("failover"));

    assert_eq!(
        visited,
        vec![StreamHandle(1), StreamHandle(2), StreamHandle(3)]
    );
    assert!(index.is_empty());
}

#[test]
fn group_is_fresh_after_terminal_status() {
    let mut index = index_with(&[H1, H2]);
    index.assign_group(H1, &g(1));
    visit_group(&mut index, &g(1), &Status::closed("gone"));

    assert!(index.assign_group(H2, &g(1)));
    assert_eq!(index.group_members("svcA", &g(1)), vec![H2]);
}

#[test]
fn remove_subscription_is_idempotent() {
    let mut index = index_with(&[H1, H2]);
    index.assign_group(H1, &g(1));
    index.assign_group(H2, &g(1));

    assert!(index.remove_subscription(H1).is_some());
    let after_first = index.stats();
    assert!(index.remove_subscription(H1).is_none());

    assert_eq!(index.stats(), after_first);
    assert_eq!(index.group_members("svcA", &g(1)), vec![H2]);
}

#[test]
fn terminal_service_status_removes_service() {
    let mut index = index_with(&[H1, H2]);
    index.assign_group(H1, &g(1));

    let mut visited = Vec::new();
    index.apply_status_to_service("svcA", &Status::closed("service down"), |sub, status| {
        assert!(status.is_terminal());
        visited.push(sub.handle);
    });

    assert_eq!(visited, vec![H1, H2]);
    assert!(!index.contains_service("svcA"));
    assert!(index.is_empty());
}

#[test]
fn lookups_on_unknown_entities_are_silent() {
    let mut index = index_with(&[H1]);

    assert!(!index.assign_group(StreamHandle(9), &g(1)));
    assert_eq!(index.merge_group("svcB", &g(1), &g(2)), 0);
    assert_eq!(visit_group(&mut index, &g(7), &Status::closed("x")).len(), 0);
    assert_eq!(index.remove_service("svcB"), 0);
    assert_eq!(index.len(), 1);
}

// =============================================================================
// Property Tests
// =============================================================================

#[derive(Debug, Clone)]
enum Step {
    Assign(u64, u8),
    Merge(u8, u8),
    Close(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u64..6, 0u8..4).prop_map(|(h, grp)| Step::Assign(h, grp)),
        2 => (0u8..4, 0u8..4).prop_map(|(a, b)| Step::Merge(a, b)),
        1 => (0u64..6).prop_map(Step::Close),
    ]
}

proptest! {
    /// Every indexed stream that has been assigned sits in exactly one group.
    #[test]
    fn assigned_streams_sit_in_exactly_one_group(steps in prop::collection::vec(step(), 0..40)) {
        let handles: Vec<_> = (0..6).map(StreamHandle).collect();
        let mut index = index_with(&handles);

        for step in steps {
            match step {
                Step::Assign(h, grp) => { index.assign_group(StreamHandle(h), &g(grp)); }
                Step::Merge(a, b) => { index.merge_group("svcA", &g(a), &g(b)); }
                Step::Close(h) => { index.remove_subscription(StreamHandle(h)); }
            }

            let mut seen: HashMap<StreamHandle, usize> = HashMap::new();
            for grp in 0..4 {
                let group = g(grp);
                for handle in index.group_members("svcA", &group) {
                    prop_assert_eq!(index.group_of(handle), Some(&group));
                    *seen.entry(handle).or_default() += 1;
                }
            }
            for handle in &handles {
                let expected = usize::from(index.group_of(*handle).is_some());
                prop_assert_eq!(seen.get(handle).copied().unwrap_or(0), expected);
            }
        }
    }

    /// A terminal status after a merge reaches everything either group held.
    #[test]
    fn terminal_after_merge_visits_union(
        left in prop::collection::btree_set(0u64..10, 0..5),
        right in prop::collection::btree_set(10u64..20, 0..5),
    ) {
        let handles: Vec<_> = left.iter().chain(&right).copied().map(StreamHandle).collect();
        let mut index = index_with(&handles);
        for &h in &left {
            index.assign_group(StreamHandle(h), &g(1));
        }
        for &h in &right {
            index.assign_group(StreamHandle(h), &g(2));
        }

        index.merge_group("svcA", &g(1), &g(2));
        let visited = visit_group(&mut index, &g(2), &Status::closed("gone"));

        prop_assert_eq!(visited, handles);
        prop_assert!(index.is_empty());
    }
}
