//! Change detection: does a difference between two snapshots mandate a
//! full reload?
//!
//! The walk visits every non-ignored member of the current snapshot in
//! catalog order. A `reload_required` member that differs triggers
//! immediately. Members whose declared type passes the descend predicate are
//! walked recursively, one depth unit per descent, and any nested trigger is
//! reported; sibling members are still examined when a descent finds nothing.
//!
//! When a nested aggregate exists on one side only (an `Option` going from
//! `None` to `Some` or back), there is nothing to compare. The declared
//! catalog is searched instead, and the change triggers if any
//! `reload_required` member is reachable within the remaining depth.

use tracing::{debug, trace};

use crate::catalog::{Catalog, TypeInfo};
use crate::equality::{VisitGuard, equals};
use crate::error::{CoreError, CoreResult};
use crate::inspect::{Aggregate, Inspect};

/// Default maximum number of aggregate descents.
pub const DEFAULT_MAX_DEPTH: i32 = 10;

/// Decides whether a member's declared type is walked recursively.
pub type DescendPredicate = fn(&TypeInfo) -> bool;

/// Bounded recursive diff over two snapshots of the same aggregate type.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    max_depth: i32,
    descend: DescendPredicate,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            descend: TypeInfo::is_aggregate,
        }
    }
}

impl ChangeDetector {
    /// Creates a detector with the default depth and descend predicate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of aggregate descents.
    pub fn with_max_depth(mut self, max_depth: i32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Replaces the predicate selecting which declared types are descended into.
    ///
    /// Only types that expose a nested aggregate can actually be walked; the
    /// predicate narrows or widens which of them are.
    pub fn with_descend(mut self, descend: DescendPredicate) -> Self {
        self.descend = descend;
        self
    }

    /// Maximum number of aggregate descents.
    pub fn max_depth(&self) -> i32 {
        self.max_depth
    }

    /// Returns `true` if moving from `current` to `pending` requires a reload.
    pub fn detect<T: Aggregate>(&self, current: &T, pending: &T) -> bool {
        self.walk(current, pending, self.max_depth, &mut VisitGuard::new())
    }

    /// Dynamic entry point for snapshots whose concrete type is not known
    /// statically.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedSnapshot`] if the snapshots are of
    /// different types.
    pub fn needs_reload(&self, current: &dyn Aggregate, pending: &dyn Aggregate) -> CoreResult<bool> {
        let (expected, found) = (current.type_info(), pending.type_info());
        if expected != found {
            return Err(CoreError::MalformedSnapshot {
                expected: expected.name,
                found: found.name,
            });
        }
        Ok(self.walk(current, pending, self.max_depth, &mut VisitGuard::new()))
    }

    fn walk(
        &self,
        current: &dyn Aggregate,
        pending: &dyn Aggregate,
        depth: i32,
        guard: &mut VisitGuard,
    ) -> bool {
        if depth <= 0 {
            return false;
        }

        let catalog = current.catalog();
        for member in catalog.members() {
            if member.is_ignored() {
                continue;
            }
            let (Some(cur), Some(pend)) = (member.get(current), member.get(pending)) else {
                continue;
            };

            if member.is_reload_required() && !equals(cur, pend) {
                debug!(
                    aggregate = catalog.type_name(),
                    member = member.name(),
                    "Reload-required member changed"
                );
                return true;
            }

            if (self.descend)(&member.declared()) && self.descend_into(cur, pend, depth - 1, guard) {
                return true;
            }
        }
        false
    }

    fn descend_into(
        &self,
        current: &dyn Inspect,
        pending: &dyn Inspect,
        depth: i32,
        guard: &mut VisitGuard,
    ) -> bool {
        let pair = current.identity().zip(pending.identity());
        if let Some((left, right)) = pair {
            if !guard.enter(left, right) {
                trace!(left, right, "Shared node already being walked");
                return false;
            }
        }

        let mut changed = false;
        let mut current_present = false;
        current.visit_aggregate(&mut |cur| {
            current_present = true;
            let mut pending_present = false;
            pending.visit_aggregate(&mut |pend| {
                pending_present = true;
                changed = self.walk(cur, pend, depth, guard);
            });
            if !pending_present {
                changed = self.declares_reload(cur.catalog(), depth);
            }
        });
        if !current_present {
            pending.visit_aggregate(&mut |pend| {
                changed = self.declares_reload(pend.catalog(), depth);
            });
        }

        if let Some((left, right)) = pair {
            guard.leave(left, right);
        }
        changed
    }

    /// Whether a `reload_required` member is reachable in `catalog` within
    /// `depth`, following declared types only.
    fn declares_reload(&self, catalog: &'static Catalog, depth: i32) -> bool {
        if depth <= 0 {
            return false;
        }
        catalog.members().iter().any(|member| {
            if member.is_ignored() {
                return false;
            }
            if member.is_reload_required() {
                debug!(
                    aggregate = catalog.type_name(),
                    member = member.name(),
                    "Reload-required member appeared or vanished"
                );
                return true;
            }
            let declared = member.declared();
            match declared.catalog {
                Some(nested) if (self.descend)(&declared) => {
                    self.declares_reload(nested(), depth - 1)
                }
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        Alpha, Beta, Cache, Chain, Database, Gate, Hidden, Node, Siblings, Storage, ring,
    };
    use proptest::prelude::*;
    use std::sync::Arc;

    fn alpha(x: i32, y: &str) -> Alpha {
        Alpha { x, y: y.into() }
    }

    #[test]
    fn test_flat_example() {
        let detector = ChangeDetector::default();
        let current = alpha(1, "a");
        assert!(!detector.detect(&current, &alpha(1, "b")));
        assert!(detector.detect(&current, &alpha(2, "a")));
    }

    #[test]
    fn test_nested_example() {
        let detector = ChangeDetector::default();
        let current = Beta {
            inner: alpha(1, "a"),
            z: 0,
        };

        let mut inner_x = current.clone();
        inner_x.inner.x = 2;
        assert!(detector.detect(&current, &inner_x));

        let mut only_z = current.clone();
        only_z.z = 5;
        assert!(detector.detect(&current, &only_z));

        let mut neither = current.clone();
        neither.inner.y = "b".into();
        assert!(!detector.detect(&current, &neither));
        assert!(!detector.detect(&current, &current.clone()));
    }

    #[test]
    fn test_ignore_only_difference() {
        let detector = ChangeDetector::default();
        let current = Gate::default();
        let mut pending = current.clone();
        pending.session = "rotated".into();
        assert!(!detector.detect(&current, &pending));

        let mut pending = current.clone();
        pending.port += 1;
        assert!(detector.detect(&current, &pending));

        let hidden = Hidden::default();
        let other = Hidden {
            cache: vec!["x".into()],
            ..Hidden::default()
        };
        assert!(!detector.detect(&hidden, &other));
    }

    #[test]
    fn test_later_sibling_is_examined() {
        // The first nested aggregate is unchanged; the trigger sits in the second.
        let detector = ChangeDetector::default();
        let current = Siblings::default();
        let mut pending = current.clone();
        pending.second.x = 42;
        assert!(detector.detect(&current, &pending));

        let mut pending = current.clone();
        pending.first.x = 42;
        assert!(detector.detect(&current, &pending));

        let mut pending = current.clone();
        pending.tail = 1;
        assert!(detector.detect(&current, &pending));
    }

    #[test]
    fn test_depth_limit() {
        let detector = ChangeDetector::default();
        let current = Chain::with_len(12);

        let mut at_ten = current.clone();
        at_ten.level_mut(10).unwrap().value = 99;
        assert!(detector.detect(&current, &at_ten));

        let mut at_eleven = current.clone();
        at_eleven.level_mut(11).unwrap().value = 99;
        assert!(!detector.detect(&current, &at_eleven));

        let deeper = ChangeDetector::default().with_max_depth(11);
        assert!(deeper.detect(&current, &at_eleven));
    }

    #[test]
    fn test_zero_depth_never_triggers() {
        let detector = ChangeDetector::default().with_max_depth(0);
        assert!(!detector.detect(&alpha(1, "a"), &alpha(2, "a")));
    }

    #[test]
    fn test_custom_descend_predicate() {
        let detector = ChangeDetector::default().with_descend(|_| false);
        let current = Beta::default();
        let mut pending = current.clone();
        pending.inner.x = 3;
        assert!(!detector.detect(&current, &pending));
    }

    #[test]
    fn test_malformed_snapshot() {
        let detector = ChangeDetector::default();
        let err = detector
            .needs_reload(&Alpha::default(), &Beta::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedSnapshot { .. }));

        // The failed comparison leaves later ones unaffected.
        assert!(detector.needs_reload(&alpha(1, "a"), &alpha(2, "a")).unwrap());
    }

    #[test]
    fn test_cyclic_graph_terminates() {
        let detector = ChangeDetector::default();
        let (left, _) = ring(4, 0);
        let (right, right_nodes) = ring(4, 0);
        let current = Node {
            value: 0,
            next: Some(left),
        };
        let pending = Node {
            value: 0,
            next: Some(Arc::clone(&right)),
        };
        assert!(!detector.detect(&current, &pending));

        right_nodes[2].write().value = 7;
        assert!(detector.detect(&current, &pending));
    }

    #[test]
    fn test_optional_aggregate_appearing() {
        let detector = ChangeDetector::default();
        let empty = Storage::default();
        let with_db = Storage {
            primary: Some(Database {
                url: "postgres://db".into(),
                pool: 4,
            }),
            ..Storage::default()
        };
        assert!(detector.detect(&empty, &with_db));
        assert!(detector.detect(&with_db, &empty));

        let with_cache = Storage {
            cache: Some(Cache { size: 64 }),
            ..Storage::default()
        };
        assert!(!detector.detect(&empty, &with_cache));
        assert!(!detector.detect(&with_cache, &empty));

        let shallow = ChangeDetector::default().with_max_depth(1);
        assert!(!shallow.detect(&empty, &with_db));
    }

    #[test]
    fn test_optional_aggregate_nested_declaration() {
        // Chain declares its reload-required value on every level.
        let detector = ChangeDetector::default();
        let short = Chain::with_len(3);
        let longer = Chain::with_len(4);
        assert!(detector.detect(&short, &longer));

        let short = Chain::with_len(11);
        let longer = Chain::with_len(12);
        assert!(!detector.detect(&short, &longer));
    }

    // ─── Properties ──────────────────────────────────────────────────────────

    fn arb_alpha() -> impl Strategy<Value = Alpha> {
        (any::<i32>(), "[a-z]{0,8}").prop_map(|(x, y)| Alpha { x, y })
    }

    fn arb_siblings() -> impl Strategy<Value = Siblings> {
        (arb_alpha(), arb_alpha(), any::<i32>()).prop_map(|(first, second, tail)| Siblings {
            first,
            second,
            tail,
        })
    }

    fn arb_beta() -> impl Strategy<Value = Beta> {
        (arb_alpha(), any::<i32>()).prop_map(|(inner, z)| Beta { inner, z })
    }

    /// Chain length together with a level inside it.
    fn arb_chain_level() -> impl Strategy<Value = (usize, usize)> {
        (1usize..=14).prop_flat_map(|len| (Just(len), 1..=len))
    }

    proptest! {
        #[test]
        fn test_identical_snapshots_never_trigger(siblings in arb_siblings(), beta in arb_beta()) {
            let detector = ChangeDetector::default();
            prop_assert!(!detector.detect(&siblings, &siblings.clone()));
            prop_assert!(!detector.detect(&beta, &beta.clone()));
        }

        #[test]
        fn test_ignored_change_never_triggers(port in any::<u16>(), before in ".*", after in ".*") {
            let current = Gate { port, session: before };
            let pending = Gate { port, session: after };
            prop_assert!(!ChangeDetector::default().detect(&current, &pending));
        }

        #[test]
        fn test_plain_member_change_never_triggers(
            siblings in arb_siblings(),
            first in "[a-z]{0,8}",
            second in "[a-z]{0,8}"
        ) {
            let mut pending = siblings.clone();
            pending.first.y = first;
            pending.second.y = second;
            prop_assert!(!ChangeDetector::default().detect(&siblings, &pending));
        }

        #[test]
        fn test_reload_required_change_triggers(
            siblings in arb_siblings(),
            mask in 1u8..8,
            delta in 1i32..1000
        ) {
            let mut pending = siblings.clone();
            if mask & 1 != 0 {
                pending.first.x = pending.first.x.wrapping_add(delta);
            }
            if mask & 2 != 0 {
                pending.second.x = pending.second.x.wrapping_add(delta);
            }
            if mask & 4 != 0 {
                pending.tail = pending.tail.wrapping_add(delta);
            }
            prop_assert!(ChangeDetector::default().detect(&siblings, &pending));
        }

        #[test]
        fn test_depth_bound((len, level) in arb_chain_level(), value in 1i32..100) {
            let current = Chain::with_len(len);
            let mut pending = current.clone();
            if let Some(node) = pending.level_mut(level) {
                node.value = value;
            }
            let detected = ChangeDetector::default().detect(&current, &pending);
            prop_assert_eq!(detected, level <= DEFAULT_MAX_DEPTH as usize);
        }
    }
}
