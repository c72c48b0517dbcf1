//! Deep semantic equality.
//!
//! Aggregates compare member-wise through their catalogs, skipping ignored
//! members. Sequences compare element-wise in order, mappings key-wise
//! regardless of order, scalars with their native `==`.

use std::collections::HashSet;

use crate::inspect::{Aggregate, Inspect};

/// Shared-node pairs currently being compared.
///
/// A pair that is re-entered while still in progress is a cycle; the inner
/// visit reports "not equal" instead of recursing.
#[derive(Debug, Default)]
pub struct VisitGuard {
    in_progress: HashSet<(usize, usize)>,
}

impl VisitGuard {
    /// Creates an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a pair as in progress. Returns `false` if it already was.
    pub fn enter(&mut self, left: usize, right: usize) -> bool {
        self.in_progress.insert((left, right))
    }

    /// Marks a pair as finished.
    pub fn leave(&mut self, left: usize, right: usize) {
        self.in_progress.remove(&(left, right));
    }

    /// Number of pairs currently in progress.
    pub fn depth(&self) -> usize {
        self.in_progress.len()
    }
}

/// Compares two values for semantic equality.
pub fn equals(left: &dyn Inspect, right: &dyn Inspect) -> bool {
    left.eq_inspect(right, &mut VisitGuard::new())
}

/// Compares the non-ignored members of two aggregates of the same type.
pub fn members_equal(left: &dyn Aggregate, right: &dyn Aggregate, guard: &mut VisitGuard) -> bool {
    if left.type_info().type_id != right.type_info().type_id {
        return false;
    }

    left.catalog().members().iter().all(|member| {
        if member.is_ignored() {
            return true;
        }
        match (member.get(left), member.get(right)) {
            (Some(l), Some(r)) => l.eq_inspect(r, guard),
            (None, None) => true,
            _ => false,
        }
    })
}
