//! Order-insensitive list comparison.

use std::collections::BTreeSet;
use std::hash::Hash;

/// Items in `left` that are not in `right`, in `left`'s order, without duplicates.
pub fn difference<T: Eq + Hash + Clone + Ord>(left: &[T], right: &[T]) -> Vec<T> {
    let right: BTreeSet<&T> = right.iter().collect();
    let mut seen = BTreeSet::new();
    left.iter()
        .filter(|item| !right.contains(item) && seen.insert(*item))
        .cloned()
        .collect()
}

/// Result of comparing a desired set against an observed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
}

impl<T> SetDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// `added = desired \ current`, `removed = current \ desired`.
pub fn set_diff<T: Eq + Hash + Clone + Ord>(current: &[T], desired: &[T]) -> SetDiff<T> {
    SetDiff {
        added: difference(desired, current),
        removed: difference(current, desired),
    }
}
