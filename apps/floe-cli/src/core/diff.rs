//! Multiset diff engine.
//!
//! Computes the added/removed (and optionally common) elements between two
//! unordered collections, treating duplicates as significant. This is the
//! primitive the reconciliation layer uses to turn "previous grants" vs
//! "desired grants" into grant/revoke pairs.

use std::collections::HashMap;
use std::hash::Hash;

/// Result of comparing two multisets: what must be added to `before` and
/// removed from it to obtain `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<T> {
    /// Elements whose multiplicity in `after` exceeds their multiplicity in
    /// `before`, repeated by the excess amount, in `after`'s order.
    pub added: Vec<T>,
    /// Elements whose multiplicity in `before` exceeds their multiplicity in
    /// `after`, repeated by the excess amount, in `before`'s order.
    pub removed: Vec<T>,
}

/// Like [`Diff`] but also carrying the elements present on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffWithCommon<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    /// For each distinct element, `min(count_before, count_after)` copies,
    /// in `before`'s order.
    pub common: Vec<T>,
}

/// Computes the multiset difference between `before` and `after`.
///
/// Total over any two finite slices; duplicates are significant. Output
/// order is derived from input order (`removed` follows `before`, `added`
/// follows `after`) so results are deterministic without sorting. Runs in
/// O(n + m) using a count table, which is why elements must be hashable.
pub fn diff<T>(before: &[T], after: &[T]) -> Diff<T>
where
    T: Eq + Hash + Clone,
{
    let with_common = diff_with_common(before, after);
    Diff {
        added: with_common.added,
        removed: with_common.removed,
    }
}

/// Computes the multiset difference between `before` and `after`, also
/// extracting the common elements.
///
/// Invariants, as multisets: `removed ⊎ common == before` and
/// `added ⊎ common == after`.
pub fn diff_with_common<T>(before: &[T], after: &[T]) -> DiffWithCommon<T>
where
    T: Eq + Hash + Clone,
{
    let mut after_counts: HashMap<&T, usize> = HashMap::new();
    for item in after {
        *after_counts.entry(item).or_insert(0) += 1;
    }

    // Every `before` element lands in exactly one of removed/common, so the
    // first invariant holds by construction.
    let mut removed = Vec::new();
    let mut common = Vec::new();
    for item in before {
        match after_counts.get_mut(item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                common.push(item.clone());
            }
            _ => removed.push(item.clone()),
        }
    }

    let mut before_counts: HashMap<&T, usize> = HashMap::new();
    for item in before {
        *before_counts.entry(item).or_insert(0) += 1;
    }

    let mut added = Vec::new();
    for item in after {
        match before_counts.get_mut(item) {
            Some(count) if *count > 0 => *count -= 1,
            _ => added.push(item.clone()),
        }
    }

    DiffWithCommon {
        added,
        removed,
        common,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted<T: Eq + Hash + Clone>(items: &[T]) -> HashMap<T, usize> {
        let mut counts = HashMap::new();
        for item in items {
            *counts.entry(item.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn multiset_union<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> HashMap<T, usize> {
        let mut counts = counted(a);
        for (item, count) in counted(b) {
            *counts.entry(item).or_insert(0) += count;
        }
        counts
    }

    #[test]
    fn test_identical_inputs_produce_empty_diff() {
        let items = vec![1, 2, 3, 2];
        let result = diff_with_common(&items, &items);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert_eq!(result.common, items);
    }

    #[test]
    fn test_empty_before_adds_everything() {
        let after = vec!["a", "b", "a"];
        let result = diff(&[], &after);
        assert_eq!(result.added, after);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_empty_after_removes_everything() {
        let before = vec!["a", "b", "a"];
        let result = diff(&before, &[]);
        assert!(result.added.is_empty());
        assert_eq!(result.removed, before);
    }

    #[test]
    fn test_duplicates_are_significant() {
        let result = diff(&[2], &[1, 2, 1]);
        assert_eq!(result.added, vec![1, 1]);
        assert!(result.removed.is_empty());

        let result = diff(&[1, 2, 1], &[2]);
        assert!(result.added.is_empty());
        assert_eq!(result.removed, vec![1, 1]);
    }

    #[test]
    fn test_interleaved_sequences() {
        let before = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
        let after = vec![1, 3, 5, 7, 9, 12, 13, 14];
        let result = diff(&before, &after);
        assert_eq!(result.added, vec![12, 13, 14]);
        assert_eq!(result.removed, vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_output_order_follows_input_order() {
        let before = vec!["z", "a", "z", "m"];
        let after = vec!["q", "a", "p"];
        let result = diff(&before, &after);
        // removed in before order, added in after order, never sorted
        assert_eq!(result.removed, vec!["z", "z", "m"]);
        assert_eq!(result.added, vec!["q", "p"]);
    }

    #[test]
    fn test_multiset_invariants_hold() {
        let before = vec![1, 1, 2, 3, 3, 3, 7];
        let after = vec![3, 1, 4, 3, 9, 9];
        let result = diff_with_common(&before, &after);

        assert_eq!(
            multiset_union(&result.removed, &result.common),
            counted(&before)
        );
        assert_eq!(
            multiset_union(&result.added, &result.common),
            counted(&after)
        );
    }

    #[test]
    fn test_common_takes_min_multiplicity() {
        let before = vec!["x", "x", "x", "y"];
        let after = vec!["x", "y", "y"];
        let result = diff_with_common(&before, &after);
        assert_eq!(result.common, vec!["x", "y"]);
        assert_eq!(result.removed, vec!["x", "x"]);
        assert_eq!(result.added, vec!["y"]);
    }

    #[test]
    fn test_works_with_struct_elements() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct GrantKey {
            privilege: String,
            role: String,
        }

        let usage = GrantKey {
            privilege: "USAGE".to_string(),
            role: "ANALYST".to_string(),
        };
        let select = GrantKey {
            privilege: "SELECT".to_string(),
            role: "ANALYST".to_string(),
        };

        let result = diff(
            std::slice::from_ref(&usage),
            &[usage.clone(), select.clone()],
        );
        assert_eq!(result.added, vec![select]);
        assert!(result.removed.is_empty());
    }
}
