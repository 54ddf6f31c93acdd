//! Diffing of tracked window ids against a fresh enumeration.

use crate::common::collections::HashSet;
use crate::model::window::WindowId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowDiff {
    /// Ids present before and now, in their previous relative order.
    pub still_present: Vec<WindowId>,
    /// Ids not tracked before, in enumeration order.
    pub appeared: Vec<WindowId>,
    /// Ids tracked before and missing now.
    pub disappeared: Vec<WindowId>,
}

impl WindowDiff {
    /// Number of buttons once the diff is applied.
    pub fn total(&self) -> usize { self.still_present.len() + self.appeared.len() }

    pub fn is_unchanged(&self) -> bool { self.appeared.is_empty() && self.disappeared.is_empty() }

    /// The tracked order after applying the diff.
    pub fn next_order(&self) -> Vec<WindowId> {
        self.still_present.iter().chain(&self.appeared).copied().collect()
    }
}

/// Splits `previous ∪ current` into kept, new, and removed ids.
///
/// Kept ids keep the order of `previous` so buttons never swap places on a
/// cycle where nothing moved. Duplicate ids in either input are counted once.
pub fn diff(previous: &[WindowId], current: &[WindowId]) -> WindowDiff {
    let current_set: HashSet<WindowId> = current.iter().copied().collect();
    let mut seen_previous = HashSet::default();

    let mut still_present = Vec::new();
    let mut disappeared = Vec::new();
    for &id in previous {
        if !seen_previous.insert(id) {
            continue;
        }
        if current_set.contains(&id) {
            still_present.push(id);
        } else {
            disappeared.push(id);
        }
    }

    let mut seen_current = HashSet::default();
    let appeared = current
        .iter()
        .copied()
        .filter(|id| !seen_previous.contains(id) && seen_current.insert(*id))
        .collect();

    WindowDiff { still_present, appeared, disappeared }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn ids(raw: &[u32]) -> Vec<WindowId> { raw.iter().copied().map(WindowId::new).collect() }

    #[test]
    fn keeps_previous_order_and_appends_new() {
        let d = diff(&ids(&[1, 2, 3]), &ids(&[3, 1, 4]));
        assert_eq!(d, WindowDiff {
            still_present: ids(&[1, 3]),
            appeared: ids(&[4]),
            disappeared: ids(&[2]),
        });
        assert_eq!(d.total(), 3);
        assert_eq!(d.next_order(), ids(&[1, 3, 4]));
    }

    #[test]
    fn empty_previous_is_all_appeared() {
        let d = diff(&[], &ids(&[5, 2, 9]));
        assert_eq!(d.appeared, ids(&[5, 2, 9]));
        assert!(d.still_present.is_empty());
        assert!(d.disappeared.is_empty());
    }

    #[test]
    fn empty_current_is_all_disappeared() {
        let d = diff(&ids(&[5, 2, 9]), &[]);
        assert_eq!(d.disappeared, ids(&[5, 2, 9]));
        assert!(d.still_present.is_empty());
        assert!(d.appeared.is_empty());
    }

    #[test]
    fn duplicates_are_counted_once() {
        let d = diff(&ids(&[1, 1, 2]), &ids(&[2, 3, 3, 1]));
        assert_eq!(d.still_present, ids(&[1, 2]));
        assert_eq!(d.appeared, ids(&[3]));
        assert!(d.disappeared.is_empty());
    }

    /// Small deterministic generator so the property checks below cover many
    /// shapes without a property-testing dependency.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn ids(&mut self) -> Vec<WindowId> {
            let len = self.next() % 8;
            (0..len).map(|_| WindowId::new((self.next() % 10) as u32)).collect()
        }
    }

    fn is_subsequence(needle: &[WindowId], haystack: &[WindowId]) -> bool {
        let mut rest = haystack.iter();
        needle.iter().all(|id| rest.any(|h| h == id))
    }

    #[test]
    fn partitions_the_union_and_is_stable() {
        let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
        for _ in 0..500 {
            let previous = rng.ids();
            let current = rng.ids();
            let d = diff(&previous, &current);

            let mut all: Vec<WindowId> =
                d.still_present.iter().chain(&d.appeared).chain(&d.disappeared).copied().collect();
            let total = all.len();
            all.sort();
            all.dedup();
            assert_eq!(all.len(), total, "duplicate id in {d:?}");

            let mut union: Vec<WindowId> = previous.iter().chain(&current).copied().collect();
            union.sort();
            union.dedup();
            assert_eq!(all, union);

            assert!(is_subsequence(&d.still_present, &previous));

            let again = diff(&d.next_order(), &current);
            assert!(again.is_unchanged(), "{previous:?} -> {current:?} gave {again:?}");
            assert_eq!(again.still_present, d.next_order());
        }
    }
}
