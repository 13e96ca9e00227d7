//! Vector clock value type
//!
//! Each agent owns one counter. Only the owner increments it; combining two
//! clocks takes the pointwise maximum. Clocks are values: every operation
//! returns a new clock and nothing is shared.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Causal relation between two clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockOrdering {
    /// Left happened-before right
    Before,
    /// Right happened-before left
    After,
    /// Neither happened-before the other
    Concurrent,
    /// Identical (absent entries count as 0)
    Equal,
}

impl ClockOrdering {
    /// Flip the perspective (`compare(a, b).reverse() == compare(b, a)`)
    pub fn reverse(self) -> Self {
        match self {
            ClockOrdering::Before => ClockOrdering::After,
            ClockOrdering::After => ClockOrdering::Before,
            other => other,
        }
    }
}

impl std::fmt::Display for ClockOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockOrdering::Before => write!(f, "before"),
            ClockOrdering::After => write!(f, "after"),
            ClockOrdering::Concurrent => write!(f, "concurrent"),
            ClockOrdering::Equal => write!(f, "equal"),
        }
    }
}

/// Per-agent logical time
///
/// # Example
///
/// ```
/// use liminal_domain::{AgentId, ClockOrdering, VectorClock};
///
/// let a = AgentId::from("a");
/// let b = AgentId::from("b");
///
/// let left = VectorClock::new().increment(&a);
/// let right = VectorClock::new().increment(&b);
/// assert_eq!(left.compare(&right), ClockOrdering::Concurrent);
///
/// let merged = left.merge(&right);
/// assert_eq!(left.compare(&merged), ClockOrdering::Before);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    entries: BTreeMap<AgentId, u64>,
}

impl VectorClock {
    /// Create an empty clock (every counter 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a clock from explicit entries
    pub fn from_entries<I, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (A, u64)>,
        A: Into<AgentId>,
    {
        let entries = entries
            .into_iter()
            .filter(|(_, counter)| *counter > 0)
            .map(|(agent, counter)| (agent.into(), counter))
            .collect();
        Self { entries }
    }

    /// Counter for `agent` (0 when absent)
    pub fn get(&self, agent: &AgentId) -> u64 {
        self.entries.get(agent).copied().unwrap_or(0)
    }

    /// Return a new clock with `agent`'s counter advanced by one
    pub fn increment(&self, agent: &AgentId) -> Self {
        let mut next = self.clone();
        *next.entries.entry(agent.clone()).or_insert(0) += 1;
        next
    }

    /// Return the pointwise maximum of `self` and `other`
    pub fn merge(&self, other: &VectorClock) -> Self {
        let mut merged = self.clone();
        for (agent, &counter) in &other.entries {
            let slot = merged.entries.entry(agent.clone()).or_insert(0);
            *slot = (*slot).max(counter);
        }
        merged
    }

    /// Compare causally against `other`
    pub fn compare(&self, other: &VectorClock) -> ClockOrdering {
        let mut less = false;
        let mut greater = false;

        for agent in self.entries.keys().chain(other.entries.keys()) {
            match self.get(agent).cmp(&other.get(agent)) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
            if less && greater {
                return ClockOrdering::Concurrent;
            }
        }

        match (less, greater) {
            (false, false) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::Before,
            (false, true) => ClockOrdering::After,
            (true, true) => ClockOrdering::Concurrent,
        }
    }

    /// `self` happened-before `other`
    pub fn happened_before(&self, other: &VectorClock) -> bool {
        self.compare(other) == ClockOrdering::Before
    }

    /// Neither clock happened-before the other and they differ
    pub fn is_concurrent_with(&self, other: &VectorClock) -> bool {
        self.compare(other) == ClockOrdering::Concurrent
    }

    /// Agents with a non-zero counter, in id order
    pub fn agents(&self) -> impl Iterator<Item = &AgentId> {
        self.entries
            .iter()
            .filter(|(_, counter)| **counter > 0)
            .map(|(agent, _)| agent)
    }

    /// Sum of all counters (number of events the clock has observed)
    pub fn total_events(&self) -> u64 {
        self.entries.values().sum()
    }

    /// True when every counter is 0
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|counter| *counter == 0)
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrdering::Equal
    }
}

impl Eq for VectorClock {}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            ClockOrdering::Before => Some(Ordering::Less),
            ClockOrdering::After => Some(Ordering::Greater),
            ClockOrdering::Equal => Some(Ordering::Equal),
            ClockOrdering::Concurrent => None,
        }
    }
}

impl std::fmt::Display for VectorClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, agent) in self.agents().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", agent, self.get(agent))?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> AgentId {
        AgentId::from(s)
    }

    #[test]
    fn test_increment_is_pure() {
        let base = VectorClock::new();
        let next = base.increment(&id("a"));

        assert_eq!(base.get(&id("a")), 0);
        assert_eq!(next.get(&id("a")), 1);
        assert_eq!(next.get(&id("b")), 0);
    }

    #[test]
    fn test_merge_takes_pointwise_max() {
        let left = VectorClock::from_entries([("a", 3), ("b", 1)]);
        let right = VectorClock::from_entries([("b", 4), ("c", 2)]);

        let merged = left.merge(&right);
        assert_eq!(merged, VectorClock::from_entries([("a", 3), ("b", 4), ("c", 2)]));
    }

    #[test]
    fn test_compare_cases() {
        let a1 = VectorClock::from_entries([("a", 1)]);
        let b1 = VectorClock::from_entries([("b", 1)]);
        let a1b1 = a1.merge(&b1);

        assert_eq!(a1.compare(&a1b1), ClockOrdering::Before);
        assert_eq!(a1b1.compare(&a1), ClockOrdering::After);
        assert_eq!(a1.compare(&b1), ClockOrdering::Concurrent);
        assert_eq!(a1.compare(&a1.clone()), ClockOrdering::Equal);
    }

    #[test]
    fn test_absent_entries_equal_zero() {
        let explicit = VectorClock::from_entries([("a", 1), ("b", 0)]);
        let implicit = VectorClock::from_entries([("a", 1)]);
        assert_eq!(explicit.compare(&implicit), ClockOrdering::Equal);
        assert_eq!(VectorClock::new().compare(&VectorClock::new()), ClockOrdering::Equal);
    }

    #[test]
    fn test_partial_ord_matches_compare() {
        let a1 = VectorClock::from_entries([("a", 1)]);
        let a2 = VectorClock::from_entries([("a", 2)]);
        let b1 = VectorClock::from_entries([("b", 1)]);

        assert!(a1 < a2);
        assert!(a2 > a1);
        assert_eq!(a1.partial_cmp(&b1), None);
    }

    #[test]
    fn test_clock_scenario_merge_then_increment() {
        // A stamps {A:1}, B stamps {B:1}; the merged view is {A:1,B:1} and
        // A's next event lands at {A:2,B:1}.
        let a = id("A");
        let b = id("B");
        let from_a = VectorClock::new().increment(&a);
        let from_b = VectorClock::new().increment(&b);

        let merged = from_a.merge(&from_b);
        assert_eq!(merged, VectorClock::from_entries([("A", 1), ("B", 1)]));

        let third = merged.increment(&a);
        assert_eq!(third, VectorClock::from_entries([("A", 2), ("B", 1)]));
        assert_eq!(merged.compare(&third), ClockOrdering::Before);
    }

    #[test]
    fn test_display() {
        let clock = VectorClock::from_entries([("b", 1), ("a", 2)]);
        assert_eq!(clock.to_string(), "{a:2, b:1}");
        assert_eq!(clock.total_events(), 3);
    }

    #[test]
    fn test_reverse() {
        assert_eq!(ClockOrdering::Before.reverse(), ClockOrdering::After);
        assert_eq!(ClockOrdering::Concurrent.reverse(), ClockOrdering::Concurrent);
    }

    fn arb_clock() -> impl Strategy<Value = VectorClock> {
        prop::collection::btree_map(
            prop::sample::select(vec!["a", "b", "c", "d"]),
            0u64..6,
            0..4,
        )
        .prop_map(VectorClock::from_entries)
    }

    proptest! {
        #[test]
        fn prop_merge_is_commutative(a in arb_clock(), b in arb_clock()) {
            prop_assert_eq!(a.merge(&b), b.merge(&a));
        }

        #[test]
        fn prop_merge_never_moves_backward(a in arb_clock(), b in arb_clock()) {
            let ordering = a.compare(&a.merge(&b));
            prop_assert!(matches!(ordering, ClockOrdering::Before | ClockOrdering::Equal));
        }

        #[test]
        fn prop_compare_is_antisymmetric(a in arb_clock(), b in arb_clock()) {
            prop_assert_eq!(a.compare(&b).reverse(), b.compare(&a));
        }

        #[test]
        fn prop_increment_happens_after(a in arb_clock()) {
            let next = a.increment(&AgentId::from("a"));
            prop_assert_eq!(a.compare(&next), ClockOrdering::Before);
        }
    }
}
