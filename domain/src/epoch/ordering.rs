//! Causal total order over pending proposals
//!
//! Happened-before is only a partial order. The coordinator needs a total
//! one, so it linearizes: repeatedly take the earliest proposal (by author
//! id, then submission sequence) that no remaining proposal happened-before.
//! The result respects every causal edge and breaks ties among concurrent
//! proposals deterministically.
//!
//! [`causal_order`] rebuilds the order from scratch and is quadratic in the
//! number of proposals. The coordinator keeps its order current with
//! [`insert_causal`] instead, which places one new proposal in a linear scan.

use super::proposal::{Proposal, ProposalId};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Tie-break between proposals the clocks leave unordered
pub fn tie_break(a: &Proposal, b: &Proposal) -> Ordering {
    a.author
        .cmp(&b.author)
        .then(a.submitted_seq.cmp(&b.submitted_seq))
        .then(a.id.cmp(&b.id))
}

/// Linearize `proposals` into causal order with deterministic tie-breaks
pub fn causal_order<'a, I>(proposals: I) -> Vec<ProposalId>
where
    I: IntoIterator<Item = &'a Proposal>,
{
    let mut remaining: Vec<&Proposal> = proposals.into_iter().collect();
    remaining.sort_by(|a, b| tie_break(a, b));

    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        // Happened-before is acyclic, so some proposal has no predecessor.
        let next = remaining
            .iter()
            .position(|candidate| {
                !remaining
                    .iter()
                    .any(|other| other.clock.happened_before(&candidate.clock))
            })
            .unwrap_or(0);
        ordered.push(remaining.remove(next).id);
    }
    ordered
}

/// Insert `new` into an existing causal `order` of `pending`
///
/// `new` goes after its last causal predecessor and before its first causal
/// successor. Between those bounds it lands before the first proposal it
/// wins the tie-break against. Entries of `order` missing from `pending`
/// are treated as concurrent.
pub fn insert_causal(
    order: &mut Vec<ProposalId>,
    pending: &BTreeMap<ProposalId, Proposal>,
    new: &Proposal,
) {
    let mut lower = 0;
    let mut upper = order.len();
    for (index, id) in order.iter().enumerate() {
        let Some(existing) = pending.get(id) else {
            continue;
        };
        if existing.clock.happened_before(&new.clock) {
            lower = index + 1;
        } else if upper == order.len() && new.clock.happened_before(&existing.clock) {
            upper = index;
        }
    }
    // A valid order never puts a successor of `new` ahead of a predecessor.
    let upper = upper.max(lower);

    let position = order[lower..upper]
        .iter()
        .position(|id| {
            pending
                .get(id)
                .is_some_and(|existing| tie_break(new, existing) == Ordering::Less)
        })
        .map_or(upper, |offset| lower + offset);
    order.insert(position, new.id);
}
