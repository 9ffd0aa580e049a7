//! Deciding whether two systems are bisimilar.
//!
//! Both systems are put side by side in one transition index and refined
//! together. Refinement stops as soon as the two initial states are in
//! different blocks. The splits that separated them are then followed back to
//! a sequence of labels that one side can do and the other cannot.

use std::collections::{HashSet, VecDeque};
use std::fmt::{Display, Formatter};

use log::{debug, info};

use crate::branching::BranchingSplitter;
use crate::error::{Error, Result};
use crate::lts::LabelledTransitions;
use crate::partition::{BlockId, PartitionStack, StrongSplitter};
use crate::reduce::{Equivalence, ReductionDriver, ReductionOptions, ReductionStats};
use crate::scc::TauComponents;
use crate::transition_index::{TransitionIndex, TAU_LABEL};

/// Why two systems are not bisimilar.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Witness {
    /// Labels from the initial states. All but the last lead to
    /// `distinguished`, and usually only one of those can do the last.
    pub trace: Vec<String>,
    /// A state of the first and of the second system.
    pub distinguished: (usize, usize),
}

impl Display for Witness {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.trace.is_empty() {
            write!(f, "<empty trace>")?;
        } else {
            write!(f, "{}", self.trace.join(" "))?;
        }
        write!(f, " (states {} and {})", self.distinguished.0, self.distinguished.1)
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub bisimilar: bool,
    pub witness: Option<Witness>,
    pub stats: ReductionStats,
}

/// Compares `l1` and `l2` modulo the equivalence of `options`.
pub fn compare<L1, L2>(l1: &L1, l2: &L2, options: &ReductionOptions) -> Result<Comparison>
where
    L1: LabelledTransitions + ?Sized,
    L2: LabelledTransitions + ?Sized,
{
    for (init, n) in [(l1.initial_state(), l1.num_states()), (l2.initial_state(), l2.num_states())] {
        if init >= n {
            return Err(Error::InvalidState {
                state: init,
                num_states: n,
            });
        }
    }

    let mut builder = TransitionIndex::builder(&options.tau_actions);
    builder.add(l1)?;
    let offset = builder.add(l2)?;
    let index = builder.build();

    let branching = options.equivalence == Equivalence::Branching;
    let components = if branching {
        TauComponents::compute(&index)
    } else {
        TauComponents {
            component_of: (0..index.num_states()).collect(),
            count: index.num_states(),
        }
    };
    let contracted;
    let work = if branching {
        contracted = index.quotient(&components.component_of, components.count, true);
        &contracted
    } else {
        &index
    };

    let p = components.component_of[l1.initial_state()];
    let q = components.component_of[offset + l2.initial_state()];
    let (partition, stats) = if branching {
        let mut driver =
            ReductionDriver::new(work, BranchingSplitter::new()).with_max_iterations(options.max_iterations);
        driver.run_until(|part| part.block_of(p) != part.block_of(q))?;
        let stats = driver.stats().clone();
        (driver.into_partition(), stats)
    } else {
        let mut driver = ReductionDriver::new(work, StrongSplitter).with_max_iterations(options.max_iterations);
        driver.run_until(|part| part.block_of(p) != part.block_of(q))?;
        let stats = driver.stats().clone();
        (driver.into_partition(), stats)
    };

    if partition.block_of(p) == partition.block_of(q) {
        info!("{} bisimilar", options.equivalence);
        return Ok(Comparison {
            bisimilar: true,
            witness: None,
            stats,
        });
    }

    let (trace, (a, b)) = reconstruct(work, &partition, branching, p, q);
    let mut representative = vec![usize::MAX; components.count];
    for (s, &c) in components.component_of.iter().enumerate().rev() {
        representative[c] = s;
    }
    let witness = Witness {
        trace,
        distinguished: (representative[a], representative[b] - offset),
    };
    info!("not {} bisimilar: {}", options.equivalence, witness);
    Ok(Comparison {
        bisimilar: false,
        witness: Some(witness),
        stats,
    })
}

/// Follows the splits that separate `a` and `b` back to a distinguishing
/// trace. Stops at the first pair whose next step cannot be matched.
fn reconstruct(
    index: &TransitionIndex,
    partition: &PartitionStack,
    branching: bool,
    mut a: usize,
    mut b: usize,
) -> (Vec<String>, (usize, usize)) {
    let mut trace = Vec::new();
    while partition.block_of(a) != partition.block_of(b) && trace.len() <= partition.num_blocks() {
        let Some((child_a, child_b)) = separating_children(partition, a, b) else {
            break;
        };
        let created = partition.block(child_a);
        let (Some(label), Some(splitter)) = (created.action, created.splitter) else {
            break;
        };
        // The marked child is the one pushed first.
        let a_marked = child_a < child_b;
        let (m, u, marked_block) = if a_marked { (a, b, child_a) } else { (b, a, child_b) };

        let in_splitter = |t: usize| partition.is_descendant(partition.block_of(t), splitter);
        let next_m = if branching {
            branching_step(index, partition, label, m, marked_block, &in_splitter)
        } else {
            index.successors(label, m).iter().copied().find(|&t| in_splitter(t))
        };
        let Some(next_m) = next_m else {
            break;
        };
        trace.push(index.label_name(label).to_string());
        let Some(next_u) = unmarked_step(index, label, u, &in_splitter) else {
            debug!("state {} cannot do {}", u, index.label_name(label));
            break;
        };
        (a, b) = if a_marked { (next_m, next_u) } else { (next_u, next_m) };
    }
    (trace, (a, b))
}

/// A `label` successor of `u` outside the splitter. An inert `tau` step of
/// `u` may stay inside it, so any successor is the fallback.
fn unmarked_step(
    index: &TransitionIndex,
    label: usize,
    u: usize,
    in_splitter: &impl Fn(usize) -> bool,
) -> Option<usize> {
    let successors = index.successors(label, u);
    successors
        .iter()
        .copied()
        .find(|&t| !in_splitter(t))
        .or_else(|| successors.first().copied())
}

/// The children of the last common ancestor of the blocks of `a` and `b`.
fn separating_children(partition: &PartitionStack, a: usize, b: usize) -> Option<(BlockId, BlockId)> {
    let ancestors_a = partition.ancestors(partition.block_of(a));
    let ancestors_b = partition.ancestors(partition.block_of(b));
    let on_b: HashSet<BlockId> = ancestors_b.iter().copied().collect();
    let i = ancestors_a.iter().position(|x| on_b.contains(x))?;
    let j = ancestors_b.iter().position(|&x| x == ancestors_a[i])?;
    if i == 0 || j == 0 {
        return None;
    }
    Some((ancestors_a[i - 1], ancestors_b[j - 1]))
}

/// A `label` successor in the splitter reachable from `m` by `tau` steps
/// inside `block`.
fn branching_step(
    index: &TransitionIndex,
    partition: &PartitionStack,
    label: usize,
    m: usize,
    block: BlockId,
    in_splitter: &impl Fn(usize) -> bool,
) -> Option<usize> {
    let mut seen = HashSet::from([m]);
    let mut todo = VecDeque::from([m]);
    while let Some(x) = todo.pop_front() {
        if !(label == TAU_LABEL && in_splitter(x)) {
            if let Some(&t) = index.successors(label, x).iter().find(|&&t| in_splitter(t)) {
                return Some(t);
            }
        }
        for &y in index.successors(TAU_LABEL, x) {
            if partition.is_descendant(partition.block_of(y), block) && seen.insert(y) {
                todo.push_back(y);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::lts::Lts;

    #[test]
    fn test_isomorphic_systems_are_bisimilar() {
        let l1 = Lts::from_transitions(2, 0, [(0, "a", 1), (1, "b", 0)]).unwrap();
        let l2 = Lts::from_transitions(3, 0, [(0, "a", 1), (1, "b", 2), (2, "a", 1)]).unwrap();
        let c = compare(&l1, &l2, &ReductionOptions::default()).unwrap();
        assert!(c.bisimilar);
        assert_eq!(c.witness, None);
    }

    #[test]
    fn test_witness_of_missing_step() {
        // l1 can do a then b, l2 can do a then c
        let l1 = Lts::from_transitions(3, 0, [(0, "a", 1), (1, "b", 2)]).unwrap();
        let l2 = Lts::from_transitions(3, 0, [(0, "a", 1), (1, "c", 2)]).unwrap();
        let c = compare(&l1, &l2, &ReductionOptions::default()).unwrap();
        assert!(!c.bisimilar);
        let w = c.witness.unwrap();
        assert_eq!(w.trace.first().map(String::as_str), Some("a"));
        assert_eq!(w.distinguished, (1, 1));
    }

    #[test]
    fn test_unmarked_step_leaves_the_splitter() {
        let lts = Lts::from_transitions(4, 0, [(0, "tau", 1), (0, "tau", 2), (0, "a", 3)]).unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        assert_eq!(unmarked_step(&index, TAU_LABEL, 0, &|t: usize| t == 1), Some(2));
        assert_eq!(unmarked_step(&index, TAU_LABEL, 0, &|t: usize| t != 3), Some(1));
        assert_eq!(unmarked_step(&index, TAU_LABEL, 3, &|_: usize| false), None);
    }

    #[test]
    fn test_branching_ignores_inert_tau() {
        let l1 = Lts::from_transitions(3, 0, [(0, "tau", 1), (1, "a", 2)]).unwrap();
        let l2 = Lts::from_transitions(2, 0, [(0, "a", 1)]).unwrap();
        let strong = compare(&l1, &l2, &ReductionOptions::default()).unwrap();
        assert!(!strong.bisimilar);
        let branching = compare(&l1, &l2, &ReductionOptions::new(Equivalence::Branching)).unwrap();
        assert!(branching.bisimilar);
    }

    #[test]
    fn test_invalid_initial_state() {
        let l1 = Lts::default();
        let l2 = Lts::from_transitions(1, 0, []).unwrap();
        assert_eq!(
            compare(&l1, &l2, &ReductionOptions::default()).unwrap_err(),
            Error::InvalidState { state: 0, num_states: 0 }
        );
    }
}
