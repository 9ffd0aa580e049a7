//! Splitting for branching bisimulation.
//!
//! A state is separated by `(label, splitter)` if it can reach, by `tau` steps
//! inside its own block, a state with a `label` step into the splitter. `tau`
//! steps from inside the splitter into the splitter are inert and do not mark.

use std::collections::BTreeSet;

use log::trace;

use crate::partition::{BlockId, PartitionStack, Splitter};
use crate::transition_index::{TransitionIndex, TAU_LABEL};

#[derive(Debug, Default, Clone)]
pub struct BranchingSplitter {
    todo: Vec<usize>,
}

impl BranchingSplitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Splitter for BranchingSplitter {
    fn mark(
        &mut self,
        partition: &mut PartitionStack,
        index: &TransitionIndex,
        label: usize,
        members: &[usize],
        in_splitter: &[bool],
    ) -> BTreeSet<BlockId> {
        let mut candidates = BTreeSet::new();
        for &t in members {
            for &s in index.predecessors(label, t) {
                if label == TAU_LABEL && in_splitter[s] {
                    continue;
                }
                partition.set_mark(s);
                candidates.insert(partition.block_of(s));
            }
        }
        candidates
    }

    /// Extends the marks of `block` backwards along `tau` steps inside it.
    fn prepare(&mut self, partition: &mut PartitionStack, index: &TransitionIndex, block: BlockId) {
        self.todo.clear();
        self.todo
            .extend(partition.states(block).iter().copied().filter(|&s| partition.is_marked(s)));
        let initial = self.todo.len();

        let mut added = 0;
        while let Some(t) = self.todo.pop() {
            for &s in index.predecessors(TAU_LABEL, t) {
                if partition.block_of(s) == block && !partition.is_marked(s) {
                    partition.set_mark(s);
                    self.todo.push(s);
                    added += 1;
                }
            }
        }
        if added > 0 {
            trace!("tau saturation of block {} marked {} more states after {}", block, added, initial);
        }
    }

    fn needs_repeated_passes(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::lts::Lts;

    #[test]
    fn test_saturation_follows_tau_inside_block() {
        // 0 -tau-> 1 -a-> 2, and 3 is deadlocked
        let lts = Lts::from_transitions(4, 0, [(0, "tau", 1), (1, "a", 2)]).unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        let a = index.labels().iter().position(|l| l == "a").unwrap();
        let mut partition = PartitionStack::new(4);
        let members: Vec<usize> = partition.states(0).to_vec();
        let mut splitter = BranchingSplitter::new();

        let candidates = splitter.mark(&mut partition, &index, a, &members, &[true; 4]);
        assert_eq!(candidates, BTreeSet::from([0]));
        assert!(partition.is_marked(1));
        assert!(!partition.is_marked(0));

        splitter.prepare(&mut partition, &index, 0);
        assert!(partition.is_marked(0));
        assert!(!partition.is_marked(3));
        let boundary = partition.split(0).unwrap();
        assert_eq!(boundary, 2);
    }

    #[test]
    fn test_inert_tau_does_not_mark() {
        let lts = Lts::from_transitions(2, 0, [(0, "tau", 1)]).unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        let mut partition = PartitionStack::new(2);
        let members: Vec<usize> = partition.states(0).to_vec();
        let candidates = BranchingSplitter::new().mark(&mut partition, &index, TAU_LABEL, &members, &[true; 2]);
        assert!(candidates.is_empty());
        assert!(!partition.is_marked(0));
    }
}
