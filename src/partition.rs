//! The partition of the state space into blocks.
//!
//! All states live in one permutation array `s`. A block is a half-open
//! interval `[left, right)` of `s`, and `blockref` maps every state to the block
//! that currently owns it. Splitting a block reorders its part of `s` in place
//! and pushes two new blocks; the old one is retired, never reused, so block
//! ids only grow during a run. The parent, action and splitter of every block
//! are kept for witness reconstruction.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use log::trace;

use crate::transition_index::TransitionIndex;

pub type BlockId = usize;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlockMode {
    Stable,
    Unstable,
    /// Retired by a split.
    Removed,
    /// Only for the single block of an empty state space.
    Empty,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Interval {
    pub left: usize,
    pub right: usize,
    pub mode: BlockMode,
    pub parent: Option<BlockId>,
    /// The label of the split that created this block.
    pub action: Option<usize>,
    /// The splitter of the split that created this block.
    pub splitter: Option<BlockId>,
}

impl Interval {
    pub fn len(&self) -> usize {
        self.right - self.left
    }

    pub fn is_empty(&self) -> bool {
        self.left == self.right
    }

    pub fn is_live(&self) -> bool {
        self.mode != BlockMode::Removed
    }
}

#[derive(Debug, Clone)]
pub struct PartitionStack {
    s: Vec<usize>,
    blockref: Vec<BlockId>,
    mark: Vec<bool>,
    blocks: Vec<Interval>,
}

impl PartitionStack {
    /// One stable block with all `num_states` states.
    pub fn new(num_states: usize) -> Self {
        let mode = if num_states == 0 {
            BlockMode::Empty
        } else {
            BlockMode::Stable
        };
        Self {
            s: (0..num_states).collect(),
            blockref: vec![0; num_states],
            mark: vec![false; num_states],
            blocks: vec![Interval {
                left: 0,
                right: num_states,
                mode,
                parent: None,
                action: None,
                splitter: None,
            }],
        }
    }

    /// One stable block per class, in ascending class order.
    /// Classes must be numbered densely from zero.
    pub fn from_classes(class_of: &[usize]) -> Self {
        let num_classes = class_of.iter().map(|&c| c + 1).max().unwrap_or(0);
        if num_classes == 0 {
            return Self::new(0);
        }
        let mut members = vec![Vec::new(); num_classes];
        for (state, &class) in class_of.iter().enumerate() {
            members[class].push(state);
        }
        assert!(members.iter().all(|m| !m.is_empty()), "classes must be dense");

        let mut partition = Self {
            s: Vec::with_capacity(class_of.len()),
            blockref: vec![0; class_of.len()],
            mark: vec![false; class_of.len()],
            blocks: Vec::with_capacity(num_classes),
        };
        for (id, states) in members.into_iter().enumerate() {
            let left = partition.s.len();
            for &state in &states {
                partition.blockref[state] = id;
            }
            partition.s.extend(states);
            partition.blocks.push(Interval {
                left,
                right: partition.s.len(),
                mode: BlockMode::Stable,
                parent: None,
                action: None,
                splitter: None,
            });
        }
        partition
    }

    pub fn num_states(&self) -> usize {
        self.s.len()
    }

    /// Number of blocks ever created, including removed ones.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, id: BlockId) -> &Interval {
        &self.blocks[id]
    }

    pub fn blocks(&self) -> &[Interval] {
        &self.blocks
    }

    pub fn set_mode(&mut self, id: BlockId, mode: BlockMode) {
        assert_ne!(self.blocks[id].mode, BlockMode::Removed, "block {} is removed", id);
        self.blocks[id].mode = mode;
    }

    /// Live blocks in ascending id order.
    pub fn live_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_live())
            .map(|(id, _)| id)
    }

    /// Number of live blocks with at least one state.
    pub fn num_classes(&self) -> usize {
        self.live_blocks().filter(|&b| !self.blocks[b].is_empty()).count()
    }

    pub fn count(&self, mode: BlockMode) -> usize {
        self.blocks.iter().filter(|b| b.mode == mode).count()
    }

    pub fn states(&self, id: BlockId) -> &[usize] {
        let b = &self.blocks[id];
        &self.s[b.left..b.right]
    }

    pub fn block_of(&self, state: usize) -> BlockId {
        self.blockref[state]
    }

    pub fn set_mark(&mut self, state: usize) {
        self.mark[state] = true;
    }

    pub fn is_marked(&self, state: usize) -> bool {
        self.mark[state]
    }

    pub fn clear_marks(&mut self, id: BlockId) {
        let b = &self.blocks[id];
        for &state in &self.s[b.left..b.right] {
            self.mark[state] = false;
        }
    }

    /// Moves the marked states of `id` to the front of its interval.
    ///
    /// Returns the boundary between marked and unmarked states, or `None` if
    /// the block is fully marked or fully unmarked, in which case the marks
    /// are cleared and nothing moves.
    pub fn split(&mut self, id: BlockId) -> Option<usize> {
        let Interval { left, right, .. } = self.blocks[id];
        let (mut i, mut j) = (left, right);
        loop {
            while i < j && self.mark[self.s[i]] {
                i += 1;
            }
            while i < j && !self.mark[self.s[j - 1]] {
                j -= 1;
            }
            if i >= j {
                break;
            }
            self.s.swap(i, j - 1);
            i += 1;
            j -= 1;
        }

        if i == left || i == right {
            self.clear_marks(id);
            return None;
        }
        Some(i)
    }

    /// Replaces `id` by `[left, boundary)` and `[boundary, right)`.
    ///
    /// Both children are unstable and the marked one gets the lower id.
    /// Clears the marks and returns `(marked, unmarked)`.
    pub fn refine(&mut self, id: BlockId, boundary: usize, action: usize, splitter: BlockId) -> (BlockId, BlockId) {
        let Interval { left, right, .. } = self.blocks[id];
        assert!(left < boundary && boundary < right, "boundary {} outside of block {}", boundary, id);
        self.blocks[id].mode = BlockMode::Removed;

        let mut children = [0; 2];
        for (k, (l, r)) in [(left, boundary), (boundary, right)].into_iter().enumerate() {
            let child = self.blocks.len();
            self.blocks.push(Interval {
                left: l,
                right: r,
                mode: BlockMode::Unstable,
                parent: Some(id),
                action: Some(action),
                splitter: Some(splitter),
            });
            for p in l..r {
                let state = self.s[p];
                self.blockref[state] = child;
                self.mark[state] = false;
            }
            children[k] = child;
        }
        trace!(
            "split block {} on label {} by block {} into {} and {}",
            id,
            action,
            splitter,
            children[0],
            children[1]
        );
        (children[0], children[1])
    }

    /// Whether `block` is `ancestor` or was created by splitting it.
    pub fn is_descendant(&self, mut block: BlockId, ancestor: BlockId) -> bool {
        loop {
            if block == ancestor {
                return true;
            }
            match self.blocks[block].parent {
                Some(parent) => block = parent,
                None => return false,
            }
        }
    }

    /// Blocks from `block` up to its root, `block` first.
    pub fn ancestors(&self, block: BlockId) -> Vec<BlockId> {
        let mut result = vec![block];
        let mut current = block;
        while let Some(parent) = self.blocks[current].parent {
            result.push(parent);
            current = parent;
        }
        result
    }

    /// The live blocks cover `[0, n)` exactly and `blockref` agrees with them.
    pub fn check_invariants(&self) -> bool {
        let mut covered = vec![false; self.s.len()];
        for id in self.live_blocks() {
            let b = &self.blocks[id];
            if b.left > b.right || b.right > self.s.len() {
                return false;
            }
            for p in b.left..b.right {
                if covered[p] || self.blockref[self.s[p]] != id {
                    return false;
                }
                covered[p] = true;
            }
        }
        let mut seen = vec![false; self.s.len()];
        for &state in &self.s {
            if state >= seen.len() || seen[state] {
                return false;
            }
            seen[state] = true;
        }
        covered.into_iter().all(|c| c)
    }
}

impl Display for PartitionStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for id in self.live_blocks() {
            writeln!(f, "block {} {:?}: {:?}", id, self.blocks[id].mode, self.states(id))?;
        }
        Ok(())
    }
}

/// Decides which states of a candidate block are separated by a splitter.
pub trait Splitter {
    /// Marks the states that are separated by a `label` step into the
    /// splitter, and returns the blocks of the marked states.
    ///
    /// `members` are the states of the splitter and `in_splitter` is its
    /// membership indexed by state.
    fn mark(
        &mut self,
        partition: &mut PartitionStack,
        index: &TransitionIndex,
        label: usize,
        members: &[usize],
        in_splitter: &[bool],
    ) -> BTreeSet<BlockId>;

    /// Completes the marking of `block` before it is split.
    fn prepare(&mut self, _partition: &mut PartitionStack, _index: &TransitionIndex, _block: BlockId) {}

    /// Whether the driver has to repeat full passes until no block splits.
    fn needs_repeated_passes(&self) -> bool {
        false
    }
}

/// Strong bisimulation: a state is marked iff it has a direct transition into the splitter.
#[derive(Debug, Default, Copy, Clone)]
pub struct StrongSplitter;

impl Splitter for StrongSplitter {
    fn mark(
        &mut self,
        partition: &mut PartitionStack,
        index: &TransitionIndex,
        label: usize,
        members: &[usize],
        _in_splitter: &[bool],
    ) -> BTreeSet<BlockId> {
        let mut candidates = BTreeSet::new();
        for &t in members {
            for &s in index.predecessors(label, t) {
                partition.set_mark(s);
                candidates.insert(partition.block_of(s));
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_split_moves_marked_states_first() {
        let mut p = PartitionStack::new(6);
        for s in [1, 4, 5] {
            p.set_mark(s);
        }
        let boundary = p.split(0).unwrap();
        assert_eq!(boundary, 3);
        let mut marked = p.states(0)[..boundary].to_vec();
        marked.sort_unstable();
        assert_eq!(marked, vec![1, 4, 5]);
        let mut all = p.states(0).to_vec();
        all.sort_unstable();
        assert_eq!(all, (0..6).collect::<Vec<_>>());

        let (a, b) = p.refine(0, boundary, 1, 0);
        assert_eq!((a, b), (1, 2));
        assert_eq!(p.block(0).mode, BlockMode::Removed);
        assert_eq!(p.block_of(4), a);
        assert_eq!(p.block_of(0), b);
        assert!(!p.is_marked(4));
        assert!(p.check_invariants());
        assert!(p.is_descendant(b, 0));
        assert!(!p.is_descendant(a, b));
        assert_eq!(p.ancestors(b), vec![2, 0]);
    }

    #[test]
    fn test_homogeneous_block_is_not_split() {
        let mut p = PartitionStack::new(3);
        for s in 0..3 {
            p.set_mark(s);
        }
        assert_eq!(p.split(0), None);
        assert!((0..3).all(|s| !p.is_marked(s)));
        assert_eq!(p.split(0), None);
        assert_eq!(p.num_blocks(), 1);
    }

    #[test]
    fn test_from_classes() {
        let p = PartitionStack::from_classes(&[1, 0, 1, 2]);
        assert_eq!(p.num_blocks(), 3);
        assert_eq!(p.states(1), &[0, 2]);
        assert_eq!(p.block_of(3), 2);
        assert_eq!(p.count(BlockMode::Stable), 3);
        assert!(p.check_invariants());
    }

    #[test]
    fn test_empty() {
        let p = PartitionStack::new(0);
        assert_eq!(p.block(0).mode, BlockMode::Empty);
        assert!(p.check_invariants());
    }
}
