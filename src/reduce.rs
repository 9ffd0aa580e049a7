//! Reduction of labelled transition systems modulo bisimulation.
//!
//! # Partition refinement
//!
//! The state space starts as a single block. A block `C` together with a label
//! `a` is a *splitter*: every other block `B` is split into the states that can
//! do an `a` step into `C` and the states that cannot. When no splitter splits
//! any block, the partition is stable and its blocks are the equivalence
//! classes.
//!
//! ## Driver
//!
//! Every outer pass flips all stable blocks to unstable and pushes them on a
//! stack. Blocks are popped (highest id first), made stable, and used as a
//! splitter for every label that enters one of their states. Both halves of a
//! split are pushed as new unstable blocks.
//!
//! For strong bisimulation a split never undoes the stability of a block with
//! respect to an older splitter, so the pass after the first one finds nothing
//! to split. For branching bisimulation it can, since splitting a block breaks
//! `tau` paths inside it. Passes are repeated until one of them ends without a
//! split and without new stable blocks.
//!
//! ## Branching
//!
//! `tau` cycles are contracted first ([`TauComponents`]). Marks are saturated
//! backwards along `tau` steps inside the block before it is split, and `tau`
//! steps inside the splitter do not mark at all, see
//! [`BranchingSplitter`][crate::branching::BranchingSplitter].
//!
//! # References
//!
//! - J. F. Groote, F. Vaandrager. "An efficient algorithm for branching
//!   bisimulation and stuttering equivalence." ICALP 1990.
//!
//! - P. C. Kanellakis, S. A. Smolka. "CCS expressions, finite state processes,
//!   and three problems of equivalence." Information and Computation, 1990.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use log::{debug, info};

use crate::branching::BranchingSplitter;
use crate::error::{Error, Result};
use crate::lts::{LabelledTransitions, Lts};
use crate::partition::{BlockMode, PartitionStack, Splitter, StrongSplitter};
use crate::quotient::{EquivalenceClassEmitter, EquivalenceClasses};
use crate::scc::TauComponents;
use crate::transition_index::TransitionIndex;

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Equivalence {
    #[default]
    Strong,
    Branching,
}

impl Display for Equivalence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Equivalence::Strong => write!(f, "strong"),
            Equivalence::Branching => write!(f, "branching"),
        }
    }
}

impl FromStr for Equivalence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strong" | "bisim" => Ok(Equivalence::Strong),
            "branching" | "branching-bisim" => Ok(Equivalence::Branching),
            _ => Err(format!("unknown equivalence '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReductionOptions {
    pub equivalence: Equivalence,
    /// Actions treated as `tau`. A label matches if its name up to the first
    /// `(` is in this list.
    pub tau_actions: Vec<String>,
    /// Leave out `tau` self loops of the quotient.
    /// Defaults to `true` for branching and `false` for strong bisimulation.
    pub omit_tau_loops: Option<bool>,
    /// Upper bound on the number of splitters processed.
    pub max_iterations: Option<usize>,
}

impl ReductionOptions {
    pub fn new(equivalence: Equivalence) -> Self {
        Self {
            equivalence,
            ..Default::default()
        }
    }

    pub fn omits_tau_loops(&self) -> bool {
        self.omit_tau_loops
            .unwrap_or(self.equivalence == Equivalence::Branching)
    }
}

/// Statistics collected during reduction.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ReductionStats {
    /// Number of outer passes
    pub passes: usize,
    /// Number of successful splits
    pub splits: usize,
    /// Number of splitters processed
    pub splitters: usize,
    /// Number of equivalence classes
    pub blocks: usize,
    /// Number of `tau` components, for branching bisimulation
    pub tau_components: usize,
    /// Number of transitions of the quotient that are not `tau`
    pub non_tau_transitions: usize,
}

/// Refines a partition until it is stable.
pub struct ReductionDriver<'a, S> {
    index: &'a TransitionIndex,
    splitter: S,
    partition: PartitionStack,
    in_splitter: Vec<bool>,
    max_iterations: Option<usize>,
    stats: ReductionStats,
}

impl<'a, S: Splitter> ReductionDriver<'a, S> {
    /// Starts from a single block with all states.
    pub fn new(index: &'a TransitionIndex, splitter: S) -> Self {
        Self::with_partition(index, splitter, PartitionStack::new(index.num_states()))
    }

    pub fn with_partition(index: &'a TransitionIndex, splitter: S, partition: PartitionStack) -> Self {
        assert_eq!(
            partition.num_states(),
            index.num_states(),
            "partition does not match the transition index"
        );
        Self {
            index,
            splitter,
            partition,
            in_splitter: vec![false; index.num_states()],
            max_iterations: None,
            stats: ReductionStats::default(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn partition(&self) -> &PartitionStack {
        &self.partition
    }

    pub fn into_partition(self) -> PartitionStack {
        self.partition
    }

    pub fn stats(&self) -> &ReductionStats {
        &self.stats
    }

    /// Refines until the partition is stable.
    pub fn run(&mut self) -> Result<()> {
        self.run_until(|_| false).map(|_| ())
    }

    /// Refines until the partition is stable, or until `stop` holds after a
    /// split. Returns whether it stopped early.
    pub fn run_until(&mut self, mut stop: impl FnMut(&PartitionStack) -> bool) -> Result<bool> {
        let repeat = self.splitter.needs_repeated_passes();
        loop {
            self.stats.passes += 1;
            let stable_before = self.partition.count(BlockMode::Stable);

            let mut stack = Vec::new();
            for id in 0..self.partition.num_blocks() {
                if self.partition.block(id).mode == BlockMode::Stable {
                    self.partition.set_mode(id, BlockMode::Unstable);
                    stack.push(id);
                }
            }
            debug!("pass {}: {} unstable blocks", self.stats.passes, stack.len());

            let mut split = false;
            while let Some(block) = stack.pop() {
                if self.partition.block(block).mode != BlockMode::Unstable {
                    continue;
                }
                self.stats.splitters += 1;
                if let Some(limit) = self.max_iterations {
                    if self.stats.splitters > limit {
                        return Err(Error::IterationLimit {
                            pass: "bisimulation",
                            limit,
                        });
                    }
                }

                self.partition.set_mode(block, BlockMode::Stable);
                let members = self.partition.states(block).to_vec();
                for &s in &members {
                    self.in_splitter[s] = true;
                }
                let labels: BTreeSet<usize> = members
                    .iter()
                    .flat_map(|&s| self.index.incoming_labels(s).iter().copied())
                    .collect();

                let mut stopped = false;
                'labels: for label in labels {
                    let candidates = self
                        .splitter
                        .mark(&mut self.partition, self.index, label, &members, &self.in_splitter);
                    for candidate in candidates {
                        self.splitter.prepare(&mut self.partition, self.index, candidate);
                        let Some(boundary) = self.partition.split(candidate) else {
                            continue;
                        };
                        let (marked, unmarked) = self.partition.refine(candidate, boundary, label, block);
                        stack.push(marked);
                        stack.push(unmarked);
                        split = true;
                        self.stats.splits += 1;
                        if stop(&self.partition) {
                            stopped = true;
                            break 'labels;
                        }
                    }
                }

                for &s in &members {
                    self.in_splitter[s] = false;
                }
                if stopped {
                    // Marks of the candidates not yet split are left behind.
                    for id in 0..self.partition.num_blocks() {
                        if self.partition.block(id).is_live() {
                            self.partition.clear_marks(id);
                        }
                    }
                    self.stats.blocks = self.partition.num_classes();
                    debug!("stopped after {} splits", self.stats.splits);
                    return Ok(true);
                }
            }

            debug_assert!(self.partition.check_invariants());
            let grew = self.partition.count(BlockMode::Stable) > stable_before;
            if !split && !(repeat && grew) {
                break;
            }
        }

        self.stats.blocks = self.partition.num_classes();
        debug!(
            "stable after {} passes, {} splits, {} blocks",
            self.stats.passes, self.stats.splits, self.stats.blocks
        );
        Ok(false)
    }
}

/// The result of [`reduce`].
#[derive(Debug, Clone)]
pub struct Reduction {
    pub lts: Lts,
    /// Class of every state of the input.
    pub classes: EquivalenceClasses,
    pub stats: ReductionStats,
}

/// Reduces `lts` modulo the equivalence of `options`.
pub fn reduce<L: LabelledTransitions + ?Sized>(lts: &L, options: &ReductionOptions) -> Result<Reduction> {
    let n = lts.num_states();
    if n > 0 && lts.initial_state() >= n {
        return Err(Error::InvalidState {
            state: lts.initial_state(),
            num_states: n,
        });
    }
    let index = TransitionIndex::new(lts, &options.tau_actions)?;

    let (classes, mut stats) = match options.equivalence {
        Equivalence::Strong => {
            let mut driver = ReductionDriver::new(&index, StrongSplitter).with_max_iterations(options.max_iterations);
            driver.run()?;
            let classes = EquivalenceClasses::from_partition(driver.partition());
            (classes, driver.stats().clone())
        }
        Equivalence::Branching => {
            let components = TauComponents::compute(&index);
            let contracted = index.quotient(&components.component_of, components.count, true);
            let mut driver = ReductionDriver::new(&contracted, BranchingSplitter::new())
                .with_max_iterations(options.max_iterations);
            driver.run()?;
            let classes = EquivalenceClasses::from_partition(driver.partition()).compose(&components.component_of);
            let mut stats = driver.stats().clone();
            stats.tau_components = components.count;
            (classes, stats)
        }
    };

    let quotient = EquivalenceClassEmitter::new(&index, &classes)
        .omit_tau_loops(options.omits_tau_loops())
        .emit(lts.initial_state())?;
    stats.non_tau_transitions = quotient.non_tau_transitions;

    info!(
        "{} bisimulation reduction: {} states and {} transitions to {} states and {} transitions ({} not tau)",
        options.equivalence,
        n,
        index.num_transitions(),
        quotient.lts.num_states(),
        quotient.lts.num_transitions(),
        quotient.non_tau_transitions
    );
    Ok(Reduction {
        lts: quotient.lts,
        classes,
        stats,
    })
}
