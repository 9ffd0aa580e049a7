//! Emitting the quotient of a stable partition.

use std::collections::HashMap;

use log::debug;

use crate::error::{Error, Result};
use crate::lts::Lts;
use crate::partition::PartitionStack;
use crate::transition_index::{TransitionIndex, TAU_LABEL};

/// Equivalence classes with dense indices.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EquivalenceClasses {
    /// Class of every state.
    pub class_of: Vec<usize>,
    pub num_classes: usize,
}

impl EquivalenceClasses {
    /// Numbers the live blocks of `partition` in ascending block id order.
    pub fn from_partition(partition: &PartitionStack) -> Self {
        let mut class_of = vec![0; partition.num_states()];
        let mut num_classes = 0;
        for block in partition.live_blocks() {
            let states = partition.states(block);
            if states.is_empty() {
                continue;
            }
            for &s in states {
                class_of[s] = num_classes;
            }
            num_classes += 1;
        }
        Self { class_of, num_classes }
    }

    /// The classes of states that were first mapped onto `component_of`.
    pub fn compose(&self, component_of: &[usize]) -> Self {
        Self {
            class_of: component_of.iter().map(|&c| self.class_of[c]).collect(),
            num_classes: self.num_classes,
        }
    }

    pub fn class(&self, state: usize) -> usize {
        self.class_of[state]
    }

    /// States of every class, ascending.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut result = vec![Vec::new(); self.num_classes];
        for (s, &c) in self.class_of.iter().enumerate() {
            result[c].push(s);
        }
        result
    }
}

/// The quotient system together with some counts.
#[derive(Debug, Clone)]
pub struct Quotient {
    pub lts: Lts,
    pub non_tau_transitions: usize,
}

pub struct EquivalenceClassEmitter<'a> {
    index: &'a TransitionIndex,
    classes: &'a EquivalenceClasses,
    omit_tau_loops: bool,
}

impl<'a> EquivalenceClassEmitter<'a> {
    pub fn new(index: &'a TransitionIndex, classes: &'a EquivalenceClasses) -> Self {
        assert_eq!(
            index.num_states(),
            classes.class_of.len(),
            "classes do not match the transition index"
        );
        Self {
            index,
            classes,
            omit_tau_loops: false,
        }
    }

    /// Leave out `tau` transitions from a class to itself.
    pub fn omit_tau_loops(mut self, omit: bool) -> Self {
        self.omit_tau_loops = omit;
        self
    }

    /// One state per class, with parallel transitions merged.
    pub fn emit(&self, initial_state: usize) -> Result<Quotient> {
        if self.index.num_states() == 0 {
            return Ok(Quotient {
                lts: Lts::default(),
                non_tau_transitions: 0,
            });
        }
        if initial_state >= self.index.num_states() {
            return Err(Error::InvalidState {
                state: initial_state,
                num_states: self.index.num_states(),
            });
        }
        let quotient = self
            .index
            .quotient(&self.classes.class_of, self.classes.num_classes, self.omit_tau_loops);

        let mut lts = Lts::new(self.classes.num_classes, self.classes.class(initial_state))?;
        let mut labels = HashMap::new();
        let mut non_tau_transitions = 0;
        for t in quotient.transitions() {
            let label = *labels
                .entry(t.label)
                .or_insert_with(|| lts.add_label(quotient.label_name(t.label)));
            lts.add_transition(t.from, label, t.to)?;
            if t.label != TAU_LABEL {
                non_tau_transitions += 1;
            }
        }

        debug!(
            "emitted {} classes and {} transitions, {} of them visible",
            self.classes.num_classes,
            lts.transition_list().len(),
            non_tau_transitions
        );
        Ok(Quotient {
            lts,
            non_tau_transitions,
        })
    }
}
