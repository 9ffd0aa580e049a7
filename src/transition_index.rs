//! Per-label adjacency of a transition relation.
//!
//! Labels are renumbered by name so that internal label `0` is always `tau`;
//! labels that are `tau` in the input, or whose action name is hidden, are
//! mapped onto it. For every label there is a map from source to targets and
//! one from target to sources. Several systems can be put side by side in one
//! index (each at its own state offset), which is how two systems are compared.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::error::{Error, Result};
use crate::lts::{LabelledTransitions, Transition, TAU};

/// The internal label.
pub const TAU_LABEL: usize = 0;

type Adjacency = HashMap<usize, Vec<usize>>;

#[derive(Debug, Clone)]
pub struct TransitionIndex {
    num_states: usize,
    labels: Vec<String>,
    forward: Vec<Adjacency>,
    backward: Vec<Adjacency>,
    incoming_labels: Vec<Vec<usize>>,
    num_transitions: usize,
}

impl TransitionIndex {
    /// Indexes a single system.
    pub fn new<L: LabelledTransitions + ?Sized>(lts: &L, hidden: &[String]) -> Result<Self> {
        let mut builder = TransitionIndexBuilder::new(hidden);
        builder.add(lts)?;
        Ok(builder.build())
    }

    pub fn builder(hidden: &[String]) -> TransitionIndexBuilder {
        TransitionIndexBuilder::new(hidden)
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.num_transitions
    }

    pub fn label_name(&self, label: usize) -> &str {
        &self.labels[label]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_tau(&self, label: usize) -> bool {
        label == TAU_LABEL
    }

    /// States `t` with `state --label--> t`.
    pub fn successors(&self, label: usize, state: usize) -> &[usize] {
        self.forward[label].get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// States `s` with `s --label--> state`.
    pub fn predecessors(&self, label: usize, state: usize) -> &[usize] {
        self.backward[label].get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Labels of the transitions entering `state`, ascending.
    pub fn incoming_labels(&self, state: usize) -> &[usize] {
        &self.incoming_labels[state]
    }

    /// All transitions, sorted by label, then source, then target.
    pub fn transitions(&self) -> Vec<Transition> {
        let mut result = Vec::with_capacity(self.num_transitions);
        for (label, adjacency) in self.forward.iter().enumerate() {
            for (&from, targets) in adjacency {
                result.extend(targets.iter().map(|&to| Transition::new(from, label, to)));
            }
        }
        result.sort_by_key(|t| (t.label, t.from, t.to));
        result
    }

    /// The index of the system whose states are the classes of `class_of`.
    ///
    /// Parallel transitions are merged. With `drop_tau_loops`, `tau` transitions
    /// that stay inside a class are left out.
    pub fn quotient(&self, class_of: &[usize], num_classes: usize, drop_tau_loops: bool) -> TransitionIndex {
        assert_eq!(class_of.len(), self.num_states, "class map has the wrong size");
        let mut seen = BTreeSet::new();
        for t in self.transitions() {
            let (from, to) = (class_of[t.from], class_of[t.to]);
            if drop_tau_loops && t.label == TAU_LABEL && from == to {
                continue;
            }
            seen.insert(Transition::new(from, t.label, to));
        }

        let mut builder = TransitionIndexBuilder {
            labels: self.labels.clone(),
            label_index: self.labels.iter().enumerate().map(|(i, l)| (l.clone(), i)).collect(),
            hidden: Vec::new(),
            transitions: Vec::new(),
            num_states: num_classes,
        };
        builder.transitions.extend(seen);
        builder.build()
    }
}

/// Collects the transitions of one or more systems.
#[derive(Debug, Clone)]
pub struct TransitionIndexBuilder {
    labels: Vec<String>,
    label_index: HashMap<String, usize>,
    hidden: Vec<String>,
    transitions: Vec<Transition>,
    num_states: usize,
}

impl TransitionIndexBuilder {
    pub fn new(hidden: &[String]) -> Self {
        Self {
            labels: vec![TAU.to_string()],
            label_index: HashMap::from([(TAU.to_string(), TAU_LABEL)]),
            hidden: hidden.to_vec(),
            transitions: Vec::new(),
            num_states: 0,
        }
    }

    /// Adds the states and transitions of `lts` after the ones added before.
    /// Returns the offset of its states.
    pub fn add<L: LabelledTransitions + ?Sized>(&mut self, lts: &L) -> Result<usize> {
        let offset = self.num_states;
        let n = lts.num_states();
        let labels: Vec<usize> = (0..lts.num_labels())
            .map(|l| {
                if lts.is_tau(l) {
                    TAU_LABEL
                } else {
                    self.intern(lts.label_name(l))
                }
            })
            .collect();

        for t in lts.transitions() {
            for state in [t.from, t.to] {
                if state >= n {
                    return Err(Error::InvalidState { state, num_states: n });
                }
            }
            let label = *labels.get(t.label).ok_or(Error::InvalidLabel {
                label: t.label,
                num_labels: labels.len(),
            })?;
            self.transitions.push(Transition::new(offset + t.from, label, offset + t.to));
        }
        self.num_states += n;
        Ok(offset)
    }

    fn intern(&mut self, name: &str) -> usize {
        let action = name.split('(').next().unwrap_or(name).trim();
        if self.hidden.iter().any(|h| h == action) {
            return TAU_LABEL;
        }
        if let Some(&label) = self.label_index.get(name) {
            return label;
        }
        let label = self.labels.len();
        self.labels.push(name.to_string());
        self.label_index.insert(name.to_string(), label);
        label
    }

    pub fn build(self) -> TransitionIndex {
        let num_labels = self.labels.len();
        let mut forward = vec![Adjacency::new(); num_labels];
        let mut backward = vec![Adjacency::new(); num_labels];
        let mut incoming: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.num_states];

        for t in &self.transitions {
            forward[t.label].entry(t.from).or_default().push(t.to);
            backward[t.label].entry(t.to).or_default().push(t.from);
            incoming[t.to].insert(t.label);
        }

        debug!(
            "indexed {} states, {} labels, {} transitions",
            self.num_states,
            num_labels,
            self.transitions.len()
        );
        TransitionIndex {
            num_states: self.num_states,
            labels: self.labels,
            forward,
            backward,
            incoming_labels: incoming.into_iter().map(|s| s.into_iter().collect()).collect(),
            num_transitions: self.transitions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::lts::Lts;

    #[test]
    fn test_adjacency() {
        let lts = Lts::from_transitions(3, 0, [(0, "a", 1), (0, "a", 2), (2, "b", 1), (1, "tau", 0)]).unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        assert_eq!(index.num_labels(), 3);
        assert_eq!(index.label_name(TAU_LABEL), "tau");
        let a = index.labels().iter().position(|l| l == "a").unwrap();
        assert_eq!(index.successors(a, 0), &[1, 2]);
        assert_eq!(index.predecessors(a, 1), &[0]);
        assert_eq!(index.predecessors(TAU_LABEL, 0), &[1]);
        assert_eq!(index.incoming_labels(1).len(), 2);
        assert_eq!(index.incoming_labels(0), &[TAU_LABEL]);
        assert_eq!(index.transitions().len(), 4);
    }

    #[test]
    fn test_hidden_actions() {
        let lts = Lts::from_transitions(2, 0, [(0, "send(1)", 1), (1, "recv", 0)]).unwrap();
        let index = TransitionIndex::new(&lts, &["send".to_string()]).unwrap();
        assert_eq!(index.num_labels(), 2);
        assert_eq!(index.successors(TAU_LABEL, 0), &[1]);
    }

    #[test]
    fn test_side_by_side() {
        let l1 = Lts::from_transitions(2, 0, [(0, "a", 1)]).unwrap();
        let l2 = Lts::from_transitions(2, 0, [(1, "a", 0)]).unwrap();
        let mut builder = TransitionIndex::builder(&[]);
        assert_eq!(builder.add(&l1).unwrap(), 0);
        assert_eq!(builder.add(&l2).unwrap(), 2);
        let index = builder.build();
        assert_eq!(index.num_states(), 4);
        // labels are unified by name
        assert_eq!(index.num_labels(), 2);
        assert_eq!(index.successors(1, 3), &[2]);
    }

    #[test]
    fn test_quotient() {
        let lts = Lts::from_transitions(3, 0, [(0, "tau", 1), (1, "a", 2), (0, "a", 2)]).unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        let q = index.quotient(&[0, 0, 1], 2, true);
        assert_eq!(q.num_states(), 2);
        assert_eq!(q.num_transitions(), 1);
        assert_eq!(q.successors(1, 0), &[1]);
    }
}
