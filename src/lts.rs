//! Labelled transition systems.
//!
//! States and labels are dense indices. A label is internal if its name is
//! `tau`; further actions can be hidden when reducing, see
//! [`ReductionOptions::tau_actions`][crate::reduce::ReductionOptions::tau_actions].

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::error::{Error, Result};

pub const TAU: &str = "tau";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Transition {
    pub from: usize,
    pub label: usize,
    pub to: usize,
}

impl Transition {
    pub fn new(from: usize, label: usize, to: usize) -> Self {
        Self { from, label, to }
    }
}

/// Read access to a transition relation.
pub trait LabelledTransitions {
    fn num_states(&self) -> usize;
    fn num_labels(&self) -> usize;
    fn initial_state(&self) -> usize;
    fn label_name(&self, label: usize) -> &str;
    fn transitions(&self) -> Box<dyn Iterator<Item = Transition> + '_>;

    fn is_tau(&self, label: usize) -> bool {
        self.label_name(label) == TAU
    }

    fn num_transitions(&self) -> usize {
        self.transitions().count()
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Lts {
    num_states: usize,
    initial_state: usize,
    labels: Vec<String>,
    transitions: Vec<Transition>,
}

impl Lts {
    pub fn new(num_states: usize, initial_state: usize) -> Result<Self> {
        if initial_state >= num_states && num_states > 0 {
            return Err(Error::InvalidState {
                state: initial_state,
                num_states,
            });
        }
        Ok(Self {
            num_states,
            initial_state,
            labels: Vec::new(),
            transitions: Vec::new(),
        })
    }

    /// Builds an LTS from `(from, label name, to)` triples.
    pub fn from_transitions<'a>(
        num_states: usize,
        initial_state: usize,
        transitions: impl IntoIterator<Item = (usize, &'a str, usize)>,
    ) -> Result<Self> {
        let mut lts = Self::new(num_states, initial_state)?;
        for (from, name, to) in transitions {
            let label = lts.add_label(name);
            lts.add_transition(from, label, to)?;
        }
        Ok(lts)
    }

    /// Returns the index of the label `name`, adding it if it is new.
    pub fn add_label(&mut self, name: &str) -> usize {
        match self.labels.iter().position(|l| l == name) {
            Some(label) => label,
            None => {
                self.labels.push(name.to_string());
                self.labels.len() - 1
            }
        }
    }

    pub fn add_transition(&mut self, from: usize, label: usize, to: usize) -> Result<()> {
        for state in [from, to] {
            if state >= self.num_states {
                return Err(Error::InvalidState {
                    state,
                    num_states: self.num_states,
                });
            }
        }
        if label >= self.labels.len() {
            return Err(Error::InvalidLabel {
                label,
                num_labels: self.labels.len(),
            });
        }
        self.transitions.push(Transition::new(from, label, to));
        Ok(())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn transition_list(&self) -> &[Transition] {
        &self.transitions
    }

    /// Set of `(from, label name, to)`, for comparisons in tests and tools.
    pub fn named_transitions(&self) -> BTreeSet<(usize, &str, usize)> {
        self.transitions
            .iter()
            .map(|t| (t.from, self.labels[t.label].as_str(), t.to))
            .collect()
    }
}

impl LabelledTransitions for Lts {
    fn num_states(&self) -> usize {
        self.num_states
    }

    fn num_labels(&self) -> usize {
        self.labels.len()
    }

    fn initial_state(&self) -> usize {
        self.initial_state
    }

    fn label_name(&self, label: usize) -> &str {
        &self.labels[label]
    }

    fn transitions(&self) -> Box<dyn Iterator<Item = Transition> + '_> {
        Box::new(self.transitions.iter().copied())
    }

    fn num_transitions(&self) -> usize {
        self.transitions.len()
    }
}

impl Display for Lts {
    /// Prints in the `.aut` layout: a header line and one line per transition.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "des ({}, {}, {})",
            self.initial_state,
            self.transitions.len(),
            self.num_states
        )?;
        for t in &self.transitions {
            writeln!(f, "({}, \"{}\", {})", t.from, self.labels[t.label], t.to)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_build() {
        let lts = Lts::from_transitions(3, 0, [(0, "a", 1), (1, "tau", 2), (2, "a", 0)]).unwrap();
        assert_eq!(lts.num_states(), 3);
        assert_eq!(lts.num_labels(), 2);
        assert_eq!(lts.num_transitions(), 3);
        assert!(lts.is_tau(1));
        assert!(!lts.is_tau(0));
        assert_eq!(lts.to_string().lines().next(), Some("des (0, 3, 3)"));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            Lts::from_transitions(2, 0, [(0, "a", 2)]),
            Err(Error::InvalidState { state: 2, num_states: 2 })
        );
        assert_eq!(Lts::new(2, 5), Err(Error::InvalidState { state: 5, num_states: 2 }));
        let mut lts = Lts::new(1, 0).unwrap();
        assert_eq!(
            lts.add_transition(0, 0, 0),
            Err(Error::InvalidLabel { label: 0, num_labels: 0 })
        );
    }
}
