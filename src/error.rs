//! Error type shared by both analyses.

use thiserror::Error;

/// Errors surfaced when an input violates a precondition of one of the passes.
///
/// Values that merely cannot be determined (non-constant destinations, missing
/// source bindings) are not errors; see [`ControlValue`][crate::source_destination::ControlValue].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("equation {equation} is not in PFNF: {reason}")]
    NotPfnf { equation: String, reason: String },

    #[error("no equation for propositional variable {name}")]
    UnknownEquation { name: String },

    #[error("instantiation of {name} has {found} arguments, expected {expected}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{pass} did not converge within {limit} iterations")]
    IterationLimit { pass: &'static str, limit: usize },

    #[error("state {state} is out of range (number of states is {num_states})")]
    InvalidState { state: usize, num_states: usize },

    #[error("label {label} is out of range (number of labels is {num_labels})")]
    InvalidLabel { label: usize, num_labels: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
