//! # pbes-bisim: control flow analysis of equation systems and bisimulation reduction
//!
//! **`pbes-bisim`** holds two independent analyses used in model checking:
//!
//! - a **control flow analysis** of parameterised boolean equation systems (PBES) that
//!   finds the parameters which behave like a program counter, builds a control flow
//!   graph over their values, and resets data parameters that are never read again;
//! - a **partition refinement** kernel that reduces a labelled transition system modulo
//!   strong or branching bisimulation, or decides whether two systems are bisimilar.
//!
//! ## What is a PBES?
//!
//! A PBES is a sequence of fixpoint equations `sigma X(d: D) = phi`, where `phi` is a
//! formula over data expressions and instantiations `Y(e)` of the equations. The
//! analysis works on the *predicate formula normal form* (PFNF), where every right-hand
//! side is
//!
//! ```text
//! Q v. h && (g_1 => Y_1(e_1) || ...) && ... && (g_n => ...)
//! ```
//!
//! with simple (instantiation free) `h` and `g_i`.
//!
//! ## Basic Usage
//!
//! ```rust
//! use pbes_bisim::lts::{LabelledTransitions, Lts};
//! use pbes_bisim::reduce::{reduce, Equivalence, ReductionOptions};
//!
//! // 0 -tau-> 1, and 1 is a deadlock
//! let lts = Lts::from_transitions(2, 0, [(0, "tau", 1)]).unwrap();
//!
//! let strong = reduce(&lts, &ReductionOptions::new(Equivalence::Strong)).unwrap();
//! assert_eq!(strong.lts.num_states(), 2);
//!
//! let branching = reduce(&lts, &ReductionOptions::new(Equivalence::Branching)).unwrap();
//! assert_eq!(branching.lts.num_states(), 1);
//! ```
//!
//! For the control flow analysis see [`control_flow`].
//!
//! ## Core Components
//!
//! - **[`pbes`]**, **[`data`]**, **[`rewriter`]**: equation systems, data expressions and their simplification.
//! - **[`pfnf`]**: normalisation into PFNF.
//! - **[`source_destination`]**, **[`influence`]**, **[`control_flow_parameters`]**: detection of control flow parameters.
//! - **[`control_flow_graph`]**, **[`marking`]**, **[`reset`]**: the control flow graph and the reset of unread parameters.
//! - **[`control_flow`]**: the whole pipeline.
//! - **[`lts`]**, **[`transition_index`]**, **[`partition`]**, **[`branching`]**, **[`scc`]**: the refinement kernel.
//! - **[`reduce`]**, **[`quotient`]**, **[`compare`]**: reduction, quotients and comparison.
//! - **[`dot`]**: Utilities for visualizing graphs using Graphviz.

pub mod branching;
pub mod compare;
pub mod control_flow;
pub mod control_flow_graph;
pub mod control_flow_parameters;
pub mod data;
pub mod dot;
pub mod error;
pub mod influence;
pub mod lts;
pub mod marking;
pub mod partition;
pub mod pbes;
pub mod pfnf;
pub mod quotient;
pub mod reduce;
pub mod reset;
pub mod rewriter;
pub mod scc;
pub mod source_destination;
pub mod transition_index;
