//! Control flow graphs and transition systems in DOT (Graphviz) format.
//!
//! # DOT Format
//!
//! - **Control flow graphs**: one node per vertex, labelled with its projected
//!   instantiation. Guards and marked parameters are listed below the name.
//!   The initial vertex gets a double border. Edges carry their label
//!   instantiation.
//! - **Transition systems**: one node per state and one edge per transition.
//!   `tau` edges are dashed. The initial state gets a double border.
//!
//! # Examples
//!
//! ```
//! use pbes_bisim::lts::Lts;
//!
//! let lts = Lts::from_transitions(2, 0, [(0, "a", 1), (1, "tau", 0)]).unwrap();
//! let dot = pbes_bisim::dot::lts_to_dot(&lts).unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! assert!(dot.starts_with("digraph {"));
//! ```

use std::fmt::Write as _;

use crate::control_flow_graph::ControlFlowGraph;
use crate::lts::LabelledTransitions;

/// Configuration options for DOT output generation.
///
/// # Examples
///
/// ```
/// use pbes_bisim::dot::DotConfig;
///
/// let config = DotConfig {
///     node_shape: "circle",
///     show_guards: false,
///     ..DotConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for vertices and states (default: "box")
    pub node_shape: &'static str,
    /// Number of borders of the initial vertex or state (default: 2)
    pub initial_peripheries: u8,
    /// Style for `tau` edges (default: "dashed")
    pub tau_edge_style: &'static str,
    /// Style for other edges (default: "solid")
    pub edge_style: &'static str,
    /// Whether to list the guards of a vertex (default: true)
    pub show_guards: bool,
    /// Whether to list the marked parameters of a vertex (default: true)
    pub show_marking: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "box",
            initial_peripheries: 2,
            tau_edge_style: "dashed",
            edge_style: "solid",
            show_guards: true,
            show_marking: true,
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn control_flow_graph_to_dot(graph: &ControlFlowGraph) -> Result<String, std::fmt::Error> {
    control_flow_graph_to_dot_with_config(graph, &DotConfig::default())
}

pub fn control_flow_graph_to_dot_with_config(
    graph: &ControlFlowGraph,
    config: &DotConfig,
) -> Result<String, std::fmt::Error> {
    let mut dot = String::new();
    writeln!(dot, "digraph {{")?;
    writeln!(dot, "node [shape={}];", config.node_shape)?;

    for (id, vertex) in graph.vertices().iter().enumerate() {
        let mut label = escape(&vertex.x.to_string());
        if config.show_guards {
            for guard in &vertex.guards {
                write!(label, "\\l  {}", escape(&guard.to_string()))?;
            }
        }
        if config.show_marking && !vertex.marking.is_empty() {
            let names: Vec<&str> = vertex.marking.iter().map(|d| d.name.as_str()).collect();
            write!(label, "\\lmarked: {}", names.join(", "))?;
        }
        if id == graph.initial_vertex() {
            writeln!(
                dot,
                "{} [label=\"{}\\l\", peripheries={}];",
                id, label, config.initial_peripheries
            )?;
        } else {
            writeln!(dot, "{} [label=\"{}\\l\"];", id, label)?;
        }
    }

    for edge in graph.edges() {
        writeln!(
            dot,
            "{} -> {} [label=\"{}\", style={}];",
            edge.source,
            edge.target,
            escape(&edge.label.to_string()),
            config.edge_style
        )?;
    }

    writeln!(dot, "}}")?;
    Ok(dot)
}

pub fn lts_to_dot<L: LabelledTransitions + ?Sized>(lts: &L) -> Result<String, std::fmt::Error> {
    lts_to_dot_with_config(lts, &DotConfig::default())
}

pub fn lts_to_dot_with_config<L: LabelledTransitions + ?Sized>(
    lts: &L,
    config: &DotConfig,
) -> Result<String, std::fmt::Error> {
    let mut dot = String::new();
    writeln!(dot, "digraph {{")?;
    writeln!(dot, "node [shape={}];", config.node_shape)?;
    for s in 0..lts.num_states() {
        if s == lts.initial_state() {
            writeln!(dot, "{} [peripheries={}];", s, config.initial_peripheries)?;
        } else {
            writeln!(dot, "{};", s)?;
        }
    }
    for t in lts.transitions() {
        let style = if lts.is_tau(t.label) {
            config.tau_edge_style
        } else {
            config.edge_style
        };
        writeln!(
            dot,
            "{} -> {} [label=\"{}\", style={}];",
            t.from,
            t.to,
            escape(lts.label_name(t.label)),
            style
        )?;
    }
    writeln!(dot, "}}")?;
    Ok(dot)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::control_flow::{ControlFlowAlgorithm, ControlFlowOptions};
    use crate::data::{DataExpr, Sort, Variable};
    use crate::lts::Lts;
    use crate::pbes::{FixpointSymbol, Pbes, PbesEquation, PbesExpr, PropVarInst, PropositionalVariable};

    #[test]
    fn test_lts_to_dot() {
        let lts = Lts::from_transitions(2, 1, [(0, "a", 1), (1, "tau", 0)]).unwrap();
        let dot = lts_to_dot(&lts).unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("1 [peripheries=2];"));
        assert!(dot.contains("1 -> 0 [label=\"tau\", style=dashed];"));
        assert!(dot.contains("0 -> 1 [label=\"a\", style=solid];"));
    }

    #[test]
    fn test_control_flow_graph_to_dot() {
        // nu X(s: Nat) = (val(s == 0) => X(1)) && (val(s == 1) => X(0))
        let s = Variable::new("s", Sort::Nat);
        let formula = PbesExpr::and(
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(DataExpr::from(&s), DataExpr::int(0))),
                PbesExpr::propvar("X", vec![DataExpr::int(1)]),
            ),
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(DataExpr::from(&s), DataExpr::int(1))),
                PbesExpr::propvar("X", vec![DataExpr::int(0)]),
            ),
        );
        let eqn = PbesEquation::new(FixpointSymbol::Nu, PropositionalVariable::new("X", vec![s]), formula);
        let p = Pbes::new(vec![eqn], PropVarInst::new("X", vec![DataExpr::int(0)]));
        let analysis = ControlFlowAlgorithm::new(ControlFlowOptions::default()).run(&p).unwrap();

        let dot = control_flow_graph_to_dot(&analysis.graph).unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("peripheries=2"));
        assert_eq!(dot.matches(" -> ").count(), analysis.graph.num_edges());

        let config = DotConfig {
            show_guards: false,
            ..DotConfig::default()
        };
        let plain = control_flow_graph_to_dot_with_config(&analysis.graph, &config).unwrap();
        assert!(plain.len() <= dot.len());
    }
}
