//! Marking of data parameters on the control flow graph.
//!
//! A data parameter is marked at a vertex if its value may still be read: it
//! occurs in a guard of the vertex, or it flows (through an edge label) into a
//! parameter that is marked at a successor. The marking is computed backwards
//! with a work list and only ever grows.

use std::collections::{BTreeSet, VecDeque};

use log::{debug, info};

use crate::control_flow_graph::{ControlFlowGraph, VertexId};
use crate::data::Variable;
use crate::error::{Error, Result};
use crate::pfnf::PfnfPbes;

/// Computes `marking` and `marked_parameters` for every vertex of `graph`.
pub fn compute_marking(graph: &mut ControlFlowGraph, p: &PfnfPbes, max_iterations: Option<usize>) -> Result<()> {
    // Parameters per vertex, looked up once.
    let mut parameters: Vec<Vec<Variable>> = Vec::with_capacity(graph.num_vertices());
    for v in graph.vertices() {
        parameters.push(p.find(v.name())?.parameters().to_vec());
    }

    for (id, params) in parameters.iter().enumerate() {
        let vertex = graph.vertex_mut(id);
        let free: BTreeSet<Variable> = vertex.guards.iter().flat_map(|g| g.free_variables()).collect();
        vertex.marking = params.iter().filter(|d| free.contains(*d)).cloned().collect();
        if !vertex.marking.is_empty() {
            debug!("initial marking of {}: {:?}", vertex.x, names(&vertex.marking));
        }
    }

    let mut todo: VecDeque<VertexId> = (0..graph.num_vertices()).collect();
    let mut queued = vec![true; graph.num_vertices()];
    let mut iterations = 0;

    while let Some(v) = todo.pop_front() {
        queued[v] = false;
        iterations += 1;
        if let Some(limit) = max_iterations {
            if iterations > limit {
                return Err(Error::IterationLimit { pass: "marking", limit });
            }
        }

        let marked: Vec<usize> = parameters[v]
            .iter()
            .enumerate()
            .filter(|(_, d)| graph.vertex(v).marking.contains(*d))
            .map(|(m, _)| m)
            .collect();
        if marked.is_empty() {
            continue;
        }

        let incoming: Vec<_> = graph.vertex(v).incoming.iter().copied().collect();
        for e in incoming {
            let edge = graph.edge(e);
            let u = edge.source;
            let mut read = BTreeSet::new();
            for &m in &marked {
                read.extend(edge.label.parameters[m].free_variables());
            }
            let added: Vec<Variable> = parameters[u]
                .iter()
                .filter(|d| read.contains(*d))
                .cloned()
                .collect();

            let vertex = graph.vertex_mut(u);
            let before = vertex.marking.len();
            vertex.marking.extend(added);
            if vertex.marking.len() > before {
                debug!("marking of {} grew to {:?}", vertex.x, names(&vertex.marking));
                if !queued[u] {
                    queued[u] = true;
                    todo.push_back(u);
                }
            }
        }
    }

    for (id, params) in parameters.iter().enumerate() {
        let vertex = graph.vertex_mut(id);
        vertex.marked_parameters = params.iter().map(|d| vertex.marking.contains(d)).collect();
    }

    info!(
        "marking converged after {} iterations, {} marked parameters",
        iterations,
        graph.vertices().iter().map(|v| v.marking.len()).sum::<usize>()
    );
    Ok(())
}

fn names(vars: &BTreeSet<Variable>) -> Vec<&str> {
    vars.iter().map(|d| d.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::control_flow_parameters::ControlFlowParameters;
    use crate::data::{DataExpr, Sort};
    use crate::pbes::{FixpointSymbol, Pbes, PbesEquation, PbesExpr, PropVarInst, PropositionalVariable};
    use crate::rewriter::{PbesRewriter, SimplifyingRewriter};
    use crate::source_destination::SourceDestinationAnalyzer;

    fn var(name: &str) -> Variable {
        Variable::new(name, Sort::Nat)
    }

    // X(s, a, b) = (val(s == 0) => X(1, a, b + 1))
    //           && (val(s == 1) => X(2, b, a))
    //           && (val(s == 2 && a > 0) => X(0, a, 0))
    fn graph() -> (PfnfPbes, ControlFlowGraph) {
        let (s, a, b) = (var("s"), var("a"), var("b"));
        let v = |x: &Variable| DataExpr::from(x);
        let formula = PbesExpr::join_and(vec![
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(v(&s), DataExpr::int(0))),
                PbesExpr::propvar("X", vec![DataExpr::int(1), v(&a), DataExpr::add(v(&b), DataExpr::int(1))]),
            ),
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(v(&s), DataExpr::int(1))),
                PbesExpr::propvar("X", vec![DataExpr::int(2), v(&b), v(&a)]),
            ),
            PbesExpr::imp(
                PbesExpr::val(DataExpr::and(
                    DataExpr::eq(v(&s), DataExpr::int(2)),
                    DataExpr::gt(v(&a), DataExpr::int(0)),
                )),
                PbesExpr::propvar("X", vec![DataExpr::int(0), v(&a), DataExpr::int(0)]),
            ),
        ]);
        let eqn = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("X", vec![s, a, b]),
            formula,
        );
        let p = Pbes::new(
            vec![eqn],
            PropVarInst::new("X", vec![DataExpr::int(0), DataExpr::int(0), DataExpr::int(0)]),
        );
        let mut p = PfnfPbes::new(&p).unwrap();
        let r = PbesRewriter::<SimplifyingRewriter>::default();
        SourceDestinationAnalyzer::new(r.data_rewriter()).run(&mut p, true);
        let cf = ControlFlowParameters::compute(&p, None).unwrap();
        let g = ControlFlowGraph::build(&p, &cf, &r, None).unwrap();
        (p, g)
    }

    #[test]
    fn test_marking_flows_backwards() {
        let (p, mut g) = graph();
        compute_marking(&mut g, &p, None).unwrap();

        let at = |s: i64| g.find(&PropVarInst::new("X", vec![DataExpr::int(s)])).unwrap();
        let marking = |s: i64| names(&g.vertex(at(s)).marking).join(",");
        // X(2) reads a; X(1) passes b into a; X(0) passes b + 1 into b
        assert_eq!(marking(2), "a");
        assert_eq!(marking(1), "b");
        assert_eq!(marking(0), "b");
        assert_eq!(g.vertex(at(1)).marked_parameters, vec![false, false, true]);
    }

    #[test]
    fn test_marking_excludes_control_flow_parameters() {
        let (p, mut g) = graph();
        compute_marking(&mut g, &p, None).unwrap();
        let s = var("s");
        assert!(g.vertices().iter().all(|v| !v.marking.contains(&s)));
    }
}
