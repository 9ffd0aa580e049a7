//! The control flow graph of a PFNF system.
//!
//! Vertices are instantiations projected onto the control flow parameters,
//! e.g. `X(1)` for `X(s, n)` with control flow parameter `s`. An edge `u -> v`
//! carries the full (unprojected) target instantiation it was created for.
//! The graph is explored breadth-first from the projected initial state.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::{Display, Formatter};

use log::{debug, info, trace};

use crate::control_flow_parameters::ControlFlowParameters;
use crate::data::{Substitution, Variable};
use crate::error::{Error, Result};
use crate::pbes::{PbesExpr, PropVarInst};
use crate::pfnf::PfnfPbes;
use crate::rewriter::{PbesRewriter, Rewriter};

pub type VertexId = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ControlFlowEdge {
    pub source: VertexId,
    pub target: VertexId,
    pub label: PropVarInst,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ControlFlowVertex {
    /// The projected instantiation.
    pub x: PropVarInst,
    pub incoming: BTreeSet<EdgeId>,
    pub outgoing: BTreeSet<EdgeId>,
    pub guards: BTreeSet<PbesExpr>,
    /// Data parameters that must be kept, filled in by the marking.
    pub marking: BTreeSet<Variable>,
    pub marked_parameters: Vec<bool>,
}

impl ControlFlowVertex {
    fn new(x: PropVarInst) -> Self {
        Self {
            x,
            incoming: BTreeSet::new(),
            outgoing: BTreeSet::new(),
            guards: BTreeSet::new(),
            marking: BTreeSet::new(),
            marked_parameters: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.x.name
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    vertices: Vec<ControlFlowVertex>,
    edges: Vec<ControlFlowEdge>,
    index: HashMap<PropVarInst, VertexId>,
    edge_index: HashSet<(VertexId, VertexId, PropVarInst)>,
    by_name: BTreeMap<String, Vec<VertexId>>,
    initial_vertex: VertexId,
}

impl ControlFlowGraph {
    /// Explores the graph from the initial state of `p`.
    ///
    /// The actual parameters of `p` must have the implication sources
    /// substituted, as for [`ControlFlowParameters::compute`].
    pub fn build<R: Rewriter>(
        p: &PfnfPbes,
        parameters: &ControlFlowParameters,
        rewriter: &PbesRewriter<R>,
        max_iterations: Option<usize>,
    ) -> Result<Self> {
        let mut graph = Self::default();
        let data = rewriter.data_rewriter();

        let init = p.initial_state.map_parameters(|e| data.simplify(e));
        let init = parameters.project(&init)?;
        debug!("initial vertex {} (from {})", init, p.initial_state);
        graph.initial_vertex = graph.insert_vertex(init);

        let mut todo: VecDeque<VertexId> = VecDeque::from([graph.initial_vertex]);
        let mut iterations = 0;
        while let Some(u) = todo.pop_front() {
            iterations += 1;
            if let Some(limit) = max_iterations {
                if iterations > limit {
                    return Err(Error::IterationLimit {
                        pass: "control flow graph",
                        limit,
                    });
                }
            }

            let ux = graph.vertices[u].x.clone();
            let eqn = p.find(&ux.name)?;
            let d = parameters.project_variables(&ux.name)?;
            let sigma = Substitution::from_pairs(&d, &ux.parameters);
            trace!("expanding {} with sigma = {}", ux, sigma);

            if eqn.implications.is_empty() {
                let guard = rewriter.rewrite(&eqn.h, &sigma);
                graph.vertices[u].guards.insert(guard);
            }

            for imp in &eqn.implications {
                let guard = rewriter.rewrite(&PbesExpr::and(eqn.h.clone(), imp.guard.clone()), &sigma);
                if guard.is_false() {
                    trace!("skipping implication with guard {} at {}", imp.guard, ux);
                    continue;
                }
                graph.vertices[u].guards.insert(guard);

                for x in &imp.variables {
                    let label = x.map_parameters(|e| data.rewrite(e, &sigma));
                    let y = parameters.project(&label)?;
                    let v = match graph.index.get(&y) {
                        Some(&v) => v,
                        None => {
                            debug!("discovered {}", y);
                            let v = graph.insert_vertex(y);
                            todo.push_back(v);
                            v
                        }
                    };
                    graph.insert_edge(u, v, label);
                }
            }
        }

        for (id, vertex) in graph.vertices.iter().enumerate() {
            graph.by_name.entry(vertex.x.name.clone()).or_default().push(id);
        }
        info!(
            "control flow graph: {} vertices, {} edges",
            graph.vertices.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    fn insert_vertex(&mut self, x: PropVarInst) -> VertexId {
        assert!(!self.index.contains_key(&x), "vertex {} already exists", x);
        let id = self.vertices.len();
        self.index.insert(x.clone(), id);
        self.vertices.push(ControlFlowVertex::new(x));
        id
    }

    fn insert_edge(&mut self, source: VertexId, target: VertexId, label: PropVarInst) {
        if !self.edge_index.insert((source, target, label.clone())) {
            return;
        }
        let id = self.edges.len();
        trace!(
            "insert edge {} -> {} label {}",
            self.vertices[source].x,
            self.vertices[target].x,
            label
        );
        self.edges.push(ControlFlowEdge { source, target, label });
        self.vertices[source].outgoing.insert(id);
        self.vertices[target].incoming.insert(id);
    }

    pub fn vertices(&self) -> &[ControlFlowVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[ControlFlowEdge] {
        &self.edges
    }

    pub fn vertex(&self, id: VertexId) -> &ControlFlowVertex {
        &self.vertices[id]
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> &mut ControlFlowVertex {
        &mut self.vertices[id]
    }

    pub fn edge(&self, id: EdgeId) -> &ControlFlowEdge {
        &self.edges[id]
    }

    pub fn initial_vertex(&self) -> VertexId {
        self.initial_vertex
    }

    /// The vertex with projected instantiation `x`, if any.
    pub fn find(&self, x: &PropVarInst) -> Option<VertexId> {
        self.index.get(x).copied()
    }

    /// All vertices whose instantiation has name `name`, in discovery order.
    pub fn vertices_named(&self, name: &str) -> &[VertexId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Checks that every vertex has as many actuals as its equation has control
    /// flow parameters and that every edge label has the full arity.
    pub fn check_projection(&self, p: &PfnfPbes, parameters: &ControlFlowParameters) -> bool {
        let vertices_ok = self.vertices.iter().all(|v| {
            parameters
                .flags(v.name())
                .is_some_and(|b| b.iter().filter(|&&b| b).count() == v.x.parameters.len())
        });
        let edges_ok = self.edges.iter().all(|e| {
            p.equation(&e.label.name)
                .is_some_and(|eqn| eqn.parameters().len() == e.label.parameters.len())
        });
        vertices_ok && edges_ok
    }
}

impl Display for ControlFlowGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- control flow graph ---")?;
        for v in &self.vertices {
            write!(f, "vertex {}", v.x)?;
            if !v.marking.is_empty() {
                let names: Vec<_> = v.marking.iter().map(|d| d.name.as_str()).collect();
                write!(f, " marking {{{}}}", names.join(", "))?;
            }
            writeln!(f)?;
            for g in &v.guards {
                writeln!(f, "  guard {}", g)?;
            }
            for &e in &v.outgoing {
                let e = &self.edges[e];
                writeln!(f, "  -> {} label {}", self.vertices[e.target].x, e.label)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::data::{DataExpr, Sort};
    use crate::pbes::{FixpointSymbol, Pbes, PbesEquation, PropositionalVariable};
    use crate::rewriter::SimplifyingRewriter;
    use crate::source_destination::SourceDestinationAnalyzer;

    // X(s, n) = (val(s == 0) => X(1, n + 1)) && (val(s == 1 && n > 3) => X(0, n)) && (val(s == 2) => X(0, 0))
    fn system() -> PfnfPbes {
        let s = Variable::new("s", Sort::Nat);
        let n = Variable::new("n", Sort::Nat);
        let vs = || DataExpr::from(&s);
        let vn = || DataExpr::from(&n);
        let formula = PbesExpr::join_and(vec![
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(vs(), DataExpr::int(0))),
                PbesExpr::propvar("X", vec![DataExpr::int(1), DataExpr::add(vn(), DataExpr::int(1))]),
            ),
            PbesExpr::imp(
                PbesExpr::val(DataExpr::and(
                    DataExpr::eq(vs(), DataExpr::int(1)),
                    DataExpr::gt(vn(), DataExpr::int(3)),
                )),
                PbesExpr::propvar("X", vec![DataExpr::int(0), vn()]),
            ),
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(vs(), DataExpr::int(2))),
                PbesExpr::propvar("X", vec![DataExpr::int(0), DataExpr::int(0)]),
            ),
        ]);
        let eqn = PbesEquation::new(FixpointSymbol::Nu, PropositionalVariable::new("X", vec![s, n]), formula);
        let p = Pbes::new(vec![eqn], PropVarInst::new("X", vec![DataExpr::int(0), DataExpr::int(0)]));
        PfnfPbes::new(&p).unwrap()
    }

    fn build(p: &mut PfnfPbes) -> (ControlFlowParameters, ControlFlowGraph) {
        let r = PbesRewriter::<SimplifyingRewriter>::default();
        SourceDestinationAnalyzer::new(r.data_rewriter()).run(p, true);
        let cf = ControlFlowParameters::compute(p, None).unwrap();
        let g = ControlFlowGraph::build(p, &cf, &r, None).unwrap();
        (cf, g)
    }

    #[test]
    fn test_reachable_vertices_only() {
        let mut p = system();
        let (cf, g) = build(&mut p);
        assert_eq!(cf.flags("X"), Some(&[true, false][..]));

        // X(2) is never reached from X(0)
        assert_eq!(g.num_vertices(), 2);
        let x0 = g.find(&PropVarInst::new("X", vec![DataExpr::int(0)])).unwrap();
        let x1 = g.find(&PropVarInst::new("X", vec![DataExpr::int(1)])).unwrap();
        assert_eq!(g.initial_vertex(), x0);
        assert_eq!(g.vertices_named("X"), &[x0, x1]);
        assert_eq!(g.num_edges(), 2);
        assert!(g.check_projection(&p, &cf));

        // only the implications whose guard is not false leave a guard behind
        assert_eq!(g.vertex(x0).guards.len(), 1);
        let n = Variable::new("n", Sort::Nat);
        let guard = PbesExpr::val(DataExpr::gt(DataExpr::from(&n), DataExpr::int(3)));
        assert_eq!(g.vertex(x1).guards.iter().collect::<Vec<_>>(), vec![&guard]);
    }

    #[test]
    fn test_edge_labels_are_unprojected() {
        let mut p = system();
        let (_, g) = build(&mut p);
        let x0 = g.initial_vertex();
        let out: Vec<_> = g.vertex(x0).outgoing.iter().map(|&e| g.edge(e)).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label.parameters.len(), 2);
        assert_eq!(out[0].label.parameters[0], DataExpr::int(1));
        assert!(g.to_string().contains("vertex X(0)"));
    }

    #[test]
    fn test_iteration_limit() {
        let mut p = system();
        let r = PbesRewriter::<SimplifyingRewriter>::default();
        SourceDestinationAnalyzer::new(r.data_rewriter()).run(&mut p, true);
        let cf = ControlFlowParameters::compute(&p, None).unwrap();
        let result = ControlFlowGraph::build(&p, &cf, &r, Some(1));
        assert!(matches!(result, Err(Error::IterationLimit { .. })));
    }
}
