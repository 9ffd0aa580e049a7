//! Influence graph between parameters of different equations.
//!
//! There is an edge `(X, d_m) -> (Y, d_p)` whenever `d_m` occurs in the `p`-th
//! actual parameter of a target `Y(..)` of an implication of `X`. The graph is
//! only used for diagnostics; the later passes recompute what they need.

use std::fmt::{Display, Formatter};

use log::debug;

use crate::data::Variable;
use crate::error::Result;
use crate::pfnf::PfnfPbes;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InfluenceVertex {
    pub equation: String,
    pub parameter: Variable,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InfluenceEdge {
    pub implication: usize,
    pub target: usize,
    pub source_vertex: usize,
    pub target_vertex: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InfluenceGraph {
    vertices: Vec<InfluenceVertex>,
    edges: Vec<InfluenceEdge>,
}

impl InfluenceGraph {
    pub fn build(p: &PfnfPbes) -> Result<Self> {
        // Vertex ids of equation k are offsets[k] .. offsets[k] + arity.
        let mut offsets = Vec::with_capacity(p.equations.len());
        let mut vertices = Vec::new();
        for eqn in &p.equations {
            offsets.push(vertices.len());
            for d in eqn.parameters() {
                vertices.push(InfluenceVertex {
                    equation: eqn.name().to_string(),
                    parameter: d.clone(),
                });
            }
        }

        let mut edges = Vec::new();
        for (k, eqn) in p.equations.iter().enumerate() {
            for (i, imp) in eqn.implications.iter().enumerate() {
                for (j, x) in imp.variables.iter().enumerate() {
                    let y = p.index_of(&x.name)?;
                    for (pos, e) in x.parameters.iter().enumerate() {
                        for v in e.free_variables() {
                            if let Some(m) = eqn.parameter_index(&v) {
                                edges.push(InfluenceEdge {
                                    implication: i,
                                    target: j,
                                    source_vertex: offsets[k] + m,
                                    target_vertex: offsets[y] + pos,
                                });
                            }
                        }
                    }
                }
            }
        }

        debug!("influence graph: {} vertices, {} edges", vertices.len(), edges.len());
        Ok(Self { vertices, edges })
    }

    pub fn vertices(&self) -> &[InfluenceVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[InfluenceEdge] {
        &self.edges
    }

    pub fn successors(&self, vertex: usize) -> impl Iterator<Item = &InfluenceVertex> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.source_vertex == vertex)
            .map(|e| &self.vertices[e.target_vertex])
    }
}

impl Display for InfluenceGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for e in &self.edges {
            let u = &self.vertices[e.source_vertex];
            let v = &self.vertices[e.target_vertex];
            writeln!(
                f,
                "({}, {}) -> ({}, {}) [i = {}, j = {}]",
                u.equation, u.parameter, v.equation, v.parameter, e.implication, e.target
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::data::{DataExpr, Sort};
    use crate::pbes::{FixpointSymbol, Pbes, PbesEquation, PbesExpr, PropVarInst, PropositionalVariable};

    #[test]
    fn test_influence_edges() {
        let a = Variable::new("a", Sort::Nat);
        let b = Variable::new("b", Sort::Nat);
        let c = Variable::new("c", Sort::Bool);
        // X(a, b) = Y(a + b) || X(b, 0);  Y(c) = Y(c)
        let x = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("X", vec![a.clone(), b.clone()]),
            PbesExpr::or(
                PbesExpr::propvar("Y", vec![DataExpr::add(DataExpr::from(&a), DataExpr::from(&b))]),
                PbesExpr::propvar("X", vec![DataExpr::from(&b), DataExpr::int(0)]),
            ),
        );
        let y = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("Y", vec![c.clone()]),
            PbesExpr::propvar("Y", vec![DataExpr::from(&c)]),
        );
        let p = Pbes::new(vec![x, y], PropVarInst::new("X", vec![DataExpr::int(0), DataExpr::int(0)]));
        let g = InfluenceGraph::build(&PfnfPbes::new(&p).unwrap()).unwrap();

        assert_eq!(g.vertices().len(), 3);
        // a -> Y.c, b -> Y.c, b -> X.a, c -> Y.c
        assert_eq!(g.edges().len(), 4);
        let from_b: Vec<_> = g.successors(1).map(|v| (v.equation.as_str(), v.parameter.name.as_str())).collect();
        assert_eq!(from_b, vec![("Y", "c"), ("X", "a")]);
        assert!(g.to_string().contains("(X, a) -> (Y, c) [i = 0, j = 0]"));
    }
}
