//! Resetting unmarked data parameters.
//!
//! Every instantiation `X(e)` of the original system is replaced by a
//! disjunction over the control flow vertices `w` of `X`:
//!
//! ```text
//! (val(e_k == w_k) && ... && X(e')) || ...
//! ```
//!
//! where the `e_k` range over the control flow positions, and `e'` keeps the
//! control flow values of `w`, keeps the marked data parameters of `w` and
//! sets all other data parameters to the representative of their sort.

use log::{debug, info};

use crate::control_flow_graph::ControlFlowGraph;
use crate::control_flow_parameters::ControlFlowParameters;
use crate::data::DataExpr;
use crate::error::{Error, Result};
use crate::pbes::{Pbes, PbesEquation, PbesExpr, PropVarInst};
use crate::pfnf::PfnfPbes;
use crate::rewriter::{PbesRewriter, Rewriter};

pub struct VariableResetRewriter<'a> {
    pfnf: &'a PfnfPbes,
    parameters: &'a ControlFlowParameters,
    graph: &'a ControlFlowGraph,
}

impl<'a> VariableResetRewriter<'a> {
    /// The graph must have its marking computed.
    pub fn new(pfnf: &'a PfnfPbes, parameters: &'a ControlFlowParameters, graph: &'a ControlFlowGraph) -> Self {
        Self {
            pfnf,
            parameters,
            graph,
        }
    }

    /// The replacement of a single instantiation. Instantiations without a
    /// control flow vertex are returned unchanged.
    pub fn rewrite_instantiation(&self, x: &PropVarInst) -> Result<PbesExpr> {
        let vertices = self.graph.vertices_named(&x.name);
        if vertices.is_empty() {
            return Ok(PbesExpr::PropVar(x.clone()));
        }

        let eqn = self.pfnf.find(&x.name)?;
        let flags = self
            .parameters
            .flags(&x.name)
            .ok_or_else(|| Error::UnknownEquation { name: x.name.clone() })?;
        if x.parameters.len() != flags.len() {
            return Err(Error::ArityMismatch {
                name: x.name.clone(),
                expected: flags.len(),
                found: x.parameters.len(),
            });
        }

        let mut alternatives = Vec::with_capacity(vertices.len());
        for &w in vertices {
            let w = self.graph.vertex(w);
            assert_eq!(
                w.marked_parameters.len(),
                flags.len(),
                "marking of {} has not been computed",
                w.x
            );

            let mut conjuncts = Vec::new();
            let mut values = w.x.parameters.iter();
            let mut replacement = Vec::with_capacity(flags.len());
            for (i, (e, d)) in x.parameters.iter().zip(eqn.parameters()).enumerate() {
                if flags[i] {
                    let value = values.next().expect("projected vertex has too few parameters");
                    conjuncts.push(PbesExpr::val(DataExpr::eq(e.clone(), value.clone())));
                    replacement.push(value.clone());
                } else if w.marked_parameters[i] {
                    replacement.push(e.clone());
                } else {
                    replacement.push(d.sort.representative());
                }
            }
            conjuncts.push(PbesExpr::PropVar(PropVarInst::new(x.name.clone(), replacement)));
            alternatives.push(PbesExpr::join_and(conjuncts));
        }
        Ok(PbesExpr::join_or(alternatives))
    }

    /// Rewrites every instantiation in the right-hand sides of `p`. The initial
    /// state is kept as it is.
    pub fn apply(&self, p: &Pbes) -> Result<Pbes> {
        let mut equations = Vec::with_capacity(p.equations.len());
        for eqn in &p.equations {
            let mut error = None;
            let formula = eqn.formula.replace_instantiations(|x| match self.rewrite_instantiation(x) {
                Ok(result) => result,
                Err(e) => {
                    error.get_or_insert(e);
                    PbesExpr::PropVar(x.clone())
                }
            });
            if let Some(e) = error {
                return Err(e);
            }
            debug!("reset {}: {}", eqn.name(), formula);
            equations.push(PbesEquation::new(eqn.symbol, eqn.variable.clone(), formula));
        }
        info!("reset variables in {} equations", equations.len());
        Ok(Pbes::new(equations, p.initial_state.clone()))
    }

    /// [`apply`][Self::apply] followed by simplification of every equation.
    pub fn apply_and_simplify<R: Rewriter>(&self, p: &Pbes, rewriter: &PbesRewriter<R>) -> Result<Pbes> {
        let mut result = self.apply(p)?;
        for eqn in &mut result.equations {
            eqn.formula = rewriter.simplify(&eqn.formula);
        }
        Ok(result)
    }
}
