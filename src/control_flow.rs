//! The control flow analysis pipeline.
//!
//! ```text
//! Pbes -> PFNF -> influence graph -> source/destination -> control flow parameters
//!      -> control flow graph -> marking -> reset of unmarked parameters
//! ```
//!
//! # Examples
//!
//! ```
//! use pbes_bisim::control_flow::{ControlFlowAlgorithm, ControlFlowOptions};
//! use pbes_bisim::data::{DataExpr, Sort, Variable};
//! use pbes_bisim::pbes::*;
//!
//! // nu X(n: Nat) = val(n == 0) || X(n + 1)
//! let n = Variable::new("n", Sort::Nat);
//! let formula = PbesExpr::or(
//!     PbesExpr::val(DataExpr::eq(DataExpr::from(&n), DataExpr::int(0))),
//!     PbesExpr::propvar("X", vec![DataExpr::add(DataExpr::from(&n), DataExpr::int(1))]),
//! );
//! let eqn = PbesEquation::new(FixpointSymbol::Nu, PropositionalVariable::new("X", vec![n]), formula);
//! let p = Pbes::new(vec![eqn], PropVarInst::new("X", vec![DataExpr::int(0)]));
//!
//! let algorithm = ControlFlowAlgorithm::new(ControlFlowOptions::default());
//! let analysis = algorithm.run(&p).unwrap();
//! assert_eq!(analysis.parameters.count(), 0);
//! assert_eq!(analysis.graph.num_vertices(), 1);
//! ```

use log::{debug, info};

use crate::control_flow_graph::ControlFlowGraph;
use crate::control_flow_parameters::ControlFlowParameters;
use crate::error::Result;
use crate::influence::InfluenceGraph;
use crate::marking::compute_marking;
use crate::pbes::Pbes;
use crate::pfnf::PfnfPbes;
use crate::reset::VariableResetRewriter;
use crate::rewriter::{PbesRewriter, Rewriter, SimplifyingRewriter};
use crate::source_destination::{SourceDestination, SourceDestinationAnalyzer};

/// Options for [`ControlFlowAlgorithm`].
#[derive(Debug, Clone)]
pub struct ControlFlowOptions {
    /// Simplify the PFNF guards before the analysis, and the result of the reset.
    pub simplify: bool,
    /// Upper bound on the iterations of each fixpoint computation.
    pub max_iterations: Option<usize>,
}

impl Default for ControlFlowOptions {
    fn default() -> Self {
        Self {
            simplify: true,
            max_iterations: None,
        }
    }
}

/// Everything computed by [`ControlFlowAlgorithm::run`].
#[derive(Debug, Clone)]
pub struct ControlFlowAnalysis {
    /// The PFNF system, with sources substituted into the targets.
    pub pfnf: PfnfPbes,
    pub influence: InfluenceGraph,
    pub source_destination: SourceDestination,
    pub parameters: ControlFlowParameters,
    /// The control flow graph, with marking.
    pub graph: ControlFlowGraph,
}

pub struct ControlFlowAlgorithm<R = SimplifyingRewriter> {
    options: ControlFlowOptions,
    rewriter: PbesRewriter<R>,
}

impl ControlFlowAlgorithm<SimplifyingRewriter> {
    pub fn new(options: ControlFlowOptions) -> Self {
        Self::with_rewriter(options, SimplifyingRewriter::new())
    }
}

impl<R: Rewriter> ControlFlowAlgorithm<R> {
    pub fn with_rewriter(options: ControlFlowOptions, rewriter: R) -> Self {
        Self {
            options,
            rewriter: PbesRewriter::new(rewriter),
        }
    }

    pub fn options(&self) -> &ControlFlowOptions {
        &self.options
    }

    pub fn run(&self, p: &Pbes) -> Result<ControlFlowAnalysis> {
        let mut pfnf = PfnfPbes::new(p)?;
        if self.options.simplify {
            pfnf.simplify(&self.rewriter);
        }

        let influence = InfluenceGraph::build(&pfnf)?;
        debug!("--- influence graph ---\n{}", influence);

        let source_destination = SourceDestinationAnalyzer::new(self.rewriter.data_rewriter()).run(&mut pfnf, true);
        debug!("--- source/destination ---\n{}", source_destination.print(&pfnf));

        let max_iterations = self.options.max_iterations;
        let parameters = ControlFlowParameters::compute(&pfnf, max_iterations)?;
        debug!("{}", parameters);

        let mut graph = ControlFlowGraph::build(&pfnf, &parameters, &self.rewriter, max_iterations)?;
        compute_marking(&mut graph, &pfnf, max_iterations)?;
        debug!("{}", graph);

        info!(
            "control flow analysis: {} equations, {} control flow parameters, {} vertices, {} edges",
            pfnf.equations.len(),
            parameters.count(),
            graph.num_vertices(),
            graph.num_edges()
        );

        Ok(ControlFlowAnalysis {
            pfnf,
            influence,
            source_destination,
            parameters,
            graph,
        })
    }

    /// Runs the analysis and resets the unmarked data parameters of `p`.
    pub fn reset_variables(&self, p: &Pbes) -> Result<Pbes> {
        let analysis = self.run(p)?;
        self.reset_with(p, &analysis)
    }

    /// Resets the unmarked data parameters of `p` using a previous analysis of `p`.
    pub fn reset_with(&self, p: &Pbes, analysis: &ControlFlowAnalysis) -> Result<Pbes> {
        let reset = VariableResetRewriter::new(&analysis.pfnf, &analysis.parameters, &analysis.graph);
        if self.options.simplify {
            reset.apply_and_simplify(p, &self.rewriter)
        } else {
            reset.apply(p)
        }
    }
}
