//! Source and destination values of PFNF implications.
//!
//! For an implication `g_i => X_i1(e_i1) || ...` of `X(d)`, the *source* is
//! the set of constant values that the conjuncts of `h && g_i` force on the
//! parameters `d`, and the *destination* of a target `X_ij(e_ij)` is the value
//! of each actual parameter once the source is substituted, if it is constant.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use log::{debug, trace};

use crate::data::{BinaryOp, DataExpr, Substitution, Variable};
use crate::pbes::PbesExpr;
use crate::pfnf::{PfnfEquation, PfnfPbes};
use crate::rewriter::Rewriter;

/// A value that is either a known constant or could not be determined.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ControlValue {
    Constant(DataExpr),
    Unknown,
}

impl ControlValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ControlValue::Unknown)
    }

    pub fn as_constant(&self) -> Option<&DataExpr> {
        match self {
            ControlValue::Constant(e) => Some(e),
            ControlValue::Unknown => None,
        }
    }
}

impl Display for ControlValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlValue::Constant(e) => write!(f, "{}", e),
            ControlValue::Unknown => write!(f, "?"),
        }
    }
}

/// Constant bindings of the parameters of an equation, extracted from a guard.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Source {
    bindings: BTreeMap<Variable, DataExpr>,
}

impl Source {
    /// Binds `d` unless it is already bound. Returns true if the binding was added.
    pub fn bind(&mut self, d: Variable, value: DataExpr) -> bool {
        use std::collections::btree_map::Entry;
        match self.bindings.entry(d) {
            Entry::Vacant(e) => {
                e.insert(value);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn value(&self, d: &Variable) -> ControlValue {
        match self.bindings.get(d) {
            Some(e) => ControlValue::Constant(e.clone()),
            None => ControlValue::Unknown,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &DataExpr)> {
        self.bindings.iter()
    }

    pub fn as_substitution(&self) -> Substitution {
        self.bindings.iter().map(|(d, e)| (d.clone(), e.clone())).collect()
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_substitution())
    }
}

/// Values of the actual parameters of one target instantiation.
pub type Destination = Vec<ControlValue>;

/// Sources per `[equation][implication]` and destinations per
/// `[equation][implication][target]`, parallel to the PFNF system.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SourceDestination {
    pub sources: Vec<Vec<Source>>,
    pub destinations: Vec<Vec<Vec<Destination>>>,
}

impl SourceDestination {
    pub fn source(&self, equation: usize, implication: usize) -> &Source {
        &self.sources[equation][implication]
    }

    pub fn destination(&self, equation: usize, implication: usize, target: usize) -> &Destination {
        &self.destinations[equation][implication][target]
    }

    pub fn print(&self, p: &PfnfPbes) -> String {
        let mut out = String::new();
        for (k, eqn) in p.equations.iter().enumerate() {
            out.push_str(&format!("{}\n", eqn.variable));
            for (i, imp) in eqn.implications.iter().enumerate() {
                out.push_str(&format!("  source[{}] = {}\n", i, self.sources[k][i]));
                for (j, x) in imp.variables.iter().enumerate() {
                    let values: Vec<_> = self.destinations[k][i][j].iter().map(|v| v.to_string()).collect();
                    out.push_str(&format!("    dest {} = [{}]\n", x.name, values.join(", ")));
                }
            }
        }
        out
    }
}

pub struct SourceDestinationAnalyzer<'r, R> {
    rewriter: &'r R,
}

impl<'r, R: Rewriter> SourceDestinationAnalyzer<'r, R> {
    pub fn new(rewriter: &'r R) -> Self {
        Self { rewriter }
    }

    /// Runs the three steps in order. With `rewrite` set, the source values are
    /// substituted into the targets of `p` before destinations are computed.
    pub fn run(&self, p: &mut PfnfPbes, rewrite: bool) -> SourceDestination {
        let sources = self.compute_source(p);
        if rewrite {
            self.rewrite_propositional_variables(p, &sources);
        }
        let destinations = self.compute_destination(p, &sources);
        SourceDestination { sources, destinations }
    }

    /// Sources of every implication of every equation.
    pub fn compute_source(&self, p: &PfnfPbes) -> Vec<Vec<Source>> {
        p.equations
            .iter()
            .map(|eqn| {
                eqn.implications
                    .iter()
                    .map(|imp| self.source_of(eqn, &imp.guard))
                    .collect()
            })
            .collect()
    }

    /// Scans the conjuncts of `h && guard` for equalities `d == c` or `c == d`,
    /// with `d` a parameter and `c` closed. The first equality for `d` wins.
    pub fn source_of(&self, eqn: &PfnfEquation, guard: &PbesExpr) -> Source {
        let mut source = Source::default();
        let conjuncts = eqn.h.split_and().into_iter().chain(guard.split_and());
        for c in conjuncts {
            let PbesExpr::Data(d) = c else {
                continue;
            };
            for e in d.conjuncts() {
                let DataExpr::Binary(BinaryOp::Eq, lhs, rhs) = e else {
                    continue;
                };
                let binding = match (lhs.as_variable(), rhs.as_variable()) {
                    (Some(v), _) if rhs.is_constant() && eqn.parameter_index(v).is_some() => Some((v, rhs)),
                    (_, Some(v)) if lhs.is_constant() && eqn.parameter_index(v).is_some() => Some((v, lhs)),
                    _ => None,
                };
                if let Some((v, value)) = binding {
                    let value = self.rewriter.simplify(value);
                    if source.bind(v.clone(), value) {
                        trace!("source of {}: {} bound by {}", eqn.name(), v, e);
                    }
                }
            }
        }
        source
    }

    /// Applies each implication's source to the actual parameters of its targets.
    pub fn rewrite_propositional_variables(&self, p: &mut PfnfPbes, sources: &[Vec<Source>]) {
        for (eqn, sources) in p.equations.iter_mut().zip(sources) {
            for (imp, source) in eqn.implications.iter_mut().zip(sources) {
                let sigma = source.as_substitution();
                for x in &mut imp.variables {
                    *x = x.map_parameters(|e| self.rewriter.rewrite(e, &sigma));
                }
            }
        }
        debug!("substituted sources into the predicate variable instantiations");
    }

    /// Destinations of every target of every implication.
    pub fn compute_destination(&self, p: &PfnfPbes, sources: &[Vec<Source>]) -> Vec<Vec<Vec<Destination>>> {
        p.equations
            .iter()
            .zip(sources)
            .map(|(eqn, sources)| {
                eqn.implications
                    .iter()
                    .zip(sources)
                    .map(|(imp, source)| {
                        let sigma = source.as_substitution();
                        imp.variables
                            .iter()
                            .map(|x| {
                                x.parameters
                                    .iter()
                                    .map(|e| {
                                        let value = self.rewriter.rewrite(e, &sigma);
                                        if value.is_constant() {
                                            ControlValue::Constant(value)
                                        } else {
                                            ControlValue::Unknown
                                        }
                                    })
                                    .collect()
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::data::Sort;
    use crate::pbes::{FixpointSymbol, Pbes, PbesEquation, PropVarInst, PropositionalVariable};
    use crate::rewriter::SimplifyingRewriter;

    fn s() -> Variable {
        Variable::new("s", Sort::Nat)
    }

    fn n() -> Variable {
        Variable::new("n", Sort::Nat)
    }

    fn val_eq(lhs: DataExpr, rhs: DataExpr) -> PbesExpr {
        PbesExpr::val(DataExpr::eq(lhs, rhs))
    }

    // X(s, n) = (s == 1 && 2 == s && n == m => X(s + 1, n)) && (val(n < 3) => X(0, n + 1))
    fn system() -> PfnfPbes {
        let m = Variable::new("m", Sort::Nat);
        let g1 = PbesExpr::join_and(vec![
            val_eq(DataExpr::from(s()), DataExpr::int(1)),
            val_eq(DataExpr::int(2), DataExpr::from(s())),
            val_eq(DataExpr::from(n()), DataExpr::from(m)),
        ]);
        let g2 = PbesExpr::val(DataExpr::lt(DataExpr::from(n()), DataExpr::int(3)));
        let formula = PbesExpr::and(
            PbesExpr::imp(
                g1,
                PbesExpr::propvar("X", vec![DataExpr::add(DataExpr::from(s()), DataExpr::int(1)), DataExpr::from(n())]),
            ),
            PbesExpr::imp(
                g2,
                PbesExpr::propvar("X", vec![DataExpr::int(0), DataExpr::add(DataExpr::from(n()), DataExpr::int(1))]),
            ),
        );
        let eqn = PbesEquation::new(FixpointSymbol::Mu, PropositionalVariable::new("X", vec![s(), n()]), formula);
        let p = Pbes::new(vec![eqn], PropVarInst::new("X", vec![DataExpr::int(1), DataExpr::int(0)]));
        PfnfPbes::new(&p).unwrap()
    }

    #[test]
    fn test_source_first_wins() {
        let p = system();
        let r = SimplifyingRewriter::new();
        let sources = SourceDestinationAnalyzer::new(&r).compute_source(&p);
        assert_eq!(sources[0][0].value(&s()), ControlValue::Constant(DataExpr::int(1)));
        // `n == m` does not bind, m is not closed
        assert_eq!(sources[0][0].value(&n()), ControlValue::Unknown);
        assert!(sources[0][1].is_empty());
    }

    #[test]
    fn test_destination() {
        let mut p = system();
        let r = SimplifyingRewriter::new();
        let sd = SourceDestinationAnalyzer::new(&r).run(&mut p, true);
        assert_eq!(
            sd.destination(0, 0, 0),
            &vec![ControlValue::Constant(DataExpr::int(2)), ControlValue::Unknown]
        );
        assert_eq!(
            sd.destination(0, 1, 0),
            &vec![ControlValue::Constant(DataExpr::int(0)), ControlValue::Unknown]
        );
        // the source was substituted in place
        assert_eq!(
            p.equations[0].implications[0].variables[0].parameters[0],
            DataExpr::int(2)
        );
        assert!(sd.print(&p).contains("dest X = [2, ?]"));
    }
}
