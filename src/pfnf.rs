//! Parameterised fixpoint normal form.
//!
//! An equation is in PFNF when its right-hand side has the shape
//!
//! ```text
//! Q_1 ... Q_n. h && (g_1 => X_11(e) || ... ) && ... && (g_m => X_m1(e) || ...)
//! ```
//!
//! where `h` and every `g_i` are simple (contain no predicate variables). This
//! module splits such right-hand sides into their parts. Besides literal
//! implications, a conjunct that is a disjunction of simple formulas and
//! instantiations (`b || X(e)`) and a bare instantiation `X(e)` are accepted,
//! and read as `!b => X(e)` and `true => X(e)` respectively.

use std::fmt::{Display, Formatter};

use log::debug;

use crate::data::Variable;
use crate::error::{Error, Result};
use crate::pbes::{FixpointSymbol, Pbes, PbesEquation, PbesExpr, PropVarInst, PropositionalVariable};
use crate::rewriter::{PbesRewriter, Rewriter};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Quantifier {
    Forall(Vec<Variable>),
    Exists(Vec<Variable>),
}

impl Quantifier {
    pub fn variables(&self) -> &[Variable] {
        match self {
            Quantifier::Forall(vars) | Quantifier::Exists(vars) => vars,
        }
    }

    /// Wraps `body` in this quantifier.
    pub fn apply(&self, body: PbesExpr) -> PbesExpr {
        match self {
            Quantifier::Forall(vars) => PbesExpr::forall(vars.clone(), body),
            Quantifier::Exists(vars) => PbesExpr::exists(vars.clone(), body),
        }
    }
}

/// An implication `g => X_1(e_1) || ... || X_k(e_k)`, with `k >= 1`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PfnfImplication {
    pub guard: PbesExpr,
    pub variables: Vec<PropVarInst>,
}

impl PfnfImplication {
    pub fn new(guard: PbesExpr, variables: Vec<PropVarInst>) -> Self {
        assert!(!variables.is_empty(), "implication without targets");
        Self { guard, variables }
    }

    /// The implication as an ordinary formula.
    pub fn formula(&self) -> PbesExpr {
        let targets = self.variables.iter().cloned().map(PbesExpr::PropVar);
        PbesExpr::imp(self.guard.clone(), PbesExpr::join_or(targets))
    }
}

impl Display for PfnfImplication {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.formula())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PfnfEquation {
    pub symbol: FixpointSymbol,
    pub variable: PropositionalVariable,
    pub quantifiers: Vec<Quantifier>,
    pub h: PbesExpr,
    pub implications: Vec<PfnfImplication>,
}

impl PfnfEquation {
    pub fn from_equation(eqn: &PbesEquation) -> Result<Self> {
        let (quantifiers, h, implications) = split_pfnf(&eqn.formula).map_err(|reason| Error::NotPfnf {
            equation: eqn.name().to_string(),
            reason,
        })?;
        Ok(Self {
            symbol: eqn.symbol,
            variable: eqn.variable.clone(),
            quantifiers,
            h,
            implications,
        })
    }

    pub fn name(&self) -> &str {
        &self.variable.name
    }

    pub fn parameters(&self) -> &[Variable] {
        &self.variable.parameters
    }

    /// Position of `v` among the formal parameters.
    pub fn parameter_index(&self, v: &Variable) -> Option<usize> {
        self.variable.parameters.iter().position(|d| d == v)
    }

    /// Reassembles the right-hand side. A trivial `h` is left out.
    pub fn formula(&self) -> PbesExpr {
        let mut conjuncts = Vec::with_capacity(self.implications.len() + 1);
        if !self.h.is_true() {
            conjuncts.push(self.h.clone());
        }
        conjuncts.extend(self.implications.iter().map(|i| i.formula()));
        let mut result = PbesExpr::join_and(conjuncts);
        for q in self.quantifiers.iter().rev() {
            result = q.apply(result);
        }
        result
    }

    pub fn to_equation(&self) -> PbesEquation {
        PbesEquation::new(self.symbol, self.variable.clone(), self.formula())
    }
}

impl Display for PfnfEquation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {}", self.symbol, self.variable)?;
        for q in &self.quantifiers {
            match q {
                Quantifier::Forall(vars) => writeln!(f, "  forall {:?}", names(vars))?,
                Quantifier::Exists(vars) => writeln!(f, "  exists {:?}", names(vars))?,
            }
        }
        writeln!(f, "  h = {}", self.h)?;
        for (i, imp) in self.implications.iter().enumerate() {
            writeln!(f, "  g{} = {}", i, imp.guard)?;
            for x in &imp.variables {
                writeln!(f, "    -> {}", x)?;
            }
        }
        Ok(())
    }
}

fn names(vars: &[Variable]) -> Vec<&str> {
    vars.iter().map(|v| v.name.as_str()).collect()
}

/// Returns true if `x` has one of the shapes accepted by [`PfnfEquation::from_equation`].
pub fn is_pfnf(x: &PbesExpr) -> bool {
    split_pfnf(x).is_ok()
}

type PfnfParts = (Vec<Quantifier>, PbesExpr, Vec<PfnfImplication>);

fn split_pfnf(x: &PbesExpr) -> std::result::Result<PfnfParts, String> {
    let mut quantifiers = Vec::new();
    let mut body = x;
    loop {
        match body {
            PbesExpr::Forall(vars, b) => {
                quantifiers.push(Quantifier::Forall(vars.clone()));
                body = b.as_ref();
            }
            PbesExpr::Exists(vars, b) => {
                quantifiers.push(Quantifier::Exists(vars.clone()));
                body = b.as_ref();
            }
            _ => break,
        }
    }

    let mut guards = Vec::new();
    let mut implications = Vec::new();
    for conjunct in body.split_and() {
        if conjunct.is_simple() {
            guards.push(conjunct.clone());
            continue;
        }
        match conjunct {
            PbesExpr::PropVar(x) => {
                implications.push(PfnfImplication::new(PbesExpr::True, vec![x.clone()]));
            }
            PbesExpr::Imp(g, rhs) => {
                if !g.is_simple() {
                    return Err(format!("guard {} contains a predicate variable", g));
                }
                let targets = rhs
                    .split_or()
                    .into_iter()
                    .map(|x| match x {
                        PbesExpr::PropVar(x) => Ok(x.clone()),
                        other => Err(format!("{} is not a predicate variable instantiation", other)),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                implications.push(PfnfImplication::new(g.as_ref().clone(), targets));
            }
            PbesExpr::Or(_, _) => {
                let mut negated = Vec::new();
                let mut targets = Vec::new();
                for x in conjunct.split_or() {
                    match x {
                        PbesExpr::PropVar(x) => targets.push(x.clone()),
                        x if x.is_simple() => negated.push(x.clone()),
                        other => return Err(format!("unexpected disjunct {}", other)),
                    }
                }
                let guard = if negated.is_empty() {
                    PbesExpr::True
                } else {
                    PbesExpr::not(PbesExpr::join_or(negated))
                };
                implications.push(PfnfImplication::new(guard, targets));
            }
            other => return Err(format!("unexpected conjunct {}", other)),
        }
    }

    Ok((quantifiers, PbesExpr::join_and(guards), implications))
}

/// A PBES in which every equation is split into PFNF parts.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PfnfPbes {
    pub equations: Vec<PfnfEquation>,
    pub initial_state: PropVarInst,
}

impl PfnfPbes {
    pub fn new(p: &Pbes) -> Result<Self> {
        p.check_well_formed()?;
        let equations = p
            .equations
            .iter()
            .map(PfnfEquation::from_equation)
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "PFNF: {} equations, {} implications",
            equations.len(),
            equations.iter().map(|e| e.implications.len()).sum::<usize>()
        );
        Ok(Self {
            equations,
            initial_state: p.initial_state.clone(),
        })
    }

    pub fn equation(&self, name: &str) -> Option<&PfnfEquation> {
        self.equations.iter().find(|eqn| eqn.name() == name)
    }

    /// Like [`equation`][Self::equation], but an unknown name is an error.
    pub fn find(&self, name: &str) -> Result<&PfnfEquation> {
        self.equation(name).ok_or_else(|| Error::UnknownEquation { name: name.to_string() })
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.equations
            .iter()
            .position(|eqn| eqn.name() == name)
            .ok_or_else(|| Error::UnknownEquation { name: name.to_string() })
    }

    pub fn to_pbes(&self) -> Pbes {
        Pbes::new(
            self.equations.iter().map(|eqn| eqn.to_equation()).collect(),
            self.initial_state.clone(),
        )
    }

    /// Simplifies `h` and the implication guards in place.
    pub fn simplify<R: Rewriter>(&mut self, rewriter: &PbesRewriter<R>) {
        for eqn in &mut self.equations {
            eqn.h = rewriter.simplify(&eqn.h);
            for imp in &mut eqn.implications {
                imp.guard = rewriter.simplify(&imp.guard);
            }
        }
    }
}

impl Display for PfnfPbes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for eqn in &self.equations {
            write!(f, "{}", eqn)?;
        }
        write!(f, "init {}", self.initial_state)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::data::{DataExpr, Sort};

    fn n() -> Variable {
        Variable::new("n", Sort::Nat)
    }

    fn eqn(formula: PbesExpr) -> PbesEquation {
        PbesEquation::new(FixpointSymbol::Nu, PropositionalVariable::new("X", vec![n()]), formula)
    }

    fn x(e: DataExpr) -> PbesExpr {
        PbesExpr::propvar("X", vec![e])
    }

    #[test]
    fn test_disjunction_becomes_implication() {
        let is_zero = PbesExpr::val(DataExpr::eq(DataExpr::from(n()), DataExpr::int(0)));
        let next = DataExpr::add(DataExpr::from(n()), DataExpr::int(1));
        let e = PfnfEquation::from_equation(&eqn(PbesExpr::or(is_zero.clone(), x(next.clone())))).unwrap();
        assert_eq!(e.h, PbesExpr::True);
        assert_eq!(e.implications.len(), 1);
        assert_eq!(e.implications[0].guard, PbesExpr::not(is_zero));
        assert_eq!(e.implications[0].variables, vec![PropVarInst::new("X", vec![next])]);
    }

    #[test]
    fn test_guards_and_quantifiers() {
        let m = Variable::new("m", Sort::Nat);
        let g = PbesExpr::val(DataExpr::lt(DataExpr::from(&m), DataExpr::from(n())));
        let h = PbesExpr::val(DataExpr::gt(DataExpr::from(n()), DataExpr::int(2)));
        let body = PbesExpr::join_and(vec![
            h.clone(),
            PbesExpr::imp(g.clone(), PbesExpr::or(x(DataExpr::from(&m)), x(DataExpr::int(0)))),
            x(DataExpr::from(n())),
        ]);
        let formula = PbesExpr::forall(vec![m.clone()], body);
        let e = PfnfEquation::from_equation(&eqn(formula.clone())).unwrap();

        assert_eq!(e.quantifiers, vec![Quantifier::Forall(vec![m])]);
        assert_eq!(e.h, h);
        assert_eq!(e.implications.len(), 2);
        assert_eq!(e.implications[0].guard, g);
        assert_eq!(e.implications[0].variables.len(), 2);
        assert_eq!(e.implications[1].guard, PbesExpr::True);
        assert!(is_pfnf(&formula));
    }

    #[test]
    fn test_formula_round_trip() {
        let g = PbesExpr::not(PbesExpr::val(DataExpr::eq(DataExpr::from(n()), DataExpr::int(0))));
        let formula = PbesExpr::imp(g, x(DataExpr::add(DataExpr::from(n()), DataExpr::int(1))));
        let e = PfnfEquation::from_equation(&eqn(formula.clone())).unwrap();
        assert_eq!(e.formula(), formula);
        assert_eq!(PfnfEquation::from_equation(&e.to_equation()).unwrap(), e);
    }

    #[test]
    fn test_rejects_non_pfnf() {
        // Instantiations may not occur under a negation or in a guard.
        let formula = PbesExpr::not(x(DataExpr::from(n())));
        let result = PfnfEquation::from_equation(&eqn(formula.clone()));
        assert!(matches!(result, Err(Error::NotPfnf { .. })));
        assert!(!is_pfnf(&formula));

        let formula = PbesExpr::imp(x(DataExpr::int(0)), x(DataExpr::int(1)));
        assert!(!is_pfnf(&formula));
    }

    #[test]
    fn test_unknown_equation() {
        let p = Pbes::new(
            vec![eqn(PbesExpr::propvar("Y", vec![]))],
            PropVarInst::new("X", vec![DataExpr::int(0)]),
        );
        assert_eq!(PfnfPbes::new(&p), Err(Error::UnknownEquation { name: "Y".to_string() }));
    }
}
