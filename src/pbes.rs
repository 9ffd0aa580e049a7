//! Parameterised Boolean equation systems.
//!
//! A PBES is a sequence of fixpoint equations `sigma X(d: D) = phi` where `phi`
//! is a first-order formula over data guards `val(b)` and predicate variable
//! instantiations `Y(e)`. The equations here are plain owned trees; sharing
//! is not needed because every pass builds a fresh system.
//!
//! Like [`DataExpr`], formulas are traversed with a bottom-up [`PbesExpr::fold`]
//! on an explicit stack. Substitution of data variables is capture-avoiding:
//! a quantifier whose bound variable occurs free in the replacement is renamed
//! first.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::data::{DataExpr, Substitution, Variable};
use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FixpointSymbol {
    /// Least fixpoint.
    Mu,
    /// Greatest fixpoint.
    Nu,
}

impl Display for FixpointSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FixpointSymbol::Mu => write!(f, "mu"),
            FixpointSymbol::Nu => write!(f, "nu"),
        }
    }
}

/// The left-hand side of an equation: a name and formal parameters.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PropositionalVariable {
    pub name: String,
    pub parameters: Vec<Variable>,
}

impl PropositionalVariable {
    pub fn new(name: impl Into<String>, parameters: Vec<Variable>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

impl Display for PropositionalVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.parameters.is_empty() {
            write!(f, "(")?;
            for (i, d) in self.parameters.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", d.name, d.sort)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A predicate variable instantiation `X(e_1, ..., e_n)`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PropVarInst {
    pub name: String,
    pub parameters: Vec<DataExpr>,
}

impl PropVarInst {
    pub fn new(name: impl Into<String>, parameters: Vec<DataExpr>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Applies `f` to every actual parameter.
    pub fn map_parameters(&self, f: impl FnMut(&DataExpr) -> DataExpr) -> PropVarInst {
        PropVarInst {
            name: self.name.clone(),
            parameters: self.parameters.iter().map(f).collect(),
        }
    }

    pub fn substitute(&self, sigma: &Substitution) -> PropVarInst {
        self.map_parameters(|e| e.substitute(sigma))
    }

    pub fn free_variables(&self) -> BTreeSet<Variable> {
        self.parameters.iter().flat_map(|e| e.free_variables()).collect()
    }
}

impl Display for PropVarInst {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.parameters.is_empty() {
            write!(f, "(")?;
            for (i, e) in self.parameters.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", e)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PbesExpr {
    True,
    False,
    /// A data guard `val(b)`.
    Data(DataExpr),
    PropVar(PropVarInst),
    Not(Box<PbesExpr>),
    And(Box<PbesExpr>, Box<PbesExpr>),
    Or(Box<PbesExpr>, Box<PbesExpr>),
    Imp(Box<PbesExpr>, Box<PbesExpr>),
    Forall(Vec<Variable>, Box<PbesExpr>),
    Exists(Vec<Variable>, Box<PbesExpr>),
}

impl PbesExpr {
    /// Moves the formula out, leaving `true` behind.
    pub(crate) fn take(&mut self) -> PbesExpr {
        std::mem::replace(self, PbesExpr::True)
    }

    fn detach_children(&mut self, stack: &mut Vec<PbesExpr>) {
        let mut detach = |x: &mut Box<PbesExpr>| {
            if !matches!(**x, PbesExpr::True | PbesExpr::False | PbesExpr::Data(_) | PbesExpr::PropVar(_)) {
                stack.push(x.take());
            }
        };
        match self {
            PbesExpr::True | PbesExpr::False | PbesExpr::Data(_) | PbesExpr::PropVar(_) => {}
            PbesExpr::Not(a) | PbesExpr::Forall(_, a) | PbesExpr::Exists(_, a) => detach(a),
            PbesExpr::And(a, b) | PbesExpr::Or(a, b) | PbesExpr::Imp(a, b) => {
                detach(a);
                detach(b);
            }
        }
    }
}

impl Drop for PbesExpr {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.detach_children(&mut stack);
        while let Some(mut x) = stack.pop() {
            x.detach_children(&mut stack);
        }
    }
}

/// One layer of a [`PbesExpr`], with sub-formulas replaced by computed results.
#[derive(Debug)]
pub enum ExprLayer<'a, R> {
    True,
    False,
    Data(&'a DataExpr),
    PropVar(&'a PropVarInst),
    Not(R),
    And(R, R),
    Or(R, R),
    Imp(R, R),
    Forall(&'a [Variable], R),
    Exists(&'a [Variable], R),
}

impl PbesExpr {
    pub fn val(d: DataExpr) -> Self {
        PbesExpr::Data(d)
    }

    pub fn propvar(name: impl Into<String>, parameters: Vec<DataExpr>) -> Self {
        PbesExpr::PropVar(PropVarInst::new(name, parameters))
    }

    pub fn not(x: Self) -> Self {
        PbesExpr::Not(Box::new(x))
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        PbesExpr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        PbesExpr::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn imp(lhs: Self, rhs: Self) -> Self {
        PbesExpr::Imp(Box::new(lhs), Box::new(rhs))
    }

    /// `forall vars. body`, or just `body` when there are no variables.
    pub fn forall(variables: Vec<Variable>, body: Self) -> Self {
        if variables.is_empty() {
            body
        } else {
            PbesExpr::Forall(variables, Box::new(body))
        }
    }

    /// `exists vars. body`, or just `body` when there are no variables.
    pub fn exists(variables: Vec<Variable>, body: Self) -> Self {
        if variables.is_empty() {
            body
        } else {
            PbesExpr::Exists(variables, Box::new(body))
        }
    }

    /// Right-nested conjunction; `true` for an empty sequence.
    pub fn join_and(terms: impl IntoIterator<Item = PbesExpr>) -> Self {
        let mut terms: Vec<_> = terms.into_iter().collect();
        let Some(mut result) = terms.pop() else {
            return PbesExpr::True;
        };
        while let Some(x) = terms.pop() {
            result = PbesExpr::and(x, result);
        }
        result
    }

    /// Right-nested disjunction; `false` for an empty sequence.
    pub fn join_or(terms: impl IntoIterator<Item = PbesExpr>) -> Self {
        let mut terms: Vec<_> = terms.into_iter().collect();
        let Some(mut result) = terms.pop() else {
            return PbesExpr::False;
        };
        while let Some(x) = terms.pop() {
            result = PbesExpr::or(x, result);
        }
        result
    }

    /// Top-level conjuncts, left to right.
    pub fn split_and(&self) -> Vec<&PbesExpr> {
        self.split(|x| match x {
            PbesExpr::And(a, b) => Some((a.as_ref(), b.as_ref())),
            _ => None,
        })
    }

    /// Top-level disjuncts, left to right.
    pub fn split_or(&self) -> Vec<&PbesExpr> {
        self.split(|x| match x {
            PbesExpr::Or(a, b) => Some((a.as_ref(), b.as_ref())),
            _ => None,
        })
    }

    fn split<'a>(&'a self, op: impl Fn(&'a PbesExpr) -> Option<(&'a PbesExpr, &'a PbesExpr)>) -> Vec<&'a PbesExpr> {
        let mut result = Vec::new();
        let mut todo = vec![self];
        while let Some(x) = todo.pop() {
            match op(x) {
                Some((a, b)) => {
                    todo.push(b);
                    todo.push(a);
                }
                None => result.push(x),
            }
        }
        result
    }

    pub fn is_true(&self) -> bool {
        matches!(self, PbesExpr::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, PbesExpr::False)
    }
}

impl From<PropVarInst> for PbesExpr {
    fn from(x: PropVarInst) -> Self {
        PbesExpr::PropVar(x)
    }
}

impl PbesExpr {
    /// Bottom-up evaluation of `f` over the formula, on an explicit stack.
    pub fn fold<'a, R, F>(&'a self, mut f: F) -> R
    where
        F: FnMut(ExprLayer<'a, R>) -> R,
    {
        let mut todo: Vec<(&'a PbesExpr, bool)> = vec![(self, false)];
        let mut results: Vec<R> = Vec::new();

        while let Some((expr, expanded)) = todo.pop() {
            if !expanded {
                todo.push((expr, true));
                match expr {
                    PbesExpr::True | PbesExpr::False | PbesExpr::Data(_) | PbesExpr::PropVar(_) => {}
                    PbesExpr::Not(a) | PbesExpr::Forall(_, a) | PbesExpr::Exists(_, a) => {
                        todo.push((a.as_ref(), false));
                    }
                    PbesExpr::And(a, b) | PbesExpr::Or(a, b) | PbesExpr::Imp(a, b) => {
                        todo.push((b.as_ref(), false));
                        todo.push((a.as_ref(), false));
                    }
                }
                continue;
            }

            let layer = match expr {
                PbesExpr::True => ExprLayer::True,
                PbesExpr::False => ExprLayer::False,
                PbesExpr::Data(d) => ExprLayer::Data(d),
                PbesExpr::PropVar(x) => ExprLayer::PropVar(x),
                PbesExpr::Not(_) => ExprLayer::Not(pop(&mut results)),
                PbesExpr::Forall(vars, _) => ExprLayer::Forall(vars.as_slice(), pop(&mut results)),
                PbesExpr::Exists(vars, _) => ExprLayer::Exists(vars.as_slice(), pop(&mut results)),
                PbesExpr::And(_, _) | PbesExpr::Or(_, _) | PbesExpr::Imp(_, _) => {
                    let b = pop(&mut results);
                    let a = pop(&mut results);
                    match expr {
                        PbesExpr::And(_, _) => ExprLayer::And(a, b),
                        PbesExpr::Or(_, _) => ExprLayer::Or(a, b),
                        _ => ExprLayer::Imp(a, b),
                    }
                }
            };
            results.push(f(layer));
        }

        pop(&mut results)
    }

    /// Rebuilds a formula from a layer of already built sub-formulas.
    pub fn from_layer(layer: ExprLayer<'_, PbesExpr>) -> PbesExpr {
        match layer {
            ExprLayer::True => PbesExpr::True,
            ExprLayer::False => PbesExpr::False,
            ExprLayer::Data(d) => PbesExpr::Data(d.clone()),
            ExprLayer::PropVar(x) => PbesExpr::PropVar(x.clone()),
            ExprLayer::Not(a) => PbesExpr::not(a),
            ExprLayer::And(a, b) => PbesExpr::and(a, b),
            ExprLayer::Or(a, b) => PbesExpr::or(a, b),
            ExprLayer::Imp(a, b) => PbesExpr::imp(a, b),
            ExprLayer::Forall(vars, a) => PbesExpr::Forall(vars.to_vec(), Box::new(a)),
            ExprLayer::Exists(vars, a) => PbesExpr::Exists(vars.to_vec(), Box::new(a)),
        }
    }

    pub fn free_variables(&self) -> BTreeSet<Variable> {
        self.fold(|layer| match layer {
            ExprLayer::True | ExprLayer::False => BTreeSet::new(),
            ExprLayer::Data(d) => d.free_variables(),
            ExprLayer::PropVar(x) => x.free_variables(),
            ExprLayer::Not(a) => a,
            ExprLayer::And(mut a, b) | ExprLayer::Or(mut a, b) | ExprLayer::Imp(mut a, b) => {
                a.extend(b);
                a
            }
            ExprLayer::Forall(vars, mut a) | ExprLayer::Exists(vars, mut a) => {
                for v in vars {
                    a.remove(v);
                }
                a
            }
        })
    }

    /// Returns true if the formula contains no predicate variable instantiation.
    pub fn is_simple(&self) -> bool {
        self.fold(|layer| match layer {
            ExprLayer::PropVar(_) => false,
            ExprLayer::True | ExprLayer::False | ExprLayer::Data(_) => true,
            ExprLayer::Not(a) | ExprLayer::Forall(_, a) | ExprLayer::Exists(_, a) => a,
            ExprLayer::And(a, b) | ExprLayer::Or(a, b) | ExprLayer::Imp(a, b) => a && b,
        })
    }

    /// All predicate variable instantiations, in left-to-right order.
    pub fn instantiations(&self) -> Vec<&PropVarInst> {
        let mut result = Vec::new();
        let mut todo = vec![self];
        while let Some(x) = todo.pop() {
            match x {
                PbesExpr::PropVar(inst) => result.push(inst),
                PbesExpr::True | PbesExpr::False | PbesExpr::Data(_) => {}
                PbesExpr::Not(a) | PbesExpr::Forall(_, a) | PbesExpr::Exists(_, a) => todo.push(a.as_ref()),
                PbesExpr::And(a, b) | PbesExpr::Or(a, b) | PbesExpr::Imp(a, b) => {
                    todo.push(b.as_ref());
                    todo.push(a.as_ref());
                }
            }
        }
        result
    }

    /// Replaces every predicate variable instantiation `x` by `f(x)`.
    pub fn replace_instantiations(&self, mut f: impl FnMut(&PropVarInst) -> PbesExpr) -> PbesExpr {
        self.fold(|layer| match layer {
            ExprLayer::PropVar(x) => f(x),
            other => PbesExpr::from_layer(other),
        })
    }

    /// Capture-avoiding substitution of data variables.
    pub fn substitute(&self, sigma: &Substitution) -> PbesExpr {
        if sigma.is_empty() {
            return self.clone();
        }

        enum Frame<'a> {
            Visit(&'a PbesExpr, Rc<Substitution>),
            Build(&'a PbesExpr, Option<Vec<Variable>>),
        }

        let mut todo = vec![Frame::Visit(self, Rc::new(sigma.clone()))];
        let mut results: Vec<PbesExpr> = Vec::new();

        while let Some(frame) = todo.pop() {
            match frame {
                Frame::Visit(x, sigma) => match x {
                    PbesExpr::True => results.push(PbesExpr::True),
                    PbesExpr::False => results.push(PbesExpr::False),
                    PbesExpr::Data(d) => results.push(PbesExpr::Data(d.substitute(&sigma))),
                    PbesExpr::PropVar(inst) => results.push(PbesExpr::PropVar(inst.substitute(&sigma))),
                    PbesExpr::Not(a) => {
                        todo.push(Frame::Build(x, None));
                        todo.push(Frame::Visit(a.as_ref(), sigma));
                    }
                    PbesExpr::And(a, b) | PbesExpr::Or(a, b) | PbesExpr::Imp(a, b) => {
                        todo.push(Frame::Build(x, None));
                        todo.push(Frame::Visit(b.as_ref(), sigma.clone()));
                        todo.push(Frame::Visit(a.as_ref(), sigma));
                    }
                    PbesExpr::Forall(vars, body) | PbesExpr::Exists(vars, body) => {
                        let (binders, inner) = rename_binders(vars, body, &sigma);
                        todo.push(Frame::Build(x, Some(binders)));
                        todo.push(Frame::Visit(body.as_ref(), Rc::new(inner)));
                    }
                },
                Frame::Build(x, binders) => {
                    let result = match x {
                        PbesExpr::Not(_) => PbesExpr::not(pop(&mut results)),
                        PbesExpr::And(_, _) | PbesExpr::Or(_, _) | PbesExpr::Imp(_, _) => {
                            let b = pop(&mut results);
                            let a = pop(&mut results);
                            match x {
                                PbesExpr::And(_, _) => PbesExpr::and(a, b),
                                PbesExpr::Or(_, _) => PbesExpr::or(a, b),
                                _ => PbesExpr::imp(a, b),
                            }
                        }
                        PbesExpr::Forall(_, _) => {
                            let body = pop(&mut results);
                            PbesExpr::Forall(binders.unwrap_or_default(), Box::new(body))
                        }
                        PbesExpr::Exists(_, _) => {
                            let body = pop(&mut results);
                            PbesExpr::Exists(binders.unwrap_or_default(), Box::new(body))
                        }
                        _ => unreachable!("leaves are never scheduled for building"),
                    };
                    results.push(result);
                }
            }
        }

        pop(&mut results)
    }
}

/// Computes the binders and the substitution to use under a quantifier.
///
/// Bound variables shadow `sigma`. A bound variable that occurs free in the
/// range of `sigma` is renamed by appending primes until the name is fresh.
fn rename_binders(vars: &[Variable], body: &PbesExpr, sigma: &Substitution) -> (Vec<Variable>, Substitution) {
    let mut inner = sigma.clone();
    for v in vars {
        inner.remove(v);
    }
    let range = inner.range_variables();
    if !vars.iter().any(|v| range.contains(v)) {
        return (vars.to_vec(), inner);
    }

    let mut used: BTreeSet<String> = range.iter().map(|v| v.name.clone()).collect();
    used.extend(body.free_variables().into_iter().map(|v| v.name));
    used.extend(vars.iter().map(|v| v.name.clone()));

    let mut binders = Vec::with_capacity(vars.len());
    for v in vars {
        if range.contains(v) {
            let mut name = format!("{}'", v.name);
            while used.contains(&name) {
                name.push('\'');
            }
            used.insert(name.clone());
            let fresh = Variable::new(name, v.sort);
            inner.insert(v.clone(), DataExpr::from(&fresh));
            binders.push(fresh);
        } else {
            binders.push(v.clone());
        }
    }
    (binders, inner)
}

fn pop<R>(results: &mut Vec<R>) -> R {
    results.pop().expect("fold: result stack underflow")
}

impl Display for PbesExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Precedences: quantifiers 0, => 1, || 2, && 3, ! and atoms bind tightest.
        const ATOM: u8 = u8::MAX;
        fn wrap(text: String, inner: u8, outer: u8) -> String {
            if inner <= outer {
                format!("({})", text)
            } else {
                text
            }
        }
        fn vars(vs: &[Variable]) -> String {
            vs.iter()
                .map(|v| format!("{}: {}", v.name, v.sort))
                .collect::<Vec<_>>()
                .join(", ")
        }
        let (text, _) = self.fold(|layer| match layer {
            ExprLayer::True => ("true".to_string(), ATOM),
            ExprLayer::False => ("false".to_string(), ATOM),
            ExprLayer::Data(d) => (format!("val({})", d), ATOM),
            ExprLayer::PropVar(x) => (x.to_string(), ATOM),
            ExprLayer::Not((a, pa)) => (format!("!{}", wrap(a, pa, 3)), ATOM),
            ExprLayer::And((a, pa), (b, pb)) => (format!("{} && {}", wrap(a, pa, 2), wrap(b, pb, 2)), 3),
            ExprLayer::Or((a, pa), (b, pb)) => (format!("{} || {}", wrap(a, pa, 1), wrap(b, pb, 1)), 2),
            ExprLayer::Imp((a, pa), (b, pb)) => (format!("{} => {}", wrap(a, pa, 1), wrap(b, pb, 0)), 1),
            ExprLayer::Forall(vs, (a, _)) => (format!("forall {}. {}", vars(vs), a), 0),
            ExprLayer::Exists(vs, (a, _)) => (format!("exists {}. {}", vars(vs), a), 0),
        });
        write!(f, "{}", text)
    }
}

/// A single fixpoint equation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PbesEquation {
    pub symbol: FixpointSymbol,
    pub variable: PropositionalVariable,
    pub formula: PbesExpr,
}

impl PbesEquation {
    pub fn new(symbol: FixpointSymbol, variable: PropositionalVariable, formula: PbesExpr) -> Self {
        Self {
            symbol,
            variable,
            formula,
        }
    }

    pub fn name(&self) -> &str {
        &self.variable.name
    }
}

impl Display for PbesEquation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} = {};", self.symbol, self.variable, self.formula)
    }
}

/// An equation system together with its initial instantiation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Pbes {
    pub equations: Vec<PbesEquation>,
    pub initial_state: PropVarInst,
}

impl Pbes {
    pub fn new(equations: Vec<PbesEquation>, initial_state: PropVarInst) -> Self {
        Self {
            equations,
            initial_state,
        }
    }

    pub fn equation(&self, name: &str) -> Option<&PbesEquation> {
        self.equations.iter().find(|eqn| eqn.name() == name)
    }

    /// Checks that every instantiation (including the initial one) refers to an
    /// equation and has the right number of arguments.
    pub fn check_well_formed(&self) -> Result<()> {
        let arity: BTreeMap<&str, usize> = self
            .equations
            .iter()
            .map(|eqn| (eqn.name(), eqn.variable.parameters.len()))
            .collect();

        let check = |x: &PropVarInst| -> Result<()> {
            match arity.get(x.name.as_str()) {
                None => Err(Error::UnknownEquation { name: x.name.clone() }),
                Some(&expected) if expected != x.parameters.len() => Err(Error::ArityMismatch {
                    name: x.name.clone(),
                    expected,
                    found: x.parameters.len(),
                }),
                Some(_) => Ok(()),
            }
        };

        check(&self.initial_state)?;
        for eqn in &self.equations {
            for x in eqn.formula.instantiations() {
                check(x)?;
            }
        }
        Ok(())
    }
}

impl Display for Pbes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "pbes")?;
        for eqn in &self.equations {
            writeln!(f, "  {}", eqn)?;
        }
        write!(f, "init {};", self.initial_state)
    }
}
