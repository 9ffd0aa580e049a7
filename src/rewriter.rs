//! Rewriting of data expressions and PBES formulas.
//!
//! The analyses only need a rewriter that applies a substitution and brings the
//! result into a form where closed boolean terms become `true` or `false`. The
//! [`SimplifyingRewriter`] does this by constant folding plus a few unit laws;
//! it is not a general term rewriting engine.

use log::trace;

use crate::data::{BinaryOp, DataExpr, DataLayer, Substitution, UnaryOp};
use crate::pbes::{ExprLayer, PbesExpr};

/// Evaluates data expressions under a substitution.
pub trait Rewriter {
    fn rewrite(&self, expr: &DataExpr, sigma: &Substitution) -> DataExpr;

    /// Rewrites without a substitution.
    fn simplify(&self, expr: &DataExpr) -> DataExpr {
        self.rewrite(expr, &Substitution::new())
    }
}

/// Constant folding with boolean unit laws.
///
/// Integer arithmetic is checked; a folding step that would overflow leaves
/// the term unevaluated.
#[derive(Debug, Default, Copy, Clone)]
pub struct SimplifyingRewriter;

impl SimplifyingRewriter {
    pub fn new() -> Self {
        Self
    }
}

impl Rewriter for SimplifyingRewriter {
    fn rewrite(&self, expr: &DataExpr, sigma: &Substitution) -> DataExpr {
        expr.fold(|layer| match layer {
            DataLayer::Var(v) => match sigma.get(v) {
                // The image of a variable is simplified on its own, it contains
                // no variables of `sigma` that must be replaced again.
                Some(e) => self.simplify(e),
                None => DataExpr::Var(v.clone()),
            },
            DataLayer::Unary(op, a) => simplify_unary(op, a),
            DataLayer::Binary(op, a, b) => simplify_binary(op, a, b),
            DataLayer::If(c, a, b) => match c {
                DataExpr::Bool(true) => a,
                DataExpr::Bool(false) => b,
                _ if a == b => a,
                c => DataExpr::ite(c, a, b),
            },
            other => DataExpr::from_layer(other),
        })
    }
}

fn simplify_unary(op: UnaryOp, mut a: DataExpr) -> DataExpr {
    match (op, &mut a) {
        (UnaryOp::Not, DataExpr::Bool(b)) => DataExpr::Bool(!*b),
        (UnaryOp::Not, DataExpr::Unary(UnaryOp::Not, x)) | (UnaryOp::Neg, DataExpr::Unary(UnaryOp::Neg, x)) => x.take(),
        (UnaryOp::Neg, DataExpr::Int(i)) => match i.checked_neg() {
            Some(r) => DataExpr::Int(r),
            None => DataExpr::neg(DataExpr::Int(*i)),
        },
        _ => DataExpr::Unary(op, Box::new(a)),
    }
}

fn simplify_binary(op: BinaryOp, a: DataExpr, b: DataExpr) -> DataExpr {
    use DataExpr::{Bool, Int};

    match (op, &a, &b) {
        (BinaryOp::And, Bool(false), _) | (BinaryOp::And, _, Bool(false)) => Bool(false),
        (BinaryOp::And, Bool(true), _) => b,
        (BinaryOp::And, _, Bool(true)) => a,
        (BinaryOp::And, _, _) if a == b => a,

        (BinaryOp::Or, Bool(true), _) | (BinaryOp::Or, _, Bool(true)) => Bool(true),
        (BinaryOp::Or, Bool(false), _) => b,
        (BinaryOp::Or, _, Bool(false)) => a,
        (BinaryOp::Or, _, _) if a == b => a,

        (BinaryOp::Imp, Bool(false), _) | (BinaryOp::Imp, _, Bool(true)) => Bool(true),
        (BinaryOp::Imp, Bool(true), _) => b,
        (BinaryOp::Imp, _, Bool(false)) => simplify_unary(UnaryOp::Not, a),

        (BinaryOp::Eq, Int(x), Int(y)) => Bool(x == y),
        (BinaryOp::Eq, Bool(x), Bool(y)) => Bool(x == y),
        (BinaryOp::Eq, _, _) if a == b => Bool(true),
        (BinaryOp::Neq, Int(x), Int(y)) => Bool(x != y),
        (BinaryOp::Neq, Bool(x), Bool(y)) => Bool(x != y),
        (BinaryOp::Neq, _, _) if a == b => Bool(false),

        (BinaryOp::Lt, Int(x), Int(y)) => Bool(x < y),
        (BinaryOp::Le, Int(x), Int(y)) => Bool(x <= y),
        (BinaryOp::Gt, Int(x), Int(y)) => Bool(x > y),
        (BinaryOp::Ge, Int(x), Int(y)) => Bool(x >= y),

        (BinaryOp::Add, Int(x), Int(y)) => fold_int(x.checked_add(*y), op, a, b),
        (BinaryOp::Sub, Int(x), Int(y)) => fold_int(x.checked_sub(*y), op, a, b),
        (BinaryOp::Mul, Int(x), Int(y)) => fold_int(x.checked_mul(*y), op, a, b),
        (BinaryOp::Add, Int(0), _) => b,
        (BinaryOp::Add, _, Int(0)) | (BinaryOp::Sub, _, Int(0)) => a,
        (BinaryOp::Mul, Int(1), _) => b,
        (BinaryOp::Mul, _, Int(1)) => a,

        _ => DataExpr::binary(op, a, b),
    }
}

fn fold_int(result: Option<i64>, op: BinaryOp, a: DataExpr, b: DataExpr) -> DataExpr {
    match result {
        Some(r) => DataExpr::Int(r),
        None => {
            trace!("integer overflow while folding {} {:?} {}", a, op, b);
            DataExpr::binary(op, a, b)
        }
    }
}

/// Simplifies PBES formulas, delegating data terms to a [`Rewriter`].
#[derive(Debug, Default, Clone)]
pub struct PbesRewriter<R = SimplifyingRewriter> {
    data: R,
}

impl<R: Rewriter> PbesRewriter<R> {
    pub fn new(data: R) -> Self {
        Self { data }
    }

    pub fn data_rewriter(&self) -> &R {
        &self.data
    }

    /// Applies `sigma` (capture-avoiding) and simplifies the result.
    pub fn rewrite(&self, expr: &PbesExpr, sigma: &Substitution) -> PbesExpr {
        if sigma.is_empty() {
            self.simplify(expr)
        } else {
            self.simplify(&expr.substitute(sigma))
        }
    }

    /// Propagates `true`/`false` through the connectives, folds `val(..)` of
    /// closed booleans and drops quantified variables that do not occur.
    pub fn simplify(&self, expr: &PbesExpr) -> PbesExpr {
        expr.fold(|layer| match layer {
            ExprLayer::True => PbesExpr::True,
            ExprLayer::False => PbesExpr::False,
            ExprLayer::Data(d) => match self.data.simplify(d) {
                DataExpr::Bool(true) => PbesExpr::True,
                DataExpr::Bool(false) => PbesExpr::False,
                d => PbesExpr::Data(d),
            },
            ExprLayer::PropVar(x) => PbesExpr::PropVar(x.map_parameters(|e| self.data.simplify(e))),
            ExprLayer::Not(a) => negate(a),
            ExprLayer::And(a, b) => match (a, b) {
                (PbesExpr::False, _) | (_, PbesExpr::False) => PbesExpr::False,
                (PbesExpr::True, x) | (x, PbesExpr::True) => x,
                (a, b) if a == b => a,
                (a, b) => PbesExpr::and(a, b),
            },
            ExprLayer::Or(a, b) => match (a, b) {
                (PbesExpr::True, _) | (_, PbesExpr::True) => PbesExpr::True,
                (PbesExpr::False, x) | (x, PbesExpr::False) => x,
                (a, b) if a == b => a,
                (a, b) => PbesExpr::or(a, b),
            },
            ExprLayer::Imp(a, b) => match (a, b) {
                (PbesExpr::False, _) | (_, PbesExpr::True) => PbesExpr::True,
                (PbesExpr::True, x) => x,
                (a, PbesExpr::False) => negate(a),
                (a, b) => PbesExpr::imp(a, b),
            },
            ExprLayer::Forall(vars, body) => {
                let free = body.free_variables();
                let vars = vars.iter().filter(|v| free.contains(*v)).cloned().collect();
                PbesExpr::forall(vars, body)
            }
            ExprLayer::Exists(vars, body) => {
                let free = body.free_variables();
                let vars = vars.iter().filter(|v| free.contains(*v)).cloned().collect();
                PbesExpr::exists(vars, body)
            }
        })
    }
}

/// `!a`, with double negations and constants removed.
fn negate(mut a: PbesExpr) -> PbesExpr {
    match &mut a {
        PbesExpr::True => PbesExpr::False,
        PbesExpr::False => PbesExpr::True,
        PbesExpr::Not(x) => x.take(),
        _ => PbesExpr::not(a),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::data::{Sort, Variable};

    fn n() -> Variable {
        Variable::new("n", Sort::Nat)
    }

    #[test]
    fn test_constant_folding() {
        let r = SimplifyingRewriter::new();
        let e = DataExpr::eq(DataExpr::add(DataExpr::from(n()), DataExpr::int(1)), DataExpr::int(2));
        let mut sigma = Substitution::new();
        sigma.insert(n(), DataExpr::int(1));
        assert_eq!(r.rewrite(&e, &sigma), DataExpr::bool(true));
        sigma.insert(n(), DataExpr::int(5));
        assert_eq!(r.rewrite(&e, &sigma), DataExpr::bool(false));
    }

    #[test]
    fn test_open_terms_are_kept() {
        let r = SimplifyingRewriter::new();
        let e = DataExpr::and(DataExpr::bool(true), DataExpr::lt(DataExpr::from(n()), DataExpr::int(3)));
        assert_eq!(r.simplify(&e), DataExpr::lt(DataExpr::from(n()), DataExpr::int(3)));
        let e = DataExpr::eq(DataExpr::from(n()), DataExpr::from(n()));
        assert_eq!(r.simplify(&e), DataExpr::bool(true));
    }

    #[test]
    fn test_double_negation() {
        let r = SimplifyingRewriter::new();
        let b = DataExpr::lt(DataExpr::from(n()), DataExpr::int(3));
        assert_eq!(r.simplify(&DataExpr::not(DataExpr::not(b.clone()))), b);
        let m = DataExpr::from(n());
        assert_eq!(r.simplify(&DataExpr::neg(DataExpr::neg(m.clone()))), m);

        let p = PbesRewriter::new(r);
        let x = PbesExpr::propvar("X", vec![]);
        assert_eq!(p.simplify(&PbesExpr::not(PbesExpr::not(x.clone()))), x);
        assert_eq!(p.simplify(&PbesExpr::imp(PbesExpr::not(x.clone()), PbesExpr::False)), x);
    }

    #[test]
    fn test_overflow_is_not_folded() {
        let r = SimplifyingRewriter::new();
        let e = DataExpr::add(DataExpr::int(i64::MAX), DataExpr::int(1));
        assert_eq!(r.simplify(&e), e);
    }

    #[test]
    fn test_if() {
        let r = SimplifyingRewriter::new();
        let b = DataExpr::var("b", Sort::Bool);
        let e = DataExpr::ite(DataExpr::lt(DataExpr::int(1), DataExpr::int(2)), DataExpr::int(7), DataExpr::int(8));
        assert_eq!(r.simplify(&e), DataExpr::int(7));
        let e = DataExpr::ite(b, DataExpr::int(3), DataExpr::int(3));
        assert_eq!(r.simplify(&e), DataExpr::int(3));
    }

    #[test]
    fn test_pbes_simplify() {
        let r = PbesRewriter::<SimplifyingRewriter>::default();
        let guard = PbesExpr::val(DataExpr::eq(DataExpr::from(n()), DataExpr::int(0)));
        let x = PbesExpr::and(guard.clone(), PbesExpr::propvar("X", vec![DataExpr::from(n())]));

        let mut sigma = Substitution::new();
        sigma.insert(n(), DataExpr::int(1));
        assert_eq!(r.rewrite(&x, &sigma), PbesExpr::False);

        sigma.insert(n(), DataExpr::int(0));
        assert_eq!(r.rewrite(&x, &sigma), PbesExpr::propvar("X", vec![DataExpr::int(0)]));

        let y = PbesExpr::imp(PbesExpr::not(PbesExpr::False), guard.clone());
        assert_eq!(r.simplify(&y), guard);
    }

    #[test]
    fn test_unused_binders_are_dropped() {
        let r = PbesRewriter::<SimplifyingRewriter>::default();
        let m = Variable::new("m", Sort::Nat);
        let x = PbesExpr::forall(
            vec![m.clone(), n()],
            PbesExpr::propvar("X", vec![DataExpr::from(n())]),
        );
        assert_eq!(
            r.simplify(&x),
            PbesExpr::forall(vec![n()], PbesExpr::propvar("X", vec![DataExpr::from(n())]))
        );
        let x = PbesExpr::exists(vec![m], PbesExpr::True);
        assert_eq!(r.simplify(&x), PbesExpr::True);
    }
}
