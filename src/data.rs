//! Data expressions: the parameter language of equation systems.
//!
//! Data expressions are small first-order terms over booleans and integers.
//! They appear as actual parameters of predicate variable instantiations and,
//! wrapped in `val(..)`, as guards.
//!
//! All traversals go through [`DataExpr::fold`], which evaluates a one-layer
//! function bottom-up on an explicit stack, so deep terms do not exhaust the
//! call stack.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Sort of a data variable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Sort {
    Bool,
    Pos,
    Nat,
    Int,
}

impl Sort {
    /// A fixed value of this sort.
    ///
    /// Used as the "don't care" value for parameters that are never read.
    pub fn representative(self) -> DataExpr {
        match self {
            Sort::Bool => DataExpr::Bool(false),
            Sort::Pos => DataExpr::Int(1),
            Sort::Nat | Sort::Int => DataExpr::Int(0),
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Pos => write!(f, "Pos"),
            Sort::Nat => write!(f, "Nat"),
            Sort::Int => write!(f, "Int"),
        }
    }
}

/// A typed data variable.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Variable {
    pub name: String,
    pub sort: Sort,
}

impl Variable {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Imp,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Imp => "=>",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
        }
    }

    /// Binding strength used when printing; higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Imp => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::Neq => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul => 7,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DataExpr {
    Var(Variable),
    Bool(bool),
    Int(i64),
    Unary(UnaryOp, Box<DataExpr>),
    Binary(BinaryOp, Box<DataExpr>, Box<DataExpr>),
    If(Box<DataExpr>, Box<DataExpr>, Box<DataExpr>),
}

impl DataExpr {
    /// Moves the term out, leaving `false` behind.
    pub(crate) fn take(&mut self) -> DataExpr {
        std::mem::replace(self, DataExpr::Bool(false))
    }

    fn is_leaf(&self) -> bool {
        matches!(self, DataExpr::Var(_) | DataExpr::Bool(_) | DataExpr::Int(_))
    }

    /// Moves the sub-terms that have sub-terms of their own onto `stack`.
    fn detach_children(&mut self, stack: &mut Vec<DataExpr>) {
        let mut detach = |x: &mut Box<DataExpr>| {
            if !x.is_leaf() {
                stack.push(x.take());
            }
        };
        match self {
            DataExpr::Var(_) | DataExpr::Bool(_) | DataExpr::Int(_) => {}
            DataExpr::Unary(_, a) => detach(a),
            DataExpr::Binary(_, a, b) => {
                detach(a);
                detach(b);
            }
            DataExpr::If(a, b, c) => {
                detach(a);
                detach(b);
                detach(c);
            }
        }
    }
}

// Frees deep terms without recursion.
impl Drop for DataExpr {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.detach_children(&mut stack);
        while let Some(mut x) = stack.pop() {
            x.detach_children(&mut stack);
        }
    }
}

/// One layer of a [`DataExpr`], with sub-terms replaced by already computed results.
#[derive(Debug)]
pub enum DataLayer<'a, R> {
    Var(&'a Variable),
    Bool(bool),
    Int(i64),
    Unary(UnaryOp, R),
    Binary(BinaryOp, R, R),
    If(R, R, R),
}

impl DataExpr {
    pub fn var(name: impl Into<String>, sort: Sort) -> Self {
        DataExpr::Var(Variable::new(name, sort))
    }

    pub fn bool(value: bool) -> Self {
        DataExpr::Bool(value)
    }

    pub fn int(value: i64) -> Self {
        DataExpr::Int(value)
    }

    pub fn not(x: Self) -> Self {
        DataExpr::Unary(UnaryOp::Not, Box::new(x))
    }

    pub fn neg(x: Self) -> Self {
        DataExpr::Unary(UnaryOp::Neg, Box::new(x))
    }

    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        DataExpr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn imp(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Imp, lhs, rhs)
    }

    pub fn eq(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Eq, lhs, rhs)
    }

    pub fn neq(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Neq, lhs, rhs)
    }

    pub fn lt(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Lt, lhs, rhs)
    }

    pub fn le(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Le, lhs, rhs)
    }

    pub fn gt(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Gt, lhs, rhs)
    }

    pub fn ge(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Ge, lhs, rhs)
    }

    pub fn add(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn ite(cond: Self, then: Self, else_: Self) -> Self {
        DataExpr::If(Box::new(cond), Box::new(then), Box::new(else_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, DataExpr::Var(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            DataExpr::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, DataExpr::Bool(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, DataExpr::Bool(false))
    }
}

impl From<Variable> for DataExpr {
    fn from(v: Variable) -> Self {
        DataExpr::Var(v)
    }
}

impl From<&Variable> for DataExpr {
    fn from(v: &Variable) -> Self {
        DataExpr::Var(v.clone())
    }
}

impl DataExpr {
    /// Bottom-up evaluation of `f` over the term, on an explicit stack.
    pub fn fold<'a, R, F>(&'a self, mut f: F) -> R
    where
        F: FnMut(DataLayer<'a, R>) -> R,
    {
        let mut todo: Vec<(&'a DataExpr, bool)> = vec![(self, false)];
        let mut results: Vec<R> = Vec::new();

        while let Some((expr, expanded)) = todo.pop() {
            if !expanded {
                todo.push((expr, true));
                // Children are pushed in reverse, so results come out left to right.
                match expr {
                    DataExpr::Var(_) | DataExpr::Bool(_) | DataExpr::Int(_) => {}
                    DataExpr::Unary(_, a) => todo.push((a.as_ref(), false)),
                    DataExpr::Binary(_, a, b) => {
                        todo.push((b.as_ref(), false));
                        todo.push((a.as_ref(), false));
                    }
                    DataExpr::If(a, b, c) => {
                        todo.push((c.as_ref(), false));
                        todo.push((b.as_ref(), false));
                        todo.push((a.as_ref(), false));
                    }
                }
                continue;
            }

            let layer = match expr {
                DataExpr::Var(v) => DataLayer::Var(v),
                DataExpr::Bool(b) => DataLayer::Bool(*b),
                DataExpr::Int(i) => DataLayer::Int(*i),
                DataExpr::Unary(op, _) => {
                    let a = pop(&mut results);
                    DataLayer::Unary(*op, a)
                }
                DataExpr::Binary(op, _, _) => {
                    let b = pop(&mut results);
                    let a = pop(&mut results);
                    DataLayer::Binary(*op, a, b)
                }
                DataExpr::If(_, _, _) => {
                    let c = pop(&mut results);
                    let b = pop(&mut results);
                    let a = pop(&mut results);
                    DataLayer::If(a, b, c)
                }
            };
            results.push(f(layer));
        }

        pop(&mut results)
    }

    /// Rebuilds a term from a layer of already built sub-terms.
    pub fn from_layer(layer: DataLayer<'_, DataExpr>) -> DataExpr {
        match layer {
            DataLayer::Var(v) => DataExpr::Var(v.clone()),
            DataLayer::Bool(b) => DataExpr::Bool(b),
            DataLayer::Int(i) => DataExpr::Int(i),
            DataLayer::Unary(op, a) => DataExpr::Unary(op, Box::new(a)),
            DataLayer::Binary(op, a, b) => DataExpr::binary(op, a, b),
            DataLayer::If(a, b, c) => DataExpr::ite(a, b, c),
        }
    }

    pub fn free_variables(&self) -> BTreeSet<Variable> {
        let mut result = BTreeSet::new();
        self.fold(|layer| {
            if let DataLayer::Var(v) = layer {
                result.insert(v.clone());
            }
        });
        result
    }

    /// Returns true if the term is closed, i.e. contains no variables.
    pub fn is_constant(&self) -> bool {
        self.fold(|layer| match layer {
            DataLayer::Var(_) => false,
            DataLayer::Bool(_) | DataLayer::Int(_) => true,
            DataLayer::Unary(_, a) => a,
            DataLayer::Binary(_, a, b) => a && b,
            DataLayer::If(a, b, c) => a && b && c,
        })
    }

    /// Simultaneous substitution of variables (no rewriting).
    pub fn substitute(&self, sigma: &Substitution) -> DataExpr {
        if sigma.is_empty() {
            return self.clone();
        }
        self.fold(|layer| match layer {
            DataLayer::Var(v) => sigma.get(v).cloned().unwrap_or_else(|| DataExpr::Var(v.clone())),
            other => DataExpr::from_layer(other),
        })
    }

    /// Top-level conjuncts of a boolean term.
    pub fn conjuncts(&self) -> Vec<&DataExpr> {
        let mut result = Vec::new();
        let mut todo = vec![self];
        while let Some(x) = todo.pop() {
            match x {
                DataExpr::Binary(BinaryOp::And, a, b) => {
                    todo.push(b.as_ref());
                    todo.push(a.as_ref());
                }
                _ => result.push(x),
            }
        }
        result
    }
}

fn pop<R>(results: &mut Vec<R>) -> R {
    results.pop().expect("fold: result stack underflow")
}

impl Display for DataExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Each layer yields its text and the precedence of its outermost operator.
        let (text, _) = self.fold(|layer| match layer {
            DataLayer::Var(v) => (v.name.clone(), u8::MAX),
            DataLayer::Bool(b) => (b.to_string(), u8::MAX),
            DataLayer::Int(i) if i < 0 => (format!("({})", i), u8::MAX),
            DataLayer::Int(i) => (i.to_string(), u8::MAX),
            DataLayer::Unary(op, (a, pa)) => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                let arg = if pa == u8::MAX { a } else { format!("({})", a) };
                (format!("{}{}", symbol, arg), u8::MAX)
            }
            DataLayer::Binary(op, (a, pa), (b, pb)) => {
                let p = op.precedence();
                // `=>` associates to the right, the others to the left.
                let left_nested = pa < p || (pa == p && op == BinaryOp::Imp);
                let lhs = if left_nested { format!("({})", a) } else { a };
                let right_nested = pb < p || (pb == p && op != BinaryOp::Imp);
                let rhs = if right_nested { format!("({})", b) } else { b };
                (format!("{} {} {}", lhs, op.symbol(), rhs), p)
            }
            DataLayer::If((a, _), (b, _), (c, _)) => (format!("if({}, {}, {})", a, b, c), u8::MAX),
        });
        write!(f, "{}", text)
    }
}

/// A finite mapping from variables to data expressions.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Substitution {
    map: BTreeMap<Variable, DataExpr>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds `[d_1 := e_1, ..., d_n := e_n]` from two parallel sequences.
    pub fn from_pairs<'a>(
        variables: impl IntoIterator<Item = &'a Variable>,
        values: impl IntoIterator<Item = &'a DataExpr>,
    ) -> Self {
        let map = variables
            .into_iter()
            .cloned()
            .zip(values.into_iter().cloned())
            .collect();
        Self { map }
    }

    pub fn insert(&mut self, v: Variable, e: DataExpr) -> Option<DataExpr> {
        self.map.insert(v, e)
    }

    pub fn remove(&mut self, v: &Variable) -> Option<DataExpr> {
        self.map.remove(v)
    }

    pub fn get(&self, v: &Variable) -> Option<&DataExpr> {
        self.map.get(v)
    }

    pub fn contains(&self, v: &Variable) -> bool {
        self.map.contains_key(v)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &DataExpr)> {
        self.map.iter()
    }

    /// Free variables of the right-hand sides.
    pub fn range_variables(&self) -> BTreeSet<Variable> {
        self.map.values().flat_map(|e| e.free_variables()).collect()
    }
}

impl FromIterator<(Variable, DataExpr)> for Substitution {
    fn from_iter<T: IntoIterator<Item = (Variable, DataExpr)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

impl Display for Substitution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, (v, e)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} := {}", v, e)?;
        }
        write!(f, "]")
    }
}
