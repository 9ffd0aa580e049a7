//! Detection of control flow parameters.
//!
//! A parameter is a control flow parameter if every call passes it either a
//! constant, or the same parameter of the caller (which is itself a control
//! flow parameter, and sits at the same position when the call is recursive).
//! All flags start out `true` and are only ever switched to `false`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use log::{debug, info};

use crate::data::Variable;
use crate::error::{Error, Result};
use crate::pbes::PropVarInst;
use crate::pfnf::{PfnfEquation, PfnfPbes};

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ControlFlowParameters {
    flags: BTreeMap<String, Vec<bool>>,
    parameters: BTreeMap<String, Vec<Variable>>,
}

impl ControlFlowParameters {
    /// Runs both passes. The actual parameters of `p` are expected to have the
    /// implication sources substituted already.
    pub fn compute(p: &PfnfPbes, max_iterations: Option<usize>) -> Result<Self> {
        let mut result = Self::pass_one(p)?;
        result.pass_two(p, max_iterations)?;
        info!(
            "found {} control flow parameters out of {}",
            result.count(),
            result.flags.values().map(Vec::len).sum::<usize>()
        );
        Ok(result)
    }

    /// All flags `true`.
    pub fn new(p: &PfnfPbes) -> Self {
        let mut flags = BTreeMap::new();
        let mut parameters = BTreeMap::new();
        for eqn in &p.equations {
            flags.insert(eqn.name().to_string(), vec![true; eqn.parameters().len()]);
            parameters.insert(eqn.name().to_string(), eqn.parameters().to_vec());
        }
        Self { flags, parameters }
    }

    /// First pass: a position of a callee that receives two different
    /// parameters of callers is not a control flow parameter.
    pub fn pass_one(p: &PfnfPbes) -> Result<Self> {
        let mut result = Self::new(p);
        let mut seen: BTreeMap<(&str, usize), &Variable> = BTreeMap::new();

        for eqn in &p.equations {
            for x in targets(eqn) {
                let callee = result.flags_mut(&x.name)?;
                for (index, q) in x.parameters.iter().enumerate() {
                    let Some(v) = q.as_variable() else {
                        continue;
                    };
                    if eqn.parameter_index(v).is_none() {
                        continue;
                    }
                    match seen.get(&(x.name.as_str(), index)) {
                        None => {
                            seen.insert((x.name.as_str(), index), v);
                        }
                        Some(&w) if w != v => {
                            if callee[index] {
                                debug!(
                                    "pass 1: ({}, {}) -> false because of equation {}: receives {} and {}",
                                    x.name, index, eqn.name(), w, v
                                );
                            }
                            callee[index] = false;
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(result)
    }

    /// Second pass: propagates `false` flags until nothing changes.
    /// Returns the number of flags switched off.
    pub fn pass_two(&mut self, p: &PfnfPbes, max_iterations: Option<usize>) -> Result<usize> {
        let mut todo: BTreeSet<&str> = p.equations.iter().map(|eqn| eqn.name()).collect();
        let mut flips = 0;
        let mut iterations = 0;

        while let Some(name) = todo.pop_first() {
            iterations += 1;
            if let Some(limit) = max_iterations {
                if iterations > limit {
                    return Err(Error::IterationLimit {
                        pass: "control flow parameters",
                        limit,
                    });
                }
            }

            let eqn = p.find(name)?;
            let caller = self.flags_of(name)?.to_vec();
            for x in targets(eqn) {
                let callee_is_caller = x.name == eqn.name();
                let callee = self.flags_mut(&x.name)?;
                for (index, q) in x.parameters.iter().enumerate() {
                    if q.is_constant() {
                        continue;
                    }
                    let reason = match q.as_variable().map(|v| (v, eqn.parameter_index(v))) {
                        None => Some("non-constant expression"),
                        Some((_, None)) => Some("not a parameter of the caller"),
                        Some((_, Some(m))) if callee_is_caller && m != index => Some("recursion at another position"),
                        Some((_, Some(m))) if !caller[m] => Some("caller parameter is data"),
                        Some(_) => None,
                    };
                    if let Some(reason) = reason {
                        if callee[index] {
                            callee[index] = false;
                            flips += 1;
                            debug!(
                                "pass 2: ({}, {}) -> false because of equation {} = ... {}: {}",
                                x.name, index, eqn.name(), x, reason
                            );
                            if let Some(y) = p.equation(&x.name) {
                                todo.insert(y.name());
                            }
                        }
                    }
                }
            }
        }

        debug!("pass 2 converged after {} iterations, {} flags switched off", iterations, flips);
        Ok(flips)
    }

    fn flags_of(&self, name: &str) -> Result<&[bool]> {
        self.flags
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownEquation { name: name.to_string() })
    }

    fn flags_mut(&mut self, name: &str) -> Result<&mut Vec<bool>> {
        self.flags
            .get_mut(name)
            .ok_or_else(|| Error::UnknownEquation { name: name.to_string() })
    }

    /// The flags of equation `name`, one per parameter.
    pub fn flags(&self, name: &str) -> Option<&[bool]> {
        self.flags.get(name).map(Vec::as_slice)
    }

    pub fn is_control_flow(&self, name: &str, index: usize) -> bool {
        self.flags(name).and_then(|b| b.get(index)).copied().unwrap_or(false)
    }

    /// Keeps only the actual parameters at control flow positions.
    pub fn project(&self, x: &PropVarInst) -> Result<PropVarInst> {
        let flags = self.flags_of(&x.name)?;
        if flags.len() != x.parameters.len() {
            return Err(Error::ArityMismatch {
                name: x.name.clone(),
                expected: flags.len(),
                found: x.parameters.len(),
            });
        }
        let parameters = x
            .parameters
            .iter()
            .zip(flags)
            .filter(|(_, b)| **b)
            .map(|(e, _)| e.clone())
            .collect();
        Ok(PropVarInst::new(x.name.clone(), parameters))
    }

    /// The control flow parameters of equation `name`, in order.
    pub fn project_variables(&self, name: &str) -> Result<Vec<Variable>> {
        let flags = self.flags_of(name)?;
        let parameters = &self.parameters[name];
        Ok(parameters
            .iter()
            .zip(flags)
            .filter(|(_, b)| **b)
            .map(|(d, _)| d.clone())
            .collect())
    }

    /// Total number of control flow parameters.
    pub fn count(&self) -> usize {
        self.flags.values().flatten().filter(|&&b| b).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[bool])> {
        self.flags.iter().map(|(name, b)| (name.as_str(), b.as_slice()))
    }
}

fn targets(eqn: &PfnfEquation) -> impl Iterator<Item = &PropVarInst> {
    eqn.implications.iter().flat_map(|imp| imp.variables.iter())
}

impl Display for ControlFlowParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- control flow parameters ---")?;
        for (name, flags) in &self.flags {
            write!(f, "{}", name)?;
            for (d, &b) in self.parameters[name].iter().zip(flags) {
                if b {
                    write!(f, " {}", d)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::data::{DataExpr, Sort};
    use crate::pbes::{FixpointSymbol, Pbes, PbesEquation, PbesExpr, PropositionalVariable};

    fn var(name: &str) -> Variable {
        Variable::new(name, Sort::Nat)
    }

    fn pfnf(equations: Vec<PbesEquation>, init: PropVarInst) -> PfnfPbes {
        PfnfPbes::new(&Pbes::new(equations, init)).unwrap()
    }

    #[test]
    fn test_constants_and_identity_are_control_flow() {
        // X(s, n) = (val(s == 0) => X(1, n + 1)) && (val(s == 1) => X(0, n))
        let s = var("s");
        let n = var("n");
        let formula = PbesExpr::and(
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(DataExpr::from(&s), DataExpr::int(0))),
                PbesExpr::propvar("X", vec![DataExpr::int(1), DataExpr::add(DataExpr::from(&n), DataExpr::int(1))]),
            ),
            PbesExpr::imp(
                PbesExpr::val(DataExpr::eq(DataExpr::from(&s), DataExpr::int(1))),
                PbesExpr::propvar("X", vec![DataExpr::int(0), DataExpr::from(&n)]),
            ),
        );
        let eqn = PbesEquation::new(FixpointSymbol::Nu, PropositionalVariable::new("X", vec![s, n]), formula);
        let p = pfnf(vec![eqn], PropVarInst::new("X", vec![DataExpr::int(0), DataExpr::int(0)]));
        let cf = ControlFlowParameters::compute(&p, None).unwrap();
        assert_eq!(cf.flags("X"), Some(&[true, false][..]));
        assert_eq!(cf.count(), 1);
        assert_eq!(
            cf.project(&PropVarInst::new("X", vec![DataExpr::int(1), DataExpr::int(7)])).unwrap(),
            PropVarInst::new("X", vec![DataExpr::int(1)])
        );
        assert_eq!(cf.project_variables("X").unwrap(), vec![var("s")]);
    }

    #[test]
    fn test_swapped_recursion_is_data() {
        // X(a, b) = X(b, a)
        let a = var("a");
        let b = var("b");
        let eqn = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("X", vec![a.clone(), b.clone()]),
            PbesExpr::propvar("X", vec![DataExpr::from(&b), DataExpr::from(&a)]),
        );
        let p = pfnf(vec![eqn], PropVarInst::new("X", vec![DataExpr::int(0), DataExpr::int(1)]));
        let cf = ControlFlowParameters::compute(&p, None).unwrap();
        assert_eq!(cf.flags("X"), Some(&[false, false][..]));
    }

    #[test]
    fn test_data_propagates_through_calls() {
        // X(a) = Y(a) && Y(0);  Y(c) = Z(c);  Z(e) = X(e + 1)
        let a = var("a");
        let c = var("c");
        let e = var("e");
        let x = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("X", vec![a.clone()]),
            PbesExpr::and(
                PbesExpr::propvar("Y", vec![DataExpr::from(&a)]),
                PbesExpr::propvar("Y", vec![DataExpr::int(0)]),
            ),
        );
        let y = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("Y", vec![c.clone()]),
            PbesExpr::propvar("Z", vec![DataExpr::from(&c)]),
        );
        let z = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("Z", vec![e.clone()]),
            PbesExpr::propvar("X", vec![DataExpr::add(DataExpr::from(&e), DataExpr::int(1))]),
        );
        let p = pfnf(vec![x, y, z], PropVarInst::new("X", vec![DataExpr::int(0)]));

        let first = ControlFlowParameters::pass_one(&p).unwrap();
        assert_eq!(first.count(), 3);
        let mut second = first.clone();
        let flips = second.pass_two(&p, None).unwrap();
        assert_eq!(flips, 3);
        assert_eq!(second.count(), 0);
        assert!(second.to_string().contains("X\n"));
    }

    #[test]
    fn test_iteration_limit() {
        let a = var("a");
        let eqn = PbesEquation::new(
            FixpointSymbol::Nu,
            PropositionalVariable::new("X", vec![a.clone()]),
            PbesExpr::propvar("X", vec![DataExpr::add(DataExpr::from(&a), DataExpr::int(1))]),
        );
        let p = pfnf(vec![eqn], PropVarInst::new("X", vec![DataExpr::int(0)]));
        let result = ControlFlowParameters::compute(&p, Some(1));
        assert!(matches!(result, Err(Error::IterationLimit { limit: 1, .. })));
    }
}
