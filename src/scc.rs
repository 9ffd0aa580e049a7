//! Strongly connected components of the `tau` transitions.
//!
//! States on a `tau` cycle are branching bisimilar, so they are merged before
//! branching reduction. Uses Tarjan's algorithm with an explicit call stack.

use log::debug;

use crate::transition_index::{TransitionIndex, TAU_LABEL};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TauComponents {
    /// Component of every state.
    pub component_of: Vec<usize>,
    pub count: usize,
}

impl TauComponents {
    pub fn compute(index: &TransitionIndex) -> Self {
        let n = index.num_states();
        let mut indices: Vec<Option<usize>> = vec![None; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut component_of = vec![usize::MAX; n];
        let mut count = 0;
        let mut next = 0;

        for root in 0..n {
            if indices[root].is_some() {
                continue;
            }
            // (state, position of the next successor to visit)
            let mut calls = vec![(root, 0)];
            indices[root] = Some(next);
            low[root] = next;
            next += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(&(v, position)) = calls.last() {
                if let Some(&w) = index.successors(TAU_LABEL, v).get(position) {
                    if let Some(top) = calls.last_mut() {
                        top.1 += 1;
                    }
                    match indices[w] {
                        None => {
                            indices[w] = Some(next);
                            low[w] = next;
                            next += 1;
                            stack.push(w);
                            on_stack[w] = true;
                            calls.push((w, 0));
                        }
                        Some(i) if on_stack[w] => low[v] = low[v].min(i),
                        Some(_) => {}
                    }
                    continue;
                }

                calls.pop();
                if Some(low[v]) == indices[v] {
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component_of[w] = count;
                        if w == v {
                            break;
                        }
                    }
                    count += 1;
                }
                if let Some(&(parent, _)) = calls.last() {
                    low[parent] = low[parent].min(low[v]);
                }
            }
        }

        debug!("{} tau components over {} states", count, n);
        Self { component_of, count }
    }

    /// Whether every component is a single state.
    pub fn is_trivial(&self) -> bool {
        self.count == self.component_of.len()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::lts::Lts;

    #[test]
    fn test_tau_cycle() {
        let lts = Lts::from_transitions(
            5,
            0,
            [(0, "tau", 1), (1, "tau", 2), (2, "tau", 0), (2, "a", 3), (3, "tau", 4)],
        )
        .unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        let c = TauComponents::compute(&index);
        assert_eq!(c.count, 3);
        assert_eq!(c.component_of[0], c.component_of[1]);
        assert_eq!(c.component_of[1], c.component_of[2]);
        assert_ne!(c.component_of[3], c.component_of[4]);
        assert!(!c.is_trivial());
    }

    #[test]
    fn test_visible_cycle_is_not_merged() {
        let lts = Lts::from_transitions(2, 0, [(0, "a", 1), (1, "a", 0)]).unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        let c = TauComponents::compute(&index);
        assert_eq!(c.count, 2);
        assert!(c.is_trivial());
    }
}
