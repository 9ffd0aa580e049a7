use std::collections::BTreeSet;

use test_log::test;

use pbes_bisim::branching::BranchingSplitter;
use pbes_bisim::compare::compare;
use pbes_bisim::lts::{LabelledTransitions, Lts};
use pbes_bisim::partition::{PartitionStack, StrongSplitter};
use pbes_bisim::reduce::{reduce, Equivalence, ReductionDriver, ReductionOptions};
use pbes_bisim::transition_index::TransitionIndex;

fn strong() -> ReductionOptions {
    ReductionOptions::new(Equivalence::Strong)
}

fn branching() -> ReductionOptions {
    ReductionOptions::new(Equivalence::Branching)
}

/// Deterministic pseudo random systems.
fn random_lts(seed: u64, num_states: usize, num_transitions: usize) -> Lts {
    let mut state = seed;
    let mut next = move |bound: usize| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as usize) % bound
    };
    let labels = ["tau", "a", "b"];
    let mut lts = Lts::new(num_states, 0).unwrap();
    for _ in 0..num_transitions {
        let from = next(num_states);
        let label = lts.add_label(labels[next(labels.len())]);
        let to = next(num_states);
        lts.add_transition(from, label, to).unwrap();
    }
    lts
}

#[test]
fn test_self_loop_and_its_source() {
    // Both states can do `a` forever, so they are strongly bisimilar.
    let lts = Lts::from_transitions(2, 0, [(0, "a", 1), (1, "a", 1)]).unwrap();
    let r = reduce(&lts, &strong()).unwrap();
    assert_eq!(r.lts.num_states(), 1);
    assert_eq!(r.lts.named_transitions(), BTreeSet::from([(0, "a", 0)]));
}

#[test]
fn test_single_step() {
    let lts = Lts::from_transitions(2, 0, [(0, "a", 1)]).unwrap();
    let r = reduce(&lts, &strong()).unwrap();
    assert_eq!(r.lts.num_states(), 2);
    assert_ne!(r.classes.class(0), r.classes.class(1));
    assert_eq!(r.lts.initial_state(), r.classes.class(0));
}

#[test]
fn test_tau_to_deadlock() {
    let lts = Lts::from_transitions(2, 0, [(0, "tau", 1)]).unwrap();

    let r = reduce(&lts, &branching()).unwrap();
    assert_eq!(r.lts.num_states(), 1);
    assert_eq!(r.lts.num_transitions(), 0);

    let r = reduce(&lts, &strong()).unwrap();
    assert_eq!(r.lts.num_states(), 2);
    assert_eq!(r.stats.non_tau_transitions, 0);
}

#[test]
fn test_branching_is_coarser_than_strong() {
    for seed in 0..20 {
        let lts = random_lts(seed, 12, 24);
        let s = reduce(&lts, &strong()).unwrap();
        let b = reduce(&lts, &branching()).unwrap();
        assert!(b.lts.num_states() <= s.lts.num_states(), "seed {}", seed);
        // states in one strong class are in one branching class
        for x in 0..lts.num_states() {
            for y in 0..lts.num_states() {
                if s.classes.class(x) == s.classes.class(y) {
                    assert_eq!(b.classes.class(x), b.classes.class(y), "seed {}", seed);
                }
            }
        }
    }
}

#[test]
fn test_reduction_is_idempotent() {
    for seed in 0..20 {
        let lts = random_lts(seed, 10, 20);
        for options in [strong(), branching()] {
            let once = reduce(&lts, &options).unwrap();
            let twice = reduce(&once.lts, &options).unwrap();
            assert_eq!(twice.lts.num_states(), once.lts.num_states(), "seed {}", seed);
            assert_eq!(
                twice.lts.num_transitions(),
                once.lts.num_transitions(),
                "seed {}",
                seed
            );
        }
    }
}

#[test]
fn test_stable_partition_has_no_splits() {
    for seed in 0..20 {
        let lts = random_lts(seed, 10, 20);
        let r = reduce(&lts, &strong()).unwrap();
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        let partition = PartitionStack::from_classes(&r.classes.class_of);
        let mut driver = ReductionDriver::with_partition(&index, StrongSplitter, partition);
        driver.run().unwrap();
        assert_eq!(driver.stats().splits, 0, "seed {}", seed);
    }
}

#[test]
fn test_partition_invariant_after_every_split() {
    for seed in 0..10 {
        let lts = random_lts(seed, 15, 30);
        let index = TransitionIndex::new(&lts, &[]).unwrap();
        let mut driver = ReductionDriver::new(&index, BranchingSplitter::new());
        let mut checks = 0;
        driver
            .run_until(|p| {
                assert!(p.check_invariants(), "seed {}", seed);
                checks += 1;
                false
            })
            .unwrap();
        assert_eq!(checks, driver.stats().splits);
        assert!(driver.partition().check_invariants());
    }
}

#[test]
fn test_split_keeps_states() {
    let mut p = PartitionStack::new(8);
    let marked = [1, 2, 6];
    for s in marked {
        p.set_mark(s);
    }
    let boundary = p.split(0).unwrap();
    let states = p.states(0);
    assert!(states[..boundary].iter().all(|s| marked.contains(s)));
    assert!(states[boundary..].iter().all(|s| !marked.contains(s)));
    let all: BTreeSet<usize> = states.iter().copied().collect();
    assert_eq!(all, (0..8).collect());
}

#[test]
fn test_compare_with_reduction() {
    for seed in 0..10 {
        let lts = random_lts(seed, 10, 20);
        for options in [strong(), branching()] {
            let r = reduce(&lts, &options).unwrap();
            let c = compare(&lts, &r.lts, &options).unwrap();
            assert!(c.bisimilar, "seed {}", seed);
        }
    }
}

#[test]
fn test_compare_witness() {
    // a.(b + c) versus a.b + a.c
    let l1 = Lts::from_transitions(4, 0, [(0, "a", 1), (1, "b", 2), (1, "c", 3)]).unwrap();
    let l2 = Lts::from_transitions(5, 0, [(0, "a", 1), (0, "a", 2), (1, "b", 3), (2, "c", 4)]).unwrap();
    let c = compare(&l1, &l2, &strong()).unwrap();
    assert!(!c.bisimilar);
    let witness = c.witness.unwrap();
    assert_eq!(witness.trace.first().map(String::as_str), Some("a"));
    let (p, q) = witness.distinguished;
    assert!(p < l1.num_states());
    assert!(q < l2.num_states());
}

#[test]
fn test_compare_hidden_actions() {
    let l1 = Lts::from_transitions(3, 0, [(0, "log(1)", 1), (1, "a", 2)]).unwrap();
    let l2 = Lts::from_transitions(2, 0, [(0, "a", 1)]).unwrap();
    let options = ReductionOptions {
        tau_actions: vec!["log".to_string()],
        ..branching()
    };
    assert!(compare(&l1, &l2, &options).unwrap().bisimilar);
    assert!(!compare(&l1, &l2, &branching()).unwrap().bisimilar);
}
