//! Assertion helpers for verifying lattice algebraic laws.
//!
//! These check properties over a given set of sample elements and collect all
//! violations into a single report, so you can see every failing law at once
//! rather than fixing them one at a time.

use std::fmt::{Debug, Write};

use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice};

/// Collect violations into a `Vec<String>`, then panic with a combined report
/// if any were found.
fn report(violations: Vec<String>) {
    if violations.is_empty() {
        return;
    }
    let mut msg = format!("{} lattice law violation(s):\n", violations.len());
    for (i, v) in violations.iter().enumerate() {
        let _ = writeln!(msg, "  {}. {}", i + 1, v);
    }
    panic!("{msg}");
}

fn check_join_laws<L: Lattice>(elements: &[L], violations: &mut Vec<String>)
where
    L: Debug,
{
    for a in elements {
        if a.join(a) != *a {
            violations.push(format!("join not idempotent on {a:?}"));
        }
        for b in elements {
            if a.join(b) != b.join(a) {
                violations.push(format!("join not commutative on {a:?}, {b:?}"));
            }
            for c in elements {
                if a.join(b).join(c) != a.join(&b.join(c)) {
                    violations.push(format!("join not associative on {a:?}, {b:?}, {c:?}"));
                }
            }
        }
    }
}

fn check_meet_laws<L: Lattice>(elements: &[L], violations: &mut Vec<String>)
where
    L: Debug,
{
    for a in elements {
        if a.meet(a) != *a {
            violations.push(format!("meet not idempotent on {a:?}"));
        }
        for b in elements {
            if a.meet(b) != b.meet(a) {
                violations.push(format!("meet not commutative on {a:?}, {b:?}"));
            }
            for c in elements {
                if a.meet(b).meet(c) != a.meet(&b.meet(c)) {
                    violations.push(format!("meet not associative on {a:?}, {b:?}, {c:?}"));
                }
            }
        }
    }
}

fn check_partial_order<L: Lattice>(elements: &[L], violations: &mut Vec<String>)
where
    L: Debug,
{
    for a in elements {
        if !a.is_subseteq(a) {
            violations.push(format!("ordering not reflexive on {a:?}"));
        }
        for b in elements {
            if a.is_subseteq(b) && b.is_subseteq(a) && a != b {
                violations.push(format!("ordering not antisymmetric on {a:?}, {b:?}"));
            }
            for c in elements {
                if a.is_subseteq(b) && b.is_subseteq(c) && !a.is_subseteq(c) {
                    violations.push(format!("ordering not transitive on {a:?}, {b:?}, {c:?}"));
                }
            }
        }
    }
}

fn check_bounds<L: Lattice>(elements: &[L], violations: &mut Vec<String>)
where
    L: Debug,
{
    for a in elements {
        for b in elements {
            let j = a.join(b);
            if !a.is_subseteq(&j) || !b.is_subseteq(&j) {
                violations.push(format!("join of {a:?}, {b:?} is not an upper bound"));
            }
            let m = a.meet(b);
            if !m.is_subseteq(a) || !m.is_subseteq(b) {
                violations.push(format!("meet of {a:?}, {b:?} is not a lower bound"));
            }
            for c in elements {
                if a.is_subseteq(c) && b.is_subseteq(c) && !j.is_subseteq(c) {
                    violations.push(format!(
                        "join of {a:?}, {b:?} is not the least upper bound (vs {c:?})"
                    ));
                }
                if c.is_subseteq(a) && c.is_subseteq(b) && !c.is_subseteq(&m) {
                    violations.push(format!(
                        "meet of {a:?}, {b:?} is not the greatest lower bound (vs {c:?})"
                    ));
                }
            }
        }
    }
}

fn check_ordering_consistent<L: Lattice>(elements: &[L], violations: &mut Vec<String>)
where
    L: Debug,
{
    for a in elements {
        for b in elements {
            if a.is_subseteq(b) != (a.join(b) == *b) {
                violations.push(format!("is_subseteq disagrees with join on {a:?}, {b:?}"));
            }
            if a.is_subseteq(b) != (a.meet(b) == *a) {
                violations.push(format!("is_subseteq disagrees with meet on {a:?}, {b:?}"));
            }
        }
    }
}

/// Check that `join` is commutative, associative, and idempotent over the
/// given elements.
pub fn assert_join_laws<L: Lattice + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_join_laws(elements, &mut violations);
    report(violations);
}

/// Check that `meet` is commutative, associative, and idempotent over the
/// given elements.
pub fn assert_meet_laws<L: Lattice + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_meet_laws(elements, &mut violations);
    report(violations);
}

/// Check that `is_subseteq` is a partial order agreeing with `join`/`meet`,
/// and that join/meet are the least/greatest bounds.
pub fn assert_ordering_laws<L: Lattice + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    check_partial_order(elements, &mut violations);
    check_bounds(elements, &mut violations);
    check_ordering_consistent(elements, &mut violations);
    report(violations);
}

/// Check every lattice law plus the bottom/top element laws.
///
/// Bottom and top are added to the sample set automatically.
pub fn assert_finite_lattice_laws<L: AbstractDomain + Debug>(elements: &[L]) {
    let mut all: Vec<L> = elements.to_vec();
    all.push(L::bottom());
    all.push(L::top());

    let mut violations = Vec::new();
    check_join_laws(&all, &mut violations);
    check_meet_laws(&all, &mut violations);
    check_partial_order(&all, &mut violations);
    check_bounds(&all, &mut violations);
    check_ordering_consistent(&all, &mut violations);
    for a in &all {
        if !L::bottom().is_subseteq(a) {
            violations.push(format!("bottom is not below {a:?}"));
        }
        if !a.is_subseteq(&L::top()) {
            violations.push(format!("top is not above {a:?}"));
        }
    }
    report(violations);
}

/// Check widening covers the join: `x ⊔ y ⊑ x ∇ y` for every pair.
pub fn assert_widening_laws<L: AbstractDomain + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    for a in elements {
        for b in elements {
            if !a.join(b).is_subseteq(&a.widen(b)) {
                violations.push(format!("widening of {a:?}, {b:?} does not cover the join"));
            }
        }
    }
    report(violations);
}

/// Check narrowing stays between the meet and the left operand:
/// `x ⊓ y ⊑ x Δ y ⊑ x`.
pub fn assert_narrowing_laws<L: AbstractDomain + Debug>(elements: &[L]) {
    let mut violations = Vec::new();
    for a in elements {
        for b in elements {
            let n = a.narrow(b);
            if !a.meet(b).is_subseteq(&n) || !n.is_subseteq(a) {
                violations.push(format!("narrowing of {a:?}, {b:?} escapes [meet, self]"));
            }
        }
    }
    report(violations);
}

/// Check the widening iteration `aᵢ₊₁ = aᵢ ∇ xᵢ₊₁` over an ascending chain
/// stabilizes within `max_steps` applications.
pub fn assert_widening_terminates<L: AbstractDomain + Debug>(chain: &[L], max_steps: usize) {
    let Some(first) = chain.first() else { return };
    let mut acc = first.clone();
    let mut steps = 0;
    for x in &chain[1..] {
        let next = acc.widen(x);
        if next == acc {
            continue;
        }
        steps += 1;
        assert!(
            steps <= max_steps,
            "widening chain did not stabilize within {max_steps} steps (at {next:?})"
        );
        acc = next;
    }
    // The accumulated value must cover the whole chain.
    for x in chain {
        assert!(
            x.is_subseteq(&acc),
            "widening result {acc:?} does not cover chain element {x:?}"
        );
    }
}
