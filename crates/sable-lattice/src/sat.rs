use crate::{AbstractDomain, HasBottom, HasTop, Lattice};

/// The answer of a domain to "does this state satisfy this expression?".
///
/// This is itself a four-point lattice: `Bottom` (unreachable, no answer),
/// `Satisfied`, `NotSatisfied`, and `Unknown` on top of both definite
/// answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfiability {
    Bottom,
    Satisfied,
    NotSatisfied,
    Unknown,
}

impl Satisfiability {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Satisfiability::Satisfied
        } else {
            Satisfiability::NotSatisfied
        }
    }

    /// Logical conjunction, lifted to the lattice.
    pub fn and(self, other: Self) -> Self {
        use Satisfiability::*;
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (NotSatisfied, _) | (_, NotSatisfied) => NotSatisfied,
            (Satisfied, Satisfied) => Satisfied,
            _ => Unknown,
        }
    }

    /// Logical disjunction, lifted to the lattice.
    pub fn or(self, other: Self) -> Self {
        use Satisfiability::*;
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (Satisfied, _) | (_, Satisfied) => Satisfied,
            (NotSatisfied, NotSatisfied) => NotSatisfied,
            _ => Unknown,
        }
    }

    pub fn negate(self) -> Self {
        use Satisfiability::*;
        match self {
            Satisfied => NotSatisfied,
            NotSatisfied => Satisfied,
            other => other,
        }
    }
}

impl Lattice for Satisfiability {
    fn join(&self, other: &Self) -> Self {
        use Satisfiability::*;
        match (self, other) {
            (Bottom, x) | (x, Bottom) => *x,
            (a, b) if a == b => *a,
            _ => Unknown,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        use Satisfiability::*;
        match (self, other) {
            (Unknown, x) | (x, Unknown) => *x,
            (a, b) if a == b => *a,
            _ => Bottom,
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        use Satisfiability::*;
        matches!(
            (self, other),
            (Bottom, _) | (_, Unknown) | (Satisfied, Satisfied) | (NotSatisfied, NotSatisfied)
        )
    }
}

impl HasBottom for Satisfiability {
    fn bottom() -> Self {
        Satisfiability::Bottom
    }
}

impl HasTop for Satisfiability {
    fn top() -> Self {
        Satisfiability::Unknown
    }
}

impl AbstractDomain for Satisfiability {
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Satisfiability::*;

    #[test]
    fn conjunction_and_disjunction() {
        assert_eq!(Satisfied.and(Satisfied), Satisfied);
        assert_eq!(Satisfied.and(NotSatisfied), NotSatisfied);
        assert_eq!(Unknown.and(NotSatisfied), NotSatisfied);
        assert_eq!(Unknown.and(Satisfied), Unknown);
        assert_eq!(NotSatisfied.or(Satisfied), Satisfied);
        assert_eq!(NotSatisfied.or(NotSatisfied), NotSatisfied);
        assert_eq!(Unknown.or(NotSatisfied), Unknown);
    }

    #[test]
    fn negation_swaps_definite_answers() {
        assert_eq!(Satisfied.negate(), NotSatisfied);
        assert_eq!(NotSatisfied.negate(), Satisfied);
        assert_eq!(Unknown.negate(), Unknown);
        assert_eq!(Bottom.negate(), Bottom);
    }

    #[test]
    fn four_point_ordering() {
        for x in [Bottom, Satisfied, NotSatisfied, Unknown] {
            assert!(Bottom.is_subseteq(&x));
            assert!(x.is_subseteq(&Unknown));
            assert!(x.is_subseteq(&x));
        }
        assert!(!Satisfied.is_subseteq(&NotSatisfied));
        assert_eq!(Satisfied.join(&NotSatisfied), Unknown);
        assert_eq!(Satisfied.meet(&NotSatisfied), Bottom);
    }
}
