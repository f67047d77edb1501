use std::cmp::Ordering;
use std::fmt;

use sable_analysis::NonRelationalDomain;
use sable_ir::{BinaryOp, CodeLocation, Constant, UnaryOp};
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice, Satisfiability};

/// One end of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    NegInf,
    Finite(i64),
    PosInf,
}

impl Bound {
    fn plus(self, other: Self) -> Self {
        use Bound::*;
        match (self, other) {
            (NegInf, PosInf) | (PosInf, NegInf) => NegInf,
            (NegInf, _) | (_, NegInf) => NegInf,
            (PosInf, _) | (_, PosInf) => PosInf,
            (Finite(a), Finite(b)) => Finite(a.saturating_add(b)),
        }
    }

    fn minus(self, other: Self) -> Self {
        self.plus(other.negated())
    }

    fn times(self, other: Self) -> Self {
        use Bound::*;
        match (self, other) {
            (Finite(0), _) | (_, Finite(0)) => Finite(0),
            (NegInf, NegInf) | (PosInf, PosInf) => PosInf,
            (NegInf, PosInf) | (PosInf, NegInf) => NegInf,
            (NegInf, Finite(b)) | (Finite(b), NegInf) => {
                if b > 0 { NegInf } else { PosInf }
            }
            (PosInf, Finite(b)) | (Finite(b), PosInf) => {
                if b > 0 { PosInf } else { NegInf }
            }
            (Finite(a), Finite(b)) => Finite(a.saturating_mul(b)),
        }
    }

    fn negated(self) -> Self {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::PosInf => Bound::NegInf,
            Bound::Finite(v) => Bound::Finite(v.saturating_neg()),
        }
    }

    fn pred(self) -> Self {
        match self {
            Bound::Finite(v) => Bound::Finite(v.saturating_sub(1)),
            inf => inf,
        }
    }

    fn succ(self) -> Self {
        match self {
            Bound::Finite(v) => Bound::Finite(v.saturating_add(1)),
            inf => inf,
        }
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        use Bound::*;
        match (self, other) {
            (NegInf, NegInf) | (PosInf, PosInf) => Ordering::Equal,
            (NegInf, _) | (_, PosInf) => Ordering::Less,
            (_, NegInf) | (PosInf, _) => Ordering::Greater,
            (Finite(a), Finite(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => f.write_str("-inf"),
            Bound::PosInf => f.write_str("+inf"),
            Bound::Finite(v) => write!(f, "{v}"),
        }
    }
}

/// The classic integer interval domain, `low > high` encoding the empty
/// (bottom) interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntInterval {
    low: Bound,
    high: Bound,
}

impl IntInterval {
    pub fn new(low: i64, high: i64) -> Self {
        IntInterval {
            low: Bound::Finite(low),
            high: Bound::Finite(high),
        }
    }

    pub fn constant(value: i64) -> Self {
        Self::new(value, value)
    }

    pub fn at_least(low: i64) -> Self {
        IntInterval {
            low: Bound::Finite(low),
            high: Bound::PosInf,
        }
    }

    pub fn at_most(high: i64) -> Self {
        IntInterval {
            low: Bound::NegInf,
            high: Bound::Finite(high),
        }
    }

    pub fn low(&self) -> Bound {
        self.low
    }

    pub fn high(&self) -> Bound {
        self.high
    }

    fn empty() -> Self {
        IntInterval {
            low: Bound::PosInf,
            high: Bound::NegInf,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }

    fn of(low: Bound, high: Bound) -> Self {
        if low > high {
            Self::empty()
        } else {
            IntInterval { low, high }
        }
    }

    pub fn as_constant(&self) -> Option<i64> {
        match (self.low, self.high) {
            (Bound::Finite(a), Bound::Finite(b)) if a == b => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for IntInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("⊥")
        } else {
            write!(f, "[{}, {}]", self.low, self.high)
        }
    }
}

impl Lattice for IntInterval {
    fn join(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        IntInterval {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        Self::of(self.low.max(other.low), self.high.min(other.high))
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        if self.is_empty() {
            return true;
        }
        if other.is_empty() {
            return false;
        }
        other.low <= self.low && self.high <= other.high
    }
}

impl HasBottom for IntInterval {
    fn bottom() -> Self {
        Self::empty()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

impl HasTop for IntInterval {
    fn top() -> Self {
        IntInterval {
            low: Bound::NegInf,
            high: Bound::PosInf,
        }
    }
}

impl AbstractDomain for IntInterval {
    /// Unstable bounds jump straight to infinity.
    fn widen(&self, next: &Self) -> Self {
        if self.is_empty() {
            return *next;
        }
        if next.is_empty() {
            return *self;
        }
        let low = if next.low < self.low {
            Bound::NegInf
        } else {
            self.low
        };
        let high = if next.high > self.high {
            Bound::PosInf
        } else {
            self.high
        };
        IntInterval { low, high }
    }

    /// Infinite bounds adopt the refined value; finite ones stay.
    fn narrow(&self, next: &Self) -> Self {
        if self.is_empty() || next.is_empty() {
            return *self;
        }
        let low = match self.low {
            Bound::NegInf => next.low,
            other => other,
        };
        let high = match self.high {
            Bound::PosInf => next.high,
            other => other,
        };
        IntInterval { low, high }
    }
}

impl NonRelationalDomain for IntInterval {
    fn eval_constant(constant: &Constant, _pp: CodeLocation) -> Self {
        match constant {
            Constant::Int(v) => Self::constant(*v),
            _ => Self::top(),
        }
    }

    fn eval_unary(op: UnaryOp, arg: &Self, _pp: CodeLocation) -> Self {
        match op {
            UnaryOp::Neg => {
                if arg.is_empty() {
                    *arg
                } else {
                    IntInterval {
                        low: arg.high.negated(),
                        high: arg.low.negated(),
                    }
                }
            }
            UnaryOp::Not => Self::top(),
        }
    }

    fn eval_binary(op: BinaryOp, left: &Self, right: &Self, pp: CodeLocation) -> Self {
        if left.is_empty() || right.is_empty() {
            return Self::empty();
        }
        match op {
            BinaryOp::Add => IntInterval {
                low: left.low.plus(right.low),
                high: left.high.plus(right.high),
            },
            BinaryOp::Sub => IntInterval {
                low: left.low.minus(right.high),
                high: left.high.minus(right.low),
            },
            BinaryOp::Mul => {
                let corners = [
                    left.low.times(right.low),
                    left.low.times(right.high),
                    left.high.times(right.low),
                    left.high.times(right.high),
                ];
                let low = corners.iter().copied().fold(Bound::PosInf, Bound::min);
                let high = corners.iter().copied().fold(Bound::NegInf, Bound::max);
                IntInterval { low, high }
            }
            op if op.is_comparison() => {
                // Comparisons produce booleans; nothing useful to say here.
                let _ = pp;
                Self::top()
            }
            _ => Self::top(),
        }
    }

    fn satisfies_binary(op: BinaryOp, left: &Self, right: &Self) -> Satisfiability {
        if left.is_empty() || right.is_empty() {
            return Satisfiability::Bottom;
        }
        match op {
            BinaryOp::Eq => match (left.as_constant(), right.as_constant()) {
                (Some(a), Some(b)) if a == b => Satisfiability::Satisfied,
                _ if left.meet(right).is_empty() => Satisfiability::NotSatisfied,
                _ => Satisfiability::Unknown,
            },
            BinaryOp::Ne => Self::satisfies_binary(BinaryOp::Eq, left, right).negate(),
            BinaryOp::Lt => {
                if left.high < right.low {
                    Satisfiability::Satisfied
                } else if left.low >= right.high {
                    Satisfiability::NotSatisfied
                } else {
                    Satisfiability::Unknown
                }
            }
            BinaryOp::Ge => Self::satisfies_binary(BinaryOp::Lt, left, right).negate(),
            BinaryOp::Gt => Self::satisfies_binary(BinaryOp::Lt, right, left),
            BinaryOp::Le => Self::satisfies_binary(BinaryOp::Gt, left, right).negate(),
            _ => Satisfiability::Unknown,
        }
    }

    fn assume_binary(op: BinaryOp, value: &Self, bound: &Self, _pp: CodeLocation) -> Self {
        if value.is_empty() || bound.is_empty() {
            return Self::empty();
        }
        let constraint = match op {
            BinaryOp::Eq => *bound,
            BinaryOp::Lt => IntInterval {
                low: Bound::NegInf,
                high: bound.high.pred(),
            },
            BinaryOp::Le => IntInterval {
                low: Bound::NegInf,
                high: bound.high,
            },
            BinaryOp::Gt => IntInterval {
                low: bound.low.succ(),
                high: Bound::PosInf,
            },
            BinaryOp::Ge => IntInterval {
                low: bound.low,
                high: Bound::PosInf,
            },
            BinaryOp::Ne => match (value.as_constant(), bound.as_constant()) {
                (Some(a), Some(b)) if a == b => Self::empty(),
                _ => Self::top(),
            },
            _ => Self::top(),
        };
        value.meet(&constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_test_utils::lattice::{
        assert_finite_lattice_laws, assert_narrowing_laws, assert_widening_laws,
        assert_widening_terminates,
    };

    const PP: CodeLocation = CodeLocation::UNKNOWN;

    fn samples() -> Vec<IntInterval> {
        vec![
            IntInterval::bottom(),
            IntInterval::constant(0),
            IntInterval::constant(42),
            IntInterval::new(0, 10),
            IntInterval::new(-5, 5),
            IntInterval::new(3, 7),
            IntInterval::at_least(1),
            IntInterval::at_most(-1),
            IntInterval::top(),
        ]
    }

    #[test]
    fn lattice_laws() {
        assert_finite_lattice_laws(&samples());
        assert_widening_laws(&samples());
        assert_narrowing_laws(&samples());
    }

    #[test]
    fn widening_stabilizes_growing_chains() {
        let chain: Vec<IntInterval> = (0..64).map(|i| IntInterval::new(0, i)).collect();
        assert_widening_terminates(&chain, 4);
    }

    #[test]
    fn interval_arithmetic() {
        let a = IntInterval::new(1, 3);
        let b = IntInterval::new(10, 20);
        assert_eq!(
            IntInterval::eval_binary(BinaryOp::Add, &a, &b, PP),
            IntInterval::new(11, 23)
        );
        assert_eq!(
            IntInterval::eval_binary(BinaryOp::Sub, &a, &b, PP),
            IntInterval::new(-19, -7)
        );
        assert_eq!(
            IntInterval::eval_binary(BinaryOp::Mul, &IntInterval::new(-2, 3), &IntInterval::new(4, 5), PP),
            IntInterval::new(-10, 15)
        );
        // Saturating arithmetic keeps infinities sticky.
        assert_eq!(
            IntInterval::eval_binary(BinaryOp::Mul, &IntInterval::at_least(1), &IntInterval::constant(1), PP),
            IntInterval::at_least(1)
        );
    }

    #[test]
    fn guards_clip_intervals() {
        let x = IntInterval::top();
        let bound = IntInterval::constant(1000);
        assert_eq!(
            IntInterval::assume_binary(BinaryOp::Lt, &x, &bound, PP),
            IntInterval::at_most(999)
        );
        assert_eq!(
            IntInterval::assume_binary(BinaryOp::Ge, &x, &bound, PP),
            IntInterval::at_least(1000)
        );
        assert_eq!(
            IntInterval::assume_binary(BinaryOp::Eq, &IntInterval::new(0, 5), &IntInterval::constant(3), PP),
            IntInterval::constant(3)
        );
        assert!(
            IntInterval::assume_binary(BinaryOp::Gt, &IntInterval::at_most(0), &IntInterval::constant(5), PP)
                .is_bottom()
        );
    }

    #[test]
    fn comparisons_on_disjoint_intervals_decide() {
        assert_eq!(
            IntInterval::satisfies_binary(BinaryOp::Lt, &IntInterval::new(0, 4), &IntInterval::new(5, 9)),
            Satisfiability::Satisfied
        );
        assert_eq!(
            IntInterval::satisfies_binary(BinaryOp::Lt, &IntInterval::new(5, 9), &IntInterval::new(0, 4)),
            Satisfiability::NotSatisfied
        );
        assert_eq!(
            IntInterval::satisfies_binary(BinaryOp::Eq, &IntInterval::new(0, 4), &IntInterval::new(2, 3)),
            Satisfiability::Unknown
        );
    }
}
