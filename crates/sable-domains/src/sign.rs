use std::fmt;

use sable_analysis::NonRelationalDomain;
use sable_ir::{BinaryOp, CodeLocation, Constant, UnaryOp};
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice, Satisfiability};

/// The sign abstraction of integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Bottom,
    Negative,
    Zero,
    Positive,
    Top,
}

impl Sign {
    pub fn of(value: i64) -> Self {
        match value.cmp(&0) {
            std::cmp::Ordering::Less => Sign::Negative,
            std::cmp::Ordering::Equal => Sign::Zero,
            std::cmp::Ordering::Greater => Sign::Positive,
        }
    }

    fn negated(self) -> Self {
        match self {
            Sign::Negative => Sign::Positive,
            Sign::Positive => Sign::Negative,
            other => other,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Sign::Bottom => "⊥",
            Sign::Negative => "-",
            Sign::Zero => "0",
            Sign::Positive => "+",
            Sign::Top => "⊤",
        };
        f.write_str(text)
    }
}

impl Lattice for Sign {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Sign::Bottom, x) | (x, Sign::Bottom) => *x,
            (a, b) if a == b => *a,
            _ => Sign::Top,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Sign::Top, x) | (x, Sign::Top) => *x,
            (a, b) if a == b => *a,
            _ => Sign::Bottom,
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        matches!((self, other), (Sign::Bottom, _) | (_, Sign::Top)) || self == other
    }
}

impl HasBottom for Sign {
    fn bottom() -> Self {
        Sign::Bottom
    }
}

impl HasTop for Sign {
    fn top() -> Self {
        Sign::Top
    }
}

impl AbstractDomain for Sign {
    // Finite height: join terminates ascending chains.
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

impl NonRelationalDomain for Sign {
    fn eval_constant(constant: &Constant, _pp: CodeLocation) -> Self {
        match constant {
            Constant::Int(v) => Sign::of(*v),
            _ => Sign::Top,
        }
    }

    fn eval_unary(op: UnaryOp, arg: &Self, _pp: CodeLocation) -> Self {
        match op {
            UnaryOp::Neg => arg.negated(),
            UnaryOp::Not => Sign::Top,
        }
    }

    fn eval_binary(op: BinaryOp, left: &Self, right: &Self, pp: CodeLocation) -> Self {
        use Sign::*;
        if left.is_bottom() || right.is_bottom() {
            return Bottom;
        }
        match op {
            BinaryOp::Add => match (left, right) {
                (Positive, Positive) | (Positive, Zero) | (Zero, Positive) => Positive,
                (Negative, Negative) | (Negative, Zero) | (Zero, Negative) => Negative,
                (Zero, Zero) => Zero,
                _ => Top,
            },
            BinaryOp::Sub => Self::eval_binary(BinaryOp::Add, left, &right.negated(), pp),
            BinaryOp::Mul => match (left, right) {
                (Zero, _) | (_, Zero) => Zero,
                (Positive, Positive) | (Negative, Negative) => Positive,
                (Positive, Negative) | (Negative, Positive) => Negative,
                _ => Top,
            },
            BinaryOp::Div => match (left, right) {
                // Integer division truncates toward zero, so only a zero
                // dividend keeps a definite sign.
                (Zero, _) => Zero,
                _ => Top,
            },
            _ => Top,
        }
    }

    fn satisfies_binary(op: BinaryOp, left: &Self, right: &Self) -> Satisfiability {
        use Sign::*;
        if left.is_bottom() || right.is_bottom() {
            return Satisfiability::Bottom;
        }
        match op {
            BinaryOp::Eq => match (left, right) {
                (Zero, Zero) => Satisfiability::Satisfied,
                (Negative, Zero) | (Zero, Negative) | (Positive, Zero) | (Zero, Positive)
                | (Negative, Positive) | (Positive, Negative) => Satisfiability::NotSatisfied,
                _ => Satisfiability::Unknown,
            },
            BinaryOp::Ne => Self::satisfies_binary(BinaryOp::Eq, left, right).negate(),
            BinaryOp::Lt => match (left, right) {
                (Negative, Zero) | (Negative, Positive) | (Zero, Positive) => {
                    Satisfiability::Satisfied
                }
                (Zero, Zero) | (Zero, Negative) | (Positive, Negative) | (Positive, Zero) => {
                    Satisfiability::NotSatisfied
                }
                _ => Satisfiability::Unknown,
            },
            BinaryOp::Ge => Self::satisfies_binary(BinaryOp::Lt, left, right).negate(),
            BinaryOp::Gt => Self::satisfies_binary(BinaryOp::Lt, right, left),
            BinaryOp::Le => Self::satisfies_binary(BinaryOp::Gt, left, right).negate(),
            _ => Satisfiability::Unknown,
        }
    }

    fn assume_binary(op: BinaryOp, value: &Self, bound: &Self, _pp: CodeLocation) -> Self {
        use Sign::*;
        // Upper bound on the signs compatible with `value ⟨op⟩ bound`.
        let compatible = match (op, bound) {
            (BinaryOp::Eq, b) => *b,
            (BinaryOp::Lt, Negative | Zero) => Negative,
            (BinaryOp::Le, Negative) => Negative,
            (BinaryOp::Gt, Positive | Zero) => Positive,
            (BinaryOp::Ge, Positive) => Positive,
            _ => Top,
        };
        value.meet(&compatible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_test_utils::lattice::{assert_finite_lattice_laws, assert_widening_laws};

    const PP: CodeLocation = CodeLocation::UNKNOWN;

    fn all() -> Vec<Sign> {
        vec![Sign::Bottom, Sign::Negative, Sign::Zero, Sign::Positive, Sign::Top]
    }

    #[test]
    fn lattice_laws() {
        assert_finite_lattice_laws(&all());
        assert_widening_laws(&all());
    }

    #[test]
    fn arithmetic_rules() {
        assert_eq!(
            Sign::eval_binary(BinaryOp::Add, &Sign::Positive, &Sign::Positive, PP),
            Sign::Positive
        );
        assert_eq!(
            Sign::eval_binary(BinaryOp::Add, &Sign::Positive, &Sign::Negative, PP),
            Sign::Top
        );
        assert_eq!(
            Sign::eval_binary(BinaryOp::Mul, &Sign::Negative, &Sign::Negative, PP),
            Sign::Positive
        );
        assert_eq!(
            Sign::eval_binary(BinaryOp::Mul, &Sign::Zero, &Sign::Top, PP),
            Sign::Zero
        );
        assert_eq!(Sign::eval_unary(UnaryOp::Neg, &Sign::Positive, PP), Sign::Negative);
    }

    #[test]
    fn guards_refine_signs() {
        // x > 0 pins an unknown x to positive.
        assert_eq!(
            Sign::assume_binary(BinaryOp::Gt, &Sign::Top, &Sign::Zero, PP),
            Sign::Positive
        );
        // x >= positive-bound keeps x positive.
        assert_eq!(
            Sign::assume_binary(BinaryOp::Ge, &Sign::Positive, &Sign::Positive, PP),
            Sign::Positive
        );
        // x < 0 on a positive x is a contradiction.
        assert_eq!(
            Sign::assume_binary(BinaryOp::Lt, &Sign::Positive, &Sign::Zero, PP),
            Sign::Bottom
        );
    }

    #[test]
    fn comparisons_between_definite_signs() {
        assert_eq!(
            Sign::satisfies_binary(BinaryOp::Lt, &Sign::Negative, &Sign::Positive),
            Satisfiability::Satisfied
        );
        assert_eq!(
            Sign::satisfies_binary(BinaryOp::Lt, &Sign::Positive, &Sign::Positive),
            Satisfiability::Unknown
        );
        assert_eq!(
            Sign::satisfies_binary(BinaryOp::Eq, &Sign::Zero, &Sign::Zero),
            Satisfiability::Satisfied
        );
    }
}
