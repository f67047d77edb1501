use std::fmt;

use sable_analysis::NonRelationalDomain;
use sable_ir::{BinaryOp, CodeLocation, Constant, UnaryOp};
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice, Satisfiability};

/// Classic constant propagation: a flat lattice over literal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantPropagation {
    Bottom,
    Value(Constant),
    Top,
}

impl ConstantPropagation {
    pub fn int(value: i64) -> Self {
        ConstantPropagation::Value(Constant::Int(value))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstantPropagation::Value(Constant::Int(v)) => Some(*v),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantPropagation::Value(Constant::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    fn from_int(value: Option<i64>) -> Self {
        match value {
            Some(v) => ConstantPropagation::int(v),
            None => ConstantPropagation::Top,
        }
    }
}

impl fmt::Display for ConstantPropagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantPropagation::Bottom => f.write_str("⊥"),
            ConstantPropagation::Value(c) => c.fmt(f),
            ConstantPropagation::Top => f.write_str("⊤"),
        }
    }
}

impl Lattice for ConstantPropagation {
    fn join(&self, other: &Self) -> Self {
        use ConstantPropagation::*;
        match (self, other) {
            (Bottom, x) | (x, Bottom) => x.clone(),
            (Value(a), Value(b)) if a == b => self.clone(),
            _ => Top,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        use ConstantPropagation::*;
        match (self, other) {
            (Top, x) | (x, Top) => x.clone(),
            (Value(a), Value(b)) if a == b => self.clone(),
            _ => Bottom,
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        use ConstantPropagation::*;
        match (self, other) {
            (Bottom, _) | (_, Top) => true,
            (Value(a), Value(b)) => a == b,
            _ => false,
        }
    }
}

impl HasBottom for ConstantPropagation {
    fn bottom() -> Self {
        ConstantPropagation::Bottom
    }
}

impl HasTop for ConstantPropagation {
    fn top() -> Self {
        ConstantPropagation::Top
    }
}

impl AbstractDomain for ConstantPropagation {
    // The lattice has height two: join already terminates every chain.
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

impl NonRelationalDomain for ConstantPropagation {
    fn eval_constant(constant: &Constant, _pp: CodeLocation) -> Self {
        ConstantPropagation::Value(constant.clone())
    }

    fn eval_unary(op: UnaryOp, arg: &Self, _pp: CodeLocation) -> Self {
        match op {
            UnaryOp::Neg => Self::from_int(arg.as_int().and_then(i64::checked_neg)),
            UnaryOp::Not => match arg.as_bool() {
                Some(b) => ConstantPropagation::Value(Constant::Bool(!b)),
                None => ConstantPropagation::Top,
            },
        }
    }

    fn eval_binary(op: BinaryOp, left: &Self, right: &Self, _pp: CodeLocation) -> Self {
        if op.is_comparison() {
            return match compare(op, left, right) {
                Satisfiability::Satisfied => ConstantPropagation::Value(Constant::Bool(true)),
                Satisfiability::NotSatisfied => ConstantPropagation::Value(Constant::Bool(false)),
                _ => ConstantPropagation::Top,
            };
        }
        match op {
            BinaryOp::And | BinaryOp::Or => match (left.as_bool(), right.as_bool()) {
                (Some(a), Some(b)) => {
                    let v = if op == BinaryOp::And { a && b } else { a || b };
                    ConstantPropagation::Value(Constant::Bool(v))
                }
                _ => ConstantPropagation::Top,
            },
            _ => {
                let (Some(a), Some(b)) = (left.as_int(), right.as_int()) else {
                    return ConstantPropagation::Top;
                };
                // Overflow and division by zero soundly degrade to top.
                let out = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Rem => a.checked_rem(b),
                    _ => None,
                };
                Self::from_int(out)
            }
        }
    }

    fn satisfies_binary(op: BinaryOp, left: &Self, right: &Self) -> Satisfiability {
        compare(op, left, right)
    }

    fn assume_binary(op: BinaryOp, value: &Self, bound: &Self, _pp: CodeLocation) -> Self {
        match op {
            // An equality guard pins the value down to the bound.
            BinaryOp::Eq => value.meet(bound),
            _ => match compare(op, value, bound) {
                Satisfiability::NotSatisfied => ConstantPropagation::Bottom,
                _ => value.clone(),
            },
        }
    }
}

fn compare(op: BinaryOp, left: &ConstantPropagation, right: &ConstantPropagation) -> Satisfiability {
    if left.is_bottom() || right.is_bottom() {
        return Satisfiability::Bottom;
    }
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        let holds = match op {
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => return Satisfiability::Unknown,
        };
        return Satisfiability::from_bool(holds);
    }
    if let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) {
        return match op {
            BinaryOp::Eq => Satisfiability::from_bool(a == b),
            BinaryOp::Ne => Satisfiability::from_bool(a != b),
            _ => Satisfiability::Unknown,
        };
    }
    Satisfiability::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_test_utils::lattice::{assert_finite_lattice_laws, assert_widening_laws};

    const PP: CodeLocation = CodeLocation::UNKNOWN;

    fn samples() -> Vec<ConstantPropagation> {
        vec![
            ConstantPropagation::Bottom,
            ConstantPropagation::int(0),
            ConstantPropagation::int(3),
            ConstantPropagation::int(-7),
            ConstantPropagation::Value(Constant::Bool(true)),
            ConstantPropagation::Top,
        ]
    }

    #[test]
    fn lattice_laws() {
        assert_finite_lattice_laws(&samples());
        assert_widening_laws(&samples());
    }

    #[test]
    fn arithmetic_on_known_constants() {
        let three = ConstantPropagation::int(3);
        let four = ConstantPropagation::int(4);
        assert_eq!(
            ConstantPropagation::eval_binary(BinaryOp::Add, &three, &four, PP),
            ConstantPropagation::int(7)
        );
        assert_eq!(
            ConstantPropagation::eval_binary(BinaryOp::Mul, &three, &four, PP),
            ConstantPropagation::int(12)
        );
        assert_eq!(
            ConstantPropagation::eval_binary(BinaryOp::Add, &three, &ConstantPropagation::Top, PP),
            ConstantPropagation::Top
        );
        // Overflow degrades to top instead of wrapping.
        let max = ConstantPropagation::int(i64::MAX);
        assert_eq!(
            ConstantPropagation::eval_binary(BinaryOp::Add, &max, &four, PP),
            ConstantPropagation::Top
        );
        assert_eq!(
            ConstantPropagation::eval_binary(BinaryOp::Div, &three, &ConstantPropagation::int(0), PP),
            ConstantPropagation::Top
        );
    }

    #[test]
    fn comparisons_decide_when_both_sides_are_known() {
        let three = ConstantPropagation::int(3);
        let four = ConstantPropagation::int(4);
        assert_eq!(
            ConstantPropagation::satisfies_binary(BinaryOp::Lt, &three, &four),
            Satisfiability::Satisfied
        );
        assert_eq!(
            ConstantPropagation::satisfies_binary(BinaryOp::Eq, &three, &four),
            Satisfiability::NotSatisfied
        );
        assert_eq!(
            ConstantPropagation::satisfies_binary(BinaryOp::Lt, &three, &ConstantPropagation::Top),
            Satisfiability::Unknown
        );
    }

    #[test]
    fn equality_guards_refine_to_the_bound() {
        let refined = ConstantPropagation::assume_binary(
            BinaryOp::Eq,
            &ConstantPropagation::Top,
            &ConstantPropagation::int(5),
            PP,
        );
        assert_eq!(refined, ConstantPropagation::int(5));
        let contradiction = ConstantPropagation::assume_binary(
            BinaryOp::Lt,
            &ConstantPropagation::int(9),
            &ConstantPropagation::int(5),
            PP,
        );
        assert!(contradiction.is_bottom());
    }
}
