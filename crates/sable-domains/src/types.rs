use std::fmt;

use sable_analysis::NonRelationalDomain;
use sable_ir::{BinaryOp, CodeLocation, Constant, StaticType, TypeSet, UnaryOp};
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice, Satisfiability};

const ALL_TYPES: [StaticType; 7] = [
    StaticType::Bool,
    StaticType::Int,
    StaticType::Float,
    StaticType::Str,
    StaticType::Reference,
    StaticType::Unit,
    StaticType::Untyped,
];

/// Runtime-type inference as a powerset of [`StaticType`].
///
/// The empty set is bottom; the full (finite) universe is top. This fills
/// the type slot of the composite state so value domains can stay
/// type-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInference(TypeSet);

impl TypeInference {
    pub fn of(types: TypeSet) -> Self {
        TypeInference(types)
    }

    pub fn single(ty: StaticType) -> Self {
        TypeInference(TypeSet::single(ty))
    }

    pub fn types(&self) -> &TypeSet {
        &self.0
    }

    fn numeric(&self) -> Self {
        TypeInference(
            self.0
                .iter()
                .filter(|ty| matches!(ty, StaticType::Int | StaticType::Float))
                .collect(),
        )
    }
}

impl fmt::Display for TypeInference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Lattice for TypeInference {
    fn join(&self, other: &Self) -> Self {
        TypeInference(self.0.union(&other.0))
    }

    fn meet(&self, other: &Self) -> Self {
        TypeInference(self.0.intersection(&other.0))
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        self.0.iter().all(|ty| other.0.contains(ty))
    }
}

impl HasBottom for TypeInference {
    fn bottom() -> Self {
        TypeInference(TypeSet::empty())
    }

    fn is_bottom(&self) -> bool {
        self.0.is_empty()
    }
}

impl HasTop for TypeInference {
    fn top() -> Self {
        TypeInference(ALL_TYPES.into_iter().collect())
    }
}

impl AbstractDomain for TypeInference {
    // Finite universe: join terminates ascending chains.
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

impl NonRelationalDomain for TypeInference {
    fn eval_constant(constant: &Constant, _pp: CodeLocation) -> Self {
        Self::single(constant.static_type())
    }

    fn eval_push_any(types: &TypeSet, _pp: CodeLocation) -> Self {
        if types.is_empty() || types.contains(StaticType::Untyped) {
            Self::top()
        } else {
            TypeInference(types.clone())
        }
    }

    fn eval_unary(op: UnaryOp, arg: &Self, _pp: CodeLocation) -> Self {
        match op {
            UnaryOp::Neg => arg.numeric(),
            UnaryOp::Not => Self::single(StaticType::Bool),
        }
    }

    fn eval_binary(op: BinaryOp, left: &Self, right: &Self, _pp: CodeLocation) -> Self {
        if op.is_comparison() || op.is_logical() {
            return Self::single(StaticType::Bool);
        }
        let joined = left.join(right).numeric();
        if joined.is_bottom() {
            // Arithmetic on non-numeric operands: unknown rather than
            // unreachable.
            Self::top()
        } else {
            joined
        }
    }

    fn satisfies_binary(_op: BinaryOp, _left: &Self, _right: &Self) -> Satisfiability {
        Satisfiability::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_test_utils::lattice::assert_finite_lattice_laws;

    const PP: CodeLocation = CodeLocation::UNKNOWN;

    #[test]
    fn lattice_laws() {
        assert_finite_lattice_laws(&[
            TypeInference::bottom(),
            TypeInference::single(StaticType::Int),
            TypeInference::single(StaticType::Bool),
            TypeInference::of([StaticType::Int, StaticType::Float].into_iter().collect()),
            TypeInference::top(),
        ]);
    }

    #[test]
    fn constants_and_operators_infer_types() {
        assert_eq!(
            TypeInference::eval_constant(&Constant::Int(3), PP),
            TypeInference::single(StaticType::Int)
        );
        assert_eq!(
            TypeInference::eval_binary(
                BinaryOp::Lt,
                &TypeInference::single(StaticType::Int),
                &TypeInference::single(StaticType::Int),
                PP
            ),
            TypeInference::single(StaticType::Bool)
        );
        assert_eq!(
            TypeInference::eval_binary(
                BinaryOp::Add,
                &TypeInference::single(StaticType::Int),
                &TypeInference::single(StaticType::Int),
                PP
            ),
            TypeInference::single(StaticType::Int)
        );
    }
}
