use std::fmt;

use crate::{CodeLocation, Identifier, ScopeToken, StaticType, TypeSet, Variable};

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Str(String),
    Unit,
}

impl Constant {
    pub fn static_type(&self) -> StaticType {
        match self {
            Constant::Bool(_) => StaticType::Bool,
            Constant::Int(_) => StaticType::Int,
            Constant::Str(_) => StaticType::Str,
            Constant::Unit => StaticType::Unit,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Unit => f.write_str("()"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical negation.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// The comparison holding exactly when `self` does not.
    pub fn negated(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::Eq => BinaryOp::Ne,
            BinaryOp::Ne => BinaryOp::Eq,
            BinaryOp::Lt => BinaryOp::Ge,
            BinaryOp::Le => BinaryOp::Gt,
            BinaryOp::Gt => BinaryOp::Le,
            BinaryOp::Ge => BinaryOp::Lt,
            _ => return None,
        })
    }

    /// The comparison equivalent to `self` with its operands swapped.
    pub fn mirrored(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::Eq => BinaryOp::Eq,
            BinaryOp::Ne => BinaryOp::Ne,
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TernaryOp {
    /// `first ? second : third`.
    Conditional,
}

/// A symbolic expression: the typed tree statements are made of.
///
/// Expressions are immutable. The heap variants (`HeapAlloc`, `HeapRef`,
/// `HeapDeref`, `AccessChild`) only ever reach the heap domain, which
/// rewrites them into value-level expressions before the value and type
/// domains evaluate anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// No-op placeholder.
    Skip,
    Constant(Constant),
    /// An arbitrary value of the given types (a nondeterministic input).
    PushAny(TypeSet),
    Ident(Identifier),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        op: TernaryOp,
        first: Box<Expr>,
        second: Box<Expr>,
        third: Box<Expr>,
    },
    /// Allocation of a fresh region at a program point.
    HeapAlloc {
        types: TypeSet,
        location: CodeLocation,
    },
    /// The address of the region the inner expression evaluates to.
    HeapRef(Box<Expr>),
    /// The region an address points to.
    HeapDeref(Box<Expr>),
    /// A member of a region (field, element).
    AccessChild {
        receiver: Box<Expr>,
        child: Box<Expr>,
    },
}

impl Expr {
    // -- Constructors -------------------------------------------------------

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Ident(Identifier::Variable(Variable::new(name)))
    }

    pub fn int(value: i64) -> Self {
        Expr::Constant(Constant::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Constant(Constant::Bool(value))
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn ternary(op: TernaryOp, first: Expr, second: Expr, third: Expr) -> Self {
        Expr::Ternary {
            op,
            first: Box::new(first),
            second: Box::new(second),
            third: Box::new(third),
        }
    }

    /// `new T` in a source language: a fresh region and its address.
    pub fn alloc(types: TypeSet, location: CodeLocation) -> Self {
        Expr::HeapRef(Box::new(Expr::HeapAlloc { types, location }))
    }

    /// `x.f` in a source language: dereference then member access.
    pub fn field(receiver: Expr, child: Expr) -> Self {
        Expr::AccessChild {
            receiver: Box::new(Expr::HeapDeref(Box::new(receiver))),
            child: Box::new(child),
        }
    }

    pub fn negated(self) -> Self {
        Expr::unary(UnaryOp::Not, self)
    }

    // -- Queries ------------------------------------------------------------

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expr::Ident(id) => Some(id),
            _ => None,
        }
    }

    /// The static type set of this expression.
    ///
    /// Leaves carry their own; compound expressions derive theirs from the
    /// operator.
    pub fn static_types(&self) -> TypeSet {
        match self {
            Expr::Skip => TypeSet::single(StaticType::Unit),
            Expr::Constant(c) => TypeSet::single(c.static_type()),
            Expr::PushAny(types) => types.clone(),
            Expr::Ident(id) => id.types().clone(),
            Expr::Unary { op: UnaryOp::Not, .. } => TypeSet::single(StaticType::Bool),
            Expr::Unary { expr, .. } => expr.static_types(),
            Expr::Binary { op, left, right } => {
                if op.is_comparison() || op.is_logical() {
                    TypeSet::single(StaticType::Bool)
                } else {
                    left.static_types().union(&right.static_types())
                }
            }
            Expr::Ternary { second, third, .. } => {
                second.static_types().union(&third.static_types())
            }
            Expr::HeapAlloc { types, .. } => types.clone(),
            Expr::HeapRef(_) => TypeSet::single(StaticType::Reference),
            Expr::HeapDeref(inner) => inner.static_types(),
            Expr::AccessChild { .. } => TypeSet::untyped(),
        }
    }

    // -- Scoping ------------------------------------------------------------

    /// Rescope every variable in the tree one scope inward.
    pub fn push_scope(&self, token: ScopeToken) -> Self {
        self.map_identifiers(&|id| Some(id.push_scope(token)))
            .expect("push_scope never drops identifiers")
    }

    /// Undo [`Expr::push_scope`]; `None` when any variable in the tree does
    /// not belong to the popped scope.
    pub fn pop_scope(&self, token: ScopeToken) -> Option<Self> {
        self.map_identifiers(&|id| id.pop_scope(token))
    }

    fn map_identifiers(&self, f: &impl Fn(&Identifier) -> Option<Identifier>) -> Option<Self> {
        let mapped = match self {
            Expr::Skip | Expr::Constant(_) | Expr::PushAny(_) | Expr::HeapAlloc { .. } => {
                self.clone()
            }
            Expr::Ident(id) => Expr::Ident(f(id)?),
            Expr::Unary { op, expr } => Expr::unary(*op, expr.map_identifiers(f)?),
            Expr::Binary { op, left, right } => {
                Expr::binary(*op, left.map_identifiers(f)?, right.map_identifiers(f)?)
            }
            Expr::Ternary {
                op,
                first,
                second,
                third,
            } => Expr::ternary(
                *op,
                first.map_identifiers(f)?,
                second.map_identifiers(f)?,
                third.map_identifiers(f)?,
            ),
            Expr::HeapRef(inner) => Expr::HeapRef(Box::new(inner.map_identifiers(f)?)),
            Expr::HeapDeref(inner) => Expr::HeapDeref(Box::new(inner.map_identifiers(f)?)),
            Expr::AccessChild { receiver, child } => Expr::AccessChild {
                receiver: Box::new(receiver.map_identifiers(f)?),
                child: Box::new(child.map_identifiers(f)?),
            },
        };
        Some(mapped)
    }

    /// Substitute `from` with `to` everywhere it occurs as an identifier.
    pub fn replace_identifier(&self, from: &Identifier, to: &Identifier) -> Self {
        self.map_identifiers(&|id| {
            Some(if id == from { to.clone() } else { id.clone() })
        })
        .expect("replacement never drops identifiers")
    }
}

impl From<Identifier> for Expr {
    fn from(id: Identifier) -> Self {
        Expr::Ident(id)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Skip => f.write_str("skip"),
            Expr::Constant(c) => c.fmt(f),
            Expr::PushAny(types) => write!(f, "any{types}"),
            Expr::Ident(id) => id.fmt(f),
            Expr::Unary { op, expr } => {
                let sym = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                write!(f, "{sym}({expr})")
            }
            Expr::Binary { op, left, right } => {
                let sym = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Rem => "%",
                    BinaryOp::Eq => "==",
                    BinaryOp::Ne => "!=",
                    BinaryOp::Lt => "<",
                    BinaryOp::Le => "<=",
                    BinaryOp::Gt => ">",
                    BinaryOp::Ge => ">=",
                    BinaryOp::And => "&&",
                    BinaryOp::Or => "||",
                };
                write!(f, "({left} {sym} {right})")
            }
            Expr::Ternary {
                first,
                second,
                third,
                ..
            } => write!(f, "({first} ? {second} : {third})"),
            Expr::HeapAlloc { types, location } => write!(f, "new {types}@{location}"),
            Expr::HeapRef(inner) => write!(f, "ref({inner})"),
            Expr::HeapDeref(inner) => write!(f, "deref({inner})"),
            Expr::AccessChild { receiver, child } => write!(f, "{receiver}->{child}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trip_on_expression_trees() {
        let token = ScopeToken::new(CodeLocation::line(11));
        let e = Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(4));
        let pushed = e.push_scope(token);
        assert_ne!(e, pushed);
        assert_eq!(pushed.pop_scope(token), Some(e.clone()));
        // Heap allocations are scope-invariant.
        let alloc = Expr::alloc(TypeSet::untyped(), CodeLocation::line(2));
        assert_eq!(alloc.push_scope(token), alloc);
    }

    #[test]
    fn comparison_negation_is_involutive() {
        for op in [
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::Gt,
            BinaryOp::Ge,
        ] {
            assert_eq!(op.negated().and_then(BinaryOp::negated), Some(op));
        }
        assert_eq!(BinaryOp::Add.negated(), None);
    }

    #[test]
    fn static_types_of_compound_expressions() {
        let cmp = Expr::binary(BinaryOp::Lt, Expr::var("x"), Expr::int(10));
        assert_eq!(cmp.static_types(), TypeSet::single(StaticType::Bool));
        let sum = Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2));
        assert_eq!(sum.static_types(), TypeSet::single(StaticType::Int));
        assert_eq!(
            Expr::alloc(TypeSet::untyped(), CodeLocation::line(1)).static_types(),
            TypeSet::single(StaticType::Reference)
        );
    }
}
