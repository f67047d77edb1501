use sable_ir::{
    BinaryOp, CodeLocation, Constant, Expr, Identifier, ScopeToken, TernaryOp, TypeSet, UnaryOp,
};
use sable_lattice::{AbstractDomain, Environment, HasBottom, HasTop, Lattice, Satisfiability};

use crate::{HeapReplacement, SemanticError, SemanticDomain, ValueDomain};

/// A non-relational abstraction of single values.
///
/// Implementors describe how one abstract value flows through constants and
/// operators; [`ValueEnvironment`] lifts that to a full value domain mapping
/// identifiers to elements. Everything defaults to the sound
/// over-approximation, so a minimal domain only provides `eval_constant` and
/// the operators it actually interprets.
pub trait NonRelationalDomain: AbstractDomain {
    fn eval_constant(constant: &Constant, pp: CodeLocation) -> Self;

    /// An arbitrary value of the given types.
    fn eval_push_any(_types: &TypeSet, _pp: CodeLocation) -> Self {
        Self::top()
    }

    fn eval_unary(_op: UnaryOp, _arg: &Self, _pp: CodeLocation) -> Self {
        Self::top()
    }

    fn eval_binary(_op: BinaryOp, _left: &Self, _right: &Self, _pp: CodeLocation) -> Self {
        Self::top()
    }

    fn eval_ternary(
        _op: TernaryOp,
        _first: &Self,
        _second: &Self,
        _third: &Self,
        _pp: CodeLocation,
    ) -> Self {
        Self::top()
    }

    /// Whether `left ⟨op⟩ right` holds for every pair of concrete values the
    /// abstractions denote.
    fn satisfies_binary(_op: BinaryOp, _left: &Self, _right: &Self) -> Satisfiability {
        Satisfiability::Unknown
    }

    /// Refined abstraction of `value` given that `value ⟨op⟩ bound` holds.
    ///
    /// Must return something between `value.meet(...)` and `value`; the
    /// default refines nothing.
    fn assume_binary(_op: BinaryOp, value: &Self, _bound: &Self, _pp: CodeLocation) -> Self {
        value.clone()
    }
}

/// The pointwise lifting of a [`NonRelationalDomain`] to a value domain.
///
/// Evaluation walks value-level expression trees; assignments bottom out the
/// whole environment when the right-hand side is unreachable, and weak
/// identifiers are only ever updated by joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEnvironment<T: Eq>(Environment<Identifier, T>);

impl<T: NonRelationalDomain + Eq> Default for ValueEnvironment<T> {
    fn default() -> Self {
        ValueEnvironment(Environment::new())
    }
}

impl<T: NonRelationalDomain + Eq> ValueEnvironment<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(&self) -> &Environment<Identifier, T> {
        &self.0
    }

    pub fn get_state(&self, id: &Identifier) -> T {
        self.0.get_state(id)
    }

    /// Bind `id` to `value` (strong). Mostly useful to seed entry states.
    pub fn put(&self, id: Identifier, value: T) -> Self {
        ValueEnvironment(self.0.put(id, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &T)> {
        self.0.iter()
    }

    /// Evaluate a value-level expression in this environment.
    pub fn eval(&self, expr: &Expr, pp: CodeLocation) -> Result<T, SemanticError> {
        match expr {
            Expr::Skip => Ok(T::top()),
            Expr::Constant(c) => Ok(T::eval_constant(c, pp)),
            Expr::PushAny(types) => Ok(T::eval_push_any(types, pp)),
            Expr::Ident(id) => Ok(self.0.get_state(id)),
            Expr::Unary { op, expr } => {
                let arg = self.eval(expr, pp)?;
                if arg.is_bottom() {
                    return Ok(T::bottom());
                }
                Ok(T::eval_unary(*op, &arg, pp))
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, pp)?;
                let r = self.eval(right, pp)?;
                if l.is_bottom() || r.is_bottom() {
                    return Ok(T::bottom());
                }
                Ok(T::eval_binary(*op, &l, &r, pp))
            }
            Expr::Ternary {
                op,
                first,
                second,
                third,
            } => {
                let a = self.eval(first, pp)?;
                let b = self.eval(second, pp)?;
                let c = self.eval(third, pp)?;
                if a.is_bottom() || b.is_bottom() || c.is_bottom() {
                    return Ok(T::bottom());
                }
                Ok(T::eval_ternary(*op, &a, &b, &c, pp))
            }
            Expr::HeapAlloc { .. }
            | Expr::HeapRef(_)
            | Expr::HeapDeref(_)
            | Expr::AccessChild { .. } => Err(SemanticError::HeapExpressionInValueDomain {
                expr: expr.to_string(),
            }),
        }
    }

    fn assume_comparison(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        pp: CodeLocation,
    ) -> Result<Self, SemanticError> {
        let lv = self.eval(left, pp)?;
        let rv = self.eval(right, pp)?;
        if lv.is_bottom() || rv.is_bottom() {
            return Ok(ValueEnvironment(Environment::bottom()));
        }
        if T::satisfies_binary(op, &lv, &rv) == Satisfiability::NotSatisfied {
            return Ok(ValueEnvironment(Environment::bottom()));
        }
        let mut env = self.0.clone();
        // Refine only strong identifiers: a weak identifier stands for more
        // than one location, and the guard constrains just the one read.
        if let Some(id) = left.as_identifier().filter(|id| !id.is_weak()) {
            let refined = T::assume_binary(op, &lv, &rv, pp);
            if refined.is_bottom() {
                return Ok(ValueEnvironment(Environment::bottom()));
            }
            env = env.put(id.clone(), refined);
        }
        if let Some(id) = right.as_identifier().filter(|id| !id.is_weak())
            && let Some(mirrored) = op.mirrored()
        {
            let refined = T::assume_binary(mirrored, &rv, &lv, pp);
            if refined.is_bottom() {
                return Ok(ValueEnvironment(Environment::bottom()));
            }
            env = env.put(id.clone(), refined);
        }
        Ok(ValueEnvironment(env))
    }

    fn assume_expr(&self, expr: &Expr, pp: CodeLocation) -> Result<Self, SemanticError> {
        if self.0.is_bottom() {
            return Ok(self.clone());
        }
        match expr {
            Expr::Constant(Constant::Bool(true)) => Ok(self.clone()),
            Expr::Constant(Constant::Bool(false)) => Ok(ValueEnvironment(Environment::bottom())),
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => self.assume_negation(expr, pp),
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => self.assume_expr(left, pp)?.assume_expr(right, pp),
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let l = self.assume_expr(left, pp)?;
                let r = self.assume_expr(right, pp)?;
                Ok(ValueEnvironment(l.0.join(&r.0)))
            }
            Expr::Binary { op, left, right } if op.is_comparison() => {
                self.assume_comparison(*op, left, right, pp)
            }
            other => match self.satisfies(other, pp) {
                Satisfiability::NotSatisfied => Ok(ValueEnvironment(Environment::bottom())),
                _ => Ok(self.clone()),
            },
        }
    }

    fn assume_negation(&self, expr: &Expr, pp: CodeLocation) -> Result<Self, SemanticError> {
        match expr {
            Expr::Constant(Constant::Bool(b)) => {
                self.assume_expr(&Expr::bool(!*b), pp)
            }
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => self.assume_expr(expr, pp),
            Expr::Binary { op, left, right } if op.negated().is_some() => {
                let negated = Expr::Binary {
                    op: op.negated().unwrap_or(*op),
                    left: left.clone(),
                    right: right.clone(),
                };
                self.assume_expr(&negated, pp)
            }
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                // ¬(a ∧ b) = ¬a ∨ ¬b
                let l = self.assume_negation(left, pp)?;
                let r = self.assume_negation(right, pp)?;
                Ok(ValueEnvironment(l.0.join(&r.0)))
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => self.assume_negation(left, pp)?.assume_negation(right, pp),
            _ => Ok(self.clone()),
        }
    }
}

// -- Lattice structure ------------------------------------------------------

impl<T: NonRelationalDomain + Eq> Lattice for ValueEnvironment<T> {
    fn join(&self, other: &Self) -> Self {
        ValueEnvironment(self.0.join(&other.0))
    }

    fn meet(&self, other: &Self) -> Self {
        ValueEnvironment(self.0.meet(&other.0))
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        self.0.is_subseteq(&other.0)
    }
}

impl<T: NonRelationalDomain + Eq> HasBottom for ValueEnvironment<T> {
    fn bottom() -> Self {
        ValueEnvironment(Environment::bottom())
    }

    fn is_bottom(&self) -> bool {
        self.0.is_bottom()
    }
}

impl<T: NonRelationalDomain + Eq> HasTop for ValueEnvironment<T> {
    fn top() -> Self {
        ValueEnvironment(Environment::top())
    }

    fn is_top(&self) -> bool {
        self.0.is_top()
    }
}

impl<T: NonRelationalDomain + Eq> AbstractDomain for ValueEnvironment<T> {
    fn widen(&self, next: &Self) -> Self {
        ValueEnvironment(self.0.widen(&next.0))
    }

    fn narrow(&self, next: &Self) -> Self {
        ValueEnvironment(self.0.narrow(&next.0))
    }
}

// -- Semantic domain --------------------------------------------------------

impl<T: NonRelationalDomain + Eq> SemanticDomain for ValueEnvironment<T> {
    fn assign(
        &self,
        id: &Identifier,
        expr: &Expr,
        pp: CodeLocation,
    ) -> Result<Self, SemanticError> {
        if self.0.is_bottom() {
            return Ok(self.clone());
        }
        let value = self.eval(expr, pp)?;
        if value.is_bottom() {
            return Ok(ValueEnvironment(Environment::bottom()));
        }
        Ok(ValueEnvironment(self.0.put_state(
            id.clone(),
            value,
            id.is_weak(),
        )))
    }

    fn small_step(&self, expr: &Expr, pp: CodeLocation) -> Result<Self, SemanticError> {
        // Evaluation of a value expression has no effect on the environment;
        // it is still performed to reject ill-formed expressions.
        let _ = self.eval(expr, pp)?;
        Ok(self.clone())
    }

    fn assume(
        &self,
        expr: &Expr,
        src: CodeLocation,
        _dest: CodeLocation,
    ) -> Result<Self, SemanticError> {
        self.assume_expr(expr, src)
    }

    fn satisfies(&self, expr: &Expr, pp: CodeLocation) -> Satisfiability {
        if self.0.is_bottom() {
            return Satisfiability::Bottom;
        }
        match expr {
            Expr::Constant(Constant::Bool(b)) => Satisfiability::from_bool(*b),
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => self.satisfies(expr, pp).negate(),
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => self.satisfies(left, pp).and(self.satisfies(right, pp)),
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => self.satisfies(left, pp).or(self.satisfies(right, pp)),
            Expr::Binary { op, left, right } if op.is_comparison() => {
                match (self.eval(left, pp), self.eval(right, pp)) {
                    (Ok(l), Ok(r)) => {
                        if l.is_bottom() || r.is_bottom() {
                            Satisfiability::Bottom
                        } else {
                            T::satisfies_binary(*op, &l, &r)
                        }
                    }
                    _ => Satisfiability::Unknown,
                }
            }
            _ => Satisfiability::Unknown,
        }
    }

    fn forget(&self, id: &Identifier) -> Self {
        ValueEnvironment(self.0.forget(id))
    }

    fn forget_if(&self, pred: &dyn Fn(&Identifier) -> bool) -> Self {
        ValueEnvironment(self.0.forget_if(pred))
    }

    fn push_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(ValueEnvironment(
            self.0.rename_keys(|id| Some(id.push_scope(token))),
        ))
    }

    fn pop_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(ValueEnvironment(
            self.0.rename_keys(|id| id.pop_scope(token)),
        ))
    }
}

impl<T: NonRelationalDomain + Eq> ValueDomain for ValueEnvironment<T> {
    fn apply_replacements(&self, subs: &[HeapReplacement]) -> Result<Self, SemanticError> {
        let mut env = self.0.clone();
        for sub in subs {
            if sub.is_identity() {
                continue;
            }
            // Join of the images of the constrained sources; sources without
            // a binding contribute nothing.
            let mut image: Option<T> = None;
            for source in sub.sources() {
                if let Some(v) = env.get(source) {
                    image = Some(match image {
                        Some(acc) => acc.join(v),
                        None => v.clone(),
                    });
                }
            }
            for source in sub.sources() {
                if !sub.targets().contains(source) {
                    env = env.forget(source);
                }
            }
            if let Some(image) = image {
                for target in sub.targets() {
                    env = env.weak_put(target.clone(), image.clone());
                }
            }
        }
        Ok(ValueEnvironment(env))
    }
}
