use std::fmt;

use sable_ir::Expr;
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice};

/// A small, duplicate-free set of symbolic expressions with deterministic
/// (insertion) order.
///
/// This is the type of the pending-expression component of an analysis state
/// and of rewriting results. Cardinality is tiny in practice, so membership
/// is a linear scan.
#[derive(Debug, Clone, Eq)]
pub enum ExprSet {
    Finite(Vec<Expr>),
    Top,
}

impl Default for ExprSet {
    fn default() -> Self {
        ExprSet::Finite(Vec::new())
    }
}

impl ExprSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(expr: Expr) -> Self {
        ExprSet::Finite(vec![expr])
    }

    pub fn insert(&self, expr: Expr) -> Self {
        match self {
            ExprSet::Top => ExprSet::Top,
            ExprSet::Finite(exprs) => {
                if exprs.contains(&expr) {
                    self.clone()
                } else {
                    let mut out = exprs.clone();
                    out.push(expr);
                    ExprSet::Finite(out)
                }
            }
        }
    }

    pub fn contains(&self, expr: &Expr) -> bool {
        match self {
            ExprSet::Top => true,
            ExprSet::Finite(exprs) => exprs.contains(expr),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ExprSet::Top => 0,
            ExprSet::Finite(exprs) => exprs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ExprSet::Finite(exprs) if exprs.is_empty())
    }

    /// Iterate in insertion order; empty for top.
    pub fn iter(&self) -> impl Iterator<Item = &Expr> {
        let exprs = match self {
            ExprSet::Finite(exprs) => Some(exprs),
            ExprSet::Top => None,
        };
        exprs.into_iter().flatten()
    }

    /// The only element, if the set is a singleton.
    pub fn as_singleton(&self) -> Option<&Expr> {
        match self {
            ExprSet::Finite(exprs) if exprs.len() == 1 => exprs.first(),
            _ => None,
        }
    }
}

impl FromIterator<Expr> for ExprSet {
    fn from_iter<I: IntoIterator<Item = Expr>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ExprSet::new(), |acc, e| acc.insert(e))
    }
}

impl PartialEq for ExprSet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExprSet::Top, ExprSet::Top) => true,
            (ExprSet::Finite(a), ExprSet::Finite(b)) => {
                a.len() == b.len() && a.iter().all(|e| b.contains(e))
            }
            _ => false,
        }
    }
}

impl Lattice for ExprSet {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (ExprSet::Top, _) | (_, ExprSet::Top) => ExprSet::Top,
            (a, ExprSet::Finite(b)) => b.iter().fold(a.clone(), |acc, e| acc.insert(e.clone())),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (ExprSet::Top, x) | (x, ExprSet::Top) => x.clone(),
            (ExprSet::Finite(a), b) => {
                ExprSet::Finite(a.iter().filter(|e| b.contains(e)).cloned().collect())
            }
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        match (self, other) {
            (_, ExprSet::Top) => true,
            (ExprSet::Top, _) => false,
            (ExprSet::Finite(a), b) => a.iter().all(|e| b.contains(e)),
        }
    }
}

impl HasBottom for ExprSet {
    fn bottom() -> Self {
        Self::default()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

impl HasTop for ExprSet {
    fn top() -> Self {
        ExprSet::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, ExprSet::Top)
    }
}

impl AbstractDomain for ExprSet {
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

impl fmt::Display for ExprSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprSet::Top => f.write_str("⊤"),
            ExprSet::Finite(exprs) => {
                write!(f, "{{")?;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_is_duplicate_free_and_ordered() {
        let s = ExprSet::new()
            .insert(Expr::var("a"))
            .insert(Expr::int(1))
            .insert(Expr::var("a"));
        assert_eq!(s.len(), 2);
        let order: Vec<String> = s.iter().map(|e| e.to_string()).collect();
        assert_eq!(order, vec!["a", "1"]);
    }

    #[test]
    fn equality_is_order_insensitive() {
        let a = ExprSet::new().insert(Expr::var("a")).insert(Expr::var("b"));
        let b = ExprSet::new().insert(Expr::var("b")).insert(Expr::var("a"));
        assert_eq!(a, b);
        assert!(a.is_subseteq(&a.join(&ExprSet::singleton(Expr::var("c")))));
    }
}
