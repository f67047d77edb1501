use sable_ir::{CodeLocation, Expr, Identifier, ScopeToken};
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice, Satisfiability};

use crate::{
    AbstractState, ExprSet, HeapDomain, SemanticDomain, SemanticError, ValueDomain,
};

/// The composite abstract state: one heap, one value and one type domain
/// acting as a single lattice and semantic domain.
///
/// Every transition runs heap first — it may rename identifiers — then
/// threads the heap's replacements into the value and type domains before
/// they evaluate the rewritten expressions, so both always operate on
/// up-to-date identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleState<H, V, T> {
    pub heap: H,
    pub value: V,
    pub types: T,
}

impl<H, V, T> SimpleState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: ValueDomain,
{
    pub fn new(heap: H, value: V, types: T) -> Self {
        SimpleState { heap, value, types }
    }

    /// Run one heap transition, then bring the value and type domains in
    /// sync with its replacements.
    fn after_heap(&self, heap: H) -> Result<(H, V, T), SemanticError> {
        let value = self.value.apply_replacements(heap.replacements())?;
        let types = self.types.apply_replacements(heap.replacements())?;
        Ok((heap, value, types))
    }

    fn fold_join<D: ValueDomain>(
        exprs: &ExprSet,
        original: &Expr,
        mut f: impl FnMut(&Expr) -> Result<D, SemanticError>,
    ) -> Result<D, SemanticError> {
        let mut out: Option<D> = None;
        for e in exprs.iter() {
            let next = f(e)?;
            out = Some(match out {
                Some(acc) => acc.join(&next),
                None => next,
            });
        }
        out.ok_or_else(|| SemanticError::EmptyRewrite {
            expr: original.to_string(),
        })
    }
}

// -- Lattice structure ------------------------------------------------------

impl<H, V, T> Lattice for SimpleState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: ValueDomain,
{
    fn join(&self, other: &Self) -> Self {
        SimpleState {
            heap: self.heap.join(&other.heap),
            value: self.value.join(&other.value),
            types: self.types.join(&other.types),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        SimpleState {
            heap: self.heap.meet(&other.heap),
            value: self.value.meet(&other.value),
            types: self.types.meet(&other.types),
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        self.heap.is_subseteq(&other.heap)
            && self.value.is_subseteq(&other.value)
            && self.types.is_subseteq(&other.types)
    }
}

impl<H, V, T> HasBottom for SimpleState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: ValueDomain,
{
    fn bottom() -> Self {
        SimpleState {
            heap: H::bottom(),
            value: V::bottom(),
            types: T::bottom(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.heap.is_bottom() && self.value.is_bottom() && self.types.is_bottom()
    }
}

impl<H, V, T> HasTop for SimpleState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: ValueDomain,
{
    fn top() -> Self {
        SimpleState {
            heap: H::top(),
            value: V::top(),
            types: T::top(),
        }
    }

    fn is_top(&self) -> bool {
        self.heap.is_top() && self.value.is_top() && self.types.is_top()
    }
}

impl<H, V, T> AbstractDomain for SimpleState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: ValueDomain,
{
    fn widen(&self, next: &Self) -> Self {
        SimpleState {
            heap: self.heap.widen(&next.heap),
            value: self.value.widen(&next.value),
            types: self.types.widen(&next.types),
        }
    }

    fn narrow(&self, next: &Self) -> Self {
        SimpleState {
            heap: self.heap.narrow(&next.heap),
            value: self.value.narrow(&next.value),
            types: self.types.narrow(&next.types),
        }
    }
}

// -- Semantic domain --------------------------------------------------------

impl<H, V, T> SemanticDomain for SimpleState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: ValueDomain,
{
    fn assign(
        &self,
        id: &Identifier,
        expr: &Expr,
        pp: CodeLocation,
    ) -> Result<Self, SemanticError> {
        let (heap, value, types) = self.after_heap(self.heap.assign(id, expr, pp)?)?;
        let rewritten = heap.rewrite(expr, pp)?;
        let value = Self::fold_join(&rewritten, expr, |e| value.assign(id, e, pp))?;
        let types = Self::fold_join(&rewritten, expr, |e| types.assign(id, e, pp))?;
        Ok(SimpleState { heap, value, types })
    }

    fn small_step(&self, expr: &Expr, pp: CodeLocation) -> Result<Self, SemanticError> {
        let (heap, value, types) = self.after_heap(self.heap.small_step(expr, pp)?)?;
        let rewritten = heap.rewrite(expr, pp)?;
        let value = Self::fold_join(&rewritten, expr, |e| value.small_step(e, pp))?;
        let types = Self::fold_join(&rewritten, expr, |e| types.small_step(e, pp))?;
        Ok(SimpleState { heap, value, types })
    }

    fn assume(
        &self,
        expr: &Expr,
        src: CodeLocation,
        dest: CodeLocation,
    ) -> Result<Self, SemanticError> {
        let (heap, value, types) = self.after_heap(self.heap.assume(expr, src, dest)?)?;
        let rewritten = heap.rewrite(expr, src)?;
        let value = Self::fold_join(&rewritten, expr, |e| value.assume(e, src, dest))?;
        let types = Self::fold_join(&rewritten, expr, |e| types.assume(e, src, dest))?;
        Ok(SimpleState { heap, value, types })
    }

    fn satisfies(&self, expr: &Expr, pp: CodeLocation) -> Satisfiability {
        let Ok(rewritten) = self.heap.rewrite(expr, pp) else {
            return Satisfiability::Unknown;
        };
        // Any of the possible readings may hold, so the value-level answers
        // join; the heap's own answer can only sharpen the result.
        let mut value_sat = Satisfiability::Bottom;
        for e in rewritten.iter() {
            value_sat = value_sat.join(&self.value.satisfies(e, pp).meet(&self.types.satisfies(e, pp)));
        }
        self.heap.satisfies(expr, pp).meet(&value_sat)
    }

    fn forget(&self, id: &Identifier) -> Self {
        SimpleState {
            heap: self.heap.forget(id),
            value: self.value.forget(id),
            types: self.types.forget(id),
        }
    }

    fn forget_if(&self, pred: &dyn Fn(&Identifier) -> bool) -> Self {
        SimpleState {
            heap: self.heap.forget_if(pred),
            value: self.value.forget_if(pred),
            types: self.types.forget_if(pred),
        }
    }

    fn push_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(SimpleState {
            heap: self.heap.push_scope(token)?,
            value: self.value.push_scope(token)?,
            types: self.types.push_scope(token)?,
        })
    }

    fn pop_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(SimpleState {
            heap: self.heap.pop_scope(token)?,
            value: self.value.pop_scope(token)?,
            types: self.types.pop_scope(token)?,
        })
    }
}

impl<H, V, T> AbstractState for SimpleState<H, V, T>
where
    H: HeapDomain,
    V: ValueDomain,
    T: ValueDomain,
{
    fn rewrite(&self, expr: &Expr, pp: CodeLocation) -> Result<ExprSet, SemanticError> {
        self.heap.rewrite(expr, pp)
    }
}
