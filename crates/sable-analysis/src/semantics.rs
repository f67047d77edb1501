use sable_ir::{CodeLocation, Expr, Identifier, ScopeToken};
use sable_lattice::{AbstractDomain, Satisfiability};

use crate::{ExprSet, HeapReplacement, SemanticError};

/// The transition functions every abstract domain exposes.
///
/// All operations are functional: the receiver is never mutated and every
/// transition yields a fresh value. Operations return an error only when a
/// step is ill-formed (see [`SemanticError`]); unrepresentable but well-formed
/// inputs must over-approximate to top instead.
pub trait SemanticDomain: AbstractDomain {
    /// The state after `id = expr` at program point `pp`.
    fn assign(&self, id: &Identifier, expr: &Expr, pp: CodeLocation)
        -> Result<Self, SemanticError>;

    /// The state after evaluating `expr` without committing an assignment.
    fn small_step(&self, expr: &Expr, pp: CodeLocation) -> Result<Self, SemanticError>;

    /// The state refined by the knowledge that `expr` holds on the edge from
    /// `src` to `dest`.
    fn assume(
        &self,
        expr: &Expr,
        src: CodeLocation,
        dest: CodeLocation,
    ) -> Result<Self, SemanticError>;

    /// Whether this state implies `expr`.
    fn satisfies(&self, expr: &Expr, pp: CodeLocation) -> Satisfiability;

    fn forget(&self, id: &Identifier) -> Self;

    fn forget_if(&self, pred: &dyn Fn(&Identifier) -> bool) -> Self;

    /// Move every identifier one scope inward (entering a call).
    fn push_scope(&self, token: ScopeToken) -> Result<Self, SemanticError>;

    /// Undo a scope push, dropping identifiers local to the popped scope.
    fn pop_scope(&self, token: ScopeToken) -> Result<Self, SemanticError>;
}

/// A domain over value-level expressions only.
///
/// Value domains never see heap expressions — those are rewritten away first —
/// but they must honor the renamings the heap produces while doing so.
pub trait ValueDomain: SemanticDomain {
    /// Apply a sequence of heap replacements, in order. Each replacement
    /// binds its targets to the join of the images of its sources, then
    /// drops the sources.
    fn apply_replacements(&self, subs: &[HeapReplacement]) -> Result<Self, SemanticError>;
}

/// A domain abstracting the memory of the program.
///
/// Beyond the common transitions, a heap domain knows how to *rewrite* any
/// symbolic expression into the set of value-level expressions it may denote,
/// and reports the identifier replacements its last transition entailed. The
/// replacement list is transient: ordering and joins ignore it, and each
/// transition replaces it wholesale.
pub trait HeapDomain: SemanticDomain {
    /// Rewrite `expr` into value-level expressions under this heap.
    fn rewrite(&self, expr: &Expr, pp: CodeLocation) -> Result<ExprSet, SemanticError>;

    /// The replacements produced by the last transition.
    fn replacements(&self) -> &[HeapReplacement];
}

/// The whole-state contract the fixpoint engine computes over: a semantic
/// domain that can also rewrite expressions for the statement layer (to
/// resolve assignment targets and call arguments).
pub trait AbstractState: SemanticDomain {
    fn rewrite(&self, expr: &Expr, pp: CodeLocation) -> Result<ExprSet, SemanticError>;
}
