use sable_ir::{CodeLocation, Expr, Identifier, ScopeToken};
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice, Satisfiability};

use crate::info::DynLattice;
use crate::{AbstractState, ExprSet, FixpointInfo, SemanticDomain, SemanticError};

/// The state the fixpoint engine propagates: an abstract state, the symbolic
/// expressions the last semantic step left on the stack, and auxiliary
/// per-point fixpoint information.
///
/// Every transition yields a fresh instance and *replaces* the pending
/// expression set: an assignment leaves the assigned identifier, a small
/// step leaves the stepped expression, and `assume` leaves the set untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisState<A> {
    state: A,
    computed: ExprSet,
    info: FixpointInfo,
}

impl<A: AbstractState> AnalysisState<A> {
    pub fn new(state: A) -> Self {
        AnalysisState {
            state,
            computed: ExprSet::new(),
            info: FixpointInfo::new(),
        }
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// The expressions computed by the last semantic step.
    pub fn computed_expressions(&self) -> &ExprSet {
        &self.computed
    }

    pub fn info(&self) -> &FixpointInfo {
        &self.info
    }

    pub(crate) fn with_computed(&self, computed: ExprSet) -> Self {
        AnalysisState {
            state: self.state.clone(),
            computed,
            info: self.info.clone(),
        }
    }

    // -- Transitions --------------------------------------------------------

    pub fn assign(
        &self,
        id: &Identifier,
        expr: &Expr,
        pp: CodeLocation,
    ) -> Result<Self, SemanticError> {
        Ok(AnalysisState {
            state: self.state.assign(id, expr, pp)?,
            computed: ExprSet::singleton(Expr::Ident(id.clone())),
            info: self.info.clone(),
        })
    }

    pub fn small_step(&self, expr: &Expr, pp: CodeLocation) -> Result<Self, SemanticError> {
        Ok(AnalysisState {
            state: self.state.small_step(expr, pp)?,
            computed: ExprSet::singleton(expr.clone()),
            info: self.info.clone(),
        })
    }

    pub fn assume(
        &self,
        expr: &Expr,
        src: CodeLocation,
        dest: CodeLocation,
    ) -> Result<Self, SemanticError> {
        Ok(AnalysisState {
            state: self.state.assume(expr, src, dest)?,
            computed: self.computed.clone(),
            info: self.info.clone(),
        })
    }

    pub fn satisfies(&self, expr: &Expr, pp: CodeLocation) -> Satisfiability {
        self.state.satisfies(expr, pp)
    }

    pub fn rewrite(&self, expr: &Expr, pp: CodeLocation) -> Result<ExprSet, SemanticError> {
        self.state.rewrite(expr, pp)
    }

    pub fn forget(&self, id: &Identifier) -> Self {
        AnalysisState {
            state: self.state.forget(id),
            computed: self.computed.clone(),
            info: self.info.clone(),
        }
    }

    pub fn forget_if(&self, pred: &dyn Fn(&Identifier) -> bool) -> Self {
        AnalysisState {
            state: self.state.forget_if(pred),
            computed: self.computed.clone(),
            info: self.info.clone(),
        }
    }

    pub fn push_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        let computed = self
            .computed
            .iter()
            .map(|e| e.push_scope(token))
            .collect();
        Ok(AnalysisState {
            state: self.state.push_scope(token)?,
            computed,
            info: self.info.clone(),
        })
    }

    pub fn pop_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        let computed = self
            .computed
            .iter()
            .filter_map(|e| e.pop_scope(token))
            .collect();
        Ok(AnalysisState {
            state: self.state.pop_scope(token)?,
            computed,
            info: self.info.clone(),
        })
    }

    // -- Auxiliary information ----------------------------------------------

    /// Strong update of the auxiliary info map.
    pub fn store_info(&self, key: impl Into<String>, value: impl DynLattice) -> Self {
        AnalysisState {
            state: self.state.clone(),
            computed: self.computed.clone(),
            info: self.info.store(key, value),
        }
    }

    /// Joining update of the auxiliary info map.
    pub fn weak_store_info(&self, key: impl Into<String>, value: impl DynLattice) -> Self {
        AnalysisState {
            state: self.state.clone(),
            computed: self.computed.clone(),
            info: self.info.weak_store(key, value),
        }
    }
}

// -- Lattice structure ------------------------------------------------------

impl<A: AbstractState> Lattice for AnalysisState<A> {
    fn join(&self, other: &Self) -> Self {
        AnalysisState {
            state: self.state.join(&other.state),
            computed: self.computed.join(&other.computed),
            info: self.info.join(&other.info),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        AnalysisState {
            state: self.state.meet(&other.state),
            computed: self.computed.meet(&other.computed),
            info: self.info.meet(&other.info),
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        self.state.is_subseteq(&other.state)
            && self.computed.is_subseteq(&other.computed)
            && self.info.is_subseteq(&other.info)
    }
}

impl<A: AbstractState> HasBottom for AnalysisState<A> {
    fn bottom() -> Self {
        AnalysisState {
            state: A::bottom(),
            computed: ExprSet::bottom(),
            info: FixpointInfo::bottom(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.state.is_bottom() && self.computed.is_bottom() && self.info.is_bottom()
    }
}

impl<A: AbstractState> HasTop for AnalysisState<A> {
    fn top() -> Self {
        AnalysisState {
            state: A::top(),
            computed: ExprSet::top(),
            info: FixpointInfo::top(),
        }
    }

    fn is_top(&self) -> bool {
        self.state.is_top() && self.computed.is_top()
    }
}

impl<A: AbstractState> AbstractDomain for AnalysisState<A> {
    fn widen(&self, next: &Self) -> Self {
        AnalysisState {
            state: self.state.widen(&next.state),
            computed: self.computed.widen(&next.computed),
            info: self.info.widen(&next.info),
        }
    }

    fn narrow(&self, next: &Self) -> Self {
        AnalysisState {
            state: self.state.narrow(&next.state),
            computed: self.computed.narrow(&next.computed),
            info: self.info.narrow(&next.info),
        }
    }
}
