use std::fmt::Debug;
use std::hash::Hash;

use sable_ir::{CodeLocation, Expr, Identifier, ScopeToken};
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice, Satisfiability, SetLattice};

use crate::{HeapReplacement, SemanticError, SemanticDomain, ValueDomain};

/// One fact tracked by a dataflow analysis (e.g. "`x` was defined at line 2").
///
/// Facts are generated and killed by assignments; everything else defaults to
/// the identity, so a minimal element only describes those two rules.
pub trait DataflowElement: Clone + Eq + Hash + Debug {
    /// Facts introduced by `id = expr` at `pp`.
    fn generated(id: &Identifier, expr: &Expr, pp: CodeLocation) -> Vec<Self>;

    /// Whether this fact is invalidated by `id = expr` at `pp`.
    fn killed_by(&self, id: &Identifier, expr: &Expr, pp: CodeLocation) -> bool;

    /// The identifiers this fact mentions.
    fn identifiers(&self) -> Vec<Identifier>;

    /// Whether this fact mentions `id` at all.
    fn involves(&self, id: &Identifier) -> bool {
        self.identifiers().iter().any(|i| i == id)
    }

    /// This fact with `from` renamed to `to`.
    fn replaced(&self, from: &Identifier, to: &Identifier) -> Self;

    /// This fact moved across a scope boundary; `None` drops it.
    fn scoped(&self, _token: ScopeToken, _push: bool) -> Option<Self> {
        Some(self.clone())
    }
}

/// The may-analysis lifting of a [`DataflowElement`] to a value domain.
///
/// The carried set collects every fact that may hold at a program point:
/// join is union and an assignment kills before it generates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleDataflow<E: Eq + Hash> {
    elements: SetLattice<E>,
}

impl<E: DataflowElement> Default for PossibleDataflow<E> {
    fn default() -> Self {
        PossibleDataflow {
            elements: SetLattice::new(),
        }
    }
}

impl<E: DataflowElement> PossibleDataflow<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &SetLattice<E> {
        &self.elements
    }

    pub fn contains(&self, element: &E) -> bool {
        self.elements.contains(element)
    }

    fn map_elements(&self, f: impl Fn(&E) -> Option<E>) -> Self {
        let elements = match &self.elements {
            SetLattice::Top => SetLattice::Top,
            SetLattice::Finite(_) => self.elements.iter().filter_map(|e| f(e)).collect(),
        };
        PossibleDataflow { elements }
    }
}

impl<E: DataflowElement> Lattice for PossibleDataflow<E> {
    fn join(&self, other: &Self) -> Self {
        PossibleDataflow {
            elements: self.elements.join(&other.elements),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        PossibleDataflow {
            elements: self.elements.meet(&other.elements),
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        self.elements.is_subseteq(&other.elements)
    }
}

impl<E: DataflowElement> HasBottom for PossibleDataflow<E> {
    fn bottom() -> Self {
        Self::default()
    }

    fn is_bottom(&self) -> bool {
        self.elements.is_bottom()
    }
}

impl<E: DataflowElement> HasTop for PossibleDataflow<E> {
    fn top() -> Self {
        PossibleDataflow {
            elements: SetLattice::top(),
        }
    }

    fn is_top(&self) -> bool {
        self.elements.is_top()
    }
}

impl<E: DataflowElement> AbstractDomain for PossibleDataflow<E> {
    // The fact universe of one program is finite, so join widens.
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

impl<E: DataflowElement> SemanticDomain for PossibleDataflow<E> {
    fn assign(
        &self,
        id: &Identifier,
        expr: &Expr,
        pp: CodeLocation,
    ) -> Result<Self, SemanticError> {
        let survivors = self.map_elements(|e| {
            if e.killed_by(id, expr, pp) {
                None
            } else {
                Some(e.clone())
            }
        });
        let mut elements = survivors.elements;
        for generated in E::generated(id, expr, pp) {
            elements = elements.insert(generated);
        }
        Ok(PossibleDataflow { elements })
    }

    fn small_step(&self, _expr: &Expr, _pp: CodeLocation) -> Result<Self, SemanticError> {
        Ok(self.clone())
    }

    fn assume(
        &self,
        _expr: &Expr,
        _src: CodeLocation,
        _dest: CodeLocation,
    ) -> Result<Self, SemanticError> {
        Ok(self.clone())
    }

    fn satisfies(&self, _expr: &Expr, _pp: CodeLocation) -> Satisfiability {
        Satisfiability::Unknown
    }

    fn forget(&self, id: &Identifier) -> Self {
        self.map_elements(|e| if e.involves(id) { None } else { Some(e.clone()) })
    }

    fn forget_if(&self, pred: &dyn Fn(&Identifier) -> bool) -> Self {
        self.map_elements(|e| {
            if e.identifiers().iter().any(|id| pred(id)) {
                None
            } else {
                Some(e.clone())
            }
        })
    }

    fn push_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(self.map_elements(|e| e.scoped(token, true)))
    }

    fn pop_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(self.map_elements(|e| e.scoped(token, false)))
    }
}

impl<E: DataflowElement> ValueDomain for PossibleDataflow<E> {
    fn apply_replacements(&self, subs: &[HeapReplacement]) -> Result<Self, SemanticError> {
        let mut out = self.clone();
        for sub in subs {
            if sub.is_identity() {
                continue;
            }
            out = out.map_elements(|e| {
                let source = sub.sources().iter().find(|s| e.involves(s));
                match (source, sub.targets().first()) {
                    (Some(from), Some(to)) => Some(e.replaced(from, to)),
                    (Some(_), None) => None,
                    (None, _) => Some(e.clone()),
                }
            });
        }
        Ok(out)
    }
}
