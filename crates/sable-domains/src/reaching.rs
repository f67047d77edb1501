use std::fmt;

use sable_analysis::DataflowElement;
use sable_ir::{CodeLocation, Expr, Identifier, ScopeToken};

/// "`id` was (possibly) last defined at `location`".
///
/// Lifted through [`sable_analysis::PossibleDataflow`], this yields the
/// textbook reaching-definitions analysis: an assignment kills every other
/// definition of the same identifier and generates its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReachingDefinition {
    pub id: Identifier,
    pub location: CodeLocation,
}

impl ReachingDefinition {
    pub fn new(id: Identifier, location: CodeLocation) -> Self {
        ReachingDefinition { id, location }
    }
}

impl fmt::Display for ReachingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.id, self.location)
    }
}

impl DataflowElement for ReachingDefinition {
    fn generated(id: &Identifier, _expr: &Expr, pp: CodeLocation) -> Vec<Self> {
        vec![ReachingDefinition::new(id.clone(), pp)]
    }

    fn killed_by(&self, id: &Identifier, _expr: &Expr, _pp: CodeLocation) -> bool {
        // Weak identifiers stand for several locations, so their older
        // definitions may survive the store.
        self.id == *id && !id.is_weak()
    }

    fn identifiers(&self) -> Vec<Identifier> {
        vec![self.id.clone()]
    }

    fn replaced(&self, from: &Identifier, to: &Identifier) -> Self {
        if &self.id == from {
            ReachingDefinition::new(to.clone(), self.location)
        } else {
            self.clone()
        }
    }

    fn scoped(&self, token: ScopeToken, push: bool) -> Option<Self> {
        let id = if push {
            self.id.push_scope(token)
        } else {
            self.id.pop_scope(token)?
        };
        Some(ReachingDefinition::new(id, self.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_analysis::{PossibleDataflow, SemanticDomain};
    use sable_ir::Variable;
    use sable_lattice::Lattice;

    fn var(name: &str) -> Identifier {
        Identifier::Variable(Variable::new(name))
    }

    #[test]
    fn assignments_kill_then_generate() {
        let domain: PossibleDataflow<ReachingDefinition> = PossibleDataflow::new();
        let first = domain
            .assign(&var("x"), &Expr::int(1), CodeLocation::line(1))
            .unwrap();
        assert!(first.contains(&ReachingDefinition::new(var("x"), CodeLocation::line(1))));

        let second = first
            .assign(&var("x"), &Expr::int(2), CodeLocation::line(4))
            .unwrap();
        assert!(!second.contains(&ReachingDefinition::new(var("x"), CodeLocation::line(1))));
        assert!(second.contains(&ReachingDefinition::new(var("x"), CodeLocation::line(4))));
    }

    #[test]
    fn joins_accumulate_definitions_from_both_branches() {
        let domain: PossibleDataflow<ReachingDefinition> = PossibleDataflow::new();
        let then_branch = domain
            .assign(&var("x"), &Expr::int(2), CodeLocation::line(2))
            .unwrap();
        let else_branch = domain
            .assign(&var("x"), &Expr::int(3), CodeLocation::line(3))
            .unwrap();
        let merged = then_branch.join(&else_branch);
        assert!(merged.contains(&ReachingDefinition::new(var("x"), CodeLocation::line(2))));
        assert!(merged.contains(&ReachingDefinition::new(var("x"), CodeLocation::line(3))));
    }
}
