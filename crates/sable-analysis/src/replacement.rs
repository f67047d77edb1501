use std::fmt;

use sable_ir::Identifier;

/// A declarative renaming produced by the heap domain.
///
/// Every occurrence of a source identifier in downstream abstract values must
/// be substituted by the targets, binding each target to the join of the
/// sources' images. The canonical producer is allocation-site weakening: the
/// strong site is the only source and its weak twin the only target.
///
/// Replacements compose by sequencing: applying `[r1, r2]` is applying `r1`
/// then `r2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapReplacement {
    sources: Vec<Identifier>,
    targets: Vec<Identifier>,
}

impl HeapReplacement {
    pub fn new(sources: Vec<Identifier>, targets: Vec<Identifier>) -> Self {
        HeapReplacement { sources, targets }
    }

    /// The replacement that weakens one allocation site.
    pub fn weakening(strong: Identifier, weak: Identifier) -> Self {
        HeapReplacement {
            sources: vec![strong],
            targets: vec![weak],
        }
    }

    pub fn sources(&self) -> &[Identifier] {
        &self.sources
    }

    pub fn targets(&self) -> &[Identifier] {
        &self.targets
    }

    /// An identity replacement substitutes nothing and can be skipped.
    pub fn is_identity(&self) -> bool {
        self.sources == self.targets
    }
}

impl fmt::Display for HeapReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.sources.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{s}")?;
        }
        write!(f, "] -> [")?;
        for (i, t) in self.targets.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_ir::{AllocationSite, CodeLocation, TypeSet, Variable};

    #[test]
    fn identity_replacements_are_detected() {
        let x = Identifier::from(Variable::new("x"));
        let id = HeapReplacement::new(vec![x.clone()], vec![x]);
        assert!(id.is_identity());

        let site = AllocationSite::strong(TypeSet::untyped(), CodeLocation::line(3));
        let weakening = HeapReplacement::weakening(
            Identifier::from(site.clone()),
            Identifier::from(site.weakened()),
        );
        assert!(!weakening.is_identity());
    }
}
