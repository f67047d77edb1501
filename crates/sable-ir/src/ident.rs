use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{CodeLocation, ScopeToken, StaticType, TypeSet};

/// A program variable.
///
/// Identity is the name together with the scope chain: the declaration
/// location and the static types are carried for reporting and for the type
/// domain, but two mentions of `x` in the same scope are the same variable no
/// matter where they appear.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub types: TypeSet,
    pub location: CodeLocation,
    pub scopes: Vec<ScopeToken>,
    /// Meta-variables are engine-synthesized carriers (e.g. return values).
    /// They ignore scope pushes and pops so they can ferry information
    /// across call boundaries.
    pub meta: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            types: TypeSet::untyped(),
            location: CodeLocation::UNKNOWN,
            scopes: Vec::new(),
            meta: false,
        }
    }

    /// An engine-synthesized variable that survives scope changes.
    pub fn meta(name: impl Into<String>) -> Self {
        Variable {
            meta: true,
            ..Variable::new(name)
        }
    }

    pub fn with_types(mut self, types: TypeSet) -> Self {
        self.types = types;
        self
    }

    pub fn with_location(mut self, location: CodeLocation) -> Self {
        self.location = location;
        self
    }

    pub fn push_scope(&self, token: ScopeToken) -> Self {
        if self.meta {
            return self.clone();
        }
        let mut out = self.clone();
        out.scopes.push(token);
        out
    }

    /// Remove the innermost scope if it matches `token`; `None` means the
    /// variable does not belong to that scope and must be dropped.
    pub fn pop_scope(&self, token: ScopeToken) -> Option<Self> {
        if self.meta {
            return Some(self.clone());
        }
        if self.scopes.last() == Some(&token) {
            let mut out = self.clone();
            out.scopes.pop();
            Some(out)
        } else {
            None
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.scopes == other.scopes
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.scopes.hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.scopes {
            write!(f, "{token}")?;
        }
        f.write_str(&self.name)
    }
}

/// The abstract identity of every object created at one program location.
///
/// A strong site stands for exactly one concrete object and supports strong
/// updates; a weak site over-approximates one *or more* objects and only
/// admits joining updates. The location alone identifies the allocation
/// statement, so a strong and a weak site with the same location denote the
/// same statement before and after it was reached more than once.
#[derive(Debug, Clone)]
pub struct AllocationSite {
    pub types: TypeSet,
    pub location: CodeLocation,
    pub weak: bool,
}

impl AllocationSite {
    pub fn strong(types: TypeSet, location: CodeLocation) -> Self {
        AllocationSite {
            types,
            location,
            weak: false,
        }
    }

    pub fn weak(types: TypeSet, location: CodeLocation) -> Self {
        AllocationSite {
            types,
            location,
            weak: true,
        }
    }

    pub fn weakened(&self) -> Self {
        AllocationSite {
            types: self.types.clone(),
            location: self.location,
            weak: true,
        }
    }
}

impl PartialEq for AllocationSite {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.weak == other.weak
    }
}

impl Eq for AllocationSite {}

impl Hash for AllocationSite {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
        self.weak.hash(state);
    }
}

impl fmt::Display for AllocationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alloc@{}", self.location)?;
        if self.weak {
            f.write_str("[w]")?;
        }
        Ok(())
    }
}

/// The address of an allocation site, as a first-class value.
#[derive(Debug, Clone)]
pub struct PointerIdentifier {
    pub types: TypeSet,
    pub target: AllocationSite,
}

impl PointerIdentifier {
    pub fn new(target: AllocationSite) -> Self {
        PointerIdentifier {
            types: TypeSet::single(StaticType::Reference),
            target,
        }
    }
}

impl PartialEq for PointerIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for PointerIdentifier {}

impl Hash for PointerIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

impl fmt::Display for PointerIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.target)
    }
}

/// Anything an abstract environment can be keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Variable(Variable),
    Site(AllocationSite),
    Pointer(PointerIdentifier),
}

impl Identifier {
    /// Weak identifiers stand for more than one concrete location and only
    /// admit joining updates.
    pub fn is_weak(&self) -> bool {
        match self {
            Identifier::Variable(_) => false,
            Identifier::Site(site) => site.weak,
            Identifier::Pointer(_) => false,
        }
    }

    pub fn types(&self) -> &TypeSet {
        match self {
            Identifier::Variable(v) => &v.types,
            Identifier::Site(s) => &s.types,
            Identifier::Pointer(p) => &p.types,
        }
    }

    pub fn push_scope(&self, token: ScopeToken) -> Self {
        match self {
            Identifier::Variable(v) => Identifier::Variable(v.push_scope(token)),
            other => other.clone(),
        }
    }

    /// Heap identifiers are scope-invariant; variables follow
    /// [`Variable::pop_scope`].
    pub fn pop_scope(&self, token: ScopeToken) -> Option<Self> {
        match self {
            Identifier::Variable(v) => v.pop_scope(token).map(Identifier::Variable),
            other => Some(other.clone()),
        }
    }
}

impl From<Variable> for Identifier {
    fn from(v: Variable) -> Self {
        Identifier::Variable(v)
    }
}

impl From<AllocationSite> for Identifier {
    fn from(s: AllocationSite) -> Self {
        Identifier::Site(s)
    }
}

impl From<PointerIdentifier> for Identifier {
    fn from(p: PointerIdentifier) -> Self {
        Identifier::Pointer(p)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Variable(v) => v.fmt(f),
            Identifier::Site(s) => s.fmt(f),
            Identifier::Pointer(p) => p.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_identity_ignores_location_and_types() {
        let a = Variable::new("x").with_location(CodeLocation::line(1));
        let b = Variable::new("x").with_location(CodeLocation::line(7));
        assert_eq!(a, b);
    }

    #[test]
    fn scope_round_trip() {
        let token = ScopeToken::new(CodeLocation::line(3));
        let x = Variable::new("x");
        let scoped = x.push_scope(token);
        assert_ne!(x, scoped);
        assert_eq!(scoped.pop_scope(token), Some(x.clone()));
        // Popping a token the variable was never pushed with drops it.
        let other = ScopeToken::new(CodeLocation::line(9));
        assert_eq!(x.pop_scope(other), None);
    }

    #[test]
    fn sites_with_different_strength_are_distinct() {
        let loc = CodeLocation::line(4);
        let strong = AllocationSite::strong(TypeSet::untyped(), loc);
        let weak = strong.weakened();
        assert_ne!(strong, weak);
        assert_eq!(weak, AllocationSite::weak(TypeSet::untyped(), loc));
        assert!(Identifier::from(weak).is_weak());
        assert!(!Identifier::from(strong).is_weak());
    }
}
