use sable_ir::{
    AllocationSite, CodeLocation, Expr, Identifier, PointerIdentifier, ScopeToken, TypeSet,
};
use sable_lattice::{
    AbstractDomain, Environment, HasBottom, HasTop, Lattice, Satisfiability, SetLattice,
};

use crate::{ExprSet, HeapDomain, HeapReplacement, SemanticError, SemanticDomain};

type Sites = SetLattice<AllocationSite>;

/// The point-based (allocation-site, field-insensitive) heap abstraction.
///
/// Every identifier that may hold an address maps to the set of allocation
/// sites it may point to. A site stays strong until the same program point
/// allocates a second time (or the site is written through an alias), at
/// which point the strong site collapses into its weak twin and a
/// [`HeapReplacement`] carries the collapse into the value domains.
#[derive(Debug, Clone)]
pub struct PointBasedHeap {
    env: Environment<Identifier, Sites>,
    replacements: Vec<HeapReplacement>,
}

impl Default for PointBasedHeap {
    fn default() -> Self {
        PointBasedHeap {
            env: Environment::new(),
            replacements: Vec::new(),
        }
    }
}

impl PointBasedHeap {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_env(env: Environment<Identifier, Sites>) -> Self {
        PointBasedHeap {
            env,
            replacements: Vec::new(),
        }
    }

    pub fn environment(&self) -> &Environment<Identifier, Sites> {
        &self.env
    }

    /// The sites `id` may point to.
    pub fn sites_of(&self, id: &Identifier) -> Sites {
        self.env.get_state(id)
    }

    /// Whether `location` has already allocated along this path, and the
    /// strong site for it if one is still live.
    fn allocated_at(&self, location: CodeLocation) -> (bool, Option<AllocationSite>) {
        let mut any = false;
        let mut strong = None;
        let mut probe = |site: &AllocationSite| {
            if site.location == location {
                any = true;
                if !site.weak {
                    strong = Some(site.clone());
                }
            }
        };
        for (key, sites) in self.env.iter() {
            if let Identifier::Site(site) = key {
                probe(site);
            }
            for site in sites.iter() {
                probe(site);
            }
        }
        (any, strong)
    }

    /// The strong-to-weak collapses entailed by the weak sites appearing in
    /// `rewritten`.
    fn weakenings(&self, rewritten: &ExprSet) -> Vec<HeapReplacement> {
        let mut out = Vec::new();
        let mut seen = Vec::new();
        let mut consider = |site: &AllocationSite| {
            if !site.weak || seen.contains(&site.location) {
                return None;
            }
            seen.push(site.location);
            let (_, strong) = self.allocated_at(site.location);
            strong.map(|strong| {
                HeapReplacement::weakening(
                    Identifier::Site(strong),
                    Identifier::Site(site.clone()),
                )
            })
        };
        for expr in rewritten.iter() {
            let site = match expr.as_identifier() {
                Some(Identifier::Site(site)) => Some(site),
                Some(Identifier::Pointer(p)) => Some(&p.target),
                _ => None,
            };
            if let Some(site) = site
                && let Some(rep) = consider(site)
            {
                out.push(rep);
            }
        }
        out
    }

    /// Apply one replacement to the heap environment itself: first rewrite
    /// the pointee sets, then rename the keys, joining on collisions.
    fn apply_to_env(env: &Environment<Identifier, Sites>, rep: &HeapReplacement) -> Environment<Identifier, Sites> {
        if rep.is_identity() {
            return env.clone();
        }
        let source_sites: Vec<&AllocationSite> = rep
            .sources()
            .iter()
            .filter_map(|id| match id {
                Identifier::Site(site) => Some(site),
                _ => None,
            })
            .collect();
        let target_sites: Vec<&AllocationSite> = rep
            .targets()
            .iter()
            .filter_map(|id| match id {
                Identifier::Site(site) => Some(site),
                _ => None,
            })
            .collect();
        let env = env.map_values(|sites| match sites {
            SetLattice::Top => SetLattice::Top,
            SetLattice::Finite(_) => sites
                .iter()
                .flat_map(|site| {
                    if source_sites.contains(&site) {
                        target_sites.iter().map(|t| (*t).clone()).collect()
                    } else {
                        vec![site.clone()]
                    }
                })
                .collect(),
        });

        let mut image: Option<Sites> = None;
        for source in rep.sources() {
            if let Some(sites) = env.get(source) {
                image = Some(match image {
                    Some(acc) => acc.join(sites),
                    None => sites.clone(),
                });
            }
        }
        let mut env = env;
        for source in rep.sources() {
            if !rep.targets().contains(source) {
                env = env.forget(source);
            }
        }
        if let Some(image) = image {
            for target in rep.targets() {
                env = env.weak_put(target.clone(), image.clone());
            }
        }
        env
    }

    fn product(&self, exprs: &[&Expr], pp: CodeLocation) -> Result<Vec<Vec<Expr>>, SemanticError> {
        let mut out: Vec<Vec<Expr>> = vec![Vec::new()];
        for expr in exprs {
            let rewritten = self.rewrite(expr, pp)?;
            let mut next = Vec::new();
            for prefix in &out {
                for e in rewritten.iter() {
                    let mut row = prefix.clone();
                    row.push(e.clone());
                    next.push(row);
                }
            }
            out = next;
        }
        Ok(out)
    }

    /// Sites of a finite set, in deterministic (location, strength) order.
    fn ordered_sites(sites: &Sites) -> Vec<AllocationSite> {
        let mut out: Vec<AllocationSite> = sites.iter().cloned().collect();
        out.sort_by_key(|site| (site.location, site.weak));
        out
    }
}

// Replacements are transient: ordering and equality look at the environment
// alone.
impl PartialEq for PointBasedHeap {
    fn eq(&self, other: &Self) -> bool {
        self.env == other.env
    }
}

impl Eq for PointBasedHeap {}

// -- Lattice structure ------------------------------------------------------

impl Lattice for PointBasedHeap {
    fn join(&self, other: &Self) -> Self {
        let mut replacements = self.replacements.clone();
        replacements.extend(other.replacements.iter().cloned());
        PointBasedHeap {
            env: self.env.join(&other.env),
            replacements,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        let mut replacements = self.replacements.clone();
        replacements.extend(other.replacements.iter().cloned());
        PointBasedHeap {
            env: self.env.meet(&other.env),
            replacements,
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        self.env.is_subseteq(&other.env)
    }
}

impl HasBottom for PointBasedHeap {
    fn bottom() -> Self {
        Self::with_env(Environment::bottom())
    }

    fn is_bottom(&self) -> bool {
        self.env.is_bottom()
    }
}

impl HasTop for PointBasedHeap {
    fn top() -> Self {
        Self::with_env(Environment::top())
    }

    fn is_top(&self) -> bool {
        self.env.is_top()
    }
}

impl AbstractDomain for PointBasedHeap {
    // Allocation sites are finite per program, so join terminates ascending
    // chains on its own.
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }

    fn narrow(&self, next: &Self) -> Self {
        PointBasedHeap {
            env: self.env.narrow(&next.env),
            replacements: self.replacements.clone(),
        }
    }
}

// -- Semantic domain --------------------------------------------------------

impl SemanticDomain for PointBasedHeap {
    fn assign(
        &self,
        id: &Identifier,
        expr: &Expr,
        pp: CodeLocation,
    ) -> Result<Self, SemanticError> {
        if self.is_bottom() {
            return Ok(self.clone());
        }
        let rewritten = self.rewrite(expr, pp)?;
        let mut replacements = self.weakenings(&rewritten);
        let mut env = self.env.clone();
        for rep in &replacements {
            env = Self::apply_to_env(&env, rep);
        }

        let pointees: Vec<AllocationSite> = rewritten
            .iter()
            .filter_map(|e| match e.as_identifier() {
                Some(Identifier::Pointer(p)) => Some(p.target.clone()),
                _ => None,
            })
            .collect();
        if !pointees.is_empty() && pointees.len() == rewritten.len() {
            // The right-hand side is an address: (re)bind the pointee set,
            // strongly unless the assigned identifier is weak.
            let sites: Sites = pointees.into_iter().collect();
            env = env.put_state(id.clone(), sites, id.is_weak());
        } else if let Identifier::Site(site) = id {
            // Writing through a materialized location: collapse its strong
            // form, if still live, into the weak twin.
            let (_, strong) = self.allocated_at(site.location);
            if let Some(strong) = strong {
                let rep = HeapReplacement::weakening(
                    Identifier::Site(strong),
                    Identifier::Site(site.weakened()),
                );
                env = Self::apply_to_env(&env, &rep);
                replacements.push(rep);
            }
        }
        Ok(PointBasedHeap { env, replacements })
    }

    fn small_step(&self, expr: &Expr, pp: CodeLocation) -> Result<Self, SemanticError> {
        if self.is_bottom() {
            return Ok(self.clone());
        }
        let rewritten = self.rewrite(expr, pp)?;
        let replacements = self.weakenings(&rewritten);
        let mut env = self.env.clone();
        for rep in &replacements {
            env = Self::apply_to_env(&env, rep);
        }
        Ok(PointBasedHeap { env, replacements })
    }

    fn assume(
        &self,
        expr: &Expr,
        src: CodeLocation,
        _dest: CodeLocation,
    ) -> Result<Self, SemanticError> {
        // Guards carry no points-to refinement in this abstraction.
        self.small_step(expr, src)
    }

    fn satisfies(&self, _expr: &Expr, _pp: CodeLocation) -> Satisfiability {
        if self.is_bottom() {
            Satisfiability::Bottom
        } else {
            Satisfiability::Unknown
        }
    }

    fn forget(&self, id: &Identifier) -> Self {
        PointBasedHeap {
            env: self.env.forget(id),
            replacements: self.replacements.clone(),
        }
    }

    fn forget_if(&self, pred: &dyn Fn(&Identifier) -> bool) -> Self {
        PointBasedHeap {
            env: self.env.forget_if(|id| pred(id)),
            replacements: self.replacements.clone(),
        }
    }

    fn push_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(Self::with_env(
            self.env.rename_keys(|id| Some(id.push_scope(token))),
        ))
    }

    fn pop_scope(&self, token: ScopeToken) -> Result<Self, SemanticError> {
        Ok(Self::with_env(self.env.rename_keys(|id| id.pop_scope(token))))
    }
}

// -- Rewriting --------------------------------------------------------------

impl HeapDomain for PointBasedHeap {
    /// Rewrite a symbolic expression into the value-level expressions it may
    /// denote under this heap.
    fn rewrite(&self, expr: &Expr, pp: CodeLocation) -> Result<ExprSet, SemanticError> {
        match expr {
            Expr::Skip | Expr::Constant(_) | Expr::PushAny(_) => {
                Ok(ExprSet::singleton(expr.clone()))
            }
            Expr::Ident(id @ Identifier::Variable(_)) => {
                // A variable holding addresses expands into its pointer set.
                match self.env.get(id) {
                    Some(sites @ SetLattice::Finite(_)) if !sites.is_empty() => {
                        Ok(Self::ordered_sites(sites)
                            .into_iter()
                            .map(|site| {
                                Expr::Ident(Identifier::Pointer(PointerIdentifier::new(site)))
                            })
                            .collect())
                    }
                    _ => Ok(ExprSet::singleton(expr.clone())),
                }
            }
            Expr::Ident(_) => Ok(ExprSet::singleton(expr.clone())),
            Expr::Unary { op, expr: inner } => {
                let rows = self.product(&[inner.as_ref()], pp)?;
                Ok(rows
                    .into_iter()
                    .map(|mut row| Expr::unary(*op, row.remove(0)))
                    .collect())
            }
            Expr::Binary { op, left, right } => {
                let rows = self.product(&[left.as_ref(), right.as_ref()], pp)?;
                Ok(rows
                    .into_iter()
                    .map(|mut row| {
                        let l = row.remove(0);
                        let r = row.remove(0);
                        Expr::binary(*op, l, r)
                    })
                    .collect())
            }
            Expr::Ternary {
                op,
                first,
                second,
                third,
            } => {
                let rows =
                    self.product(&[first.as_ref(), second.as_ref(), third.as_ref()], pp)?;
                Ok(rows
                    .into_iter()
                    .map(|mut row| {
                        let a = row.remove(0);
                        let b = row.remove(0);
                        let c = row.remove(0);
                        Expr::ternary(*op, a, b, c)
                    })
                    .collect())
            }
            Expr::HeapAlloc { types, location } => {
                let (any, _) = self.allocated_at(*location);
                let site = if any {
                    AllocationSite::weak(types.clone(), *location)
                } else {
                    AllocationSite::strong(types.clone(), *location)
                };
                Ok(ExprSet::singleton(Expr::Ident(Identifier::Site(site))))
            }
            Expr::HeapRef(inner) => {
                let rewritten = self.rewrite(inner, pp)?;
                Ok(rewritten
                    .iter()
                    .map(|e| match e.as_identifier() {
                        Some(Identifier::Site(site)) => Expr::Ident(Identifier::Pointer(
                            PointerIdentifier::new(site.clone()),
                        )),
                        _ => e.clone(),
                    })
                    .collect())
            }
            Expr::HeapDeref(inner) => {
                if let Some(id @ Identifier::Variable(_)) =
                    inner.as_identifier().filter(|id| self.env.get(id).is_some())
                {
                    let sites = self.env.get_state(id);
                    match sites {
                        SetLattice::Finite(_) => Ok(Self::ordered_sites(&sites)
                            .into_iter()
                            .map(|site| {
                                Expr::Ident(Identifier::Pointer(PointerIdentifier::new(site)))
                            })
                            .collect()),
                        SetLattice::Top => Ok(ExprSet::singleton(Expr::PushAny(TypeSet::untyped()))),
                    }
                } else {
                    self.rewrite(inner, pp)
                }
            }
            Expr::AccessChild { receiver, child } => {
                let receivers = self.rewrite(receiver, pp)?;
                // Field-insensitive: the child only matters for rewriting
                // errors, the resulting location is the receiver's region.
                let _ = self.rewrite(child, pp)?;
                Ok(receivers
                    .iter()
                    .map(|r| match r.as_identifier() {
                        Some(Identifier::Pointer(p)) => {
                            Expr::Ident(Identifier::Site(p.target.weakened()))
                        }
                        Some(Identifier::Site(site)) => {
                            Expr::Ident(Identifier::Site(site.weakened()))
                        }
                        _ => Expr::PushAny(TypeSet::untyped()),
                    })
                    .collect())
            }
        }
    }

    fn replacements(&self) -> &[HeapReplacement] {
        &self.replacements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_ir::Variable;

    fn var(name: &str) -> Identifier {
        Identifier::Variable(Variable::new(name))
    }

    #[test]
    fn allocation_rewrites_to_a_strong_site_then_weakens() {
        let heap = PointBasedHeap::new();
        let loc = CodeLocation::line(5);
        let alloc = Expr::alloc(TypeSet::untyped(), loc);

        // First allocation: strong site, no replacement.
        let h1 = heap.assign(&var("p"), &alloc, loc).unwrap();
        assert!(h1.replacements().is_empty());
        let sites = h1.sites_of(&var("p"));
        assert_eq!(sites.len(), Some(1));
        assert!(sites.iter().all(|s| !s.weak));

        // Second allocation at the same point: the site collapses to weak
        // and the collapse is reported as a replacement.
        let h2 = h1.assign(&var("p"), &alloc, loc).unwrap();
        assert_eq!(h2.replacements().len(), 1);
        let sites = h2.sites_of(&var("p"));
        assert_eq!(sites.len(), Some(1));
        assert!(sites.iter().all(|s| s.weak));
    }

    #[test]
    fn aliasing_assignment_copies_the_pointee_set() {
        let loc = CodeLocation::line(2);
        let heap = PointBasedHeap::new()
            .assign(&var("p"), &Expr::alloc(TypeSet::untyped(), loc), loc)
            .unwrap();
        let aliased = heap.assign(&var("q"), &Expr::var("p"), loc).unwrap();
        assert_eq!(aliased.sites_of(&var("q")), aliased.sites_of(&var("p")));
    }

    #[test]
    fn field_access_rewrites_to_the_weakened_region() {
        let loc = CodeLocation::line(3);
        let heap = PointBasedHeap::new()
            .assign(&var("p"), &Expr::alloc(TypeSet::untyped(), loc), loc)
            .unwrap();
        let access = Expr::field(Expr::var("p"), Expr::var("f"));
        let rewritten = heap.rewrite(&access, CodeLocation::line(4)).unwrap();
        assert_eq!(rewritten.len(), 1);
        match rewritten.as_singleton().and_then(Expr::as_identifier) {
            Some(Identifier::Site(site)) => {
                assert!(site.weak);
                assert_eq!(site.location, loc);
            }
            other => panic!("expected a weakened site, got {other:?}"),
        }
    }

    #[test]
    fn join_concatenates_pending_replacements() {
        let loc = CodeLocation::line(5);
        let alloc = Expr::alloc(TypeSet::untyped(), loc);
        let h1 = PointBasedHeap::new().assign(&var("p"), &alloc, loc).unwrap();
        let h2 = h1.assign(&var("p"), &alloc, loc).unwrap();
        assert_eq!(h2.replacements().len(), 1);
        let joined = h2.join(&h1);
        assert_eq!(joined.replacements().len(), 1);
        // Both strengths of the site flow into the joined pointee set.
        assert_eq!(joined.sites_of(&var("p")).len(), Some(2));
        assert!(h2.is_subseteq(&joined));
    }
}
