use std::fmt::Debug;
use std::hash::Hash;

use rustc_hash::FxHashSet;

use crate::{AbstractDomain, HasBottom, HasTop, Lattice};

/// A finite powerset lattice with a distinguished top.
///
/// Bottom is the empty set, join is union, meet is intersection. Widening
/// coincides with join: the engine only instantiates this over universes that
/// are finite for a given program (e.g. allocation sites, definition points),
/// so ascending chains are finite by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetLattice<T: Eq + Hash> {
    Finite(FxHashSet<T>),
    Top,
}

impl<T: Eq + Hash> Default for SetLattice<T> {
    fn default() -> Self {
        SetLattice::Finite(FxHashSet::default())
    }
}

impl<T: Clone + Eq + Hash + Debug> SetLattice<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(value: T) -> Self {
        SetLattice::Finite(FxHashSet::from_iter([value]))
    }

    pub fn contains(&self, value: &T) -> bool {
        match self {
            SetLattice::Finite(set) => set.contains(value),
            SetLattice::Top => true,
        }
    }

    /// Number of elements; `None` for top.
    pub fn len(&self) -> Option<usize> {
        match self {
            SetLattice::Finite(set) => Some(set.len()),
            SetLattice::Top => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Iterate the elements of a finite set; empty for top.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let set = match self {
            SetLattice::Finite(set) => Some(set),
            SetLattice::Top => None,
        };
        set.into_iter().flatten()
    }

    pub fn insert(&self, value: T) -> Self {
        match self {
            SetLattice::Finite(set) => {
                let mut set = set.clone();
                set.insert(value);
                SetLattice::Finite(set)
            }
            SetLattice::Top => SetLattice::Top,
        }
    }
}

impl<T: Clone + Eq + Hash> FromIterator<T> for SetLattice<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        SetLattice::Finite(iter.into_iter().collect())
    }
}

impl<T: Clone + Eq + Hash + Debug> Lattice for SetLattice<T> {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (SetLattice::Top, _) | (_, SetLattice::Top) => SetLattice::Top,
            (SetLattice::Finite(a), SetLattice::Finite(b)) => {
                SetLattice::Finite(a.union(b).cloned().collect())
            }
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (SetLattice::Top, x) | (x, SetLattice::Top) => x.clone(),
            (SetLattice::Finite(a), SetLattice::Finite(b)) => {
                SetLattice::Finite(a.intersection(b).cloned().collect())
            }
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        match (self, other) {
            (_, SetLattice::Top) => true,
            (SetLattice::Top, _) => false,
            (SetLattice::Finite(a), SetLattice::Finite(b)) => a.is_subset(b),
        }
    }
}

impl<T: Clone + Eq + Hash + Debug> HasBottom for SetLattice<T> {
    fn bottom() -> Self {
        Self::default()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Clone + Eq + Hash + Debug> HasTop for SetLattice<T> {
    fn top() -> Self {
        SetLattice::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, SetLattice::Top)
    }
}

impl<T: Clone + Eq + Hash + Debug> AbstractDomain for SetLattice<T> {
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

/// A powerset that never keeps an element subsumed by another element.
///
/// Elements are compared with the inner lattice's ordering; the set is
/// ordered by the Hoare (lower) powerdomain order: `a ⊑ b` when every element
/// of `a` is below some element of `b`. Equality is mutual ordering, so the
/// internal element order is irrelevant.
#[derive(Debug, Clone)]
pub struct NonRedundantSet<T> {
    elements: Vec<T>,
}

impl<T> Default for NonRedundantSet<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
        }
    }
}

impl<T: Lattice> NonRedundantSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    /// Insert `value`, dropping it if it is already subsumed and dropping any
    /// existing element that it subsumes.
    pub fn insert(&self, value: T) -> Self {
        if self.elements.iter().any(|e| value.is_subseteq(e)) {
            return self.clone();
        }
        let mut elements: Vec<T> = self
            .elements
            .iter()
            .filter(|e| !e.is_subseteq(&value))
            .cloned()
            .collect();
        elements.push(value);
        Self { elements }
    }

    /// Join of all elements, or `None` when empty.
    pub fn collapse(&self) -> Option<T> {
        let mut iter = self.elements.iter();
        let first = iter.next()?.clone();
        Some(iter.fold(first, |acc, e| acc.join(e)))
    }
}

impl<T: Lattice> PartialEq for NonRedundantSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.is_subseteq(other) && other.is_subseteq(self)
    }
}

impl<T: Lattice> Lattice for NonRedundantSet<T> {
    fn join(&self, other: &Self) -> Self {
        other
            .elements
            .iter()
            .fold(self.clone(), |acc, e| acc.insert(e.clone()))
    }

    fn meet(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for a in &self.elements {
            for b in &other.elements {
                out = out.insert(a.meet(b));
            }
        }
        out
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        self.elements
            .iter()
            .all(|a| other.elements.iter().any(|b| a.is_subseteq(b)))
    }
}

impl<T: HasBottom> HasBottom for NonRedundantSet<T> {
    fn bottom() -> Self {
        Self::default()
    }

    fn is_bottom(&self) -> bool {
        self.elements.iter().all(HasBottom::is_bottom)
    }
}

impl<T: Lattice + HasTop> HasTop for NonRedundantSet<T> {
    fn top() -> Self {
        Self {
            elements: vec![T::top()],
        }
    }

    fn is_top(&self) -> bool {
        self.elements.iter().any(|e| e.is_top())
    }
}

impl<T: AbstractDomain> AbstractDomain for NonRedundantSet<T> {
    /// Widening collapses both sides to their single-element join and widens
    /// those, so chain length is bounded by the element widening alone rather
    /// than by the number of incomparable elements.
    fn widen(&self, next: &Self) -> Self {
        if next.is_subseteq(self) {
            return self.clone();
        }
        let joined = self.join(next);
        match (self.collapse(), joined.collapse()) {
            (Some(a), Some(b)) => Self {
                elements: vec![a.widen(&b)],
            },
            (None, _) => joined,
            (_, None) => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[i64]) -> SetLattice<i64> {
        values.iter().copied().collect()
    }

    #[test]
    fn set_lattice_union_and_intersection() {
        let a = set(&[1, 2]);
        let b = set(&[2, 3]);
        assert_eq!(a.join(&b), set(&[1, 2, 3]));
        assert_eq!(a.meet(&b), set(&[2]));
        assert!(set(&[2]).is_subseteq(&a));
        assert!(!a.is_subseteq(&b));
        assert!(a.is_subseteq(&SetLattice::top()));
        assert!(SetLattice::<i64>::bottom().is_subseteq(&a));
    }

    #[test]
    fn non_redundant_set_drops_subsumed_elements() {
        let a = NonRedundantSet::new().insert(set(&[1])).insert(set(&[1, 2]));
        assert_eq!(a.len(), 1);
        // Inserting something already covered is a no-op.
        let b = a.insert(set(&[2]));
        assert_eq!(b.len(), 1);
        // Incomparable elements are both kept.
        let c = a.insert(set(&[3, 4]));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn non_redundant_set_equality_ignores_order() {
        let a = NonRedundantSet::new().insert(set(&[1])).insert(set(&[9]));
        let b = NonRedundantSet::new().insert(set(&[9])).insert(set(&[1]));
        assert_eq!(a, b);
    }
}
