use std::any::Any;
use std::fmt::Debug;

use rustc_hash::FxHashMap;
use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice};

/// Object-safe view of an [`AbstractDomain`] value, so auxiliary fixpoint
/// information can mix entries of different concrete domains under one map.
///
/// Binary operations return `None` when the two operands have different
/// concrete types; the map resolves that to the unknown entry, following the
/// rule that unrepresentable inputs over-approximate instead of failing.
pub trait DynLattice: Any + Debug + Send + Sync {
    fn dyn_clone(&self) -> Box<dyn DynLattice>;
    fn dyn_join(&self, other: &dyn DynLattice) -> Option<Box<dyn DynLattice>>;
    fn dyn_widen(&self, other: &dyn DynLattice) -> Option<Box<dyn DynLattice>>;
    fn dyn_narrow(&self, other: &dyn DynLattice) -> Option<Box<dyn DynLattice>>;
    fn dyn_is_subseteq(&self, other: &dyn DynLattice) -> Option<bool>;
    fn dyn_eq(&self, other: &dyn DynLattice) -> bool;
    fn dyn_is_bottom(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: AbstractDomain + Send + Sync + 'static> DynLattice for T {
    fn dyn_clone(&self) -> Box<dyn DynLattice> {
        Box::new(self.clone())
    }

    fn dyn_join(&self, other: &dyn DynLattice) -> Option<Box<dyn DynLattice>> {
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|o| Box::new(self.join(o)) as Box<dyn DynLattice>)
    }

    fn dyn_widen(&self, other: &dyn DynLattice) -> Option<Box<dyn DynLattice>> {
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|o| Box::new(self.widen(o)) as Box<dyn DynLattice>)
    }

    fn dyn_narrow(&self, other: &dyn DynLattice) -> Option<Box<dyn DynLattice>> {
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|o| Box::new(self.narrow(o)) as Box<dyn DynLattice>)
    }

    fn dyn_is_subseteq(&self, other: &dyn DynLattice) -> Option<bool> {
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|o| self.is_subseteq(o))
    }

    fn dyn_eq(&self, other: &dyn DynLattice) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|o| self == o)
    }

    fn dyn_is_bottom(&self) -> bool {
        self.is_bottom()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Entry standing in for two incompatible values merged under one key.
#[derive(Debug, Clone, PartialEq)]
struct UnknownInfo;

impl Lattice for UnknownInfo {
    fn join(&self, _other: &Self) -> Self {
        UnknownInfo
    }

    fn meet(&self, _other: &Self) -> Self {
        UnknownInfo
    }

    fn is_subseteq(&self, _other: &Self) -> bool {
        true
    }
}

impl HasBottom for UnknownInfo {
    fn bottom() -> Self {
        UnknownInfo
    }

    fn is_bottom(&self) -> bool {
        false
    }
}

impl HasTop for UnknownInfo {
    fn top() -> Self {
        UnknownInfo
    }
}

impl AbstractDomain for UnknownInfo {
    fn widen(&self, next: &Self) -> Self {
        self.join(next)
    }
}

/// Auxiliary per-program-point data: a map lattice from string keys to
/// type-erased lattice values.
///
/// Bottom values are first-class entries — storing one does not delete the
/// key. `store` replaces, `weak_store` joins with the previous value.
#[derive(Debug, Default)]
pub enum FixpointInfo {
    Finite(FxHashMap<String, Box<dyn DynLattice>>),
    #[default]
    Unreached,
    Top,
}

impl FixpointInfo {
    pub fn new() -> Self {
        FixpointInfo::Finite(FxHashMap::default())
    }

    fn map(&self) -> Option<&FxHashMap<String, Box<dyn DynLattice>>> {
        match self {
            FixpointInfo::Finite(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_none_or(FxHashMap::is_empty)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Look up and downcast the entry under `key`.
    pub fn get<T: AbstractDomain + 'static>(&self, key: &str) -> Option<&T> {
        self.map()?.get(key)?.as_any().downcast_ref::<T>()
    }

    /// Strong update: replace whatever was stored under `key`.
    pub fn store(&self, key: impl Into<String>, value: impl DynLattice) -> Self {
        let mut map = self.map().map(clone_map).unwrap_or_default();
        map.insert(key.into(), Box::new(value));
        FixpointInfo::Finite(map)
    }

    /// Weak update: join `value` with the current entry under `key`.
    pub fn weak_store(&self, key: impl Into<String>, value: impl DynLattice) -> Self {
        let key = key.into();
        let mut map = self.map().map(clone_map).unwrap_or_default();
        let merged: Box<dyn DynLattice> = match map.get(&key) {
            Some(old) => old
                .dyn_join(&value)
                .unwrap_or_else(|| Box::new(UnknownInfo)),
            None => Box::new(value),
        };
        map.insert(key, merged);
        FixpointInfo::Finite(map)
    }
}

fn clone_map(map: &FxHashMap<String, Box<dyn DynLattice>>) -> FxHashMap<String, Box<dyn DynLattice>> {
    map.iter().map(|(k, v)| (k.clone(), v.dyn_clone())).collect()
}

fn merge_maps(
    a: &FxHashMap<String, Box<dyn DynLattice>>,
    b: &FxHashMap<String, Box<dyn DynLattice>>,
    op: impl Fn(&dyn DynLattice, &dyn DynLattice) -> Option<Box<dyn DynLattice>>,
) -> FxHashMap<String, Box<dyn DynLattice>> {
    let mut out = clone_map(a);
    for (k, w) in b {
        let merged = match out.remove(k) {
            Some(v) => op(v.as_ref(), w.as_ref()).unwrap_or_else(|| Box::new(UnknownInfo)),
            None => w.dyn_clone(),
        };
        out.insert(k.clone(), merged);
    }
    out
}

impl Clone for FixpointInfo {
    fn clone(&self) -> Self {
        match self {
            FixpointInfo::Finite(map) => FixpointInfo::Finite(clone_map(map)),
            FixpointInfo::Unreached => FixpointInfo::Unreached,
            FixpointInfo::Top => FixpointInfo::Top,
        }
    }
}

impl PartialEq for FixpointInfo {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FixpointInfo::Unreached, FixpointInfo::Unreached)
            | (FixpointInfo::Top, FixpointInfo::Top) => true,
            (FixpointInfo::Finite(a), FixpointInfo::Finite(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.dyn_eq(w.as_ref())))
            }
            _ => false,
        }
    }
}

impl Lattice for FixpointInfo {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (FixpointInfo::Unreached, x) | (x, FixpointInfo::Unreached) => x.clone(),
            (FixpointInfo::Top, _) | (_, FixpointInfo::Top) => FixpointInfo::Top,
            (FixpointInfo::Finite(a), FixpointInfo::Finite(b)) => {
                FixpointInfo::Finite(merge_maps(a, b, |v, w| v.dyn_join(w)))
            }
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (FixpointInfo::Unreached, _) | (_, FixpointInfo::Unreached) => FixpointInfo::Unreached,
            (FixpointInfo::Top, x) | (x, FixpointInfo::Top) => x.clone(),
            (FixpointInfo::Finite(a), FixpointInfo::Finite(b)) => {
                // Keys on one side only keep their entry; the other side has
                // no information to intersect with.
                FixpointInfo::Finite(merge_maps(a, b, |v, w| {
                    if v.dyn_is_subseteq(w) == Some(true) {
                        Some(v.dyn_clone())
                    } else if w.dyn_is_subseteq(v) == Some(true) {
                        Some(w.dyn_clone())
                    } else {
                        None
                    }
                }))
            }
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        match (self, other) {
            (FixpointInfo::Unreached, _) | (_, FixpointInfo::Top) => true,
            (_, FixpointInfo::Unreached) => matches!(self, FixpointInfo::Unreached),
            (FixpointInfo::Top, _) => matches!(other, FixpointInfo::Top),
            (FixpointInfo::Finite(a), FixpointInfo::Finite(b)) => a.iter().all(|(k, v)| {
                match b.get(k) {
                    Some(w) => v.dyn_is_subseteq(w.as_ref()) == Some(true),
                    None => v.dyn_is_bottom(),
                }
            }),
        }
    }
}

impl HasBottom for FixpointInfo {
    fn bottom() -> Self {
        FixpointInfo::Unreached
    }

    fn is_bottom(&self) -> bool {
        matches!(self, FixpointInfo::Unreached)
    }
}

impl HasTop for FixpointInfo {
    fn top() -> Self {
        FixpointInfo::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, FixpointInfo::Top)
    }
}

impl AbstractDomain for FixpointInfo {
    fn widen(&self, next: &Self) -> Self {
        match (self, next) {
            (FixpointInfo::Finite(a), FixpointInfo::Finite(b)) => {
                FixpointInfo::Finite(merge_maps(a, b, |v, w| v.dyn_widen(w)))
            }
            _ => self.join(next),
        }
    }

    fn narrow(&self, next: &Self) -> Self {
        match (self, next) {
            (FixpointInfo::Finite(a), FixpointInfo::Finite(b)) => {
                FixpointInfo::Finite(merge_maps(a, b, |v, w| v.dyn_narrow(w)))
            }
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_lattice::{SetLattice, Satisfiability};

    fn set(values: &[i64]) -> SetLattice<i64> {
        values.iter().copied().collect()
    }

    #[test]
    fn strong_store_replaces_and_weak_store_joins() {
        let info = FixpointInfo::new().store("defs", set(&[1]));
        let strong = info.store("defs", set(&[2]));
        assert_eq!(strong.get::<SetLattice<i64>>("defs"), Some(&set(&[2])));
        let weak = info.weak_store("defs", set(&[2]));
        assert_eq!(weak.get::<SetLattice<i64>>("defs"), Some(&set(&[1, 2])));
    }

    #[test]
    fn bottom_values_are_preserved_as_entries() {
        let info = FixpointInfo::new().store("empty", SetLattice::<i64>::bottom());
        assert_eq!(info.keys().count(), 1);
        assert!(info
            .get::<SetLattice<i64>>("empty")
            .is_some_and(SetLattice::is_bottom));
    }

    #[test]
    fn mismatched_types_join_to_the_unknown_entry() {
        let info = FixpointInfo::new().store("k", set(&[1]));
        let merged = info.weak_store("k", Satisfiability::Satisfied);
        // The entry survives but no longer downcasts to either type.
        assert_eq!(merged.keys().count(), 1);
        assert!(merged.get::<SetLattice<i64>>("k").is_none());
        assert!(merged.get::<Satisfiability>("k").is_none());
    }

    #[test]
    fn join_is_pointwise_on_the_key_union() {
        let a = FixpointInfo::new().store("x", set(&[1]));
        let b = FixpointInfo::new().store("x", set(&[2])).store("y", set(&[3]));
        let j = a.join(&b);
        assert_eq!(j.get::<SetLattice<i64>>("x"), Some(&set(&[1, 2])));
        assert_eq!(j.get::<SetLattice<i64>>("y"), Some(&set(&[3])));
        assert!(a.is_subseteq(&j) && b.is_subseteq(&j));
    }
}
