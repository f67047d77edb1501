use std::fmt::Debug;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::{AbstractDomain, HasBottom, HasTop, Lattice};

/// A pointwise map lattice from keys to lattice elements.
///
/// The two sentinels are kept apart from the functional representation:
/// `Top` is the completely unknown environment and `Bottom` means
/// *unreachable*. All binary operators act pointwise on the union of the
/// keysets, with missing keys standing in as the element bottom — the
/// identity of join — so a binding established on one branch survives the
/// merge. Semantic *reads* are different: [`Environment::get_state`] answers
/// top for a key that was never bound, since nothing is known about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment<K: Eq + Hash, V> {
    Bottom,
    Top,
    Map(FxHashMap<K, V>),
}

impl<K: Eq + Hash, V> Default for Environment<K, V> {
    fn default() -> Self {
        Environment::Map(FxHashMap::default())
    }
}

impl<K, V> Environment<K, V>
where
    K: Clone + Eq + Hash,
    V: Lattice,
{
    /// The empty functional environment (no key is constrained).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        match self {
            Environment::Map(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_map(&self) -> Option<&FxHashMap<K, V>> {
        match self {
            Environment::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Iterate over the bound keys. Sentinel environments bind no keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.as_map().into_iter().flat_map(|map| map.keys())
    }

    /// Iterate over `(key, element)` bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.as_map().into_iter().flat_map(|map| map.iter())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Bind `key` to `value`, replacing any previous binding (strong update).
    ///
    /// Assigning on the bottom environment is a no-op: nothing is reachable
    /// there.
    pub fn put(&self, key: K, value: V) -> Self {
        match self {
            Environment::Bottom => Environment::Bottom,
            Environment::Top => Environment::Map(FxHashMap::from_iter([(key, value)])),
            Environment::Map(map) => {
                let mut map = map.clone();
                map.insert(key, value);
                Environment::Map(map)
            }
        }
    }

    /// Bind `key` to the join of `value` and its current binding, if any
    /// (weak update).
    pub fn weak_put(&self, key: K, value: V) -> Self {
        let merged = match self.get(&key) {
            Some(old) => old.join(&value),
            None => value,
        };
        self.put(key, merged)
    }

    /// Strong update when `weak` is false, weak update otherwise.
    pub fn put_state(&self, key: K, value: V, weak: bool) -> Self {
        if weak {
            self.weak_put(key, value)
        } else {
            self.put(key, value)
        }
    }

    /// Read the element bound to `key`.
    ///
    /// Top and bottom environments answer with the respective sentinel of the
    /// element lattice; otherwise the stored element, defaulting to top for
    /// keys that were never bound.
    pub fn get_state(&self, key: &K) -> V
    where
        V: HasBottom + HasTop,
    {
        match self {
            Environment::Bottom => V::bottom(),
            Environment::Top => V::top(),
            Environment::Map(map) => map.get(key).cloned().unwrap_or_else(V::top),
        }
    }

    /// Remove the binding for `key`, if any.
    pub fn forget(&self, key: &K) -> Self {
        match self {
            Environment::Map(map) if map.contains_key(key) => {
                let mut map = map.clone();
                map.remove(key);
                Environment::Map(map)
            }
            other => other.clone(),
        }
    }

    /// Remove every binding whose key satisfies `pred`.
    pub fn forget_if(&self, pred: impl Fn(&K) -> bool) -> Self {
        match self {
            Environment::Map(map) => {
                let mut map = map.clone();
                map.retain(|k, _| !pred(k));
                Environment::Map(map)
            }
            other => other.clone(),
        }
    }

    /// Rebuild the environment with every element passed through `f`.
    pub fn map_values(&self, f: impl Fn(&V) -> V) -> Self {
        match self {
            Environment::Map(map) => {
                Environment::Map(map.iter().map(|(k, v)| (k.clone(), f(v))).collect())
            }
            other => other.clone(),
        }
    }

    /// Rebuild the environment with every key passed through `f`.
    ///
    /// Returning `None` drops the binding; keys that collide after renaming
    /// have their elements joined. Used by scope push/pop, which renames
    /// identifiers wholesale.
    pub fn rename_keys(&self, f: impl Fn(&K) -> Option<K>) -> Self {
        match self {
            Environment::Map(map) => {
                let mut out: FxHashMap<K, V> = FxHashMap::default();
                for (k, v) in map {
                    let Some(k) = f(k) else { continue };
                    match out.remove(&k) {
                        Some(old) => {
                            let joined = old.join(v);
                            out.insert(k, joined);
                        }
                        None => {
                            out.insert(k, v.clone());
                        }
                    }
                }
                Environment::Map(out)
            }
            other => other.clone(),
        }
    }
}

impl<K, V> Lattice for Environment<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Lattice + HasBottom,
{
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Environment::Bottom, x) | (x, Environment::Bottom) => x.clone(),
            (Environment::Top, _) | (_, Environment::Top) => Environment::Top,
            (Environment::Map(a), Environment::Map(b)) => {
                // Union of the keysets: a key on one side only joins with
                // bottom, which is itself.
                let mut out = a.clone();
                for (k, w) in b {
                    match out.remove(k) {
                        Some(v) => {
                            out.insert(k.clone(), v.join(w));
                        }
                        None => {
                            out.insert(k.clone(), w.clone());
                        }
                    }
                }
                Environment::Map(out)
            }
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Environment::Bottom, _) | (_, Environment::Bottom) => Environment::Bottom,
            (Environment::Top, x) | (x, Environment::Top) => x.clone(),
            (Environment::Map(a), Environment::Map(b)) => {
                // A key on one side only meets with bottom: the binding
                // disappears.
                let mut out = FxHashMap::default();
                for (k, v) in a {
                    if let Some(w) = b.get(k) {
                        out.insert(k.clone(), v.meet(w));
                    }
                }
                Environment::Map(out)
            }
        }
    }

    fn is_subseteq(&self, other: &Self) -> bool {
        match (self, other) {
            (Environment::Bottom, _) | (_, Environment::Top) => true,
            (_, Environment::Bottom) => matches!(self, Environment::Bottom),
            (Environment::Top, _) => matches!(other, Environment::Top),
            (Environment::Map(a), Environment::Map(b)) => a.iter().all(|(k, v)| match b.get(k) {
                Some(w) => v.is_subseteq(w),
                None => v.is_bottom(),
            }),
        }
    }
}

impl<K, V> HasBottom for Environment<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Lattice + HasBottom,
{
    fn bottom() -> Self {
        Environment::Bottom
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Environment::Bottom)
    }
}

impl<K, V> HasTop for Environment<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Lattice + HasBottom,
{
    fn top() -> Self {
        Environment::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, Environment::Top)
    }
}

impl<K, V> AbstractDomain for Environment<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: AbstractDomain,
{
    fn widen(&self, next: &Self) -> Self {
        match (self, next) {
            (Environment::Bottom, x) | (x, Environment::Bottom) => x.clone(),
            (Environment::Top, _) | (_, Environment::Top) => Environment::Top,
            (Environment::Map(a), Environment::Map(b)) => {
                let mut out = a.clone();
                for (k, w) in b {
                    match out.remove(k) {
                        Some(v) => {
                            out.insert(k.clone(), v.widen(w));
                        }
                        None => {
                            out.insert(k.clone(), w.clone());
                        }
                    }
                }
                Environment::Map(out)
            }
        }
    }

    fn narrow(&self, next: &Self) -> Self {
        match (self, next) {
            (Environment::Bottom, _) | (_, Environment::Bottom) => Environment::Bottom,
            (Environment::Top, x) => x.clone(),
            (x, Environment::Top) => x.clone(),
            (Environment::Map(a), Environment::Map(b)) => {
                // Keys only on the refining side would narrow bottom and must
                // stay out; keys only on our side keep their element.
                let mut out = a.clone();
                for (k, w) in b {
                    if let Some(v) = out.remove(k) {
                        out.insert(k.clone(), v.narrow(w));
                    }
                }
                Environment::Map(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SetLattice;

    type Env = Environment<&'static str, SetLattice<i64>>;

    fn set(values: &[i64]) -> SetLattice<i64> {
        values.iter().copied().collect()
    }

    fn stored(env: &Env, key: &'static str) -> SetLattice<i64> {
        env.get(&key).cloned().unwrap_or_else(SetLattice::bottom)
    }

    #[test]
    fn join_acts_pointwise_on_the_key_union() {
        let a = Env::new().put("x", set(&[1])).put("y", set(&[2]));
        let b = Env::new().put("x", set(&[3])).put("z", set(&[4]));
        let j = a.join(&b);
        assert_eq!(stored(&j, "x"), set(&[1, 3]));
        // Keys bound on one side only keep their binding across the merge.
        assert_eq!(stored(&j, "y"), set(&[2]));
        assert_eq!(stored(&j, "z"), set(&[4]));
        // Pointwise agreement: (a ⊔ b)[k] == a[k] ⊔ b[k] for every key,
        // missing keys standing in as the join identity.
        for k in ["x", "y", "z", "w"] {
            assert_eq!(stored(&j, k), stored(&a, k).join(&stored(&b, k)));
        }
    }

    #[test]
    fn meet_keeps_the_key_intersection() {
        let a = Env::new().put("x", set(&[1, 2])).put("y", set(&[2]));
        let b = Env::new().put("x", set(&[2, 3])).put("z", set(&[4]));
        let m = a.meet(&b);
        assert_eq!(stored(&m, "x"), set(&[2]));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn missing_keys_read_as_top() {
        let a = Env::new().put("x", set(&[1]));
        assert!(a.get_state(&"nope").is_top());
        assert_eq!(Env::top().get_state(&"nope"), SetLattice::top());
        assert!(Env::bottom().get_state(&"x").is_bottom());
    }

    #[test]
    fn weak_put_joins_with_previous_binding() {
        let a = Env::new().put("x", set(&[1]));
        let weak = a.weak_put("x", set(&[2]));
        assert_eq!(weak.get_state(&"x"), set(&[1, 2]));
        let strong = a.put("x", set(&[2]));
        assert_eq!(strong.get_state(&"x"), set(&[2]));
        // A weak update to an unconstrained key introduces the constraint.
        assert_eq!(a.weak_put("y", set(&[9])).get_state(&"y"), set(&[9]));
    }

    #[test]
    fn ordering_respects_sentinels_and_bindings() {
        let a = Env::new().put("x", set(&[1]));
        let wider = Env::new().put("x", set(&[1, 5]));
        assert!(Env::bottom().is_subseteq(&a));
        assert!(a.is_subseteq(&Env::top()));
        assert!(!a.is_subseteq(&Env::bottom()));
        assert!(a.is_subseteq(&wider));
        assert!(!wider.is_subseteq(&a));
        // The unbound environment sits below every binding.
        assert!(Env::new().is_subseteq(&a));
        assert!(!a.is_subseteq(&Env::new()));
    }

    #[test]
    fn forget_removes_bindings() {
        let a = Env::new().put("x", set(&[1])).put("y", set(&[2]));
        let f = a.forget(&"x");
        assert!(f.get_state(&"x").is_top());
        assert_eq!(f.get_state(&"y"), set(&[2]));
        let none = a.forget_if(|_| true);
        assert!(none.is_empty());
    }

    #[test]
    fn rename_joins_on_collision() {
        let a = Env::new().put("x", set(&[1])).put("y", set(&[2]));
        let r = a.rename_keys(|_| Some("z"));
        assert_eq!(r.get_state(&"z"), set(&[1, 2]));
        assert_eq!(r.len(), 1);
    }
}
