use std::fmt;

use smallvec::SmallVec;

/// The static types the engine distinguishes.
///
/// The engine is parametric in the actual type system; this enum is the
/// fixed vocabulary frontends map their types onto. `Reference` is the type
/// of heap addresses, `Untyped` the absence of frontend information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StaticType {
    Bool,
    Int,
    Float,
    Str,
    Reference,
    Unit,
    Untyped,
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StaticType::Bool => "bool",
            StaticType::Int => "int",
            StaticType::Float => "float",
            StaticType::Str => "str",
            StaticType::Reference => "ref",
            StaticType::Unit => "unit",
            StaticType::Untyped => "untyped",
        };
        f.write_str(name)
    }
}

/// A sorted, duplicate-free set of static types.
///
/// Kept small and ordered so that expressions and identifiers carrying type
/// sets stay cheap to hash and compare.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TypeSet(SmallVec<[StaticType; 4]>);

impl TypeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(ty: StaticType) -> Self {
        TypeSet(SmallVec::from_slice(&[ty]))
    }

    pub fn untyped() -> Self {
        Self::single(StaticType::Untyped)
    }

    pub fn contains(&self, ty: StaticType) -> bool {
        self.0.binary_search(&ty).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = StaticType> + '_ {
        self.0.iter().copied()
    }

    pub fn insert(&self, ty: StaticType) -> Self {
        let mut out = self.0.clone();
        if let Err(pos) = out.binary_search(&ty) {
            out.insert(pos, ty);
        }
        TypeSet(out)
    }

    pub fn union(&self, other: &Self) -> Self {
        other.iter().fold(self.clone(), |acc, ty| acc.insert(ty))
    }

    pub fn intersection(&self, other: &Self) -> Self {
        TypeSet(self.0.iter().copied().filter(|ty| other.contains(*ty)).collect())
    }
}

impl FromIterator<StaticType> for TypeSet {
    fn from_iter<I: IntoIterator<Item = StaticType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, ty| acc.insert(ty))
    }
}

impl From<StaticType> for TypeSet {
    fn from(ty: StaticType) -> Self {
        Self::single(ty)
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, ty) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_sets_stay_sorted_and_deduplicated() {
        let ts: TypeSet = [StaticType::Int, StaticType::Bool, StaticType::Int]
            .into_iter()
            .collect();
        assert_eq!(ts.iter().collect::<Vec<_>>(), vec![StaticType::Bool, StaticType::Int]);
        assert_eq!(ts, ts.union(&TypeSet::single(StaticType::Bool)));
        assert_eq!(
            ts.intersection(&TypeSet::single(StaticType::Int)),
            TypeSet::single(StaticType::Int)
        );
    }
}
