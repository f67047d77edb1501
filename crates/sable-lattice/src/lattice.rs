use std::fmt::Debug;

/// A lattice with join (least upper bound), meet (greatest lower bound),
/// and a partial ordering.
///
/// Implementations must satisfy the following algebraic laws:
///
/// **Join** (least upper bound):
/// - Associative: `a.join(&b).join(&c) == a.join(&b.join(&c))`
/// - Commutative: `a.join(&b) == b.join(&a)`
/// - Idempotent: `a.join(&a) == a`
///
/// **Meet** (greatest lower bound):
/// - Associative: `a.meet(&b).meet(&c) == a.meet(&b.meet(&c))`
/// - Commutative: `a.meet(&b) == b.meet(&a)`
/// - Idempotent: `a.meet(&a) == a`
///
/// **Ordering consistency** (`is_subseteq` must agree with join/meet):
/// - `a.is_subseteq(&b)` if and only if `a.join(&b) == b`
/// - `a.is_subseteq(&b)` if and only if `a.meet(&b) == a`
///
/// `PartialEq` must be consistent with mutual ordering:
/// `a == b` exactly when `a.is_subseteq(&b) && b.is_subseteq(&a)`.
///
/// Use the assertion helpers in `sable-test-utils` to verify these properties
/// in tests.
pub trait Lattice: Clone + PartialEq + Debug {
    fn join(&self, other: &Self) -> Self;
    fn meet(&self, other: &Self) -> Self;
    fn is_subseteq(&self, other: &Self) -> bool;
}

/// A lattice with a bottom element (least element).
///
/// Bottom is reserved for *unreachable* states. Domain operations must never
/// use it to signal errors; unrepresentable inputs over-approximate to top.
///
/// The bottom element must satisfy:
/// - `bottom().is_subseteq(&x)` for all `x`
/// - `bottom().join(&x) == x` for all `x`
/// - `bottom().meet(&x) == bottom()` for all `x`
pub trait HasBottom: Lattice {
    fn bottom() -> Self;

    fn is_bottom(&self) -> bool {
        *self == Self::bottom()
    }
}

/// A lattice with a top element (greatest element).
///
/// The top element must satisfy:
/// - `x.is_subseteq(&top())` for all `x`
/// - `top().join(&x) == top()` for all `x`
/// - `top().meet(&x) == x` for all `x`
pub trait HasTop: Lattice {
    fn top() -> Self;

    fn is_top(&self) -> bool {
        *self == Self::top()
    }
}

/// A lattice that has both a bottom and a top element.
pub trait FiniteLattice: HasBottom + HasTop {}

impl<T: HasBottom + HasTop> FiniteLattice for T {}

/// An abstract domain: a bounded lattice extended with widening and
/// narrowing. These are the operators the fixpoint engine iterates.
///
/// No blanket implementation — every domain must explicitly define its own
/// widening operator, even when it coincides with join.
///
/// ## Algebraic contracts
///
/// **Widening**: `x.join(&y).is_subseteq(&x.widen(&y))`, and the ascending
/// chain `a₀ = x₀, aᵢ₊₁ = aᵢ.widen(&xᵢ₊₁)` must stabilize in finitely many
/// steps for any sequence `x₀ ⊑ x₁ ⊑ …`.
///
/// **Narrowing**: `x.meet(&y).is_subseteq(&x.narrow(&y))` and
/// `x.narrow(&y).is_subseteq(&x)`; the descending chain must also stabilize.
pub trait AbstractDomain: FiniteLattice {
    /// Widen `self` with `next` to guarantee ascending chain termination.
    fn widen(&self, next: &Self) -> Self;

    /// Narrow `self` with `next` to refine a post-fixpoint downward.
    ///
    /// Default: no refinement (returns `self`).
    fn narrow(&self, _next: &Self) -> Self {
        self.clone()
    }
}
