/// Error type for lattice invariant violations.
///
/// These surface only on internal invariants (e.g. joining auxiliary info
/// entries of two different concrete types under the same key), never on
/// ordinary values: unrepresentable inputs must over-approximate to top
/// instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    /// Two values stored under the same auxiliary-info key have different
    /// concrete types and cannot be combined.
    #[error("incompatible lattice values under key `{key}`")]
    IncompatibleValues { key: String },
    /// A scope operation was applied to an element outside that scope.
    #[error("identifier `{id}` is not in the scope being popped")]
    ScopeMismatch { id: String },
}
