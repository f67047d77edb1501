use sable_ir::{CodeLocation, ProgramError};
use sable_lattice::LatticeError;

use crate::interproc::CallGraphError;

/// A domain refused a semantic step.
///
/// Semantic errors abort the fixpoint of the CFG they occur in; the driver
/// records them and moves on to the next CFG.
#[derive(Debug, thiserror::Error)]
pub enum SemanticError {
    /// The left-hand side of an assignment did not rewrite to any identifier.
    #[error("`{expr}` did not rewrite to an assignable identifier")]
    NoRewrittenIdentifier { expr: String },
    /// A heap expression survived rewriting and reached a value-level domain.
    #[error("heap expression `{expr}` reached the value domain")]
    HeapExpressionInValueDomain { expr: String },
    /// Rewriting produced no value expressions at all.
    #[error("rewriting `{expr}` produced no value expressions")]
    EmptyRewrite { expr: String },
    /// A call was bound to a callee with a different number of formals.
    #[error("arity mismatch calling `{function}`: expected {expected} arguments, got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Lattice(#[from] LatticeError),
}

/// Failure of a CFG or interprocedural fixpoint.
#[derive(Debug, thiserror::Error)]
pub enum FixpointError {
    /// A semantic step failed at the given program point.
    #[error("semantic error at {location}: {source}")]
    Semantic {
        location: CodeLocation,
        #[source]
        source: SemanticError,
    },
    /// The ascending iteration did not stabilize within its fuel. With
    /// correct widening operators this indicates a broken domain.
    #[error("fixpoint of `{cfg}` did not stabilize within {fuel} iterations")]
    NonTerminating { cfg: String, fuel: usize },
    /// Recursive call stabilization exceeded its iteration bound.
    #[error("recursion through `{cfg}` failed to stabilize")]
    DivergentRecursion { cfg: String },
    /// A call had no targets and the open-call policy forbids continuing.
    #[error("call to `{function}` at {location} could not be resolved")]
    UnresolvedCall {
        function: String,
        location: CodeLocation,
    },
    /// The CFG under analysis has no entry statement.
    #[error("cfg `{cfg}` has no entry statement")]
    MissingEntry { cfg: String },
    /// No state was recorded for a statement the caller asked about.
    #[error("no analysis state recorded for {statement} in `{cfg}`")]
    MissingResult {
        cfg: String,
        statement: sable_ir::StatementId,
    },
    /// Cooperative cancellation was requested; partial summaries are kept.
    #[error("analysis cancelled")]
    Cancelled,
    #[error(transparent)]
    CallGraph(#[from] CallGraphError),
}

impl FixpointError {
    pub(crate) fn semantic(location: CodeLocation, source: SemanticError) -> Self {
        FixpointError::Semantic { location, source }
    }
}

/// Misconfiguration detected before any fixpoint runs. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("widening threshold must be at least 1, got {got}")]
    InvalidWideningThreshold { got: u32 },
    #[error("graph dumping with `optimize` requires `dump_forces_unwinding`")]
    DumpWithoutUnwinding,
}

/// Umbrella error for a whole analysis run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Validation(#[from] ProgramError),
    #[error(transparent)]
    Fixpoint(#[from] FixpointError),
}

impl AnalysisError {
    /// Process exit code for driver binaries: 1 setup, 2 fixpoint,
    /// 3 validation. A successful run exits 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            AnalysisError::Setup(_) => 1,
            AnalysisError::Fixpoint(_) => 2,
            AnalysisError::Validation(_) => 3,
        }
    }
}
