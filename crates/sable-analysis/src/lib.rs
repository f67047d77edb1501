//! The analysis engine: semantic domains, fixpoint computation and the
//! interprocedural driver.
//!
//! The engine is single-threaded and cooperative: one driver owns the
//! worklists and advances them to completion, checking a cancellation flag
//! between pops. Abstract states are only ever transformed functionally —
//! every semantic step yields a fresh value.

mod analysis_state;
mod checks;
mod conf;
mod dataflow;
mod dump;
mod error;
mod exprset;
mod fixpoint;
mod heap;
mod info;
mod interproc;
mod nonrelational;
mod replacement;
mod semantics;
mod state;
mod worklist;

pub use analysis_state::AnalysisState;
pub use checks::{CheckTool, SemanticCheck, StatementResults, SyntacticCheck, Warning};
pub use conf::{AnalysisConfiguration, AnalysisReport, Sable};
pub use dataflow::{DataflowElement, PossibleDataflow};
pub use dump::{AnalysisGraphs, RenderedGraph, SerializableEdge, SerializableGraph, SerializableNode};
pub use error::{AnalysisError, FixpointError, SemanticError, SetupError};
pub use exprset::ExprSet;
pub use fixpoint::{AnalyzedCfg, CallEvaluator, CallSite, FixpointConfiguration};
pub use heap::PointBasedHeap;
pub use info::{DynLattice, FixpointInfo};
pub use interproc::{
    CallGraph, ContextSensitivity, ContextToken, ContextBasedAnalysis, OpenCallPolicy,
    ProgramCallGraph,
};
pub use nonrelational::{NonRelationalDomain, ValueEnvironment};
pub use replacement::HeapReplacement;
pub use semantics::{AbstractState, HeapDomain, SemanticDomain, ValueDomain};
pub use state::SimpleState;
pub use worklist::{
    DuplicateFree, FifoWorkingSet, LifoWorkingSet, WorkingSet, WorkingSetError, WorkingSetKind,
};
