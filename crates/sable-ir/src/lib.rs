//! Language-independent program representation.
//!
//! Frontends lower source programs into [`Cfg`]s whose statements root
//! [`Expr`] trees; the analysis engine only ever sees this representation.

mod builder;
mod cfg;
mod expr;
mod ident;
mod location;
mod program;
mod scope;
mod types;

pub use builder::CfgBuilder;
pub use cfg::{BasicBlocks, Cfg, CfgDescriptor, CfgError, EdgeKind, StatementId, Stmt};
pub use expr::{BinaryOp, Constant, Expr, TernaryOp, UnaryOp};
pub use ident::{AllocationSite, Identifier, PointerIdentifier, Variable};
pub use location::CodeLocation;
pub use program::{Program, ProgramError};
pub use scope::ScopeToken;
pub use types::{StaticType, TypeSet};
