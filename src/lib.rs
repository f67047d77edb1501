//! `sable` — a modular abstract-interpretation framework.
//!
//! Frontends lower programs into [`sable_ir`] CFGs; the engine in
//! [`sable_analysis`] computes context-sensitive fixpoints of the abstract
//! domains chosen through the entry state; the crates re-exported here are
//! everything a consumer needs to configure and run an analysis.
//!
//! ```
//! use sable::analysis::{
//!     AnalysisConfiguration, AnalysisState, PointBasedHeap, Sable, SimpleState, ValueEnvironment,
//! };
//! use sable::domains::{IntInterval, TypeInference};
//! use sable::ir::{CodeLocation, Expr, Program};
//!
//! let mut program = Program::new();
//! let mut cfg = sable::ir::CfgBuilder::new(sable::ir::CfgDescriptor::new("main"));
//! cfg.assign(Expr::var("x"), Expr::int(3), CodeLocation::line(1));
//! cfg.ret(Some(Expr::var("x")), CodeLocation::line(2));
//! program.add_cfg(cfg.finish().unwrap()).unwrap();
//! program.add_entrypoint("main");
//!
//! let entry = AnalysisState::new(SimpleState::new(
//!     PointBasedHeap::new(),
//!     ValueEnvironment::<IntInterval>::new(),
//!     ValueEnvironment::<TypeInference>::new(),
//! ));
//! let report = Sable::new(AnalysisConfiguration::new(entry))
//!     .run(&mut program)
//!     .unwrap();
//! assert!(report.is_clean());
//! ```

pub use sable_analysis as analysis;
pub use sable_ir as ir;
pub use sable_lattice as lattice;

#[cfg(feature = "domains")]
pub use sable_domains as domains;

/// The types most consumers need, under one import.
pub mod prelude {
    pub use sable_analysis::{
        AnalysisConfiguration, AnalysisReport, AnalysisState, PointBasedHeap, Sable, SimpleState,
        ValueEnvironment,
    };
    pub use sable_ir::{Cfg, CfgBuilder, CfgDescriptor, CodeLocation, Expr, Program, Stmt};
    pub use sable_lattice::{AbstractDomain, HasBottom, HasTop, Lattice};
}
