//! Lattice algebra underlying the analysis engine.
//!
//! The traits in [`lattice`] spell out the algebraic contracts every abstract
//! domain must satisfy; [`env`] provides the pointwise map lattice used for
//! variable and heap environments, and [`set`] the powerset lattices.

mod env;
mod error;
mod lattice;
mod sat;
mod set;

pub use env::Environment;
pub use error::LatticeError;
pub use lattice::{AbstractDomain, FiniteLattice, HasBottom, HasTop, Lattice};
pub use sat::Satisfiability;
pub use set::{NonRedundantSet, SetLattice};
