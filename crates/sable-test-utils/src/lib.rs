//! Shared testing helpers: lattice-law assertions and ready-made CFG shapes.

pub mod cfg;
pub mod lattice;
