//! Ready-made abstract domains: non-relational value abstractions, a
//! dataflow element, and the type-inference domain.
//!
//! Each domain here plugs into the engine through
//! [`sable_analysis::ValueEnvironment`] or
//! [`sable_analysis::PossibleDataflow`].

mod constant;
mod interval;
mod reaching;
mod sign;
mod types;

pub use constant::ConstantPropagation;
pub use interval::{Bound, IntInterval};
pub use reaching::ReachingDefinition;
pub use sign::Sign;
pub use types::TypeInference;
