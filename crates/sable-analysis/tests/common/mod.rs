//! Shared scaffolding for the end-to-end tests.
#![allow(dead_code)]

use sable_analysis::{
    AnalysisConfiguration, AnalysisReport, AnalysisState, PointBasedHeap, PossibleDataflow, Sable,
    SimpleState, ValueEnvironment,
};
use sable_domains::{ConstantPropagation, IntInterval, ReachingDefinition, Sign, TypeInference};
use sable_ir::{Identifier, Program, Variable};

pub type Types = ValueEnvironment<TypeInference>;
pub type ConstState = SimpleState<PointBasedHeap, ValueEnvironment<ConstantPropagation>, Types>;
pub type SignState = SimpleState<PointBasedHeap, ValueEnvironment<Sign>, Types>;
pub type IntervalState = SimpleState<PointBasedHeap, ValueEnvironment<IntInterval>, Types>;
pub type ReachingState =
    SimpleState<PointBasedHeap, PossibleDataflow<ReachingDefinition>, Types>;

pub fn var(name: &str) -> Identifier {
    Identifier::Variable(Variable::new(name))
}

pub fn const_entry() -> AnalysisState<ConstState> {
    AnalysisState::new(SimpleState::new(
        PointBasedHeap::new(),
        ValueEnvironment::new(),
        ValueEnvironment::new(),
    ))
}

pub fn sign_entry() -> AnalysisState<SignState> {
    AnalysisState::new(SimpleState::new(
        PointBasedHeap::new(),
        ValueEnvironment::new(),
        ValueEnvironment::new(),
    ))
}

pub fn interval_entry() -> AnalysisState<IntervalState> {
    AnalysisState::new(SimpleState::new(
        PointBasedHeap::new(),
        ValueEnvironment::new(),
        ValueEnvironment::new(),
    ))
}

pub fn reaching_entry() -> AnalysisState<ReachingState> {
    AnalysisState::new(SimpleState::new(
        PointBasedHeap::new(),
        PossibleDataflow::new(),
        ValueEnvironment::new(),
    ))
}

pub fn run_const(
    program: &mut Program,
    conf: AnalysisConfiguration<ConstState>,
) -> AnalysisReport<ConstState> {
    Sable::new(conf).run(program).expect("analysis runs")
}
