//! Engine-level properties: semantics idempotence, fixpoint monotonicity,
//! narrowing refinement, optimized-result reconstruction, cancellation and
//! open-call policies.

mod common;

use common::*;
use sable_analysis::{
    AnalysisConfiguration, AnalysisError, AnalysisState, FixpointConfiguration, OpenCallPolicy,
    PointBasedHeap, Sable, SimpleState, ValueEnvironment,
};
use sable_domains::{ConstantPropagation, IntInterval};
use sable_ir::{BinaryOp, CfgBuilder, CfgDescriptor, CodeLocation, Expr, Program};
use sable_lattice::{HasTop, Lattice};
use sable_test_utils::cfg::{assign, ret, straight_line, while_loop};

fn line(l: u32) -> CodeLocation {
    CodeLocation::line(l)
}

fn simple_program() -> Program {
    let cfg = straight_line(
        "main",
        vec![
            assign("x", Expr::int(3), 1),
            assign("y", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(4)), 2),
            ret(Expr::var("y"), 3),
        ],
    );
    let mut program = Program::new();
    program.add_cfg(cfg).unwrap();
    program.add_entrypoint("main");
    program
}

/// Stepping a constant twice is the same as stepping it once.
#[test]
fn small_step_on_constants_is_idempotent() {
    let state = const_entry();
    let once = state.small_step(&Expr::int(7), line(1)).unwrap();
    let twice = once.small_step(&Expr::int(7), line(1)).unwrap();
    assert_eq!(once, twice);
}

/// A larger entry state can only produce larger exits.
#[test]
fn fixpoint_is_monotone_in_the_entry_state() {
    let seeded = |value: ConstantPropagation| -> AnalysisState<ConstState> {
        AnalysisState::new(SimpleState::new(
            PointBasedHeap::new(),
            ValueEnvironment::new().put(var("n"), value),
            ValueEnvironment::new(),
        ))
    };
    let program_with = |entry: AnalysisState<ConstState>| {
        let cfg = straight_line(
            "main",
            vec![
                assign("y", Expr::binary(BinaryOp::Add, Expr::var("n"), Expr::int(1)), 1),
                ret(Expr::var("y"), 2),
            ],
        );
        let mut program = Program::new();
        program.add_cfg(cfg).unwrap();
        program.add_entrypoint("main");
        Sable::new(AnalysisConfiguration::new(entry))
            .run(&mut program)
            .unwrap()
    };

    let small = program_with(seeded(ConstantPropagation::int(3)));
    let large = program_with(seeded(ConstantPropagation::top()));
    let small_exit = small.results_of("main")[0].exit_state().clone();
    let large_exit = large.results_of("main")[0].exit_state().clone();
    assert!(small.results_of("main")[0].entry_state().is_subseteq(large.results_of("main")[0].entry_state()));
    assert!(small_exit.is_subseteq(&large_exit));
    assert_eq!(
        small_exit.state().value.get_state(&var("y")),
        ConstantPropagation::int(4)
    );
    assert!(large_exit.state().value.get_state(&var("y")).is_top());
}

/// The descending phase refines widened loop bounds.
#[test]
fn narrowing_recovers_the_loop_bound() {
    let build = || {
        let cfg = while_loop(
            "main",
            vec![assign("x", Expr::int(1), 1)],
            Expr::binary(BinaryOp::Lt, Expr::var("x"), Expr::int(1000)),
            2,
            vec![assign("x", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(1)), 3)],
            vec![ret(Expr::var("x"), 4)],
        );
        let mut program = Program::new();
        program.add_cfg(cfg).unwrap();
        program.add_entrypoint("main");
        program
    };

    // Ascending only: widening pushes the counter to +inf, the exit guard
    // clips the lower bound.
    let conf = AnalysisConfiguration::new(interval_entry())
        .with_fixpoint(FixpointConfiguration::default().with_widening_threshold(3));
    let report = Sable::new(conf).run(&mut build()).unwrap();
    let exit = report.results_of("main")[0].exit_state().clone();
    assert_eq!(
        exit.state().value.get_state(&var("x")),
        IntInterval::at_least(1000)
    );

    // With a descending phase the exact exit value is recovered.
    let conf = AnalysisConfiguration::new(interval_entry()).with_fixpoint(
        FixpointConfiguration::default()
            .with_widening_threshold(3)
            .with_narrowing_steps(3),
    );
    let report = Sable::new(conf).run(&mut build()).unwrap();
    let exit = report.results_of("main")[0].exit_state().clone();
    assert_eq!(
        exit.state().value.get_state(&var("x")),
        IntInterval::constant(1000)
    );
}

/// Optimized results replay block tails on demand and agree with the
/// unoptimized fixpoint everywhere.
#[test]
fn optimized_results_reconstruct_per_statement_states() {
    let mut plain_program = simple_program();
    let plain = run_const(
        &mut plain_program,
        AnalysisConfiguration::new(const_entry()),
    );

    let mut optimized_program = simple_program();
    let optimized = run_const(
        &mut optimized_program,
        AnalysisConfiguration::new(const_entry())
            .with_fixpoint(FixpointConfiguration::default().with_optimize(true)),
    );

    let cfg = plain_program.cfg("main").unwrap();
    let plain_result = &plain.results_of("main")[0];
    let optimized_result = &optimized.results_of("main")[0];
    assert!(optimized_result.is_optimized());
    for (id, _) in cfg.statements() {
        let expected = plain_result.post_state_of(id).unwrap();
        let replayed = optimized_result.unwinded_post(cfg, id).unwrap();
        assert_eq!(&replayed, expected, "statement {id} diverged");
    }
}

/// A pre-set cancellation flag aborts before any statement is processed.
#[test]
fn cancellation_aborts_the_run() {
    let conf = AnalysisConfiguration::new(const_entry());
    let flag = conf.cancellation_flag();
    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    let result = Sable::new(conf).run(&mut simple_program());
    assert!(matches!(
        result,
        Err(AnalysisError::Fixpoint(
            sable_analysis::FixpointError::Cancelled
        ))
    ));
}

/// Unresolvable calls follow the configured open-call policy.
#[test]
fn open_calls_follow_the_policy() {
    let build = || {
        let mut main = CfgBuilder::new(CfgDescriptor::new("main"));
        main.call(Some(Expr::var("x")), "mystery", vec![], line(1));
        main.ret(Some(Expr::var("x")), line(2));
        let mut program = Program::new();
        program.add_cfg(main.finish().unwrap()).unwrap();
        program.add_entrypoint("main");
        program
    };

    // ReturnTop: analysis continues with a havocked result.
    let report = run_const(
        &mut build(),
        AnalysisConfiguration::new(const_entry())
            .with_open_call_policy(OpenCallPolicy::ReturnTop),
    );
    assert!(report.is_clean());
    let exit = report.results_of("main")[0].exit_state().clone();
    assert!(exit.state().value.get_state(&var("x")).is_top());

    // Fail: the CFG's fixpoint aborts, the failure is recorded, the run
    // itself still completes.
    let report = run_const(
        &mut build(),
        AnalysisConfiguration::new(const_entry()).with_open_call_policy(OpenCallPolicy::Fail),
    );
    assert!(!report.is_clean());
    assert_eq!(report.errors().len(), 1);
}
