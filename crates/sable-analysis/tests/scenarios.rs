//! End-to-end analyses over small programs, one per supported domain.

mod common;

use common::*;
use sable_analysis::{AnalysisConfiguration, ContextSensitivity, FixpointConfiguration, Sable};
use sable_domains::{ConstantPropagation, IntInterval, ReachingDefinition, Sign};
use sable_ir::{
    AllocationSite, BinaryOp, CfgBuilder, CfgDescriptor, CodeLocation, Expr, Identifier, Program,
    Stmt, TypeSet, Variable,
};
use sable_lattice::Lattice;
use sable_test_utils::cfg::{assign, if_else, nondet, ret, straight_line, while_loop};

fn line(l: u32) -> CodeLocation {
    CodeLocation::line(l)
}

/// Constant propagation over a straight-line program.
#[test]
fn constants_flow_through_straight_line_code() {
    // x = 3; y = x + 4; z = y * 2;
    let cfg = straight_line(
        "main",
        vec![
            assign("x", Expr::int(3), 1),
            assign("y", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(4)), 2),
            assign("z", Expr::binary(BinaryOp::Mul, Expr::var("y"), Expr::int(2)), 3),
        ],
    );
    let mut program = Program::new();
    program.add_cfg(cfg).unwrap();
    program.add_entrypoint("main");

    let report = run_const(&mut program, AnalysisConfiguration::new(const_entry()));
    assert!(report.is_clean());
    let results = report.results_of("main");
    assert_eq!(results.len(), 1);
    let exit = results[0].exit_state();
    assert_eq!(exit.state().value.get_state(&var("x")), ConstantPropagation::int(3));
    assert_eq!(exit.state().value.get_state(&var("y")), ConstantPropagation::int(7));
    assert_eq!(exit.state().value.get_state(&var("z")), ConstantPropagation::int(14));
}

/// The sign domain stabilizes a counting loop through widening.
#[test]
fn sign_of_a_loop_counter_is_positive() {
    // x = 1; while (x < 1000) x = x + 1;
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

    let conf = AnalysisConfiguration::new(sign_entry())
        .with_fixpoint(FixpointConfiguration::default().with_widening_threshold(3));
    let report = Sable::new(conf).run(&mut program).unwrap();
    assert!(report.is_clean());

    let results = report.results_of("main");
    let exit = results[0].exit_state();
    assert_eq!(exit.state().value.get_state(&var("x")), Sign::Positive);

    // The loop head itself stabilized on a positive counter.
    let cfg = program.cfg("main").unwrap();
    let (guard_id, _) = cfg
        .statements()
        .find(|(_, s)| matches!(s, Stmt::Expression { .. }))
        .unwrap();
    let head = results[0].post_state_of(guard_id).unwrap();
    assert_eq!(head.state().value.get_state(&var("x")), Sign::Positive);
}

/// Reaching definitions across a diamond.
#[test]
fn reaching_definitions_meet_at_the_join() {
    // x = 1; if (*) x = 2; else x = 3; y = x;
    let cfg = if_else(
        "main",
        vec![assign("x", Expr::int(1), 1)],
        nondet(),
        10,
        vec![assign("x", Expr::int(2), 2)],
        vec![assign("x", Expr::int(3), 3)],
        vec![assign("y", Expr::var("x"), 4)],
    );
    let mut program = Program::new();
    program.add_cfg(cfg).unwrap();
    program.add_entrypoint("main");

    let report = Sable::new(AnalysisConfiguration::new(reaching_entry()))
        .run(&mut program)
        .unwrap();
    assert!(report.is_clean());

    let cfg = program.cfg("main").unwrap();
    let (read_id, _) = cfg
        .statements()
        .find(|(_, s)| {
            matches!(
                s,
                Stmt::Assign { target, .. }
                    if matches!(
                        target.as_identifier(),
                        Some(Identifier::Variable(v)) if v.name == "y"
                    )
            )
        })
        .unwrap();

    let results = report.results_of("main");
    let at_read = results[0].pre_state_of(read_id).unwrap();
    let defs = &at_read.state().value;
    assert!(defs.contains(&ReachingDefinition::new(var("x"), line(2))));
    assert!(defs.contains(&ReachingDefinition::new(var("x"), line(3))));
    // The initial definition was killed on both branches, and y's own
    // definition has not happened yet at its pre-state.
    assert!(!defs.contains(&ReachingDefinition::new(var("x"), line(1))));
    assert!(!defs.contains(&ReachingDefinition::new(var("y"), line(4))));
}

/// Allocation in a loop collapses to a single weak site.
#[test]
fn looped_allocation_weakens_the_site() {
    // while (*) { p = new T; p.f = 1; }
    let alloc_line = 2;
    let cfg = while_loop(
        "main",
        vec![],
        nondet(),
        1,
        vec![
            Stmt::Assign {
                target: Expr::var("p"),
                value: Expr::alloc(TypeSet::untyped(), line(alloc_line)),
                location: line(alloc_line),
            },
            Stmt::Assign {
                target: Expr::field(Expr::var("p"), Expr::var("f")),
                value: Expr::int(1),
                location: line(3),
            },
        ],
        vec![ret(Expr::var("p"), 4)],
    );
    let mut program = Program::new();
    program.add_cfg(cfg).unwrap();
    program.add_entrypoint("main");

    let report = run_const(&mut program, AnalysisConfiguration::new(const_entry()));
    assert!(report.is_clean());

    let exit = report.results_of("main")[0].exit_state();
    let sites = exit.state().heap.sites_of(&var("p"));
    assert_eq!(sites.len(), Some(1));
    assert!(sites.iter().all(|site| site.weak));

    // The region's content was written weakly: both iterations stored 1.
    let weak_site = Identifier::Site(AllocationSite::weak(TypeSet::untyped(), line(alloc_line)));
    assert_eq!(
        exit.state().value.get_state(&weak_site),
        ConstantPropagation::int(1)
    );
}

/// One summary per call site under k = 1 context sensitivity.
#[test]
fn call_site_sensitivity_keeps_summaries_apart() {
    // main: a = f(10); b = f(20);   f(x): return x + 1;
    let mut main = CfgBuilder::new(CfgDescriptor::new("main"));
    main.call(Some(Expr::var("a")), "f", vec![Expr::int(10)], line(1));
    main.call(Some(Expr::var("b")), "f", vec![Expr::int(20)], line(2));
    main.ret(Some(Expr::var("a")), line(3));

    let mut f = CfgBuilder::new(
        CfgDescriptor::new("f").with_formals(vec![Variable::new("x")]),
    );
    f.ret(
        Some(Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(1))),
        line(10),
    );

    let mut program = Program::new();
    program.add_cfg(main.finish().unwrap()).unwrap();
    program.add_cfg(f.finish().unwrap()).unwrap();
    program.add_entrypoint("main");

    let conf = AnalysisConfiguration::new(const_entry())
        .with_context_sensitivity(ContextSensitivity::last_call_sites(1));
    let report = run_const(&mut program, conf);
    assert!(report.is_clean());

    let exit = report.results_of("main")[0].exit_state();
    assert_eq!(exit.state().value.get_state(&var("a")), ConstantPropagation::int(11));
    assert_eq!(exit.state().value.get_state(&var("b")), ConstantPropagation::int(21));

    // Two call sites, two cached analyses of `f`.
    assert_eq!(report.results_of("f").len(), 2);
}

/// Recursion stabilizes, and intervals widen the recursive summary.
#[test]
fn recursive_summaries_stabilize_with_widening() {
    // f(n) { if (n <= 0) return 1; else { r = f(n - 1); return n * r; } }
    let mut f = CfgBuilder::new(
        CfgDescriptor::new("f").with_formals(vec![Variable::new("n")]),
    );
    let guard = f.guard(
        Expr::binary(BinaryOp::Le, Expr::var("n"), Expr::int(0)),
        line(11),
    );
    let base = f.add(Stmt::Return {
        expr: Some(Expr::int(1)),
        location: line(12),
    });
    let rec = f.add(Stmt::Call {
        assign_to: Some(Expr::var("r")),
        function: "f".to_owned(),
        args: vec![Expr::binary(BinaryOp::Sub, Expr::var("n"), Expr::int(1))],
        location: line(13),
    });
    let out = f.add(Stmt::Return {
        expr: Some(Expr::binary(BinaryOp::Mul, Expr::var("n"), Expr::var("r"))),
        location: line(14),
    });
    f.branch(guard, base, rec);
    f.seq(rec, out);

    let mut main = CfgBuilder::new(CfgDescriptor::new("main"));
    main.call(Some(Expr::var("result")), "f", vec![Expr::var("m")], line(1));
    main.ret(Some(Expr::var("result")), line(2));

    let mut program = Program::new();
    program.add_cfg(main.finish().unwrap()).unwrap();
    program.add_cfg(f.finish().unwrap()).unwrap();
    program.add_entrypoint("main");

    let conf = AnalysisConfiguration::new(interval_entry())
        .with_context_sensitivity(ContextSensitivity::last_call_sites(1));
    let report = Sable::new(conf).run(&mut program).unwrap();
    assert!(report.is_clean());

    // The factorial-like recursion yields [1, +inf).
    let exit = report.results_of("main")[0].exit_state();
    assert_eq!(
        exit.state().value.get_state(&var("result")),
        IntInterval::at_least(1)
    );

    // Every summary of `f` covers the base case and never dips below 1.
    let ret_var = Identifier::Variable(Variable::meta("ret@f"));
    for analyzed in report.results_of("f") {
        let returned = analyzed.exit_state().state().value.get_state(&ret_var);
        assert!(IntInterval::constant(1).is_subseteq(&returned));
        assert!(returned.is_subseteq(&IntInterval::at_least(1)));
    }
}
