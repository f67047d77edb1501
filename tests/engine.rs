//! Whole-pipeline smoke test through the `sable` facade: program in,
//! warnings and graphs out.

use sable::analysis::{
    AnalysisConfiguration, AnalysisGraphs, CheckTool, RenderedGraph, Sable, SemanticCheck,
    StatementResults, SyntacticCheck,
};
use sable::ir::{BinaryOp, Cfg, CodeLocation, Expr, Identifier, Program, StatementId, Stmt, Variable};
use sable_domains::ConstantPropagation;
use sable_test_utils::cfg::{assign, ret, straight_line};

type ConstState = sable::analysis::SimpleState<
    sable::analysis::PointBasedHeap,
    sable::analysis::ValueEnvironment<ConstantPropagation>,
    sable::analysis::ValueEnvironment<sable_domains::TypeInference>,
>;

fn entry() -> sable::analysis::AnalysisState<ConstState> {
    sable::analysis::AnalysisState::new(sable::analysis::SimpleState::new(
        sable::analysis::PointBasedHeap::new(),
        sable::analysis::ValueEnvironment::new(),
        sable::analysis::ValueEnvironment::new(),
    ))
}

/// Flags every division whose right operand is a literal zero.
struct DivisionByZeroLiteral;

impl SyntacticCheck for DivisionByZeroLiteral {
    fn visit(&mut self, tool: &mut CheckTool, _cfg: &Cfg, _id: StatementId, stmt: &Stmt) {
        let expr = match stmt {
            Stmt::Assign { value, .. } => value,
            Stmt::Expression { expr, .. } => expr,
            Stmt::Return { expr: Some(e), .. } => e,
            _ => return,
        };
        if let Expr::Binary {
            op: BinaryOp::Div,
            right,
            ..
        } = expr
            && **right == Expr::int(0)
        {
            tool.warn(stmt.location(), "division by literal zero");
        }
    }
}

/// Flags assignments the analysis proves to store a value above a cap.
struct ConstantAboveCap(i64);

impl SemanticCheck<ConstState> for ConstantAboveCap {
    fn visit(
        &mut self,
        tool: &mut CheckTool,
        _cfg: &Cfg,
        _id: StatementId,
        stmt: &Stmt,
        results: &StatementResults<ConstState>,
    ) {
        let Stmt::Assign { target, .. } = stmt else {
            return;
        };
        let Some(id @ Identifier::Variable(_)) = target.as_identifier() else {
            return;
        };
        for post in &results.post {
            if let Some(value) = post.state().value.get_state(id).as_int()
                && value > self.0
            {
                tool.warn(
                    stmt.location(),
                    format!("{id} is provably {value}, above the cap of {}", self.0),
                );
            }
        }
    }
}

fn program() -> Program {
    let cfg = straight_line(
        "main",
        vec![
            assign("x", Expr::int(3), 1),
            assign("y", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(4)), 2),
            assign("z", Expr::binary(BinaryOp::Mul, Expr::var("y"), Expr::int(2)), 3),
            assign("w", Expr::binary(BinaryOp::Div, Expr::var("z"), Expr::int(0)), 4),
            ret(Expr::var("z"), 5),
        ],
    );
    let mut program = Program::new();
    program.add_cfg(cfg).unwrap();
    program.add_entrypoint("main");
    program
}

#[test]
fn checks_report_ordered_warnings() {
    let conf = AnalysisConfiguration::new(entry())
        .add_syntactic_check(DivisionByZeroLiteral)
        .add_semantic_check(ConstantAboveCap(10));
    let report = Sable::new(conf).run(&mut program()).unwrap();
    assert!(report.is_clean());

    let warnings = report.warnings();
    assert_eq!(warnings.len(), 2);
    // Sorted by location: the semantic finding at line 3 precedes the
    // syntactic one at line 4.
    assert_eq!(warnings[0].location, CodeLocation::line(3));
    assert!(warnings[0].message.contains("z is provably 14"));
    assert_eq!(warnings[1].location, CodeLocation::line(4));
    assert!(warnings[1].message.contains("division by literal zero"));
}

#[test]
fn dot_graphs_render_statements_and_states() {
    let conf = AnalysisConfiguration::new(entry())
        .with_analysis_graphs(AnalysisGraphs::Dot)
        .with_serialize_results(true);
    let report = Sable::new(conf).run(&mut program()).unwrap();

    let dot = report
        .graphs()
        .iter()
        .find_map(|g| match g {
            RenderedGraph::Dot { content, .. } => Some(content.clone()),
            RenderedGraph::Structured(_) => None,
        })
        .expect("a dot graph was rendered");
    assert!(dot.contains("digraph"));
    assert!(dot.contains("x = 3"));
}

#[test]
fn meta_return_variables_stay_out_of_the_caller() {
    let report = Sable::new(AnalysisConfiguration::new(entry()))
        .run(&mut program())
        .unwrap();
    let exit = report.results_of("main")[0].exit_state();
    // The return carrier of `main` itself is visible at its own exit, but no
    // callee carrier leaked in.
    let ret_main = Identifier::Variable(Variable::meta("ret@main"));
    assert_eq!(
        exit.state().value.get_state(&ret_main),
        ConstantPropagation::int(14)
    );
}
