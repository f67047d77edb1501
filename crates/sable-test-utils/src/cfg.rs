//! Ready-made CFG shapes for tests: straight lines, diamonds and loops.

use sable_ir::{Cfg, CfgBuilder, CfgDescriptor, CodeLocation, Expr, Stmt, TypeSet};

/// An assignment statement at the given line.
pub fn assign(target: &str, value: Expr, line: u32) -> Stmt {
    Stmt::Assign {
        target: Expr::var(target),
        value,
        location: CodeLocation::line(line),
    }
}

/// A `return expr` statement at the given line.
pub fn ret(value: Expr, line: u32) -> Stmt {
    Stmt::Return {
        expr: Some(value),
        location: CodeLocation::line(line),
    }
}

/// A nondeterministic guard (`while (*)`-style).
pub fn nondet() -> Expr {
    Expr::PushAny(TypeSet::untyped())
}

/// A CFG that runs `stmts` in sequence.
pub fn straight_line(name: &str, stmts: Vec<Stmt>) -> Cfg {
    let mut builder = CfgBuilder::new(CfgDescriptor::new(name));
    for stmt in stmts {
        builder.append(stmt);
    }
    builder.finish().expect("straight-line cfg is well formed")
}

/// A CFG running `before`, then branching on `guard` into `then_stmts` or
/// `else_stmts`, both rejoining on `after`.
pub fn if_else(
    name: &str,
    before: Vec<Stmt>,
    guard: Expr,
    guard_line: u32,
    then_stmts: Vec<Stmt>,
    else_stmts: Vec<Stmt>,
    after: Vec<Stmt>,
) -> Cfg {
    assert!(
        !then_stmts.is_empty() && !else_stmts.is_empty() && !after.is_empty(),
        "if_else needs statements in both branches and after the join"
    );
    let mut builder = CfgBuilder::new(CfgDescriptor::new(name));
    let mut last_before = None;
    for stmt in before {
        last_before = Some(builder.append(stmt));
    }
    let guard_id = builder.guard(guard, CodeLocation::line(guard_line));
    if let Some(prev) = last_before {
        builder.seq(prev, guard_id);
    }

    let mut then_ids = Vec::new();
    for (i, stmt) in then_stmts.into_iter().enumerate() {
        let id = builder.add(stmt);
        if i > 0 {
            builder.seq(then_ids[i - 1], id);
        }
        then_ids.push(id);
    }
    let mut else_ids = Vec::new();
    for (i, stmt) in else_stmts.into_iter().enumerate() {
        let id = builder.add(stmt);
        if i > 0 {
            builder.seq(else_ids[i - 1], id);
        }
        else_ids.push(id);
    }
    let mut after_ids = Vec::new();
    for (i, stmt) in after.into_iter().enumerate() {
        let id = builder.add(stmt);
        if i > 0 {
            builder.seq(after_ids[i - 1], id);
        }
        after_ids.push(id);
    }

    builder.branch(guard_id, then_ids[0], else_ids[0]);
    builder.seq(*then_ids.last().expect("nonempty"), after_ids[0]);
    builder.seq(*else_ids.last().expect("nonempty"), after_ids[0]);
    builder.finish().expect("if-else cfg is well formed")
}

/// A CFG running `init`, then `while (guard) { body }`, then `after`.
pub fn while_loop(
    name: &str,
    init: Vec<Stmt>,
    guard: Expr,
    guard_line: u32,
    body: Vec<Stmt>,
    after: Vec<Stmt>,
) -> Cfg {
    assert!(
        !body.is_empty() && !after.is_empty(),
        "while_loop needs a loop body and statements after the loop"
    );
    let mut builder = CfgBuilder::new(CfgDescriptor::new(name));
    let mut last_init = None;
    for stmt in init {
        last_init = Some(builder.append(stmt));
    }
    let guard_id = builder.guard(guard, CodeLocation::line(guard_line));
    if let Some(prev) = last_init {
        builder.seq(prev, guard_id);
    }

    let mut body_ids = Vec::new();
    for (i, stmt) in body.into_iter().enumerate() {
        let id = builder.add(stmt);
        if i > 0 {
            builder.seq(body_ids[i - 1], id);
        }
        body_ids.push(id);
    }
    let mut after_ids = Vec::new();
    for (i, stmt) in after.into_iter().enumerate() {
        let id = builder.add(stmt);
        if i > 0 {
            builder.seq(after_ids[i - 1], id);
        }
        after_ids.push(id);
    }

    builder.branch(guard_id, body_ids[0], after_ids[0]);
    builder.seq(*body_ids.last().expect("nonempty"), guard_id);
    builder.finish().expect("while cfg is well formed")
}
