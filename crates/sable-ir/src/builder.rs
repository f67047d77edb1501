use crate::{Cfg, CfgDescriptor, CodeLocation, EdgeKind, Expr, StatementId, Stmt};

/// Convenience layer for frontends and tests that wire CFGs by hand.
///
/// `append` chains statements with sequential edges; branching shapes are
/// wired explicitly with [`CfgBuilder::branch`] and [`CfgBuilder::seq`].
pub struct CfgBuilder {
    cfg: Cfg,
    last: Option<StatementId>,
}

impl CfgBuilder {
    pub fn new(descriptor: CfgDescriptor) -> Self {
        CfgBuilder {
            cfg: Cfg::new(descriptor),
            last: None,
        }
    }

    /// Add a statement without wiring any edge.
    pub fn add(&mut self, stmt: Stmt) -> StatementId {
        let id = self.cfg.add_statement(stmt);
        self.last = Some(id);
        id
    }

    /// Add a statement with a sequential edge from the previously added one.
    pub fn append(&mut self, stmt: Stmt) -> StatementId {
        let prev = self.last;
        let id = self.add(stmt);
        if let Some(prev) = prev {
            self.cfg.add_edge(prev, id, EdgeKind::Sequential);
        }
        id
    }

    pub fn seq(&mut self, from: StatementId, to: StatementId) {
        self.cfg.add_edge(from, to, EdgeKind::Sequential);
    }

    /// Wire `guard` to its two targets with true/false edges.
    pub fn branch(&mut self, guard: StatementId, on_true: StatementId, on_false: StatementId) {
        self.cfg.add_edge(guard, on_true, EdgeKind::TrueBranch);
        self.cfg.add_edge(guard, on_false, EdgeKind::FalseBranch);
    }

    // -- Statement shorthands ----------------------------------------------

    pub fn assign(&mut self, target: Expr, value: Expr, location: CodeLocation) -> StatementId {
        self.append(Stmt::Assign {
            target,
            value,
            location,
        })
    }

    pub fn expression(&mut self, expr: Expr, location: CodeLocation) -> StatementId {
        self.append(Stmt::Expression { expr, location })
    }

    /// Add a guard statement *without* a sequential edge from the previous
    /// statement; the caller wires it with [`CfgBuilder::branch`].
    pub fn guard(&mut self, expr: Expr, location: CodeLocation) -> StatementId {
        self.add(Stmt::Expression { expr, location })
    }

    pub fn call(
        &mut self,
        assign_to: Option<Expr>,
        function: impl Into<String>,
        args: Vec<Expr>,
        location: CodeLocation,
    ) -> StatementId {
        self.append(Stmt::Call {
            assign_to,
            function: function.into(),
            args,
            location,
        })
    }

    pub fn ret(&mut self, expr: Option<Expr>, location: CodeLocation) -> StatementId {
        self.append(Stmt::Return { expr, location })
    }

    /// Validate, finalize and hand back the CFG.
    pub fn finish(mut self) -> Result<Cfg, crate::CfgError> {
        self.cfg.validate()?;
        self.cfg.finalize();
        Ok(self.cfg)
    }
}
