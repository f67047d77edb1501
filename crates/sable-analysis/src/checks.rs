use std::fmt;

use sable_ir::{Cfg, CodeLocation, StatementId, Stmt};

use crate::{AbstractState, AnalysisState};

/// A finding a check wants reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Warning {
    pub location: CodeLocation,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Collects the warnings produced by every check of a run.
#[derive(Debug, Default)]
pub struct CheckTool {
    warnings: Vec<Warning>,
}

impl CheckTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, location: CodeLocation, message: impl Into<String>) {
        self.warnings.push(Warning {
            location,
            message: message.into(),
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Final, deterministically ordered warning collection.
    pub fn into_warnings(mut self) -> Vec<Warning> {
        self.warnings.sort();
        self.warnings.dedup();
        self.warnings
    }
}

/// The analysis states observed at one statement, across every context token
/// the enclosing CFG was analyzed under.
#[derive(Debug)]
pub struct StatementResults<A> {
    pub pre: Vec<AnalysisState<A>>,
    pub post: Vec<AnalysisState<A>>,
}

impl<A> Default for StatementResults<A> {
    fn default() -> Self {
        StatementResults {
            pre: Vec::new(),
            post: Vec::new(),
        }
    }
}

/// A structural check: sees statements, never abstract states.
pub trait SyntacticCheck {
    fn begin(&mut self, _tool: &mut CheckTool) {}

    fn visit(&mut self, tool: &mut CheckTool, cfg: &Cfg, id: StatementId, stmt: &Stmt);

    fn end(&mut self, _tool: &mut CheckTool) {}
}

/// A check over fixpoint results.
///
/// Checks run after the whole-program fixpoint, in registration order, over
/// every statement of every CFG in program order. The engine treats them as
/// opaque visitors.
pub trait SemanticCheck<A: AbstractState> {
    fn begin(&mut self, _tool: &mut CheckTool) {}

    fn visit(
        &mut self,
        tool: &mut CheckTool,
        cfg: &Cfg,
        id: StatementId,
        stmt: &Stmt,
        results: &StatementResults<A>,
    );

    fn end(&mut self, _tool: &mut CheckTool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_come_out_sorted_and_deduplicated() {
        let mut tool = CheckTool::new();
        tool.warn(CodeLocation::line(9), "later");
        tool.warn(CodeLocation::line(2), "earlier");
        tool.warn(CodeLocation::line(9), "later");
        let warnings = tool.into_warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].location, CodeLocation::line(2));
        assert_eq!(warnings[1].location, CodeLocation::line(9));
    }
}
