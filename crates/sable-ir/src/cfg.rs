use std::fmt;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{CodeLocation, Expr, TypeSet, Variable};

/// The kind of a control-flow edge.
///
/// Sequential edges propagate the post-state of their source unchanged;
/// branch edges additionally assume the source's guard (or its negation) on
/// the traversed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeKind {
    Sequential,
    TrueBranch,
    FalseBranch,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::Sequential => "seq",
            EdgeKind::TrueBranch => "true",
            EdgeKind::FalseBranch => "false",
        };
        f.write_str(name)
    }
}

/// A statement: one node of a CFG, rooting a single expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// Store the value of `value` into the location denoted by `target`.
    Assign {
        target: Expr,
        value: Expr,
        location: CodeLocation,
    },
    /// Evaluate `expr` for its effect on the state. Branch guards are
    /// expression statements with `TrueBranch`/`FalseBranch` out-edges.
    Expression { expr: Expr, location: CodeLocation },
    /// Invoke another CFG, optionally storing its return value.
    Call {
        assign_to: Option<Expr>,
        function: String,
        args: Vec<Expr>,
        location: CodeLocation,
    },
    /// Leave the current CFG, optionally producing a value.
    Return {
        expr: Option<Expr>,
        location: CodeLocation,
    },
}

impl Stmt {
    pub fn location(&self) -> CodeLocation {
        match self {
            Stmt::Assign { location, .. }
            | Stmt::Expression { location, .. }
            | Stmt::Call { location, .. }
            | Stmt::Return { location, .. } => *location,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Stmt::Call { .. })
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { target, value, .. } => write!(f, "{target} = {value}"),
            Stmt::Expression { expr, .. } => expr.fmt(f),
            Stmt::Call {
                assign_to,
                function,
                args,
                ..
            } => {
                if let Some(target) = assign_to {
                    write!(f, "{target} = ")?;
                }
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Stmt::Return { expr, .. } => match expr {
                Some(e) => write!(f, "return {e}"),
                None => f.write_str("return"),
            },
        }
    }
}

/// Stable handle of a statement within its CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementId(NodeIndex<u32>);

impl StatementId {
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "st{}", self.0.index())
    }
}

/// Signature of a CFG: how the interprocedural layer binds calls to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgDescriptor {
    pub name: String,
    pub formals: Vec<Variable>,
    pub return_types: TypeSet,
    pub location: CodeLocation,
}

impl CfgDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        CfgDescriptor {
            name: name.into(),
            formals: Vec::new(),
            return_types: TypeSet::untyped(),
            location: CodeLocation::UNKNOWN,
        }
    }

    pub fn with_formals(mut self, formals: Vec<Variable>) -> Self {
        self.formals = formals;
        self
    }

    pub fn with_return_types(mut self, types: TypeSet) -> Self {
        self.return_types = types;
        self
    }

    pub fn with_location(mut self, location: CodeLocation) -> Self {
        self.location = location;
        self
    }
}

/// Error produced by [`Cfg::validate`] on malformed graphs.
#[derive(Debug, thiserror::Error)]
pub enum CfgError {
    #[error("cfg `{cfg}` has no entry statement")]
    MissingEntry { cfg: String },
    #[error("cfg `{cfg}`: branch at {at} must have exactly one true and one false edge")]
    MalformedBranch { cfg: String, at: StatementId },
    #[error("cfg `{cfg}`: statement {at} mixes sequential and branch out-edges")]
    MixedOutEdges { cfg: String, at: StatementId },
}

/// Basic-block structure computed once at finalization.
///
/// A block head is the entry, any statement with more than one predecessor,
/// or any successor of a branching statement. The optimized fixpoint stores
/// states at block heads only and replays the straight-line tail on demand.
#[derive(Debug, Clone, Default)]
pub struct BasicBlocks {
    head_of: FxHashMap<StatementId, StatementId>,
    members: FxHashMap<StatementId, Vec<StatementId>>,
}

impl BasicBlocks {
    pub fn head_of(&self, stmt: StatementId) -> StatementId {
        self.head_of.get(&stmt).copied().unwrap_or(stmt)
    }

    pub fn is_head(&self, stmt: StatementId) -> bool {
        self.head_of(stmt) == stmt
    }

    /// Statements of the block led by `head`, in control-flow order.
    pub fn block(&self, head: StatementId) -> &[StatementId] {
        self.members.get(&head).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn heads(&self) -> impl Iterator<Item = StatementId> + '_ {
        self.members.keys().copied()
    }
}

/// A control-flow graph over [`Stmt`] nodes with typed edges.
///
/// Construction is append-only: statements and edges are added, the entry is
/// set, and [`Cfg::finalize`] computes the basic-block structure once. After
/// finalization the graph is immutable as far as the engine is concerned.
#[derive(Debug, Clone)]
pub struct Cfg {
    descriptor: CfgDescriptor,
    graph: StableDiGraph<Stmt, EdgeKind>,
    entry: Option<StatementId>,
    blocks: Option<BasicBlocks>,
}

impl Cfg {
    pub fn new(descriptor: CfgDescriptor) -> Self {
        Cfg {
            descriptor,
            graph: StableDiGraph::new(),
            entry: None,
            blocks: None,
        }
    }

    pub fn descriptor(&self) -> &CfgDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    // -- Construction -------------------------------------------------------

    pub fn add_statement(&mut self, stmt: Stmt) -> StatementId {
        let id = StatementId(self.graph.add_node(stmt));
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn add_edge(&mut self, from: StatementId, to: StatementId, kind: EdgeKind) {
        self.graph.add_edge(from.0, to.0, kind);
    }

    pub fn set_entry(&mut self, entry: StatementId) {
        self.entry = Some(entry);
    }

    // -- Queries ------------------------------------------------------------

    pub fn entry(&self) -> Option<StatementId> {
        self.entry
    }

    /// Statements with no outgoing edges, in id order.
    pub fn exit_points(&self) -> Vec<StatementId> {
        self.statements()
            .map(|(id, _)| id)
            .filter(|id| {
                self.graph
                    .neighbors_directed(id.0, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect()
    }

    pub fn statement(&self, id: StatementId) -> Option<&Stmt> {
        self.graph.node_weight(id.0)
    }

    /// Iterate all statements in insertion order.
    pub fn statements(&self) -> impl Iterator<Item = (StatementId, &Stmt)> {
        self.graph
            .node_indices()
            .map(|ix| (StatementId(ix), &self.graph[ix]))
    }

    pub fn statement_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Outgoing edges of `id` in insertion order.
    pub fn successors(&self, id: StatementId) -> Vec<(StatementId, EdgeKind)> {
        let mut out: Vec<_> = self
            .graph
            .edges_directed(id.0, Direction::Outgoing)
            .map(|e| (StatementId(e.target()), *e.weight()))
            .collect();
        // petgraph walks adjacency lists newest-first; restore insertion order.
        out.reverse();
        out
    }

    /// Incoming edges of `id` in insertion order.
    pub fn predecessors(&self, id: StatementId) -> Vec<(StatementId, EdgeKind)> {
        let mut out: Vec<_> = self
            .graph
            .edges_directed(id.0, Direction::Incoming)
            .map(|e| (StatementId(e.source()), *e.weight()))
            .collect();
        out.reverse();
        out
    }

    // -- Validation and finalization ----------------------------------------

    pub fn validate(&self) -> Result<(), CfgError> {
        let cfg = self.descriptor.name.clone();
        if self.entry.is_none() && self.graph.node_count() > 0 {
            return Err(CfgError::MissingEntry { cfg });
        }
        for (id, _) in self.statements() {
            let succs = self.successors(id);
            let seq = succs
                .iter()
                .filter(|(_, k)| *k == EdgeKind::Sequential)
                .count();
            let tr = succs
                .iter()
                .filter(|(_, k)| *k == EdgeKind::TrueBranch)
                .count();
            let fl = succs
                .iter()
                .filter(|(_, k)| *k == EdgeKind::FalseBranch)
                .count();
            if (tr > 0 || fl > 0) && seq > 0 {
                return Err(CfgError::MixedOutEdges { cfg, at: id });
            }
            if (tr > 0 || fl > 0) && (tr != 1 || fl != 1) {
                return Err(CfgError::MalformedBranch { cfg, at: id });
            }
        }
        Ok(())
    }

    /// Compute the basic-block structure. Idempotent; must run before the
    /// optimized fixpoint is used.
    pub fn finalize(&mut self) {
        if self.blocks.is_some() {
            return;
        }
        let mut heads: FxHashSet<StatementId> = FxHashSet::default();
        if let Some(entry) = self.entry {
            heads.insert(entry);
        }
        for (id, _) in self.statements() {
            if self.predecessors(id).len() != 1 {
                heads.insert(id);
            }
            if self.successors(id).len() > 1 {
                for (succ, _) in self.successors(id) {
                    heads.insert(succ);
                }
            }
        }

        let mut blocks = BasicBlocks::default();
        for &head in &heads {
            let mut members = vec![head];
            let mut cur = head;
            loop {
                let succs = self.successors(cur);
                if succs.len() != 1 {
                    break;
                }
                let (next, _) = succs[0];
                if heads.contains(&next) {
                    break;
                }
                members.push(next);
                cur = next;
            }
            for &m in &members {
                blocks.head_of.insert(m, head);
            }
            blocks.members.insert(head, members);
        }
        self.blocks = Some(blocks);
    }

    pub fn basic_blocks(&self) -> Option<&BasicBlocks> {
        self.blocks.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryOp, Expr};

    fn stmt(text: &str, line: u32) -> Stmt {
        Stmt::Expression {
            expr: Expr::var(text),
            location: CodeLocation::line(line),
        }
    }

    #[test]
    fn successors_preserve_insertion_order() {
        let mut cfg = Cfg::new(CfgDescriptor::new("f"));
        let a = cfg.add_statement(stmt("a", 1));
        let b = cfg.add_statement(stmt("b", 2));
        let c = cfg.add_statement(stmt("c", 3));
        cfg.add_edge(a, b, EdgeKind::TrueBranch);
        cfg.add_edge(a, c, EdgeKind::FalseBranch);
        assert_eq!(
            cfg.successors(a),
            vec![(b, EdgeKind::TrueBranch), (c, EdgeKind::FalseBranch)]
        );
        assert_eq!(cfg.predecessors(b), vec![(a, EdgeKind::TrueBranch)]);
    }

    #[test]
    fn validation_rejects_half_branches() {
        let mut cfg = Cfg::new(CfgDescriptor::new("f"));
        let guard = cfg.add_statement(Stmt::Expression {
            expr: Expr::binary(BinaryOp::Lt, Expr::var("x"), Expr::int(10)),
            location: CodeLocation::line(1),
        });
        let then = cfg.add_statement(stmt("t", 2));
        cfg.add_edge(guard, then, EdgeKind::TrueBranch);
        assert!(matches!(
            cfg.validate(),
            Err(CfgError::MalformedBranch { .. })
        ));
        let after = cfg.add_statement(stmt("e", 3));
        cfg.add_edge(guard, after, EdgeKind::FalseBranch);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn basic_blocks_split_at_joins_and_branches() {
        // a -> g -> b -> g (loop), g -> d
        let mut cfg = Cfg::new(CfgDescriptor::new("f"));
        let a = cfg.add_statement(stmt("a", 1));
        let g = cfg.add_statement(stmt("g", 2));
        let b = cfg.add_statement(stmt("b", 3));
        let d = cfg.add_statement(stmt("d", 4));
        cfg.add_edge(a, g, EdgeKind::Sequential);
        cfg.add_edge(g, b, EdgeKind::TrueBranch);
        cfg.add_edge(g, d, EdgeKind::FalseBranch);
        cfg.add_edge(b, g, EdgeKind::Sequential);
        cfg.finalize();
        let blocks = cfg.basic_blocks().unwrap();
        assert!(blocks.is_head(a));
        assert!(blocks.is_head(g));
        assert!(blocks.is_head(b));
        assert!(blocks.is_head(d));
        assert_eq!(blocks.head_of(g), g);
    }
}
