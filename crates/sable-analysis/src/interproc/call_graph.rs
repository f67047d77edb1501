use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use sable_ir::{Program, Stmt};

/// Call resolution failure.
#[derive(Debug, thiserror::Error)]
pub enum CallGraphError {
    #[error("the call graph was not built before resolving calls")]
    NotBuilt,
}

/// Maps every call site to the code members it may invoke.
///
/// An empty resolution is an *open call* — a target outside the analyzed
/// program — whose handling is governed by the driver's open-call policy.
pub trait CallGraph {
    fn build(&mut self, program: &Program) -> Result<(), CallGraphError>;

    /// The possible targets of a call to `function` from `caller`.
    fn resolve(&self, caller: &str, function: &str) -> Result<Vec<String>, CallGraphError>;

    fn callees_of(&self, cfg: &str) -> Vec<String>;

    fn callers_of(&self, cfg: &str) -> Vec<String>;

    /// CFGs taking part in some call cycle.
    fn recursive_members(&self) -> Vec<String>;
}

/// Name-based, monomorphic call graph over a [`Program`].
///
/// Calls resolve to the single CFG carrying the called name; anything else is
/// an open call. Richer resolution (class hierarchies, function pointers) can
/// be plugged in through the [`CallGraph`] trait.
#[derive(Debug, Default)]
pub struct ProgramCallGraph {
    graph: DiGraph<String, ()>,
    indices: FxHashMap<String, NodeIndex>,
    built: bool,
}

impl ProgramCallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&self, cfg: &str) -> Option<NodeIndex> {
        self.indices.get(cfg).copied()
    }
}

impl CallGraph for ProgramCallGraph {
    fn build(&mut self, program: &Program) -> Result<(), CallGraphError> {
        self.graph.clear();
        self.indices.clear();
        for cfg in program.cfgs() {
            let ix = self.graph.add_node(cfg.name().to_owned());
            self.indices.insert(cfg.name().to_owned(), ix);
        }
        for cfg in program.cfgs() {
            let caller = self.indices[cfg.name()];
            for (_, stmt) in cfg.statements() {
                if let Stmt::Call { function, .. } = stmt
                    && let Some(&callee) = self.indices.get(function)
                {
                    self.graph.update_edge(caller, callee, ());
                }
            }
        }
        self.built = true;
        Ok(())
    }

    fn resolve(&self, _caller: &str, function: &str) -> Result<Vec<String>, CallGraphError> {
        if !self.built {
            return Err(CallGraphError::NotBuilt);
        }
        Ok(match self.indices.get(function) {
            Some(_) => vec![function.to_owned()],
            None => Vec::new(),
        })
    }

    fn callees_of(&self, cfg: &str) -> Vec<String> {
        let Some(ix) = self.index_of(cfg) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(ix, petgraph::Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    fn callers_of(&self, cfg: &str) -> Vec<String> {
        let Some(ix) = self.index_of(cfg) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(ix, petgraph::Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    fn recursive_members(&self) -> Vec<String> {
        let mut members = FxHashSet::default();
        for component in tarjan_scc(&self.graph) {
            if component.len() > 1 {
                members.extend(component.iter().map(|&ix| self.graph[ix].clone()));
            } else if let Some(&only) = component.first()
                && self.graph.find_edge(only, only).is_some()
            {
                members.insert(self.graph[only].clone());
            }
        }
        let mut out: Vec<String> = members.into_iter().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_ir::{Cfg, CfgDescriptor, CodeLocation, Expr};

    fn cfg_calling(name: &str, callees: &[&str]) -> Cfg {
        let mut cfg = Cfg::new(CfgDescriptor::new(name));
        let mut prev = None;
        for (i, callee) in callees.iter().enumerate() {
            let id = cfg.add_statement(Stmt::Call {
                assign_to: None,
                function: (*callee).to_owned(),
                args: Vec::new(),
                location: CodeLocation::line(i as u32 + 1),
            });
            if let Some(prev) = prev {
                cfg.add_edge(prev, id, sable_ir::EdgeKind::Sequential);
            }
            prev = Some(id);
        }
        if prev.is_none() {
            cfg.add_statement(Stmt::Return {
                expr: Some(Expr::int(0)),
                location: CodeLocation::line(1),
            });
        }
        cfg
    }

    fn program(cfgs: Vec<Cfg>) -> Program {
        let mut p = Program::new();
        for cfg in cfgs {
            p.add_cfg(cfg).unwrap();
        }
        p
    }

    #[test]
    fn resolution_is_name_based_and_open_calls_are_empty() {
        let p = program(vec![cfg_calling("main", &["f", "extern"]), cfg_calling("f", &[])]);
        let mut cg = ProgramCallGraph::new();
        assert!(matches!(
            cg.resolve("main", "f"),
            Err(CallGraphError::NotBuilt)
        ));
        cg.build(&p).unwrap();
        assert_eq!(cg.resolve("main", "f").unwrap(), vec!["f".to_owned()]);
        assert!(cg.resolve("main", "extern").unwrap().is_empty());
        assert_eq!(cg.callees_of("main"), vec!["f".to_owned()]);
        assert_eq!(cg.callers_of("f"), vec!["main".to_owned()]);
    }

    #[test]
    fn cycles_are_reported_as_recursive_members() {
        let p = program(vec![
            cfg_calling("main", &["f"]),
            cfg_calling("f", &["g"]),
            cfg_calling("g", &["f"]),
            cfg_calling("self_rec", &["self_rec"]),
        ]);
        let mut cg = ProgramCallGraph::new();
        cg.build(&p).unwrap();
        assert_eq!(
            cg.recursive_members(),
            vec!["f".to_owned(), "g".to_owned(), "self_rec".to_owned()]
        );
    }
}
