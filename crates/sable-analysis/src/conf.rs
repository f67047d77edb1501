use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use indexmap::IndexMap;
use sable_ir::Program;
use tracing::{debug, info};

use crate::{
    AbstractState, AnalysisError, AnalysisGraphs, AnalysisState, AnalyzedCfg, CallGraph,
    CheckTool, ContextBasedAnalysis, ContextSensitivity, FixpointConfiguration, FixpointError,
    OpenCallPolicy, ProgramCallGraph, RenderedGraph, SemanticCheck, SerializableGraph,
    SetupError, StatementResults, SyntacticCheck, Warning,
};

/// Everything one analysis run is parameterized by.
///
/// The entry state doubles as the domain choice: the composite abstract
/// state instance handed in here decides which heap, value and type domains
/// the run computes with. No global registry is involved.
pub struct AnalysisConfiguration<A> {
    pub entry_state: AnalysisState<A>,
    pub fixpoint: FixpointConfiguration,
    pub context_sensitivity: ContextSensitivity,
    pub open_call_policy: OpenCallPolicy,
    /// Call resolution; the name-based [`ProgramCallGraph`] by default.
    pub call_graph: Box<dyn CallGraph>,
    pub analysis_graphs: AnalysisGraphs,
    /// Reconstruct per-statement states before dumping optimized results.
    pub dump_forces_unwinding: bool,
    /// Dump the input CFGs (no states) alongside the results.
    pub serialize_inputs: bool,
    /// Dump the analyzed CFGs with their post-states.
    pub serialize_results: bool,
    syntactic_checks: Vec<Box<dyn SyntacticCheck>>,
    semantic_checks: Vec<Box<dyn SemanticCheck<A>>>,
}

impl<A: AbstractState> AnalysisConfiguration<A> {
    pub fn new(entry_state: AnalysisState<A>) -> Self {
        AnalysisConfiguration {
            entry_state,
            fixpoint: FixpointConfiguration::default(),
            context_sensitivity: ContextSensitivity::default(),
            open_call_policy: OpenCallPolicy::default(),
            call_graph: Box::new(ProgramCallGraph::new()),
            analysis_graphs: AnalysisGraphs::default(),
            dump_forces_unwinding: true,
            serialize_inputs: false,
            serialize_results: false,
            syntactic_checks: Vec::new(),
            semantic_checks: Vec::new(),
        }
    }

    pub fn with_fixpoint(mut self, fixpoint: FixpointConfiguration) -> Self {
        self.fixpoint = fixpoint;
        self
    }

    pub fn with_context_sensitivity(mut self, sensitivity: ContextSensitivity) -> Self {
        self.context_sensitivity = sensitivity;
        self
    }

    pub fn with_open_call_policy(mut self, policy: OpenCallPolicy) -> Self {
        self.open_call_policy = policy;
        self
    }

    pub fn with_call_graph(mut self, call_graph: impl CallGraph + 'static) -> Self {
        self.call_graph = Box::new(call_graph);
        self
    }

    pub fn with_analysis_graphs(mut self, graphs: AnalysisGraphs) -> Self {
        self.analysis_graphs = graphs;
        self
    }

    pub fn with_serialize_inputs(mut self, serialize: bool) -> Self {
        self.serialize_inputs = serialize;
        self
    }

    pub fn with_serialize_results(mut self, serialize: bool) -> Self {
        self.serialize_results = serialize;
        self
    }

    pub fn add_syntactic_check(mut self, check: impl SyntacticCheck + 'static) -> Self {
        self.syntactic_checks.push(Box::new(check));
        self
    }

    pub fn add_semantic_check(mut self, check: impl SemanticCheck<A> + 'static) -> Self {
        self.semantic_checks.push(Box::new(check));
        self
    }

    /// The shared flag that cooperatively aborts the run when set.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.fixpoint.cancellation_flag()
    }

    fn validate(&self) -> Result<(), SetupError> {
        if self.fixpoint.widening_threshold < 1 {
            return Err(SetupError::InvalidWideningThreshold {
                got: self.fixpoint.widening_threshold,
            });
        }
        if !self.analysis_graphs.is_none() && self.fixpoint.optimize && !self.dump_forces_unwinding
        {
            return Err(SetupError::DumpWithoutUnwinding);
        }
        Ok(())
    }
}

/// The outcome of a run: warnings, per-CFG results keyed by context token,
/// recorded fixpoint failures and any requested graph dumps.
pub struct AnalysisReport<A> {
    warnings: Vec<Warning>,
    results: IndexMap<String, Vec<AnalyzedCfg<A>>>,
    errors: Vec<FixpointError>,
    graphs: Vec<RenderedGraph>,
}

impl<A: AbstractState> AnalysisReport<A> {
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// One result per context token observed for `cfg`.
    pub fn results_of(&self, cfg: &str) -> &[AnalyzedCfg<A>] {
        self.results.get(cfg).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn analyzed_cfgs(&self) -> impl Iterator<Item = (&str, &[AnalyzedCfg<A>])> {
        self.results.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Fixpoint errors recorded while other CFGs kept analyzing.
    pub fn errors(&self) -> &[FixpointError] {
        &self.errors
    }

    pub fn graphs(&self) -> &[RenderedGraph] {
        &self.graphs
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The analysis engine façade: configure once, run over a program.
pub struct Sable<A> {
    conf: AnalysisConfiguration<A>,
}

impl<A: AbstractState> Sable<A> {
    pub fn new(conf: AnalysisConfiguration<A>) -> Self {
        Sable { conf }
    }

    /// Run the whole pipeline: validation, whole-program fixpoint, checks,
    /// dumps. Fixpoint failures of individual CFGs are collected in the
    /// report; setup and validation problems, and cancellation, abort.
    pub fn run(&mut self, program: &mut Program) -> Result<AnalysisReport<A>, AnalysisError> {
        self.conf.validate()?;
        program.validate()?;
        info!(cfgs = program.cfgs().count(), "starting analysis");

        let mut interproc = ContextBasedAnalysis::new(
            program,
            self.conf.call_graph.as_mut(),
            self.conf.context_sensitivity,
            self.conf.open_call_policy,
            self.conf.fixpoint.clone(),
        );
        interproc.fixpoint(self.conf.entry_state.clone())?;
        let (grouped, errors) = interproc.into_results();
        let mut results: IndexMap<String, Vec<AnalyzedCfg<A>>> = IndexMap::new();
        for (name, analyzed) in grouped {
            results.insert(name, analyzed);
        }

        let warnings = self.run_checks(program, &results);
        let graphs = self.render_graphs(program, &results);
        info!(
            warnings = warnings.len(),
            errors = errors.len(),
            "analysis finished"
        );

        Ok(AnalysisReport {
            warnings,
            results,
            errors,
            graphs,
        })
    }

    fn run_checks(
        &mut self,
        program: &Program,
        results: &IndexMap<String, Vec<AnalyzedCfg<A>>>,
    ) -> Vec<Warning> {
        let mut tool = CheckTool::new();

        for check in &mut self.conf.syntactic_checks {
            check.begin(&mut tool);
            for cfg in program.cfgs() {
                for (id, stmt) in cfg.statements() {
                    check.visit(&mut tool, cfg, id, stmt);
                }
            }
            check.end(&mut tool);
        }

        for check in &mut self.conf.semantic_checks {
            check.begin(&mut tool);
            for cfg in program.cfgs() {
                let analyzed = results.get(cfg.name()).map(Vec::as_slice).unwrap_or(&[]);
                for (id, stmt) in cfg.statements() {
                    let mut per_stmt = StatementResults::default();
                    for result in analyzed {
                        if let Ok(pre) = result.unwinded_pre(cfg, id) {
                            per_stmt.pre.push(pre);
                        }
                        if let Ok(post) = result.unwinded_post(cfg, id) {
                            per_stmt.post.push(post);
                        }
                    }
                    check.visit(&mut tool, cfg, id, stmt, &per_stmt);
                }
            }
            check.end(&mut tool);
        }

        tool.into_warnings()
    }

    fn render_graphs(
        &self,
        program: &Program,
        results: &IndexMap<String, Vec<AnalyzedCfg<A>>>,
    ) -> Vec<RenderedGraph> {
        let mut out = Vec::new();
        if self.conf.serialize_inputs {
            for cfg in program.cfgs() {
                out.push(RenderedGraph::Structured(build_graph::<A>(
                    cfg,
                    cfg.name().to_owned(),
                    None,
                    false,
                )));
            }
        }
        if self.conf.analysis_graphs.is_none() && !self.conf.serialize_results {
            return out;
        }
        for cfg in program.cfgs() {
            let analyzed = results.get(cfg.name()).map(Vec::as_slice).unwrap_or(&[]);
            for result in analyzed {
                let name = format!("{}@{}", cfg.name(), result.token());
                debug!(graph = name.as_str(), "rendering analysis graph");
                let graph = build_graph(
                    cfg,
                    name.clone(),
                    Some(result),
                    self.conf.dump_forces_unwinding,
                );
                match self.conf.analysis_graphs {
                    AnalysisGraphs::Dot => out.push(RenderedGraph::Dot {
                        content: graph.to_dot(),
                        name,
                    }),
                    AnalysisGraphs::None => out.push(RenderedGraph::Structured(graph)),
                    _ => out.push(RenderedGraph::Structured(graph)),
                }
            }
        }
        out
    }
}

fn build_graph<A: AbstractState>(
    cfg: &sable_ir::Cfg,
    name: String,
    result: Option<&AnalyzedCfg<A>>,
    unwind: bool,
) -> SerializableGraph {
    let mut graph = SerializableGraph::new(name);
    for (id, stmt) in cfg.statements() {
        let state = result.and_then(|r| {
            let post = if unwind {
                r.unwinded_post(cfg, id).ok()
            } else {
                r.post_state_of(id).cloned()
            };
            post.map(|s| format!("{:?}", s.state()))
        });
        graph.push_node(id.index(), stmt.to_string(), state);
    }
    for (id, _) in cfg.statements() {
        for (succ, kind) in cfg.successors(id) {
            graph.push_edge(id.index(), succ.index(), kind);
        }
    }
    graph
}
