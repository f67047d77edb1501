//! Interprocedural driver: call resolution, context-sensitive summaries and
//! recursion stabilization.

mod call_graph;
mod context;

pub use call_graph::{CallGraph, CallGraphError, ProgramCallGraph};
pub use context::{ContextSensitivity, ContextToken};

use rustc_hash::FxHashMap;
use sable_ir::{Cfg, CodeLocation, Expr, Identifier, Program, ScopeToken, TypeSet};
use sable_lattice::{AbstractDomain, HasBottom, Lattice};
use tracing::{debug, trace};

use crate::fixpoint::{return_variable, CfgFixpoint};
use crate::{
    AbstractState, AnalysisState, AnalyzedCfg, CallEvaluator, CallSite, ExprSet,
    FixpointConfiguration, FixpointError, SemanticError,
};

/// What to do with a call that resolves to no target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenCallPolicy {
    /// Havoc the call result: the callee may have returned anything.
    #[default]
    ReturnTop,
    /// Treat the continuation as unreachable.
    ReturnBottom,
    /// Abort the enclosing CFG fixpoint.
    Fail,
}

type CacheKey = (String, ContextToken);

/// A cached input/output pair for one `(cfg, token)`.
#[derive(Debug, Clone)]
struct Summary<A> {
    entry: AnalysisState<A>,
    exit: AnalysisState<A>,
}

/// Bookkeeping for one strongly-connected set of recursive calls, delimited
/// while its head is being iterated.
#[derive(Debug)]
struct Recursion<A> {
    /// The call site whose re-entry first revealed the cycle.
    start: CodeLocation,
    /// Every `(cfg, token)` on the stack from the head downwards.
    members: Vec<CacheKey>,
    /// Join of the entry states the re-entries asked for.
    entry: AnalysisState<A>,
}

/// Context-sensitive whole-program analysis.
///
/// Calls are resolved through a [`CallGraph`]; each resolved call is analyzed
/// under a child [`ContextToken`] and its result cached as a summary.
/// Recursion is detected by re-entering an active `(cfg, token)`: the
/// re-entry is answered with the current tentative summary (bottom at first)
/// and the head of the cycle re-iterates — widening both the entry and the
/// summary past the configured threshold — until the summary stabilizes.
pub struct ContextBasedAnalysis<'p, A> {
    program: &'p Program,
    call_graph: &'p mut dyn CallGraph,
    sensitivity: ContextSensitivity,
    open_call_policy: OpenCallPolicy,
    config: FixpointConfiguration,
    /// Stack-depth backstop for unbounded token policies.
    max_call_depth: usize,
    results: FxHashMap<CacheKey, AnalyzedCfg<A>>,
    summaries: FxHashMap<CacheKey, Summary<A>>,
    active: Vec<CacheKey>,
    recursions: FxHashMap<CacheKey, Recursion<A>>,
    errors: Vec<FixpointError>,
}

impl<'p, A: AbstractState> ContextBasedAnalysis<'p, A> {
    pub fn new(
        program: &'p Program,
        call_graph: &'p mut dyn CallGraph,
        sensitivity: ContextSensitivity,
        open_call_policy: OpenCallPolicy,
        config: FixpointConfiguration,
    ) -> Self {
        ContextBasedAnalysis {
            program,
            call_graph,
            sensitivity,
            open_call_policy,
            config,
            max_call_depth: 256,
            results: FxHashMap::default(),
            summaries: FxHashMap::default(),
            active: Vec::new(),
            recursions: FxHashMap::default(),
            errors: Vec::new(),
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// This driver resolves calls, so it cannot run without a call graph.
    pub fn needs_call_graph(&self) -> bool {
        true
    }

    pub fn call_graph(&self) -> &dyn CallGraph {
        &*self.call_graph
    }

    /// Drive the whole-program analysis from every entrypoint.
    ///
    /// Per-entrypoint fixpoint failures are recorded (see
    /// [`ContextBasedAnalysis::errors`]) and the remaining entrypoints still
    /// run; only cancellation aborts everything.
    pub fn fixpoint(&mut self, entry_state: AnalysisState<A>) -> Result<(), FixpointError> {
        self.call_graph.build(self.program)?;
        for name in self.program.entrypoints() {
            debug!(entrypoint = name.as_str(), "analyzing entrypoint");
            match self.analyze(
                name,
                ContextToken::starting(),
                entry_state.clone(),
                CodeLocation::UNKNOWN,
            ) {
                Ok(_) => {}
                Err(FixpointError::Cancelled) => return Err(FixpointError::Cancelled),
                Err(error) => {
                    debug!(entrypoint = name.as_str(), %error, "entrypoint failed");
                    self.errors.push(error);
                }
            }
        }
        Ok(())
    }

    /// Errors recorded for CFGs whose fixpoint failed; results of the other
    /// CFGs are preserved.
    pub fn errors(&self) -> &[FixpointError] {
        &self.errors
    }

    /// One result per context token observed for `cfg`, in token order.
    pub fn results_of(&self, cfg: &str) -> Vec<&AnalyzedCfg<A>> {
        let mut out: Vec<(&ContextToken, &AnalyzedCfg<A>)> = self
            .results
            .iter()
            .filter(|((name, _), _)| name == cfg)
            .map(|((_, token), analyzed)| (token, analyzed))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out.into_iter().map(|(_, analyzed)| analyzed).collect()
    }

    /// All results, grouped by CFG name in program order.
    pub fn into_results(self) -> (Vec<(String, Vec<AnalyzedCfg<A>>)>, Vec<FixpointError>) {
        let mut results = self.results;
        let mut grouped = Vec::new();
        for cfg in self.program.cfgs() {
            let mut for_cfg: Vec<(ContextToken, AnalyzedCfg<A>)> = Vec::new();
            let keys: Vec<CacheKey> = results
                .keys()
                .filter(|(name, _)| name == cfg.name())
                .cloned()
                .collect();
            for key in keys {
                if let Some(analyzed) = results.remove(&key) {
                    for_cfg.push((key.1, analyzed));
                }
            }
            for_cfg.sort_by(|a, b| a.0.cmp(&b.0));
            grouped.push((
                cfg.name().to_owned(),
                for_cfg.into_iter().map(|(_, a)| a).collect(),
            ));
        }
        (grouped, self.errors)
    }

    // -- Core ---------------------------------------------------------------

    /// Analyze `name` under `token` with the given entry state, returning the
    /// exit state. Summaries short-circuit repeated calls; active keys mark
    /// recursion.
    fn analyze(
        &mut self,
        name: &str,
        token: ContextToken,
        entry: AnalysisState<A>,
        call_site: CodeLocation,
    ) -> Result<AnalysisState<A>, FixpointError> {
        let key: CacheKey = (name.to_owned(), token.clone());

        if self.active.contains(&key) {
            return self.reenter(key, entry, call_site);
        }
        if let Some(summary) = self.summaries.get(&key)
            && entry.is_subseteq(&summary.entry)
        {
            trace!(cfg = name, token = %token, "summary cache hit");
            return Ok(summary.exit.clone());
        }
        if self.active.len() >= self.max_call_depth {
            return Err(FixpointError::DivergentRecursion {
                cfg: name.to_owned(),
            });
        }
        let program = self.program;
        let Some(cfg) = program.cfg(name) else {
            return Err(FixpointError::UnresolvedCall {
                function: name.to_owned(),
                location: call_site,
            });
        };

        let mut current_entry = entry;
        let mut iterations: u32 = 0;
        loop {
            iterations += 1;
            if iterations > self.config.widening_threshold.saturating_mul(16).max(16) {
                return Err(FixpointError::DivergentRecursion {
                    cfg: name.to_owned(),
                });
            }

            // Tentative summary visible to recursive re-entries: the current
            // entry paired with the previous round's exit (bottom at first).
            let previous = self
                .summaries
                .get(&key)
                .map(|s| s.exit.clone())
                .unwrap_or_else(AnalysisState::bottom);
            self.summaries.insert(
                key.clone(),
                Summary {
                    entry: current_entry.clone(),
                    exit: previous.clone(),
                },
            );

            self.active.push(key.clone());
            let run = CfgFixpoint::new(cfg, token.clone(), self.config.clone())
                .run(current_entry.clone(), self);
            self.active.pop();
            let analyzed = run?;
            let exit = analyzed.exit_state().clone();
            self.results.insert(key.clone(), analyzed);

            let Some(recursion) = self.recursions.remove(&key) else {
                // Nobody looped back into this run: the result is final.
                self.summaries.insert(
                    key.clone(),
                    Summary {
                        entry: current_entry,
                        exit: exit.clone(),
                    },
                );
                return Ok(exit);
            };

            debug!(
                cfg = name,
                token = %token,
                start = %recursion.start,
                round = iterations,
                "recursion detected, iterating head"
            );

            // Summaries of the other participants were computed against our
            // stale tentative value; they must not outlive this round.
            for member in &recursion.members {
                if member != &key {
                    self.summaries.remove(member);
                    self.results.remove(member);
                }
            }

            let combined = if iterations < self.config.widening_threshold {
                previous.join(&exit)
            } else {
                previous.widen(&previous.join(&exit))
            };
            let exit_stable = combined.is_subseteq(&previous);

            // Entries asked for by re-entries are compared on the
            // callee-visible part only: deeper frames differ in their scoped
            // caller baggage alone, and folding that in would grow the
            // keyset at every round.
            let requested = Self::callee_visible(&recursion.entry);
            let entry_stable = requested.is_subseteq(&Self::callee_visible(&current_entry));
            if !entry_stable {
                current_entry = if iterations < self.config.widening_threshold {
                    current_entry.join(&requested)
                } else {
                    current_entry.widen(&requested)
                };
            }

            self.summaries.insert(
                key.clone(),
                Summary {
                    entry: current_entry.clone(),
                    exit: combined.clone(),
                },
            );
            if exit_stable && entry_stable {
                // The installed summary over-approximates every value handed
                // out mid-iteration.
                return Ok(combined);
            }
        }
    }

    /// A call re-entered an active `(cfg, token)`: answer with the tentative
    /// summary and let the head know it must iterate.
    fn reenter(
        &mut self,
        key: CacheKey,
        entry: AnalysisState<A>,
        call_site: CodeLocation,
    ) -> Result<AnalysisState<A>, FixpointError> {
        let position = self
            .active
            .iter()
            .position(|k| k == &key)
            .unwrap_or(self.active.len() - 1);
        let members: Vec<CacheKey> = self.active[position..].to_vec();

        let tentative = self
            .summaries
            .get(&key)
            .map(|s| s.exit.clone())
            .unwrap_or_else(AnalysisState::bottom);

        let recursion = self
            .recursions
            .entry(key.clone())
            .or_insert_with(|| Recursion {
                start: call_site,
                members: Vec::new(),
                entry: AnalysisState::bottom(),
            });
        for member in members {
            if !recursion.members.contains(&member) {
                recursion.members.push(member);
            }
        }
        recursion.entry = recursion.entry.join(&entry);
        trace!(cfg = key.0.as_str(), "returning tentative recursion summary");
        Ok(tentative)
    }

    /// Restrict a state to what a callee can actually observe: unscoped and
    /// meta variables plus heap identifiers.
    fn callee_visible(state: &AnalysisState<A>) -> AnalysisState<A> {
        state.forget_if(&|id| {
            matches!(id, Identifier::Variable(v) if !v.meta && !v.scopes.is_empty())
        })
    }

    // -- Call binding -------------------------------------------------------

    /// Move the caller's state into the callee's scope and bind formals to
    /// the actual arguments.
    fn bind_formals(
        &self,
        callee: &Cfg,
        call: &CallSite<'_>,
        state: &AnalysisState<A>,
        scope: ScopeToken,
    ) -> Result<AnalysisState<A>, FixpointError> {
        let formals = &callee.descriptor().formals;
        if formals.len() != call.args.len() {
            return Err(FixpointError::semantic(
                call.location,
                SemanticError::ArityMismatch {
                    function: call.function.to_owned(),
                    expected: formals.len(),
                    got: call.args.len(),
                },
            ));
        }
        let mut callee_state = state
            .push_scope(scope)
            .map_err(|e| FixpointError::semantic(call.location, e))?;
        for (formal, actual) in formals.iter().zip(call.args.iter()) {
            let id = Identifier::Variable(formal.clone());
            let actual = actual.push_scope(scope);
            callee_state = callee_state
                .assign(&id, &actual, call.location)
                .map_err(|e| FixpointError::semantic(call.location, e))?;
        }
        Ok(callee_state.with_computed(ExprSet::new()))
    }

    /// Leave the callee's scope and move its return value into the caller's
    /// target, if any.
    fn bind_return(
        &self,
        callee: &str,
        call: &CallSite<'_>,
        exit: AnalysisState<A>,
        scope: ScopeToken,
    ) -> Result<AnalysisState<A>, FixpointError> {
        let ret = return_variable(callee);
        let popped = exit
            .pop_scope(scope)
            .map_err(|e| FixpointError::semantic(call.location, e))?;
        let bound = match call.assign_to {
            Some(target) => crate::fixpoint::assign_to_target(
                &popped,
                target,
                &Expr::Ident(ret.clone()),
                call.location,
            )?,
            None => popped,
        };
        Ok(bound.forget(&ret))
    }

    fn open_call(
        &self,
        call: &CallSite<'_>,
        state: &AnalysisState<A>,
    ) -> Result<AnalysisState<A>, FixpointError> {
        debug!(function = call.function, policy = ?self.open_call_policy, "open call");
        match self.open_call_policy {
            OpenCallPolicy::Fail => Err(FixpointError::UnresolvedCall {
                function: call.function.to_owned(),
                location: call.location,
            }),
            OpenCallPolicy::ReturnTop => match call.assign_to {
                Some(target) => crate::fixpoint::assign_to_target(
                    state,
                    target,
                    &Expr::PushAny(TypeSet::untyped()),
                    call.location,
                ),
                None => Ok(state.clone()),
            },
            OpenCallPolicy::ReturnBottom => Ok(AnalysisState::bottom()),
        }
    }
}

impl<'p, A: AbstractState> CallEvaluator<A> for ContextBasedAnalysis<'p, A> {
    fn evaluate_call(
        &mut self,
        caller: &Cfg,
        call: CallSite<'_>,
        state: &AnalysisState<A>,
    ) -> Result<AnalysisState<A>, FixpointError> {
        let targets = self.call_graph.resolve(caller.name(), call.function)?;
        if targets.is_empty() {
            return self.open_call(&call, state);
        }

        let token = self
            .active
            .last()
            .map(|(_, t)| t.clone())
            .unwrap_or_else(ContextToken::starting);
        let child = token.push(self.sensitivity, call.location);
        let scope = ScopeToken::new(call.location);

        let program = self.program;
        let mut out: Option<AnalysisState<A>> = None;
        for target in &targets {
            let Some(callee) = program.cfg(target) else {
                return Err(FixpointError::UnresolvedCall {
                    function: target.clone(),
                    location: call.location,
                });
            };
            let entry = self.bind_formals(callee, &call, state, scope)?;
            let exit = self.analyze(target, child.clone(), entry, call.location)?;
            let returned = self.bind_return(target, &call, exit, scope)?;
            out = Some(match out {
                Some(acc) => acc.join(&returned),
                None => returned,
            });
        }
        out.ok_or_else(|| FixpointError::UnresolvedCall {
            function: call.function.to_owned(),
            location: call.location,
        })
    }
}
