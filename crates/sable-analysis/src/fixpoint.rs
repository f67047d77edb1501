use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use sable_ir::{Cfg, CodeLocation, EdgeKind, Expr, Identifier, StatementId, Stmt, Variable};
use sable_lattice::{AbstractDomain, HasBottom, Lattice};
use tracing::{debug, trace};

use crate::interproc::ContextToken;
use crate::{
    AbstractState, AnalysisState, FixpointError, SemanticError, WorkingSetKind,
};

/// Knobs of a single CFG fixpoint.
///
/// Cloning is cheap; the cancellation flag is shared, so every clone observes
/// the same cooperative abort request.
#[derive(Debug, Clone)]
pub struct FixpointConfiguration {
    /// Joins at a node switch to widening after this many visits.
    pub widening_threshold: u32,
    /// Rounds of the descending (narrowing) phase; zero disables it.
    pub narrowing_steps: u32,
    pub worklist: WorkingSetKind,
    /// Store only block-head (and call) states, reconstructing the rest on
    /// demand.
    pub optimize: bool,
    /// Backstop against broken widening operators: total node evaluations
    /// one CFG fixpoint may perform.
    pub iteration_fuel: usize,
    cancellation: Arc<AtomicBool>,
}

impl Default for FixpointConfiguration {
    fn default() -> Self {
        FixpointConfiguration {
            widening_threshold: 5,
            narrowing_steps: 0,
            worklist: WorkingSetKind::default(),
            optimize: false,
            iteration_fuel: 100_000,
            cancellation: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FixpointConfiguration {
    pub fn with_widening_threshold(mut self, threshold: u32) -> Self {
        self.widening_threshold = threshold;
        self
    }

    pub fn with_narrowing_steps(mut self, steps: u32) -> Self {
        self.narrowing_steps = steps;
        self
    }

    pub fn with_worklist(mut self, kind: WorkingSetKind) -> Self {
        self.worklist = kind;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Handle the caller may set from outside to abort the analysis between
    /// worklist pops.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancellation)
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancellation.load(Ordering::Relaxed)
    }
}

/// One call site, as seen by the interprocedural layer.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub assign_to: Option<&'a Expr>,
    pub function: &'a str,
    pub args: &'a [Expr],
    pub location: CodeLocation,
}

/// How the CFG fixpoint escapes to the interprocedural driver when it meets a
/// call statement.
pub trait CallEvaluator<A> {
    fn evaluate_call(
        &mut self,
        caller: &Cfg,
        call: CallSite<'_>,
        state: &AnalysisState<A>,
    ) -> Result<AnalysisState<A>, FixpointError>;
}

/// The engine-synthesized variable carrying a CFG's return value.
pub(crate) fn return_variable(cfg_name: &str) -> Identifier {
    Identifier::Variable(Variable::meta(format!("ret@{cfg_name}")))
}

/// Transfer function of a single statement.
pub(crate) fn statement_semantics<A: AbstractState>(
    cfg: &Cfg,
    stmt: &Stmt,
    entry: &AnalysisState<A>,
    evaluator: &mut dyn CallEvaluator<A>,
) -> Result<AnalysisState<A>, FixpointError> {
    let pp = stmt.location();
    match stmt {
        Stmt::Assign { target, value, .. } => assign_to_target(entry, target, value, pp),
        Stmt::Expression { expr, .. } => entry
            .small_step(expr, pp)
            .map_err(|e| FixpointError::semantic(pp, e)),
        Stmt::Return { expr, .. } => match expr {
            Some(e) => entry
                .assign(&return_variable(cfg.name()), e, pp)
                .map_err(|e| FixpointError::semantic(pp, e)),
            None => entry
                .small_step(&Expr::Skip, pp)
                .map_err(|e| FixpointError::semantic(pp, e)),
        },
        Stmt::Call {
            assign_to,
            function,
            args,
            location,
        } => evaluator.evaluate_call(
            cfg,
            CallSite {
                assign_to: assign_to.as_ref(),
                function,
                args,
                location: *location,
            },
            entry,
        ),
    }
}

/// Resolve the left-hand side to identifiers and assign each, joining the
/// alternatives; more than one target makes the store weak by construction.
pub(crate) fn assign_to_target<A: AbstractState>(
    entry: &AnalysisState<A>,
    target: &Expr,
    value: &Expr,
    pp: CodeLocation,
) -> Result<AnalysisState<A>, FixpointError> {
    if let Some(id) = target.as_identifier() {
        return entry
            .assign(id, value, pp)
            .map_err(|e| FixpointError::semantic(pp, e));
    }
    let rewritten = entry
        .rewrite(target, pp)
        .map_err(|e| FixpointError::semantic(pp, e))?;
    let mut out: Option<AnalysisState<A>> = None;
    for e in rewritten.iter() {
        let Some(id) = e.as_identifier() else { continue };
        let next = entry
            .assign(id, value, pp)
            .map_err(|e| FixpointError::semantic(pp, e))?;
        out = Some(match out {
            Some(acc) => acc.join(&next),
            None => next,
        });
    }
    out.ok_or_else(|| {
        FixpointError::semantic(
            pp,
            SemanticError::NoRewrittenIdentifier {
                expr: target.to_string(),
            },
        )
    })
}

/// The guard that branch edges out of `stmt` assume.
fn guard_of(stmt: &Stmt) -> Option<&Expr> {
    match stmt {
        Stmt::Expression { expr, .. } => Some(expr),
        _ => None,
    }
}

// -- Fixpoint computation ---------------------------------------------------

pub(crate) struct CfgFixpoint<'a, A> {
    cfg: &'a Cfg,
    token: ContextToken,
    config: FixpointConfiguration,
    _marker: std::marker::PhantomData<A>,
}

impl<'a, A: AbstractState> CfgFixpoint<'a, A> {
    pub(crate) fn new(cfg: &'a Cfg, token: ContextToken, config: FixpointConfiguration) -> Self {
        CfgFixpoint {
            cfg,
            token,
            config,
            _marker: std::marker::PhantomData,
        }
    }

    /// Join of all predecessor contributions into `n`, with branch edges
    /// assuming their guard (or its negation). Returns `None` for a node
    /// with no computed predecessor and no seed.
    fn entry_state_of(
        &self,
        n: StatementId,
        entry_id: StatementId,
        seed: &AnalysisState<A>,
        post: &FxHashMap<StatementId, AnalysisState<A>>,
    ) -> Result<Option<AnalysisState<A>>, FixpointError> {
        let dest_loc = self
            .cfg
            .statement(n)
            .map(Stmt::location)
            .unwrap_or(CodeLocation::UNKNOWN);
        let mut acc: Option<AnalysisState<A>> = None;
        let mut push = |state: AnalysisState<A>| {
            acc = Some(match acc.take() {
                Some(existing) => existing.join(&state),
                None => state,
            });
        };
        if n == entry_id {
            push(seed.clone());
        }
        for (p, kind) in self.cfg.predecessors(n) {
            let Some(p_post) = post.get(&p) else { continue };
            let p_stmt = self.cfg.statement(p);
            let src_loc = p_stmt.map(Stmt::location).unwrap_or(CodeLocation::UNKNOWN);
            let contribution = match kind {
                EdgeKind::Sequential => p_post.clone(),
                EdgeKind::TrueBranch => match p_stmt.and_then(guard_of) {
                    Some(guard) => p_post
                        .assume(guard, src_loc, dest_loc)
                        .map_err(|e| FixpointError::semantic(src_loc, e))?,
                    None => p_post.clone(),
                },
                EdgeKind::FalseBranch => match p_stmt.and_then(guard_of) {
                    Some(guard) => p_post
                        .assume(&guard.clone().negated(), src_loc, dest_loc)
                        .map_err(|e| FixpointError::semantic(src_loc, e))?,
                    None => p_post.clone(),
                },
            };
            push(contribution);
        }
        Ok(acc)
    }

    /// Run the ascending phase (and the descending one when configured),
    /// producing per-statement entry and exit states.
    pub(crate) fn run(
        &self,
        seed: AnalysisState<A>,
        evaluator: &mut dyn CallEvaluator<A>,
    ) -> Result<AnalyzedCfg<A>, FixpointError> {
        let entry_id = self.cfg.entry().ok_or_else(|| FixpointError::MissingEntry {
            cfg: self.cfg.name().to_owned(),
        })?;

        let mut pre: FxHashMap<StatementId, AnalysisState<A>> = FxHashMap::default();
        let mut post: FxHashMap<StatementId, AnalysisState<A>> = FxHashMap::default();
        let mut visits: FxHashMap<StatementId, u32> = FxHashMap::default();
        let mut fuel = self.config.iteration_fuel;

        debug!(cfg = self.cfg.name(), "starting ascending fixpoint");
        let mut worklist = self.config.worklist.instantiate::<StatementId>();
        worklist.push(entry_id);
        while !worklist.is_empty() {
            if self.config.cancelled() {
                return Err(FixpointError::Cancelled);
            }
            let Ok(n) = worklist.pop() else { break };
            if fuel == 0 {
                return Err(FixpointError::NonTerminating {
                    cfg: self.cfg.name().to_owned(),
                    fuel: self.config.iteration_fuel,
                });
            }
            fuel -= 1;

            let Some(stmt) = self.cfg.statement(n) else {
                continue;
            };
            let Some(s_pre) = self.entry_state_of(n, entry_id, &seed, &post)? else {
                continue;
            };
            pre.insert(n, s_pre.clone());
            let s_post = statement_semantics(self.cfg, stmt, &s_pre, evaluator)?;
            trace!(cfg = self.cfg.name(), statement = %n, "evaluated");

            let combined = match post.get(&n) {
                Some(old) if s_post.is_subseteq(old) => continue,
                Some(old) => {
                    let count = visits.entry(n).or_insert(0);
                    *count += 1;
                    if *count < self.config.widening_threshold {
                        old.join(&s_post)
                    } else {
                        old.widen(&old.join(&s_post))
                    }
                }
                None => s_post,
            };
            post.insert(n, combined);
            for (succ, _) in self.cfg.successors(n) {
                worklist.push(succ);
            }
        }

        if self.config.narrowing_steps > 0 {
            self.descend(entry_id, &seed, &mut pre, &mut post, evaluator)?;
        }

        let exit = self
            .cfg
            .exit_points()
            .iter()
            .filter_map(|id| post.get(id))
            .fold(AnalysisState::bottom(), |acc, s| acc.join(s));

        let mut analyzed = AnalyzedCfg {
            cfg_name: self.cfg.name().to_owned(),
            token: self.token.clone(),
            entry: seed,
            pre,
            post,
            exit,
            optimized: false,
        };
        if self.config.optimize {
            analyzed.shrink_to_blocks(self.cfg);
        }
        Ok(analyzed)
    }

    /// Descending phase: refine the ascending post-fixpoint with narrowing
    /// until nothing changes or the step bound is hit.
    fn descend(
        &self,
        entry_id: StatementId,
        seed: &AnalysisState<A>,
        pre: &mut FxHashMap<StatementId, AnalysisState<A>>,
        post: &mut FxHashMap<StatementId, AnalysisState<A>>,
        evaluator: &mut dyn CallEvaluator<A>,
    ) -> Result<(), FixpointError> {
        debug!(cfg = self.cfg.name(), "starting descending fixpoint");
        for _ in 0..self.config.narrowing_steps {
            if self.config.cancelled() {
                return Err(FixpointError::Cancelled);
            }
            let mut changed = false;
            for (n, stmt) in self.cfg.statements() {
                let Some(s_pre) = self.entry_state_of(n, entry_id, seed, post)? else {
                    continue;
                };
                pre.insert(n, s_pre.clone());
                let s_post = statement_semantics(self.cfg, stmt, &s_pre, evaluator)?;
                if let Some(old) = post.get(&n) {
                    let narrowed = old.narrow(&s_post);
                    if &narrowed != old {
                        changed = true;
                        post.insert(n, narrowed);
                    }
                }
            }
            if !changed {
                break;
            }
        }
        Ok(())
    }
}

// -- Results ----------------------------------------------------------------

/// The outcome of one CFG fixpoint under one context token.
///
/// In optimized form only block-head entry states and call exit states are
/// kept; everything else is replayed on demand from the nearest block head.
#[derive(Debug, Clone)]
pub struct AnalyzedCfg<A> {
    cfg_name: String,
    token: ContextToken,
    entry: AnalysisState<A>,
    pre: FxHashMap<StatementId, AnalysisState<A>>,
    post: FxHashMap<StatementId, AnalysisState<A>>,
    exit: AnalysisState<A>,
    optimized: bool,
}

impl<A: AbstractState> AnalyzedCfg<A> {
    pub fn cfg_name(&self) -> &str {
        &self.cfg_name
    }

    pub fn token(&self) -> &ContextToken {
        &self.token
    }

    /// The entry state this result was computed for.
    pub fn entry_state(&self) -> &AnalysisState<A> {
        &self.entry
    }

    /// Join of the exit states of all exit points.
    pub fn exit_state(&self) -> &AnalysisState<A> {
        &self.exit
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// The stored state before `id`, if it was kept.
    pub fn pre_state_of(&self, id: StatementId) -> Option<&AnalysisState<A>> {
        self.pre.get(&id)
    }

    /// The stored state after `id`, if it was kept.
    pub fn post_state_of(&self, id: StatementId) -> Option<&AnalysisState<A>> {
        self.post.get(&id)
    }

    /// The state before `id`, replaying the enclosing basic block when this
    /// result is optimized.
    pub fn unwinded_pre(&self, cfg: &Cfg, id: StatementId) -> Result<AnalysisState<A>, FixpointError> {
        if let Some(state) = self.pre.get(&id) {
            return Ok(state.clone());
        }
        self.replay(cfg, id, ReplayUntil::Before)
    }

    /// The state after `id`, replaying the enclosing basic block when this
    /// result is optimized.
    pub fn unwinded_post(&self, cfg: &Cfg, id: StatementId) -> Result<AnalysisState<A>, FixpointError> {
        if let Some(state) = self.post.get(&id) {
            return Ok(state.clone());
        }
        self.replay(cfg, id, ReplayUntil::After)
    }

    fn missing(&self, id: StatementId) -> FixpointError {
        FixpointError::MissingResult {
            cfg: self.cfg_name.clone(),
            statement: id,
        }
    }

    fn replay(
        &self,
        cfg: &Cfg,
        id: StatementId,
        until: ReplayUntil,
    ) -> Result<AnalysisState<A>, FixpointError> {
        let Some(blocks) = cfg.basic_blocks() else {
            return Err(self.missing(id));
        };
        let head = blocks.head_of(id);
        let mut state = self.pre.get(&head).cloned().ok_or_else(|| self.missing(id))?;
        for &m in blocks.block(head) {
            if m == id && until == ReplayUntil::Before {
                return Ok(state);
            }
            let stmt = cfg.statement(m).ok_or_else(|| self.missing(m))?;
            let s_post = if stmt.is_call() {
                // Call effects depend on summaries, which are not replayable
                // here; the fixpoint stored them for exactly this reason.
                self.post.get(&m).cloned().ok_or_else(|| self.missing(m))?
            } else {
                statement_semantics(cfg, stmt, &state, &mut UnreachableCalls)?
            };
            if m == id {
                return Ok(s_post);
            }
            state = s_post;
        }
        Err(self.missing(id))
    }

    /// Drop everything but block-head entry states and call exit states.
    fn shrink_to_blocks(&mut self, cfg: &Cfg) {
        let Some(blocks) = cfg.basic_blocks() else {
            return;
        };
        self.pre.retain(|id, _| blocks.is_head(*id));
        self.post
            .retain(|id, _| cfg.statement(*id).is_some_and(Stmt::is_call));
        self.optimized = true;
    }
}

#[derive(PartialEq, Clone, Copy)]
enum ReplayUntil {
    Before,
    After,
}

/// Replay never reaches a call statement; see [`AnalyzedCfg::replay`].
struct UnreachableCalls;

impl<A: AbstractState> CallEvaluator<A> for UnreachableCalls {
    fn evaluate_call(
        &mut self,
        _caller: &Cfg,
        call: CallSite<'_>,
        _state: &AnalysisState<A>,
    ) -> Result<AnalysisState<A>, FixpointError> {
        Err(FixpointError::UnresolvedCall {
            function: call.function.to_owned(),
            location: call.location,
        })
    }
}
