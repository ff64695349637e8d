//! Per-interface-function traversal and the outer interference fixpoint
//! (spec §4.L), grounded on the original's `ProofGenerator`
//! (`engine/proof.hpp`): a visitor over every [`Statement`] variant that
//! threads three running sets of annotations — the states a path is still
//! following (`current`), the states that left through a `Break`
//! (`breaking`), and the states that left through a `Return`, paired with
//! what they returned (`returning`) — through to wherever those sets are
//! consumed: the next statement in a `Sequence`, the loop that owns a
//! `Break`, or the function's own linearizability check at `Return`.

use std::collections::HashMap;

use keyset_base::SymbolFactory;
use keyset_flow::{FlowConfig, HeapWrite};
use keyset_logic::{simplify, Annotation, Axiom, Expr, Formula, HeapEffect, StackOp};
use keyset_program::{evaluate, Command, InterfaceFunction, ProgramExpr, Statement};
use keyset_solver::{future, interference, join, past, post_other, post_write, Limits, SolverError};
use tracing::info_span;

use crate::error::{ProofError, ProofResult};
use crate::linearizability::{check_linearizability, is_satisfiable};
use crate::macros::{expand_macro, MacroCache, MacroStrategy};

/// A sweep over every interface function is capped to guard against a
/// program whose interference never settles; real programs reach a fixed
/// point in a handful of sweeps.
const MAX_OUTER_SWEEPS: u32 = 1000;

/// The three running sets a statement's visit threads forward (spec §4.L).
pub(crate) struct Frame {
    pub current: Vec<Annotation>,
    pub breaking: Vec<Annotation>,
    pub returning: Vec<(Annotation, Option<Expr>)>,
}

impl Frame {
    pub fn start(current: Vec<Annotation>) -> Self {
        Frame { current, breaking: Vec::new(), returning: Vec::new() }
    }
}

/// State threaded through one function's traversal: the mutable symbol
/// factory and interference pool every `Post` call needs, plus the
/// per-sweep macro memo table and atomic-nesting flag.
pub(crate) struct DriverCtx<'a> {
    pub factory: &'a mut SymbolFactory,
    pub config: &'a dyn FlowConfig,
    pub limits: &'a Limits,
    pub pool: &'a mut Vec<HeapEffect>,
    pub functions: &'a HashMap<String, &'a InterfaceFunction>,
    pub strategy: MacroStrategy,
    pub macro_cache: &'a mut MacroCache,
    pub inside_atomic: bool,
    pub grew: bool,
    pub call_depth: u32,
}

impl<'a> DriverCtx<'a> {
    fn publish(&mut self, effects: Vec<HeapEffect>) -> ProofResult<()> {
        if effects.is_empty() {
            return Ok(());
        }
        let grew = interference::add_interference(self.factory, self.pool, effects)?;
        self.grew |= grew;
        Ok(())
    }
}

pub(crate) fn visit(ctx: &mut DriverCtx, frame: Frame, stmt: &Statement) -> ProofResult<Frame> {
    match stmt {
        Statement::Sequence(a, b) => {
            let frame = visit(ctx, frame, a)?;
            if frame.current.is_empty() {
                return Ok(frame);
            }
            visit(ctx, frame, b)
        }
        Statement::Scope(vars, body) => visit_scope(ctx, frame, vars, body),
        Statement::Atomic(body) => visit_atomic(ctx, frame, body),
        Statement::Choice(branches) => visit_choice(ctx, frame, branches),
        Statement::UnconditionalLoop(body) => visit_loop(ctx, frame, body),
        Statement::Break => {
            let mut frame = frame;
            let broke = std::mem::take(&mut frame.current);
            frame.breaking.extend(broke);
            Ok(frame)
        }
        Statement::Return(expr) => visit_return(ctx, frame, expr.as_ref()),
        Statement::Fail => visit_fail(ctx, frame),
        Statement::Skip => Ok(frame),
        Statement::Command(cmd) => visit_command(ctx, frame, cmd),
        Statement::Call(name) => visit_call(ctx, frame, name),
    }
}

fn visit_return(ctx: &mut DriverCtx, frame: Frame, expr: Option<&ProgramExpr>) -> ProofResult<Frame> {
    let Frame { current, breaking, mut returning } = frame;
    for annotation in current {
        let value = match expr {
            Some(e) => Some(evaluate(e, &annotation)?),
            None => None,
        };
        returning.push((annotation, value));
    }
    Ok(Frame { current: Vec::new(), breaking, returning })
}

fn visit_fail(ctx: &mut DriverCtx, frame: Frame) -> ProofResult<Frame> {
    for annotation in &frame.current {
        if is_satisfiable(ctx.factory, &annotation.now)? {
            return Err(ProofError::ReachedFail);
        }
    }
    Ok(Frame { current: Vec::new(), breaking: frame.breaking, returning: frame.returning })
}

fn enter_scope(factory: &mut SymbolFactory, annotation: &Annotation, vars: &[keyset_base::SymbolId]) -> Annotation {
    let mut children = match simplify::simplify(&annotation.now) {
        Formula::SeparatingConjunction(cs) => cs,
        other => vec![other],
    };
    for &var in vars {
        let ty = factory.ty(var);
        let value = factory.fresh(ty);
        children.push(Formula::atom(Axiom::EqualsTo { program_var: var, value: Expr::variable(value) }));
    }
    Annotation::new(simplify::inline_and_simplify(&Formula::and(children)))
        .with_past(annotation.past.clone())
        .with_future(annotation.future.clone())
}

fn leave_scope(annotation: &Annotation, vars: &[keyset_base::SymbolId]) -> Annotation {
    let kept: Vec<Formula> = annotation
        .now
        .axioms()
        .into_iter()
        .filter(|a| !matches!(a, Axiom::EqualsTo { program_var, .. } if vars.contains(program_var)))
        .map(|a| Formula::atom(a.clone()))
        .collect();
    Annotation::new(simplify::inline_and_simplify(&Formula::and(kept)))
        .with_past(annotation.past.clone())
        .with_future(annotation.future.clone())
}

fn visit_scope(ctx: &mut DriverCtx, frame: Frame, vars: &[keyset_base::SymbolId], body: &Statement) -> ProofResult<Frame> {
    let Frame { current, breaking, returning } = frame;
    let entered: Vec<Annotation> = current.iter().map(|a| enter_scope(ctx.factory, a, vars)).collect();
    let inner = Frame { current: entered, breaking, returning };
    let mut result = visit(ctx, inner, body)?;
    result.current = result.current.iter().map(|a| leave_scope(a, vars)).collect();
    Ok(result)
}

fn visit_atomic(ctx: &mut DriverCtx, frame: Frame, body: &Statement) -> ProofResult<Frame> {
    let was_atomic = ctx.inside_atomic;
    ctx.inside_atomic = true;
    let mut result = visit(ctx, frame, body)?;
    ctx.inside_atomic = was_atomic;
    if !was_atomic {
        let mut stabilised = Vec::with_capacity(result.current.len());
        for annotation in result.current {
            stabilised.push(interference::make_interference_stable(ctx.factory, &annotation, ctx.pool)?);
        }
        result.current = stabilised;
    }
    Ok(result)
}

fn visit_choice(ctx: &mut DriverCtx, frame: Frame, branches: &[Statement]) -> ProofResult<Frame> {
    let base_current = frame.current;
    let mut merged = Frame { current: Vec::new(), breaking: frame.breaking, returning: frame.returning };
    for branch in branches {
        let branch_frame = Frame { current: base_current.clone(), breaking: Vec::new(), returning: Vec::new() };
        let result = visit(ctx, branch_frame, branch)?;
        merged.current.extend(result.current);
        merged.breaking.extend(result.breaking);
        merged.returning.extend(result.returning);
    }
    Ok(merged)
}

/// `UnconditionalLoop` (spec §4.L): peel the first iteration, then iterate
/// `Join(current ∪ {invariant})` until it is syntactically equal to the
/// previous invariant, aborting after [`Limits::loop_abort_after`]
/// iterations. The loop's own `Break`s are only meaningful once computed
/// from the converged invariant, since every earlier iteration's exits are
/// subsumed by it; breaks pending from an *enclosing* loop pass through
/// untouched.
fn visit_loop(ctx: &mut DriverCtx, frame: Frame, body: &Statement) -> ProofResult<Frame> {
    let outer_breaking = frame.breaking;
    let mut outer_returning = frame.returning;

    let mut peeled = visit(ctx, Frame::start(frame.current), body)?;
    outer_returning.append(&mut peeled.returning);

    let mut invariant = join::join(ctx.factory, ctx.limits, peeled.current)?;
    let mut exit_states;
    let mut iterations: u32 = 0;
    loop {
        iterations += 1;
        if iterations > ctx.limits.loop_abort_after {
            return Err(SolverError::LoopNotStabilising { iterations }.into());
        }

        let mut iteration = visit(ctx, Frame::start(vec![invariant.clone()]), body)?;
        outer_returning.append(&mut iteration.returning);
        exit_states = iteration.breaking;

        let mut candidates = iteration.current;
        candidates.push(invariant.clone());
        let next_invariant = join::join(ctx.factory, ctx.limits, candidates)?;
        let converged = next_invariant == invariant;
        invariant = next_invariant;
        if converged {
            break;
        }
    }

    Ok(Frame { current: exit_states, breaking: outer_breaking, returning: outer_returning })
}

fn visit_command(ctx: &mut DriverCtx, frame: Frame, cmd: &Command) -> ProofResult<Frame> {
    let Frame { current, breaking, returning } = frame;
    let mut next_current = Vec::new();
    for annotation in current {
        next_current.extend(apply_command(ctx, &annotation, cmd)?);
    }
    Ok(Frame { current: next_current, breaking, returning })
}

fn apply_command(ctx: &mut DriverCtx, annotation: &Annotation, cmd: &Command) -> ProofResult<Vec<Annotation>> {
    let produced = match cmd {
        Command::Assign { lhs, rhs } => vec![post_other::post_assign(ctx.config, annotation, *lhs, rhs)?],
        Command::Malloc { lhs } => vec![post_other::post_malloc(ctx.factory, ctx.config, annotation, *lhs)?],
        Command::Assume(expr) => post_other::post_assume(ctx.factory, annotation, expr)?,
        Command::LockAcquire { var, field } => {
            let image = post_other::post_lock_acquire(ctx.factory, annotation, *var, field)?;
            ctx.publish(image.effects)?;
            image.annotations
        }
        Command::LockRelease { var, field } => {
            let image = post_other::post_lock_release(ctx.factory, annotation, *var, field)?;
            ctx.publish(image.effects)?;
            image.annotations
        }
        Command::Write { address_var, field, value } => {
            let address = match evaluate(&ProgramExpr::Var(*address_var), annotation)? {
                Expr::Variable(a) => a,
                _ => {
                    return Err(SolverError::ResourceMissing {
                        detail: format!("{address_var} does not hold a memory address"),
                    }
                    .into())
                }
            };
            let value = evaluate(value, annotation)?;
            let write = HeapWrite::new(address, vec![(field.clone(), value)]);
            let with_future_hint = future::improve_future(annotation, &write, ctx.pool)?;
            let image = post_write::post_memory_write(ctx.factory, ctx.config, ctx.limits, &with_future_hint, write)?;
            ctx.publish(image.effects)?;
            image.annotations
        }
    };

    produced.into_iter().map(|a| consolidate(ctx, a)).collect()
}

/// Runs `MakeInterferenceStable` (unless inside an atomic) plus past/future
/// maintenance on a freshly-produced annotation, the "after each command"
/// half of spec §4.L's visit rule for `Command`.
fn consolidate(ctx: &mut DriverCtx, annotation: Annotation) -> ProofResult<Annotation> {
    let annotation = if ctx.inside_atomic {
        annotation
    } else {
        interference::make_interference_stable(ctx.factory, &annotation, ctx.pool)?
    };
    let annotation = past::improve_past(&annotation, ctx.pool)?;
    let annotation = past::reduce_past(ctx.factory, &annotation)?;
    let annotation = future::reduce_future(&annotation)?;
    Ok(annotation)
}

fn visit_call(ctx: &mut DriverCtx, frame: Frame, name: &str) -> ProofResult<Frame> {
    let Frame { current, breaking, returning } = frame;
    let callee = *ctx
        .functions
        .get(name)
        .ok_or_else(|| ProofError::UnknownMacro { name: name.to_string() })?;
    let mut next_current = Vec::new();
    for annotation in current {
        next_current.extend(expand_macro(ctx, callee, annotation)?);
    }
    Ok(Frame { current: next_current, breaking, returning })
}

/// Verifies a single interface function (spec §4.L "Per interface
/// function"): starts from `{obligation(spec, key_var), min < key_var <
/// max}` with `key_var` already bound as a program-variable resource, walks
/// the body, and checks every `Return` for linearizability.
fn verify_function(ctx: &mut DriverCtx, function: &InterfaceFunction) -> ProofResult<()> {
    let _span = info_span!("verify_function", name = %function.name).entered();
    let key = Expr::variable(function.key_var);
    let initial = Formula::and(vec![
        Formula::atom(Axiom::EqualsTo { program_var: function.key_var, value: key }),
        Formula::atom(Axiom::stack(StackOp::Lt, Expr::Min, key)),
        Formula::atom(Axiom::stack(StackOp::Lt, key, Expr::Max)),
        Formula::atom(Axiom::Obligation { spec: function.spec, key: function.key_var }),
    ]);
    let frame = Frame::start(vec![Annotation::new(initial)]);
    let result = visit(ctx, frame, &function.body)?;
    if !result.breaking.is_empty() {
        return Err(ProofError::UnsupportedConstruct {
            detail: format!("function `{}` body breaks out of a loop it never entered", function.name),
        });
    }
    check_linearizability(ctx.factory, &function.name, &result.returning)
}

/// The outcome of verifying a whole program (spec §4.L "outer fixpoint"):
/// the interference pool every function's effects settled into, and how
/// many sweeps over the function list it took to get there.
pub struct VerificationReport {
    pub pool: Vec<HeapEffect>,
    pub sweeps: u32,
}

/// Verifies every interface function in `functions`, repeating the sweep
/// until `AddInterference` reports the pool unchanged across a full pass
/// (spec §4.L "repeat until the effect pool no longer grows").
pub fn verify_program(
    factory: &mut SymbolFactory,
    config: &dyn FlowConfig,
    limits: &Limits,
    strategy: MacroStrategy,
    functions: &[InterfaceFunction],
) -> ProofResult<VerificationReport> {
    let by_name: HashMap<String, &InterfaceFunction> = functions.iter().map(|f| (f.name.clone(), f)).collect();
    let mut pool: Vec<HeapEffect> = Vec::new();
    let mut sweeps: u32 = 0;

    loop {
        sweeps += 1;
        if sweeps > MAX_OUTER_SWEEPS {
            return Err(ProofError::InterferenceNotStabilising { sweeps });
        }

        let mut macro_cache = MacroCache::new();
        let mut grew = false;
        for function in functions {
            let mut ctx = DriverCtx {
                factory,
                config,
                limits,
                pool: &mut pool,
                functions: &by_name,
                strategy,
                macro_cache: &mut macro_cache,
                inside_atomic: false,
                grew: false,
                call_depth: 0,
            };
            verify_function(&mut ctx, function)?;
            grew |= ctx.grew;
        }
        if !grew {
            break;
        }
    }

    Ok(VerificationReport { pool, sweeps })
}
