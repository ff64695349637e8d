//! Non-recursive macro call handling (spec §4.L "Macros"): either inline
//! the callee's body on every visit (eager), or memoize pre/post pairs per
//! callee and reuse a recorded post whenever the current pre-state implies
//! a previously-seen one (lazy).

use std::collections::HashMap;

use keyset_logic::{simplify, Annotation, Formula};
use keyset_program::InterfaceFunction;

use crate::driver::{visit, DriverCtx, Frame};
use crate::error::{ProofError, ProofResult};
use crate::linearizability::formula_implies;

/// How a `Call` to another interface function's body is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroStrategy {
    /// Re-visit the callee's body at every call site.
    Eager,
    /// Memoize `(pre, post)` pairs per callee and reuse a recorded post
    /// whenever the current pre-state implies one already on file.
    Lazy,
}

/// Per-sweep memo table for [`MacroStrategy::Lazy`], keyed by callee name.
pub(crate) type MacroCache = HashMap<String, Vec<(Formula, Vec<Annotation>)>>;

/// A call depth past which a program is almost certainly recursive, which
/// this driver does not support (spec §4.L "Macros (non-recursive calls)").
const MAX_CALL_DEPTH: u32 = 64;

pub(crate) fn expand_macro(ctx: &mut DriverCtx, callee: &InterfaceFunction, annotation: Annotation) -> ProofResult<Vec<Annotation>> {
    match ctx.strategy {
        MacroStrategy::Eager => expand_eager(ctx, callee, annotation),
        MacroStrategy::Lazy => expand_lazy(ctx, callee, annotation),
    }
}

fn enter_call<T>(ctx: &mut DriverCtx, name: &str, body: impl FnOnce(&mut DriverCtx) -> ProofResult<T>) -> ProofResult<T> {
    ctx.call_depth += 1;
    if ctx.call_depth > MAX_CALL_DEPTH {
        ctx.call_depth -= 1;
        return Err(ProofError::RecursiveMacro { name: name.to_string() });
    }
    let result = body(ctx);
    ctx.call_depth -= 1;
    result
}

fn run_callee(ctx: &mut DriverCtx, callee: &InterfaceFunction, pre: Annotation) -> ProofResult<Vec<Annotation>> {
    enter_call(ctx, &callee.name, |ctx| {
        let result = visit(ctx, Frame::start(vec![pre]), &callee.body)?;
        if !result.returning.is_empty() || !result.breaking.is_empty() {
            return Err(ProofError::UnsupportedConstruct {
                detail: format!("macro `{}` exits via break or return, which only an interface function body may do", callee.name),
            });
        }
        Ok(result.current)
    })
}

fn expand_eager(ctx: &mut DriverCtx, callee: &InterfaceFunction, annotation: Annotation) -> ProofResult<Vec<Annotation>> {
    let pruned = local_simplify(&annotation);
    run_callee(ctx, callee, pruned)
}

fn expand_lazy(ctx: &mut DriverCtx, callee: &InterfaceFunction, annotation: Annotation) -> ProofResult<Vec<Annotation>> {
    let pruned = local_simplify(&annotation);

    if let Some(entries) = ctx.macro_cache.get(&callee.name) {
        for (cached_pre, cached_post) in entries {
            if formula_implies(ctx.factory, &pruned.now, cached_pre)? {
                return Ok(cached_post.clone());
            }
        }
    }

    let post = run_callee(ctx, callee, pruned.clone())?;
    ctx.macro_cache
        .entry(callee.name.clone())
        .or_default()
        .push((pruned.now, post.clone()));
    Ok(post)
}

/// Drops redundant conjuncts before descending into the callee, the
/// "local simplification prunes symbols not occurring in any resource or
/// specification" step of spec §4.L.
fn local_simplify(annotation: &Annotation) -> Annotation {
    Annotation::new(simplify::inline_and_simplify(&annotation.now))
        .with_past(annotation.past.clone())
        .with_future(annotation.future.clone())
}
