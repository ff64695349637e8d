use crate::axiom::Axiom;
use crate::formula::Formula;

/// A recorded `(pre, post, context)` triple abstracting one thread's
/// mutation of a shared memory cell (spec §3 "Effect (HeapEffect)",
/// GLOSSARY "Effect"). `pre.address() == post.address()` and `pre` and
/// `post` share the same field set; `context` must not mention resources
/// (checked by [`HeapEffect::validate`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapEffect {
    pub pre: Axiom,
    pub post: Axiom,
    pub context: Formula,
}

impl HeapEffect {
    pub fn new(pre: Axiom, post: Axiom, context: Formula) -> Self {
        Self { pre, post, context }
    }

    /// Checks the structural invariants spec §3 places on effects:
    /// `pre`/`post` are both memory axioms at the same address with the
    /// same field set, and `context` mentions no resources.
    pub fn validate(&self) -> bool {
        let (Some((pre_addr, _, pre_fields, _)), Some((post_addr, _, post_fields, _))) =
            (self.pre.as_memory(), self.post.as_memory())
        else {
            return false;
        };
        pre_addr == post_addr
            && pre_fields.keys().eq(post_fields.keys())
            && !self.context.mentions_resources()
    }

    /// Whether this effect makes no observable change: every field and the
    /// flow symbol are unchanged between `pre` and `post`.
    pub fn is_empty_update(&self) -> bool {
        self.pre == self.post
    }

    /// The set of field names this effect updates (those whose value
    /// differs between `pre` and `post`).
    pub fn updated_fields(&self) -> Vec<&str> {
        let (Some((_, pre_flow, pre_fields, _)), Some((_, post_flow, post_fields, _))) =
            (self.pre.as_memory(), self.post.as_memory())
        else {
            return Vec::new();
        };
        let mut changed: Vec<&str> = pre_fields
            .iter()
            .filter_map(|(name, value)| {
                if post_fields.get(name) != Some(value) {
                    Some(name.as_str())
                } else {
                    None
                }
            })
            .collect();
        if pre_flow != post_flow {
            changed.push("@flow");
        }
        changed
    }
}
