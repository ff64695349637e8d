use crate::axiom::Axiom;

/// A formula (spec §3 "Formula"). `SeparatingConjunction` children are
/// resource-disjoint by construction discipline (the encoder, not this
/// type, enforces disjointness via `EncodeOwnership`). `StackDisjunction`
/// is only ever produced transiently while translating an `assume`
/// expression and is split into parallel paths before it reaches an
/// annotation's `now`. `Implication` backs node/variable invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Atom(Axiom),
    SeparatingConjunction(Vec<Formula>),
    StackDisjunction(Vec<Formula>),
    Implication(Box<Formula>, Box<Formula>),
}

impl Formula {
    pub fn atom(axiom: Axiom) -> Self {
        Formula::Atom(axiom)
    }

    pub fn and(children: Vec<Formula>) -> Self {
        Formula::SeparatingConjunction(children)
    }

    pub fn implies(premise: Formula, conclusion: Formula) -> Self {
        Formula::Implication(Box::new(premise), Box::new(conclusion))
    }

    pub fn empty() -> Self {
        Formula::SeparatingConjunction(Vec::new())
    }

    /// Depth-first, pre-order visit of every sub-formula (including `self`).
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Formula)) {
        f(self);
        match self {
            Formula::Atom(_) => {}
            Formula::SeparatingConjunction(cs) | Formula::StackDisjunction(cs) => {
                for c in cs {
                    c.walk(f);
                }
            }
            Formula::Implication(p, c) => {
                p.walk(f);
                c.walk(f);
            }
        }
    }

    /// All axioms mentioned anywhere in this formula, in encounter order.
    pub fn axioms(&self) -> Vec<&Axiom> {
        let mut out = Vec::new();
        self.walk(&mut |f| {
            if let Formula::Atom(a) = f {
                out.push(a);
            }
        });
        out
    }

    pub fn mentions_resources(&self) -> bool {
        self.axioms().iter().any(|a| {
            matches!(
                a,
                Axiom::Memory { .. } | Axiom::EqualsTo { .. } | Axiom::Obligation { .. } | Axiom::Fulfillment { .. }
            )
        })
    }
}
