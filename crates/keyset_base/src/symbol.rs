use std::collections::HashSet;
use std::fmt;

/// The type of a symbol, which determines its order.
///
/// `Bool`, `Data`, `ThreadId` and `Pointer` are first-order: they denote a
/// single value. `Flow` is second-order: it denotes an uninterpreted set of
/// data values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    Bool,
    Data,
    ThreadId,
    Pointer,
    Flow,
}

/// First-order (a value) or second-order (a flow set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolOrder {
    First,
    Second,
}

impl SymbolType {
    pub fn order(self) -> SymbolOrder {
        match self {
            SymbolType::Flow => SymbolOrder::Second,
            _ => SymbolOrder::First,
        }
    }
}

/// An identity-based handle to a symbol owned by a [`SymbolFactory`].
///
/// Two `SymbolId`s are equal iff they name the same slot of the same
/// factory; equality never looks at the symbol's name or type. Cloning a
/// `SymbolId` is cheap and does not duplicate the underlying symbol: it is
/// the same symbol shared by reference, matching the "symbols are shared by
/// reference, never cloned" invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct SymbolData {
    name: String,
    ty: SymbolType,
    live: bool,
}

/// Hands out fresh [`SymbolId`]s, recycling retired slots of matching type
/// where possible. Owns the only authoritative record of a symbol's name
/// and type; everything else refers to symbols by `SymbolId`.
///
/// A `SymbolFactory` is explicit state threaded through the proof engine
/// (never a process-wide global, per the design note against global mutable
/// state), so unit tests can each build their own and run independently.
#[derive(Debug, Default)]
pub struct SymbolFactory {
    table: Vec<SymbolData>,
    free: Vec<SymbolId>,
    ordinal: u64,
}

impl SymbolFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh symbol with an auto-generated name, preferring a
    /// retired slot of the same type when one is available and not in
    /// `blacklist`.
    pub fn fresh(&mut self, ty: SymbolType) -> SymbolId {
        self.fresh_avoiding(ty, &HashSet::new())
    }

    /// Like [`fresh`](Self::fresh), but never returns an id in `blacklist`.
    /// Used by `RenameSymbols`'s default renaming and by the interference
    /// engine's effect renaming, both of which must avoid colliding with a
    /// caller-supplied set of symbols already in scope.
    pub fn fresh_avoiding(&mut self, ty: SymbolType, blacklist: &HashSet<SymbolId>) -> SymbolId {
        if let Some(pos) = self
            .free
            .iter()
            .rposition(|id| self.table[id.0 as usize].ty == ty && !blacklist.contains(id))
        {
            let id = self.free.remove(pos);
            self.table[id.0 as usize].live = true;
            return id;
        }
        let ordinal = self.ordinal;
        self.ordinal += 1;
        let name = format!("{}{}", prefix(ty), ordinal);
        self.fresh_named(name, ty)
    }

    /// Allocates a fresh symbol with an explicit name, bypassing recycling.
    /// Used for program-visible names (variables, the function's own
    /// specification key) where a stable human-readable name matters.
    pub fn fresh_named(&mut self, name: impl Into<String>, ty: SymbolType) -> SymbolId {
        let id = SymbolId(self.table.len() as u32);
        self.table.push(SymbolData {
            name: name.into(),
            ty,
            live: true,
        });
        id
    }

    /// Marks `id` as no longer referenced by any live logic object, making
    /// its slot available for recycling by a future `fresh`/`fresh_avoiding`
    /// call requesting the same type. Retiring a symbol still mentioned
    /// elsewhere is a caller bug; the factory cannot detect it (there is no
    /// refcount), matching "annotations take ownership" at the logic layer.
    pub fn retire(&mut self, id: SymbolId) {
        if let Some(slot) = self.table.get_mut(id.0 as usize) {
            slot.live = false;
        }
        self.free.push(id);
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.table[id.0 as usize].name
    }

    pub fn ty(&self, id: SymbolId) -> SymbolType {
        self.table[id.0 as usize].ty
    }

    pub fn is_live(&self, id: SymbolId) -> bool {
        self.table[id.0 as usize].live
    }
}

fn prefix(ty: SymbolType) -> &'static str {
    match ty {
        SymbolType::Bool => "b",
        SymbolType::Data => "d",
        SymbolType::ThreadId => "t",
        SymbolType::Pointer => "p",
        SymbolType::Flow => "fl",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        let mut f = SymbolFactory::new();
        let a = f.fresh(SymbolType::Data);
        let b = f.fresh(SymbolType::Data);
        assert_ne!(a, b);
    }

    #[test]
    fn retirement_recycles_matching_type() {
        let mut f = SymbolFactory::new();
        let a = f.fresh(SymbolType::Pointer);
        f.retire(a);
        let b = f.fresh(SymbolType::Pointer);
        assert_eq!(a, b);
        assert!(f.is_live(b));
    }

    #[test]
    fn blacklist_skips_retired_slot() {
        let mut f = SymbolFactory::new();
        let a = f.fresh(SymbolType::Flow);
        f.retire(a);
        let mut blacklist = HashSet::new();
        blacklist.insert(a);
        let b = f.fresh_avoiding(SymbolType::Flow, &blacklist);
        assert_ne!(a, b);
    }

    #[test]
    fn order_follows_type() {
        assert_eq!(SymbolType::Flow.order(), SymbolOrder::Second);
        assert_eq!(SymbolType::Data.order(), SymbolOrder::First);
        assert_eq!(SymbolType::Pointer.order(), SymbolOrder::First);
    }

    #[test]
    fn named_symbol_keeps_its_name() {
        let mut f = SymbolFactory::new();
        let v = f.fresh_named("head", SymbolType::Pointer);
        assert_eq!(f.name(v), "head");
    }
}
