use keyset_base::SymbolId;
use keyset_logic::Annotation;

use crate::node::Node;

/// `{nodes: list<Node>, pre: Annotation, config}` (spec §4.E). Grounded on
/// `examples/original_source/src/solver/default/flowgraph.hpp`'s
/// `solver::FlowGraph`, which stores nodes in a `deque` and owns the
/// pre-annotation the graph was built from.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    pub nodes: Vec<Node>,
    pub pre: Annotation,
}

impl FlowGraph {
    pub fn new(pre: Annotation) -> Self {
        Self {
            nodes: Vec::new(),
            pre,
        }
    }

    pub fn node(&self, address: SymbolId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.address == address)
    }

    pub fn node_mut(&mut self, address: SymbolId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.address == address)
    }

    pub fn contains(&self, address: SymbolId) -> bool {
        self.node(address).is_some()
    }

    pub fn addresses(&self) -> Vec<SymbolId> {
        self.nodes.iter().map(|n| n.address).collect()
    }

    /// Drops every node that isn't `needed` and whose fields/flow/locality
    /// are identical between pre and post (spec §4.F "the footprint is
    /// minimised to nodes that were marked needed by any check or that had
    /// any field change").
    pub fn minimise(&mut self) {
        self.nodes.retain(|n| n.needed || n.any_field_changed());
    }

    /// Spec §4.E step 6: the root (the first node inserted by
    /// `MakeFlowFootprint`) may not have an incoming edge in either mode.
    pub fn has_incoming_edge_to(&self, target: SymbolId) -> bool {
        self.nodes.iter().any(|n| {
            n.pointer_successors(true)
                .iter()
                .chain(n.pointer_successors(false).iter())
                .any(|succ| succ.symbol() == Some(target))
        })
    }
}
