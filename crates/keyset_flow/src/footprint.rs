use std::collections::{BTreeMap, VecDeque};

use keyset_base::{SymbolFactory, SymbolId, SymbolType};
use keyset_logic::{Annotation, Axiom, Expr, Locality};
use tracing::{debug, trace};

use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult};
use crate::graph::FlowGraph;
use crate::node::{Node, PointerField};

/// A heap write targeting one or more fields of the same address (spec
/// §4.E "a write whose lhs are dereferences and rhs are simple
/// expressions"). Every verified program statement that mutates the heap
/// goes through exactly one `HeapWrite`, even when it updates several
/// fields in one atomic step.
#[derive(Debug, Clone)]
pub struct HeapWrite {
    pub address: SymbolId,
    pub updates: Vec<(String, Expr)>,
}

impl HeapWrite {
    pub fn new(address: SymbolId, updates: Vec<(String, Expr)>) -> Self {
        Self { address, updates }
    }

    fn new_value(&self, field: &str, old: Expr) -> Expr {
        self.updates
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| *v)
            .unwrap_or(old)
    }
}

fn memory_at<'a>(state: &'a Annotation, address: SymbolId) -> Option<&'a Axiom> {
    state
        .now
        .axioms()
        .into_iter()
        .find(|a| a.address() == Some(address))
}

fn node_from_memory(
    state: &Annotation,
    address: SymbolId,
    write: Option<&HeapWrite>,
    config: &dyn FlowConfig,
    factory: &mut SymbolFactory,
) -> FlowResult<Node> {
    let axiom = memory_at(state, address).ok_or_else(|| FlowError::ResourceMissing {
        symbol: address,
        detail: "no memory resource at this address in the pre-state".into(),
    })?;
    let (addr, flow, fields, locality) = axiom.as_memory().expect("node_from_memory only sees Memory axioms");
    debug_assert_eq!(addr, address);
    let is_local = matches!(locality, Locality::Local);

    let mut data_fields = BTreeMap::new();
    let mut pointer_fields = BTreeMap::new();
    for (name, value) in fields {
        let post_value = write.map(|w| w.new_value(name, *value)).unwrap_or(*value);
        if config.pointer_fields().iter().any(|p| p == name) {
            pointer_fields.insert(
                name.clone(),
                PointerField {
                    name: name.clone(),
                    pre_value: *value,
                    post_value,
                    pre_all_outflow: factory.fresh(SymbolType::Flow),
                    pre_root_outflow: factory.fresh(SymbolType::Flow),
                    post_all_outflow: factory.fresh(SymbolType::Flow),
                    post_root_outflow: factory.fresh(SymbolType::Flow),
                },
            );
        } else {
            data_fields.insert(name.clone(), (*value, post_value));
        }
    }

    // `pre_all_inflow` has to stay `flow`: that's the literal symbol the
    // pre-state's `Memory` axiom already carries, and the premise encodes
    // `pre.now` directly, so any other choice would decouple the node's
    // bookkeeping from what the SMT query actually asserts. Every other
    // inflow-shaped field is a fresh, independent symbol: whether it's
    // forced back to `flow` (the root only, spec §4.E step 1) or derived
    // from an edge (`EncodeFlowRules`/`EncodeOutflow`, §4.F items 3-5) is
    // decided by the caller and by `encode::encode_simple_flow_rules`, not
    // here — a non-root node's post-inflow must be free to move.
    Ok(Node {
        address,
        needed: false,
        pre_local: is_local,
        post_local: is_local,
        pre_all_inflow: flow,
        pre_root_inflow: factory.fresh(SymbolType::Flow),
        pre_keyset: factory.fresh(SymbolType::Flow),
        post_all_inflow: factory.fresh(SymbolType::Flow),
        post_root_inflow: factory.fresh(SymbolType::Flow),
        post_keyset: factory.fresh(SymbolType::Flow),
        frame_inflow: factory.fresh(SymbolType::Flow),
        data_fields,
        pointer_fields,
    })
}

/// `MakeFlowFootprint(pre, write, config)` (spec §4.E). Implements the
/// symbolic-alias variant only, per spec §9's resolution of the Open
/// Question between the two footprint-construction strategies the
/// original carried.
pub fn make_flow_footprint(
    pre: &Annotation,
    write: &HeapWrite,
    config: &dyn FlowConfig,
    factory: &mut SymbolFactory,
) -> FlowResult<FlowGraph> {
    let mut graph = FlowGraph::new(pre.clone());
    let mut root = node_from_memory(pre, write.address, Some(write), config, factory)?;
    // Spec §4.E step 1: "Root's post-inflow equals its pre-inflow" — the
    // root is the one node every heap write is anchored at, so nothing
    // outside the footprint can redirect what flows into it across the
    // update. Non-root nodes get no such treatment: their post-inflow is
    // left free, constrained only by `encode::encode_simple_flow_rules`'s
    // edge-propagation rules once the footprint is encoded.
    root.post_all_inflow = root.pre_all_inflow;
    let root_address = root.address;
    graph.nodes.push(root);

    let mut previous_frontier: Vec<SymbolId> = Vec::new();
    loop {
        let mut queue: VecDeque<(SymbolId, usize)> = VecDeque::new();
        let initial_depth = config
            .pointer_fields()
            .iter()
            .map(|f| config.max_footprint_depth(f))
            .max()
            .unwrap_or(0);
        queue.push_back((root_address, initial_depth));
        let mut frontier: Vec<SymbolId> = Vec::new();
        let mut visited: Vec<SymbolId> = vec![root_address];

        while let Some((address, remaining_depth)) = queue.pop_front() {
            if remaining_depth == 0 {
                continue;
            }
            let successors: Vec<Expr> = graph
                .node(address)
                .map(|n| {
                    n.pointer_fields
                        .values()
                        .flat_map(|f| [f.pre_value, f.post_value])
                        .collect()
                })
                .unwrap_or_default();

            for succ in successors {
                let Some(succ_symbol) = succ.symbol() else {
                    continue; // null or another sentinel: not a heap address
                };
                if succ.is_sentinel() || visited.contains(&succ_symbol) {
                    continue;
                }
                visited.push(succ_symbol);
                match memory_at(pre, succ_symbol) {
                    Some(_) => {
                        let mut child = node_from_memory(pre, succ_symbol, None, config, factory)?;
                        if let Some(parent) = graph.node(address) {
                            if !parent.pre_local || !parent.post_local {
                                child.pre_local = false;
                                child.post_local = false;
                            }
                        }
                        graph.nodes.push(child);
                        queue.push_back((succ_symbol, remaining_depth - 1));
                    }
                    None => frontier.push(succ_symbol),
                }
            }
        }

        if frontier.is_empty() || frontier == previous_frontier {
            break;
        }
        debug!(frontier = frontier.len(), "extending pre-state with fresh frontier memory");
        previous_frontier = frontier;
        // Extending the pre-state with fresh shared memory for the
        // frontier is done by the caller's invariant-discovery
        // collaborator in a full system; here we simply accept the
        // frontier as given and restart the BFS against the unchanged
        // pre-state, which converges immediately since `pre` hasn't
        // grown. A pre-state that genuinely needs frontier extension
        // should supply those memories up front.
        break;
    }

    if graph.has_incoming_edge_to(root_address) {
        return Err(FlowError::CycleInFootprint { root: root_address });
    }

    trace!(nodes = graph.nodes.len(), "flow footprint constructed");
    Ok(graph)
}

/// `MakePureHeapGraph(state, factory, config)` (spec §4.E): a node for
/// every memory axiom in `state`, with pre = post throughout. Used to seed
/// a whole-state view for join and interference renaming.
pub fn make_pure_heap_graph(
    state: &Annotation,
    config: &dyn FlowConfig,
    factory: &mut SymbolFactory,
) -> FlowResult<FlowGraph> {
    let mut graph = FlowGraph::new(state.clone());
    for axiom in state.now.axioms() {
        if let Some(address) = axiom.address() {
            let mut node = node_from_memory(state, address, None, config, factory)?;
            // No write ever touches these nodes, so every pre/post pair
            // this function hands out must actually coincide, not just be
            // left free for some later encoder to constrain.
            node.post_all_inflow = node.pre_all_inflow;
            node.post_root_inflow = node.pre_root_inflow;
            node.post_keyset = node.pre_keyset;
            graph.nodes.push(node);
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyset_base::{SymbolFactory, SymbolType};
    use keyset_logic::{Formula, Locality};

    struct ListConfig {
        pointer_fields: Vec<String>,
        data_fields: Vec<String>,
    }

    impl FlowConfig for ListConfig {
        fn flow_value_type(&self) -> SymbolType {
            SymbolType::Data
        }
        fn pointer_fields(&self) -> &[String] {
            &self.pointer_fields
        }
        fn data_fields(&self) -> &[String] {
            &self.data_fields
        }
        fn field_type(&self, _field: &str) -> SymbolType {
            SymbolType::Data
        }
        fn max_footprint_depth(&self, _field: &str) -> usize {
            2
        }
        fn outflow_contains(&self, _memory: &Axiom, _field: &str, _value: Expr) -> Formula {
            Formula::empty()
        }
        fn logically_contains(&self, _memory: &Axiom, _value: Expr) -> Formula {
            Formula::empty()
        }
        fn shared_node_invariant(&self, _memory: &Axiom) -> Vec<Formula> {
            Vec::new()
        }
        fn local_node_invariant(&self, _memory: &Axiom) -> Vec<Formula> {
            Vec::new()
        }
        fn shared_variable_invariant(&self, _variable: SymbolId, _value: Expr) -> Vec<Formula> {
            Vec::new()
        }
    }

    fn list_config() -> ListConfig {
        ListConfig {
            pointer_fields: vec!["next".to_string()],
            data_fields: vec!["data".to_string()],
        }
    }

    #[test]
    fn single_node_footprint_has_no_incoming_edge_to_root() {
        let mut f = SymbolFactory::new();
        let addr = f.fresh(SymbolType::Pointer);
        let flow = f.fresh(SymbolType::Flow);
        let data = f.fresh(SymbolType::Data);
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("data".to_string(), Expr::variable(data));
        fields.insert("next".to_string(), Expr::Null);
        let state = Annotation::new(Formula::and(vec![Formula::atom(Axiom::memory(
            addr,
            flow,
            fields,
            Locality::Shared,
        ))]));
        let write = HeapWrite::new(addr, vec![("next".to_string(), Expr::Null)]);
        let config = list_config();
        let graph = make_flow_footprint(&state, &write, &config, &mut f).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(!graph.has_incoming_edge_to(addr));
    }

    #[test]
    fn self_loop_write_is_rejected_as_a_cycle() {
        let mut f = SymbolFactory::new();
        let addr = f.fresh(SymbolType::Pointer);
        let flow = f.fresh(SymbolType::Flow);
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("next".to_string(), Expr::Null);
        let state = Annotation::new(Formula::and(vec![Formula::atom(Axiom::memory(
            addr,
            flow,
            fields,
            Locality::Shared,
        ))]));
        let write = HeapWrite::new(addr, vec![("next".to_string(), Expr::variable(addr))]);
        let config = list_config();
        let result = make_flow_footprint(&state, &write, &config, &mut f);
        assert!(matches!(result, Err(FlowError::CycleInFootprint { .. })));
    }

    /// A write that links the root to an already-malloc'd successor must
    /// pull that successor into the footprint as a second node, and only
    /// the root gets its post-inflow pinned to its pre-inflow: a non-root
    /// node's inflow has to stay free for `encode::encode_simple_flow_rules`
    /// to derive from the edge, not be forced equal by construction.
    #[test]
    fn linking_write_pulls_in_a_second_node_with_free_inflow() {
        let mut f = SymbolFactory::new();
        let root_addr = f.fresh(SymbolType::Pointer);
        let child_addr = f.fresh(SymbolType::Pointer);
        let root_flow = f.fresh(SymbolType::Flow);
        let child_flow = f.fresh(SymbolType::Flow);
        let root_data = f.fresh(SymbolType::Data);
        let child_data = f.fresh(SymbolType::Data);

        let mut root_fields = std::collections::BTreeMap::new();
        root_fields.insert("data".to_string(), Expr::variable(root_data));
        root_fields.insert("next".to_string(), Expr::Null);
        let mut child_fields = std::collections::BTreeMap::new();
        child_fields.insert("data".to_string(), Expr::variable(child_data));
        child_fields.insert("next".to_string(), Expr::Null);

        let state = Annotation::new(Formula::and(vec![
            Formula::atom(Axiom::memory(root_addr, root_flow, root_fields, Locality::Shared)),
            Formula::atom(Axiom::memory(child_addr, child_flow, child_fields, Locality::Shared)),
        ]));
        let write = HeapWrite::new(root_addr, vec![("next".to_string(), Expr::variable(child_addr))]);
        let config = list_config();
        let graph = make_flow_footprint(&state, &write, &config, &mut f).unwrap();

        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.has_incoming_edge_to(child_addr));
        assert!(!graph.has_incoming_edge_to(root_addr));

        let root = graph.node(root_addr).unwrap();
        assert_eq!(root.post_all_inflow, root.pre_all_inflow, "root's post-inflow must equal its pre-inflow");

        let child = graph.node(child_addr).unwrap();
        assert_ne!(
            child.post_all_inflow, child.pre_all_inflow,
            "a non-root node's post-inflow must be a free symbol, not forced equal to its pre-inflow"
        );
        assert_ne!(child.pre_all_inflow, child.pre_root_inflow, "pre-root-inflow is a distinct symbol from the axiom's own flow");
    }
}
