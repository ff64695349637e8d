//! Flow graph and footprint construction (spec §4.E).
//!
//! Given a pre-state and a multi-field heap write, [`footprint::make_flow_footprint`]
//! reconstructs the local region of the heap whose flow and keyset are
//! affected by the write, growing the region outward until it covers every
//! node needed to decide the post-image checks in `keyset_solver`.

pub mod config;
pub mod encode;
pub mod error;
pub mod footprint;
pub mod graph;
pub mod node;

pub use config::FlowConfig;
pub use error::{FlowError, FlowResult};
pub use footprint::{make_flow_footprint, make_pure_heap_graph, HeapWrite};
pub use graph::FlowGraph;
pub use node::{Node, PointerField};
