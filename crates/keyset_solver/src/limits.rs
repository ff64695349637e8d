/// The tuning knobs spec §9 calls out as configurable constants, with the
/// defaults the original left undocumented (`LOOP_ABORT_AFTER = 7`) or
/// implicit in prose (`MAX_INFLOW_PREDECESSORS = 1`, `MAX_JOIN = 5`).
/// `apps/keyset_cli` deserializes this from an optional `--config` file;
/// every other caller (tests, library embedders) can use [`Limits::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// spec §4.F item 5.
    pub max_inflow_predecessors: usize,
    /// spec §4.I.
    pub max_join: usize,
    /// spec §4.L, the `UnconditionalLoop` visit rule.
    pub loop_abort_after: u32,
    /// spec §9 Open Questions: whether `keyset_flow` re-simplifies and
    /// re-checks acyclicity once more after the footprint BFS converges.
    pub postprocess_flow_graphs: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_inflow_predecessors: 1,
            max_join: 5,
            loop_abort_after: 7,
            postprocess_flow_graphs: true,
        }
    }
}
