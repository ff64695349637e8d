//! `--config` file format: the numeric knobs of [`keyset_solver::Limits`],
//! plus the CLI-only choice of macro strategy, deserialized from TOML with
//! [`serde`]. Every field defaults to match [`Limits::default`] /
//! [`MacroStrategy::Eager`] so an absent `--config` is equivalent to an
//! empty one.

use keyset_proof::MacroStrategy;
use keyset_solver::Limits;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    pub max_inflow_predecessors: usize,
    pub max_join: usize,
    pub loop_abort_after: u32,
    pub postprocess_flow_graphs: bool,
    pub macro_strategy: MacroStrategyConfig,
}

/// A `serde`-friendly mirror of [`MacroStrategy`]; `keyset_proof` doesn't
/// derive `Deserialize` itself since the engine core has no configuration
/// dependency (spec's ambient-stack split between the core and the CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacroStrategyConfig {
    Eager,
    Lazy,
}

impl Default for MacroStrategyConfig {
    fn default() -> Self {
        MacroStrategyConfig::Eager
    }
}

impl From<MacroStrategyConfig> for MacroStrategy {
    fn from(value: MacroStrategyConfig) -> Self {
        match value {
            MacroStrategyConfig::Eager => MacroStrategy::Eager,
            MacroStrategyConfig::Lazy => MacroStrategy::Lazy,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_inflow_predecessors: limits.max_inflow_predecessors,
            max_join: limits.max_join,
            loop_abort_after: limits.loop_abort_after,
            postprocess_flow_graphs: limits.postprocess_flow_graphs,
            macro_strategy: MacroStrategyConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_inflow_predecessors: self.max_inflow_predecessors,
            max_join: self.max_join,
            loop_abort_after: self.loop_abort_after,
            postprocess_flow_graphs: self.postprocess_flow_graphs,
        }
    }

    pub fn strategy(&self) -> MacroStrategy {
        self.macro_strategy.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_solver_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.limits(), Limits::default());
        assert_eq!(config.strategy(), MacroStrategy::Eager);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: RunConfig = toml::from_str("max-join = 3\n").unwrap();
        assert_eq!(config.max_join, 3);
        assert_eq!(config.loop_abort_after, Limits::default().loop_abort_after);
    }

    #[test]
    fn parses_macro_strategy() {
        let config: RunConfig = toml::from_str("macro-strategy = \"lazy\"\n").unwrap();
        assert_eq!(config.strategy(), MacroStrategy::Lazy);
    }
}
