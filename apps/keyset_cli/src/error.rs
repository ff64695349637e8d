//! CLI-level errors and the exit-code mapping spec §6 describes: `0` on a
//! successful proof, `1` when verification itself fails (the program is
//! wrong, or the engine can't discharge its obligations), `2` for anything
//! that never reached the proof engine (a bad path, an unreadable config,
//! an unknown scenario name).

use std::fmt;
use std::path::PathBuf;

use keyset_proof::ProofError;

#[derive(Debug)]
pub enum CliError {
    UnknownScenario { name: String, available: &'static [&'static str] },
    ConfigRead { path: PathBuf, source: std::io::Error },
    ConfigParse { path: PathBuf, source: toml::de::Error },
    ProgramRead { path: PathBuf, source: std::io::Error },
    Verification(ProofError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Verification(_) => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::UnknownScenario { name, available } => {
                write!(f, "unknown scenario `{name}`; available: {}", available.join(", "))
            }
            CliError::ConfigRead { path, source } => {
                write!(f, "could not read config file {}: {source}", path.display())
            }
            CliError::ConfigParse { path, source } => {
                write!(f, "could not parse config file {}: {source}", path.display())
            }
            CliError::ProgramRead { path, source } => {
                write!(f, "could not read program file {}: {source}", path.display())
            }
            CliError::Verification(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ProofError> for CliError {
    fn from(e: ProofError) -> Self {
        CliError::Verification(e)
    }
}
