//! krill — standalone binary
//!
//! A thin wrapper around [`keyset_cli::run_cli`], handling error display
//! and exit codes. All command logic lives in the library crate.
//!
//! # Exit Codes
//!
//! - `0` - the proof succeeded
//! - `1` - verification failed (the program does not satisfy its spec)
//! - `2` - the run never reached the proof engine (bad path, bad config,
//!   unknown scenario)

fn main() {
    if let Err(e) = keyset_cli::run_cli() {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
