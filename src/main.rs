//! Token Ledger CLI
//!
//! Replays a CSV command stream and prints the final balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > balances.csv
//! cargo run -- commands.csv journal.csv > balances.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `TOKEN_LEDGER_INITIAL_BALANCE`, `TOKEN_LEDGER_LIKE_FEE`,
//!   `TOKEN_LEDGER_DAILY_REWARD`: override the ledger defaults

use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::process;
use token_ledger::{LedgerConfig, LedgerError, LedgerReplay, Result};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(LedgerError::MissingArgument);
    }

    let config = LedgerConfig::from_env()?;
    log::debug!("Ledger config: {:?}", config);

    let file = File::open(&args[1])?;
    let reader = BufReader::new(file);

    let mut replay = LedgerReplay::new(config);
    replay.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    replay.write_accounts(handle)?;

    if let Some(journal_path) = args.get(2) {
        let journal = BufWriter::new(File::create(journal_path)?);
        replay.write_journal(journal)?;
    }

    Ok(())
}
