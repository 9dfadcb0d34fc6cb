//! iqprog - Programmer for IQRF TR transceiver modules
//!
//! Talks to a TR module over its SPI link: identifies it, uploads firmware
//! (Intel HEX), plugins (`.iqrf`) and configuration (`.trcnfg`), stores the
//! access password and user key, and exchanges data in communication mode.
//!
//! # Architecture
//!
//! All protocol work happens in `iqrf-core`, which is polled: the binary
//! opens a port (a `BusPort` implementation chosen on the command line),
//! wraps it in a `Driver` and calls the core state machines between
//! transport ticks.

mod cli;
mod commands;
mod ports;

use clap::Parser;
use cli::{Cli, Commands};
use iqrf_core::pgm::SecretKind;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still takes precedence over -v
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Info { port } => commands::run_info(&port),
        Commands::Check { file } => commands::run_check(&file),
        Commands::Write {
            port,
            file,
            no_check,
        } => commands::run_write(&port, &file, no_check),
        Commands::Password { port, value } => {
            commands::run_secret(&port, SecretKind::Password, &value)
        }
        Commands::Key { port, value } => commands::run_secret(&port, SecretKind::UserKey, &value),
        Commands::Send {
            port,
            data,
            listen_ms,
        } => commands::run_send(&port, &data, listen_ms),
        Commands::ListPorts => {
            commands::list_ports();
            Ok(())
        }
    }
}
