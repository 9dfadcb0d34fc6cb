//! CLI argument parsing

use crate::ports;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Generate dynamic help text for the port argument
fn port_help() -> String {
    format!(
        "Port the TR module is attached to [available: {}]",
        ports::port_names_short()
    )
}

#[derive(Parser)]
#[command(name = "iqprog")]
#[command(author, version, about = "IQRF TR module programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Kind of programming file
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    /// Intel HEX firmware
    Hex,
    /// Plugin (.iqrf)
    Plugin,
    /// TR configuration (.trcnfg)
    Config,
}

/// Options shared by the file commands
#[derive(clap::Args, Debug, Clone)]
pub struct FileArgs {
    /// Programming file (.hex, .iqrf or .trcnfg)
    #[arg(short, long)]
    pub input: PathBuf,

    /// File kind, inferred from the extension if omitted
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the attached TR module
    Info {
        #[arg(short, long, help = port_help())]
        port: String,
    },

    /// Validate a programming file without touching any module
    Check {
        #[command(flatten)]
        file: FileArgs,
    },

    /// Upload a programming file to the TR module
    Write {
        #[arg(short, long, help = port_help())]
        port: String,

        #[command(flatten)]
        file: FileArgs,

        /// Skip the validation pass before writing
        #[arg(long)]
        no_check: bool,
    },

    /// Set the access password (16 bytes, as text or 0x-prefixed hex)
    Password {
        #[arg(short, long, help = port_help())]
        port: String,

        /// Password value
        value: String,
    },

    /// Set the user key (16 bytes, as text or 0x-prefixed hex)
    Key {
        #[arg(short, long, help = port_help())]
        port: String,

        /// Key value
        value: String,
    },

    /// Send data to the module in communication mode and print replies
    Send {
        #[arg(short, long, help = port_help())]
        port: String,

        /// Data bytes as hex (e.g. "01 02 0A" or "01020A")
        data: String,

        /// How long to listen for replies, in milliseconds
        #[arg(long, default_value = "1000")]
        listen_ms: u32,
    },

    /// List ports available in this build
    ListPorts,
}
