// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kbattachd")]
#[command(author, version, about = "Enablement daemon for detachable tablet keyboards")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: /etc/kbattachd.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon (default when no command is given)
    Run,

    /// One-shot: write the keyboard enable state and exit
    Set {
        /// 1 to enable, 0 to disable
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        state: u8,
    },
}
