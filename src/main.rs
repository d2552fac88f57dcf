//! kbattachd - keyboard attach daemon
//!
//! Keeps a detachable tablet keyboard's enable state consistent with
//! attach/detach, sleep/wake, lock/unlock, and hinge-angle signals.

use clap::Parser;

mod cli;
use cli::{Cli, Commands};

use kbattachd::channel::{ControlChannel, ControlEndpoint};
use kbattachd::{config, daemon};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kbattachd=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Run) => daemon::run(config)?,
        Some(Commands::Set { state }) => {
            let enable = state == 1;
            let mut channel = ControlChannel::open(&config.device_path)?;
            channel.write_enable(enable)?;
            println!("keyboard {}", if enable { "enabled" } else { "disabled" });
        }
    }

    Ok(())
}
