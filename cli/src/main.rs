//! tunup binary
//!
//! Builds the network-stack executable, grants it the network-admin
//! capability, launches it, configures the tun interface it creates, and
//! supervises it until it exits or a termination signal arrives. The
//! process exit code mirrors the stack's own exit (128 + signal for signal
//! deaths); fatal setup failures map to distinct per-stage codes, with
//! build failures propagating the build's status verbatim.

use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tunup_core::config::{load_config_from_toml_path, SupervisorConfig};
use tunup_core::supervisor::{Supervisor, UnixProcessAdapter};
use tunup_core::{StackExit, SystemCommandRunner};

#[derive(Parser)]
#[command(name = "tunup")]
#[command(about = "Build, privilege, launch, and supervise a user-space network stack")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory containing the stack's Cargo manifest
    #[arg(long, value_name = "DIR")]
    manifest_dir: Option<PathBuf>,

    /// Name of the release binary to build and launch
    #[arg(long)]
    binary: Option<String>,

    /// Tun interface name the stack is expected to create
    #[arg(long)]
    interface: Option<String>,

    /// IPv4 address to assign to the interface
    #[arg(long)]
    address: Option<Ipv4Addr>,

    /// Prefix length for the assigned address
    #[arg(long)]
    prefix_len: Option<u8>,

    /// Log filter (e.g. info, tunup_core=debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> tunup_core::Result<SupervisorConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from_toml_path(path)?,
            None => SupervisorConfig::default(),
        };

        if let Some(dir) = self.manifest_dir {
            config.stack.manifest_dir = dir;
        }
        if let Some(binary) = self.binary {
            config.stack.binary = binary;
        }
        if let Some(name) = self.interface {
            config.interface.name = name;
        }
        if let Some(address) = self.address {
            config.interface.address = address;
        }
        if let Some(prefix_len) = self.prefix_len {
            config.interface.prefix_len = prefix_len;
        }

        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> tunup_core::Result<StackExit> {
    let config = cli.into_config()?;
    info!(
        "Supervising stack '{}' on interface '{}' ({})",
        config.stack.binary,
        config.interface.name,
        config.interface.cidr()
    );

    let (event_tx, _event_rx) = tokio::sync::broadcast::channel(256);
    let supervisor = Supervisor::new(
        config,
        Arc::new(SystemCommandRunner::new()),
        Arc::new(UnixProcessAdapter::new()),
        event_tx,
    );
    supervisor.run().await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = tunup_core::utils::init_tracing(&cli.log_level) {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    let code = match run(cli).await {
        Ok(exit) => {
            info!(
                "Stack exited (code: {:?}, signal: {:?})",
                exit.exit_code, exit.signal
            );
            exit.status_code()
        }
        Err(e) => {
            error!("{} [{}]", e, e.code());
            e.exit_code()
        }
    };

    std::process::exit(code);
}
