use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use subipc_channel::{Channel, ChannelState};
use tokio::sync::Notify;

use crate::exit::{channel_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send every received message back to the parent.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args).await,
        Command::Send(args) => send::run(args, format).await,
        Command::Listen(args) => listen::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Stop after echoing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// JSON message.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub json: Option<String>,
    /// Read the JSON message from a file.
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Attach to the channel inherited from the parent process.
pub(crate) fn attach() -> CliResult<Channel> {
    let channel = Channel::from_env().map_err(|err| channel_error("attach failed", err))?;
    if channel.state() == ChannelState::NotRequested {
        return Err(CliError::new(
            USAGE,
            format!(
                "no IPC channel inherited ({} is not set)",
                subipc_transport::CHANNEL_FD_ENV
            ),
        ));
    }
    tracing::debug!(profile = %channel.profile(), "attached to parent channel");
    Ok(channel)
}

/// Notified once when the process receives Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CliResult<Arc<Notify>> {
    let stop = Arc::new(Notify::new());
    let notify = Arc::clone(&stop);
    ctrlc::set_handler(move || notify.notify_one()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })?;
    Ok(stop)
}
