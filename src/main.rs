//! chair - Entry point
//!
//! Parses CLI arguments, resolves settings, runs one subcommand on the remote
//! host, and closes the connection.

use clap::Parser;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use chair::config::{Args, Command, Settings};
use chair::deployer::Deployer;
use chair::error::{ChairError, Result};

fn main() -> Result<()> {
    // Logging goes to stderr; stdout carries the relayed remote output
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Declared before the runtime so echo comes back after it is gone
    #[cfg(unix)]
    let _tty = chair::console::TtyGuard::capture();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(&args));
    finish(runtime, &result);

    if let Err(ref e) = result {
        error!("{}", e);
    }
    result
}

async fn run(args: &Args) -> Result<()> {
    let settings = Settings::resolve(args)?;

    info!("chair v{} starting...", env!("CARGO_PKG_VERSION"));

    let deployer = Deployer::from_settings(settings)?;
    let session = deployer.session();

    let result = tokio::select! {
        result = dispatch(&deployer, &args.command) => result,
        _ = tokio::signal::ctrl_c() => {
            // The prompt line was left without a newline
            eprintln!();
            warn!("Received SIGINT (Ctrl+C), aborting...");
            Err(ChairError::Interrupted)
        }
    };

    if session.is_connected().await {
        if let Err(e) = session.close().await {
            error!("Failed to close session: {}", e);
        }
    }

    result
}

/// Shut the runtime down.
///
/// After an interrupt a secret read may still be blocked on the terminal in a
/// blocking task; the runtime must not wait for it.
fn finish(runtime: Runtime, result: &Result<()>) {
    if matches!(result, Err(ChairError::Interrupted)) {
        runtime.shutdown_background();
    } else {
        drop(runtime);
    }
}

async fn dispatch(deployer: &Deployer, command: &Command) -> Result<()> {
    let session = deployer.session();
    let files = deployer.files();

    match command {
        Command::Run { command } => session.run(command).await,
        Command::Sudo { command } => session.sudo(command).await,
        Command::Copy {
            from,
            to,
            flags,
            sudo,
        } => files.copy(from, to, flags.as_deref(), *sudo).await,
        Command::Link {
            target,
            destination,
            sudo,
        } => files.link(target, destination, *sudo).await,
    }
}
