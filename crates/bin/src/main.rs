//! Devpilot host binary.
//!
//! Runs the synchronization bus headless: a workspace directory stands in for
//! the editor and display surfaces connect over a Unix socket.

mod ipc;
mod workbench;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use devpilot_host::{Collaborators, Config, CredentialStore, HostService};
use devpilot_proto::{ThemeKind, paths};
use devpilot_workspace::{API_KEY_ENV, ChatCompletions, FileCredentialStore, FsMarkerScanner, JsonFileStore, WorkspaceSource};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::workbench::HeadlessWorkbench;

/// Host command line arguments.
#[derive(Parser, Debug)]
#[command(name = "devpilot-host")]
#[command(about = "Devpilot host serving feature surfaces for a workspace")]
struct Args {
	/// Socket path surfaces connect to
	#[arg(short, long, value_name = "PATH")]
	socket: Option<PathBuf>,

	/// Configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Workspace root (defaults to the current directory)
	#[arg(short, long, value_name = "DIR")]
	root: Option<PathBuf>,

	/// Theme reported to surfaces (1 light, 2 dark, 3 high contrast, 4 high contrast light)
	#[arg(long, value_name = "KIND", default_value_t = 2)]
	theme: u8,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	info!("starting devpilot-host");

	let config_path = args.config.unwrap_or_else(paths::default_config_path);
	let config = Config::load(&config_path)?;
	info!(path = %config_path.display(), "configuration loaded");

	let root = match args.root {
		Some(root) => root,
		None => std::env::current_dir()?,
	};
	let theme = ThemeKind::try_from(args.theme)?;

	let socket_path = args
		.socket
		.or_else(|| config.paths.socket.clone())
		.unwrap_or_else(paths::default_socket_path);
	if let Some(parent) = socket_path.parent()
		&& !parent.exists()
	{
		std::fs::create_dir_all(parent)?;
	}
	let state_dir = config.paths.state_dir.clone().unwrap_or_else(paths::default_state_dir);

	info!(root = %root.display(), state = %state_dir.display(), socket = %socket_path.display(), "host paths");

	let collab = collaborators(&config, root, state_dir, theme)?;
	let host = HostService::start(config, collab);

	let shutdown = CancellationToken::new();
	tokio::spawn({
		let shutdown = shutdown.clone();
		async move {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "failed to listen for ctrl-c");
			}
			shutdown.cancel();
		}
	});

	info!("starting surface socket");
	ipc::serve(&socket_path, host.clone(), shutdown).await?;

	if host.shutdown().await.is_err() {
		tracing::warn!("host service already stopped");
	}
	info!("devpilot-host stopped");
	Ok(())
}

fn collaborators(
	config: &Config,
	root: PathBuf,
	state_dir: PathBuf,
	theme: ThemeKind,
) -> Result<Collaborators, Box<dyn std::error::Error>> {
	let credentials: Arc<dyn CredentialStore> = Arc::new(
		FileCredentialStore::new(state_dir.join("credentials.json")).with_env_override(&config.generation.credential_key, API_KEY_ENV),
	);
	Ok(Collaborators {
		scanner: Arc::new(FsMarkerScanner::new(&root, &config.markers)?),
		editor: Arc::new(WorkspaceSource::new(root)),
		generator: Arc::new(ChatCompletions::new(&config.generation, credentials.clone())?),
		credentials,
		kv: Arc::new(JsonFileStore::new(state_dir.join("state.json"))),
		workbench: Arc::new(HeadlessWorkbench::new(theme)),
	})
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("devpilot=trace,debug")
			} else {
				EnvFilter::new("devpilot=debug,info")
			}
		})
	};

	if let Some(log_dir) = std::env::var("DEVPILOT_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("devpilot-host.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			tracing::info!(path = ?log_path, "host tracing initialized");
			return;
		}
	}

	tracing_subscriber::registry()
		.with(filter())
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
}
