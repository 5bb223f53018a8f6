#![forbid(unsafe_code)]

//! `acp-host`: run a prompt against a configured ACP agent.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use acp_host::models::protocol::{ContentBlock, SessionUpdate};
use acp_host::session::{SessionCoordinator, SessionEvent};
use acp_host::shell_env::ShellEnvLoader;
use acp_host::{AppError, GlobalConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "acp-host", about = "Agent Client Protocol host", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a session, send one prompt, and stream the reply.
    Prompt {
        /// Agent to use; the configured default when omitted.
        #[arg(long)]
        agent: Option<String>,
        /// Session working directory; the current directory when omitted.
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Prompt text.
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Print the login-shell environment agents are spawned with.
    ShellEnv,
    /// List configured agents.
    Agents,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = Arc::new(GlobalConfig::load_from_path(&args.config)?);
    info!(agents = config.agents.len(), "configuration loaded");

    match args.command {
        Command::Prompt { agent, cwd, text } => {
            let cwd = match cwd {
                Some(cwd) => cwd,
                None => std::env::current_dir()?,
            };
            prompt(config, agent.as_deref(), &cwd, &text.join(" ")).await
        }
        Command::ShellEnv => {
            let loader = ShellEnvLoader::new(config.capture_settings());
            let mut env: Vec<_> = loader.load_async().await.into_iter().collect();
            env.sort();
            let mut out = std::io::stdout().lock();
            for (key, value) in env {
                writeln!(out, "{key}={value}")?;
            }
            Ok(())
        }
        Command::Agents => {
            let default = config.agent(None)?.name.clone();
            let mut out = std::io::stdout().lock();
            for agent in &config.agents {
                let marker = if agent.name == default { "*" } else { " " };
                writeln!(
                    out,
                    "{marker} {}\t{}",
                    agent.name,
                    agent.transport.kind()
                )?;
            }
            Ok(())
        }
    }
}

async fn prompt(
    config: Arc<GlobalConfig>,
    agent: Option<&str>,
    cwd: &std::path::Path,
    text: &str,
) -> Result<()> {
    let coordinator = SessionCoordinator::new(config);
    // Warm the cache so the spawned agent sees the login-shell environment.
    coordinator.shell_env().load_async().await;

    let (session, events) = coordinator.start_session(agent, cwd).await?;
    let printer = tokio::spawn(print_events(events));

    let result = {
        let turn = session.prompt_text(text);
        tokio::pin!(turn);
        tokio::select! {
            result = &mut turn => result,
            () = shutdown_signal() => {
                info!("interrupt received, cancelling turn");
                if let Err(err) = session.cancel().await {
                    warn!(%err, "failed to send cancel");
                }
                turn.await
            }
        }
    };

    session.close("prompt finished");
    if let Err(err) = printer.await {
        warn!(%err, "event printer failed");
    }

    let stop_reason = result?;
    let mut out = std::io::stdout().lock();
    writeln!(out)?;
    writeln!(out, "[stop reason: {}]", stop_reason.as_str())?;
    Ok(())
}

async fn print_events(mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Update(notification) => match notification.update {
                SessionUpdate::AgentMessageChunk {
                    content: ContentBlock::Text { text },
                } => {
                    let mut out = std::io::stdout().lock();
                    let _ = write!(out, "{text}");
                    let _ = out.flush();
                }
                SessionUpdate::ToolCall { title, status, .. } => {
                    info!(%title, ?status, "tool call");
                }
                SessionUpdate::CurrentModeUpdate { current_mode_id } => {
                    info!(%current_mode_id, "mode changed");
                }
                _ => {}
            },
            SessionEvent::Closed { exit_code, reason } => {
                info!(?exit_code, %reason, "agent closed");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries agent output; logs go to stderr.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
