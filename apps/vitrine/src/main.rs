use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use vitrine_sync::{
    is_online, CommandKind, KioskService, ProviderConfig, ServiceConfig, SyncOutcome,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "warn") };
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let service = KioskService::new(ServiceConfig {
        heartbeat_interval: Duration::from_secs(cli.heartbeat_interval),
        auto_sync_interval: Duration::from_secs(cli.sync_interval),
        profile_path: cli.profile.clone(),
    })?;
    debug!(session_id = %service.session_id(), "service constructed");

    match cli.command {
        Command::Connect { provider, switch } => {
            let config = ProviderConfig::from(provider);
            if switch {
                service.connection().switch(config)?;
            } else {
                service.connection().connect(config)?;
            }
            let outcome = service.connection().test_connection().await;
            if outcome.success {
                println!("connected ({})", describe_provider(&service));
            } else {
                bail!(
                    "connection test failed: {}",
                    outcome.message.unwrap_or_else(|| "unknown error".into())
                );
            }
        }
        Command::Reconnect => {
            let outcome = service.connection().reconnect().await;
            if outcome.success {
                println!("reconnected ({})", describe_provider(&service));
            } else {
                bail!(
                    "reconnect failed: {}",
                    outcome.message.unwrap_or_else(|| "unknown error".into())
                );
            }
        }
        Command::Disconnect => {
            service.connection().disconnect();
            println!("disconnected; last known good provider kept for reconnect");
        }
        Command::Status => {
            let connection = service.connection();
            println!("session id:  {}", service.session_id());
            match connection.active_config() {
                Some(config) => println!("provider:    {} (connected)", config.label()),
                None => match connection.last_known_good() {
                    Some(config) => {
                        println!("provider:    none (last known good: {})", config.label())
                    }
                    None => println!("provider:    none"),
                },
            }
            println!("auto-sync:   {}", if connection.auto_sync() { "on" } else { "off" });
            let sync = service.sync().status();
            println!("sync status: {:?}", sync.status);
            if let Some(err) = sync.last_error {
                println!("last error:  {err}");
            }
        }
        Command::Push => {
            ensure_connected(&service).await?;
            report_sync(service.sync().push().await, &service)?;
        }
        Command::Pull => {
            ensure_connected(&service).await?;
            report_sync(service.sync().pull().await, &service)?;
            let dataset = service.dataset().snapshot();
            println!(
                "catalog entries: {}",
                dataset.catalog.as_array().map(|a| a.len()).unwrap_or(0)
            );
        }
        Command::Sessions => {
            ensure_connected(&service).await?;
            service.registry().tick().await;
            let sessions = service.registry().sessions();
            if sessions.is_empty() {
                println!("no sessions recorded yet");
            }
            for session in sessions {
                let marker = if session.id == service.session_id() {
                    " (this device)"
                } else {
                    ""
                };
                println!(
                    "{}  {}  path={}  user={}  screensaver={}{}",
                    session.id,
                    if is_online(&session) { "online " } else { "offline" },
                    session.current_path,
                    session.logged_in_user.as_deref().unwrap_or("-"),
                    session.screensaver_active,
                    marker,
                );
            }
        }
        Command::Upload { file, hint } => {
            ensure_connected(&service).await?;
            let (adapter, _) = service
                .connection()
                .active_adapter()
                .ok_or_else(|| anyhow!("no active provider"))?;
            let bytes = tokio::fs::read(&file).await?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("{} has no usable file name", file.display()))?;
            let asset = adapter.upload_asset(bytes, name, &hint).await?;
            println!("uploaded as {}", asset.name);
            println!("resolves to {:?}", adapter.resolve_asset_url(&asset));
        }
        Command::Send { target, command } => {
            ensure_connected(&service).await?;
            service
                .commands()
                .send_command(&target, command.into())
                .await?;
            println!("command queued for {target}; it runs on the target's next heartbeat");
        }
        Command::AutoSync { enabled } => {
            service.connection().set_auto_sync(parse_toggle(&enabled)?);
            println!(
                "auto-sync {}",
                if service.connection().auto_sync() { "enabled" } else { "disabled" }
            );
        }
        Command::Run => {
            ensure_connected(&service).await?;
            service.start();
            println!(
                "kiosk service running as {} (ctrl-c to stop)",
                service.session_id()
            );
            tokio::signal::ctrl_c().await?;
            service.shutdown();
        }
    }
    Ok(())
}

fn describe_provider(service: &KioskService) -> &'static str {
    service
        .connection()
        .active_config()
        .map(|c| c.label())
        .unwrap_or("none")
}

async fn ensure_connected(service: &KioskService) -> Result<()> {
    if service.connection().is_connected() {
        return Ok(());
    }
    let outcome = service.connection().reconnect().await;
    if outcome.success {
        return Ok(());
    }
    Err(anyhow!(
        "not connected: {}. Run `vitrine connect` first.",
        outcome
            .message
            .unwrap_or_else(|| "no provider configured".into())
    ))
}

fn report_sync(outcome: SyncOutcome, service: &KioskService) -> Result<()> {
    match outcome {
        SyncOutcome::Completed => {
            let snapshot = service.sync().status();
            match snapshot.last_error {
                Some(err) => bail!("sync failed: {err}"),
                None => println!("sync ok ({:?})", snapshot.status),
            }
        }
        SyncOutcome::Coalesced => println!("sync already in flight; queued a follow-up run"),
        SyncOutcome::Disconnected => bail!("no active provider"),
    }
    Ok(())
}

fn parse_toggle(raw: &str) -> Result<bool> {
    match raw {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("expected on/off, got {other}"),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "vitrine",
    about = "Kiosk dataset synchronization and multi-device coordination",
    version
)]
struct Cli {
    /// Device profile path (defaults to ~/.vitrine/device.toml)
    #[arg(long, global = true, env = "VITRINE_PROFILE")]
    profile: Option<PathBuf>,

    /// Heartbeat interval in seconds
    #[arg(long, global = true, env = "VITRINE_HEARTBEAT_INTERVAL", default_value_t = 2)]
    heartbeat_interval: u64,

    /// Auto-sync pull interval in seconds
    #[arg(long, global = true, env = "VITRINE_SYNC_INTERVAL", default_value_t = 30)]
    sync_interval: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select a provider and test the connection
    Connect {
        #[command(subcommand)]
        provider: ProviderArgs,
        /// Forget the previous last-known-good provider first
        #[arg(long)]
        switch: bool,
    },
    /// Re-test the last known good provider
    Reconnect,
    /// Drop the active provider (keeps the last known good record)
    Disconnect,
    /// Show connection and sync state
    Status,
    /// Push the local dataset to the provider (overwrites remote)
    Push,
    /// Pull the remote dataset and replace local state
    Pull,
    /// List kiosk sessions with liveness classification
    Sessions,
    /// Upload a binary asset to the active provider
    Upload {
        file: PathBuf,
        /// Advisory placement segment(s), e.g. --hint catalog
        #[arg(long)]
        hint: Vec<String>,
    },
    /// Queue a remote command for another kiosk instance
    Send {
        /// Target session id
        target: String,
        #[command(subcommand)]
        command: CommandArgs,
    },
    /// Toggle automatic sync (on/off)
    AutoSync { enabled: String },
    /// Run heartbeat and auto-sync tickers until interrupted
    Run,
}

#[derive(Subcommand, Debug, Clone)]
enum ProviderArgs {
    /// Dataset in a local directory
    Local { root: PathBuf },
    /// Plain shared HTTP endpoint
    SharedUrl { endpoint: String },
    /// HTTP endpoint with an x-api-key header
    CustomApi {
        endpoint: String,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// HTTP bridge in front of an FTP volume
    FtpBridge {
        endpoint: String,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Hosted backend-as-a-service
    Hosted {
        endpoint: String,
        #[arg(long)]
        api_key: String,
        #[arg(long, default_value = "kiosk_dataset")]
        table: String,
        #[arg(long, default_value = "kiosk-assets")]
        bucket: String,
    },
}

impl From<ProviderArgs> for ProviderConfig {
    fn from(args: ProviderArgs) -> Self {
        match args {
            ProviderArgs::Local { root } => ProviderConfig::Local { root },
            ProviderArgs::SharedUrl { endpoint } => ProviderConfig::SharedUrl { endpoint },
            ProviderArgs::CustomApi { endpoint, api_key } => ProviderConfig::CustomApi {
                endpoint,
                auth_key: api_key,
            },
            ProviderArgs::FtpBridge { endpoint, api_key } => ProviderConfig::FtpBridge {
                endpoint,
                auth_key: api_key,
            },
            ProviderArgs::Hosted {
                endpoint,
                api_key,
                table,
                bucket,
            } => ProviderConfig::Hosted {
                endpoint,
                auth_key: api_key,
                dataset_table: table,
                asset_bucket: bucket,
            },
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
enum CommandArgs {
    /// Point the target kiosk at a path
    Navigate { path: String },
    /// Ask the target to reload its current view
    Refresh,
    /// Log the target's operator out
    Logout,
    /// Start the target's screensaver
    StartScreensaver,
    /// Stop the target's screensaver
    StopScreensaver,
}

impl From<CommandArgs> for CommandKind {
    fn from(args: CommandArgs) -> Self {
        match args {
            CommandArgs::Navigate { path } => CommandKind::Navigate { path },
            CommandArgs::Refresh => CommandKind::Refresh,
            CommandArgs::Logout => CommandKind::Logout,
            CommandArgs::StartScreensaver => CommandKind::StartScreensaver,
            CommandArgs::StopScreensaver => CommandKind::StopScreensaver,
        }
    }
}
