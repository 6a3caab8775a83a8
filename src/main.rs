use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_roku_remote::history::{FanoutHistory, HistoryStatus, LogHistory, MemoryHistory};
use rust_roku_remote::voice::{StdinPhrases, VoiceIntent, VoiceListener};
use rust_roku_remote::{Remote, RemoteConfig, RemoteKey, SsdpScanner};

#[derive(Parser)]
#[command(
    name = "rust_roku_remote",
    version,
    about = "Control a Roku device over the local network"
)]
struct Cli {
    /// Device address; discovery runs when neither this nor ROKU_HOST is set
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// SSDP listen window in seconds
    #[arg(long)]
    discovery_timeout: Option<u64>,

    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Locate a device on the local network
    Discover,
    /// List installed apps
    Apps,
    /// Show device information
    Info,
    /// List the supported remote keys
    Keys,
    /// Press a remote key; names outside the key list (e.g. Lit_a) are sent as given
    Key { key: String },
    /// Launch an app by id
    Launch { app_id: String },
    /// Interpret a spoken phrase and run it
    Say {
        #[arg(required = true)]
        phrase: Vec<String>,
    },
    /// Read phrases from stdin, one per line, until EOF or Ctrl-C
    Listen,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = RemoteConfig::from_env().context("Failed to load configuration")?;
    if let Some(host) = cli.host.clone() {
        config.host = Some(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(secs) = cli.discovery_timeout {
        config.discovery_timeout = Duration::from_secs(secs);
    }

    if let Command::Keys = cli.command {
        print_keys(cli.json)?;
        return Ok(());
    }

    let history = MemoryHistory::new();
    let sinks = FanoutHistory(vec![Arc::new(LogHistory), Arc::new(history.clone())]);
    let mut remote = Remote::new(config.ecp_options(), Arc::new(sinks))
        .with_scanner(SsdpScanner::new().with_timeout(config.discovery_timeout));

    if let Command::Discover = cli.command {
        remote.discover();
        remote.settle().await;
        let Some(session) = remote.session() else {
            bail!("{}", remote.status());
        };
        if cli.json {
            println!("{}", json!({ "address": session.address() }));
        } else {
            println!("{}", session.address());
        }
        return Ok(());
    }

    match config.host.as_deref() {
        Some(host) => remote.connect(host),
        None => remote.discover(),
    }
    remote.settle().await;
    expect_success(&history, "Connect", &remote)?;

    match cli.command {
        Command::Apps => {
            let catalog = current_session(&remote)?.app_catalog().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&*catalog)?);
            } else {
                for app in catalog.iter() {
                    println!("{:>8}  {}", app.id, app.name);
                }
            }
        }
        Command::Info => {
            let device = current_session(&remote)?.device_info().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&*device)?);
            } else {
                if let Some(model) = device.model_name() {
                    match device.software_version() {
                        Some(version) => println!("{} (software {})", model, version),
                        None => println!("{}", model),
                    }
                }
                for (key, value) in device.iter() {
                    println!("{:<28} {}", key, value);
                }
                if let Some(uptime) = device.uptime_display() {
                    println!("{:<28} {}", "uptime (formatted)", uptime);
                }
            }
        }
        Command::Key { key } => {
            remote.send_key(&wire_key(&key));
            remote.settle().await;
            expect_success(&history, "Send Key", &remote)?;
            report(&remote, cli.json);
        }
        Command::Launch { app_id } => {
            remote.launch_app(&app_id, None).await;
            remote.settle().await;
            expect_success(&history, "Launch App", &remote)?;
            report(&remote, cli.json);
        }
        Command::Say { phrase } => {
            let intent = remote.handle_phrase(&phrase.join(" ")).await;
            remote.settle().await;
            match intent {
                Some(VoiceIntent::SendKey(_)) => expect_success(&history, "Send Key", &remote)?,
                Some(VoiceIntent::LaunchApp { .. }) => {
                    expect_success(&history, "Launch App", &remote)?
                }
                _ => bail!("{}", remote.status()),
            }
            report(&remote, cli.json);
        }
        Command::Listen => {
            listen(&mut remote, config.voice_stop_grace).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&history.entries())?);
            }
        }
        Command::Discover | Command::Keys => {}
    }

    Ok(())
}

async fn listen(remote: &mut Remote, grace: Duration) -> Result<()> {
    let mut listener = VoiceListener::new(grace);
    let Some(mut phrases) = listener.start(StdinPhrases::new()) else {
        bail!("Voice listener is already running");
    };
    remote.voice_control_started();
    info!("Listening for phrases on stdin; press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(completion) = remote.next_completion() => remote.apply(completion),
            phrase = phrases.recv() => match phrase {
                Some(phrase) => {
                    remote.handle_phrase(&phrase).await;
                }
                None => break,
            },
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    listener.stop().await;
    remote.settle().await;
    remote.voice_control_stopped();
    Ok(())
}

fn current_session(remote: &Remote) -> Result<&Arc<rust_roku_remote::DeviceSession>> {
    remote
        .session()
        .with_context(|| remote.status().to_string())
}

/// Fail unless the latest finished `action` in the history succeeded
fn expect_success(history: &MemoryHistory, action: &str, remote: &Remote) -> Result<()> {
    let status = history
        .entries()
        .into_iter()
        .rev()
        .find(|e| e.action == action && e.status != HistoryStatus::Started)
        .map(|e| e.status);

    match status {
        Some(HistoryStatus::Success) => Ok(()),
        _ => bail!("{}", remote.status()),
    }
}

/// Canonical spelling for listed keys; anything else goes on the wire verbatim
fn wire_key(raw: &str) -> String {
    match raw.parse::<RemoteKey>() {
        Ok(key) => key.as_str().to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

fn report(remote: &Remote, json: bool) {
    if json {
        println!("{}", json!({ "status": remote.status() }));
    } else {
        println!("{}", remote.status());
    }
}

fn print_keys(json: bool) -> Result<()> {
    if json {
        let keys: Vec<_> = RemoteKey::ALL
            .iter()
            .map(|k| json!({ "key": k, "label": k.label(), "category": k.category() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&keys)?);
    } else {
        for key in RemoteKey::ALL {
            println!("{:<14} {}", key.as_str(), key.label());
        }
    }
    Ok(())
}
