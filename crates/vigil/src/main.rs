use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigil_engine::config::{ConfigLoader, VigilConfig};
use vigil_engine::control::{SessionStatus, StartForm, start_session, stop_session};
use vigil_engine::controller::{MonitorController, MonitorState};
use vigil_engine::recovery::RecoveryHandler;
use vigil_engine::session::MonitorMode;
use vigil_engine::store::{FileStore, SessionStore};
use vigil_h::ChromiumHost;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Reload a page until one element changes")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ./vigil.yaml, then ~/.vigil/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Open a page and reload it until the watched element meets the condition
    Watch {
        #[arg(long)]
        url: String,
        /// CSS selector of the watched element
        #[arg(long)]
        selector: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Change)]
        mode: ModeArg,
        /// Text to look for (required unless mode is `change`)
        #[arg(long, default_value = "")]
        text: String,
        /// Seconds between reloads
        #[arg(long)]
        interval: Option<u64>,
        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
    },
    /// Show the stored session
    Status,
    /// Mark the stored session stopped
    Stop,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Change,
    Contains,
    NotContains,
}

impl From<ModeArg> for MonitorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Change => MonitorMode::Change,
            ModeArg::Contains => MonitorMode::Contains,
            ModeArg::NotContains => MonitorMode::NotContains,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries status output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    let store = FileStore::new(config.store.resolved_path());

    match args.command {
        Command::Watch {
            url,
            selector,
            mode,
            text,
            interval,
            visible,
        } => {
            let form = StartForm {
                selector,
                mode: mode.into(),
                search_text: text,
                interval,
            };
            watch(&config, store, &url, form, visible).await
        }
        Command::Status => {
            let record = store.get_all().await?;
            println!("{}", SessionStatus::from_record(&record).label());
            if let Some(selector) = &record.selector {
                println!("selector: {}", selector);
            }
            if let Some(mode) = record.mode {
                println!("mode: {}", mode);
            }
            if let Some(url) = &record.monitoring_url {
                println!("url: {}", url);
            }
            Ok(())
        }
        Command::Stop => {
            stop_session(&store).await?;
            println!("{}", SessionStatus::Inactive.label());
            Ok(())
        }
    }
}

async fn watch(
    config: &VigilConfig,
    store: FileStore,
    url: &str,
    form: StartForm,
    visible: bool,
) -> anyhow::Result<()> {
    let mut host = ChromiumHost::new(visible);
    host.launch().await.context("Failed to launch browser")?;
    host.navigate(url).await?;
    let host = Arc::new(host);

    let session = start_session(
        form,
        host.as_ref(),
        &store,
        config.monitor.default_interval_secs,
    )
    .await?;

    let mut controller =
        MonitorController::new(Arc::new(store), host.clone(), host.clone())
            .with_config(config.monitor.clone())
            .with_recovery(RecoveryHandler::new(host.clone(), &config.recovery));

    controller.start(session).await?;
    let finished = tokio::select! {
        result = controller.run() => Some(result?),
        _ = tokio::signal::ctrl_c() => None,
    };
    let state = match finished {
        Some(state) => state,
        None => {
            info!("Interrupted");
            controller.stop().await?;
            MonitorState::Idle
        }
    };
    drop(controller);

    match state {
        MonitorState::ConditionSatisfied => println!("{}", SessionStatus::ConditionMet.label()),
        MonitorState::Recovering => warn!("Recovery left no page to monitor"),
        _ => println!("{}", SessionStatus::Inactive.label()),
    }

    match Arc::try_unwrap(host) {
        Ok(mut host) => host.close().await?,
        Err(_) => warn!("Recovery still running; leaving browser open"),
    }
    Ok(())
}
