mod config;
mod intake;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use scout_engine::{
    ensure_device_id, ApiClient, ChromeTabOpener, CoordinatorDeps, CoordinatorHandle,
    DryRunTabOpener, DurableState, FileStore, TabOpener,
};
use scout_logging::{scout_info, LogDestination, DEFAULT_LOG_FILE};
use tokio::io::BufReader;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Category scraping coordinator. Reads JSON messages from stdin, one per
/// line, and writes replies to stdout.
#[derive(Parser, Debug)]
#[command(name = "scout_app", version)]
struct Cli {
    /// RON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the durable state document
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Log destination: file, terminal or both
    #[arg(long, default_value = "file")]
    log: LogDestination,

    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Log tabs instead of driving a browser
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    scout_logging::initialize(cli.log, cli.log_level, &cli.log_file);

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(state_dir) = cli.state_dir {
        config.state_dir = state_dir;
    }
    config.browser.dry_run |= cli.dry_run;

    let store = FileStore::open(&config.state_dir)
        .with_context(|| format!("Failed to open state in {}", config.state_dir.display()))?;
    scout_info!("Using state file {:?}", store.path());
    let state = DurableState::new(Arc::new(store));
    let device_id = ensure_device_id(&state).context("Failed to initialize device id")?;
    scout_info!("Device id {}", device_id);

    let api = ApiClient::new(config.api_settings()).context("Invalid API settings")?;
    let opener: Arc<dyn TabOpener> = if config.browser.dry_run {
        scout_info!("Dry run: tabs are logged, not opened");
        Arc::new(DryRunTabOpener)
    } else {
        let settings = config.browser_settings();
        let chrome = tokio::task::spawn_blocking(move || ChromeTabOpener::launch(&settings))
            .await
            .context("Browser launch task failed")?
            .context("Failed to launch browser")?;
        Arc::new(chrome)
    };

    let (handle, _coordinator) = CoordinatorHandle::spawn(CoordinatorDeps {
        state,
        api: Arc::new(api),
        opener,
        queue: config.queue_settings(),
        unlock_policy: config.unlock_policy(),
    });
    scout_info!("Coordinator running against {}", config.api_base_url);

    intake::run(
        &handle,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        SHUTDOWN_GRACE,
    )
    .await?;

    scout_info!("Shutting down");
    Ok(())
}
