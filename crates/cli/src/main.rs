mod db_commands;
mod heartbeat;
mod history_commands;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    cronkeeper_config::{CronkeeperConfig, MetricsConfig},
    cronkeeper_cron::{CronJob, Manager, RecordStore},
    cronkeeper_metrics::{MetricsRecorderConfig, init_metrics},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::heartbeat::HeartbeatJob;

#[derive(Parser)]
#[command(name = "cronkeeper", about = "cronkeeper: persistent recurring jobs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the default locations.
    #[arg(long, global = true, env = "CRONKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL (overrides config value).
    #[arg(long, global = true, env = "CRONKEEPER_DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted (default when no subcommand is provided).
    Run,
    /// List scheduled jobs.
    Jobs,
    /// Show recent runs of a job.
    Runs {
        job_type: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Apply pending database migrations.
    Migrate,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CronkeeperConfig> {
    let mut config = match &cli.config {
        Some(path) => cronkeeper_config::load_config(path)?,
        None => cronkeeper_config::discover_and_load(),
    };
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    Ok(config)
}

fn recorder_config(metrics: &MetricsConfig) -> anyhow::Result<MetricsRecorderConfig> {
    let listen = metrics
        .listen
        .as_deref()
        .map(str::parse::<SocketAddr>)
        .transpose()
        .context("invalid metrics.listen address")?;
    Ok(MetricsRecorderConfig {
        enabled: metrics.enabled,
        listen,
        global_labels: Vec::new(),
    })
}

fn builtin_jobs(config: &CronkeeperConfig) -> Vec<Arc<dyn CronJob>> {
    let mut jobs: Vec<Arc<dyn CronJob>> = Vec::new();
    if let Some(job) = HeartbeatJob::from_config(&config.scheduler.heartbeat) {
        jobs.push(Arc::new(job));
    }
    jobs
}

async fn run_scheduler(config: CronkeeperConfig) -> anyhow::Result<()> {
    let _metrics = init_metrics(recorder_config(&config.metrics)?)?;

    let store: Arc<dyn RecordStore> = Arc::new(db_commands::open_store(&config.database).await?);
    let mut manager = Manager::new(store);
    manager.register(builtin_jobs(&config));
    if manager.job_types().is_empty() {
        warn!("no jobs enabled, nothing to schedule");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    cancel.cancel();
                },
                Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
            }
        }
    });

    manager.run(cancel).await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "cronkeeper starting");

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => run_scheduler(config).await,
        Some(Commands::Jobs) => {
            let store = db_commands::open_store(&config.database).await?;
            history_commands::list_jobs(&store).await
        },
        Some(Commands::Runs { job_type, limit }) => {
            let store = db_commands::open_store(&config.database).await?;
            history_commands::show_runs(&store, &job_type, limit).await
        },
        Some(Commands::Migrate) => db_commands::migrate(&config.database).await,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cronkeeper.toml");
        std::fs::write(&path, "[database]\nurl = \"sqlite://from-file.db\"\n").unwrap();

        let cli = Cli::parse_from([
            "cronkeeper",
            "--config",
            path.to_str().unwrap(),
            "--database-url",
            "sqlite://from-flag.db",
            "jobs",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.database.url, "sqlite://from-flag.db");
        assert!(matches!(cli.command, Some(Commands::Jobs)));
    }

    #[test]
    fn test_runs_limit_default() {
        let cli = Cli::parse_from(["cronkeeper", "runs", "heartbeat"]);
        match cli.command {
            Some(Commands::Runs { job_type, limit }) => {
                assert_eq!(job_type, "heartbeat");
                assert_eq!(limit, 20);
            },
            _ => panic!("expected runs command"),
        }
    }

    #[test]
    fn test_recorder_config_rejects_bad_address() {
        let metrics = MetricsConfig {
            enabled: true,
            listen: Some("not an address".into()),
        };
        assert!(recorder_config(&metrics).is_err());

        let metrics = MetricsConfig {
            enabled: true,
            listen: Some("127.0.0.1:9464".into()),
        };
        let config = recorder_config(&metrics).unwrap();
        assert_eq!(config.listen, Some("127.0.0.1:9464".parse().unwrap()));
    }

    #[test]
    fn test_builtin_jobs_follow_config() {
        let mut config = CronkeeperConfig::default();
        assert_eq!(builtin_jobs(&config).len(), 1);
        config.scheduler.heartbeat.enabled = false;
        assert!(builtin_jobs(&config).is_empty());
    }
}
