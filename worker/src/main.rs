//! Cube worker
//!
//! The worker owns a run queue, a task store and a container runtime
//! adapter. It pulls events off its queue, drives containers up and down
//! through the runtime, periodically reconciles its stored tasks against
//! what the runtime actually reports, and samples its own host for the
//! manager's scheduler to read back.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::config::StoreKind;
use common::store::{MemoryStore, SqliteStore};
use common::{Store, Task};
use sysinfo::{Disks, System};
use tokio::sync::broadcast;
use tracing::{error, info};

mod api;
mod config;
mod queue;
mod reconciler;
mod runtime;
mod stats;

use config::WorkerConfig;
use queue::RunQueue;
use runtime::docker::DockerRuntime;
use runtime::ContainerRuntime;
use stats::StatsPublisher;

/// Command-line arguments for the worker.
#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(about = "Cube worker: run queue, container reconciler and stats sampler", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the worker's run queue, reconciler loops and HTTP server
    /// (the default when no subcommand is given).
    Serve {
        /// Path to the worker configuration file (worker.toml). Optional:
        /// defaults apply if the file does not exist.
        #[arg(value_name = "CONFIG_FILE", default_value = "worker.toml")]
        config_file: PathBuf,

        /// Override the listen host from config file/environment.
        #[arg(long = "host", value_name = "HOST")]
        host: Option<String>,

        /// Override the listen port from config file/environment.
        #[arg(long = "port", value_name = "PORT")]
        port: Option<u16>,

        /// Override the worker's name from config file.
        #[arg(long = "name", value_name = "NAME")]
        name: Option<String>,
    },
    /// Submit a task declaration to a manager (analogue of `cube run`).
    Run {
        /// The manager's host:port to POST the task to.
        manager: String,
        /// Path to a TOML task declaration.
        file: PathBuf,
    },
}

struct Worker {
    config: WorkerConfig,
    queue: Arc<RunQueue>,
    store: Arc<dyn Store<Task>>,
    runtime: Arc<dyn ContainerRuntime>,
    stats: Arc<StatsPublisher>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Worker {
    fn new(mut config: WorkerConfig) -> Result<Self> {
        let store: Arc<dyn Store<Task>> = match config.store_kind() {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Persistent => {
                std::fs::create_dir_all(&config.data_dir)
                    .with_context(|| format!("creating data dir {}", config.data_dir))?;
                let path = PathBuf::from(&config.data_dir).join(format!("{}_tasks.db", config.name));
                Arc::new(SqliteStore::<Task>::open(&path, "tasks").context("opening task store")?)
            }
        };

        let runtime: Arc<dyn ContainerRuntime> =
            Arc::new(DockerRuntime::connect_from_env().context("connecting to container runtime")?);

        let (shutdown_tx, _) = broadcast::channel(1);

        config.name = config.name.trim().to_string();

        Ok(Self {
            config,
            queue: Arc::new(RunQueue::new()),
            store,
            runtime,
            stats: Arc::new(StatsPublisher::new()),
            shutdown_tx,
        })
    }

    async fn run(&self) -> Result<()> {
        let listen_address = self.config.listen_address()?;
        info!(
            name = %self.config.name,
            listen_address = %listen_address,
            store_kind = %self.config.store_kind,
            "worker starting"
        );

        self.spawn_run_tasks_loop();
        self.spawn_update_tasks_loop();
        self.spawn_collect_stats_loop();

        let app_state = Arc::new(api::AppState {
            queue: Arc::clone(&self.queue),
            store: Arc::clone(&self.store),
            stats: Arc::clone(&self.stats),
        });
        let app = api::create_router(app_state);

        let listener = tokio::net::TcpListener::bind(listen_address)
            .await
            .with_context(|| format!("binding listener on {listen_address}"))?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown_signal = async move {
            let _ = shutdown_rx.recv().await;
            info!("worker http server received shutdown signal");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .context("worker http server error")?;

        Ok(())
    }

    fn spawn_run_tasks_loop(&self) {
        let queue = Arc::clone(&self.queue);
        let store = Arc::clone(&self.store);
        let runtime = Arc::clone(&self.runtime);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval_secs = common::defaults::default_run_tasks_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        reconciler::run_tasks_tick(&queue, store.as_ref(), runtime.as_ref()).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("run tasks loop received shutdown signal");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_update_tasks_loop(&self) {
        let store = Arc::clone(&self.store);
        let runtime = Arc::clone(&self.runtime);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval_secs = common::defaults::default_worker_update_tasks_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        reconciler::update_tasks_tick(store.as_ref(), runtime.as_ref()).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("update tasks loop received shutdown signal");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_collect_stats_loop(&self) {
        let store = Arc::clone(&self.store);
        let publisher = Arc::clone(&self.stats);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval_secs = common::defaults::default_collect_stats_interval();

        tokio::spawn(async move {
            let mut sys = System::new();
            let mut disks = Disks::new();
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        stats::collect_and_publish(&mut sys, &mut disks, store.as_ref(), &publisher);
                    }
                    _ = shutdown_rx.recv() => {
                        info!("collect stats loop received shutdown signal");
                        break;
                    }
                }
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::daily("./logs", "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("worker=info,common=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(non_blocking)
        .init();

    let cli_args = CliArgs::parse();

    match cli_args.command.unwrap_or(Command::Serve {
        config_file: PathBuf::from("worker.toml"),
        host: None,
        port: None,
        name: None,
    }) {
        Command::Run { manager, file } => common::runspec::submit_task_file(&manager, &file).await,
        Command::Serve { config_file, host, port, name } => {
            let mut config = WorkerConfig::load(&config_file)?.apply_env_overrides()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(name) = name {
                config.name = name;
            }
            config.validate()?;

            let worker = match Worker::new(config) {
                Ok(worker) => worker,
                Err(e) => {
                    error!(error = %e, "failed to initialize worker");
                    return Err(e);
                }
            };

            worker.run().await
        }
    }
}
