//! Cube manager
//!
//! The manager owns the pending event queue, the placement index and the
//! scheduler. It pulls events off its queue and dispatches them to workers,
//! periodically reconciles its stored tasks against what each worker
//! reports, and runs health checks that restart unhealthy or failed tasks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::config::StoreKind;
use common::store::{MemoryStore, SqliteStore};
use common::{Store, Task, TaskEvent};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{error, info};

mod api;
mod client;
mod config;
mod dispatch;
mod health;
mod node;
mod placement;
mod queue;
mod reconcile;
mod scheduler;
mod state;

use client::WorkerClient;
use config::ManagerConfig;
use node::Node;
use placement::Placement;
use queue::PendingQueue;
use state::ManagerState;

/// Command-line arguments for the manager.
#[derive(Parser, Debug)]
#[command(name = "manager")]
#[command(about = "Cube manager: scheduler, placement index, dispatch and health-check loops", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the manager's dispatch, reconcile and health-check loops and
    /// HTTP server (the default when no subcommand is given).
    Serve {
        /// Path to the manager configuration file (manager.toml). Optional:
        /// defaults apply if the file does not exist.
        #[arg(value_name = "CONFIG_FILE", default_value = "manager.toml")]
        config_file: PathBuf,

        /// Override the listen host from config file/environment.
        #[arg(long = "host", value_name = "HOST")]
        host: Option<String>,

        /// Override the listen port from config file/environment.
        #[arg(long = "port", value_name = "PORT")]
        port: Option<u16>,
    },
    /// Submit a task declaration to a manager (analogue of `cube run`).
    Run {
        /// The manager's host:port to POST the task to.
        manager: String,
        /// Path to a TOML task declaration.
        file: PathBuf,
    },
}

struct Manager {
    state: Arc<ManagerState>,
    listen_address: std::net::SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl Manager {
    fn new(config: ManagerConfig) -> Result<Self> {
        let task_store: Arc<dyn Store<Task>> = match config.store_kind() {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Persistent => {
                std::fs::create_dir_all(&config.data_dir)
                    .with_context(|| format!("creating data dir {}", config.data_dir))?;
                let path = PathBuf::from(&config.data_dir).join("tasks.db");
                Arc::new(SqliteStore::<Task>::open(&path, "tasks").context("opening task store")?)
            }
        };
        let event_store: Arc<dyn Store<TaskEvent>> = match config.store_kind() {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::Persistent => {
                let path = PathBuf::from(&config.data_dir).join("events.db");
                Arc::new(SqliteStore::<TaskEvent>::open(&path, "events").context("opening event store")?)
            }
        };

        let placement = Arc::new(Placement::rebuild_from_store(task_store.as_ref()));

        let nodes: Vec<Node> = config
            .worker_nodes()
            .into_iter()
            .map(|(name, base_url)| Node::new(name, base_url))
            .collect();

        let client = WorkerClient::new();
        let scheduler = Arc::from(scheduler::build(config.scheduler_kind(), client.clone()));

        let state = Arc::new(ManagerState {
            pending: Arc::new(PendingQueue::new()),
            task_store,
            event_store,
            placement,
            nodes: Arc::new(AsyncMutex::new(nodes)),
            scheduler,
            client,
            requeue_on_placement_error: config.requeue_on_placement_error,
        });

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            state,
            listen_address: config.listen_address()?,
            shutdown_tx,
        })
    }

    async fn run(&self) -> Result<()> {
        info!(listen_address = %self.listen_address, "manager starting");

        self.spawn_dispatch_loop();
        self.spawn_update_tasks_loop();
        self.spawn_health_check_loop();

        let app = api::create_router(Arc::clone(&self.state));

        let listener = tokio::net::TcpListener::bind(self.listen_address)
            .await
            .with_context(|| format!("binding listener on {}", self.listen_address))?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown_signal = async move {
            let _ = shutdown_rx.recv().await;
            info!("manager http server received shutdown signal");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .context("manager http server error")?;

        Ok(())
    }

    fn spawn_dispatch_loop(&self) {
        let state = Arc::clone(&self.state);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval_secs = common::defaults::default_process_tasks_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        dispatch::send_work_tick(&state).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("dispatch loop received shutdown signal");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_update_tasks_loop(&self) {
        let state = Arc::clone(&self.state);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval_secs = common::defaults::default_manager_update_tasks_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        reconcile::update_tasks_tick(&state).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("update tasks loop received shutdown signal");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_health_check_loop(&self) {
        let state = Arc::clone(&self.state);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval_secs = common::defaults::default_health_check_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        health::health_check_tick(&state).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("health check loop received shutdown signal");
                        break;
                    }
                }
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::daily("./logs", "manager.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("manager=info,common=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(non_blocking)
        .init();

    let cli_args = CliArgs::parse();

    match cli_args.command.unwrap_or(Command::Serve {
        config_file: PathBuf::from("manager.toml"),
        host: None,
        port: None,
    }) {
        Command::Run { manager, file } => common::runspec::submit_task_file(&manager, &file).await,
        Command::Serve { config_file, host, port } => {
            let mut config = ManagerConfig::load(&config_file)?.apply_env_overrides()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.validate()?;

            let manager = match Manager::new(config) {
                Ok(manager) => manager,
                Err(e) => {
                    error!(error = %e, "failed to initialize manager");
                    return Err(e);
                }
            };

            manager.run().await
        }
    }
}
