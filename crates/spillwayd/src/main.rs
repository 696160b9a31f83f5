//! spillwayd — the spillway daemon.
//!
//! Single binary that assembles the scaling stack for every group defined
//! in a groups.toml file:
//! - State store (redb, or in-memory when no data dir is given)
//! - Simulated dual-region cloud backends
//! - Per-group controllers (home region + overflow region)
//! - REST API
//!
//! # Usage
//!
//! ```text
//! spillwayd simulate --groups groups.toml --port 8750
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use spillway_cloud::{LaunchRequest, LogNotifier};
use spillway_cloud::sim::{SimCompute, SimLb, SimQuota, SimTemplateGroup, standard_limits};
use spillway_controller::{GroupController, Reconciler};
use spillway_core::GroupsFile;
use spillway_members::PoolMembership;
use spillway_placement::{BootTuning, HomeRegion, OverflowRegion};
use spillway_state::GroupStore;
use spillwayd::build_router;

#[derive(Parser)]
#[command(name = "spillwayd", about = "Spillway daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run against simulated cloud backends (single process, no real APIs).
    Simulate {
        /// Group definition file.
        #[arg(long, default_value = "groups.toml")]
        groups: PathBuf,

        /// Port to listen on.
        #[arg(long, default_value = "8750")]
        port: u16,

        /// Data directory for persistent state; in-memory when omitted.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Describe polls before a simulated instance reports running.
        #[arg(long, default_value = "2")]
        boot_polls: u32,

        /// Home-region instance quota; 0 sends everything to overflow.
        #[arg(long, default_value = "10")]
        home_capacity: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,spillwayd=debug,spillway=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Simulate {
            groups,
            port,
            data_dir,
            boot_polls,
            home_capacity,
        } => run_simulate(groups, port, data_dir, boot_polls, home_capacity).await,
    }
}

async fn run_simulate(
    groups_file: PathBuf,
    port: u16,
    data_dir: Option<PathBuf>,
    boot_polls: u32,
    home_capacity: i64,
) -> anyhow::Result<()> {
    info!("spillway daemon starting in simulate mode");

    let definitions = GroupsFile::from_file(&groups_file)?;
    anyhow::ensure!(
        !definitions.groups.is_empty(),
        "no groups defined in {}",
        groups_file.display()
    );

    // State store.
    let store = match &data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let db_path = dir.join("spillway.redb");
            let store = GroupStore::open(&db_path)?;
            info!(path = ?db_path, "state store opened");
            store
        }
        None => {
            info!("state store in memory");
            GroupStore::open_in_memory()?
        }
    };

    // ── Simulated cloud ────────────────────────────────────────

    let pools: Vec<&str> = definitions
        .groups
        .iter()
        .map(|g| g.lb_pool.as_str())
        .collect();
    let lb = Arc::new(SimLb::with_pools(&pools));
    let compute = Arc::new(SimCompute::with_boot_polls(boot_polls));
    // One static quota snapshot for the whole run; the sim does not account
    // for the instances it launches.
    let quota = Arc::new(SimQuota::with_limits(standard_limits(
        home_capacity,
        0,
        home_capacity * 4,
        0,
        home_capacity * 2048,
        0,
    )));
    let notifier = Arc::new(LogNotifier);
    info!(boot_polls, home_capacity, "simulated cloud backends ready");

    // ── Group controllers ──────────────────────────────────────

    let mut controllers = BTreeMap::new();
    for config in &definitions.groups {
        let Some(template) = &config.launch_template else {
            anyhow::bail!(
                "group {}: simulate mode needs launch_template, there is no existing instance to copy settings from",
                config.name
            );
        };
        let membership = Arc::new(PoolMembership::new(
            lb.clone(),
            store.clone(),
            &config.name,
            &config.lb_pool,
            config.member_port,
        ));
        let templates = Arc::new(SimTemplateGroup::new());
        let home = HomeRegion::new("home", templates, quota.clone());
        let launch = LaunchRequest::from_template(template, &config.overflow_subnet);
        let overflow = OverflowRegion::new(
            &config.overflow_region,
            &config.name,
            compute.clone(),
            store.clone(),
            membership.clone(),
            launch,
        )
        .with_tuning(BootTuning {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(250),
        });
        let reconciler = Reconciler::new(
            &config.name,
            vec![Arc::new(home), Arc::new(overflow)],
            membership,
        )?;
        let controller =
            GroupController::new(config.clone(), store.clone(), reconciler, notifier.clone())?;
        controllers.insert(config.name.clone(), Arc::new(controller));
    }
    info!(groups = controllers.len(), "group controllers initialized");

    // Bring every group to its initial capacity.
    for (name, controller) in &controllers {
        let report = controller.handle_create().await?;
        while !controller.check_create_complete().await? {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        info!(group = %name, capacity = report.target, "group created");
    }

    // ── API server ─────────────────────────────────────────────

    let router = build_router(controllers);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("spillway daemon stopped");
    Ok(())
}
