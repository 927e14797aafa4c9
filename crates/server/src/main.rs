mod admin;
mod api;
mod auth;
mod cli;
mod clients;
mod repo;
mod response;
mod router;
mod state;
mod workers;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{info, warn};

use vigil_core::Config;

use crate::admin::{LogAdmin, MathAdmin};
use crate::cli::{Cli, Command, ServerArgs};
use crate::repo::{LogRepo, MathRepo};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => run_server(args).await,
    }
}

async fn run_server(args: ServerArgs) -> anyhow::Result<()> {
    vigil_core::config::load_dotenv();
    let config = Config::load(&args.config_type, &args.config)?;
    init_tracing(&config);
    info!(source = %args.config_type, path = %args.config, mode = %config.server.mode,
        "configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .connect(&config.postgres.database_url())
        .await
        .context("relational store unreachable")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running database migrations")?;
    info!("database ready");

    let mut engine = workers::start_engine(&pool, &config).await?;

    let state = Arc::new(AppState {
        math_admin: MathAdmin::new(MathRepo::new(pool.clone()), engine.math_changes.clone()),
        log_admin: LogAdmin::new(
            LogRepo::new(pool.clone()),
            engine.search.clone(),
            engine.log_changes.clone(),
        ),
        config: config.clone(),
    });

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "http listening");

    spawn_signal_handler(engine.shutdown.clone());

    let mut stop = engine.shutdown.subscribe();
    axum::serve(listener, router::build_router(state))
        .with_graceful_shutdown(async move {
            while !*stop.borrow() {
                if stop.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .context("http server")?;

    // HTTP is down; wait for the three workers to drain their registries.
    while engine.workers.join_next().await.is_some() {}
    pool.close().await;
    info!("server graceful shutdown success");
    Ok(())
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter)),
        )
        .init();
}

/// Close the stop channel on the first SIGINT/SIGTERM; a second signal
/// forces immediate exit with code 1.
fn spawn_signal_handler(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("installing SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
        info!("received stop signal, exiting gracefully...");
        let _ = shutdown.send(true);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
        warn!("received a second stop signal, forcing exit");
        std::process::exit(1);
    });
}
