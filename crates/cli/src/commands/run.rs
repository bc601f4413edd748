//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use context::{ActorTree, CarlaContext, ConnectionSettings, ContextError};
use contracts::{ContextBlueprint, SimulatorConnector};
use proxy::ProxyHandle;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};

/// How often the hold loop re-checks the tick budget
const TICK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let mut blueprint = load_blueprint(&args.config)?;

    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding CARLA host from CLI");
        blueprint.world.carla_host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding CARLA port from CLI");
        blueprint.world.carla_port = port;
    }

    info!(
        host = %blueprint.world.carla_host,
        port = blueprint.world.carla_port,
        actors = blueprint.actors.len(),
        proxies = blueprint.proxies.len(),
        primary_mode = blueprint.sync.primary_mode,
        "Configuration loaded"
    );

    let ctx = Arc::new(CarlaContext::new(
        connector(),
        ConnectionSettings::from(&blueprint.world),
    )?);

    let outcome = drive(args, &ctx, blueprint).await;

    // disconnect whether or not the run succeeded
    let teardown = Arc::clone(&ctx);
    let disconnected = blocking(move || Ok(teardown.disconnect()?)).await;

    println!("\n{}", ctx.running().tick_stats());

    outcome?;
    disconnected?;
    info!("carla-utils finished");
    Ok(())
}

async fn drive(args: &RunArgs, ctx: &Arc<CarlaContext>, blueprint: ContextBlueprint) -> Result<()> {
    let blueprint = Arc::new(blueprint);

    let tree = {
        let ctx = Arc::clone(ctx);
        let blueprint = Arc::clone(&blueprint);
        blocking(move || prepare(&ctx, &blueprint)).await?
    };

    let mut proxies = Vec::with_capacity(blueprint.proxies.len());
    let mut started = Ok(());
    for config in &blueprint.proxies {
        let Some(actor) = tree.get(&config.actor) else {
            started = Err(CliError::from(proxy::ProxyError::invalid_argument(
                "actor",
                format!("proxy '{}' references unknown actor '{}'", config.name, config.actor),
            )));
            break;
        };
        match proxy::start_from_config(config, actor).await {
            Ok(handle) => proxies.push(handle),
            Err(e) => {
                started = Err(e.into());
                break;
            }
        }
    }

    if started.is_ok() {
        info!(actors = tree.len(), proxies = proxies.len(), "Session running");
        hold(args, ctx).await;
    }

    stop_proxies(proxies).await;
    started
}

/// Connect, load the world, spawn the actor tree and apply the sync mode
fn prepare(ctx: &CarlaContext, blueprint: &ContextBlueprint) -> Result<ActorTree> {
    ctx.connect()?;

    if let Some(ref map) = blueprint.world.map {
        ctx.use_map(map)?;
    } else if blueprint.world.reload_world {
        ctx.reload_world(false)?;
    }

    let tree = ActorTree::build(ctx.actors(), &blueprint.actors)?;
    ctx.actors()
        .spawn(&tree.handles())
        .map_err(ContextError::from)?;
    info!(count = tree.len(), "Actors spawned");

    let sync = &blueprint.sync;
    if sync.primary_mode {
        ctx.running()
            .use_sync_primary_mode(true, sync.fixed_delta_sec, sync.strict_timing)?;
        if !ctx.running().wait_mode_applied(ctx.settings().timeout) {
            warn!("Synchronous mode not confirmed within the connection timeout");
        }
    }

    Ok(tree)
}

/// Wait for Ctrl-C / SIGTERM, the duration budget or the tick budget
async fn hold(args: &RunArgs, ctx: &CarlaContext) {
    let duration = async {
        if args.duration == 0 {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_secs(args.duration)).await;
    };

    let ticks = async {
        if args.max_ticks == 0 {
            std::future::pending::<()>().await;
        }
        let start = ctx.running().tick_pulse().generation();
        let mut poll = tokio::time::interval(TICK_POLL_INTERVAL);
        loop {
            poll.tick().await;
            if ctx.running().tick_pulse().generation() - start >= args.max_ticks {
                break;
            }
            if !ctx.running().is_running() {
                warn!("Synchronization loop stopped early");
                break;
            }
        }
    };

    tokio::select! {
        _ = shutdown_signal() => warn!("Received shutdown signal, stopping..."),
        _ = duration => info!(seconds = args.duration, "Duration reached"),
        _ = ticks => info!(ticks = args.max_ticks, "Tick budget reached"),
    }
}

async fn stop_proxies(proxies: Vec<ProxyHandle>) {
    for proxy in proxies {
        let name = proxy.name().to_string();
        let metrics = proxy.metrics().snapshot();
        match proxy.stop().await {
            Ok(()) => info!(
                proxy = %name,
                delivered = metrics.delivered,
                dropped = metrics.dropped,
                failures = metrics.failures,
                "Proxy stopped"
            ),
            Err(e) => warn!(proxy = %name, error = %e, "Proxy did not stop cleanly"),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CliError::worker(e.to_string()))?
}

/// Ctrl+C and SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(feature = "real-carla")]
fn connector() -> Arc<dyn SimulatorConnector> {
    Arc::new(actor_factory::CarlaConnector::new())
}

#[cfg(not(feature = "real-carla"))]
fn connector() -> Arc<dyn SimulatorConnector> {
    info!("Built without real-carla, using the in-memory simulator");
    Arc::new(actor_factory::MockSimulator::with_config(
        actor_factory::MockConfig {
            record_calls: false,
            ..actor_factory::MockConfig::default()
        },
    ))
}
