use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use rist_netem_proxy::cli::Cli;
use rist_netem_proxy::peer::PeerTable;
use rist_netem_proxy::pipeline::Pipeline;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();

    let run_dir = project_dir(&cli.project);
    tracing::info!(
        scenario = cli.scenario.name(),
        listen = %cli.listen,
        run_dir = %run_dir.display(),
        "starting rist-netem-proxy"
    );

    let scenario_dir = run_dir.join(cli.scenario.name());
    let mut master_rng = StdRng::seed_from_u64(cli.seed);
    let update_every = Duration::try_from_secs_f64(cli.update_every).map_err(|e| {
        tracing::error!(error = %e, "invalid --update-every");
        e
    })
    .context("invalid --update-every")?;
    let mut state = cli
        .scenario
        .build(&mut master_rng, &scenario_dir, update_every)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to set up impairment state");
            e
        })
        .context("failed to set up impairment state")?;

    let peers = PeerTable::with_known_peer(cli.known_peer);
    let mut pipeline = Pipeline::new(cli.listen, peers, master_rng, cli.mtu)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to bind listen socket");
            e
        })
        .context("failed to bind listen socket")?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let result = pipeline.run(&mut state, &|| running.load(Ordering::SeqCst));
    if let Err(e) = &result {
        tracing::error!(error = %e, "pipeline terminated with an error");
    }

    tracing::info!("shutting down");
    state.close().context("failed to close impairment trace")?;
    result.context("pipeline terminated with an error")?;
    Ok(())
}

/// `./Runs/<project>/`, with the literal name `Test` special-cased to a
/// timestamped `./Runs/Test-<unix_nanos>/` directory (spec §6).
fn project_dir(project: &str) -> PathBuf {
    if project == "Test" {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        PathBuf::from("Runs").join(format!("Test-{nanos}"))
    } else {
        PathBuf::from("Runs").join(project)
    }
}
