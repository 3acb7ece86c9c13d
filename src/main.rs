#![allow(non_snake_case)]
use clap::Parser;
use paperbot_ekf::{
    config::read_config_from_json,
    plotting,
    simulator::{self as sim, SimulationNoise},
};
use std::{fs::File, path::PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulates the paper robot driving loops in its arena and tracks it with
/// the pose EKF.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON filter configuration; the demo configuration when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of laps of the demo profile
    #[arg(short, long, default_value_t = 2)]
    laps: usize,

    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Show the trajectory with gnuplot
    #[arg(long)]
    plot: bool,

    /// Write the estimate history as JSON
    #[arg(long)]
    history_out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => read_config_from_json(path)?,
        None => sim::demo_config(),
    };

    let commands = sim::demo_commands(args.laps);
    let (filter, report) = sim::run_ekf(
        &config,
        &commands,
        SimulationNoise::from_config(&config),
        args.seed,
    )?;

    info!(pose = %filter.pose(), "final estimate");
    info!("covariance:{}", filter.covariance());
    println!(
        "steps: {}  rmse: {:.2} mm  mean NIS: {:.3}  mean NEES: {:.3}  skipped updates: {}",
        commands.len(),
        report.position_rmse(),
        report.mean_nis(),
        report.mean_nees(),
        report.skipped_updates
    );

    if let Some(path) = &args.history_out {
        serde_json::to_writer_pretty(File::create(path)?, filter.history())?;
        info!(path = %path.display(), "history written");
    }
    if args.plot {
        plotting::plot_states(&filter, Some(&report.truth))?;
    }
    Ok(())
}
