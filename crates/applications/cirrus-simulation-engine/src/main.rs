//! Cirrus Simulation Engine CLI
//!
//! Runs the global manager scenario against the simulated execution
//! collaborator and prints a summary.

use std::fs;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cirrus_simulation_engine::{
    config::RunConfig,
    scenario::{RunSummary, run_global_manager},
};

#[derive(Parser, Debug)]
#[command(name = "cirrus-sim")]
#[command(about = "Simulate a global manager creating and supervising brokers", long_about = None)]
struct Args {
    /// JSON run configuration (defaults to the demo timeline)
    #[arg(short, long)]
    config: Option<String>,

    /// Stop dispatching after this simulated time
    #[arg(short, long)]
    until: Option<f64>,

    /// Seed for the simulated executor
    #[arg(long)]
    seed: Option<u64>,

    /// Probability that a task fails (0.0 - 1.0)
    #[arg(long)]
    failure_rate: Option<f64>,

    /// Standard deviation of execution-time noise
    #[arg(long)]
    jitter: Option<f64>,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<String>,
}

impl Args {
    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
                RunConfig::from_json(&json).with_context(|| format!("parsing config {}", path))?
            }
            None => RunConfig::default(),
        };

        if let Some(until) = self.until {
            config.simulation.until = Some(until);
        }
        if let Some(seed) = self.seed {
            config.executor.seed = seed;
        }
        if let Some(rate) = self.failure_rate {
            config.executor.failure_rate = rate;
        }
        if let Some(jitter) = self.jitter {
            config.executor.jitter = jitter;
        }
        Ok(config)
    }
}

fn print_summary(summary: &RunSummary) {
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Global Manager Summary                                  ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    match (&summary.outcome, &summary.error) {
        (Some(outcome), _) => println!("Run ended ({:?}) at t={:.2}", outcome, summary.stats.final_time),
        (None, Some(err)) => println!("Run HALTED at t={:.2}: {}", summary.stats.final_time, err),
        (None, None) => println!("Run ended at t={:.2}", summary.stats.final_time),
    }
    println!("  Events dispatched: {}", summary.stats.events_dispatched);
    println!("  Events cancelled:  {}", summary.stats.events_cancelled);
    println!("  Final strategy:    {}", summary.final_strategy);
    for (kind, count) in &summary.stats.recoverable {
        println!("  {:?} warnings: {}", kind, count);
    }

    println!("\nSubordinates ({}):", summary.records.len());
    for record in &summary.records {
        println!(
            "  {:<40} {:>3} VMs {:>3} tasks  created t={:>6.2}  exec {:>9.2}s",
            record.name,
            record.assigned_vms.len(),
            record.assigned_tasks.len(),
            record.created_at,
            record.cumulative_metric
        );
    }
    for failure in &summary.creation_failures {
        println!("  skipped: {}", failure);
    }

    if let Some(report) = &summary.report {
        println!("\nPerformance:");
        println!("  Successful tasks:  {}", report.total_successful);
        println!("  Failed tasks:      {}", report.total_failed);
        println!("  Success rate:      {:.2}%", report.success_rate_percent());
        println!("  Avg exec/broker:   {:.2}s", report.average_execution_time);
        println!("  Total exec time:   {:.2}s", report.total_execution_time);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cirrus_simulation_engine=info,cirrus_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.run_config()?;
    info!(
        "Starting {} with {} scheduled actions",
        config.manager.name,
        config.manager.schedule.len()
    );

    let summary = run_global_manager(&config).context("setting up the simulation")?;
    print_summary(&summary);

    if let Some(output_path) = &args.output {
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(output_path, json).with_context(|| format!("writing {}", output_path))?;
        println!("\nResults written to {}", output_path);
    }

    if let Some(err) = &summary.error {
        anyhow::bail!("simulation halted with {} partial records: {}", summary.records.len(), err);
    }
    Ok(())
}
