//! SEMLAB Harness CLI
//!
//! Run deterministic reader scenarios against the lecture page.

use clap::Parser;
use semlab_sim::{ScenarioId, ScenarioResult, ScenarioRunner};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// SEMLAB deterministic interaction harness
#[derive(Parser, Debug)]
#[command(name = "semlab-sim")]
#[command(about = "Replay seeded readers against the SEM lecture widgets", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (scroll_through, decision_walk, quiz_replay, slider_sweep,
    /// offline_reference, explore_model, random_reader, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Step budget for the randomized phase of each scenario
    #[arg(long, default_value = "200")]
    steps: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the run (events per step) to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Include the rendered SVG of every redraw in the export
    #[arg(long)]
    svg: bool,

    /// Save scenes to a Rerun recording
    #[cfg(feature = "visualization")]
    #[arg(long)]
    rerun: Option<String>,
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

fn runner(args: &Args, seed: u64) -> ScenarioRunner {
    let runner = ScenarioRunner::new(seed)
        .with_steps(args.steps)
        .with_svg_capture(args.svg);

    #[cfg(feature = "visualization")]
    if let Some(path) = &args.rerun {
        match semlab_core::visualization::RerunSceneLogger::new_to_file("semlab_sim", path) {
            Ok(logger) => return runner.with_rerun(std::sync::Arc::new(logger)),
            Err(e) => error!("Rerun recording disabled: {}", e),
        }
    }

    runner
}

/// `RUST_LOG` wins when it parses; otherwise `--verbose` picks debug or info.
fn log_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), args.verbose);
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("SEMLAB harness v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    if args.export.is_some() && (scenarios.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export only supports a single scenario and seed");
        std::process::exit(1);
    }

    let base_seed = if args.seed == 0 { time_seed() } else { args.seed };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = runner(&args, seed);

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    if let (Some(path), Some(result)) = (&args.export, all_results.first()) {
        match result.export.write_to_file(path) {
            Ok(()) => info!("Exported {} frames to {}", result.export.frames.len(), path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                failed_count += 1;
            }
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total.saturating_sub(failed_count);

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "steps": r.steps,
                    "activations": r.activations,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
