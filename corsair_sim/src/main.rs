//! Corsair simulation CLI
//!
//! Runs fault scenarios against the ship worker, optionally across many seeds.

use clap::Parser;
use corsair_sim::scenarios::ScenarioId;
use corsair_sim::{ScenarioResult, ScenarioRunner};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Corsair deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "corsair-sim")]
#[command(about = "Run deterministic fault scenarios against the ship worker", long_about = None)]
struct Args {
    /// Master seed (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Ships spawned at the start of each run
    #[arg(long, default_value = "5")]
    ships: usize,

    /// Scenario to run (calm_seas, shipwreck, mutiny, storm, port_call, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Steering passes before the fabric disconnects
    #[arg(short, long, default_value = "10")]
    passes: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    };

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if !args.json {
        info!(seed = base_seed, seeds = args.seeds, ships = args.ships, "Corsair simulator v0.1.0");
    }

    let mut results: Vec<ScenarioResult> = Vec::new();
    for offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(offset as u64);
        let runner = ScenarioRunner::new(seed, args.ships).with_passes(args.passes);

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;
            if !args.json {
                if result.passed {
                    info!("PASS {} (seed={}, sends={})", scenario, seed, result.sends);
                } else {
                    error!(
                        "FAIL {} (seed={}): {}",
                        scenario,
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            results.push(result);
        }
    }

    let failed: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();

    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed.len(),
            "failed": failed.len(),
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: could not encode summary: {}", e);
                std::process::exit(1);
            }
        }
    } else if failed.is_empty() {
        info!("All {} scenario runs passed", results.len());
    } else {
        error!("{}/{} scenario runs failed", failed.len(), results.len());
        for result in &failed {
            error!(
                "  - {} seed={}: {}",
                result.scenario,
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    if !failed.is_empty() {
        std::process::exit(1);
    }
}
