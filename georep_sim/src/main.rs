//! georep scenario CLI
//!
//! Run the distributed-database learning scenarios headlessly and print
//! their narrated timelines.

use clap::Parser;
use georep_core::latency::{average_replication_latency, estimate_global_coverage};
use georep_core::LatLon;
use georep_sim::scenarios::ScenarioId;
use georep_sim::{ScenarioOutcome, ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// georep deterministic scenario runner
#[derive(Parser, Debug)]
#[command(name = "georep-sim")]
#[command(about = "Run geo-replication learning scenarios headlessly", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (write_flow, read_flow, consistency_race, failover, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulated client latitude
    #[arg(long, default_value = "48.9")]
    lat: f64,

    /// Simulated client longitude
    #[arg(long, default_value = "2.35")]
    lon: f64,

    /// Consistency-race read delay in milliseconds (0-200)
    #[arg(long, default_value = "120")]
    read_delay: u64,

    /// Animation tick rate in Hz
    #[arg(long, default_value = "60")]
    tick_rate: u32,

    /// Safety cap on animation seconds per run
    #[arg(short, long, default_value = "30")]
    duration: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export frame-by-frame run data to a JSON file (single scenario only)
    #[arg(long)]
    export: Option<String>,
}

fn print_result(result: &ScenarioResult) {
    if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario.name(), result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }

    match &result.outcome {
        ScenarioOutcome::Write {
            primary_latency_ms,
            replica_count,
            ..
        } => info!(
            "  write acked in {}ms, replicated to {} region(s)",
            primary_latency_ms, replica_count
        ),
        ScenarioOutcome::Read {
            nearest_region_id,
            nearest_latency_ms,
            primary_latency_ms,
            ..
        } => info!(
            "  read served by {} in {}ms (primary would cost {}ms)",
            nearest_region_id, nearest_latency_ms, primary_latency_ms
        ),
        ScenarioOutcome::Race {
            read_delay_ms,
            replication_latency_ms,
            read_latency_ms,
            stale,
            ..
        } => info!(
            "  delay {}ms + read {}ms vs replication {}ms → {}",
            read_delay_ms,
            read_latency_ms,
            replication_latency_ms,
            match stale {
                Some(true) => "STALE read",
                Some(false) => "fresh read",
                None => "unresolved",
            }
        ),
        ScenarioOutcome::Failover {
            new_primary_id,
            downtime_ms,
            ..
        } => info!(
            "  {} promoted after {}ms of downtime",
            new_primary_id, downtime_ms
        ),
        ScenarioOutcome::Aborted => {}
    }

    for event in &result.events {
        info!("  [{:>5}ms] {}", event.time_ms, event.label);
    }
}

fn result_json(result: &ScenarioResult) -> serde_json::Value {
    serde_json::json!({
        "scenario": result.scenario.name(),
        "seed": result.seed,
        "passed": result.passed,
        "ticks": result.total_ticks,
        "time_secs": result.final_time_secs,
        "outcome": result.outcome,
        "events": result.events,
        "failure_reason": result.failure_reason,
    })
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: write_flow, read_flow, consistency_race, failover, all");
            std::process::exit(1);
        })]
    };

    // Determine the seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(seed)
        .with_tick_rate(args.tick_rate)
        .with_duration(args.duration)
        .with_client(LatLon::new(args.lat, args.lon))
        .with_read_delay(args.read_delay);

    // Topology summary
    if !args.json {
        let topo = runner.topology();
        if let Some(primary) = topo.primary() {
            let replicas: Vec<&str> = topo.read_replicas().iter().map(String::as_str).collect();
            if let Some(avg) = average_replication_latency(primary, &replicas) {
                info!(
                    "Topology: primary {} with {} replica(s), avg replication {}ms",
                    primary,
                    replicas.len(),
                    avg
                );
            }
            info!(
                "Global coverage: {}ms average read latency worldwide",
                estimate_global_coverage(primary, &replicas)
            );
        }
    }

    // Handle --export mode for visualization
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let (result, export) = runner.run_with_export(scenarios[0]);
        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {}", e);
            std::process::exit(1);
        }

        if !args.json {
            print_result(&result);
            info!("Exported {} frames to {}", export.frames.len(), export_path);
        } else {
            println!(
                "{}",
                serde_json::to_string_pretty(&result_json(&result)).unwrap()
            );
        }

        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    // Run scenarios
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for scenario in &scenarios {
        let result = runner.run(*scenario);

        if !args.json {
            print_result(&result);
        }

        if !result.passed {
            failed_count += 1;
        }

        all_results.push(result);
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(result_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    } else if failed_count == 0 {
        info!("✅ All {} scenario runs passed!", total);
    } else {
        error!("❌ {}/{} scenario runs failed!", failed_count, total);
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
