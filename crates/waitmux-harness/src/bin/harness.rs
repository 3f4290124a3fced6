//! CLI entrypoint for the waitmux conformance harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use waitmux_harness::{ScenarioConfig, ScenarioReport, run_all, run_scenario, scenario_names};

/// Conformance tooling for the waitmux primitives.
#[derive(Debug, Parser)]
#[command(name = "waitmux-harness")]
#[command(about = "Scenario-conformance harness for waitmux")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run scenarios and optionally write a report.
    Run {
        /// Run only the named scenario.
        #[arg(long)]
        scenario: Option<String>,
        /// Iteration multiplier for the heavy scenarios.
        #[arg(long, default_value_t = 1)]
        scale: u32,
        /// Output report path (markdown; a `.json` sibling is written too).
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the registered scenarios.
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            for name in scenario_names() {
                println!("{name}");
            }
        }
        Command::Run {
            scenario,
            scale,
            report,
        } => {
            let config = ScenarioConfig { scale };
            let outcomes = match scenario {
                Some(name) => {
                    let outcome = run_scenario(&name, &config)
                        .ok_or_else(|| format!("unknown scenario '{name}'"))?;
                    vec![outcome]
                }
                None => run_all(&config),
            };

            for outcome in &outcomes {
                let status = if outcome.passed { "PASS" } else { "FAIL" };
                eprintln!(
                    "[{status}] {} ({} ms): {}",
                    outcome.name, outcome.elapsed_ms, outcome.detail
                );
            }

            let report_doc = ScenarioReport::new(
                "waitmux Conformance Report",
                format!("{:?}", std::time::SystemTime::now()),
                outcomes,
            );
            eprintln!(
                "Scenarios complete: total={}, passed={}, failed={}",
                report_doc.summary.total, report_doc.summary.passed, report_doc.summary.failed
            );

            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                std::fs::write(&report_path, report_doc.to_markdown())?;
                let json_path = report_path.with_extension("json");
                std::fs::write(&json_path, report_doc.to_json())?;
            }

            if !report_doc.summary.all_passed() {
                return Err("scenario conformance failed".into());
            }
        }
    }
    Ok(())
}
