//! # Permit CLI
//!
//! Starts `<nodes>` actors that compete, under Ricart–Agrawala mutual
//! exclusion, for the lines of `<file>`. The first node to find a palindrome
//! rewrites that line with its id; everybody else reports that it found
//! nothing.
//!
//! ```text
//! permit-cli 4 10 20 lines.txt
//! permit-cli 4 10 20 lines.txt --policy exhaustive --think-delay-ms 5 -v
//! permit-cli 4 10 20 lines.txt --json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::*;
use permit_sdk::prelude::*;
use permit_sdk::Claim;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "permit-cli")]
#[command(about = "Distributed mutual exclusion race for a palindrome (Ricart-Agrawala)")]
#[command(version)]
struct Cli {
    /// Number of competing nodes
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    nodes: u32,

    /// Row count of the candidate file (logged only)
    rows: u32,

    /// Column count of the candidate file (logged only)
    cols: u32,

    /// Newline-delimited candidate lines
    file: PathBuf,

    /// What a failed search means: single-shot or exhaustive
    #[arg(long, default_value = "single-shot")]
    policy: ExhaustionPolicy,

    /// Random pause of up to this many milliseconds before each request
    #[arg(long, default_value_t = 0)]
    think_delay_ms: u64,

    /// Seed for the think delays
    #[arg(long)]
    seed: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the final report as JSON instead of text
    #[arg(long)]
    json: bool,
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn announce_claim(claim: &Claim) {
    println!(
        "  {} node {} found palindrome {} on line {} → {}",
        "✓".bright_green().bold(),
        claim.node.to_string().bright_magenta(),
        format!("\"{}\"", claim.matched).bright_green(),
        claim.index + 1,
        format!("\"{}\"", claim.marker).bright_yellow()
    );
}

/// The report's claim when the event printer never got to announce it.
fn unannounced_claim(report: &SimulationReport, announced: bool) -> Option<&Claim> {
    if announced {
        None
    } else {
        report.claim.as_ref()
    }
}

fn announce_failure(node: NodeId, error: &str) {
    println!(
        "  {} node {} gave up: {}",
        "✗".bright_red().bold(),
        node.to_string().bright_magenta(),
        error.red()
    );
}

fn summary(report: &SimulationReport) {
    let border = "─".repeat(44);
    let rows = [
        ("policy", report.policy.to_string()),
        ("shape", format!("{} x {}", report.rows, report.cols)),
        ("critical sections", report.critical_sections.to_string()),
        ("messages", report.messages_sent.to_string()),
        ("peak occupancy", report.peak_occupancy.to_string()),
        (
            "winner",
            report
                .winner()
                .map_or_else(|| "none".to_string(), |n| format!("node {}", n)),
        ),
    ];

    println!("\n  ┌{}┐", border);
    println!(
        "  │ {:^42} │",
        "Run summary".bright_yellow().to_string()
    );
    println!("  ├{}┤", border);
    for (label, value) in rows {
        println!("  │ {:<20} {:>21} │", label, value);
    }
    println!("  └{}┘", border);
}

// ─── Main ──────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut builder = SimulationConfigBuilder::new()
        .node_count(cli.nodes)
        .shape(cli.rows, cli.cols)
        .policy(cli.policy)
        .think_delay(cli.think_delay_ms)
        .event_capacity(1024);
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }

    let simulation = match Simulation::new(builder.build(), FileStore::new(&cli.file)) {
        Ok(simulation) => simulation,
        Err(e) => {
            eprintln!("{} {}", "error:".bright_red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if !cli.json {
        header(&format!(
            "{} nodes racing over {}",
            cli.nodes,
            cli.file.display()
        ));
    }

    // Claims are reported the moment they happen. A lagged receiver can miss
    // the event, so the printer tells us whether it announced one.
    let mut events = simulation.subscribe();
    let quiet = cli.json;
    let printer = tokio::spawn(async move {
        let mut announced = false;
        loop {
            match events.recv().await {
                Ok(SimulationEvent::Claimed(claim)) if !quiet => {
                    announce_claim(&claim);
                    announced = true;
                }
                Ok(SimulationEvent::Failed { node, error }) if !quiet => {
                    announce_failure(node, &error)
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        announced
    });

    let report = match simulation.run().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "error:".bright_red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let announced = printer.await.unwrap_or(false);

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{} {}", "error:".bright_red().bold(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        if let Some(claim) = unannounced_claim(&report, announced) {
            announce_claim(claim);
        }
        for node in report.non_claimants() {
            println!(
                "  {} node {} found no palindrome",
                "•".dimmed(),
                node.to_string().bright_magenta()
            );
        }
        summary(&report);
    }

    if report.failures().next().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permit_sdk::{NodeOutcome, NodeReport, TerminationState};

    fn report(claim: Option<Claim>) -> SimulationReport {
        let nodes = (1..=3)
            .map(|id| NodeReport {
                node: NodeId(id),
                outcome: match &claim {
                    Some(c) if c.node == NodeId(id) => NodeOutcome::Claimed { claim: c.clone() },
                    _ => NodeOutcome::Failed {
                        error: "read failed".to_string(),
                    },
                },
                requests: 1,
                sections: 1,
            })
            .collect();
        SimulationReport {
            policy: ExhaustionPolicy::SingleShot,
            rows: 1,
            cols: 1,
            nodes,
            claim,
            termination: TerminationState::default(),
            critical_sections: 1,
            peak_occupancy: 1,
            messages_sent: 0,
        }
    }

    fn claim_by(node: u32) -> Claim {
        Claim {
            node: NodeId(node),
            index: 0,
            matched: "anna".to_string(),
            marker: format!("{} ", node).repeat(4),
        }
    }

    #[test]
    fn missed_claim_event_is_announced_from_report() {
        let report = report(Some(claim_by(2)));
        assert_eq!(unannounced_claim(&report, false), Some(&claim_by(2)));
    }

    #[test]
    fn claim_is_not_announced_twice() {
        let report = report(Some(claim_by(2)));
        assert_eq!(unannounced_claim(&report, true), None);
    }

    #[test]
    fn failed_nodes_are_listed_as_finding_nothing() {
        let report = report(Some(claim_by(2)));
        let listed: Vec<NodeId> = report.non_claimants().collect();
        assert_eq!(listed, vec![NodeId(1), NodeId(3)]);
    }
}
