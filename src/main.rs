//! LVS topology checker.
//!
//! Reads a load-balancer topology file, builds the validated model and
//! reports every diagnostic raised on the way.
//!
//! # Architecture Overview
//!
//! ```text
//!   topology file ──▶ config::lexer ──▶ config::dispatch ──▶ parser builders
//!                                                                 │
//!   options file ──▶ config::loader ──▶ ParserOptions ────────────┤
//!                                                                 ▼
//!                                      observability ◀── topology::Topology
//!                                   (diagnostics, logs)           │
//!                                                                 ▼
//!                                                        summary / JSON
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use lvs_topology::config::loader::{load_options, parse_file};
use lvs_topology::config::ParserOptions;
use lvs_topology::observability::logging::init_logging;
use lvs_topology::{ParseOutcome, Topology};

#[derive(Parser)]
#[command(name = "lvs-topology")]
#[command(about = "Validate a load-balancer virtual/real server topology", long_about = None)]
struct Cli {
    /// Parser options (TOML); defaults apply when omitted
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Print the model as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Exit non-zero when any error diagnostic was produced
    #[arg(long)]
    strict: bool,

    /// Topology configuration file
    config: PathBuf,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let options = match &cli.options {
        Some(path) => load_options(path)?,
        None => ParserOptions::default(),
    };
    init_logging(&options.observability);

    tracing::info!(config = %cli.config.display(), "lvs-topology v0.1.0 starting");

    let outcome = parse_file(&cli.config, &options)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    if cli.strict && outcome.has_errors() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(outcome: &ParseOutcome) {
    let topology: &Topology = &outcome.topology;

    for vs in &topology.virtual_servers {
        let family = vs
            .family
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unresolved".to_string());
        let scheduler = vs.scheduler.map(|s| s.as_str()).unwrap_or("-");
        println!(
            "virtual_server {} [{} {:?}] sched={} fwd={} real_servers={}",
            vs,
            family,
            vs.protocol,
            scheduler,
            vs.forwarding,
            vs.real_server_count()
        );
        for rs in &vs.real_servers {
            println!("  real_server {} weight={} fwd={}", rs.addr, rs.initial_weight, rs.forwarding);
        }
        if let Some(sorry) = &vs.sorry_server {
            println!("  sorry_server {} inhibit={}", sorry.server.addr, sorry.inhibit);
        }
    }

    for group in &topology.groups {
        println!(
            "virtual_server_group {} fwmarks={} ranges={}",
            group.name,
            group.fwmarks().len(),
            group.ranges().len()
        );
    }

    println!(
        "{} virtual server(s), {} real server(s), {} group(s), {} diagnostic(s)",
        topology.virtual_servers.len(),
        topology.real_server_count(),
        topology.groups.len(),
        outcome.diagnostics.len()
    );
    for diagnostic in &outcome.diagnostics {
        eprintln!("{}", diagnostic);
    }
}
