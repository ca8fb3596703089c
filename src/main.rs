//! `vpp-bid` entry point: CLI wiring, logging setup and report output.

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use vpp_bid::cli::{self, CliOptions};
use vpp_bid::config::ScenarioConfig;
use vpp_bid::io::export::export_csv;
use vpp_bid::report::RunReport;
use vpp_bid::runner;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads config: `--scenario` takes priority, then `--preset`, then baseline.
fn load_config(opts: &CliOptions) -> Result<ScenarioConfig> {
    let mut cfg = if let Some(ref path) = opts.scenario {
        ScenarioConfig::from_toml_file(path)?
    } else if let Some(ref name) = opts.preset {
        ScenarioConfig::from_preset(name)?
    } else {
        ScenarioConfig::baseline()
    };

    if let Some(seed) = opts.seed {
        cfg.run.seed = seed;
    }
    if let Some(ref scheme) = opts.scheme {
        cfg.bidding.price_scheme = scheme.clone();
    }
    Ok(cfg)
}

fn run(opts: &CliOptions) -> Result<()> {
    let cfg = load_config(opts)?;

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let outcome = runner::run(&cfg).context("run failed")?;
    let report = RunReport::from_outcome(&outcome);
    println!("{report}");

    if let Some(ref path) = opts.telemetry_out {
        export_csv(&report.rows, Path::new(path))
            .with_context(|| format!("failed to write CSV to {}", path.display()))?;
        eprintln!("Bid trajectory written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let opts = match cli::parse_args() {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("error: {msg}");
            cli::print_usage();
            process::exit(1);
        }
    };
    if opts.help {
        cli::print_usage();
        return;
    }

    init_tracing();
    if let Err(e) = run(&opts) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
