//! Command-line argument parsing for the `vpp-bid` binary.

use std::env;
use std::path::PathBuf;

/// Parsed command-line options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    /// TOML scenario file.
    pub scenario: Option<PathBuf>,
    /// Built-in preset name; `baseline` when neither source is given.
    pub preset: Option<String>,
    /// Master seed override.
    pub seed: Option<u64>,
    /// Settlement scheme override.
    pub scheme: Option<String>,
    /// CSV destination for the bid trajectory.
    pub telemetry_out: Option<PathBuf>,
    /// `--help` was requested.
    pub help: bool,
}

/// Parses the process arguments.
///
/// # Errors
///
/// Returns a message describing the first malformed argument.
pub fn parse_args() -> Result<CliOptions, String> {
    parse_args_from(env::args().skip(1).collect())
}

/// Parses an argument list (program name excluded).
///
/// # Errors
///
/// Returns a message describing the first malformed argument.
pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    let mut opts = CliOptions::default();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                if opts.scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                opts.seed = Some(seed);
            }
            "--scheme" => {
                i += 1;
                let scheme = args.next_or_err(i, "missing value for --scheme (expected one_price or two_price)")?;
                opts.scheme = Some(scheme.to_string());
            }
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --telemetry-out (expected a file path)")?;
                if opts.telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.scenario.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if opts.scenario.is_none() && opts.preset.is_none() {
        opts.preset = Some("baseline".to_string());
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

/// Prints usage to stderr.
pub fn print_usage() {
    eprintln!("vpp-bid - reserve offers and day-ahead wind bidding under uncertainty");
    eprintln!();
    eprintln!("Usage: vpp-bid [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, strict_reserve, two_price)");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --scheme <name>          Override settlement scheme (one_price, two_price)");
    eprintln!("  --telemetry-out <path>   Export the bid trajectory to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn supports_scenario_cli() {
        let opts = parse_args_from(args(&["--scenario", "scenarios/baseline.toml"]))
            .expect("parse should succeed");
        assert_eq!(
            opts.scenario.as_deref().and_then(|p| p.to_str()),
            Some("scenarios/baseline.toml")
        );
        assert!(opts.preset.is_none());
    }

    #[test]
    fn defaults_to_baseline_preset() {
        let opts = parse_args_from(Vec::new()).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("baseline"));
        assert!(!opts.help);
    }

    #[test]
    fn parses_overrides() {
        let opts = parse_args_from(args(&[
            "--preset",
            "two_price",
            "--seed",
            "7",
            "--scheme",
            "one_price",
            "--telemetry-out",
            "bid.csv",
        ]))
        .expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("two_price"));
        assert_eq!(opts.seed, Some(7));
        assert_eq!(opts.scheme.as_deref(), Some("one_price"));
        assert!(opts.telemetry_out.is_some());
    }

    #[test]
    fn rejects_conflicting_sources() {
        let err = parse_args_from(args(&["--scenario", "a.toml", "--preset", "baseline"]));
        assert!(err.is_err());
    }

    #[test]
    fn rejects_bad_seed_and_missing_values() {
        assert!(parse_args_from(args(&["--seed", "minus-one"])).is_err());
        assert!(parse_args_from(args(&["--scenario"])).is_err());
        assert!(parse_args_from(args(&["--bogus"])).is_err());
    }

    #[test]
    fn help_flag_is_reported() {
        let opts = parse_args_from(args(&["--help"])).expect("parse should succeed");
        assert!(opts.help);
    }
}
