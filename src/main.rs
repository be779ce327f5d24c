//! Entry point: CLI parsing, config loading, and the outer loop that runs
//! one simulation per (tier stack × requested policy) combination.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use strum::IntoEnumIterator;

use config::{Config, TierPolicySlot};
use policy::PolicyKind;
use storage::StorageManager;

mod clock;
mod config;
mod error;
mod file;
mod policy;
mod report;
mod simulation;
mod storage;
mod tier;
mod trace;

use error::SimError;

/// Built-in example device presets for the `devices` subcommand, grounded on
/// the original `__main__.py`'s `storage_config_list` (SSD/HDD/Tape).
const DEVICE_PRESETS: &[(&str, u64, f64, f64)] = &[
    ("SSD", 400_000_000_000, 100e-6, 2e9),
    ("HDD", 8_000_000_000_000, 10e-3, 250e6),
    ("Tapes", 50_000_000_000_000, 20.0, 315e6),
];

const DEFAULT_SEED: u64 = 1234;

#[derive(Parser, Debug)]
#[command(name = "tiered-storage-sim")]
struct SimCli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "List built-in tier device presets.")]
    Devices,
    #[command(about = "List available placement policies.")]
    Policies,
    #[command(about = "Run a simulation.")]
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// One or more policy names, or `all` to run every known policy.
    #[arg(required = true)]
    policies: Vec<String>,

    #[arg(short = 'c', long = "config-file", default_value = "config.toml")]
    config_file: PathBuf,

    #[arg(short = 'l', long = "limit-trace", default_value_t = -1)]
    limit_trace: i64,

    #[arg(short = 'o', long = "output-folder", default_value = "logs/<timestamp>")]
    output_folder: String,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[arg(short = 'p', long = "no-progress-bar")]
    no_progress_bar: bool,

    #[arg(short = 'n', long = "no-ui")]
    no_ui: bool,
}

fn main() -> ExitCode {
    match faux_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format!("{err}").red());
            ExitCode::FAILURE
        }
    }
}

fn faux_main() -> Result<(), SimError> {
    let args = SimCli::parse();
    match args.cmd {
        Commands::Devices => {
            println!("Built-in tier device presets:\n");
            for (name, size, latency, throughput) in DEVICE_PRESETS {
                println!(
                    "\t{name}: {} @ {latency}s latency, {}/s throughput",
                    HumanBytes(*size),
                    HumanBytes(*throughput as u64),
                );
            }
            Ok(())
        }
        Commands::Policies => {
            println!("Available policies:\n");
            for p in PolicyKind::iter() {
                println!("\t{p}");
            }
            println!("\tall (runs every policy above)");
            Ok(())
        }
        Commands::Run(run_args) => run(run_args),
    }
}

fn resolve_policies(requested: &[String]) -> Result<Vec<PolicyKind>, SimError> {
    if requested.iter().any(|p| p == "all") {
        return Ok(PolicyKind::iter().collect());
    }
    requested
        .iter()
        .map(|name| {
            name.parse::<PolicyKind>()
                .map_err(|_| SimError::UnknownPolicy(name.clone()))
        })
        .collect()
}

/// The CLI's `-1` sentinel means "not specified on the command line" and
/// falls back to `[trace] limit` in the config file; any non-negative CLI
/// value always wins over the config.
fn resolve_trace_limit(cli_limit: i64, config_limit: Option<usize>) -> Option<usize> {
    if cli_limit >= 0 {
        Some(cli_limit as usize)
    } else {
        config_limit
    }
}

fn render_output_folder(template: &str) -> PathBuf {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(template.replace("<timestamp>", &timestamp.to_string()))
}

/// Append a numeric suffix to `path` until it doesn't already exist, the same
/// collision-avoidance loop used for the run's results directory.
fn avoid_collision(mut path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "logs".to_string());
    let mut suffix = 0u64;
    loop {
        let candidate = format!("{base}_{suffix}");
        path.set_file_name(candidate);
        if !path.exists() {
            return path;
        }
        suffix += 1;
    }
}

const CONFIG_TEMPLATE: &str = r#"[[tiers]]
name = "SSD"
max_size = 400000000000
latency = "100us"
throughput = 2000000000.0

[[tiers]]
name = "HDD"
max_size = 8000000000000
latency = "10ms"
throughput = 250000000.0
policy = "no-policy"

[trace]
path = "trace.txt"
format = "custom"
"#;

fn load_or_template_config(path: &Path) -> Result<Config, SimError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, CONFIG_TEMPLATE)?;
        return Err(SimError::Generic(format!(
            "no config file at \"{}\"; a template has been written there, fill it in and re-run",
            path.display()
        )));
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

/// One `key=value` line per field, per §6 ("one key=value per line"),
/// instead of a `{args:?}` debug dump.
fn render_commandline_parameters(args: &RunArgs) -> String {
    format!(
        "policies={}\nconfig_file={}\nlimit_trace={}\noutput_folder={}\nverbose={}\nno_progress_bar={}\nno_ui={}\n",
        args.policies.join(","),
        args.config_file.display(),
        args.limit_trace,
        args.output_folder,
        args.verbose,
        args.no_progress_bar,
        args.no_ui,
    )
}

fn run(args: RunArgs) -> Result<(), SimError> {
    let rendered_args = render_commandline_parameters(&args);
    let output_folder = avoid_collision(render_output_folder(&args.output_folder));
    report::write_commandline_parameters(&output_folder, &rendered_args)?;

    let config = load_or_template_config(&args.config_file)?;
    let policies = resolve_policies(&args.policies)?;
    let limit = resolve_trace_limit(args.limit_trace, config.trace.limit);

    println!(
        "Starting program with {} {} against \"{}\"",
        policies.len(),
        if policies.len() == 1 { "policy" } else { "policies" },
        config.trace.path
    );

    let trace = config.trace.format.load(&config.trace.path)?;
    let lifetime_model = trace.lifetime_model();
    let trace_len = trace.records().len();

    let mut run_index = 0usize;
    let mut occupancy_rows = Vec::new();

    for (i, policy_kind) in policies.iter().enumerate() {
        let policy_label = policy_kind.to_string();
        let progress = if args.no_progress_bar {
            None
        } else {
            let bound = limit.unwrap_or(trace_len).min(trace_len) as u64;
            let pb = ProgressBar::new(bound);
            if let Ok(style) = ProgressStyle::with_template("{msg} {bar:40} {pos}/{len}") {
                pb.set_style(style);
            }
            pb.set_message(policy_label.clone());
            Some(pb)
        };

        let tiers = config.tiers.iter().map(|tc| tc.build()).collect();
        let mut storage = StorageManager::new(tiers);
        if args.verbose {
            storage = storage.with_event_log();
        }

        for (tier_id, tc) in config.tiers.iter().enumerate() {
            let effective = match &tc.policy {
                TierPolicySlot::NoPolicy => None,
                TierPolicySlot::CommandlinePolicy => Some(*policy_kind),
                TierPolicySlot::Named(kind) => Some(*kind),
            };
            if let Some(kind) = effective {
                let built = kind.build(tier_id, DEFAULT_SEED + i as u64, lifetime_model.clone());
                storage.attach_policy(tier_id, built);
            }
        }

        let trace_for_run = config.trace.format.load(&config.trace.path)?;
        let mut sim = simulation::Simulation::new(
            storage,
            trace_for_run,
            config.strict_trace,
            config.simulate_perfect_prefetch,
        );
        let report_text = sim.run(&policy_label, run_index, limit, progress.as_ref())?;
        run_index += 1;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if args.verbose {
            println!("{report_text}");
        }
        report::append_formatted_results(&output_folder, &report_text)?;
        if args.verbose {
            report::append_latest_log(&output_folder, &policy_label, sim.storage().event_log_lines())?;
        }
        if !args.no_ui {
            report::print_summary(&policy_label, &sim.storage().tiers);
        }

        for t in &sim.storage().tiers {
            occupancy_rows.push((policy_label.clone(), clone_tier_for_report(t)));
        }
    }

    report::write_occupancy_csv(&output_folder, &occupancy_rows)?;
    println!(
        "{}",
        format!("Done. Results written to \"{}\"", output_folder.display()).green()
    );
    Ok(())
}

/// `Tier` has no `Clone` (its `content` can be large, and cloning it on
/// every report would duplicate the whole file index); the occupancy csv
/// only needs the lightweight summary fields, so build a throwaway copy of
/// just those.
fn clone_tier_for_report(t: &tier::Tier) -> tier::Tier {
    let mut copy =
        tier::Tier::new(t.name.clone(), t.max_size, t.latency, t.throughput).with_target_occupation(t.target_occupation);
    copy.used_size = t.used_size;
    copy.counters = t.counters;
    copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_commandline_parameters_emits_one_key_value_pair_per_line() {
        let args = RunArgs {
            policies: vec!["lru".to_string(), "fifo".to_string()],
            config_file: PathBuf::from("config.toml"),
            limit_trace: -1,
            output_folder: "logs/<timestamp>".to_string(),
            verbose: true,
            no_progress_bar: false,
            no_ui: false,
        };
        let rendered = render_commandline_parameters(&args);
        assert!(rendered.lines().all(|line| line.contains('=')));
        assert!(rendered.contains("policies=lru,fifo"));
        assert!(rendered.contains("verbose=true"));
    }

    #[test]
    fn resolve_policies_expands_all() {
        let resolved = resolve_policies(&["all".to_string()]).unwrap();
        assert_eq!(resolved.len(), PolicyKind::iter().count());
    }

    #[test]
    fn resolve_policies_rejects_unknown_names() {
        let err = resolve_policies(&["not-a-policy".to_string()]).unwrap_err();
        assert!(matches!(err, SimError::UnknownPolicy(_)));
    }

    #[test]
    fn resolve_policies_parses_known_names() {
        let resolved = resolve_policies(&["lru".to_string(), "fifo".to_string()]).unwrap();
        assert_eq!(resolved, vec![PolicyKind::Lru, PolicyKind::Fifo]);
    }

    #[test]
    fn resolve_trace_limit_prefers_a_nonnegative_cli_value() {
        assert_eq!(resolve_trace_limit(10, Some(5)), Some(10));
        assert_eq!(resolve_trace_limit(0, Some(5)), Some(0));
    }

    #[test]
    fn resolve_trace_limit_falls_back_to_config_when_cli_is_unset() {
        assert_eq!(resolve_trace_limit(-1, Some(5)), Some(5));
        assert_eq!(resolve_trace_limit(-1, None), None);
    }

    #[test]
    fn render_output_folder_substitutes_the_timestamp_placeholder() {
        let rendered = render_output_folder("logs/<timestamp>");
        assert!(!rendered.to_string_lossy().contains("<timestamp>"));
        assert!(rendered.to_string_lossy().starts_with("logs/"));
    }

    #[test]
    fn render_output_folder_is_unchanged_without_a_placeholder() {
        let rendered = render_output_folder("fixed/path");
        assert_eq!(rendered, PathBuf::from("fixed/path"));
    }

    #[test]
    fn avoid_collision_passes_through_a_nonexistent_path() {
        let candidate = PathBuf::from("/tmp/definitely-not-a-real-dir-xyz-12345");
        assert_eq!(avoid_collision(candidate.clone()), candidate);
    }

    #[test]
    fn avoid_collision_suffixes_an_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("run");
        std::fs::create_dir(&existing).unwrap();
        let resolved = avoid_collision(existing.clone());
        assert_ne!(resolved, existing);
        assert!(!resolved.exists());
    }

    #[test]
    fn clone_tier_for_report_copies_summary_fields_only() {
        let mut original = tier::Tier::new("ssd", 100, 0.5, 2.0).with_target_occupation(0.8);
        original.used_size = 40;
        original.counters.number_of_reads = 3;
        let copy = clone_tier_for_report(&original);
        assert_eq!(copy.name, "ssd");
        assert_eq!(copy.used_size, 40);
        assert_eq!(copy.counters.number_of_reads, 3);
        assert!(copy.content.is_empty());
    }
}
