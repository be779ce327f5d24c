//! Run reporting: the `commandline_parameters.txt` / `formatted_results.txt`
//! / `occupancy.csv` trio an output folder accumulates, plus the colored
//! terminal summary printed after each policy run. Single buffered writer
//! per file rather than a background-thread collector — this simulator is
//! single-threaded end to end, so there's no producer/consumer boundary to
//! cross.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use colored::Colorize;
use human_repr::HumanDuration;
use indicatif::HumanBytes;

use crate::error::SimError;
use crate::tier::Tier;

pub fn write_commandline_parameters(output_dir: &Path, rendered_args: &str) -> Result<(), SimError> {
    fs::create_dir_all(output_dir)?;
    let mut f = BufWriter::new(
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(output_dir.join("commandline_parameters.txt"))?,
    );
    f.write_all(rendered_args.as_bytes())?;
    f.flush()?;
    Ok(())
}

/// One run's full text report for `tiers`, as both appended to
/// `formatted_results.txt` and printed to the terminal.
pub fn format_report(policy_label: &str, run_index: usize, tiers: &[Tier], wall_time_secs: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} Run #{run_index} — policy \"{policy_label}\" {}\n",
        "#".repeat(10),
        "#".repeat(10)
    ));
    for tier in tiers {
        let c = &tier.counters;
        out.push_str(&format!(
            "tier \"{}\": max_size={} used_size={} ({:.1}% of capacity)\n",
            tier.name,
            HumanBytes(tier.max_size),
            HumanBytes(tier.used_size),
            100.0 * tier.used_size as f64 / tier.max_size.max(1) as f64,
        ));
        out.push_str(&format!(
            "\treads={} writes={} evictions(out/in)={}/{} prefetches(out/in)={}/{}\n",
            c.number_of_reads,
            c.number_of_write,
            c.number_of_eviction_from_this_tier,
            c.number_of_eviction_to_this_tier,
            c.number_of_prefetching_from_this_tier,
            c.number_of_prefetching_to_this_tier,
        ));
        out.push_str(&format!(
            "\ttime spent reading={:.3}s writing={:.3}s\n",
            c.time_spent_reading, c.time_spent_writing,
        ));
    }
    out.push_str(&format!(
        "total wall time for this run: {}\n",
        std::time::Duration::from_secs_f64(wall_time_secs).human_duration()
    ));
    out
}

pub fn append_formatted_results(output_dir: &Path, report: &str) -> Result<(), SimError> {
    fs::create_dir_all(output_dir)?;
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_dir.join("formatted_results.txt"))?;
    f.write_all(report.as_bytes())?;
    Ok(())
}

/// The `--verbose` per-event callback trace, one line per fired
/// `on_file_created`/`on_file_deleted`/`on_file_access`/`on_tier_nearly_full`,
/// appended across every policy run the same way `formatted_results.txt` is.
pub fn append_latest_log(output_dir: &Path, policy_label: &str, lines: &[String]) -> Result<(), SimError> {
    if lines.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(output_dir)?;
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_dir.join("latest.log"))?;
    writeln!(f, "{} policy \"{policy_label}\" {}", "#".repeat(10), "#".repeat(10))?;
    for line in lines {
        writeln!(f, "{line}")?;
    }
    Ok(())
}

/// One row per (policy, tier) pair, for spreadsheet-friendly comparison
/// across runs — the file/tier-granularity analogue of a per-device csv.
pub fn write_occupancy_csv(output_dir: &Path, rows: &[(String, Tier)]) -> Result<(), SimError> {
    fs::create_dir_all(output_dir)?;
    let file = File::create(output_dir.join("occupancy.csv"))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer.write_record([
        "policy",
        "tier",
        "max_size",
        "used_size",
        "number_of_reads",
        "number_of_write",
        "number_of_eviction_from_this_tier",
        "number_of_eviction_to_this_tier",
        "number_of_prefetching_from_this_tier",
        "number_of_prefetching_to_this_tier",
        "time_spent_reading",
        "time_spent_writing",
    ])?;
    for (policy_label, tier) in rows {
        let c = &tier.counters;
        writer.write_record([
            policy_label.clone(),
            tier.name.clone(),
            tier.max_size.to_string(),
            tier.used_size.to_string(),
            c.number_of_reads.to_string(),
            c.number_of_write.to_string(),
            c.number_of_eviction_from_this_tier.to_string(),
            c.number_of_eviction_to_this_tier.to_string(),
            c.number_of_prefetching_from_this_tier.to_string(),
            c.number_of_prefetching_to_this_tier.to_string(),
            c.time_spent_reading.to_string(),
            c.time_spent_writing.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Short colored stdout summary, printed in addition to the full report.
pub fn print_summary(policy_label: &str, tiers: &[Tier]) {
    println!("{}", format!("== {policy_label} ==").bold());
    for tier in tiers {
        let occupancy = tier.used_size as f64 / tier.max_size.max(1) as f64;
        let line = format!(
            "  {:<10} {:>6.1}% full  reads={} writes={}",
            tier.name,
            occupancy * 100.0,
            tier.counters.number_of_reads,
            tier.counters.number_of_write,
        );
        if occupancy >= tier.target_occupation {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
}
