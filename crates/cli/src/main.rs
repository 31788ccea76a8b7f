use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rmsync_core::{run_sync, FreeTarget, KeepTarget, OpAction, SyncOptions, SyncReport};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "rmsync",
    version,
    about = "Randomly fill a size-constrained destination with media from a larger source library."
)]
struct Cli {
    /// The source media directory.
    #[arg(short = 's', long = "source", value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// The destination media directory.
    #[arg(short = 'd', long = "dest", value_name = "DESTINATION")]
    dest: Option<PathBuf>,

    /// Positional form: [SOURCE] DESTINATION. Takes precedence over the
    /// flags above.
    #[arg(value_name = "DIR", num_args = 0..=2)]
    dirs: Vec<PathBuf>,

    /// Minimum amount of space left unused in the destination device. A
    /// percentage ("50%", "25.7%") or a byte size ("1gb", "2.5GiB", "567").
    /// Default: the current free space.
    #[arg(short = 'f', long, value_name = "FREE")]
    free: Option<String>,

    /// Minimum number of items currently in the destination that will be
    /// kept. A percentage or an absolute count. Default: 0.
    #[arg(short = 'k', long, value_name = "KEEP")]
    keep: Option<String>,

    /// Ignore an item (repeatable).
    #[arg(long = "ignore", value_name = "ITEM-PATH")]
    ignore: Vec<PathBuf>,

    /// Force a directory item to be treated as an album (repeatable).
    #[arg(long = "is-album", value_name = "DIR-PATH")]
    is_album: Vec<PathBuf>,

    /// Force a directory item to not be treated as an album (repeatable).
    #[arg(long = "is-not-album", value_name = "DIR-PATH")]
    is_not_album: Vec<PathBuf>,

    /// Configuration file.
    #[arg(short = 'c', long = "cfg", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Do not delete or copy anything.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Delete media found in the destination which are not in the source.
    /// ARE YOU SURE YOU WANT TO DO THIS?!
    #[arg(long)]
    delete_in_dst_only: bool,

    /// Interleave deletes with copies, driven by live free-space checks,
    /// instead of deleting everything up front.
    #[arg(long)]
    mixed: bool,

    /// Fixed seed for reproducible selection.
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Optional JSON report output file.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let mut cli = Cli::parse();

    let mut dirs = std::mem::take(&mut cli.dirs);
    if let Some(dest) = dirs.pop() {
        cli.dest = Some(dest);
    }
    if let Some(source) = dirs.pop() {
        cli.source = Some(source);
    }

    if let Some(config_file) = cli.config_file.clone() {
        apply_config_file(&config_file, &mut cli)
            .with_context(|| format!("in config file {}", config_file.display()))?;
    }

    let Some(dst_dir) = cli.dest.clone() else {
        bail!("DESTINATION not specified");
    };
    let Some(src_dir) = cli.source.clone() else {
        bail!("SOURCE not specified");
    };

    let options = SyncOptions {
        src_dir,
        dst_dir,
        target_free: match &cli.free {
            Some(value) => parse_free(value)?,
            None => FreeTarget::Current,
        },
        keep: match &cli.keep {
            Some(value) => parse_keep(value)?,
            None => KeepTarget::Count(0),
        },
        ignore: cli.ignore.clone(),
        forced_albums: cli.is_album.clone(),
        not_albums: cli.is_not_album.clone(),
        dry_run: cli.dry_run,
        delete_dst_only: cli.delete_in_dst_only,
        mixed: cli.mixed,
        seed: cli.seed,
    };

    let report = run_sync(&options)?;
    print_report(&report);

    if let Some(output) = cli.output {
        let payload =
            serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        fs::write(&output, payload)
            .with_context(|| format!("failed to write report to {}", output.display()))?;
        println!("Report written to {}", output.display());
    }

    if !report.failures.is_empty() {
        for failure in &report.failures {
            let action = match failure.action {
                OpAction::Delete => "delete",
                OpAction::Copy => "copy",
            };
            eprintln!("{action} failed for {}: {}", failure.path, failure.error);
        }
        bail!("{} operation(s) failed", report.failures.len());
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "{} source item(s) in {}",
        report.source_items,
        human_bytes(report.source_bytes)
    );
    println!(
        "{} destination item(s) in {}",
        report.destination_items,
        human_bytes(report.destination_bytes)
    );

    if !report.orphans.is_empty() {
        if report.orphans_deleted {
            println!(
                "Deleted the following items in the destination directory that are not in the source directory:"
            );
        } else {
            println!(
                "The following items in the destination directory were ignored because they are not in the source directory:"
            );
        }
        for path in &report.orphans {
            println!("\t{path}");
        }
        println!("\tTotal: {}", human_bytes(report.orphan_bytes));
    }
    println!();

    let before = &report.device_before;
    println!(
        "Total size of the destination device: {}",
        human_bytes(before.total_bytes)
    );
    let tracked_before = report.destination_bytes.saturating_sub(report.orphan_bytes);
    println!(
        "Media currently in the destination device: {} ({})",
        human_bytes(tracked_before),
        format_percent(tracked_before, before.total_bytes)
    );
    println!(
        "Current free space in the destination device: {} ({})",
        human_bytes(before.free_bytes),
        format_percent(before.free_bytes, before.total_bytes)
    );
    println!();

    println!(
        "Kept {} item(s) in {}; selected {} item(s) in {} against a budget of {}",
        report.kept_items,
        human_bytes(report.kept_bytes),
        report.selected_items,
        human_bytes(report.selected_bytes),
        human_bytes(report.target_bytes)
    );
    println!(
        "Deleted {} item(s) in {}; copied {} item(s) in {}",
        report.deleted_items,
        human_bytes(report.deleted_bytes),
        report.copied_items,
        human_bytes(report.copied_bytes)
    );
    println!();

    let after = &report.device_after;
    println!(
        "Total size of the destination device: {}",
        human_bytes(after.total_bytes)
    );
    println!(
        "Media in the destination device: {} ({})",
        human_bytes(report.destination_media_bytes),
        format_percent(report.destination_media_bytes, after.total_bytes)
    );
    println!(
        "Free space in the destination device: {} ({})",
        human_bytes(after.free_bytes),
        format_percent(after.free_bytes, after.total_bytes)
    );

    if report.dry_run {
        println!();
        println!("Dry run: nothing was deleted or copied.");
    }
}

/// Merges a config file beneath the parsed flags: scalars only fill values
/// the command line left unset, list options append, bare options set their
/// flag. Lines are `option [argument]`; `#` starts a comment.
fn apply_config_file(path: &Path, cli: &mut Cli) -> Result<()> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    for line in data.lines() {
        if line.starts_with('#') {
            continue;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (option, argument) = match line.find(' ') {
            Some(index) => (line[..index].trim(), Some(line[index + 1..].trim())),
            None => (line, None),
        };

        match option {
            "source" => set_scalar(option, argument, &mut cli.source, |s| PathBuf::from(s))?,
            "dest" => set_scalar(option, argument, &mut cli.dest, |s| PathBuf::from(s))?,
            "free" => set_scalar(option, argument, &mut cli.free, str::to_string)?,
            "keep" => set_scalar(option, argument, &mut cli.keep, str::to_string)?,
            "ignore" => cli.ignore.push(require_argument(option, argument)?.into()),
            "is-album" => cli.is_album.push(require_argument(option, argument)?.into()),
            "is-not-album" => cli
                .is_not_album
                .push(require_argument(option, argument)?.into()),
            "dry-run" => set_flag(option, argument, &mut cli.dry_run)?,
            "delete-in-dst-only" => set_flag(option, argument, &mut cli.delete_in_dst_only)?,
            "mixed" => set_flag(option, argument, &mut cli.mixed)?,
            "seed" => {
                if cli.seed.is_none() {
                    let raw = require_argument(option, argument)?;
                    let seed = raw
                        .parse()
                        .with_context(|| format!("invalid seed \"{raw}\""))?;
                    cli.seed = Some(seed);
                }
            }
            other => bail!("\"{other}\" is not a valid config file option"),
        }
    }
    Ok(())
}

fn require_argument<'a>(option: &str, argument: Option<&'a str>) -> Result<&'a str> {
    match argument {
        Some(argument) if !argument.is_empty() => Ok(argument),
        _ => bail!("option \"{option}\" requires an argument"),
    }
}

fn set_scalar<T>(
    option: &str,
    argument: Option<&str>,
    slot: &mut Option<T>,
    convert: impl FnOnce(&str) -> T,
) -> Result<()> {
    let argument = require_argument(option, argument)?;
    if slot.is_none() {
        *slot = Some(convert(argument));
    }
    Ok(())
}

fn set_flag(option: &str, argument: Option<&str>, slot: &mut bool) -> Result<()> {
    if argument.is_some() {
        bail!("option \"{option}\" does not take an argument");
    }
    *slot = true;
    Ok(())
}

/// A free-space target is a percentage if it parses as one, otherwise a
/// byte size.
fn parse_free(value: &str) -> Result<FreeTarget> {
    if let Some(percent) = parse_percent(value) {
        return Ok(FreeTarget::Percent(percent));
    }
    let bytes = parse_byte_size(value)
        .with_context(|| format!("invalid free-space value \"{value}\""))?;
    Ok(FreeTarget::Bytes(bytes))
}

fn parse_keep(value: &str) -> Result<KeepTarget> {
    if let Some(percent) = parse_percent(value) {
        return Ok(KeepTarget::Percent(percent));
    }
    let count = value
        .parse()
        .with_context(|| format!("invalid keep count \"{value}\""))?;
    Ok(KeepTarget::Count(count))
}

fn parse_percent(value: &str) -> Option<f64> {
    let number = value.strip_suffix('%')?;
    number.parse().ok().filter(|percent| *percent >= 0.0)
}

/// Parses "567", "9B", "1023kB", "57.3Mb", "999GiB" and friends. Every
/// multiplier is binary, with or without the "i".
fn parse_byte_size(value: &str) -> Result<u64> {
    const MULTIPLIERS: [(&str, u64); 6] = [
        ("ki", 1 << 10),
        ("k", 1 << 10),
        ("mi", 1 << 20),
        ("m", 1 << 20),
        ("gi", 1 << 30),
        ("g", 1 << 30),
    ];

    let lowered = value.trim().to_ascii_lowercase();
    let without_b = lowered.strip_suffix('b').unwrap_or(&lowered);

    let mut digits = without_b;
    let mut multiplier = 1_u64;
    for (suffix, suffix_multiplier) in MULTIPLIERS {
        if let Some(stripped) = without_b.strip_suffix(suffix) {
            digits = stripped;
            multiplier = suffix_multiplier;
            break;
        }
    }

    if digits.is_empty() || !digits.starts_with(|ch: char| ch.is_ascii_digit()) {
        bail!("not a byte size");
    }
    let number: f64 = digits.parse().context("not a byte size")?;
    Ok((number * multiplier as f64) as u64)
}

fn human_bytes(value: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if value == 0 {
        return "0 B".to_string();
    }
    let mut size = value as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

fn format_percent(value: u64, out_of: u64) -> String {
    if out_of == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", 100.0 * value as f64 / out_of as f64)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
