use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::device::{DeviceProbe, SysinfoProbe};
use crate::error::Result;
use crate::files::{FileOps, LiveFileOps, NullFileOps};
use crate::model::{DeviceSnapshot, OpAction, OpFailure, SyncReport, SyncStrategy};
use crate::scan::Scanner;
use crate::select::{keep_media, select_media};
use crate::sync::{plan_sync, run_mixed, run_sequential};

/// How much device space must stay unused once the run is done.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FreeTarget {
    /// Leave free space where it currently is (the default).
    #[default]
    Current,
    /// Percentage of total device capacity.
    Percent(f64),
    /// Absolute byte count.
    Bytes(u64),
}

impl FreeTarget {
    pub fn resolve(&self, device: &DeviceSnapshot) -> u64 {
        match *self {
            FreeTarget::Current => device.free_bytes,
            FreeTarget::Percent(percent) => (device.total_bytes as f64 * percent / 100.0) as u64,
            FreeTarget::Bytes(bytes) => bytes,
        }
    }
}

/// How many currently-resident destination items to protect from eviction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeepTarget {
    /// Absolute number of items.
    Count(u64),
    /// Percentage of the destination's item count, truncated.
    Percent(f64),
}

impl Default for KeepTarget {
    fn default() -> Self {
        KeepTarget::Count(0)
    }
}

impl KeepTarget {
    pub fn resolve(&self, destination_items: usize) -> usize {
        match *self {
            KeepTarget::Count(count) => count as usize,
            KeepTarget::Percent(percent) => (destination_items as f64 * percent / 100.0) as usize,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub src_dir: PathBuf,
    pub dst_dir: PathBuf,
    pub target_free: FreeTarget,
    pub keep: KeepTarget,
    pub ignore: Vec<PathBuf>,
    pub forced_albums: Vec<PathBuf>,
    pub not_albums: Vec<PathBuf>,
    pub dry_run: bool,
    /// Physically delete destination units absent from the source. They are
    /// excluded from the logical catalog either way.
    pub delete_dst_only: bool,
    /// Use the interleaved, free-space-driven strategy instead of
    /// delete-then-copy.
    pub mixed: bool,
    /// Fixed seed for reproducible selection.
    pub seed: Option<u64>,
}

impl SyncOptions {
    pub fn new(src_dir: impl Into<PathBuf>, dst_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
            dst_dir: dst_dir.into(),
            target_free: FreeTarget::default(),
            keep: KeepTarget::default(),
            ignore: Vec::new(),
            forced_albums: Vec::new(),
            not_albums: Vec::new(),
            dry_run: false,
            delete_dst_only: false,
            mixed: false,
            seed: None,
        }
    }
}

/// Runs the full pipeline against the real filesystem (or with no-op
/// delete/copy when `dry_run` is set — the printed decisions are identical).
pub fn run_sync(options: &SyncOptions) -> Result<SyncReport> {
    if options.dry_run {
        run_sync_with(options, &NullFileOps, &SysinfoProbe)
    } else {
        run_sync_with(options, &LiveFileOps, &SysinfoProbe)
    }
}

/// Same pipeline with injectable filesystem capabilities and device probe.
pub fn run_sync_with(
    options: &SyncOptions,
    ops: &dyn FileOps,
    probe: &dyn DeviceProbe,
) -> Result<SyncReport> {
    let scanner = Scanner::new(&options.ignore, &options.forced_albums, &options.not_albums);

    info!("scanning source: {}", options.src_dir.display());
    let mut src = scanner.scan(&options.src_dir)?;
    info!("{} item(s) found, {} byte(s)", src.len(), src.total_size());

    info!("scanning destination: {}", options.dst_dir.display());
    let mut dst = scanner.scan(&options.dst_dir)?;
    info!("{} item(s) found, {} byte(s)", dst.len(), dst.total_size());

    let source_items = src.len();
    let source_bytes = src.total_size();
    let destination_items = dst.len();
    let destination_bytes = dst.total_size();

    let mut failures: Vec<OpFailure> = Vec::new();

    // Destination-only units leave the logical catalog either way; only
    // their files' fate depends on the flag.
    let orphans = dst.partition(&src);
    if !orphans.is_empty() {
        if options.delete_dst_only {
            info!(
                "deleting {} destination item(s) not present in the source:",
                orphans.len()
            );
        } else {
            info!(
                "ignoring {} destination item(s) not present in the source:",
                orphans.len()
            );
        }
        for path in orphans.sorted_paths() {
            info!("  {}", path.display());
            if options.delete_dst_only {
                if let Some(unit) = orphans.get(&path) {
                    if let Err(err) = ops.delete(&options.dst_dir, unit) {
                        warn!("delete failed for {}: {:#}", path.display(), err);
                        failures.push(OpFailure {
                            action: OpAction::Delete,
                            path: path.to_string_lossy().to_string(),
                            error: format!("{err:#}"),
                        });
                    }
                }
            }
        }
    }
    let orphan_paths: Vec<String> = orphans
        .sorted_paths()
        .iter()
        .map(|path| path.to_string_lossy().to_string())
        .collect();

    let device_before = probe.snapshot(&options.dst_dir)?;
    info!(
        "destination device: {} byte(s) total, {} byte(s) free",
        device_before.total_bytes, device_before.free_bytes
    );

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let keep_count = options.keep.resolve(dst.len());
    let kept = keep_media(&mut src, &mut dst, keep_count, &mut rng);

    // Byte budget for new material: what the tracked residents occupy plus
    // whatever free space may be consumed before hitting the reserve.
    let device_free_target = options.target_free.resolve(&device_before);
    let target_bytes = dst
        .total_size()
        .saturating_add(device_before.free_bytes)
        .saturating_sub(device_free_target);

    let selected = select_media(&mut src, target_bytes, &mut rng);
    let selected_items = selected.len();
    let selected_bytes = selected.total_size();

    let plan = plan_sync(selected, &mut dst);
    let deleted_items = plan.delete_set.len();
    let deleted_bytes = plan.delete_set.total_size();
    let copied_items = plan.copy_set.len();
    let copied_bytes = plan.copy_set.total_size();

    let strategy = if options.mixed {
        SyncStrategy::Mixed
    } else {
        SyncStrategy::Sequential
    };
    match strategy {
        SyncStrategy::Sequential => {
            failures.extend(run_sequential(
                plan,
                &options.src_dir,
                &options.dst_dir,
                ops,
            ));
        }
        SyncStrategy::Mixed => {
            failures.extend(run_mixed(
                plan,
                &options.src_dir,
                &options.dst_dir,
                device_free_target,
                ops,
                probe,
            )?);
        }
    }

    let device_after = probe.snapshot(&options.dst_dir)?;

    let destination_media_bytes = dst
        .total_size()
        .saturating_add(kept.total_size())
        .saturating_add(copied_bytes);

    Ok(SyncReport {
        strategy,
        dry_run: options.dry_run,
        source_items,
        source_bytes,
        destination_items,
        destination_bytes,
        orphans: orphan_paths,
        orphan_bytes: orphans.total_size(),
        orphans_deleted: options.delete_dst_only,
        keep_count,
        kept_items: kept.len(),
        kept_bytes: kept.total_size(),
        target_bytes,
        selected_items,
        selected_bytes,
        deleted_items,
        deleted_bytes,
        copied_items,
        copied_bytes,
        destination_media_bytes,
        device_before,
        device_after,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::{FreeTarget, KeepTarget};
    use crate::model::DeviceSnapshot;

    #[test]
    fn free_target_resolution() {
        let device = DeviceSnapshot {
            total_bytes: 10_000,
            free_bytes: 2_500,
        };
        assert_eq!(FreeTarget::Current.resolve(&device), 2_500);
        assert_eq!(FreeTarget::Percent(50.0).resolve(&device), 5_000);
        assert_eq!(FreeTarget::Percent(25.7).resolve(&device), 2_570);
        assert_eq!(FreeTarget::Bytes(123).resolve(&device), 123);
    }

    #[test]
    fn keep_target_resolution_truncates_percentages() {
        assert_eq!(KeepTarget::Count(3).resolve(10), 3);
        assert_eq!(KeepTarget::Percent(50.0).resolve(10), 5);
        assert_eq!(KeepTarget::Percent(50.0).resolve(7), 3);
        assert_eq!(KeepTarget::Percent(0.0).resolve(10), 0);
    }
}
