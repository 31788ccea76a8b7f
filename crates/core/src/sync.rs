use std::path::Path;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::device::DeviceProbe;
use crate::error::Result;
use crate::files::FileOps;
use crate::model::{OpAction, OpFailure};

/// The reconciliation derived from a selection and the destination's
/// current residents.
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Destination units no longer wanted.
    pub delete_set: Catalog,
    /// Selected units not yet physically present.
    pub copy_set: Catalog,
}

/// Diffs the selection against the destination catalog.
///
/// Afterwards `dst` holds the resident intersection — units that stay put
/// and count toward the destination's final media size. The selection's
/// already-resident remainder needs no transfer and is dropped.
pub fn plan_sync(mut selected: Catalog, dst: &mut Catalog) -> SyncPlan {
    let delete_set = dst.partition(&selected);
    let copy_set = selected.partition(dst);
    SyncPlan {
        delete_set,
        copy_set,
    }
}

fn record_failure(
    failures: &mut Vec<OpFailure>,
    action: OpAction,
    path: &Path,
    error: &anyhow::Error,
) {
    warn!("{:?} failed for {}: {:#}", action, path.display(), error);
    failures.push(OpFailure {
        action,
        path: path.to_string_lossy().to_string(),
        error: format!("{error:#}"),
    });
}

/// Delete-then-copy execution, both batches in case-insensitive path order.
/// Failures are per-unit: one bad item never blocks the rest.
pub fn run_sequential(
    plan: SyncPlan,
    src_dir: &Path,
    dst_dir: &Path,
    ops: &dyn FileOps,
) -> Vec<OpFailure> {
    let mut failures = Vec::new();

    let delete_paths = plan.delete_set.sorted_paths();
    let delete_total = delete_paths.len();
    if delete_total > 0 {
        info!(
            "deleting {} unit(s), {} byte(s)",
            delete_total,
            plan.delete_set.total_size()
        );
    }
    for (index, path) in delete_paths.iter().enumerate() {
        let Some(unit) = plan.delete_set.get(path) else {
            continue;
        };
        info!("deleting ({}/{}): {}", index + 1, delete_total, path.display());
        if let Err(err) = ops.delete(dst_dir, unit) {
            record_failure(&mut failures, OpAction::Delete, path, &err);
        }
    }

    let copy_paths = plan.copy_set.sorted_paths();
    let copy_total = copy_paths.len();
    if copy_total > 0 {
        info!(
            "copying {} unit(s), {} byte(s)",
            copy_total,
            plan.copy_set.total_size()
        );
    }
    for (index, path) in copy_paths.iter().enumerate() {
        let Some(unit) = plan.copy_set.get(path) else {
            continue;
        };
        info!("copying ({}/{}): {}", index + 1, copy_total, path.display());
        if let Err(err) = ops.copy(src_dir, dst_dir, unit) {
            record_failure(&mut failures, OpAction::Copy, path, &err);
        }
    }

    failures
}

/// Interleaved execution driven by live free space.
///
/// Deletion is deferred until a copy actually needs the room: before each
/// copy the device is re-polled, and victims are evicted one at a time only
/// while `free − incoming < reserved_free_bytes`. Polling real free space
/// (instead of trusting the logical catalog) keeps the strategy immune to
/// drift from orphans left on disk. Victims that survive the copy pass are
/// deleted unconditionally at the end.
pub fn run_mixed(
    mut plan: SyncPlan,
    src_dir: &Path,
    dst_dir: &Path,
    reserved_free_bytes: u64,
    ops: &dyn FileOps,
    probe: &dyn DeviceProbe,
) -> Result<Vec<OpFailure>> {
    let mut failures = Vec::new();

    let copy_paths = plan.copy_set.sorted_paths();
    let copy_total = copy_paths.len();
    for (index, path) in copy_paths.iter().enumerate() {
        let Some(unit) = plan.copy_set.get(path).cloned() else {
            continue;
        };

        loop {
            let snapshot = probe.snapshot(dst_dir)?;
            if snapshot.free_bytes >= unit.size_bytes.saturating_add(reserved_free_bytes) {
                break;
            }
            let Some(victim_path) = plan.delete_set.any_path() else {
                // Out of victims; attempt the copy against whatever space
                // is really there.
                break;
            };
            let Some(victim) = plan.delete_set.remove(&victim_path) else {
                break;
            };
            info!("deleting to free space: {}", victim.path.display());
            if let Err(err) = ops.delete(dst_dir, &victim) {
                record_failure(&mut failures, OpAction::Delete, &victim.path, &err);
            }
        }

        info!("copying ({}/{}): {}", index + 1, copy_total, path.display());
        if let Err(err) = ops.copy(src_dir, dst_dir, &unit) {
            record_failure(&mut failures, OpAction::Copy, path, &err);
        }
    }

    for path in plan.delete_set.sorted_paths() {
        let Some(unit) = plan.delete_set.remove(&path) else {
            continue;
        };
        info!("deleting: {}", unit.path.display());
        if let Err(err) = ops.delete(dst_dir, &unit) {
            record_failure(&mut failures, OpAction::Delete, &unit.path, &err);
        }
    }

    Ok(failures)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use super::{plan_sync, run_mixed, run_sequential};
    use crate::catalog::Catalog;
    use crate::device::DeviceProbe;
    use crate::error::Result;
    use crate::files::FileOps;
    use crate::model::{DeviceSnapshot, MediaUnit, OpAction};

    fn catalog(entries: &[(&str, u64)]) -> Catalog {
        entries
            .iter()
            .map(|(path, size)| MediaUnit::file(*path, *size))
            .collect()
    }

    /// Records operations and mirrors their effect on a simulated free-space
    /// counter, so the mixed strategy's polls see deletions land.
    struct SimOps {
        log: RefCell<Vec<(OpAction, PathBuf)>>,
        free: Rc<Cell<u64>>,
    }

    impl SimOps {
        fn new(free: Rc<Cell<u64>>) -> Self {
            Self {
                log: RefCell::new(Vec::new()),
                free,
            }
        }
    }

    impl FileOps for SimOps {
        fn delete(&self, _base: &Path, unit: &MediaUnit) -> anyhow::Result<()> {
            self.log
                .borrow_mut()
                .push((OpAction::Delete, unit.path.clone()));
            self.free.set(self.free.get() + unit.size_bytes);
            Ok(())
        }

        fn copy(&self, _src: &Path, _dst: &Path, unit: &MediaUnit) -> anyhow::Result<()> {
            self.log
                .borrow_mut()
                .push((OpAction::Copy, unit.path.clone()));
            self.free
                .set(self.free.get().saturating_sub(unit.size_bytes));
            Ok(())
        }
    }

    struct SimProbe {
        total: u64,
        free: Rc<Cell<u64>>,
    }

    impl DeviceProbe for SimProbe {
        fn snapshot(&self, _path: &Path) -> Result<DeviceSnapshot> {
            Ok(DeviceSnapshot {
                total_bytes: self.total,
                free_bytes: self.free.get(),
            })
        }
    }

    #[test]
    fn plan_derives_delete_and_copy_sets() {
        let selected = catalog(&[("stay.mp3", 1), ("new.mp3", 2)]);
        let mut dst = catalog(&[("stay.mp3", 1), ("old.mp3", 3)]);

        let plan = plan_sync(selected, &mut dst);

        assert_eq!(plan.delete_set.len(), 1);
        assert!(plan.delete_set.contains(Path::new("old.mp3")));
        assert_eq!(plan.copy_set.len(), 1);
        assert!(plan.copy_set.contains(Path::new("new.mp3")));
        // The resident intersection stays behind in dst.
        assert_eq!(dst.len(), 1);
        assert!(dst.contains(Path::new("stay.mp3")));
    }

    #[test]
    fn sequential_deletes_everything_before_copying_in_order() {
        let free = Rc::new(Cell::new(u64::MAX / 2));
        let ops = SimOps::new(free);
        let plan = plan_sync(
            catalog(&[("b.mp3", 1), ("A.mp3", 1)]),
            &mut catalog(&[("z.mp3", 1), ("Y.mp3", 1)]),
        );

        let failures = run_sequential(plan, Path::new("src"), Path::new("dst"), &ops);

        assert!(failures.is_empty());
        let log = ops.log.into_inner();
        let expected: Vec<(OpAction, PathBuf)> = vec![
            (OpAction::Delete, "Y.mp3".into()),
            (OpAction::Delete, "z.mp3".into()),
            (OpAction::Copy, "A.mp3".into()),
            (OpAction::Copy, "b.mp3".into()),
        ];
        assert_eq!(log, expected);
    }

    #[test]
    fn mixed_evicts_a_victim_before_a_copy_that_needs_room() {
        let free = Rc::new(Cell::new(100));
        let ops = SimOps::new(free.clone());
        let probe = SimProbe { total: 1_000, free };

        let mut plan = super::SyncPlan::default();
        plan.delete_set.insert(MediaUnit::file("victim.mp3", 100));
        plan.copy_set.insert(MediaUnit::file("incoming.mp3", 80));

        // 100 free < 80 incoming + 80 reserve, so the victim goes first.
        let failures = run_mixed(plan, Path::new("src"), Path::new("dst"), 80, &ops, &probe)
            .unwrap();

        assert!(failures.is_empty());
        let log = ops.log.into_inner();
        let expected: Vec<(OpAction, PathBuf)> = vec![
            (OpAction::Delete, "victim.mp3".into()),
            (OpAction::Copy, "incoming.mp3".into()),
        ];
        assert_eq!(log, expected);
    }

    #[test]
    fn mixed_still_attempts_the_copy_when_victims_run_out() {
        let free = Rc::new(Cell::new(20));
        let ops = SimOps::new(free.clone());
        let probe = SimProbe { total: 1_000, free };

        let mut plan = super::SyncPlan::default();
        plan.copy_set.insert(MediaUnit::file("incoming.mp3", 80));

        let failures = run_mixed(plan, Path::new("src"), Path::new("dst"), 80, &ops, &probe)
            .unwrap();

        assert!(failures.is_empty());
        let log = ops.log.into_inner();
        assert_eq!(log, vec![(OpAction::Copy, PathBuf::from("incoming.mp3"))]);
    }

    #[test]
    fn mixed_leaves_victims_alone_when_there_is_headroom_then_drains_them() {
        let free = Rc::new(Cell::new(10_000));
        let ops = SimOps::new(free.clone());
        let probe = SimProbe { total: 100_000, free };

        let mut plan = super::SyncPlan::default();
        plan.delete_set.insert(MediaUnit::file("doomed.mp3", 50));
        plan.copy_set.insert(MediaUnit::file("incoming.mp3", 80));

        let failures = run_mixed(plan, Path::new("src"), Path::new("dst"), 100, &ops, &probe)
            .unwrap();

        assert!(failures.is_empty());
        let log = ops.log.into_inner();
        // Plenty of room: the copy runs first, the leftover victim is
        // drained afterwards.
        let expected: Vec<(OpAction, PathBuf)> = vec![
            (OpAction::Copy, "incoming.mp3".into()),
            (OpAction::Delete, "doomed.mp3".into()),
        ];
        assert_eq!(log, expected);
    }

    /// Ops that fail every delete, to show failures don't block the batch.
    struct FailingDeletes {
        log: RefCell<Vec<(OpAction, PathBuf)>>,
    }

    impl FileOps for FailingDeletes {
        fn delete(&self, _base: &Path, _unit: &MediaUnit) -> anyhow::Result<()> {
            anyhow::bail!("permission denied")
        }

        fn copy(&self, _src: &Path, _dst: &Path, unit: &MediaUnit) -> anyhow::Result<()> {
            self.log
                .borrow_mut()
                .push((OpAction::Copy, unit.path.clone()));
            Ok(())
        }
    }

    #[test]
    fn sequential_collects_failures_and_keeps_going() {
        let ops = FailingDeletes {
            log: RefCell::new(Vec::new()),
        };
        let plan = plan_sync(
            catalog(&[("new.mp3", 1)]),
            &mut catalog(&[("old1.mp3", 1), ("old2.mp3", 1)]),
        );

        let failures = run_sequential(plan, Path::new("src"), Path::new("dst"), &ops);

        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.action == OpAction::Delete));
        assert!(failures.iter().all(|f| f.error.contains("permission denied")));
        // The copy still happened.
        assert_eq!(ops.log.into_inner().len(), 1);
    }
}
