use std::path::Path;

use sysinfo::Disks;

use crate::error::{Error, Result};
use crate::model::DeviceSnapshot;

/// Source of live total/free statistics for the device backing a path.
///
/// Capacity decisions always work from a fresh snapshot; the figure is never
/// cached across a decision point. Tests plug in a fake probe here.
pub trait DeviceProbe {
    fn snapshot(&self, path: &Path) -> Result<DeviceSnapshot>;
}

/// Probe backed by the operating system's block statistics. The owning disk
/// is the one whose mount point is the longest prefix of the queried path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoProbe;

impl DeviceProbe for SysinfoProbe {
    fn snapshot(&self, path: &Path) -> Result<DeviceSnapshot> {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let disks = Disks::new_with_refreshed_list();

        let mut best: Option<(&sysinfo::Disk, usize)> = None;
        for disk in disks.list() {
            let mount = disk.mount_point();
            if !resolved.starts_with(mount) {
                continue;
            }
            let score = mount.as_os_str().len();
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((disk, score)),
            }
        }

        let (disk, _) = best.ok_or_else(|| Error::Device {
            path: path.to_path_buf(),
        })?;
        Ok(DeviceSnapshot {
            total_bytes: disk.total_space(),
            free_bytes: disk.available_space(),
        })
    }
}

pub fn get_device_data(path: &Path) -> Result<DeviceSnapshot> {
    SysinfoProbe.snapshot(path)
}

#[cfg(test)]
mod tests {
    use super::get_device_data;

    #[test]
    fn snapshot_of_the_temp_dir_is_coherent() {
        // Not every CI sandbox exposes disk statistics; only check the
        // figures when a disk resolves at all.
        let Ok(snapshot) = get_device_data(&std::env::temp_dir()) else {
            return;
        };
        assert!(snapshot.total_bytes >= snapshot.free_bytes);
        assert_eq!(
            snapshot.used_bytes(),
            snapshot.total_bytes - snapshot.free_bytes
        );
    }
}
