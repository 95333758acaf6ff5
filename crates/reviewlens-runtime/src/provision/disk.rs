//! Free-space lookup via `sysinfo`.

use std::path::Path;

use reviewlens_core::ports::DiskSpaceProbe;
use sysinfo::Disks;

/// [`DiskSpaceProbe`] that picks the disk with the longest mount point
/// containing the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoDiskProbe;

impl DiskSpaceProbe for SysinfoDiskProbe {
    fn available_bytes(&self, path: &Path) -> Option<u64> {
        // The target may not exist yet; measure its closest existing ancestor.
        let existing = path.ancestors().find(|p| p.exists())?;
        let target = existing.canonicalize().unwrap_or_else(|_| existing.to_path_buf());

        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(sysinfo::Disk::available_space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_probe_handles_missing_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not").join("yet");
        // Containers may hide mounts; only the shape of the answer is checked.
        let direct = SysinfoDiskProbe.available_bytes(dir.path());
        assert_eq!(SysinfoDiskProbe.available_bytes(&missing).is_some(), direct.is_some());
    }
}
