use crate::models::filesystem::{Partition, Usage};
use anyhow::{Context, Result};
use std::collections::HashSet;

/// Where mounted filesystems and their usage come from.
pub trait DiskSource {
    /// Mounted filesystems, in mount table order. Pseudo filesystems are
    /// only returned when `include_pseudo` is set.
    fn partitions(&self, include_pseudo: bool) -> Result<Vec<Partition>>;

    /// Usage figures for one mount point.
    fn usage(&self, mountpoint: &str) -> Result<Usage>;
}

/// Reads the kernel mount table and calls `statvfs` per mount point.
pub struct ProcMounts {
    mounts_path:      &'static str,
    filesystems_path: &'static str,
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self {
            mounts_path:      "/proc/self/mounts",
            filesystems_path: "/proc/filesystems",
        }
    }
}

impl DiskSource for ProcMounts {
    fn partitions(&self, include_pseudo: bool) -> Result<Vec<Partition>> {
        let content = std::fs::read_to_string(self.mounts_path)
            .with_context(|| format!("reading {}", self.mounts_path))?;
        let mounts = parse_mounts(&content);
        if include_pseudo {
            return Ok(mounts);
        }

        let text = std::fs::read_to_string(self.filesystems_path)
            .with_context(|| format!("reading {}", self.filesystems_path))?;
        Ok(retain_physical(mounts, &text))
    }

    fn usage(&self, mountpoint: &str) -> Result<Usage> {
        use nix::sys::statvfs::statvfs;
        let stat = statvfs(mountpoint)
            .with_context(|| format!("statvfs {}", mountpoint))?;

        let frsize = stat.fragment_size() as u64;
        Ok(usage_from_blocks(
            stat.blocks() as u64,
            stat.blocks_free() as u64,
            stat.blocks_available() as u64,
            frsize,
        ))
    }
}

/// `used` counts every allocated block while `free` only counts what an
/// unprivileged user may still allocate, so `used + free` excludes reserved blocks.
pub fn usage_from_blocks(blocks: u64, blocks_free: u64, blocks_avail: u64, frsize: u64) -> Usage {
    let total_bytes = blocks * frsize;
    let free_bytes  = blocks_avail * frsize;
    let used_bytes  = blocks.saturating_sub(blocks_free) * frsize;

    let denom = used_bytes as f64 + free_bytes as f64;
    let used_percent = if denom == 0.0 { 0.0 } else { used_bytes as f64 / denom * 100.0 };

    Usage { total_bytes, used_bytes, free_bytes, used_percent }
}

pub fn parse_mounts(content: &str) -> Vec<Partition> {
    let mut v = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 { continue; }
        v.push(Partition {
            device:     unescape_octal(fields[0]),
            mountpoint: unescape_octal(fields[1]),
            fs_type:    fields[2].to_string(),
            opts:       fields[3].split(',').map(str::to_string).collect(),
        });
    }
    v
}

/// Drop pseudo filesystems: devices named "none" and nodev types.
pub fn retain_physical(mounts: Vec<Partition>, filesystems: &str) -> Vec<Partition> {
    let physical = physical_fs_types(filesystems);
    mounts.into_iter()
        .filter(|p| p.device != "none" && physical.contains(p.fs_type.as_str()))
        .collect()
}

/// Filesystem types backed by a block device, i.e. those without "nodev".
pub fn physical_fs_types(content: &str) -> HashSet<&str> {
    let mut set = HashSet::new();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("nodev"), _)   => {}
            (Some(name), None)   => { set.insert(name); }
            _                    => {}
        }
    }
    // zfs is registered as nodev but holds real data
    set.insert("zfs");
    set
}

/// The mount table escapes space, tab, newline and backslash as `\ooo`.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b)) {
            let code = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(b) = u8::try_from(code) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
