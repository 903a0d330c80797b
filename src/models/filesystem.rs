/// One mounted filesystem as reported by the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device:     String,
    pub mountpoint: String,
    pub fs_type:    String,
    pub opts:       Vec<String>,
}

impl Partition {
    /// "ro" covers Linux, macOS and Windows; mount(8) on macOS reports "read-only".
    pub fn is_read_only(&self) -> bool {
        self.opts.iter().any(|o| o == "ro" || o == "read-only")
    }
}

/// Capacity figures for one mount point.
///
/// `used_percent` is reported by the source rather than derived from the
/// byte counts, since reserved blocks are counted as neither used nor free.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    pub total_bytes:  u64,
    pub used_bytes:   u64,
    pub free_bytes:   u64,
    pub used_percent: f64,
}

/// A partition joined with its usage, the unit the check evaluates.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesystemRecord {
    pub mountpoint:   String,
    pub fs_type:      String,
    pub opts:         Vec<String>,
    pub total_bytes:  u64,
    pub used_bytes:   u64,
    pub free_bytes:   u64,
    pub used_percent: f64,
}

impl FilesystemRecord {
    pub fn new(partition: &Partition, usage: Usage) -> Self {
        Self {
            mountpoint:   partition.mountpoint.clone(),
            fs_type:      partition.fs_type.clone(),
            opts:         partition.opts.clone(),
            total_bytes:  usage.total_bytes,
            used_bytes:   usage.used_bytes,
            free_bytes:   usage.free_bytes,
            used_percent: usage.used_percent,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.opts.iter().any(|o| o == "ro" || o == "read-only")
    }

    /// Empty or virtual mounts carry no usage signal.
    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }
}
