use crate::models::filesystem::FilesystemRecord;
use crate::status::Status;
use crate::util::human::fmt_size;

/// One line per evaluated filesystem:
/// `check-disk-usage  WARNING: /home 87.12% - Total: 20 GB, Used: 17 GB, Free: 2.6 GB`
pub fn filesystem_line(check_name: &str, status: Status, rec: &FilesystemRecord, binary: bool) -> String {
    format!(
        "{} {:>8}: {} {:.2}% - Total: {}, Used: {}, Free: {}",
        check_name,
        status,
        rec.mountpoint,
        rec.used_percent,
        fmt_size(rec.total_bytes, binary),
        fmt_size(rec.used_bytes, binary),
        fmt_size(rec.free_bytes, binary),
    )
}

/// Emitted when a mount's usage could not be read and the run carries on.
pub fn unknown_line(check_name: &str, mountpoint: &str, err: &anyhow::Error) -> String {
    format!("{}  {}: {} - error: {:#}", check_name, Status::Unknown, mountpoint, err)
}
