const SI_SIZES:  [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
const IEC_SIZES: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Format a byte count in powers of 1000: "83 MB"
pub fn fmt_bytes(bytes: u64) -> String {
    humanate(bytes, 1000, &SI_SIZES)
}

/// Format a byte count in powers of 1024: "79 MiB"
pub fn fmt_ibytes(bytes: u64) -> String {
    humanate(bytes, 1024, &IEC_SIZES)
}

/// Pick the formatter for `--human-readable`.
pub fn fmt_size(bytes: u64, binary: bool) -> String {
    if binary { fmt_ibytes(bytes) } else { fmt_bytes(bytes) }
}

fn humanate(bytes: u64, base: u64, sizes: &[&str; 7]) -> String {
    if bytes < 10 {
        return format!("{} B", bytes);
    }
    let mut exp = 0;
    let mut unit: u64 = 1;
    while exp < sizes.len() - 1 {
        match unit.checked_mul(base) {
            Some(next) if bytes >= next => { unit = next; exp += 1; }
            _ => break,
        }
    }
    let val = (bytes as f64 / unit as f64 * 10.0 + 0.5).floor() / 10.0;
    if val < 10.0 {
        format!("{:.1} {}", val, sizes[exp])
    } else {
        format!("{:.0} {}", val, sizes[exp])
    }
}
