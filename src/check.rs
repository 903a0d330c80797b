use crate::collectors::filesystem::DiskSource;
use crate::config::CheckConfig;
use crate::metrics::MetricSet;
use crate::models::filesystem::FilesystemRecord;
use crate::status::Status;
use crate::util::report;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::io::Write;

pub const CHECK_NAME: &str = "check-disk-usage";

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunVerdict {
    pub checked:   usize,
    pub criticals: usize,
    pub warnings:  usize,
}

impl RunVerdict {
    /// Classify one filesystem and count it.
    pub fn record(&mut self, used_percent: f64, warning: f64, critical: f64) -> Status {
        let status = classify(used_percent, warning, critical);
        self.checked += 1;
        match status {
            Status::Critical => self.criticals += 1,
            Status::Warning  => self.warnings += 1,
            _                => {}
        }
        status
    }

    pub fn status(&self) -> Status {
        if self.criticals > 0 {
            Status::Critical
        } else if self.warnings > 0 {
            Status::Warning
        } else {
            Status::Ok
        }
    }
}

/// Critical wins when both levels are reached.
pub fn classify(used_percent: f64, warning: f64, critical: f64) -> Status {
    if used_percent >= critical {
        Status::Critical
    } else if used_percent >= warning {
        Status::Warning
    } else {
        Status::Ok
    }
}

/// Evaluate every eligible filesystem from `source`, streaming report lines
/// (or, in metrics mode, the rendered samples) to `out`.
///
/// `Err` always means the run is CRITICAL. Lines already written stay written.
pub fn execute_check<W: Write>(
    cfg:              &CheckConfig,
    source:           &dyn DiskSource,
    out:              &mut W,
    timestamp_millis: i64,
) -> Result<RunVerdict> {
    let mut verdict = RunVerdict::default();
    let mut metrics = cfg.metrics.then(|| MetricSet::new(&cfg.tags, timestamp_millis));

    let parts = source.partitions(cfg.filters.include_pseudo)
        .context("Failed to get partitions")?;

    for part in &parts {
        if !cfg.filters.admits(part) {
            debug!("skipping {} ({}, {})", part.mountpoint, part.fs_type, part.opts.join(","));
            continue;
        }

        let usage = match source.usage(&part.mountpoint) {
            Ok(u) => u,
            Err(e) if cfg.fail_on_error => {
                return Err(e.context(format!("Failed to get disk usage for {}", part.mountpoint)));
            }
            Err(e) => {
                warn!("could not read usage of {}: {:#}", part.mountpoint, e);
                if metrics.is_none() {
                    writeln!(out, "{}", report::unknown_line(CHECK_NAME, &part.mountpoint, &e))?;
                }
                continue;
            }
        };

        let rec = FilesystemRecord::new(part, usage);
        if !cfg.filters.is_eligible(&rec) {
            debug!("skipping empty filesystem {}", rec.mountpoint);
            continue;
        }

        let (warning, critical) = cfg.thresholds.levels(rec.total_bytes);
        if warning != cfg.thresholds.warning || critical != cfg.thresholds.critical {
            debug!("{}: levels adjusted to warning {:.2}%, critical {:.2}%", rec.mountpoint, warning, critical);
        }
        let status = verdict.record(rec.used_percent, warning, critical);

        match metrics.as_mut() {
            Some(set) => set.add_filesystem(&rec, status),
            None => writeln!(out, "{}", report::filesystem_line(CHECK_NAME, status, &rec, cfg.human_readable))?,
        }
    }

    if let Some(mut set) = metrics {
        set.add_totals(verdict.criticals, verdict.warnings);
        out.write_all(set.render(cfg.metrics_format)?.as_bytes())?;
    }
    out.flush()?;

    Ok(verdict)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::parse_tags;
    use crate::filter::ListFilter;
    use crate::metrics::MetricsFormat;
    use crate::models::filesystem::{Partition, Usage};
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    const GIB: u64 = 1_073_741_824;
    const TS: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct FakeSource {
        parts:        Vec<Partition>,
        usage:        HashMap<String, Usage>,
        fail_listing: bool,
        measured:     RefCell<Vec<String>>,
        pseudo_asked: Cell<Option<bool>>,
    }

    impl FakeSource {
        fn with(mut self, mount: &str, fs_type: &str, opts: &str, total: u64, pct: f64) -> Self {
            self.parts.push(Partition {
                device:     format!("/dev/{}", self.parts.len()),
                mountpoint: mount.into(),
                fs_type:    fs_type.into(),
                opts:       opts.split(',').map(str::to_string).collect(),
            });
            let used = (total as f64 * pct / 100.0) as u64;
            self.usage.insert(mount.into(), Usage {
                total_bytes:  total,
                used_bytes:   used,
                free_bytes:   total - used,
                used_percent: pct,
            });
            self
        }

        /// A mount whose usage cannot be read.
        fn broken(mut self, mount: &str) -> Self {
            self.parts.push(Partition {
                device:     "/dev/broken".into(),
                mountpoint: mount.into(),
                fs_type:    "ext4".into(),
                opts:       vec!["rw".into()],
            });
            self
        }
    }

    impl DiskSource for FakeSource {
        fn partitions(&self, include_pseudo: bool) -> Result<Vec<Partition>> {
            self.pseudo_asked.set(Some(include_pseudo));
            if self.fail_listing {
                return Err(anyhow!("no mount table"));
            }
            Ok(self.parts.clone())
        }

        fn usage(&self, mountpoint: &str) -> Result<Usage> {
            self.measured.borrow_mut().push(mountpoint.to_string());
            self.usage.get(mountpoint)
                .copied()
                .ok_or_else(|| anyhow!("permission denied"))
        }
    }

    fn run(cfg: &CheckConfig, source: &FakeSource) -> (Result<RunVerdict>, String) {
        let mut out = Vec::new();
        let res = execute_check(cfg, source, &mut out, TS);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn classify_levels() {
        assert_eq!(classify(95.0, 85.0, 95.0), Status::Critical);
        assert_eq!(classify(85.0, 85.0, 95.0), Status::Warning);
        assert_eq!(classify(84.99, 85.0, 95.0), Status::Ok);
        // critical checked first even with inverted levels
        assert_eq!(classify(90.0, 95.0, 85.0), Status::Critical);
    }

    #[test]
    fn verdict_counts() {
        let mut v = RunVerdict::default();
        assert_eq!(v.status(), Status::Ok);
        assert_eq!(v.record(90.0, 85.0, 95.0), Status::Warning);
        assert_eq!(v.status(), Status::Warning);
        assert_eq!(v.record(10.0, 85.0, 95.0), Status::Ok);
        assert_eq!(v.record(99.0, 85.0, 95.0), Status::Critical);
        assert_eq!(v.status(), Status::Critical);
        assert_eq!(v, RunVerdict { checked: 3, criticals: 1, warnings: 1 });
    }

    #[test]
    fn one_critical_filesystem() {
        let source = FakeSource::default()
            .with("/", "ext4", "rw", 50 * GIB, 96.0)
            .with("/home", "ext4", "rw", 50 * GIB, 50.0);
        let (res, out) = run(&CheckConfig::default(), &source);
        let verdict = res.unwrap();
        assert_eq!(verdict.status(), Status::Critical);
        assert_eq!(verdict.criticals, 1);
        assert_eq!(verdict.warnings, 0);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("check-disk-usage CRITICAL: / 96.00% - Total: 54 GB"), "{}", lines[0]);
        assert!(lines[1].starts_with("check-disk-usage       OK: /home 50.00%"), "{}", lines[1]);
    }

    #[test]
    fn warning_only() {
        let source = FakeSource::default().with("/", "ext4", "rw", 10 * GIB, 90.0);
        let (res, out) = run(&CheckConfig::default(), &source);
        assert_eq!(res.unwrap().status(), Status::Warning);
        assert!(out.contains(" WARNING: / 90.00%"));
    }

    #[test]
    fn metrics_carry_extra_tags() {
        let cfg = CheckConfig {
            metrics: true,
            tags: parse_tags(&["key1=val1".to_string()]).unwrap(),
            ..Default::default()
        };
        let source = FakeSource::default().with("/data", "xfs", "rw", 10 * GIB, 50.0);
        let (res, out) = run(&cfg, &source);
        assert_eq!(res.unwrap().status(), Status::Ok);
        assert!(out.lines().any(|l| l == "disk.percent_used 1700000000 50 key1=val1 mountpoint=/data"), "{}", out);
        assert!(out.lines().any(|l| l == "disk.critical 1700000000 0 key1=val1 mountpoint=all"));
        assert!(!out.contains("check-disk-usage"));
    }

    #[test]
    fn metrics_in_prometheus_format() {
        let cfg = CheckConfig {
            metrics: true,
            metrics_format: MetricsFormat::PrometheusText,
            ..Default::default()
        };
        let source = FakeSource::default()
            .with("/", "ext4", "rw", 10 * GIB, 97.5)
            .with("/srv", "ext4", "rw", 10 * GIB, 88.0);
        let (res, out) = run(&cfg, &source);
        assert_eq!(res.unwrap().status(), Status::Critical);
        assert!(out.contains("disk_critical{mountpoint=\"all\"} 1 1700000000000\n"));
        assert!(out.contains("disk_warning{mountpoint=\"all\"} 1 1700000000000\n"));
        assert!(out.contains("disk_percent_used{mountpoint=\"/srv\"} 88 1700000000000\n"));
    }

    #[test]
    fn unreadable_mount_is_skipped_by_default() {
        let source = FakeSource::default()
            .broken("/secret")
            .with("/", "ext4", "rw", 10 * GIB, 20.0);
        let (res, out) = run(&CheckConfig::default(), &source);
        assert_eq!(res.unwrap().status(), Status::Ok);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "check-disk-usage  UNKNOWN: /secret - error: permission denied");
        assert!(lines[1].contains("      OK: / 20.00%"));
    }

    #[test]
    fn unreadable_mount_is_silent_in_metrics_mode() {
        let cfg = CheckConfig { metrics: true, ..Default::default() };
        let source = FakeSource::default().broken("/secret");
        let (res, out) = run(&cfg, &source);
        assert_eq!(res.unwrap().checked, 0);
        assert!(!out.contains("UNKNOWN"));
    }

    #[test]
    fn unreadable_mount_fails_fast_when_asked() {
        let cfg = CheckConfig { fail_on_error: true, ..Default::default() };
        let source = FakeSource::default()
            .with("/", "ext4", "rw", 10 * GIB, 20.0)
            .broken("/secret")
            .with("/home", "ext4", "rw", 10 * GIB, 20.0);
        let (res, out) = run(&cfg, &source);
        let err = res.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to get disk usage for /secret"));
        // lines already printed stay printed
        assert_eq!(out.lines().count(), 1);
        assert_eq!(*source.measured.borrow(), vec!["/", "/secret"]);
    }

    #[test]
    fn listing_failure_is_an_error() {
        let source = FakeSource { fail_listing: true, ..Default::default() };
        let (res, out) = run(&CheckConfig::default(), &source);
        assert!(res.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn empty_filesystems_are_skipped() {
        let source = FakeSource::default()
            .with("/proc", "proc", "rw", 0, 0.0)
            .with("/", "ext4", "rw", 10 * GIB, 99.0);
        let (res, out) = run(&CheckConfig::default(), &source);
        let verdict = res.unwrap();
        assert_eq!(verdict.checked, 1);
        assert!(!out.contains("/proc"));
    }

    #[test]
    fn filtered_mounts_are_never_measured() {
        let mut cfg = CheckConfig::default();
        cfg.filters.fs_type = ListFilter::new(vec![], vec!["tmpfs".into()]);
        cfg.filters.fs_path = ListFilter::new(vec![], vec!["/boot".into()]);
        let source = FakeSource::default()
            .with("/run", "tmpfs", "rw", 10 * GIB, 99.0)
            .with("/boot", "ext4", "rw", 10 * GIB, 99.0)
            .with("/cdrom", "iso9660", "ro", 10 * GIB, 100.0)
            .with("/", "ext4", "rw", 10 * GIB, 10.0);
        let (res, _) = run(&cfg, &source);
        assert_eq!(res.unwrap().status(), Status::Ok);
        assert_eq!(*source.measured.borrow(), vec!["/"]);

        cfg.filters.include_read_only = true;
        let (res, _) = run(&cfg, &source);
        assert_eq!(res.unwrap().status(), Status::Critical);
    }

    #[test]
    fn include_pseudo_is_passed_to_source() {
        let mut cfg = CheckConfig::default();
        let source = FakeSource::default();
        let _ = run(&cfg, &source);
        assert_eq!(source.pseudo_asked.get(), Some(false));
        cfg.filters.include_pseudo = true;
        let _ = run(&cfg, &source);
        assert_eq!(source.pseudo_asked.get(), Some(true));
    }

    #[test]
    fn large_filesystems_get_adjusted_levels() {
        let mut cfg = CheckConfig::default();
        cfg.thresholds.magic = 0.9;
        // 1000 GiB: warning 85 -> ~89.86, critical 95 -> ~96.62
        let source = FakeSource::default().with("/data", "xfs", "rw", 1000 * GIB, 89.0);
        let (res, _) = run(&cfg, &source);
        assert_eq!(res.unwrap().status(), Status::Ok);

        // below the minimum size nothing changes
        let source = FakeSource::default().with("/small", "xfs", "rw", 50 * GIB, 89.0);
        let (res, _) = run(&cfg, &source);
        assert_eq!(res.unwrap().status(), Status::Warning);
    }

    #[test]
    fn human_readable_uses_binary_units() {
        let cfg = CheckConfig { human_readable: true, ..Default::default() };
        let source = FakeSource::default().with("/", "ext4", "rw", 10 * GIB, 50.0);
        let (_, out) = run(&cfg, &source);
        assert!(out.contains("Total: 10 GiB, Used: 5.0 GiB, Free: 5.0 GiB"), "{}", out);
    }
}
