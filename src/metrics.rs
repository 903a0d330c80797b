//! Metric samples for `--metrics` mode and their wire formats.

use crate::models::filesystem::FilesystemRecord;
use crate::status::Status;
use anyhow::{Context, Result};
use log::debug;
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::BTreeMap;
use std::fmt::Write;

pub type Tags = BTreeMap<String, String>;

pub const MOUNTPOINT_TAG: &str = "mountpoint";
/// Tag value used by the run-level aggregate samples.
pub const ALL_MOUNTS: &str = "all";

/// Variant order is serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MetricKind {
    Critical,
    Warning,
    PercentUsed,
    TotalBytes,
    UsedBytes,
    FreeBytes,
}

impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Critical    => "disk.critical",
            MetricKind::Warning     => "disk.warning",
            MetricKind::PercentUsed => "disk.percent_used",
            MetricKind::TotalBytes  => "disk.total_bytes",
            MetricKind::UsedBytes   => "disk.used_bytes",
            MetricKind::FreeBytes   => "disk.free_bytes",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricKind::Critical    => "critical threshold reached (1 = yes); for mountpoint=all the number of critical filesystems",
            MetricKind::Warning     => "warning threshold reached (1 = yes); for mountpoint=all the number of warning filesystems",
            MetricKind::PercentUsed => "Percentage of disk used",
            MetricKind::TotalBytes  => "Total size of the filesystem in bytes",
            MetricKind::UsedBytes   => "Bytes used on the filesystem",
            MetricKind::FreeBytes   => "Bytes available to unprivileged users",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name:             &'static str,
    pub tags:             Tags,
    pub value:            f64,
    pub timestamp_millis: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsFormat {
    OpenTsdbLine,
    PrometheusText,
}

impl Default for MetricsFormat {
    fn default() -> Self { MetricsFormat::OpenTsdbLine }
}

impl MetricsFormat {
    /// Unknown names fall back to the line format.
    pub fn from_name(name: &str) -> Self {
        match name {
            "opentsdb_line"   => MetricsFormat::OpenTsdbLine,
            "prometheus_text" => MetricsFormat::PrometheusText,
            other => {
                debug!("unknown metrics format {:?}, using opentsdb_line", other);
                MetricsFormat::OpenTsdbLine
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetricsFormat::OpenTsdbLine   => "opentsdb_line",
            MetricsFormat::PrometheusText => "prometheus_text",
        }
    }
}

/// Accumulates samples for one run, grouped by kind.
#[derive(Debug)]
pub struct MetricSet {
    extra_tags:       Tags,
    timestamp_millis: i64,
    samples:          BTreeMap<MetricKind, Vec<MetricSample>>,
}

impl MetricSet {
    pub fn new(extra_tags: &Tags, timestamp_millis: i64) -> Self {
        Self {
            extra_tags: extra_tags.clone(),
            timestamp_millis,
            samples: BTreeMap::new(),
        }
    }

    fn tags_for(&self, mountpoint: &str) -> Tags {
        let mut tags = self.extra_tags.clone();
        tags.insert(MOUNTPOINT_TAG.to_string(), mountpoint.to_string());
        tags
    }

    fn push(&mut self, kind: MetricKind, tags: Tags, value: f64) {
        let sample = MetricSample {
            name: kind.name(),
            tags,
            value,
            timestamp_millis: self.timestamp_millis,
        };
        self.samples.entry(kind).or_default().push(sample);
    }

    /// Record every per-filesystem sample for one evaluated filesystem.
    pub fn add_filesystem(&mut self, rec: &FilesystemRecord, status: Status) {
        let tags = self.tags_for(&rec.mountpoint);
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        self.push(MetricKind::Critical, tags.clone(), flag(status == Status::Critical));
        self.push(MetricKind::Warning, tags.clone(), flag(status == Status::Warning));
        self.push(MetricKind::PercentUsed, tags.clone(), rec.used_percent);
        self.push(MetricKind::TotalBytes, tags.clone(), rec.total_bytes as f64);
        self.push(MetricKind::UsedBytes, tags.clone(), rec.used_bytes as f64);
        self.push(MetricKind::FreeBytes, tags, rec.free_bytes as f64);
    }

    /// Run-level counts of critical and warning filesystems.
    pub fn add_totals(&mut self, criticals: usize, warnings: usize) {
        let tags = self.tags_for(ALL_MOUNTS);
        self.push(MetricKind::Critical, tags.clone(), criticals as f64);
        self.push(MetricKind::Warning, tags, warnings as f64);
    }

    /// All samples in kind order, then insertion order.
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.values().flatten()
    }

    pub fn render(&self, format: MetricsFormat) -> Result<String> {
        match format {
            MetricsFormat::OpenTsdbLine   => Ok(self.render_opentsdb()),
            MetricsFormat::PrometheusText => self.render_prometheus(),
        }
    }

    fn render_opentsdb(&self) -> String {
        let mut out = String::new();
        for s in self.samples() {
            let _ = write!(out, "{} {} {}", s.name, s.timestamp_millis / 1000, s.value);
            for (k, v) in &s.tags {
                let _ = write!(out, " {}={}", k, opentsdb_tag_value(v));
            }
            out.push('\n');
        }
        out
    }

    /// One gauge family per kind, encoded by the prometheus text encoder.
    fn families(&self) -> Vec<MetricFamily> {
        self.samples.iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(kind, samples)| {
                let mut family = MetricFamily::default();
                family.set_name(prometheus_name(kind.name()));
                family.set_help(kind.help().to_string());
                family.set_field_type(MetricType::GAUGE);
                for s in samples {
                    let mut gauge = Gauge::default();
                    gauge.set_value(s.value);
                    let mut metric = Metric::default();
                    metric.set_gauge(gauge);
                    metric.set_timestamp_ms(s.timestamp_millis);
                    for (k, v) in &s.tags {
                        let mut label = LabelPair::default();
                        label.set_name(k.clone());
                        label.set_value(v.clone());
                        metric.mut_label().push(label);
                    }
                    family.mut_metric().push(metric);
                }
                family
            })
            .collect()
    }

    fn render_prometheus(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.families(), &mut buf)
            .context("encoding prometheus text")?;
        Ok(String::from_utf8(buf)?)
    }
}

pub fn prometheus_name(name: &str) -> String {
    name.replace('.', "_")
}

/// OpenTSDB tag values may not contain whitespace.
fn opentsdb_tag_value(v: &str) -> String {
    v.chars().map(|c| if c.is_whitespace() { '_' } else { c }).collect()
}
