use crate::filter::{FilterConfig, ListFilter};
use crate::metrics::{MetricsFormat, Tags};
use crate::threshold::ThresholdConfig;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Optional TOML file supplying defaults for every command line flag.
///
/// ```toml
/// [thresholds]
/// warning  = 80
/// critical = 90
/// magic    = 0.9
///
/// [filters]
/// exclude_fs_type = ["tmpfs", "squashfs"]
///
/// [output]
/// tags = ["dc=ams1"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub filters: FiltersSection,

    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FiltersSection {
    pub include_fs_type:   Vec<String>,
    pub exclude_fs_type:   Vec<String>,
    pub include_fs_path:   Vec<String>,
    pub exclude_fs_path:   Vec<String>,
    pub include_pseudo_fs: bool,
    pub include_read_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub fail_on_error:  bool,
    pub human_readable: bool,
    pub metrics:        bool,
    pub metrics_format: String,
    /// `key=value` pairs added to every metric sample
    pub tags:           Vec<String>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            fail_on_error:  false,
            human_readable: false,
            metrics:        false,
            metrics_format: MetricsFormat::default().name().to_string(),
            tags:           Vec::new(),
        }
    }
}

impl ConfigFile {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("check-disk-usage").join("check-disk-usage.toml"))
    }

    /// Load `explicit` if given, otherwise the default path if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match Self::config_path() {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Everything one run of the check needs, after merging file and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    pub filters:        FilterConfig,
    pub thresholds:     ThresholdConfig,
    pub fail_on_error:  bool,
    pub human_readable: bool,
    pub metrics:        bool,
    pub metrics_format: MetricsFormat,
    pub tags:           Tags,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            filters:        FilterConfig::default(),
            thresholds:     ThresholdConfig::default(),
            fail_on_error:  false,
            human_readable: false,
            metrics:        false,
            metrics_format: MetricsFormat::default(),
            tags:           Tags::new(),
        }
    }
}

impl CheckConfig {
    pub fn from_file(file: &ConfigFile) -> Result<Self> {
        let f = &file.filters;
        let o = &file.output;
        Ok(Self {
            filters: FilterConfig {
                fs_type:           ListFilter::new(f.include_fs_type.clone(), f.exclude_fs_type.clone()),
                fs_path:           ListFilter::new(f.include_fs_path.clone(), f.exclude_fs_path.clone()),
                include_pseudo:    f.include_pseudo_fs,
                include_read_only: f.include_read_only,
            },
            thresholds:     file.thresholds,
            fail_on_error:  o.fail_on_error,
            human_readable: o.human_readable,
            metrics:        o.metrics,
            metrics_format: MetricsFormat::from_name(&o.metrics_format),
            tags:           parse_tags(&o.tags)?,
        })
    }

    /// Reject contradictory settings before any filesystem is looked at.
    pub fn check_args(&self) -> Result<()> {
        self.filters.validate()?;
        if self.thresholds.warning >= self.thresholds.critical {
            bail!("--warning value can not be greater than or equal to --critical value");
        }
        Ok(())
    }
}

/// Parse `key=value` strings. Each must hold exactly one `=`, a key usable
/// as a label name (`[a-zA-Z_][a-zA-Z0-9_]*`) and a non-empty value.
pub fn parse_tags(raw: &[String]) -> Result<Tags> {
    let mut tags = Tags::new();
    for entry in raw {
        let mut parts = entry.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                if !is_label_name(key) {
                    bail!("invalid tag {:?}: key must match [a-zA-Z_][a-zA-Z0-9_]*", entry);
                }
                if value.is_empty() {
                    bail!("invalid tag {:?}: empty value", entry);
                }
                tags.insert(key.to_string(), value.to_string());
            }
            _ => bail!("invalid tag {:?}: expected key=value", entry),
        }
    }
    Ok(tags)
}

fn is_label_name(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
