use serde::Deserialize;
use std::{fs, path::PathBuf};
use strom_client::{names::Language, ObisCode};

use crate::transform::{MetricPolicy, PolicyEffect, PolicyEntry, PolicyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    DecoderProcess,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl Parity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Even => "even",
            Self::Odd => "odd",
            Self::Mark => "mark",
            Self::Space => "space",
        }
    }
}

/// Serial link and protocol settings. Opaque to the pipeline; handed to the
/// decoder as-is.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub protocol: String,
    pub transport: String,
    pub serial_port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub request_interval_secs: u64,
    pub ignore_invalid_crc: bool,
    pub fallback_medium: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            protocol: "SmlProtocol".to_string(),
            transport: "SerialRequestResponseTransport".to_string(),
            serial_port: "/dev/ttyAMA0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            request_interval_secs: 0,
            ignore_invalid_crc: false,
            fallback_medium: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSourceConfig {
    pub http_bind_addr: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub auth_bearer_token: Option<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_channel_capacity() -> usize {
    16
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    pub kind: TransportKind,
    #[serde(default)]
    pub obis_name_language: Language,
    #[serde(default)]
    pub link: LinkConfig,
    pub decoder: Option<DecoderConfig>,
    pub http: Option<HttpSourceConfig>,
}

/// One `[[policy]]` table. Exactly one of `extract`, `snapshot` or `suppress`
/// must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntryConfig {
    pub code: ObisCode,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub suppress: bool,
}

impl PolicyEntryConfig {
    fn to_entry(&self) -> Result<PolicyEntry, PolicyError> {
        let effect = match (&self.extract, &self.snapshot, self.suppress) {
            (Some(m), None, false) => PolicyEffect::Extract(m.clone()),
            (None, Some(m), false) => PolicyEffect::Snapshot(m.clone()),
            (None, None, true) => PolicyEffect::Suppress,
            _ => return Err(PolicyError::AmbiguousEffect(self.code)),
        };
        Ok(PolicyEntry {
            code: self.code,
            effect,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/strom/strom.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    #[default]
    Rrdtool,
    Ilp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub kind: SeriesKind,
    pub path: PathBuf,
    pub rrdtool_bin: PathBuf,
    pub ilp_tcp_addr: String,
    pub measurement: String,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            kind: SeriesKind::Rrdtool,
            path: PathBuf::from("/var/strom/strom.rrd"),
            rrdtool_bin: PathBuf::from("rrdtool"),
            ilp_tcp_addr: "127.0.0.1:9009".to_string(),
            measurement: "strom".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub transport: TransportConfig,
    /// Falls back to the built-in table when no `[[policy]]` entries are given.
    #[serde(default)]
    pub policy: Option<Vec<PolicyEntryConfig>>,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub series: SeriesConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("STROM_CONFIG").unwrap_or_else(|_| "strom-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {path}: {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn metric_policy(&self) -> Result<MetricPolicy, PolicyError> {
        match &self.policy {
            None => Ok(MetricPolicy::default()),
            Some(entries) => MetricPolicy::new(
                entries
                    .iter()
                    .map(PolicyEntryConfig::to_entry)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        }
    }
}
