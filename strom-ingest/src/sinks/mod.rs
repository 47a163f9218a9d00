pub mod questdb_ilp;
pub mod rrdtool;

pub use questdb_ilp::QuestDbIlpStore;
pub use rrdtool::RrdtoolStore;

use strom_client::SeriesRow;

use crate::config::{SeriesConfig, SeriesKind};

#[derive(thiserror::Error, Debug)]
pub enum SeriesError {
    #[error("series store rejected update: {0}")]
    Rejected(String),
    #[error("series store cannot represent a row without value columns")]
    EmptyRow,
    #[error("series store i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only time-series destination.
///
/// One call is one atomic append; implementations do not retry.
#[async_trait::async_trait]
pub trait SeriesStore: Send + Sync {
    async fn append(&self, row: &SeriesRow) -> Result<(), SeriesError>;
}

pub enum SeriesBackend {
    Rrdtool(RrdtoolStore),
    Ilp(QuestDbIlpStore),
}

impl SeriesBackend {
    pub fn from_config(cfg: &SeriesConfig) -> anyhow::Result<Self> {
        Ok(match cfg.kind {
            SeriesKind::Rrdtool => Self::Rrdtool(RrdtoolStore::new(&cfg.rrdtool_bin, &cfg.path)),
            SeriesKind::Ilp => {
                let addr = cfg
                    .ilp_tcp_addr
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid series.ilp_tcp_addr: {e}"))?;
                Self::Ilp(QuestDbIlpStore::new(addr, &cfg.measurement))
            }
        })
    }
}

#[async_trait::async_trait]
impl SeriesStore for SeriesBackend {
    async fn append(&self, row: &SeriesRow) -> Result<(), SeriesError> {
        match self {
            Self::Rrdtool(s) => s.append(row).await,
            Self::Ilp(s) => s.append(row).await,
        }
    }
}
