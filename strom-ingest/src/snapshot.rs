use std::path::{Path, PathBuf};

use serde_json::{Map, Number, Value};
use strom_client::MetricSet;
use tokio::{fs, io::AsyncWriteExt};

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Publishes the latest instantaneous values as a small JSON document.
///
/// Each write replaces the whole document. The content goes to a sibling temp
/// file first and is renamed into place, so readers polling the file never see
/// a truncated document.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, metrics: &MetricSet) -> Result<(), SnapshotError> {
        let mut doc = Map::new();
        for (name, value) in metrics.iter() {
            doc.insert(name.to_string(), json_number(value));
        }
        let mut body = serde_json::to_vec(&Value::Object(doc))?;
        body.push(b'\n');

        let tmp = self.temp_path();
        if let Err(source) = write_synced(&tmp, &body).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(SnapshotError::Io { path: tmp, source });
        }

        fs::rename(&tmp, &self.path).await.map_err(|source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.path.with_file_name(format!(".{file_name}.tmp"))
    }
}

async fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Whole numbers are written without a fractional part (`500`, not `500.0`).
fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}
