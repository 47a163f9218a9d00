use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use strom_client::SeriesRow;
use tokio::process::Command;

use super::{SeriesError, SeriesStore};

/// Appends rows to a pre-created RRD file via `rrdtool update`.
pub struct RrdtoolStore {
    binary: PathBuf,
    path: PathBuf,
}

impl RrdtoolStore {
    pub fn new(binary: impl AsRef<Path>, path: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            path: path.as_ref().to_path_buf(),
        }
    }

    fn update_args(&self, row: &SeriesRow) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["update".into(), self.path.clone().into()];
        // rrdtool refuses an empty template; without one it expects every data source.
        if !row.is_empty() {
            args.push("--template".into());
            args.push(row.template().into());
        }
        args.push(row.render_values().into());
        args
    }
}

#[async_trait::async_trait]
impl SeriesStore for RrdtoolStore {
    async fn append(&self, row: &SeriesRow) -> Result<(), SeriesError> {
        let output = Command::new(&self.binary)
            .args(self.update_args(row))
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            metrics::counter!("strom_series_rows_appended_total").increment(1);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("rrdtool exited with {}", output.status)
        } else {
            stderr
        };
        Err(SeriesError::Rejected(reason))
    }
}
