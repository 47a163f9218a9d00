use std::{path::PathBuf, pin::Pin};

use futures::Stream;
use strom_client::{names::Language, ReadingBatch};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::pipeline::{Envelope, PipelineError, Source};

use super::message::decode_line;

/// Replays a recorded NDJSON file of transport messages, one cycle per line.
///
/// Undecodable lines are transport errors and only skip their own cycle.
pub struct ReplayFileSource {
    path: PathBuf,
    language: Language,
}

impl ReplayFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, language: Language) -> Self {
        Self {
            path: path.into(),
            language,
        }
    }
}

#[async_trait::async_trait]
impl Source<ReadingBatch> for ReplayFileSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<ReadingBatch>, PipelineError>> + Send>> {
        let path = self.path.clone();
        let language = self.language;
        let s = async_stream::stream! {
            let file = match File::open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to open replay file: {e}")));
                    return;
                }
            };
            let mut lines = BufReader::new(file).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let item = decode_line(&line, language).map(Envelope::now);
                        if item.is_err() {
                            metrics::counter!("replay_parse_errors_total").increment(1);
                        }
                        yield item;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(PipelineError::Source(format!("failed to read replay line: {e}")));
                        break;
                    }
                }
            }
        };

        Box::pin(s)
    }
}
