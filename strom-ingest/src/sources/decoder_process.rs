use std::{pin::Pin, process::Stdio};

use futures::Stream;
use strom_client::{names::Language, ReadingBatch};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
};

use crate::{
    config::{DecoderConfig, LinkConfig},
    pipeline::{Envelope, PipelineError, Source},
};

use super::message::decode_line;

/// Runs an external SML decoder and reads one transport message per stdout line.
///
/// The serial link settings are appended to the configured arguments as
/// `--flag value` pairs; the decoder owns the serial port.
pub struct DecoderProcessSource {
    command: String,
    args: Vec<String>,
    language: Language,
}

impl DecoderProcessSource {
    pub fn new(decoder: &DecoderConfig, link: &LinkConfig, language: Language) -> Self {
        let mut args = decoder.args.clone();
        args.extend(link_args(link));
        Self {
            command: decoder.command.clone(),
            args,
            language,
        }
    }
}

fn link_args(link: &LinkConfig) -> Vec<String> {
    let mut args = vec![
        "--protocol".to_string(),
        link.protocol.clone(),
        "--transport".to_string(),
        link.transport.clone(),
        "--serial-port".to_string(),
        link.serial_port.clone(),
        "--baud-rate".to_string(),
        link.baud_rate.to_string(),
        "--data-bits".to_string(),
        link.data_bits.to_string(),
        "--parity".to_string(),
        link.parity.as_str().to_string(),
        "--stop-bits".to_string(),
        link.stop_bits.to_string(),
        "--request-interval".to_string(),
        link.request_interval_secs.to_string(),
        "--fallback-medium".to_string(),
        link.fallback_medium.to_string(),
    ];
    if link.ignore_invalid_crc {
        args.push("--ignore-invalid-crc".to_string());
    }
    args
}

#[async_trait::async_trait]
impl Source<ReadingBatch> for DecoderProcessSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<ReadingBatch>, PipelineError>> + Send>> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        let command = self.command.clone();
        let language = self.language;

        let s = async_stream::stream! {
            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to start decoder '{command}': {e}")));
                    return;
                }
            };
            tracing::info!(%command, pid = child.id(), "decoder started");

            let Some(stdout) = child.stdout.take() else {
                yield Err(PipelineError::Source("decoder stdout not captured".to_string()));
                return;
            };
            let mut lines = BufReader::new(stdout).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        yield decode_line(&line, language).map(Envelope::now);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(PipelineError::Source(format!("failed to read decoder output: {e}")));
                        return;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => tracing::info!("decoder exited"),
                Ok(status) => {
                    yield Err(PipelineError::Source(format!("decoder exited with {status}")));
                }
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to wait for decoder: {e}")));
                }
            }
        };

        Box::pin(s)
    }
}
