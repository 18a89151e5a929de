//! Record sink -- writes normalized records as JSON lines.
//!
//! The sink owns the receiving end of the pipeline's record channel.
//! On shutdown it drains whatever the sources flushed into the channel
//! before exiting, so records stitched during `stop()` are not lost.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, mpsc};

use opsnorm_core::config::OutputConfig;
use opsnorm_core::types::LogRecord;

/// Where normalized records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutput {
    /// Process stdout, one record per line.
    Stdout,
    /// Append to a file, creating it (and its parent directory) if needed.
    File(PathBuf),
}

impl RecordOutput {
    /// Resolve the `[output]` section.
    pub fn from_config(config: &OutputConfig) -> Result<Self> {
        match config.kind.as_str() {
            "stdout" => Ok(Self::Stdout),
            "file" if !config.path.is_empty() => Ok(Self::File(PathBuf::from(&config.path))),
            "file" => Err(anyhow::anyhow!("output.path is required for file output")),
            other => Err(anyhow::anyhow!("unknown output kind '{}'", other)),
        }
    }

    /// Open the underlying writer.
    pub async fn open(&self) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        match self {
            Self::Stdout => Ok(Box::new(tokio::io::stdout())),
            Self::File(path) => Ok(Box::new(open_append(path).await?)),
        }
    }
}

async fn open_append(path: &Path) -> Result<tokio::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::anyhow!("failed to create output directory {}: {}", parent.display(), e)
            })?;
        }
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to open output file {}: {}", path.display(), e))
}

/// Encode one record as a JSON line (trailing newline included).
pub fn encode_record(record: &LogRecord) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

async fn write_record<W>(writer: &mut BufWriter<W>, record: &LogRecord) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = encode_record(record)?;
    writer.write_all(&line).await?;
    Ok(())
}

/// Spawn the sink writer task.
///
/// Runs until the record channel closes or shutdown is broadcast. Returns
/// the number of records written.
pub fn spawn_sink_writer<W>(
    writer: W,
    mut record_rx: mpsc::Receiver<LogRecord>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<Result<u64>>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        let mut written: u64 = 0;

        loop {
            tokio::select! {
                received = record_rx.recv() => {
                    match received {
                        Some(record) => {
                            write_record(&mut writer, &record).await?;
                            written += 1;
                            // flush when the channel is momentarily empty
                            if record_rx.is_empty() {
                                writer.flush().await?;
                            }
                        }
                        None => {
                            tracing::debug!("record channel closed, exiting sink");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    while let Ok(record) = record_rx.try_recv() {
                        write_record(&mut writer, &record).await?;
                        written += 1;
                    }
                    tracing::debug!("sink writer shutting down");
                    break;
                }
            }
        }

        writer.flush().await?;
        tracing::info!(written, "sink writer finished");
        Ok(written)
    })
}
