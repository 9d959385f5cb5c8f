//! Single-writer, coalescing async append logger.
//!
//! All log entries funnel through one task that owns the file handle, so
//! writes are naturally serialized without the manual pending-write
//! bookkeeping the original needed around a shared, callback-driven
//! stream. `freeze`/`thaw` pause and resume draining the queue, and
//! `copy_and_truncate` is used by the round manager to roll the journal
//! over when a block is found.
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

enum Command {
    Log(String),
    Freeze,
    Thaw,
    Flush(oneshot::Sender<std::io::Result<()>>),
    CopyAndTruncate {
        copy_path: PathBuf,
        delay_before_truncate: Duration,
        reply: oneshot::Sender<std::io::Result<()>>,
    },
}

#[derive(Clone)]
pub struct FileLogger {
    tx: mpsc::UnboundedSender<Command>,
}

impl FileLogger {
    /// Opens `path` for appending, creating it if it does not exist, and
    /// spawns the writer task.
    pub async fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(path, file, rx));
        Ok(Self { tx })
    }

    pub fn log(&self, entry: impl Into<String>) {
        let _ = self.tx.send(Command::Log(entry.into()));
    }

    pub fn freeze(&self) {
        let _ = self.tx.send(Command::Freeze);
    }

    pub fn thaw(&self) {
        let _ = self.tx.send(Command::Thaw);
    }

    pub async fn flush(&self) -> std::io::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| std::io::Error::other("file logger task is gone"))?;
        rx.await.map_err(|_| std::io::Error::other("file logger task dropped the reply"))?
    }

    /// Freezes the logger, flushes pending entries, waits
    /// `delay_before_truncate`, copies the current file to `copy_path`,
    /// truncates it, then thaws.
    pub async fn copy_and_truncate(
        &self,
        copy_path: impl Into<PathBuf>,
        delay_before_truncate: Duration,
    ) -> std::io::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::CopyAndTruncate {
                copy_path: copy_path.into(),
                delay_before_truncate,
                reply,
            })
            .map_err(|_| std::io::Error::other("file logger task is gone"))?;
        rx.await.map_err(|_| std::io::Error::other("file logger task dropped the reply"))?
    }
}

async fn write_all(file: &mut File, queue: &mut VecDeque<String>) {
    if queue.is_empty() {
        return;
    }
    let batch: String = queue.drain(..).collect();
    if let Err(e) = file.write_all(batch.as_bytes()).await {
        tracing::warn!(error = %e, "failed to write to log file");
    }
}

async fn run(path: PathBuf, mut file: File, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut frozen = false;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Log(entry) => {
                queue.push_back(format!("{entry}\n"));
                if !frozen {
                    write_all(&mut file, &mut queue).await;
                }
            }
            Command::Freeze => frozen = true,
            Command::Thaw => {
                frozen = false;
                write_all(&mut file, &mut queue).await;
            }
            Command::Flush(reply) => {
                write_all(&mut file, &mut queue).await;
                let _ = reply.send(file.flush().await);
            }
            Command::CopyAndTruncate {
                copy_path,
                delay_before_truncate,
                reply,
            } => {
                frozen = true;
                write_all(&mut file, &mut queue).await;
                let _ = file.flush().await;

                tokio::time::sleep(delay_before_truncate).await;

                let result = async {
                    tokio::fs::copy(&path, &copy_path).await?;
                    file.set_len(0).await?;
                    file.seek(std::io::SeekFrom::Start(0)).await?;
                    Ok(())
                }
                .await;

                frozen = false;
                write_all(&mut file, &mut queue).await;
                let _ = reply.send(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_then_flush_writes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let logger = FileLogger::new(&path).await.unwrap();

        logger.log("hello");
        logger.log("world");
        logger.flush().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }

    #[tokio::test]
    async fn copy_and_truncate_rolls_the_file_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round");
        let copy_path = dir.path().join("round.123");
        let logger = FileLogger::new(&path).await.unwrap();

        logger.log("STARTED");
        logger
            .copy_and_truncate(&copy_path, Duration::from_millis(1))
            .await
            .unwrap();

        let copy_contents = tokio::fs::read_to_string(&copy_path).await.unwrap();
        assert_eq!(copy_contents, "STARTED\n");

        logger.log("RESUMED");
        logger.flush().await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "RESUMED\n");
    }
}
