//! # pd-round
//! Journals every share and every found block to a single append-only
//! file, rotating it each time a block is found.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pd_core::error::ShareOutcome;
use pd_events::{FileLogger, PoolObserver};
use tracing::warn;

/// Delay between flushing the round file and truncating it, giving any
/// writer that raced the block-found event a chance to land first.
const TRUNCATE_DELAY: Duration = Duration::from_millis(1000);

pub struct RoundManager {
    logger: FileLogger,
    round_file: PathBuf,
}

impl RoundManager {
    /// Opens (or creates, mode 0600) the round file and logs a `STARTED`
    /// or `RESUMED` entry depending on whether it already existed.
    pub async fn start(round_file: impl Into<PathBuf>) -> std::io::Result<Arc<Self>> {
        let round_file = round_file.into();
        let existed = tokio::fs::metadata(&round_file).await.is_ok();

        if !existed {
            create_private(&round_file)?;
        }

        let logger = FileLogger::new(&round_file).await?;
        let manager = Arc::new(Self { logger, round_file });

        if existed {
            manager.log_entry("RESUMED", &[]);
        } else {
            manager.log_entry("STARTED", &[]);
        }

        Ok(manager)
    }

    fn log_entry(&self, kind: &str, fields: &[String]) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut line = format!("{now}\t{kind}");
        for field in fields {
            line.push('\t');
            line.push_str(field);
        }
        self.logger.log(line);
    }
}

impl PoolObserver for RoundManager {
    fn on_work_validated(&self, outcome: ShareOutcome, user: &str, password: &str) {
        self.log_entry(
            "SHARE",
            &[
                outcome.code().to_string(),
                format!("\"{user}\""),
                format!("\"{password}\""),
            ],
        );
    }

    fn on_block_found(&self, block: u64, user: &str, password: &str) {
        self.log_entry(
            "BLOCK",
            &[block.to_string(), format!("\"{user}\""), format!("\"{password}\"")],
        );

        let copy_path = self
            .round_file
            .with_file_name(format!(
                "{}.{}",
                self.round_file.file_name().unwrap_or_default().to_string_lossy(),
                block
            ));
        let logger = self.logger.clone();

        tokio::spawn(async move {
            if let Err(e) = logger.copy_and_truncate(&copy_path, TRUNCATE_DELAY).await {
                warn!(error = %e, "failed to roll over round file");
                return;
            }

            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            logger.log(format!("{now}\tSTARTED"));
        });
    }
}

#[cfg(unix)]
fn create_private(path: &std::path::Path) -> std::io::Result<()> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private(path: &std::path::Path) -> std::io::Result<()> {
    std::fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_file_logs_started() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round");
        let manager = RoundManager::start(&path).await.unwrap();
        manager.logger.flush().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.ends_with("STARTED\n"));
    }

    #[tokio::test]
    async fn existing_file_logs_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round");
        tokio::fs::write(&path, "0\tSTARTED\n").await.unwrap();

        let manager = RoundManager::start(&path).await.unwrap();
        manager.logger.flush().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.ends_with("RESUMED\n"));
    }

    #[tokio::test]
    async fn share_is_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round");
        let manager = RoundManager::start(&path).await.unwrap();

        manager.on_work_validated(ShareOutcome::Success, "alice", "x");
        manager.logger.flush().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("SHARE\t0\t\"alice\"\t\"x\""));
    }
}
