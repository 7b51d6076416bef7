//! Bet Journal - JSONL Pending-Bet Store
//!
//! Append-only `bets.jsonl`, one `Bet` per line. Reads re-scan the file
//! so rows written by other processes are seen; malformed lines are
//! skipped with a warning rather than failing the exposure scan.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::bet::{Bet, PendingBet};
use crate::domain::modality::Modality;
use crate::ports::bet_store::BetReadStore;

/// Append-only JSONL journal of bets.
pub struct BetJournal {
    path: PathBuf,
    /// Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl BetJournal {
    /// Open (or create) `bets.jsonl` under `data_dir`.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;
        Ok(Self {
            path: dir.join("bets.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append bets as one write.
    #[instrument(skip(self, bets), fields(count = bets.len()))]
    pub async fn append(&self, bets: &[Bet]) -> Result<()> {
        let mut buf = String::new();
        for bet in bets {
            buf.push_str(&serde_json::to_string(bet).context("Failed to serialize bet")?);
            buf.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open bet journal")?;
        file.write_all(buf.as_bytes())
            .await
            .context("Failed to write bet journal")?;
        file.flush().await.context("Failed to flush bet journal")?;
        debug!("Bets appended");
        Ok(())
    }

    /// Every readable bet in the journal.
    pub async fn load_all(&self) -> Result<Vec<Bet>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .context("Failed to read bet journal")?;

        let mut bets = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Bet>(line) {
                Ok(bet) => bets.push(bet),
                Err(e) => warn!(
                    file = %self.path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping malformed bet record"
                ),
            }
        }
        Ok(bets)
    }
}

#[async_trait]
impl BetReadStore for BetJournal {
    async fn find_pending_bets(
        &self,
        modality: Modality,
        lottery: Option<&str>,
        draw_time: Option<&str>,
    ) -> Result<Vec<PendingBet>> {
        Ok(self
            .load_all()
            .await?
            .iter()
            .filter(|b| b.is_pending() && b.modality == modality && b.in_scope(lottery, draw_time))
            .map(Bet::to_pending)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bet::{DivisionType, DrawIdentity};
    use crate::domain::positions::PositionRange;
    use rust_decimal_macros::dec;

    fn scratch_dir() -> String {
        std::env::temp_dir()
            .join(format!("bicho-bets-{}", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_append_then_find_pending() {
        let journal = BetJournal::new(&scratch_dir()).await.unwrap();
        let range = PositionRange::new(Modality::Dezena, 1, 5).unwrap();
        let bet = Bet::pending(
            Modality::Dezena,
            "42",
            range,
            DivisionType::All,
            dec!(2.50),
            DrawIdentity::new("LOOK", "11:20"),
        );
        journal.append(&[bet.clone()]).await.unwrap();

        let pending = journal
            .find_pending_bets(Modality::Dezena, Some("LOOK"), None)
            .await
            .unwrap();
        assert_eq!(pending, vec![bet.to_pending()]);
        assert!(journal
            .find_pending_bets(Modality::Centena, None, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let journal = BetJournal::new(&scratch_dir()).await.unwrap();
        fs::write(journal.path(), "not json\n\n").await.unwrap();
        let range = PositionRange::new(Modality::Grupo, 1, 1).unwrap();
        let bet = Bet::pending(
            Modality::Grupo,
            "7",
            range,
            DivisionType::Each,
            dec!(1),
            DrawIdentity::default(),
        );
        journal.append(&[bet]).await.unwrap();
        assert_eq!(journal.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let journal = BetJournal::new(&scratch_dir()).await.unwrap();
        assert!(journal.load_all().await.unwrap().is_empty());
    }
}
