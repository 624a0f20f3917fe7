use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_MAX_BACKUPS: usize = 50;

const SNAPSHOT_FILE: &str = "running.cfg";
const METADATA_FILE: &str = "operation.json";
const LAST_ALIAS: &str = "last";

/// Record of one snapshot taken before commands were applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Where the running configuration was read from
    pub source: String,
    /// Commands that were about to be applied
    pub commands: Vec<String>,
}

/// Stores running-configuration snapshots under `<dir>/<id>/`
pub struct BackupManager {
    backups_dir: PathBuf,
    max_backups: usize,
}

impl BackupManager {
    pub fn new() -> Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
        Self::with_directory(home_dir.join(".netconverge").join("backups"))
    }

    /// Create a BackupManager with a custom backup directory
    pub fn with_directory(dir: impl Into<PathBuf>) -> Result<Self> {
        let backups_dir = dir.into();

        fs::create_dir_all(&backups_dir).with_context(|| {
            format!(
                "Failed to create backups directory: {}",
                backups_dir.display()
            )
        })?;

        Ok(Self {
            backups_dir,
            max_backups: DEFAULT_MAX_BACKUPS,
        })
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups.max(1);
        self
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Save `running` and the pending `commands`, returning the snapshot id
    pub fn snapshot(&mut self, source: &str, running: &str, commands: &[String]) -> Result<String> {
        // Millisecond timestamp first so ids sort chronologically
        let id = format!(
            "{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S%3f"),
            Uuid::new_v4().to_string().split_at(8).0
        );
        let backup_dir = self.backups_dir.join(&id);

        fs::create_dir_all(&backup_dir).with_context(|| {
            format!(
                "Failed to create backup directory: {}",
                backup_dir.display()
            )
        })?;

        let snapshot_path = backup_dir.join(SNAPSHOT_FILE);
        fs::write(&snapshot_path, running)
            .with_context(|| format!("Failed to write snapshot: {}", snapshot_path.display()))?;

        let metadata = BackupMetadata {
            id: id.clone(),
            timestamp: Utc::now(),
            source: source.to_string(),
            commands: commands.to_vec(),
        };

        let metadata_path = backup_dir.join(METADATA_FILE);
        let metadata_json =
            serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?;

        fs::write(&metadata_path, metadata_json)
            .with_context(|| format!("Failed to write metadata: {}", metadata_path.display()))?;

        tracing::info!(id = id.as_str(), source, "saved running configuration snapshot");

        self.cleanup_old_backups()?;

        Ok(id)
    }

    /// Running configuration text stored under `id`
    pub fn read_snapshot(&self, id: &str) -> Result<String> {
        let backup_dir = self.backups_dir.join(id);
        if !backup_dir.exists() {
            anyhow::bail!("Backup not found: {}", id);
        }
        let snapshot_path = backup_dir.join(SNAPSHOT_FILE);
        fs::read_to_string(&snapshot_path)
            .with_context(|| format!("Failed to read snapshot: {}", snapshot_path.display()))
    }

    pub fn get_last_backup_id(&self) -> Result<Option<String>> {
        let backups = self.list_backups()?;
        Ok(backups.last().map(|b| b.id.clone()))
    }

    /// Snapshot id for `id`, where `last` names the newest snapshot
    pub fn resolve_id(&self, id: &str) -> Result<String> {
        if id != LAST_ALIAS {
            return Ok(id.to_string());
        }
        self.get_last_backup_id()?
            .with_context(|| format!("No snapshots in {}", self.backups_dir.display()))
    }

    /// Snapshots, oldest first
    pub fn list_backups(&self) -> Result<Vec<BackupMetadata>> {
        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.backups_dir).with_context(|| {
            format!(
                "Failed to read backups directory: {}",
                self.backups_dir.display()
            )
        })? {
            let entry = entry?;
            let metadata_path = entry.path().join(METADATA_FILE);

            if !metadata_path.exists() {
                continue;
            }

            let metadata_json = fs::read_to_string(&metadata_path)?;
            if let Ok(metadata) = serde_json::from_str::<BackupMetadata>(&metadata_json) {
                backups.push(metadata);
            }
        }

        // Equal timestamps fall back to id order
        backups.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(backups)
    }

    fn cleanup_old_backups(&self) -> Result<()> {
        let backups = self.list_backups()?;

        if backups.len() > self.max_backups {
            for backup in backups.iter().take(backups.len() - self.max_backups) {
                let backup_dir = self.backups_dir.join(&backup.id);
                fs::remove_dir_all(&backup_dir).with_context(|| {
                    format!("Failed to remove old backup: {}", backup_dir.display())
                })?;
                tracing::debug!(id = backup.id.as_str(), "removed old snapshot");
            }
        }

        Ok(())
    }
}
