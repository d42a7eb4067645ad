use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::reminder::Reminder;

#[async_trait::async_trait]
pub trait ReminderStore: Send + Sync {
    /// Returns the complete current set of reminders. No pagination.
    async fn get_all(&self) -> Result<Vec<Reminder>>;
    async fn insert(&self, reminder: &Reminder) -> Result<()>;
}

/// One JSON document per reminder under `<base_dir>/reminders/`, named by
/// reminder id. Ids are UUIDs, so they are safe as filenames.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: &Path) -> Result<Self> {
        let dir = base_dir.join("reminders");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store dir: {}", dir.display()))?;
        Ok(Self { dir })
    }
}

#[async_trait::async_trait]
impl ReminderStore for FileStore {
    async fn get_all(&self) -> Result<Vec<Reminder>> {
        let mut reminders = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read store dir: {}", self.dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let reminder: Reminder = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to decode {}", path.display()))?;
                reminders.push(reminder);
            }
        }

        Ok(reminders)
    }

    async fn insert(&self, reminder: &Reminder) -> Result<()> {
        let path = self.dir.join(format!("{}.json", reminder.id));
        let tmp = self.dir.join(format!("{}.json.tmp", reminder.id));

        let json = serde_json::to_string_pretty(reminder)?;
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to rename into {}", path.display()))?;

        tracing::debug!("Stored reminder {}", reminder.id);
        Ok(())
    }
}
