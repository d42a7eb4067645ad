use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::reminder::Reminder;
use crate::scheduler::Scheduler;
use crate::store::ReminderStore;

/// Startup bulk read must finish within this deadline or the process is
/// considered unhealthy.
const SEED_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    scheduler: Arc<Scheduler>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ReminderStore>, scheduler: Arc<Scheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Reads every persisted reminder and starts a watcher for each.
    /// A failed or timed-out read is fatal to startup; an empty store is
    /// success. Returns the number of reminders seeded.
    pub async fn load_and_seed(&self) -> Result<usize> {
        let reminders = tokio::time::timeout(SEED_TIMEOUT, self.store.get_all())
            .await
            .context("Timed out loading existing reminders")?
            .context("Failed to load existing reminders")?;

        let count = reminders.len();
        self.scheduler.seed(reminders);
        Ok(count)
    }

    /// Persists a new reminder and starts watching it. Fields must already
    /// be validated (`reminder::validate`); the watcher is only started
    /// after the insert succeeds.
    pub async fn create(
        &self,
        owner_id: &str,
        name: &str,
        hour: u32,
        minute: u32,
    ) -> Result<Reminder> {
        let reminder = Reminder::new(owner_id, name, hour, minute);
        self.store
            .insert(&reminder)
            .await
            .context("Failed to persist reminder")?;
        self.scheduler.register(reminder.clone());

        tracing::info!(
            "Created reminder {} ({} at {:02}:{:02})",
            reminder.id,
            reminder.name,
            reminder.hour,
            reminder.minute
        );
        Ok(reminder)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;
    use crate::config::SchedulerConfig;
    use crate::scheduler::Clock;
    use crate::sink::{DispatchEvent, DispatchSink};

    #[derive(Default)]
    struct MemStore {
        reminders: Mutex<Vec<Reminder>>,
        fail_insert: bool,
        fail_get: bool,
    }

    #[async_trait::async_trait]
    impl ReminderStore for MemStore {
        async fn get_all(&self) -> Result<Vec<Reminder>> {
            if self.fail_get {
                anyhow::bail!("store unreachable");
            }
            Ok(self.reminders.lock().unwrap().clone())
        }

        async fn insert(&self, reminder: &Reminder) -> Result<()> {
            if self.fail_insert {
                anyhow::bail!("store unreachable");
            }
            self.reminders.lock().unwrap().push(reminder.clone());
            Ok(())
        }
    }

    struct NullSink;

    #[async_trait::async_trait]
    impl DispatchSink for NullSink {
        async fn dispatch(&self, _event: &DispatchEvent) -> Result<()> {
            Ok(())
        }
    }

    struct FrozenClock;

    impl Clock for FrozenClock {
        fn now(&self) -> chrono::DateTime<chrono::Local> {
            chrono::Local.with_ymd_and_hms(2026, 3, 14, 3, 0, 0).unwrap()
        }
    }

    fn service_with(store: MemStore) -> ReminderService {
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(NullSink),
            Arc::new(FrozenClock),
            &SchedulerConfig::default(),
        ));
        ReminderService::new(Arc::new(store), scheduler)
    }

    #[tokio::test]
    async fn test_create_persists_then_registers() {
        let service = service_with(MemStore::default());

        let created = service.create("user-1", "aspirin", 9, 30).await.unwrap();
        assert_eq!(created.owner_id, "user-1");

        let stored = service.store.get_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, created.id);
        assert_eq!(service.scheduler.watcher_count(), 1);
    }

    #[tokio::test]
    async fn test_create_does_not_register_on_store_failure() {
        let service = service_with(MemStore {
            fail_insert: true,
            ..Default::default()
        });

        assert!(service.create("user-1", "aspirin", 9, 30).await.is_err());
        assert_eq!(service.scheduler.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_load_and_seed_empty_store_is_success() {
        let service = service_with(MemStore::default());
        assert_eq!(service.load_and_seed().await.unwrap(), 0);
        assert_eq!(service.scheduler.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_load_and_seed_registers_every_stored_reminder() {
        let store = MemStore::default();
        store.reminders.lock().unwrap().extend([
            Reminder::new("user-1", "aspirin", 9, 30),
            Reminder::new("user-2", "ibuprofen", 12, 0),
        ]);
        let service = service_with(store);

        assert_eq!(service.load_and_seed().await.unwrap(), 2);
        assert_eq!(service.scheduler.watcher_count(), 2);
    }

    #[tokio::test]
    async fn test_load_and_seed_propagates_read_failure() {
        let service = service_with(MemStore {
            fail_get: true,
            ..Default::default()
        });

        assert!(service.load_and_seed().await.is_err());
        assert_eq!(service.scheduler.watcher_count(), 0);
    }
}
