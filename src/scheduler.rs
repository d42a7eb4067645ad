use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Timelike};
use tokio::sync::watch;

use crate::config::{FailurePolicy, SchedulerConfig};
use crate::reminder::Reminder;
use crate::sink::{DispatchEvent, DispatchSink};

/// Wall-clock source, injectable so tests can steer time instead of
/// sleeping through real minutes.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, Copy)]
enum DeliveryPolicy {
    Disable,
    Retry { max_attempts: u32, base: Duration },
}

enum DeliveryOutcome {
    Delivered,
    Skipped,
    Fatal,
}

/// Runs one watcher task per registered reminder. Watchers share nothing
/// mutable; the registry maps reminder id to the watcher's cancel handle.
/// Dropping the scheduler stops every watcher.
pub struct Scheduler {
    sink: Arc<dyn DispatchSink>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    policy: DeliveryPolicy,
    watchers: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl Scheduler {
    pub fn new(
        sink: Arc<dyn DispatchSink>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self::with_tick(sink, clock, config, Duration::from_secs(config.tick_secs))
    }

    fn with_tick(
        sink: Arc<dyn DispatchSink>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
        tick: Duration,
    ) -> Self {
        let policy = match config.on_dispatch_failure {
            FailurePolicy::Disable => DeliveryPolicy::Disable,
            FailurePolicy::Retry => DeliveryPolicy::Retry {
                max_attempts: config.retry_max_attempts.max(1),
                base: Duration::from_secs(config.retry_base_secs),
            },
        };
        Self {
            sink,
            clock,
            tick,
            policy,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a watcher for a reminder. The reminder must already be
    /// validated and persisted; registration itself cannot fail. Duplicate
    /// ids are ignored.
    pub fn register(&self, reminder: Reminder) {
        let mut watchers = self.watchers.lock().expect("watcher registry poisoned");
        if watchers.contains_key(&reminder.id) {
            tracing::warn!("Reminder {} is already being watched", reminder.id);
            return;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        watchers.insert(reminder.id.clone(), cancel_tx);

        tokio::spawn(run_watcher(
            reminder,
            self.sink.clone(),
            self.clock.clone(),
            self.tick,
            self.policy,
            cancel_rx,
        ));
    }

    /// Bulk registration of reminders loaded at startup. Order-independent.
    pub fn seed(&self, reminders: Vec<Reminder>) {
        for reminder in reminders {
            self.register(reminder);
        }
        tracing::info!("Watching {} reminders", self.watcher_count());
    }

    /// Stops the watcher for a reminder and removes it from the registry.
    /// Returns false if no such reminder is registered. Not reachable over
    /// HTTP; deletion has no API surface yet.
    #[allow(dead_code)]
    pub fn cancel(&self, reminder_id: &str) -> bool {
        let handle = self
            .watchers
            .lock()
            .expect("watcher registry poisoned")
            .remove(reminder_id);
        match handle {
            Some(cancel_tx) => {
                let _ = cancel_tx.send(true);
                true
            }
            None => false,
        }
    }

    /// Number of registered reminders (including any whose watcher has been
    /// disabled by a dispatch failure).
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().expect("watcher registry poisoned").len()
    }
}

async fn run_watcher(
    reminder: Reminder,
    sink: Arc<dyn DispatchSink>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    policy: DeliveryPolicy,
    mut cancel_rx: watch::Receiver<bool>,
) {
    tracing::info!(
        "Watching reminder {} ({} at {:02}:{:02})",
        reminder.id,
        reminder.name,
        reminder.hour,
        reminder.minute
    );

    // Slot that already fired; re-sampling the same minute on a later tick
    // must not dispatch twice.
    let mut last_fired: Option<(NaiveDate, u32, u32)> = None;

    loop {
        let now = clock.now();
        let slot = (now.date_naive(), now.hour(), now.minute());

        if now.hour() == reminder.hour
            && now.minute() == reminder.minute
            && last_fired != Some(slot)
        {
            match deliver(&reminder, sink.as_ref(), policy).await {
                DeliveryOutcome::Delivered | DeliveryOutcome::Skipped => {
                    last_fired = Some(slot);
                }
                DeliveryOutcome::Fatal => return,
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = cancel_rx.changed() => {
                tracing::info!("Stopped watching reminder {}", reminder.id);
                return;
            }
        }
    }
}

async fn deliver(
    reminder: &Reminder,
    sink: &dyn DispatchSink,
    policy: DeliveryPolicy,
) -> DeliveryOutcome {
    let event = DispatchEvent::from(reminder);

    match policy {
        DeliveryPolicy::Disable => match sink.dispatch(&event).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => {
                tracing::error!(
                    "Stopped watching reminder {} after dispatch failure: {e:#}",
                    reminder.id
                );
                DeliveryOutcome::Fatal
            }
        },
        DeliveryPolicy::Retry { max_attempts, base } => {
            let mut delay = base;
            for attempt in 1..=max_attempts {
                match sink.dispatch(&event).await {
                    Ok(()) => return DeliveryOutcome::Delivered,
                    Err(e) if attempt < max_attempts => {
                        tracing::warn!(
                            "Dispatch attempt {attempt}/{max_attempts} for reminder {} failed: {e:#}",
                            reminder.id
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Skipping this occurrence of reminder {} after {max_attempts} failed attempts: {e:#}",
                            reminder.id
                        );
                    }
                }
            }
            DeliveryOutcome::Skipped
        }
    }
}
