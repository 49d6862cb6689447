//! Periodic job schedule ("beat")
//!
//! Every entry belongs to a period slot. When the slot changes the beat tries
//! to take a Redis lock named after the entry and slot; only the holder
//! enqueues, so several beat processes produce each job once.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TasksConfig;
use crate::tasks::queue::{Job, TaskQueue};

const TICK: Duration = Duration::from_secs(1);
const DAY_SECONDS: u64 = 86_400;

/// When an entry runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Every(Duration),
    /// Once a day, from the given local hour on
    DailyAt { hour: u32 },
}

impl Cadence {
    /// Identifier of the period `now` falls in; `None` while a daily entry is not due yet
    pub fn slot(&self, now: DateTime<Local>) -> Option<String> {
        match self {
            Cadence::Every(period) => {
                let seconds = period.as_secs().max(1) as i64;
                Some((now.timestamp() / seconds).to_string())
            }
            Cadence::DailyAt { hour } => (now.hour() >= *hour).then(|| now.date_naive().to_string()),
        }
    }

    /// Lock lifetime covering one period
    pub fn lock_ttl(&self) -> u64 {
        match self {
            Cadence::Every(period) => period.as_secs().max(1),
            Cadence::DailyAt { .. } => DAY_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub name: &'static str,
    pub job: Job,
    pub cadence: Cadence,
}

/// The standard schedule
pub fn default_schedule(config: &TasksConfig) -> Vec<ScheduleEntry> {
    let every = |seconds: u64| Cadence::Every(Duration::from_secs(seconds));
    let daily = Cadence::DailyAt { hour: config.daily_run_hour };
    vec![
        ScheduleEntry {
            name: "send-pending-emails",
            job: Job::SendPendingEmails,
            cadence: every(config.pending_emails_interval_seconds),
        },
        ScheduleEntry {
            name: "process-waiting-lists",
            job: Job::ProcessWaitingLists,
            cadence: every(config.waiting_list_interval_seconds),
        },
        ScheduleEntry {
            name: "complete-past-event-dates",
            job: Job::CompletePastEventDates,
            cadence: every(config.complete_dates_interval_seconds),
        },
        ScheduleEntry {
            name: "send-date-reminders",
            job: Job::SendDateReminders,
            cadence: daily,
        },
        ScheduleEntry {
            name: "remove-unused-files",
            job: Job::RemoveUnusedFiles,
            cadence: daily,
        },
        ScheduleEntry {
            name: "cleanup-expired-data",
            job: Job::CleanupExpiredData,
            cadence: every(config.cleanup_interval_seconds),
        },
    ]
}

#[derive(Debug)]
pub struct Beat {
    queue: TaskQueue,
    schedule: Vec<ScheduleEntry>,
    last_slots: HashMap<&'static str, String>,
}

impl Beat {
    pub fn new(queue: TaskQueue, schedule: Vec<ScheduleEntry>) -> Self {
        Self { queue, schedule, last_slots: HashMap::new() }
    }

    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!(entries = self.schedule.len(), "Beat started");
        let mut ticker = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Local::now()).await;
                }
                _ = stop.changed() => break,
            }
            if *stop.borrow() {
                break;
            }
        }
        info!("Beat stopped");
    }

    /// Enqueue every entry whose slot changed; returns the names enqueued by this instance
    pub async fn tick(&mut self, now: DateTime<Local>) -> Vec<&'static str> {
        let mut enqueued = Vec::new();
        for entry in &self.schedule {
            let Some(slot) = entry.cadence.slot(now) else { continue };
            if self.last_slots.get(entry.name) == Some(&slot) {
                continue;
            }

            let lock = format!("beat:{}:{}", entry.name, slot);
            match self.queue.redis().try_lock(&lock, entry.cadence.lock_ttl()).await {
                Ok(true) => match self.queue.enqueue(entry.job.clone()).await {
                    Ok(_) => {
                        debug!(entry = entry.name, slot = %slot, "Scheduled job enqueued");
                        enqueued.push(entry.name);
                    }
                    Err(e) => {
                        warn!(entry = entry.name, error = %e, "Failed to enqueue scheduled job");
                        continue;
                    }
                },
                Ok(false) => debug!(entry = entry.name, slot = %slot, "Slot already taken by another beat"),
                Err(e) => {
                    warn!(entry = entry.name, error = %e, "Beat lock unavailable");
                    continue;
                }
            }
            self.last_slots.insert(entry.name, slot);
        }
        enqueued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 8, 20, hour, minute, second).unwrap()
    }

    #[test]
    fn test_interval_slots_change_once_per_period() {
        let cadence = Cadence::Every(Duration::from_secs(60));
        let first = cadence.slot(at(10, 0, 5)).unwrap();
        assert_eq!(cadence.slot(at(10, 0, 59)).unwrap(), first);
        assert_ne!(cadence.slot(at(10, 1, 0)).unwrap(), first);
        assert_eq!(cadence.lock_ttl(), 60);
    }

    #[test]
    fn test_daily_slot_waits_for_hour() {
        let cadence = Cadence::DailyAt { hour: 5 };
        assert_eq!(cadence.slot(at(4, 59, 59)), None);
        assert_eq!(cadence.slot(at(5, 0, 0)).as_deref(), Some("2024-08-20"));
        assert_eq!(cadence.slot(at(23, 0, 0)).as_deref(), Some("2024-08-20"));
        assert_eq!(cadence.lock_ttl(), DAY_SECONDS);
    }

    #[test]
    fn test_default_schedule_intervals() {
        let config = crate::config::Settings::default().tasks;
        let schedule = default_schedule(&config);
        let emails = schedule.iter().find(|e| e.job == Job::SendPendingEmails).unwrap();
        assert_eq!(emails.cadence, Cadence::Every(Duration::from_secs(60)));
        let reminders = schedule.iter().find(|e| e.job == Job::SendDateReminders).unwrap();
        assert_eq!(reminders.cadence, Cadence::DailyAt { hour: 5 });
        assert_eq!(schedule.len(), 6);
    }
}
