//! Job execution

use std::time::Instant;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::services::ServiceFactory;
use crate::tasks::queue::{FailureOutcome, Job, JobEnvelope};
use crate::utils::errors::Result;
use crate::utils::logging::log_task_event;

/// Pulls jobs from the queue and runs them against the services
#[derive(Clone, Debug)]
pub struct Worker {
    services: ServiceFactory,
    settings: Settings,
}

impl Worker {
    pub fn new(services: ServiceFactory, settings: Settings) -> Self {
        Self { services, settings }
    }

    /// Run `worker_concurrency` slots until the stop flag flips
    pub async fn run(&self, stop: watch::Receiver<bool>) {
        let slots = self.settings.tasks.worker_concurrency.max(1);
        info!(slots, queue = %self.settings.tasks.queue_name, "Worker started");

        let mut set = JoinSet::new();
        for slot in 0..slots {
            let worker = self.clone();
            let stop = stop.clone();
            set.spawn(async move { worker.run_slot(slot, stop).await });
        }
        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker slot panicked");
            }
        }
        info!("Worker stopped");
    }

    async fn run_slot(&self, slot: usize, mut stop: watch::Receiver<bool>) {
        let timeout = self.settings.tasks.poll_timeout_seconds;
        loop {
            if *stop.borrow() {
                break;
            }

            let next = tokio::select! {
                next = self.services.queue.next(timeout) => next,
                _ = stop.changed() => break,
            };

            match next {
                Ok(Some(envelope)) => self.execute(envelope).await,
                Ok(None) => {}
                Err(e) => {
                    warn!(slot, error = %e, "Queue unavailable, backing off");
                    tokio::time::sleep(std::time::Duration::from_secs(timeout.max(1))).await;
                }
            }
        }
        debug!(slot, "Worker slot finished");
    }

    /// Run one job; failures are re-queued or dead-lettered, never propagated
    pub async fn execute(&self, envelope: JobEnvelope) {
        let started = Instant::now();
        let name = envelope.job.name();
        let id = envelope.id.clone();
        let attempts = envelope.attempts;

        match self.handle(&envelope.job).await {
            Ok(details) => {
                debug!(job = name, duration_ms = started.elapsed().as_millis() as u64, "Job finished");
                log_task_event(name, &id, attempts, true, Some(&details.to_string()));
            }
            Err(e) => {
                log_task_event(name, &id, attempts, false, Some(&e.to_string()));
                let job = envelope.job.clone();
                match self.services.queue.fail(envelope).await {
                    Ok(FailureOutcome::Retried { attempts }) => {
                        info!(job = name, job_id = %id, attempts, "Job re-queued")
                    }
                    Ok(FailureOutcome::DeadLettered) => {
                        error!(job = name, job_id = %id, error = %e, "Job moved to dead letter queue");
                        self.dead_lettered(&job, &e.to_string()).await;
                    }
                    Err(queue_error) => {
                        error!(job = name, job_id = %id, error = %queue_error, "Failed job could not be re-queued")
                    }
                }
            }
        }
    }

    /// Settle state that was waiting on a job that will not run again
    pub async fn dead_lettered(&self, job: &Job, reason: &str) {
        if let Job::GenerateReport { report_id } = job {
            if let Err(e) = self.services.report_service.abandon(*report_id, reason).await {
                error!(report_id, error = %e, "Could not mark dead-lettered report as failed");
            }
        }
    }

    /// Dispatch a job to its service; returns a short summary
    pub async fn handle(&self, job: &Job) -> Result<serde_json::Value> {
        let services = &self.services;
        Ok(match job {
            Job::SendEmail { email_log_id } => {
                let status = services.email_service.send_email_log(*email_log_id).await?;
                json!({ "email_log_id": email_log_id, "status": status })
            }
            Job::SendPendingEmails => {
                let outcome = services.email_service.send_pending_batch().await?;
                json!(outcome)
            }
            Job::GenerateReport { report_id } => {
                let status = services.report_service.generate(*report_id).await?;
                json!({ "report_id": report_id, "status": status })
            }
            Job::ProcessWaitingList { event_date_id } => {
                let outcome = services.waiting_list_service.process(*event_date_id, None).await?;
                json!({ "event_date_id": event_date_id, "processed_entries": outcome.processed_entries })
            }
            Job::ProcessWaitingLists => {
                let processed = services.waiting_list_service.process_all().await?;
                json!({ "processed_entries": processed })
            }
            Job::CompletePastEventDates => {
                let completed = services.event_service.complete_past_dates().await?;
                json!({ "completed": completed })
            }
            Job::SendDateReminders => {
                let sent = services.event_service.send_date_reminders().await?;
                json!({ "reminders": sent })
            }
            Job::RemoveUnusedFiles => {
                let removed = services.event_service.remove_unused_files().await?;
                json!({ "removed": removed })
            }
            Job::CleanupExpiredData => {
                services
                    .db
                    .cleanup_expired_data(self.settings.tasks.notification_retention_days)
                    .await?
            }
        })
    }
}
