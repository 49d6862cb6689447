//! Redis backed job queue shared by the API, worker and beat processes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::TasksConfig;
use crate::services::redis::RedisService;
use crate::utils::errors::Result;
use crate::utils::helpers::generate_uuid;

/// Background work understood by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    SendEmail { email_log_id: i64 },
    SendPendingEmails,
    GenerateReport { report_id: i64 },
    ProcessWaitingList { event_date_id: i64 },
    ProcessWaitingLists,
    CompletePastEventDates,
    SendDateReminders,
    RemoveUnusedFiles,
    CleanupExpiredData,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::SendEmail { .. } => "send_email",
            Job::SendPendingEmails => "send_pending_emails",
            Job::GenerateReport { .. } => "generate_report",
            Job::ProcessWaitingList { .. } => "process_waiting_list",
            Job::ProcessWaitingLists => "process_waiting_lists",
            Job::CompletePastEventDates => "complete_past_event_dates",
            Job::SendDateReminders => "send_date_reminders",
            Job::RemoveUnusedFiles => "remove_unused_files",
            Job::CleanupExpiredData => "cleanup_expired_data",
        }
    }
}

/// Queue payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: String,
    pub job: Job,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(job: Job) -> Self {
        Self {
            id: generate_uuid(),
            job,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// What happened to a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Retried { attempts: u32 },
    DeadLettered,
}

/// Outcome after the `attempts`-th failure; `max_retries` counts every run, the first included
pub fn failure_outcome(attempts: u32, max_retries: u32) -> FailureOutcome {
    if attempts >= max_retries {
        FailureOutcome::DeadLettered
    } else {
        FailureOutcome::Retried { attempts }
    }
}

#[derive(Clone, Debug)]
pub struct TaskQueue {
    redis: RedisService,
    queue_key: String,
    dead_letter_key: String,
    max_retries: u32,
}

impl TaskQueue {
    pub fn new(redis: RedisService, config: &TasksConfig) -> Self {
        Self {
            redis,
            queue_key: format!("queue:{}", config.queue_name),
            dead_letter_key: format!("queue:{}", config.dead_letter_queue),
            max_retries: config.max_retries,
        }
    }

    /// Push a new job; returns its id
    pub async fn enqueue(&self, job: Job) -> Result<String> {
        let envelope = JobEnvelope::new(job);
        self.push(&self.queue_key, &envelope).await?;
        debug!(job = envelope.job.name(), job_id = %envelope.id, "Job enqueued");
        Ok(envelope.id)
    }

    /// Enqueue and only log a failure; the outbox or beat picks the work up later
    pub async fn enqueue_or_log(&self, job: Job) {
        let name = job.name();
        if let Err(e) = self.enqueue(job).await {
            warn!(job = name, error = %e, "Failed to enqueue job");
        }
    }

    async fn push(&self, list: &str, envelope: &JobEnvelope) -> Result<()> {
        let payload = serde_json::to_string(envelope)?;
        self.redis.push(list, &payload).await?;
        Ok(())
    }

    /// Wait up to `timeout_seconds` for the next job
    pub async fn next(&self, timeout_seconds: u64) -> Result<Option<JobEnvelope>> {
        let Some(payload) = self.redis.pop_blocking(&self.queue_key, timeout_seconds).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<JobEnvelope>(&payload) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                error!(error = %e, "Unreadable job payload moved to dead letter queue");
                self.redis.push(&self.dead_letter_key, &payload).await?;
                Ok(None)
            }
        }
    }

    /// Re-enqueue with one more attempt, or park it once retries are used up
    pub async fn fail(&self, mut envelope: JobEnvelope) -> Result<FailureOutcome> {
        envelope.attempts = envelope.attempts.saturating_add(1);
        let outcome = failure_outcome(envelope.attempts, self.max_retries);
        let list = match outcome {
            FailureOutcome::Retried { .. } => &self.queue_key,
            FailureOutcome::DeadLettered => &self.dead_letter_key,
        };
        self.push(list, &envelope).await?;
        Ok(outcome)
    }

    pub async fn pending(&self) -> Result<i64> {
        self.redis.list_length(&self.queue_key).await
    }

    pub async fn dead_lettered(&self) -> Result<i64> {
        self.redis.list_length(&self.dead_letter_key).await
    }

    pub fn redis(&self) -> &RedisService {
        &self.redis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_wire_format() {
        let envelope = JobEnvelope {
            id: "abc".to_string(),
            job: Job::SendEmail { email_log_id: 42 },
            attempts: 1,
            enqueued_at: "2024-08-20T08:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["job"], json!({"type": "send_email", "email_log_id": 42}));
        assert_eq!(value["attempts"], json!(1));

        let unit = serde_json::to_value(Job::CompletePastEventDates).unwrap();
        assert_eq!(unit, json!({"type": "complete_past_event_dates"}));
    }

    #[test]
    fn test_job_payload_from_older_producer() {
        let raw = r#"{"id":"1","job":{"type":"process_waiting_list","event_date_id":9},"attempts":0,"enqueued_at":"2024-08-20T08:00:00Z"}"#;
        let envelope: JobEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.job, Job::ProcessWaitingList { event_date_id: 9 });
        assert_eq!(envelope.job.name(), "process_waiting_list");
    }

    #[test]
    fn test_new_envelope_starts_at_zero_attempts() {
        let envelope = JobEnvelope::new(Job::SendPendingEmails);
        assert_eq!(envelope.attempts, 0);
        assert!(!envelope.id.is_empty());
    }

    #[test]
    fn test_retries_stop_at_max_retries() {
        assert_eq!(failure_outcome(1, 3), FailureOutcome::Retried { attempts: 1 });
        assert_eq!(failure_outcome(2, 3), FailureOutcome::Retried { attempts: 2 });
        assert_eq!(failure_outcome(3, 3), FailureOutcome::DeadLettered);
        assert_eq!(failure_outcome(4, 3), FailureOutcome::DeadLettered);
        // no retries configured: the first failure is final
        assert_eq!(failure_outcome(1, 0), FailureOutcome::DeadLettered);
        assert_eq!(failure_outcome(1, 1), FailureOutcome::DeadLettered);
    }

    #[test]
    fn test_queue_keys() {
        let settings = crate::config::Settings::default();
        let queue = TaskQueue::new(RedisService::new(settings.clone()).unwrap(), &settings.tasks);
        assert_eq!(queue.queue_key, "queue:default");
        assert_eq!(queue.dead_letter_key, "queue:dead");
    }
}
