//! Outbox delivery against a real database

mod helpers;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use helpers::*;
use school_events::{
    models::{EmailStatus, EmailTemplate},
    services::{email::BatchOutcome, Mailer},
    Result,
};
use serde_json::json;
use serial_test::serial;

#[derive(Debug, Default)]
struct RecordingMailer {
    sent: Mutex<Vec<String>>,
}

impl RecordingMailer {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, _subject: &str, _html: &str) -> Result<String> {
        // widen the window in which a second worker could pick up the same row
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.sent.lock().unwrap().push(to.to_string());
        Ok("250 OK".to_string())
    }
}

#[tokio::test]
#[serial]
async fn test_outbox_row_is_delivered_once() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let mailer = Arc::new(RecordingMailer::default());
    let services = ctx.services_with_mailer(mailer.clone()).await;
    let emails = &services.email_service;

    let email = emails.compose(
        EmailTemplate::UserAccountRejection,
        "sk",
        "jana@school.sk",
        None,
        json!({"first_name": "Jana"}),
    );
    let mut conn = services.db.pool().acquire().await.unwrap();
    let log = emails.record(&mut conn, &email).await.unwrap();
    drop(conn);

    // a single-row job and the periodic batch race for the same row
    let (single, batch) = tokio::join!(emails.send_email_log(log.email_log_id), emails.send_pending_batch());
    single.unwrap();
    batch.unwrap();
    assert_eq!(mailer.count(), 1);

    let stored = services.db.email_logs.find_by_id(log.email_log_id).await.unwrap().unwrap();
    assert_eq!(stored.status, EmailStatus::Success.as_str());

    assert_eq!(emails.send_email_log(log.email_log_id).await.unwrap(), EmailStatus::Success);
    assert_eq!(emails.send_pending_batch().await.unwrap(), BatchOutcome::default());
    assert_eq!(mailer.count(), 1);
}

#[tokio::test]
#[serial]
async fn test_claimed_rows_are_skipped_until_abandoned() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let services = &ctx.services;
    let email = services.email_service.compose(
        EmailTemplate::UserAccountRejection,
        "sk",
        "peter@school.sk",
        None,
        json!({"first_name": "Peter"}),
    );
    let mut conn = services.db.pool().acquire().await.unwrap();
    let log = services.email_service.record(&mut conn, &email).await.unwrap();
    drop(conn);

    let repo = &services.db.email_logs;
    let timeout = Duration::minutes(10);
    let claimed = repo.claim(log.email_log_id, 3, timeout).await.unwrap().unwrap();
    assert_eq!(claimed.status, EmailStatus::Sending.as_str());

    assert!(repo.claim(log.email_log_id, 3, timeout).await.unwrap().is_none());
    assert!(repo.claim_batch(50, 3, timeout).await.unwrap().is_empty());

    // a claim older than the timeout belongs to a worker that died mid-send
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let reclaimed = repo.claim_batch(50, 3, Duration::milliseconds(10)).await.unwrap();
    assert_eq!(reclaimed.iter().map(|l| l.email_log_id).collect::<Vec<_>>(), vec![log.email_log_id]);

    repo.mark_failed(log.email_log_id, "550 mailbox unavailable").await.unwrap();
    assert!(repo.claim(log.email_log_id, 2, timeout).await.unwrap().is_some());
    repo.mark_failed(log.email_log_id, "550 mailbox unavailable").await.unwrap();
    // two failed attempts spend a budget of two
    assert!(repo.claim(log.email_log_id, 2, timeout).await.unwrap().is_none());
}
