//! Report jobs that can no longer run must not leave reports pending

mod helpers;

use helpers::*;
use school_events::{
    models::{GenerateReportRequest, ReportFilters, ReportStatus, ReportType, UserRole},
    tasks::Job,
    Worker,
};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_report_is_failed_when_queue_is_unreachable() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let admin = create_user(&ctx, "admin@admin.com", UserRole::Admin).await;
    let actor = ctx.auth(admin.user_id).await;

    let mut settings = ctx.settings.clone();
    settings.redis.url = "redis://127.0.0.1:1/".to_string();
    let services = ctx.services_with_settings(&settings).await;

    let request = GenerateReportRequest { report_type: ReportType::Attendance, filters: ReportFilters::default() };
    assert!(services.report_service.request_report(&actor, request).await.is_err());

    let (status, error): (String, Option<String>) =
        sqlx::query_as("SELECT status, error FROM reports ORDER BY id DESC LIMIT 1")
            .fetch_one(&ctx.database.pool)
            .await
            .unwrap();
    assert_eq!(status, ReportStatus::Failed.as_str());
    assert!(error.unwrap().starts_with("Could not queue report generation"));
}

#[tokio::test]
#[serial]
async fn test_dead_lettered_report_job_fails_the_report() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let reports = &ctx.services.db.reports;
    let pending = reports.create(ReportType::Reservation, &ReportFilters::default(), None).await.unwrap();
    let finished = reports.create(ReportType::Attendance, &ReportFilters::default(), None).await.unwrap();
    reports.complete(finished.id, &json!({"rows": []})).await.unwrap();

    let worker = Worker::new(ctx.services.clone(), ctx.settings.clone());
    worker.dead_lettered(&Job::GenerateReport { report_id: pending.id }, "database went away").await;
    worker.dead_lettered(&Job::GenerateReport { report_id: finished.id }, "late duplicate").await;
    // jobs without dependent state are ignored
    worker.dead_lettered(&Job::SendPendingEmails, "smtp down").await;

    let pending = reports.find_by_id(pending.id).await.unwrap().unwrap();
    assert_eq!(pending.status, ReportStatus::Failed.as_str());
    assert_eq!(pending.error.as_deref(), Some("database went away"));

    let finished = reports.find_by_id(finished.id).await.unwrap().unwrap();
    assert_eq!(finished.status, ReportStatus::Completed.as_str());
    assert_eq!(finished.error, None);
}
