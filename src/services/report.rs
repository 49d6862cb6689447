//! Stored reports generated in the background

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::database::filters::{FilterSet, PageRequest, Pagination};
use crate::database::DatabaseService;
use crate::models::{EmailTemplate, GenerateReportRequest, Report, ReportFilters, ReportStatus, ReportType};
use crate::services::auth::{AuthContext, Permission};
use crate::services::email::EmailService;
use crate::services::statistics::{ensure_supported, StatisticsService};
use crate::tasks::{Job, TaskQueue};
use crate::utils::errors::{SchoolEventsError, Result};
use crate::utils::helpers::json_rows_to_csv;
use crate::utils::logging::log_admin_action;

/// Download formats of a completed report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = SchoolEventsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(SchoolEventsError::BadRequest(format!("Unsupported export format: {}", other))),
        }
    }
}

/// Rendered export body
#[derive(Debug, Clone, PartialEq)]
pub struct ReportExport {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Clone, Debug)]
pub struct ReportService {
    db: DatabaseService,
    statistics: StatisticsService,
    emails: EmailService,
    queue: TaskQueue,
}

impl ReportService {
    pub fn new(db: DatabaseService, statistics: StatisticsService, emails: EmailService, queue: TaskQueue) -> Self {
        Self { db, statistics, emails, queue }
    }

    /// Store a pending report and hand it to the worker
    pub async fn request_report(&self, actor: &AuthContext, request: GenerateReportRequest) -> Result<Report> {
        actor.require(Permission::ManageReports)?;
        ensure_supported(request.report_type)?;

        let report = self
            .db
            .reports
            .create(request.report_type, &request.filters, Some(actor.user_id()))
            .await?;
        if let Err(e) = self.queue.enqueue(Job::GenerateReport { report_id: report.id }).await {
            // nothing would ever pick the row up
            self.abandon(report.id, &format!("Could not queue report generation: {}", e)).await?;
            return Err(e);
        }

        log_admin_action(actor.user_id(), "report:generate", Some(report.id.to_string().as_str()), Some(request.report_type.as_str()));
        Ok(report)
    }

    /// Worker side: fill a pending report
    pub async fn generate(&self, report_id: i64) -> Result<ReportStatus> {
        let report = self
            .db
            .reports
            .find_by_id(report_id)
            .await?
            .ok_or(SchoolEventsError::ReportNotFound { report_id })?;
        if report.status != ReportStatus::Pending.as_str() {
            return Ok(report.status.parse()?);
        }

        match self.build(&report).await {
            Ok(data) => {
                self.db.reports.complete(report_id, &data).await?;
                info!(report_id, report_type = %report.report_type, "Report completed");
                self.notify_ready(&report).await;
                Ok(ReportStatus::Completed)
            }
            Err(e) if e.is_recoverable() => Err(e),
            Err(e) => {
                warn!(report_id, error = %e, "Report generation failed");
                self.db.reports.fail(report_id, &e.to_string()).await?;
                Ok(ReportStatus::Failed)
            }
        }
    }

    /// Mark a report that will never be generated as failed; finished reports are left alone
    pub async fn abandon(&self, report_id: i64, reason: &str) -> Result<()> {
        let Some(report) = self.db.reports.find_by_id(report_id).await? else {
            return Ok(());
        };
        if report.status == ReportStatus::Pending.as_str() {
            warn!(report_id, reason, "Report abandoned");
            self.db.reports.fail(report_id, reason).await?;
        }
        Ok(())
    }

    async fn build(&self, report: &Report) -> Result<Value> {
        let report_type: ReportType = report.report_type.parse()?;
        let filters: ReportFilters = serde_json::from_value(report.filters.clone())?;
        let (statistics, rows) = futures::try_join!(
            self.statistics.generate(report_type, &filters),
            self.statistics.rows(report_type, &filters),
        )?;
        Ok(json!({
            "statistics": statistics,
            "rows": rows,
        }))
    }

    async fn notify_ready(&self, report: &Report) {
        let Some(user_id) = report.generated_by else { return };
        let result: Result<()> = async {
            let Some(user) = self.db.users.find_by_id(user_id).await? else { return Ok(()) };
            let email = self.emails.compose(
                EmailTemplate::ReportReady,
                &user.preferred_language,
                &user.user_email,
                Some(user.user_id),
                json!({
                    "first_name": user.first_name,
                    "report_id": report.id,
                    "report_type": report.report_type,
                }),
            );
            self.emails.queue_email(email).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(report_id = report.id, error = %e, "Failed to queue report email");
        }
    }

    pub async fn get_report(&self, actor: &AuthContext, report_id: i64) -> Result<Report> {
        actor.require(Permission::ManageReports)?;
        self.db
            .reports
            .find_by_id(report_id)
            .await?
            .ok_or(SchoolEventsError::ReportNotFound { report_id })
    }

    pub async fn list_reports(&self, actor: &AuthContext, filters: &FilterSet, page: PageRequest) -> Result<Pagination<Report>> {
        actor.require(Permission::ManageReports)?;
        self.db.reports.list(filters, page).await
    }

    pub async fn delete_report(&self, actor: &AuthContext, report_id: i64) -> Result<()> {
        actor.require(Permission::ManageReports)?;
        if !self.db.reports.delete(report_id).await? {
            return Err(SchoolEventsError::ReportNotFound { report_id });
        }
        log_admin_action(actor.user_id(), "report:delete", Some(report_id.to_string().as_str()), None);
        Ok(())
    }

    pub async fn export_report(&self, actor: &AuthContext, report_id: i64, format: ExportFormat) -> Result<ReportExport> {
        let report = self.get_report(actor, report_id).await?;
        render_export(&report, format)
    }
}

/// CSV of the row-level data, or the whole stored payload as JSON
pub fn render_export(report: &Report, format: ExportFormat) -> Result<ReportExport> {
    let data = match (&report.data, report.status.as_str()) {
        (Some(data), "completed") => data,
        _ => {
            return Err(SchoolEventsError::BadRequest(format!(
                "Report {} is not ready ({})",
                report.id, report.status
            )))
        }
    };

    let stem = format!("report_{}_{}", report.report_type, report.id);
    Ok(match format {
        ExportFormat::Csv => {
            let rows = data.get("rows").and_then(Value::as_array).cloned().unwrap_or_default();
            ReportExport {
                filename: format!("{}.csv", stem),
                content_type: "text/csv; charset=utf-8",
                body: json_rows_to_csv(&rows),
            }
        }
        ExportFormat::Json => ReportExport {
            filename: format!("{}.json", stem),
            content_type: "application/json",
            body: serde_json::to_string_pretty(data)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn report(status: &str, data: Option<Value>) -> Report {
        Report {
            id: 7,
            report_type: "reservation".to_string(),
            status: status.to_string(),
            generated_on: Utc::now(),
            generated_by: Some(1),
            filters: json!({}),
            data,
            error: None,
        }
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_pending_report_cannot_be_exported() {
        assert_matches!(
            render_export(&report("pending", None), ExportFormat::Csv),
            Err(SchoolEventsError::BadRequest(_))
        );
    }

    #[test]
    fn test_csv_export_uses_rows() {
        let data = json!({
            "statistics": {"summary": {}},
            "rows": [{"reservation_id": 1, "status": "confirmed"}],
        });
        let export = render_export(&report("completed", Some(data)), ExportFormat::Csv).unwrap();
        assert_eq!(export.filename, "report_reservation_7.csv");
        assert!(export.body.contains("confirmed"));

        let json_export = render_export(&report("completed", Some(json!({"rows": []}))), ExportFormat::Json).unwrap();
        assert_eq!(json_export.content_type, "application/json");
    }
}
