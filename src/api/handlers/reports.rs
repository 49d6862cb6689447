//! Statistics on demand and stored reports

use axum::extract::State;
use serde::Deserialize;

use crate::api::error::{ApiJson, ApiPath, ApiQuery};
use crate::api::extract::{CurrentUser, ListParams};
use crate::api::response::{ApiResult, Download, GenericResponse};
use crate::api::state::AppState;
use crate::database::filters::Pagination;
use crate::database::repositories::report::REPORTS;
use crate::models::{GenerateReportRequest, Report, ReportFilters, ReportType, StatisticsResponse};
use crate::services::statistics::MSG_INVALID_REPORT_TYPE;
use crate::services::{ExportFormat, Permission, ReportExport};
use crate::utils::errors::{Result, SchoolEventsError};

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub report_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

fn parse_report_type(raw: &str) -> Result<ReportType> {
    raw.parse()
        .map_err(|_| SchoolEventsError::BadRequest(MSG_INVALID_REPORT_TYPE.to_string()))
}

impl From<ReportExport> for Download {
    fn from(export: ReportExport) -> Self {
        Self {
            filename: export.filename,
            content_type: export.content_type,
            body: export.body.into_bytes(),
        }
    }
}

/// `POST /statistics/statistics?report_type=`
pub async fn statistics(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<StatisticsQuery>,
    body: Option<ApiJson<ReportFilters>>,
) -> ApiResult<StatisticsResponse> {
    user.ctx.require(Permission::ViewStatistics)?;
    let report_type = parse_report_type(&query.report_type)?;
    let filters = body.map(|ApiJson(filters)| filters).unwrap_or_default();
    let statistics = state.services.statistics_service.generate(report_type, &filters).await?;
    Ok(GenericResponse::ok("Statistics generated successfully", statistics).with_unread(user.unread_notification))
}

pub async fn generate_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(request): ApiJson<GenerateReportRequest>,
) -> ApiResult<Report> {
    let report = state.services.report_service.request_report(&user.ctx, request).await?;
    Ok(GenericResponse::created("Report generation started", report).with_unread(user.unread_notification))
}

pub async fn get_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(report_id): ApiPath<i64>,
) -> ApiResult<Report> {
    let report = state.services.report_service.get_report(&user.ctx, report_id).await?;
    Ok(GenericResponse::ok("Report retrieved successfully", report).with_unread(user.unread_notification))
}

pub async fn list_reports(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Pagination<Report>> {
    let (filters, page) = params.parse(&REPORTS)?;
    let reports = state.services.report_service.list_reports(&user.ctx, &filters, page).await?;
    Ok(GenericResponse::ok("Reports retrieved successfully", reports).with_unread(user.unread_notification))
}

pub async fn delete_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(report_id): ApiPath<i64>,
) -> ApiResult<()> {
    state.services.report_service.delete_report(&user.ctx, report_id).await?;
    Ok(GenericResponse::ok("Report deleted successfully", ()).with_unread(user.unread_notification))
}

pub async fn export_report(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(report_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Download> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse()?,
        None => ExportFormat::default(),
    };
    let export = state.services.report_service.export_report(&user.ctx, report_id, format).await?;
    Ok(export.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_report_type_parsing() {
        assert_eq!(parse_report_type("attendance").unwrap(), ReportType::Attendance);
        assert_matches!(
            parse_report_type("revenue"),
            Err(SchoolEventsError::BadRequest(msg)) if msg == "Invalid report type"
        );
    }
}
