//! Statistics, stored report and audit log models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

text_enum! {
    ReportType {
        EventSummary => "event_summary",
        Attendance => "attendance",
        Feedback => "feedback",
        Reservation => "reservation",
    }
}

text_enum! {
    ReportStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Filters shared by statistics and stored reports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub user_id: Option<i64>,
    pub event_type: Option<super::EventType>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub reservation_status: Option<super::ReservationStatus>,
    pub target_group: Option<super::TargetGroup>,
    pub organizer_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReportRequest {
    pub report_type: ReportType,
    #[serde(flatten)]
    pub filters: ReportFilters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

impl ChartData {
    pub fn from_pairs<I: IntoIterator<Item = (String, f64)>>(pairs: I) -> Self {
        let (labels, data) = pairs.into_iter().unzip();
        Self { labels, data }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsResponse {
    pub summary: serde_json::Value,
    pub details: serde_json::Value,
    pub charts: BTreeMap<String, ChartData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: i64,
    pub report_type: String,
    pub status: String,
    pub generated_on: DateTime<Utc>,
    pub generated_by: Option<i64>,
    pub filters: serde_json::Value,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub log_id: i64,
    pub timestamp: DateTime<Utc>,
    pub table_name: String,
    pub user_id: Option<i64>,
    pub table_primary_key: String,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditLog {
    pub table_name: String,
    pub user_id: Option<i64>,
    pub table_primary_key: String,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
}

impl NewAuditLog {
    /// Snapshot a change of a serializable row
    pub fn change<T: Serialize>(
        table: &str,
        primary_key: i64,
        user_id: Option<i64>,
        old: Option<&T>,
        new: Option<&T>,
    ) -> Self {
        Self {
            table_name: table.to_string(),
            user_id,
            table_primary_key: primary_key.to_string(),
            old_data: old.and_then(|o| serde_json::to_value(o).ok()),
            new_data: new.and_then(|n| serde_json::to_value(n).ok()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangelogQuery {
    pub table_name: String,
    pub record_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_flattens_filters() {
        let req: GenerateReportRequest = serde_json::from_str(
            r#"{"report_type":"reservation","region":"Bratislavsky","reservation_status":"confirmed"}"#,
        )
        .unwrap();
        assert_eq!(req.report_type, ReportType::Reservation);
        assert_eq!(req.filters.region.as_deref(), Some("Bratislavsky"));
        assert_eq!(req.filters.reservation_status, Some(super::super::ReservationStatus::Confirmed));
    }

    #[test]
    fn test_chart_from_pairs() {
        let chart = ChartData::from_pairs(vec![("theater".to_string(), 2.0), ("concert".to_string(), 1.0)]);
        assert_eq!(chart.labels, vec!["theater", "concert"]);
        assert_eq!(chart.data, vec![2.0, 1.0]);
    }
}
