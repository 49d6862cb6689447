//! Statistics built from aggregate queries
//!
//! Each report type produces a summary, detail tables and chart series.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use crate::database::repositories::statistics::LabelledCount;
use crate::database::{EventGrouping, StatisticsRepository};
use crate::models::{ChartData, ReportFilters, ReportType, StatisticsResponse};
use crate::utils::errors::{SchoolEventsError, Result};

pub const MSG_INVALID_REPORT_TYPE: &str = "Invalid report type";

#[derive(Clone, Debug)]
pub struct StatisticsService {
    statistics: StatisticsRepository,
}

impl StatisticsService {
    pub fn new(statistics: StatisticsRepository) -> Self {
        Self { statistics }
    }

    pub async fn generate(&self, report_type: ReportType, filters: &ReportFilters) -> Result<StatisticsResponse> {
        ensure_supported(report_type)?;
        debug!(report_type = %report_type, ?filters, "Building statistics");
        match report_type {
            ReportType::EventSummary => self.event_summary(filters).await,
            ReportType::Attendance => self.attendance(filters).await,
            ReportType::Reservation => self.reservations(filters).await,
            ReportType::Feedback => Err(SchoolEventsError::BadRequest(MSG_INVALID_REPORT_TYPE.to_string())),
        }
    }

    /// Row-level data stored with generated reports
    pub async fn rows(&self, report_type: ReportType, filters: &ReportFilters) -> Result<Vec<Value>> {
        ensure_supported(report_type)?;
        match report_type {
            ReportType::EventSummary => self.statistics.event_date_rows(filters).await,
            ReportType::Attendance => self.statistics.reservation_rows(filters, true).await,
            _ => self.statistics.reservation_rows(filters, false).await,
        }
    }

    async fn event_summary(&self, filters: &ReportFilters) -> Result<StatisticsResponse> {
        let totals = self.statistics.capacity_totals(filters).await?;
        let by_type = self.statistics.events_grouped_by(EventGrouping::EventType, filters).await?;
        let by_region = self.statistics.events_grouped_by(EventGrouping::Region, filters).await?;

        let mut charts = BTreeMap::new();
        charts.insert("events_by_type".to_string(), chart(&by_type, |row| row.count));
        charts.insert("booked_seats_by_region".to_string(), chart(&by_region, |row| row.seats));

        Ok(StatisticsResponse {
            summary: json!({
                "total_events": totals.events,
                "total_event_dates": totals.event_dates,
                "total_capacity": totals.capacity,
                "available_spots": totals.available_spots,
                "booked_seats": totals.booked(),
                "occupancy_rate": totals.occupancy_rate(),
            }),
            details: json!({
                "by_event_type": table(&by_type),
                "by_region": table(&by_region),
            }),
            charts,
        })
    }

    async fn attendance(&self, filters: &ReportFilters) -> Result<StatisticsResponse> {
        let totals = self.statistics.attendance_totals(filters).await?;
        let by_event = self.statistics.attendance_by_event(filters).await?;
        let by_month = self.statistics.attendance_by_month(filters).await?;

        let mut charts = BTreeMap::new();
        charts.insert("attendees_by_month".to_string(), chart(&by_month, |row| row.seats));

        Ok(StatisticsResponse {
            summary: json!({
                "total_reservations": totals.reservations,
                "total_students": totals.students,
                "total_teachers": totals.teachers,
                "total_attendees": totals.attendees(),
            }),
            details: json!({
                "by_event": table(&by_event),
                "by_month": table(&by_month),
            }),
            charts,
        })
    }

    async fn reservations(&self, filters: &ReportFilters) -> Result<StatisticsResponse> {
        let by_status = self.statistics.reservations_by_status(filters).await?;
        let total: i64 = by_status.iter().map(|row| row.count).sum();
        let seats: i64 = by_status.iter().map(|row| row.seats).sum();

        let mut charts = BTreeMap::new();
        charts.insert("reservations_by_status".to_string(), chart(&by_status, |row| row.count));

        Ok(StatisticsResponse {
            summary: json!({
                "total_reservations": total,
                "total_seats": seats,
            }),
            details: json!({ "by_status": table(&by_status) }),
            charts,
        })
    }
}

/// Feedback is not collected anywhere, so it cannot be reported on
pub fn ensure_supported(report_type: ReportType) -> Result<()> {
    if report_type == ReportType::Feedback {
        return Err(SchoolEventsError::BadRequest(MSG_INVALID_REPORT_TYPE.to_string()));
    }
    Ok(())
}

fn chart(rows: &[LabelledCount], value: impl Fn(&LabelledCount) -> i64) -> ChartData {
    ChartData::from_pairs(rows.iter().map(|row| (row.label.clone(), value(row) as f64)))
}

fn table(rows: &[LabelledCount]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| json!({"label": row.label, "count": row.count, "seats": row.seats}))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn rows() -> Vec<LabelledCount> {
        vec![
            LabelledCount { label: "theater".into(), count: 4, seats: 120 },
            LabelledCount { label: "concert".into(), count: 1, seats: 30 },
        ]
    }

    #[test]
    fn test_feedback_is_rejected() {
        assert_matches!(
            ensure_supported(ReportType::Feedback),
            Err(SchoolEventsError::BadRequest(msg)) if msg == MSG_INVALID_REPORT_TYPE
        );
        assert!(ensure_supported(ReportType::Attendance).is_ok());
    }

    #[test]
    fn test_chart_keeps_row_order() {
        let chart = chart(&rows(), |row| row.seats);
        assert_eq!(chart.labels, vec!["theater", "concert"]);
        assert_eq!(chart.data, vec![120.0, 30.0]);
    }

    #[test]
    fn test_table_rows() {
        let table = table(&rows());
        assert_eq!(table[1], json!({"label": "concert", "count": 1, "seats": 30}));
    }
}
