//! Aggregate queries behind statistics and generated reports

use sqlx::{PgPool, Postgres, QueryBuilder};
use crate::models::report::ReportFilters;
use crate::utils::errors::SchoolEventsError;

const SEAT_HOLDING: &str = "r.status IN ('created', 'pending', 'confirmed')";

/// Totals over event dates matching the filters
#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
pub struct CapacityTotals {
    pub events: i64,
    pub event_dates: i64,
    pub capacity: i64,
    pub available_spots: i64,
}

impl CapacityTotals {
    pub fn booked(&self) -> i64 {
        self.capacity - self.available_spots
    }

    /// Booked share of capacity in percent, two decimals
    pub fn occupancy_rate(&self) -> f64 {
        if self.capacity <= 0 {
            return 0.0;
        }
        ((self.booked() as f64 / self.capacity as f64) * 10_000.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
pub struct AttendanceTotals {
    pub reservations: i64,
    pub students: i64,
    pub teachers: i64,
}

impl AttendanceTotals {
    pub fn attendees(&self) -> i64 {
        self.students + self.teachers
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LabelledCount {
    pub label: String,
    pub count: i64,
    pub seats: i64,
}

#[derive(Clone, Debug)]
pub struct StatisticsRepository {
    pool: PgPool,
}

impl StatisticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn capacity_totals(&self, filters: &ReportFilters) -> Result<CapacityTotals, SchoolEventsError> {
        let mut qb = QueryBuilder::new(
            r#"SELECT COUNT(DISTINCT e.id) AS events, COUNT(ed.id) AS event_dates,
                      COALESCE(SUM(ed.capacity), 0)::BIGINT AS capacity,
                      COALESCE(SUM(ed.available_spots), 0)::BIGINT AS available_spots
               FROM events e JOIN event_dates ed ON ed.event_id = e.id WHERE TRUE"#,
        );
        push_event_filters(&mut qb, filters);
        let totals = qb.build_query_as::<CapacityTotals>().fetch_one(&self.pool).await?;
        Ok(totals)
    }

    /// Events grouped by one of their text columns
    pub async fn events_grouped_by(
        &self,
        column: EventGrouping,
        filters: &ReportFilters,
    ) -> Result<Vec<LabelledCount>, SchoolEventsError> {
        let mut qb = QueryBuilder::new(format!(
            r#"SELECT COALESCE(e.{col}, 'unknown') AS label, COUNT(DISTINCT e.id) AS count,
                      COALESCE(SUM(ed.capacity - ed.available_spots), 0)::BIGINT AS seats
               FROM events e JOIN event_dates ed ON ed.event_id = e.id WHERE TRUE"#,
            col = column.as_column()
        ));
        push_event_filters(&mut qb, filters);
        qb.push(" GROUP BY 1 ORDER BY 2 DESC, 1");
        let rows = qb.build_query_as::<LabelledCount>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Seat-holding reservations on occurrences that already took place
    pub async fn attendance_totals(&self, filters: &ReportFilters) -> Result<AttendanceTotals, SchoolEventsError> {
        let mut qb = attendance_base(
            r#"SELECT COUNT(r.id) AS reservations,
                      COALESCE(SUM(r.number_of_students), 0)::BIGINT AS students,
                      COALESCE(SUM(r.number_of_teachers), 0)::BIGINT AS teachers"#,
            filters,
        );
        let totals = qb.build_query_as::<AttendanceTotals>().fetch_one(&self.pool).await?;
        Ok(totals)
    }

    pub async fn attendance_by_event(&self, filters: &ReportFilters) -> Result<Vec<LabelledCount>, SchoolEventsError> {
        let mut qb = attendance_base(
            r#"SELECT e.title AS label, COUNT(r.id) AS count,
                      COALESCE(SUM(r.number_of_students + r.number_of_teachers), 0)::BIGINT AS seats"#,
            filters,
        );
        qb.push(" GROUP BY e.id, e.title ORDER BY 3 DESC, 1");
        let rows = qb.build_query_as::<LabelledCount>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn attendance_by_month(&self, filters: &ReportFilters) -> Result<Vec<LabelledCount>, SchoolEventsError> {
        let mut qb = attendance_base(
            r#"SELECT TO_CHAR(ed.date, 'YYYY-MM') AS label, COUNT(r.id) AS count,
                      COALESCE(SUM(r.number_of_students + r.number_of_teachers), 0)::BIGINT AS seats"#,
            filters,
        );
        qb.push(" GROUP BY 1 ORDER BY 1");
        let rows = qb.build_query_as::<LabelledCount>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn reservations_by_status(&self, filters: &ReportFilters) -> Result<Vec<LabelledCount>, SchoolEventsError> {
        let mut qb = reservation_base(
            r#"SELECT r.status AS label, COUNT(r.id) AS count,
                      COALESCE(SUM(r.number_of_students + r.number_of_teachers), 0)::BIGINT AS seats"#,
            filters,
        );
        qb.push(" GROUP BY r.status ORDER BY r.status");
        let rows = qb.build_query_as::<LabelledCount>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Row-level data of an event summary report, one row per occurrence
    pub async fn event_date_rows(&self, filters: &ReportFilters) -> Result<Vec<serde_json::Value>, SchoolEventsError> {
        let mut qb = QueryBuilder::new(
            r#"SELECT to_jsonb(x) FROM (
                 SELECT e.id AS event_id, e.title, e.event_type, e.region, e.district, ed.id AS event_date_id,
                        ed.date, ed.time, ed.status, ed.capacity, ed.available_spots
                 FROM events e JOIN event_dates ed ON ed.event_id = e.id WHERE TRUE"#,
        );
        push_event_filters(&mut qb, filters);
        qb.push(" ORDER BY ed.date, ed.time, ed.id) x");
        let rows = qb.build_query_scalar::<serde_json::Value>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Row-level data of reservation and attendance reports
    pub async fn reservation_rows(
        &self,
        filters: &ReportFilters,
        past_only: bool,
    ) -> Result<Vec<serde_json::Value>, SchoolEventsError> {
        let columns = r#"SELECT to_jsonb(x) FROM (
                 SELECT r.id AS reservation_id, r.local_reservation_code, r.status, r.number_of_students,
                        r.number_of_teachers, r.user_id, e.id AS event_id, e.title, ed.date, ed.time"#;
        let mut qb = if past_only {
            attendance_base(columns, filters)
        } else {
            reservation_base(columns, filters)
        };
        qb.push(" ORDER BY ed.date, r.id) x");
        let rows = qb.build_query_scalar::<serde_json::Value>().fetch_all(&self.pool).await?;
        Ok(rows)
    }
}

/// Text columns of `events` usable for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventGrouping {
    EventType,
    Region,
    District,
    TargetGroup,
}

impl EventGrouping {
    fn as_column(&self) -> &'static str {
        match self {
            EventGrouping::EventType => "event_type",
            EventGrouping::Region => "region",
            EventGrouping::District => "district",
            EventGrouping::TargetGroup => "target_group",
        }
    }
}

fn reservation_base<'a>(select: &str, filters: &ReportFilters) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "{select} FROM reservations r JOIN event_dates ed ON ed.id = r.event_date_id \
         JOIN events e ON e.id = r.event_id WHERE TRUE"
    ));
    push_event_filters(&mut qb, filters);
    if let Some(status) = filters.reservation_status {
        qb.push(" AND r.status = ");
        qb.push_bind(status.as_str());
    }
    if let Some(user_id) = filters.user_id {
        qb.push(" AND r.user_id = ");
        qb.push_bind(user_id);
    }
    qb
}

fn attendance_base<'a>(select: &str, filters: &ReportFilters) -> QueryBuilder<'a, Postgres> {
    let mut qb = reservation_base(select, filters);
    qb.push(format!(" AND {SEAT_HOLDING} AND ed.date < CURRENT_DATE"));
    qb
}

/// Filters on `events e` and `event_dates ed` shared by every aggregate
fn push_event_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ReportFilters) {
    if let Some(event_type) = filters.event_type {
        qb.push(" AND e.event_type = ");
        qb.push_bind(event_type.as_str());
    }
    if let Some(target_group) = filters.target_group {
        qb.push(" AND e.target_group = ");
        qb.push_bind(target_group.as_str());
    }
    if let Some(organizer_id) = filters.organizer_id {
        qb.push(" AND e.organizer_id = ");
        qb.push_bind(organizer_id);
    }
    if let Some(region) = &filters.region {
        qb.push(" AND e.region = ");
        qb.push_bind(region.clone());
    }
    if let Some(district) = &filters.district {
        qb.push(" AND e.district = ");
        qb.push_bind(district.clone());
    }
    if let Some(start) = filters.start_date {
        qb.push(" AND ed.date >= ");
        qb.push_bind(start);
    }
    if let Some(end) = filters.end_date {
        qb.push(" AND ed.date <= ");
        qb.push_bind(end);
    }
}
