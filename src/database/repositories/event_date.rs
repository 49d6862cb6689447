//! Event date (occurrence) repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, NaiveDate, Utc};
use crate::models::event::{lock_time_for, local_to_utc, EventDate, EventDateInput, EventDateStatus};
use crate::utils::errors::SchoolEventsError;

#[derive(Clone, Debug)]
pub struct EventDateRepository {
    pool: PgPool,
}

impl EventDateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an occurrence with full capacity available
    pub async fn create(
        &self,
        conn: &mut PgConnection,
        event_id: i64,
        capacity: i32,
        input: &EventDateInput,
        lock_hours_before: i64,
    ) -> Result<EventDate, SchoolEventsError> {
        let starts_at = local_to_utc(input.date.and_time(input.time));
        let now = Utc::now();
        let date = sqlx::query_as::<_, EventDate>(
            r#"
            INSERT INTO event_dates (event_id, date, time, capacity, available_spots, lock_time, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4, $5, 'scheduled', $6, $6)
            RETURNING *
            "#
        )
        .bind(event_id)
        .bind(input.date)
        .bind(input.time)
        .bind(capacity)
        .bind(lock_time_for(starts_at, lock_hours_before))
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(date)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<EventDate>, SchoolEventsError> {
        let date = sqlx::query_as::<_, EventDate>("SELECT * FROM event_dates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(date)
    }

    /// Row-lock an occurrence; every seat count change goes through this
    pub async fn find_for_update(&self, conn: &mut PgConnection, id: i64) -> Result<EventDate, SchoolEventsError> {
        sqlx::query_as::<_, EventDate>("SELECT * FROM event_dates WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(SchoolEventsError::EventDateNotFound { event_date_id: id })
    }

    pub async fn list_by_event(&self, event_id: i64) -> Result<Vec<EventDate>, SchoolEventsError> {
        self.list_by_events(&[event_id]).await
    }

    pub async fn list_by_events(&self, event_ids: &[i64]) -> Result<Vec<EventDate>, SchoolEventsError> {
        let dates = sqlx::query_as::<_, EventDate>(
            "SELECT * FROM event_dates WHERE event_id = ANY($1) ORDER BY date, time, id"
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(dates)
    }

    /// Apply a new event capacity to every occurrence, keeping booked seats
    pub async fn update_capacity_for_event(
        &self,
        conn: &mut PgConnection,
        event_id: i64,
        capacity: i32,
    ) -> Result<Vec<EventDate>, SchoolEventsError> {
        let dates = sqlx::query_as::<_, EventDate>(
            r#"
            UPDATE event_dates
            SET available_spots = GREATEST(0, $2 - (capacity - available_spots)),
                capacity = $2,
                updated_at = $3
            WHERE event_id = $1
            RETURNING *
            "#
        )
        .bind(event_id)
        .bind(capacity)
        .bind(Utc::now())
        .fetch_all(&mut *conn)
        .await?;

        Ok(dates)
    }

    /// Add `delta` seats back (positive) or take them (negative)
    pub async fn adjust_spots(&self, conn: &mut PgConnection, id: i64, delta: i32) -> Result<EventDate, SchoolEventsError> {
        sqlx::query_as::<_, EventDate>(
            r#"
            UPDATE event_dates
            SET available_spots = LEAST(capacity, GREATEST(0, available_spots + $2)), updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::EventDateNotFound { event_date_id: id })
    }

    pub async fn set_lock_time(
        &self,
        conn: &mut PgConnection,
        id: i64,
        lock_time: DateTime<Utc>,
    ) -> Result<EventDate, SchoolEventsError> {
        sqlx::query_as::<_, EventDate>(
            "UPDATE event_dates SET lock_time = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(lock_time)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::EventDateNotFound { event_date_id: id })
    }

    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: i64,
        status: EventDateStatus,
    ) -> Result<EventDate, SchoolEventsError> {
        sqlx::query_as::<_, EventDate>(
            "UPDATE event_dates SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::EventDateNotFound { event_date_id: id })
    }

    /// Cancel every scheduled occurrence of an event
    pub async fn cancel_for_event(&self, conn: &mut PgConnection, event_id: i64) -> Result<u64, SchoolEventsError> {
        let result = sqlx::query(
            "UPDATE event_dates SET status = 'cancelled', updated_at = $2 WHERE event_id = $1 AND status = 'scheduled'"
        )
        .bind(event_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Move scheduled occurrences whose start is in the past to completed_unpaid
    pub async fn mark_past_completed(&self) -> Result<Vec<EventDate>, SchoolEventsError> {
        let dates = sqlx::query_as::<_, EventDate>(
            r#"
            UPDATE event_dates
            SET status = 'completed_unpaid', updated_at = NOW()
            WHERE status = 'scheduled'
              AND ((date + time) AT TIME ZONE 'Europe/Bratislava') < NOW()
            RETURNING *
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(dates)
    }

    /// Upcoming open occurrences with free seats and someone waiting
    pub async fn ids_with_waiting_entries(&self) -> Result<Vec<i64>, SchoolEventsError> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT ed.id
            FROM event_dates ed
            JOIN waiting_list wl ON wl.event_date_id = ed.id AND wl.status = 'waiting'
            WHERE ed.status = 'scheduled' AND ed.available_spots > 0 AND ed.lock_time > NOW()
            ORDER BY ed.id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Scheduled occurrences on the given local date
    pub async fn scheduled_on(&self, day: NaiveDate) -> Result<Vec<EventDate>, SchoolEventsError> {
        let dates = sqlx::query_as::<_, EventDate>(
            "SELECT * FROM event_dates WHERE date = $1 AND status = 'scheduled' ORDER BY time, id"
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_date_repository_creation() {
        let pool = PgPool::connect("postgresql://test").await;
        if let Ok(pool) = pool {
            let repo = EventDateRepository::new(pool);
            assert!(!repo.pool.is_closed());
        }
    }
}
