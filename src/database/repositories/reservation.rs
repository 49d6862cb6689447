//! Reservation and waiting list repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::database::filters::{fetch_page, Column, ColumnKind, FilterSet, PageRequest, Pagination, TableSpec};
use crate::models::reservation::{
    CreateWaitingListRequest, Reservation, ReservationStatus, UpdateWaitingListRequest, WaitingListEntry,
    WaitingListStatus,
};
use crate::utils::errors::SchoolEventsError;

const RESERVATION_STATUSES: &[&str] = &["created", "pending", "confirmed", "rejected", "cancelled"];

pub const RESERVATIONS: TableSpec = TableSpec {
    table: "reservations",
    primary_key: "id",
    columns: &[
        Column::new("id", ColumnKind::Integer),
        Column::new("event_id", ColumnKind::Integer),
        Column::new("event_date_id", ColumnKind::Integer),
        Column::new("user_id", ColumnKind::Integer),
        Column::new("number_of_students", ColumnKind::Integer),
        Column::new("number_of_teachers", ColumnKind::Integer),
        Column::nullable("special_requirements", ColumnKind::Text),
        Column::nullable("contact_info", ColumnKind::Text),
        Column::nullable("comment", ColumnKind::Text),
        Column::new("status", ColumnKind::Enum(RESERVATION_STATUSES)),
        Column::new("local_reservation_code", ColumnKind::Text),
        Column::nullable("cancelled_at", ColumnKind::DateTime),
        Column::new("created_at", ColumnKind::DateTime),
        Column::new("updated_at", ColumnKind::DateTime),
    ],
};

pub const WAITING_LIST: TableSpec = TableSpec {
    table: "waiting_list",
    primary_key: "id",
    columns: &[
        Column::new("id", ColumnKind::Integer),
        Column::new("event_date_id", ColumnKind::Integer),
        Column::new("user_id", ColumnKind::Integer),
        Column::new("number_of_students", ColumnKind::Integer),
        Column::new("number_of_teachers", ColumnKind::Integer),
        Column::new("status", ColumnKind::Enum(&["waiting", "processed", "cancelled"])),
        Column::new("created_at", ColumnKind::DateTime),
    ],
};

/// Row values for a new reservation
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub event_id: i64,
    pub event_date_id: i64,
    pub user_id: i64,
    pub number_of_students: i32,
    pub number_of_teachers: i32,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
    pub status: ReservationStatus,
    pub local_reservation_code: String,
}

/// Column changes for an existing reservation
#[derive(Debug, Clone, Default)]
pub struct ReservationChanges {
    pub number_of_students: Option<i32>,
    pub number_of_teachers: Option<i32>,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
}

/// Someone to tell about a change of an occurrence they booked
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationRecipient {
    pub reservation_id: i64,
    pub event_date_id: i64,
    pub user_id: i64,
    pub user_email: String,
    pub first_name: String,
    pub last_name: String,
    pub preferred_language: String,
    pub local_reservation_code: String,
}

#[derive(Clone, Debug)]
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new reservation
    pub async fn create(&self, conn: &mut PgConnection, reservation: NewReservation) -> Result<Reservation, SchoolEventsError> {
        let now = Utc::now();
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (event_id, event_date_id, user_id, number_of_students, number_of_teachers,
                                      special_requirements, contact_info, comment, status, local_reservation_code,
                                      created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#
        )
        .bind(reservation.event_id)
        .bind(reservation.event_date_id)
        .bind(reservation.user_id)
        .bind(reservation.number_of_students)
        .bind(reservation.number_of_teachers)
        .bind(reservation.special_requirements)
        .bind(reservation.contact_info)
        .bind(reservation.comment)
        .bind(reservation.status.as_str())
        .bind(reservation.local_reservation_code)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(reservation)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Reservation>, SchoolEventsError> {
        let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(reservation)
    }

    pub async fn find_for_update(&self, conn: &mut PgConnection, id: i64) -> Result<Reservation, SchoolEventsError> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(SchoolEventsError::ReservationNotFound { reservation_id: id })
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Reservation>, SchoolEventsError> {
        let reservation = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE local_reservation_code = $1"
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    pub async fn code_exists(&self, conn: &mut PgConnection, code: &str) -> Result<bool, SchoolEventsError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reservations WHERE local_reservation_code = $1")
            .bind(code)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count.0 > 0)
    }

    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: i64,
        changes: ReservationChanges,
    ) -> Result<Reservation, SchoolEventsError> {
        sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations
            SET number_of_students = COALESCE($2, number_of_students),
                number_of_teachers = COALESCE($3, number_of_teachers),
                special_requirements = COALESCE($4, special_requirements),
                contact_info = COALESCE($5, contact_info),
                comment = COALESCE($6, comment),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(changes.number_of_students)
        .bind(changes.number_of_teachers)
        .bind(changes.special_requirements)
        .bind(changes.contact_info)
        .bind(changes.comment)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::ReservationNotFound { reservation_id: id })
    }

    /// Change status; cancelling stamps `cancelled_at`
    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: i64,
        status: ReservationStatus,
    ) -> Result<Reservation, SchoolEventsError> {
        let now = Utc::now();
        let cancelled_at = (status == ReservationStatus::Cancelled).then_some(now);
        sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations
            SET status = $2, cancelled_at = COALESCE($3, cancelled_at), updated_at = $4
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status.as_str())
        .bind(cancelled_at)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::ReservationNotFound { reservation_id: id })
    }

    pub async fn delete(&self, conn: &mut PgConnection, id: i64) -> Result<bool, SchoolEventsError> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<Reservation>, SchoolEventsError> {
        fetch_page(&self.pool, &RESERVATIONS, filters, page, |_| {}).await
    }

    pub async fn list_by_event(
        &self,
        event_id: i64,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Reservation>, SchoolEventsError> {
        fetch_page(&self.pool, &RESERVATIONS, filters, page, move |qb| {
            qb.push(" AND reservations.event_id = ");
            qb.push_bind(event_id);
        })
        .await
    }

    pub async fn list_by_user(
        &self,
        user_id: i64,
        event_id: Option<i64>,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Reservation>, SchoolEventsError> {
        fetch_page(&self.pool, &RESERVATIONS, filters, page, move |qb| {
            qb.push(" AND reservations.user_id = ");
            qb.push_bind(user_id);
            if let Some(event_id) = event_id {
                qb.push(" AND reservations.event_id = ");
                qb.push_bind(event_id);
            }
        })
        .await
    }

    /// Reservations on events owned by an organizer
    pub async fn list_by_organizer(
        &self,
        organizer_id: i64,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Reservation>, SchoolEventsError> {
        fetch_page(&self.pool, &RESERVATIONS, filters, page, move |qb| {
            qb.push(" AND reservations.event_id IN (SELECT id FROM events WHERE organizer_id = ");
            qb.push_bind(organizer_id);
            qb.push(")");
        })
        .await
    }

    /// Holders of seat-holding reservations on any occurrence of an event
    pub async fn active_recipients_for_event(&self, event_id: i64) -> Result<Vec<ReservationRecipient>, SchoolEventsError> {
        self.recipients("r.event_id = $1", event_id).await
    }

    /// Holders of seat-holding reservations on one occurrence
    pub async fn active_recipients_for_date(&self, event_date_id: i64) -> Result<Vec<ReservationRecipient>, SchoolEventsError> {
        self.recipients("r.event_date_id = $1", event_date_id).await
    }

    async fn recipients(&self, condition: &str, id: i64) -> Result<Vec<ReservationRecipient>, SchoolEventsError> {
        let rows = sqlx::query_as::<_, ReservationRecipient>(&format!(
            r#"
            SELECT r.id AS reservation_id, r.event_date_id, u.user_id, u.user_email, u.first_name, u.last_name,
                   u.preferred_language, r.local_reservation_code
            FROM reservations r
            JOIN users u ON u.user_id = r.user_id
            WHERE {condition} AND r.status IN ('created', 'pending', 'confirmed') AND u.status = 'active'
            ORDER BY r.id
            "#
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64, SchoolEventsError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reservations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}

#[derive(Clone, Debug)]
pub struct WaitingListRepository {
    pool: PgPool,
}

impl WaitingListRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        request: &CreateWaitingListRequest,
    ) -> Result<WaitingListEntry, SchoolEventsError> {
        let now = Utc::now();
        let entry = sqlx::query_as::<_, WaitingListEntry>(
            r#"
            INSERT INTO waiting_list (event_date_id, user_id, number_of_students, number_of_teachers,
                                      special_requirements, contact_info, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'waiting', $7, $7)
            RETURNING *
            "#
        )
        .bind(request.event_date_id)
        .bind(user_id)
        .bind(request.number_of_students)
        .bind(request.number_of_teachers)
        .bind(&request.special_requirements)
        .bind(&request.contact_info)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(entry)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<WaitingListEntry>, SchoolEventsError> {
        let entry = sqlx::query_as::<_, WaitingListEntry>("SELECT * FROM waiting_list WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: i64,
        request: &UpdateWaitingListRequest,
    ) -> Result<WaitingListEntry, SchoolEventsError> {
        sqlx::query_as::<_, WaitingListEntry>(
            r#"
            UPDATE waiting_list
            SET number_of_students = COALESCE($2, number_of_students),
                number_of_teachers = COALESCE($3, number_of_teachers),
                special_requirements = COALESCE($4, special_requirements),
                contact_info = COALESCE($5, contact_info),
                status = COALESCE($6, status),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(request.number_of_students)
        .bind(request.number_of_teachers)
        .bind(&request.special_requirements)
        .bind(&request.contact_info)
        .bind(request.status.map(|s| s.as_str()))
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::WaitingListEntryNotFound { entry_id: id })
    }

    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: i64,
        status: WaitingListStatus,
    ) -> Result<WaitingListEntry, SchoolEventsError> {
        self.update(conn, id, &UpdateWaitingListRequest { status: Some(status), ..Default::default() }).await
    }

    /// Waiting entries of an occurrence in queue order with their position
    pub async fn queue_for_date(&self, event_date_id: i64) -> Result<Vec<WaitingListEntry>, SchoolEventsError> {
        let entries = sqlx::query_as::<_, WaitingListEntry>(
            r#"
            SELECT *, ROW_NUMBER() OVER (ORDER BY created_at, id) AS position
            FROM waiting_list
            WHERE event_date_id = $1 AND status = 'waiting'
            ORDER BY created_at, id
            "#
        )
        .bind(event_date_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Lock the queue of an occurrence for processing, head first
    pub async fn queue_for_update(&self, conn: &mut PgConnection, event_date_id: i64) -> Result<Vec<WaitingListEntry>, SchoolEventsError> {
        let entries = sqlx::query_as::<_, WaitingListEntry>(
            r#"
            SELECT * FROM waiting_list
            WHERE event_date_id = $1 AND status = 'waiting'
            ORDER BY created_at, id
            FOR UPDATE
            "#
        )
        .bind(event_date_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(entries)
    }

    pub async fn list_by_user(
        &self,
        user_id: i64,
        event_date_id: Option<i64>,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<WaitingListEntry>, SchoolEventsError> {
        fetch_page(&self.pool, &WAITING_LIST, filters, page, move |qb| {
            qb.push(" AND waiting_list.user_id = ");
            qb.push_bind(user_id);
            if let Some(event_date_id) = event_date_id {
                qb.push(" AND waiting_list.event_date_id = ");
                qb.push_bind(event_date_id);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reservation_repository_creation() {
        let pool = PgPool::connect("postgresql://test").await;
        if let Ok(pool) = pool {
            let repo = ReservationRepository::new(pool.clone());
            assert!(!repo.pool.is_closed());
            let queue = WaitingListRepository::new(pool);
            assert!(!queue.pool.is_closed());
        }
    }

    #[test]
    fn test_status_column_accepts_only_known_values() {
        let column = RESERVATIONS.column("status").map(|c| c.kind);
        assert_eq!(column, Some(ColumnKind::Enum(RESERVATION_STATUSES)));
        assert!(RESERVATIONS.column("password").is_none());
    }
}
