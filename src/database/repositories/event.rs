//! Event, attachment and organizer claim repository implementation

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use chrono::Utc;
use crate::database::filters::{fetch_page, Column, ColumnKind, FilterSet, PageRequest, Pagination, TableSpec};
use crate::models::event::{
    Attachment, AttachmentInput, ClaimStatus, ClaimType, CreateEventRequest, Event, EventClaim,
    EventSearchParams, EventStatus, UpdateEventRequest,
};
use crate::utils::errors::SchoolEventsError;

pub const EVENTS: TableSpec = TableSpec {
    table: "events",
    primary_key: "id",
    columns: &[
        Column::new("id", ColumnKind::Integer),
        Column::new("title", ColumnKind::Text),
        Column::nullable("institution_name", ColumnKind::Text),
        Column::new("address", ColumnKind::Text),
        Column::new("city", ColumnKind::Text),
        Column::nullable("latitude", ColumnKind::Float),
        Column::nullable("longitude", ColumnKind::Float),
        Column::new("capacity", ColumnKind::Integer),
        Column::nullable("description", ColumnKind::Text),
        Column::nullable("annotation", ColumnKind::Text),
        Column::new("target_group", ColumnKind::Enum(&["elementary_school", "high_school", "all"])),
        Column::nullable("age_from", ColumnKind::Integer),
        Column::nullable("age_to", ColumnKind::Integer),
        Column::new("status", ColumnKind::Enum(&["scheduled", "cancelled", "completed", "archived", "public"])),
        Column::new("event_type", ColumnKind::Enum(&["theater", "concert", "exhibition", "workshop", "other"])),
        Column::nullable("duration", ColumnKind::Integer),
        Column::new("ztp_access", ColumnKind::Bool),
        Column::nullable("parking_spaces", ColumnKind::Integer),
        Column::nullable("region", ColumnKind::Text),
        Column::nullable("district", ColumnKind::Text),
        Column::nullable("organizer_id", ColumnKind::Integer),
        Column::new("created_at", ColumnKind::DateTime),
        Column::new("updated_at", ColumnKind::DateTime),
    ],
};

pub const EVENT_CLAIMS: TableSpec = TableSpec {
    table: "event_claims",
    primary_key: "id",
    columns: &[
        Column::new("id", ColumnKind::Integer),
        Column::nullable("event_id", ColumnKind::Integer),
        Column::new("organizer_id", ColumnKind::Integer),
        Column::new("claim_type", ColumnKind::Enum(&["create", "update", "cancel"])),
        Column::new("status", ColumnKind::Enum(&["pending", "approved", "rejected"])),
        Column::new("created_at", ColumnKind::DateTime),
    ],
};

#[derive(Clone, Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(
        &self,
        conn: &mut PgConnection,
        request: &CreateEventRequest,
        organizer_id: Option<i64>,
    ) -> Result<Event, SchoolEventsError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (title, institution_name, address, city, latitude, longitude, capacity, description,
                                annotation, parent_info, target_group, age_from, age_to, status, event_type, duration,
                                more_info_url, ztp_access, parking_spaces, region, district, organizer_id,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21,
                    $22, $23, $23)
            RETURNING *
            "#
        )
        .bind(&request.title)
        .bind(&request.institution_name)
        .bind(&request.address)
        .bind(&request.city)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.capacity)
        .bind(&request.description)
        .bind(&request.annotation)
        .bind(&request.parent_info)
        .bind(request.target_group.as_str())
        .bind(request.age_from)
        .bind(request.age_to)
        .bind(request.status.unwrap_or(EventStatus::Scheduled).as_str())
        .bind(request.event_type.as_str())
        .bind(request.duration)
        .bind(&request.more_info_url)
        .bind(request.ztp_access)
        .bind(request.parking_spaces)
        .bind(&request.region)
        .bind(&request.district)
        .bind(organizer_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, SchoolEventsError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Lock the event row for the rest of the transaction
    pub async fn find_for_update(&self, conn: &mut PgConnection, id: i64) -> Result<Option<Event>, SchoolEventsError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(event)
    }

    /// Update event
    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: i64,
        request: &UpdateEventRequest,
    ) -> Result<Event, SchoolEventsError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                institution_name = COALESCE($3, institution_name),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                latitude = COALESCE($6, latitude),
                longitude = COALESCE($7, longitude),
                capacity = COALESCE($8, capacity),
                description = COALESCE($9, description),
                annotation = COALESCE($10, annotation),
                parent_info = COALESCE($11, parent_info),
                target_group = COALESCE($12, target_group),
                age_from = COALESCE($13, age_from),
                age_to = COALESCE($14, age_to),
                status = COALESCE($15, status),
                event_type = COALESCE($16, event_type),
                duration = COALESCE($17, duration),
                more_info_url = COALESCE($18, more_info_url),
                ztp_access = COALESCE($19, ztp_access),
                parking_spaces = COALESCE($20, parking_spaces),
                region = COALESCE($21, region),
                district = COALESCE($22, district),
                updated_at = $23
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.institution_name)
        .bind(&request.address)
        .bind(&request.city)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.capacity)
        .bind(&request.description)
        .bind(&request.annotation)
        .bind(&request.parent_info)
        .bind(request.target_group.map(|t| t.as_str()))
        .bind(request.age_from)
        .bind(request.age_to)
        .bind(request.status.map(|s| s.as_str()))
        .bind(request.event_type.map(|t| t.as_str()))
        .bind(request.duration)
        .bind(&request.more_info_url)
        .bind(request.ztp_access)
        .bind(request.parking_spaces)
        .bind(&request.region)
        .bind(&request.district)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::EventNotFound { event_id: id })?;

        Ok(event)
    }

    pub async fn set_status(&self, conn: &mut PgConnection, id: i64, status: EventStatus) -> Result<Event, SchoolEventsError> {
        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::EventNotFound { event_id: id })?;

        Ok(event)
    }

    /// Delete event; dates, attachments and reservations cascade
    pub async fn delete(&self, conn: &mut PgConnection, id: i64) -> Result<bool, SchoolEventsError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List events with generic filters plus date range, radius and visibility
    pub async fn list(
        &self,
        filters: &FilterSet,
        search: &EventSearchParams,
        page: PageRequest,
    ) -> Result<Pagination<Event>, SchoolEventsError> {
        let search = search.clone();
        fetch_page(&self.pool, &EVENTS, filters, page, move |qb| push_search_scope(qb, &search)).await
    }

    /// Events owned by an organizer
    pub async fn list_by_organizer(
        &self,
        organizer_id: i64,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Event>, SchoolEventsError> {
        fetch_page(&self.pool, &EVENTS, filters, page, move |qb| {
            qb.push(" AND events.organizer_id = ");
            qb.push_bind(organizer_id);
        })
        .await
    }

    pub async fn add_attachment(
        &self,
        conn: &mut PgConnection,
        event_id: i64,
        attachment: &AttachmentInput,
    ) -> Result<Attachment, SchoolEventsError> {
        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments (event_id, name, path, type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, event_id, name, path, type, created_at
            "#
        )
        .bind(event_id)
        .bind(&attachment.name)
        .bind(&attachment.path)
        .bind(&attachment.attachment_type)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(attachment)
    }

    pub async fn list_attachments(&self, event_ids: &[i64]) -> Result<Vec<Attachment>, SchoolEventsError> {
        let attachments = sqlx::query_as::<_, Attachment>(
            "SELECT id, event_id, name, path, type, created_at FROM attachments WHERE event_id = ANY($1) ORDER BY id"
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(attachments)
    }

    /// Remove attachments of an event not in `keep_ids`; returns removed file paths
    pub async fn delete_attachments_except(
        &self,
        conn: &mut PgConnection,
        event_id: i64,
        keep_ids: &[i64],
    ) -> Result<Vec<String>, SchoolEventsError> {
        let paths: Vec<(String,)> = sqlx::query_as(
            "DELETE FROM attachments WHERE event_id = $1 AND NOT (id = ANY($2)) RETURNING path"
        )
        .bind(event_id)
        .bind(keep_ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(paths.into_iter().map(|(p,)| p).collect())
    }

    /// Every file path still referenced by an attachment
    pub async fn all_attachment_paths(&self) -> Result<Vec<String>, SchoolEventsError> {
        let paths: Vec<(String,)> = sqlx::query_as("SELECT path FROM attachments")
            .fetch_all(&self.pool)
            .await?;

        Ok(paths.into_iter().map(|(p,)| p).collect())
    }

    /// Count total events
    pub async fn count(&self) -> Result<i64, SchoolEventsError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Find an event by exact title, used to keep seeding idempotent
    pub async fn find_by_title(&self, title: &str) -> Result<Option<Event>, SchoolEventsError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE title = $1 ORDER BY id LIMIT 1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    // Claims

    pub async fn create_claim(
        &self,
        organizer_id: i64,
        event_id: Option<i64>,
        claim_type: ClaimType,
        payload: &serde_json::Value,
    ) -> Result<EventClaim, SchoolEventsError> {
        let now = Utc::now();
        let claim = sqlx::query_as::<_, EventClaim>(
            r#"
            INSERT INTO event_claims (event_id, organizer_id, claim_type, payload, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $5)
            RETURNING *
            "#
        )
        .bind(event_id)
        .bind(organizer_id)
        .bind(claim_type.as_str())
        .bind(payload)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(claim)
    }

    pub async fn find_claim_for_update(&self, conn: &mut PgConnection, id: i64) -> Result<Option<EventClaim>, SchoolEventsError> {
        let claim = sqlx::query_as::<_, EventClaim>("SELECT * FROM event_claims WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(claim)
    }

    pub async fn set_claim_status(
        &self,
        conn: &mut PgConnection,
        id: i64,
        status: ClaimStatus,
        reviewed_by: i64,
        review_note: Option<&str>,
        event_id: Option<i64>,
    ) -> Result<EventClaim, SchoolEventsError> {
        let claim = sqlx::query_as::<_, EventClaim>(
            r#"
            UPDATE event_claims
            SET status = $2, reviewed_by = $3, review_note = $4, event_id = COALESCE($5, event_id), updated_at = $6
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status.as_str())
        .bind(reviewed_by)
        .bind(review_note)
        .bind(event_id)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SchoolEventsError::ClaimNotFound { claim_id: id })?;

        Ok(claim)
    }

    pub async fn list_pending_claims(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<EventClaim>, SchoolEventsError> {
        fetch_page(&self.pool, &EVENT_CLAIMS, filters, page, |qb| {
            qb.push(" AND event_claims.status = 'pending'");
        })
        .await
    }
}

/// Radius, date range and visibility conditions of the public event search
fn push_search_scope(qb: &mut QueryBuilder<'_, Postgres>, search: &EventSearchParams) {
    if !search.admin.unwrap_or(false) {
        qb.push(" AND events.status IN ('scheduled', 'public')");
    }

    if search.date_from.is_some() || search.date_to.is_some() {
        qb.push(" AND EXISTS (SELECT 1 FROM event_dates ed WHERE ed.event_id = events.id");
        if let Some(from) = search.date_from {
            qb.push(" AND ed.date >= ");
            qb.push_bind(from);
        }
        if let Some(to) = search.date_to {
            qb.push(" AND ed.date <= ");
            qb.push_bind(to);
        }
        qb.push(")");
    }

    if let (Some((lat0, lon0)), Some(radius)) = (search.center(), search.radius) {
        qb.push(" AND events.latitude IS NOT NULL AND events.longitude IS NOT NULL AND SQRT(POWER(69.1 * (events.latitude - ");
        qb.push_bind(lat0);
        qb.push("), 2) + POWER(69.1 * (");
        qb.push_bind(lon0);
        qb.push(" - events.longitude) * COS(events.latitude / 57.3), 2)) <= ");
        qb.push_bind(radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_event_repository_creation() {
        let pool = PgPool::connect("postgresql://test").await;
        if let Ok(pool) = pool {
            let repo = EventRepository::new(pool);
            assert!(!repo.pool.is_closed());
        }
    }

    #[test]
    fn test_public_search_scope() {
        let search = EventSearchParams {
            date_from: NaiveDate::from_ymd_opt(2024, 9, 1),
            coordinates: Some("48.15,17.11".into()),
            radius: Some(25.0),
            ..Default::default()
        };
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM events WHERE TRUE");
        push_search_scope(&mut qb, &search);
        let sql = qb.sql();
        assert!(sql.contains("events.status IN ('scheduled', 'public')"));
        assert!(sql.contains("ed.date >= $1"));
        assert!(sql.contains("69.1 * (events.latitude - $2)"));
        assert!(sql.ends_with("<= $4"));
    }

    #[test]
    fn test_admin_scope_shows_everything() {
        let search = EventSearchParams { admin: Some(true), ..Default::default() };
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM events WHERE TRUE");
        push_search_scope(&mut qb, &search);
        assert_eq!(qb.sql(), "SELECT * FROM events WHERE TRUE");
    }
}
