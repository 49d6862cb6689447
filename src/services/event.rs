//! Event service implementation
//!
//! Events, their occurrences (event dates) and attachments. Capacity changes
//! are applied to every occurrence without losing booked seats, and school
//! representatives holding reservations are told about changes by email.
//! Organizers without full event rights file claims that an admin reviews.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgConnection;
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::database::filters::{FilterSet, PageRequest, Pagination};
use crate::database::DatabaseService;
use crate::models::{
    lock_time_for, Attachment, AttachmentView, ClaimStatus, ClaimType, CreateClaimRequest, CreateEventRequest,
    EmailTemplate, Event, EventClaim, EventDate, EventDateStatus, EventSearchParams, EventStatus, EventWithDates,
    NewAuditLog, SetLockTimeRequest, UpdateClaimStatusRequest, UpdateEventRequest,
};
use crate::services::auth::{AuthContext, AuthService, Permission};
use crate::services::email::EmailService;
use crate::utils::errors::{SchoolEventsError, Result};
use crate::utils::helpers::json_rows_to_csv;
use crate::utils::logging::{log_admin_action, log_event_action};

/// Event service for managing events, dates and claims
#[derive(Clone, Debug)]
pub struct EventService {
    db: DatabaseService,
    auth: AuthService,
    emails: EmailService,
    settings: Settings,
}

impl EventService {
    pub fn new(db: DatabaseService, auth: AuthService, emails: EmailService, settings: Settings) -> Self {
        Self { db, auth, emails, settings }
    }

    pub async fn get_event(&self, event_id: i64) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(SchoolEventsError::EventNotFound { event_id })
    }

    /// Event with its dates and signed attachment links
    pub async fn get_event_with_dates(&self, event_id: i64) -> Result<EventWithDates> {
        let event = self.get_event(event_id).await?;
        let mut expanded = self.expand(vec![event]).await?;
        expanded
            .pop()
            .ok_or(SchoolEventsError::EventNotFound { event_id })
    }

    pub async fn get_event_date(&self, event_date_id: i64) -> Result<EventDate> {
        self.db
            .event_dates
            .find_by_id(event_date_id)
            .await?
            .ok_or(SchoolEventsError::EventDateNotFound { event_date_id })
    }

    pub async fn list_events(
        &self,
        filters: &FilterSet,
        search: &EventSearchParams,
        page: PageRequest,
    ) -> Result<Pagination<Event>> {
        self.db.events.list(filters, search, page).await
    }

    pub async fn list_events_with_dates(
        &self,
        filters: &FilterSet,
        search: &EventSearchParams,
        page: PageRequest,
    ) -> Result<Pagination<EventWithDates>> {
        let events = self.db.events.list(filters, search, page).await?;
        let Pagination { current_page, items_per_page, total_pages, total_items, items } = events;
        let items = self.expand(items).await?;
        Ok(Pagination { current_page, items_per_page, total_pages, total_items, items })
    }

    pub async fn list_by_organizer(
        &self,
        organizer_id: i64,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Event>> {
        self.db.events.list_by_organizer(organizer_id, filters, page).await
    }

    /// Attach dates and attachments to a page of events with two queries
    async fn expand(&self, events: Vec<Event>) -> Result<Vec<EventWithDates>> {
        let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        let mut dates: HashMap<i64, Vec<EventDate>> = HashMap::new();
        for date in self.db.event_dates.list_by_events(&ids).await? {
            dates.entry(date.event_id).or_default().push(date);
        }
        let mut attachments: HashMap<i64, Vec<AttachmentView>> = HashMap::new();
        for attachment in self.db.events.list_attachments(&ids).await? {
            attachments.entry(attachment.event_id).or_default().push(self.attachment_view(attachment));
        }

        Ok(events
            .into_iter()
            .map(|event| EventWithDates {
                event_dates: dates.remove(&event.id).unwrap_or_default(),
                attachments: attachments.remove(&event.id).unwrap_or_default(),
                event,
            })
            .collect())
    }

    fn attachment_view(&self, attachment: Attachment) -> AttachmentView {
        let url = match self.auth.file_url(&attachment.path) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(attachment_id = attachment.id, error = %e, "Could not sign attachment link");
                None
            }
        };
        AttachmentView { attachment, url }
    }

    /// Create an event with its dates and attachment metadata
    pub async fn create_event(&self, actor: &AuthContext, request: CreateEventRequest) -> Result<EventWithDates> {
        require_event_rights(actor)?;

        let organizer_id = if actor.has(Permission::ManageEvents) {
            request.organizer_id.or(Some(actor.user_id()))
        } else {
            Some(actor.user_id())
        };

        let mut tx = self.db.begin().await?;
        let event = self.insert_event(&mut tx, &request, organizer_id, Some(actor.user_id())).await?;
        tx.commit().await?;

        log_event_action(event.id, "create", actor.user_id(), Some(event.title.as_str()));
        self.get_event_with_dates(event.id).await
    }

    async fn insert_event(
        &self,
        conn: &mut PgConnection,
        request: &CreateEventRequest,
        organizer_id: Option<i64>,
        actor_id: Option<i64>,
    ) -> Result<Event> {
        validate_event_fields(request.capacity, request.age_from, request.age_to)?;
        if request.title.trim().is_empty() {
            return Err(SchoolEventsError::Validation("Title must not be empty".to_string()));
        }
        if request.event_dates.is_empty() {
            return Err(SchoolEventsError::Validation("At least one event date is required".to_string()));
        }

        let event = self.db.events.create(conn, request, organizer_id).await?;
        self.db
            .audit(conn, NewAuditLog::change("events", event.id, actor_id, None, Some(&event)))
            .await?;

        for input in &request.event_dates {
            let date = self
                .db
                .event_dates
                .create(conn, event.id, event.capacity, input, self.settings.app.lock_hours_before)
                .await?;
            self.db
                .audit(conn, NewAuditLog::change("event_dates", date.id, actor_id, None, Some(&date)))
                .await?;
        }
        for attachment in &request.attachments {
            self.db.events.add_attachment(conn, event.id, attachment).await?;
        }

        Ok(event)
    }

    /// Partial update; returns the event with its dates
    pub async fn update_event(
        &self,
        actor: &AuthContext,
        event_id: i64,
        request: UpdateEventRequest,
    ) -> Result<EventWithDates> {
        let existing = self.get_event(event_id).await?;
        require_owner_or_admin(actor, &existing)?;

        let mut tx = self.db.begin().await?;
        let (event, removed_files) = self.apply_update(&mut tx, event_id, &request, Some(actor.user_id())).await?;
        tx.commit().await?;

        log_event_action(event.id, "update", actor.user_id(), None);
        self.remove_files(&removed_files).await;
        self.notify_date_changes(&event).await;

        self.get_event_with_dates(event_id).await
    }

    async fn apply_update(
        &self,
        conn: &mut PgConnection,
        event_id: i64,
        request: &UpdateEventRequest,
        actor_id: Option<i64>,
    ) -> Result<(Event, Vec<String>)> {
        let existing = self
            .db
            .events
            .find_for_update(conn, event_id)
            .await?
            .ok_or(SchoolEventsError::EventNotFound { event_id })?;

        validate_event_fields(
            request.capacity.unwrap_or(existing.capacity),
            request.age_from.or(existing.age_from),
            request.age_to.or(existing.age_to),
        )?;

        let event = self.db.events.update(conn, event_id, request).await?;
        self.db
            .audit(conn, NewAuditLog::change("events", event_id, actor_id, Some(&existing), Some(&event)))
            .await?;

        if event.capacity != existing.capacity {
            let dates = self.db.event_dates.update_capacity_for_event(conn, event_id, event.capacity).await?;
            debug!(event_id, dates = dates.len(), capacity = event.capacity, "Capacity applied to event dates");
        }

        for input in &request.event_dates {
            let date = self
                .db
                .event_dates
                .create(conn, event_id, event.capacity, input, self.settings.app.lock_hours_before)
                .await?;
            self.db
                .audit(conn, NewAuditLog::change("event_dates", date.id, actor_id, None, Some(&date)))
                .await?;
        }

        let removed = match &request.existing_attachment_ids {
            Some(keep) => self.db.events.delete_attachments_except(conn, event_id, keep).await?,
            None => Vec::new(),
        };
        for attachment in &request.attachments {
            self.db.events.add_attachment(conn, event_id, attachment).await?;
        }

        Ok((event, removed))
    }

    /// Hard delete; dates, attachments and reservations cascade
    pub async fn delete_event(&self, actor: &AuthContext, event_id: i64) -> Result<Event> {
        let existing = self.get_event(event_id).await?;
        require_owner_or_admin(actor, &existing)?;
        let files: Vec<String> = self
            .db
            .events
            .list_attachments(&[event_id])
            .await?
            .into_iter()
            .map(|a| a.path)
            .collect();

        let mut tx = self.db.begin().await?;
        if !self.db.events.delete(&mut tx, event_id).await? {
            return Err(SchoolEventsError::EventNotFound { event_id });
        }
        self.db
            .audit(&mut tx, NewAuditLog::change("events", event_id, Some(actor.user_id()), Some(&existing), None))
            .await?;
        tx.commit().await?;

        log_event_action(event_id, "delete", actor.user_id(), Some(existing.title.as_str()));
        self.remove_files(&files).await;
        Ok(existing)
    }

    /// Close bookings `hours_before` the start of an occurrence
    pub async fn set_lock_time(&self, actor: &AuthContext, request: SetLockTimeRequest) -> Result<EventDate> {
        if request.hours_before < 0 {
            return Err(SchoolEventsError::Validation("hours_before must be greater than or equal to 0".to_string()));
        }
        let date = self.get_event_date(request.event_date_id).await?;
        let event = self.get_event(date.event_id).await?;
        require_owner_or_admin(actor, &event)?;

        let mut tx = self.db.begin().await?;
        let locked = self.db.event_dates.find_for_update(&mut tx, date.id).await?;
        let updated = self
            .db
            .event_dates
            .set_lock_time(&mut tx, date.id, lock_time_for(locked.starts_at(), request.hours_before))
            .await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("event_dates", date.id, Some(actor.user_id()), Some(&locked), Some(&updated)))
            .await?;
        tx.commit().await?;

        log_event_action(event.id, "set_lock_time", actor.user_id(), Some(updated.lock_time.to_rfc3339().as_str()));
        Ok(updated)
    }

    /// completed_unpaid -> completed_payment_sent
    pub async fn mark_as_paid(&self, actor: &AuthContext, event_date_id: i64) -> Result<EventDate> {
        self.transition_date(actor, event_date_id, EventDateStatus::CompletedPaymentSent).await
    }

    /// completed_payment_sent -> completed
    pub async fn mark_as_completed(&self, actor: &AuthContext, event_date_id: i64) -> Result<EventDate> {
        self.transition_date(actor, event_date_id, EventDateStatus::Completed).await
    }

    async fn transition_date(
        &self,
        actor: &AuthContext,
        event_date_id: i64,
        next: EventDateStatus,
    ) -> Result<EventDate> {
        actor.require(Permission::ManageEvents)?;

        let mut tx = self.db.begin().await?;
        let date = self.db.event_dates.find_for_update(&mut tx, event_date_id).await?;
        let current = date.status();
        if !current.can_transition_to(next) {
            return Err(SchoolEventsError::InvalidStateTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        let updated = self.db.event_dates.set_status(&mut tx, event_date_id, next).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("event_dates", event_date_id, Some(actor.user_id()), Some(&date), Some(&updated)))
            .await?;
        tx.commit().await?;

        log_admin_action(actor.user_id(), &format!("event_date:{}", next), Some(event_date_id.to_string().as_str()), None);
        Ok(updated)
    }

    /// Scheduled occurrences that already started become completed_unpaid
    pub async fn complete_past_dates(&self) -> Result<usize> {
        let dates = self.db.event_dates.mark_past_completed().await?;
        if !dates.is_empty() {
            info!(count = dates.len(), "Past event dates marked as completed_unpaid");
        }
        Ok(dates.len())
    }

    /// Remind representatives of occurrences taking place tomorrow
    pub async fn send_date_reminders(&self) -> Result<usize> {
        let tomorrow = Utc::now()
            .with_timezone(&chrono_tz::Europe::Bratislava)
            .date_naive()
            .succ_opt()
            .ok_or_else(|| SchoolEventsError::Internal("Date out of range".to_string()))?;

        let mut sent = 0;
        for date in self.db.event_dates.scheduled_on(tomorrow).await? {
            let event = self.get_event(date.event_id).await?;
            for recipient in self.db.reservations.active_recipients_for_date(date.id).await? {
                let email = self.emails.compose(
                    EmailTemplate::SchoolRepresentativeDateIncoming,
                    &recipient.preferred_language,
                    &recipient.user_email,
                    Some(recipient.user_id),
                    date_email_data(&recipient.first_name, &event, &date, &recipient.local_reservation_code),
                );
                self.emails.queue_email(email).await?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Email every representative with an active reservation on the event
    async fn notify_date_changes(&self, event: &Event) {
        let result: Result<usize> = async {
            let recipients = self.db.reservations.active_recipients_for_event(event.id).await?;
            if recipients.is_empty() {
                return Ok(0);
            }
            let dates: HashMap<i64, EventDate> = self
                .db
                .event_dates
                .list_by_event(event.id)
                .await?
                .into_iter()
                .map(|d| (d.id, d))
                .collect();

            let mut queued = 0;
            for recipient in &recipients {
                let Some(date) = dates.get(&recipient.event_date_id) else { continue };
                let email = self.emails.compose(
                    EmailTemplate::EventDateDataChange,
                    &recipient.preferred_language,
                    &recipient.user_email,
                    Some(recipient.user_id),
                    date_email_data(&recipient.first_name, event, date, &recipient.local_reservation_code),
                );
                self.emails.queue_email(email).await?;
                queued += 1;
            }
            Ok(queued)
        }
        .await;

        match result {
            Ok(0) => {}
            Ok(count) => info!(event_id = event.id, count, "Event change emails queued"),
            Err(e) => warn!(event_id = event.id, error = %e, "Failed to queue event change emails"),
        }
    }

    async fn remove_files(&self, paths: &[String]) {
        for path in paths {
            let full = Path::new(&self.settings.app.files_dir).join(path.trim_start_matches('/'));
            if let Err(e) = tokio::fs::remove_file(&full).await {
                debug!(path = %full.display(), error = %e, "Attachment file not removed");
            }
        }
    }

    /// Delete files in the files directory that no attachment references
    pub async fn remove_unused_files(&self) -> Result<usize> {
        let referenced: std::collections::HashSet<String> = self
            .db
            .events
            .all_attachment_paths()
            .await?
            .into_iter()
            .map(|p| p.trim_start_matches('/').to_string())
            .collect();

        let root = Path::new(&self.settings.app.files_dir);
        let mut removed = 0;
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
                if !referenced.contains(&relative) {
                    tokio::fs::remove_file(&path).await?;
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!(removed, "Unused attachment files removed");
        }
        Ok(removed)
    }

    // Claims

    /// File a create, update or cancel request for admin review
    pub async fn submit_claim(&self, actor: &AuthContext, request: CreateClaimRequest) -> Result<EventClaim> {
        actor.require(Permission::SubmitClaims)?;

        match (request.claim_type, request.event_id) {
            (ClaimType::Create, _) => {
                serde_json::from_value::<CreateEventRequest>(request.payload.clone())
                    .map_err(|e| SchoolEventsError::Validation(format!("Invalid claim payload: {}", e)))?;
            }
            (ClaimType::Update | ClaimType::Cancel, None) => {
                return Err(SchoolEventsError::BadRequest("event_id is required for this claim".to_string()));
            }
            (claim_type, Some(event_id)) => {
                let event = self.get_event(event_id).await?;
                require_owner_or_admin(actor, &event)?;
                if claim_type == ClaimType::Update {
                    serde_json::from_value::<UpdateEventRequest>(request.payload.clone())
                        .map_err(|e| SchoolEventsError::Validation(format!("Invalid claim payload: {}", e)))?;
                }
            }
        }

        let event_id = if request.claim_type == ClaimType::Create { None } else { request.event_id };
        let claim = self
            .db
            .events
            .create_claim(actor.user_id(), event_id, request.claim_type, &request.payload)
            .await?;
        info!(claim_id = claim.id, claim_type = %claim.claim_type, organizer_id = actor.user_id(), "Claim submitted");
        Ok(claim)
    }

    pub async fn list_pending_claims(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<EventClaim>> {
        self.db.events.list_pending_claims(filters, page).await
    }

    /// Approve or reject a pending claim; approval applies it
    pub async fn review_claim(
        &self,
        actor: &AuthContext,
        claim_id: i64,
        request: UpdateClaimStatusRequest,
    ) -> Result<EventClaim> {
        actor.require(Permission::ReviewClaims)?;
        if request.new_status == ClaimStatus::Pending {
            return Err(SchoolEventsError::BadRequest("Claim can only be approved or rejected".to_string()));
        }

        let mut tx = self.db.begin().await?;
        let claim = self
            .db
            .events
            .find_claim_for_update(&mut tx, claim_id)
            .await?
            .ok_or(SchoolEventsError::ClaimNotFound { claim_id })?;
        if claim.status != ClaimStatus::Pending.as_str() {
            return Err(SchoolEventsError::InvalidStateTransition {
                from: claim.status.clone(),
                to: request.new_status.to_string(),
            });
        }
        let claim_type: ClaimType = claim.claim_type.parse()?;

        let mut event_id = claim.event_id;
        let mut removed_files = Vec::new();
        if request.new_status == ClaimStatus::Approved {
            match claim_type {
                ClaimType::Create => {
                    let create: CreateEventRequest = serde_json::from_value(claim.payload.clone())
                        .map_err(|e| SchoolEventsError::Validation(format!("Invalid claim payload: {}", e)))?;
                    let event = self.insert_event(&mut tx, &create, Some(claim.organizer_id), Some(actor.user_id())).await?;
                    event_id = Some(event.id);
                }
                ClaimType::Update => {
                    let id = event_id.ok_or_else(|| SchoolEventsError::BadRequest("Claim has no event".to_string()))?;
                    let update: UpdateEventRequest = serde_json::from_value(claim.payload.clone())
                        .map_err(|e| SchoolEventsError::Validation(format!("Invalid claim payload: {}", e)))?;
                    let (_, removed) = self.apply_update(&mut tx, id, &update, Some(actor.user_id())).await?;
                    removed_files = removed;
                }
                ClaimType::Cancel => {
                    let id = event_id.ok_or_else(|| SchoolEventsError::BadRequest("Claim has no event".to_string()))?;
                    let before = self
                        .db
                        .events
                        .find_for_update(&mut tx, id)
                        .await?
                        .ok_or(SchoolEventsError::EventNotFound { event_id: id })?;
                    let cancelled = self.db.events.set_status(&mut tx, id, EventStatus::Cancelled).await?;
                    self.db.event_dates.cancel_for_event(&mut tx, id).await?;
                    self.db
                        .audit(&mut tx, NewAuditLog::change("events", id, Some(actor.user_id()), Some(&before), Some(&cancelled)))
                        .await?;
                }
            }
        }

        let reviewed = self
            .db
            .events
            .set_claim_status(
                &mut tx,
                claim_id,
                request.new_status,
                actor.user_id(),
                request.review_note.as_deref(),
                event_id,
            )
            .await?;
        tx.commit().await?;

        log_admin_action(
            actor.user_id(),
            &format!("claim:{}", request.new_status),
            Some(claim_id.to_string().as_str()),
            Some(claim_type.as_str()),
        );
        self.remove_files(&removed_files).await;
        self.notify_claim_outcome(&reviewed, claim_type).await;
        if let (Some(id), true) = (event_id, claim_type == ClaimType::Update && request.new_status == ClaimStatus::Approved) {
            if let Ok(event) = self.get_event(id).await {
                self.notify_date_changes(&event).await;
            }
        }

        Ok(reviewed)
    }

    async fn notify_claim_outcome(&self, claim: &EventClaim, claim_type: ClaimType) {
        let result: Result<()> = async {
            let organizer = self
                .db
                .users
                .find_by_id(claim.organizer_id)
                .await?
                .ok_or(SchoolEventsError::UserNotFound { user_id: claim.organizer_id })?;
            let event_name = match claim.event_id {
                Some(id) => self.db.events.find_by_id(id).await?.map(|e| e.title),
                None => None,
            }
            .or_else(|| claim.payload.get("title").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default();

            let template = if claim.status == ClaimStatus::Approved.as_str() {
                EmailTemplate::OrganizerClaimAccepted
            } else {
                EmailTemplate::OrganizerClaimRejected
            };
            let email = self.emails.compose(
                template,
                &organizer.preferred_language,
                &organizer.user_email,
                Some(organizer.user_id),
                json!({
                    "first_name": organizer.first_name,
                    "claim_type": claim_type.as_str(),
                    "event_name": event_name,
                    "review_note": claim.review_note.clone().unwrap_or_default(),
                }),
            );
            self.emails.queue_email(email).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(claim_id = claim.id, error = %e, "Failed to queue claim outcome email");
        }
    }

    /// CSV download of arbitrary rows
    pub fn export_csv(&self, rows: &[Value]) -> Result<String> {
        if rows.iter().any(|row| !row.is_object()) {
            return Err(SchoolEventsError::BadRequest("Export rows must be JSON objects".to_string()));
        }
        Ok(json_rows_to_csv(rows))
    }
}

/// Capacity and age range rules shared by create and update
pub fn validate_event_fields(capacity: i32, age_from: Option<i32>, age_to: Option<i32>) -> Result<()> {
    if capacity <= 0 {
        return Err(SchoolEventsError::Validation("Capacity must be greater than zero".to_string()));
    }
    if let (Some(from), Some(to)) = (age_from, age_to) {
        if from > to {
            return Err(SchoolEventsError::Validation("age_from must not be greater than age_to".to_string()));
        }
    }
    if age_from.is_some_and(|a| a < 0) || age_to.is_some_and(|a| a < 0) {
        return Err(SchoolEventsError::Validation("Age must not be negative".to_string()));
    }
    Ok(())
}

fn require_event_rights(actor: &AuthContext) -> Result<()> {
    if actor.has(Permission::ManageEvents) || actor.has(Permission::ManageOwnEvents) {
        Ok(())
    } else {
        actor.require(Permission::ManageEvents)
    }
}

/// Admins manage any event, organizers only their own
fn require_owner_or_admin(actor: &AuthContext, event: &Event) -> Result<()> {
    if actor.has(Permission::ManageEvents) {
        return Ok(());
    }
    if actor.has(Permission::ManageOwnEvents) && event.organizer_id == Some(actor.user_id()) {
        return Ok(());
    }
    Err(SchoolEventsError::PermissionDenied("Not allowed to manage this event".to_string()))
}

/// Placeholders shared by the date related emails
fn date_email_data(first_name: &str, event: &Event, date: &EventDate, reservation_code: &str) -> Value {
    json!({
        "first_name": first_name,
        "event_name": event.title,
        "event_date": date.date.format("%d.%m.%Y").to_string(),
        "event_time": date.time.format("%H:%M").to_string(),
        "reservation_code": reservation_code,
    })
}
