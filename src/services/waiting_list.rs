//! Waiting list service
//!
//! Entries queue for a full event date. Processing walks the queue in
//! arrival order and turns entries into confirmed reservations while they fit,
//! stopping at the first one that does not.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::filters::{FilterSet, PageRequest, Pagination};
use crate::database::{DatabaseService, NewReservation};
use crate::models::reservation::entries_that_fit;
use crate::models::{
    CreateWaitingListRequest, EventDateStatus, NewAuditLog, Reservation, ReservationStatus,
    UpdateWaitingListRequest, WaitingListEntry, WaitingListStatus,
};
use crate::services::auth::{AuthContext, Permission};
use crate::services::email::EmailService;
use crate::services::reservation::{reservation_email, unique_reservation_code, validate_seats, MSG_DATE_LOCKED};
use crate::utils::errors::{SchoolEventsError, Result};
use crate::utils::logging::log_reservation_action;

/// Result of one processing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub processed_entries: usize,
}

#[derive(Clone, Debug)]
pub struct WaitingListService {
    db: DatabaseService,
    emails: EmailService,
}

impl WaitingListService {
    pub fn new(db: DatabaseService, emails: EmailService) -> Self {
        Self { db, emails }
    }

    pub async fn create_entry(&self, actor: &AuthContext, request: CreateWaitingListRequest) -> Result<WaitingListEntry> {
        actor.require(Permission::MakeReservations)?;
        let user_id = match request.user_id {
            Some(id) if actor.is_admin() => id,
            _ => actor.user_id(),
        };
        validate_seats(request.number_of_students, request.number_of_teachers)?;

        let date = self
            .db
            .event_dates
            .find_by_id(request.event_date_id)
            .await?
            .ok_or(SchoolEventsError::EventDateNotFound { event_date_id: request.event_date_id })?;
        if date.is_locked_at(Utc::now()) {
            return Err(SchoolEventsError::BadRequest(MSG_DATE_LOCKED.to_string()));
        }

        let mut tx = self.db.begin().await?;
        let entry = self.db.waiting_list.create(&mut tx, user_id, &request).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("waiting_list", entry.id, Some(actor.user_id()), None, Some(&entry)))
            .await?;
        tx.commit().await?;

        info!(entry_id = entry.id, event_date_id = date.id, user_id, seats = entry.seats(), "Waiting list entry created");
        Ok(entry)
    }

    /// Waiting entries of a date with their 1-based position
    pub async fn queue_for_date(&self, event_date_id: i64) -> Result<Vec<WaitingListEntry>> {
        if self.db.event_dates.find_by_id(event_date_id).await?.is_none() {
            return Err(SchoolEventsError::EventDateNotFound { event_date_id });
        }
        self.db.waiting_list.queue_for_date(event_date_id).await
    }

    pub async fn get_entry(&self, actor: &AuthContext, entry_id: i64) -> Result<WaitingListEntry> {
        let entry = self.find(entry_id).await?;
        require_owner_or_manager(actor, &entry)?;
        Ok(entry)
    }

    async fn find(&self, entry_id: i64) -> Result<WaitingListEntry> {
        self.db
            .waiting_list
            .find_by_id(entry_id)
            .await?
            .ok_or(SchoolEventsError::WaitingListEntryNotFound { entry_id })
    }

    pub async fn list_by_user(
        &self,
        actor: &AuthContext,
        user_id: i64,
        event_date_id: Option<i64>,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<WaitingListEntry>> {
        actor.require_self_or_admin(user_id)?;
        self.db.waiting_list.list_by_user(user_id, event_date_id, filters, page).await
    }

    pub async fn update_entry(
        &self,
        actor: &AuthContext,
        entry_id: i64,
        request: UpdateWaitingListRequest,
    ) -> Result<WaitingListEntry> {
        let existing = self.find(entry_id).await?;
        require_owner_or_manager(actor, &existing)?;
        if request.number_of_students.is_some() || request.number_of_teachers.is_some() {
            validate_seats(
                request.number_of_students.unwrap_or(existing.number_of_students),
                request.number_of_teachers.unwrap_or(existing.number_of_teachers),
            )?;
        }
        if request.status == Some(WaitingListStatus::Processed) {
            return Err(SchoolEventsError::BadRequest("Entries are processed by the waiting list run".to_string()));
        }

        let mut tx = self.db.begin().await?;
        let updated = self.db.waiting_list.update(&mut tx, entry_id, &request).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("waiting_list", entry_id, Some(actor.user_id()), Some(&existing), Some(&updated)))
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Soft delete: the entry leaves the queue as cancelled
    pub async fn delete_entry(&self, actor: &AuthContext, entry_id: i64) -> Result<WaitingListEntry> {
        let existing = self.find(entry_id).await?;
        require_owner_or_manager(actor, &existing)?;

        let mut tx = self.db.begin().await?;
        let cancelled = self.db.waiting_list.set_status(&mut tx, entry_id, WaitingListStatus::Cancelled).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("waiting_list", entry_id, Some(actor.user_id()), Some(&existing), Some(&cancelled)))
            .await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Manual run from the API
    pub async fn process_for_actor(&self, actor: &AuthContext, event_date_id: i64) -> Result<ProcessOutcome> {
        actor.require(Permission::ManageWaitingList)?;
        self.process(event_date_id, Some(actor.user_id())).await
    }

    /// Convert fitting entries into confirmed reservations in FIFO order
    pub async fn process(&self, event_date_id: i64, actor_id: Option<i64>) -> Result<ProcessOutcome> {
        let mut tx = self.db.begin().await?;
        let date = self.db.event_dates.find_for_update(&mut tx, event_date_id).await?;
        if date.status() != EventDateStatus::Scheduled {
            debug!(event_date_id, status = %date.status, "Waiting list skipped for closed date");
            return Ok(ProcessOutcome::default());
        }

        let queue = self.db.waiting_list.queue_for_update(&mut tx, event_date_id).await?;
        let seats: Vec<i32> = queue.iter().map(WaitingListEntry::seats).collect();
        let fitting = entries_that_fit(date.available_spots, &seats);
        if fitting == 0 {
            return Ok(ProcessOutcome::default());
        }

        let mut created: Vec<Reservation> = Vec::with_capacity(fitting);
        for entry in queue.into_iter().take(fitting) {
            let code = unique_reservation_code(&self.db, &mut tx).await?;
            let reservation = self
                .db
                .reservations
                .create(
                    &mut tx,
                    NewReservation {
                        event_id: date.event_id,
                        event_date_id,
                        user_id: entry.user_id,
                        number_of_students: entry.number_of_students,
                        number_of_teachers: entry.number_of_teachers,
                        special_requirements: entry.special_requirements.clone(),
                        contact_info: entry.contact_info.clone(),
                        comment: None,
                        status: ReservationStatus::Confirmed,
                        local_reservation_code: code,
                    },
                )
                .await?;
            self.db.event_dates.adjust_spots(&mut tx, event_date_id, -entry.seats()).await?;
            let processed = self.db.waiting_list.set_status(&mut tx, entry.id, WaitingListStatus::Processed).await?;

            self.db
                .audit(&mut tx, NewAuditLog::change("reservations", reservation.id, actor_id, None, Some(&reservation)))
                .await?;
            self.db
                .audit(&mut tx, NewAuditLog::change("waiting_list", entry.id, actor_id, Some(&entry), Some(&processed)))
                .await?;
            created.push(reservation);
        }

        let updated_date = self.db.event_dates.find_for_update(&mut tx, event_date_id).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("event_dates", event_date_id, actor_id, Some(&date), Some(&updated_date)))
            .await?;
        tx.commit().await?;

        info!(event_date_id, processed = created.len(), available_spots = updated_date.available_spots, "Waiting list processed");
        for reservation in &created {
            log_reservation_action(reservation.id, "from_waiting_list", actor_id.unwrap_or(0), reservation.seats());
        }
        self.send_confirmations(&created).await;

        Ok(ProcessOutcome { processed_entries: created.len() })
    }

    /// Every date that still has people waiting
    pub async fn process_all(&self) -> Result<usize> {
        let mut total = 0;
        for event_date_id in self.db.event_dates.ids_with_waiting_entries().await? {
            match self.process(event_date_id, None).await {
                Ok(outcome) => total += outcome.processed_entries,
                Err(e) => warn!(event_date_id, error = %e, "Waiting list processing failed"),
            }
        }
        Ok(total)
    }

    async fn send_confirmations(&self, reservations: &[Reservation]) {
        for reservation in reservations {
            let result: Result<()> = async {
                let user = self
                    .db
                    .users
                    .find_by_id(reservation.user_id)
                    .await?
                    .ok_or(SchoolEventsError::UserNotFound { user_id: reservation.user_id })?;
                let event = self
                    .db
                    .events
                    .find_by_id(reservation.event_id)
                    .await?
                    .ok_or(SchoolEventsError::EventNotFound { event_id: reservation.event_id })?;
                let date = self
                    .db
                    .event_dates
                    .find_by_id(reservation.event_date_id)
                    .await?
                    .ok_or(SchoolEventsError::EventDateNotFound { event_date_id: reservation.event_date_id })?;
                self.emails
                    .queue_email(reservation_email(&self.emails, &user, &event, &date, reservation))
                    .await?;
                Ok(())
            }
            .await;

            if let Err(e) = result {
                warn!(reservation_id = reservation.id, error = %e, "Failed to queue waiting list confirmation");
            }
        }
    }
}

fn require_owner_or_manager(actor: &AuthContext, entry: &WaitingListEntry) -> Result<()> {
    if entry.user_id == actor.user_id() || actor.has(Permission::ManageWaitingList) {
        return Ok(());
    }
    Err(SchoolEventsError::PermissionDenied("Not allowed to access this waiting list entry".to_string()))
}
