//! Reservation service
//!
//! Seats are taken from and returned to `event_dates.available_spots` inside
//! the same transaction that writes the reservation, with the date row locked.

use chrono::Utc;
use serde_json::json;
use sqlx::PgConnection;
use tracing::{info, warn};

use crate::database::filters::{FilterSet, PageRequest, Pagination};
use crate::database::{DatabaseService, NewReservation, ReservationChanges};
use crate::models::{
    CreateReservationRequest, EmailTemplate, Event, EventDate, NewAuditLog, NewEmailLog, Reservation,
    ReservationStatus, UpdateReservationRequest, User,
};
use crate::services::auth::{AuthContext, Permission};
use crate::services::email::EmailService;
use crate::tasks::{Job, TaskQueue};
use crate::utils::errors::{SchoolEventsError, Result};
use crate::utils::helpers::generate_random_id;
use crate::utils::logging::log_reservation_action;

pub const RESERVATION_CODE_LENGTH: usize = 9;
const CODE_ATTEMPTS: usize = 10;

pub const MSG_INVALID_SEATS: &str = "Invalid number of seats. The number of seats must be greater than zero.";
pub const MSG_INSUFFICIENT_CAPACITY: &str = "Insufficient capacity for the reservation";
pub const MSG_DATE_LOCKED: &str = "Event date is locked";

#[derive(Clone, Debug)]
pub struct ReservationService {
    db: DatabaseService,
    emails: EmailService,
    queue: TaskQueue,
}

impl ReservationService {
    pub fn new(db: DatabaseService, emails: EmailService, queue: TaskQueue) -> Self {
        Self { db, emails, queue }
    }

    /// Book seats on an event date
    pub async fn create_reservation(
        &self,
        actor: &AuthContext,
        request: CreateReservationRequest,
    ) -> Result<Reservation> {
        actor.require(Permission::MakeReservations)?;
        let user_id = match request.user_id {
            Some(id) if actor.is_admin() => id,
            _ => actor.user_id(),
        };
        validate_seats(request.number_of_students, request.number_of_teachers)?;
        let seats = request.seats();

        let event = self
            .db
            .events
            .find_by_id(request.event_id)
            .await?
            .ok_or(SchoolEventsError::EventNotFound { event_id: request.event_id })?;
        let user = self
            .db
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SchoolEventsError::UserNotFound { user_id })?;

        let mut tx = self.db.begin().await?;
        let date = self.db.event_dates.find_for_update(&mut tx, request.event_date_id).await?;
        if date.event_id != event.id {
            return Err(SchoolEventsError::EventDateNotFound { event_date_id: date.id });
        }
        ensure_bookable(&date, seats)?;

        let code = unique_reservation_code(&self.db, &mut tx).await?;
        let reservation = self
            .db
            .reservations
            .create(
                &mut tx,
                NewReservation {
                    event_id: event.id,
                    event_date_id: date.id,
                    user_id,
                    number_of_students: request.number_of_students,
                    number_of_teachers: request.number_of_teachers,
                    special_requirements: request.special_requirements,
                    contact_info: request.contact_info,
                    comment: request.comment,
                    status: ReservationStatus::Created,
                    local_reservation_code: code,
                },
            )
            .await?;
        let updated_date = self.db.event_dates.adjust_spots(&mut tx, date.id, -seats).await?;

        self.db
            .audit(&mut tx, NewAuditLog::change("reservations", reservation.id, Some(actor.user_id()), None, Some(&reservation)))
            .await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("event_dates", date.id, Some(actor.user_id()), Some(&date), Some(&updated_date)))
            .await?;

        let email = reservation_email(&self.emails, &user, &event, &updated_date, &reservation);
        let log = self.emails.record(&mut tx, &email).await?;
        tx.commit().await?;

        self.emails.dispatch(&[log.email_log_id]).await;
        log_reservation_action(reservation.id, "create", actor.user_id(), seats);
        Ok(reservation)
    }

    pub async fn get_reservation(&self, actor: &AuthContext, reservation_id: i64) -> Result<Reservation> {
        let reservation = self.find(reservation_id).await?;
        self.require_access(actor, &reservation).await?;
        Ok(reservation)
    }

    pub async fn get_by_code(&self, actor: &AuthContext, code: &str) -> Result<Reservation> {
        let reservation = self
            .db
            .reservations
            .find_by_code(&code.trim().to_ascii_uppercase())
            .await?
            .ok_or_else(|| SchoolEventsError::BadRequest("Reservation not found".to_string()))?;
        self.require_access(actor, &reservation).await?;
        Ok(reservation)
    }

    async fn find(&self, reservation_id: i64) -> Result<Reservation> {
        self.db
            .reservations
            .find_by_id(reservation_id)
            .await?
            .ok_or(SchoolEventsError::ReservationNotFound { reservation_id })
    }

    /// Admins see all reservations, organizers those on their events, everyone else their own
    pub async fn list_reservations(
        &self,
        actor: &AuthContext,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Reservation>> {
        if actor.has(Permission::ManageReservations) {
            self.db.reservations.list(filters, page).await
        } else if actor.has(Permission::ManageOwnEvents) {
            self.db.reservations.list_by_organizer(actor.user_id(), filters, page).await
        } else {
            self.db.reservations.list_by_user(actor.user_id(), None, filters, page).await
        }
    }

    pub async fn list_by_event(
        &self,
        actor: &AuthContext,
        event_id: i64,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Reservation>> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or(SchoolEventsError::EventNotFound { event_id })?;
        if !actor.has(Permission::ManageReservations) && event.organizer_id != Some(actor.user_id()) {
            return Err(SchoolEventsError::PermissionDenied("Not allowed to view reservations of this event".to_string()));
        }
        self.db.reservations.list_by_event(event_id, filters, page).await
    }

    pub async fn list_by_user(
        &self,
        actor: &AuthContext,
        user_id: i64,
        event_id: Option<i64>,
        filters: &FilterSet,
        page: PageRequest,
    ) -> Result<Pagination<Reservation>> {
        actor.require_self_or_admin(user_id)?;
        self.db.reservations.list_by_user(user_id, event_id, filters, page).await
    }

    /// Edit details; seat changes take or return spots
    pub async fn update_reservation(
        &self,
        actor: &AuthContext,
        reservation_id: i64,
        request: UpdateReservationRequest,
    ) -> Result<Reservation> {
        let existing = self.find(reservation_id).await?;
        self.require_access(actor, &existing).await?;

        let mut tx = self.db.begin().await?;
        let date = self.db.event_dates.find_for_update(&mut tx, existing.event_date_id).await?;
        let current = self.db.reservations.find_for_update(&mut tx, reservation_id).await?;

        let students = request.number_of_students.unwrap_or(current.number_of_students);
        let teachers = request.number_of_teachers.unwrap_or(current.number_of_teachers);
        let seat_change = students != current.number_of_students || teachers != current.number_of_teachers;
        let mut freed = 0;

        if seat_change {
            if !current.status().holds_seats() {
                return Err(SchoolEventsError::BadRequest(format!(
                    "Seats of a {} reservation cannot be changed",
                    current.status
                )));
            }
            validate_seats(students, teachers)?;
            let delta = students + teachers - current.seats();
            if delta > 0 {
                ensure_bookable(&date, delta)?;
            }
            let updated_date = self.db.event_dates.adjust_spots(&mut tx, date.id, -delta).await?;
            self.db
                .audit(&mut tx, NewAuditLog::change("event_dates", date.id, Some(actor.user_id()), Some(&date), Some(&updated_date)))
                .await?;
            freed = (-delta).max(0);
        }

        let mut updated = self
            .db
            .reservations
            .update(
                &mut tx,
                reservation_id,
                ReservationChanges {
                    number_of_students: request.number_of_students,
                    number_of_teachers: request.number_of_teachers,
                    special_requirements: request.special_requirements,
                    contact_info: request.contact_info,
                    comment: request.comment,
                },
            )
            .await?;

        if let Some(next) = request.status.filter(|s| *s != updated.status()) {
            self.require_manage(actor, &updated).await?;
            let (after, restored) = self.apply_transition(&mut tx, &updated, next, actor.user_id()).await?;
            freed += restored;
            updated = after;
        }

        self.db
            .audit(&mut tx, NewAuditLog::change("reservations", reservation_id, Some(actor.user_id()), Some(&current), Some(&updated)))
            .await?;
        tx.commit().await?;

        log_reservation_action(reservation_id, "update", actor.user_id(), updated.seats());
        if freed > 0 {
            self.queue_waiting_list(updated.event_date_id).await;
        }
        Ok(updated)
    }

    /// Hard delete; held seats go back to the date
    pub async fn delete_reservation(&self, actor: &AuthContext, reservation_id: i64) -> Result<Reservation> {
        let existing = self.find(reservation_id).await?;
        self.require_access(actor, &existing).await?;

        let mut tx = self.db.begin().await?;
        let date = self.db.event_dates.find_for_update(&mut tx, existing.event_date_id).await?;
        let current = self.db.reservations.find_for_update(&mut tx, reservation_id).await?;
        let restores = current.status().holds_seats();
        if restores {
            let updated_date = self.db.event_dates.adjust_spots(&mut tx, date.id, current.seats()).await?;
            self.db
                .audit(&mut tx, NewAuditLog::change("event_dates", date.id, Some(actor.user_id()), Some(&date), Some(&updated_date)))
                .await?;
        }
        self.db.reservations.delete(&mut tx, reservation_id).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("reservations", reservation_id, Some(actor.user_id()), Some(&current), None))
            .await?;
        tx.commit().await?;

        log_reservation_action(reservation_id, "delete", actor.user_id(), current.seats());
        if restores {
            self.queue_waiting_list(current.event_date_id).await;
        }
        Ok(current)
    }

    /// created/pending -> confirmed
    pub async fn confirm_reservation(&self, actor: &AuthContext, reservation_id: i64) -> Result<Reservation> {
        let existing = self.find(reservation_id).await?;
        self.require_manage(actor, &existing).await?;
        self.transition(actor, reservation_id, ReservationStatus::Confirmed).await
    }

    /// Seat-holding -> rejected, seats returned
    pub async fn reject_reservation(&self, actor: &AuthContext, reservation_id: i64) -> Result<Reservation> {
        let existing = self.find(reservation_id).await?;
        self.require_manage(actor, &existing).await?;
        self.transition(actor, reservation_id, ReservationStatus::Rejected).await
    }

    /// Cancelled by the owner or an admin, seats returned
    pub async fn cancel_reservation(&self, actor: &AuthContext, reservation_id: i64) -> Result<Reservation> {
        let existing = self.find(reservation_id).await?;
        actor.require_self_or_admin(existing.user_id)?;
        self.transition(actor, reservation_id, ReservationStatus::Cancelled).await
    }

    async fn transition(&self, actor: &AuthContext, reservation_id: i64, next: ReservationStatus) -> Result<Reservation> {
        let current = self.find(reservation_id).await?;
        let mut tx = self.db.begin().await?;
        // lock order: date first, then reservation
        self.db.event_dates.find_for_update(&mut tx, current.event_date_id).await?;
        let current = self.db.reservations.find_for_update(&mut tx, reservation_id).await?;

        let (updated, restored) = self.apply_transition(&mut tx, &current, next, actor.user_id()).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("reservations", reservation_id, Some(actor.user_id()), Some(&current), Some(&updated)))
            .await?;
        tx.commit().await?;

        log_reservation_action(reservation_id, next.as_str(), actor.user_id(), updated.seats());
        if restored > 0 {
            self.queue_waiting_list(updated.event_date_id).await;
        }
        Ok(updated)
    }

    /// Status change with seat restoration; the date row must already be locked
    async fn apply_transition(
        &self,
        conn: &mut PgConnection,
        current: &Reservation,
        next: ReservationStatus,
        actor_id: i64,
    ) -> Result<(Reservation, i32)> {
        let from = current.status();
        if !from.can_transition_to(next) {
            return Err(SchoolEventsError::InvalidStateTransition {
                from: from.to_string(),
                to: next.to_string(),
            });
        }

        let mut restored = 0;
        if from.holds_seats() && !next.holds_seats() {
            let before = self.db.event_dates.find_for_update(conn, current.event_date_id).await?;
            let after = self.db.event_dates.adjust_spots(conn, current.event_date_id, current.seats()).await?;
            self.db
                .audit(conn, NewAuditLog::change("event_dates", before.id, Some(actor_id), Some(&before), Some(&after)))
                .await?;
            restored = current.seats();
        }

        let updated = self.db.reservations.set_status(conn, current.id, next).await?;
        Ok((updated, restored))
    }

    async fn queue_waiting_list(&self, event_date_id: i64) {
        self.queue.enqueue_or_log(Job::ProcessWaitingList { event_date_id }).await;
    }

    /// Owner, organizer of the event, or reservation manager
    async fn require_access(&self, actor: &AuthContext, reservation: &Reservation) -> Result<()> {
        if actor.has(Permission::ManageReservations) || reservation.user_id == actor.user_id() {
            return Ok(());
        }
        self.require_organizer(actor, reservation).await
    }

    /// Organizer of the event or reservation manager
    async fn require_manage(&self, actor: &AuthContext, reservation: &Reservation) -> Result<()> {
        if actor.has(Permission::ManageReservations) {
            return Ok(());
        }
        self.require_organizer(actor, reservation).await
    }

    async fn require_organizer(&self, actor: &AuthContext, reservation: &Reservation) -> Result<()> {
        let organizer = self
            .db
            .events
            .find_by_id(reservation.event_id)
            .await?
            .and_then(|e| e.organizer_id);
        if actor.has(Permission::ManageOwnEvents) && organizer == Some(actor.user_id()) {
            return Ok(());
        }
        Err(SchoolEventsError::PermissionDenied("Not allowed to access this reservation".to_string()))
    }
}

/// Students and teachers must be non-negative and add up to at least one
pub fn validate_seats(students: i32, teachers: i32) -> Result<()> {
    if students < 0 || teachers < 0 || students + teachers <= 0 {
        return Err(SchoolEventsError::BadRequest(MSG_INVALID_SEATS.to_string()));
    }
    Ok(())
}

/// Lock time and capacity check against a locked date row
pub fn ensure_bookable(date: &EventDate, seats: i32) -> Result<()> {
    if date.is_locked_at(Utc::now()) {
        return Err(SchoolEventsError::BadRequest(MSG_DATE_LOCKED.to_string()));
    }
    if date.available_spots < seats {
        return Err(SchoolEventsError::BadRequest(MSG_INSUFFICIENT_CAPACITY.to_string()));
    }
    Ok(())
}

/// A fresh code not used by any reservation
pub async fn unique_reservation_code(db: &DatabaseService, conn: &mut PgConnection) -> Result<String> {
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_random_id(RESERVATION_CODE_LENGTH);
        if !db.reservations.code_exists(conn, &code).await? {
            return Ok(code);
        }
        warn!(code = %code, "Reservation code collision");
    }
    Err(SchoolEventsError::Internal("Could not allocate a reservation code".to_string()))
}

/// Booking confirmation; always Slovak
pub(crate) fn reservation_email(
    emails: &EmailService,
    user: &User,
    event: &Event,
    date: &EventDate,
    reservation: &Reservation,
) -> NewEmailLog {
    info!(reservation_id = reservation.id, recipient = %user.user_email, "Reservation confirmation queued");
    emails.compose(
        EmailTemplate::SchoolRepresentativeReservation,
        "sk",
        &user.user_email,
        Some(user.user_id),
        json!({
            "first_name": user.first_name,
            "reservation_code": reservation.local_reservation_code,
            "event_name": event.title,
            "event_date": date.date.format("%d.%m.%Y").to_string(),
            "event_time": date.time.format("%H:%M").to_string(),
            "number_of_students": reservation.number_of_students,
            "number_of_teachers": reservation.number_of_teachers,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveDate, NaiveTime};

    fn date(available_spots: i32, lock_in_hours: i64) -> EventDate {
        let now = Utc::now();
        EventDate {
            id: 1,
            event_id: 1,
            date: NaiveDate::from_ymd_opt(2030, 5, 4).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            capacity: 100,
            available_spots,
            lock_time: now + Duration::hours(lock_in_hours),
            status: "scheduled".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_seat_validation() {
        assert!(validate_seats(20, 2).is_ok());
        assert!(validate_seats(0, 1).is_ok());
        assert_matches!(validate_seats(0, 0), Err(SchoolEventsError::BadRequest(msg)) if msg == MSG_INVALID_SEATS);
        assert!(validate_seats(-3, 5).is_err());
    }

    #[test]
    fn test_bookable_checks_lock_before_capacity() {
        assert!(ensure_bookable(&date(10, 24), 10).is_ok());
        assert_matches!(
            ensure_bookable(&date(9, 24), 10),
            Err(SchoolEventsError::BadRequest(msg)) if msg == MSG_INSUFFICIENT_CAPACITY
        );
        assert_matches!(
            ensure_bookable(&date(0, -1), 10),
            Err(SchoolEventsError::BadRequest(msg)) if msg == MSG_DATE_LOCKED
        );
    }
}
