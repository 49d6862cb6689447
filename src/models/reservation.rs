//! Reservation and waiting list models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

text_enum! {
    ReservationStatus {
        Created => "created",
        Pending => "pending",
        Confirmed => "confirmed",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

impl ReservationStatus {
    /// Whether seats of a reservation in this state are counted as booked
    pub fn holds_seats(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Created | ReservationStatus::Pending | ReservationStatus::Confirmed
        )
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        match next {
            ReservationStatus::Confirmed => {
                matches!(self, ReservationStatus::Created | ReservationStatus::Pending)
            }
            ReservationStatus::Rejected | ReservationStatus::Cancelled => self.holds_seats(),
            ReservationStatus::Pending => matches!(self, ReservationStatus::Created),
            ReservationStatus::Created => false,
        }
    }
}

text_enum! {
    WaitingListStatus {
        Waiting => "waiting",
        Processed => "processed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: i64,
    pub event_id: i64,
    pub event_date_id: i64,
    pub user_id: i64,
    pub number_of_students: i32,
    pub number_of_teachers: i32,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
    pub status: String,
    pub local_reservation_code: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn seats(&self) -> i32 {
        self.number_of_students + self.number_of_teachers
    }

    pub fn status(&self) -> ReservationStatus {
        self.status.parse().unwrap_or(ReservationStatus::Created)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    pub event_id: i64,
    pub event_date_id: i64,
    /// Defaults to the authenticated user
    pub user_id: Option<i64>,
    #[serde(default)]
    pub number_of_students: i32,
    #[serde(default)]
    pub number_of_teachers: i32,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
}

impl CreateReservationRequest {
    pub fn seats(&self) -> i32 {
        self.number_of_students + self.number_of_teachers
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReservationRequest {
    pub number_of_students: Option<i32>,
    pub number_of_teachers: Option<i32>,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
    pub status: Option<ReservationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WaitingListEntry {
    pub id: i64,
    pub event_date_id: i64,
    pub user_id: i64,
    pub number_of_students: i32,
    pub number_of_teachers: i32,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 1-based place in the queue, only filled for waiting entries
    #[sqlx(default)]
    pub position: Option<i64>,
}

impl WaitingListEntry {
    pub fn seats(&self) -> i32 {
        self.number_of_students + self.number_of_teachers
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWaitingListRequest {
    pub event_date_id: i64,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub number_of_students: i32,
    #[serde(default)]
    pub number_of_teachers: i32,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWaitingListRequest {
    pub number_of_students: Option<i32>,
    pub number_of_teachers: Option<i32>,
    pub special_requirements: Option<String>,
    pub contact_info: Option<String>,
    pub status: Option<WaitingListStatus>,
}

/// Decide how many queued entries fit, in order, stopping at the first that does not
pub fn entries_that_fit(available_spots: i32, seats_in_order: &[i32]) -> usize {
    let mut remaining = available_spots;
    let mut count = 0;
    for seats in seats_in_order {
        if *seats > remaining {
            break;
        }
        remaining -= seats;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_transitions() {
        use ReservationStatus::*;
        assert!(Created.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
    }

    #[test]
    fn test_waiting_list_stops_at_first_misfit() {
        // the third entry does not fit even though the fourth would
        assert_eq!(entries_that_fit(10, &[3, 4, 5, 1]), 2);
        assert_eq!(entries_that_fit(0, &[1]), 0);
        assert_eq!(entries_that_fit(12, &[3, 4, 5]), 3);
        assert_eq!(entries_that_fit(5, &[]), 0);
    }
}
