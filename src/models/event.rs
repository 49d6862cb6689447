//! Event, event date, attachment and organizer claim models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::Bratislava;
use sqlx::FromRow;

text_enum! {
    EventStatus {
        Scheduled => "scheduled",
        Cancelled => "cancelled",
        Completed => "completed",
        Archived => "archived",
        Public => "public",
    }
}

text_enum! {
    EventType {
        Theater => "theater",
        Concert => "concert",
        Exhibition => "exhibition",
        Workshop => "workshop",
        Other => "other",
    }
}

text_enum! {
    TargetGroup {
        ElementarySchool => "elementary_school",
        HighSchool => "high_school",
        All => "all",
    }
}

text_enum! {
    /// Lifecycle of a single occurrence, including the payment hand-off after it took place
    EventDateStatus {
        Scheduled => "scheduled",
        CompletedUnpaid => "completed_unpaid",
        CompletedPaymentSent => "completed_payment_sent",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl EventDateStatus {
    /// Allowed successor for the mark-as-paid / mark-as-completed flow
    pub fn can_transition_to(&self, next: EventDateStatus) -> bool {
        matches!(
            (self, next),
            (EventDateStatus::Scheduled, EventDateStatus::CompletedUnpaid)
                | (EventDateStatus::Scheduled, EventDateStatus::Cancelled)
                | (EventDateStatus::CompletedUnpaid, EventDateStatus::CompletedPaymentSent)
                | (EventDateStatus::CompletedPaymentSent, EventDateStatus::Completed)
        )
    }
}

text_enum! {
    ClaimType {
        Create => "create",
        Update => "update",
        Cancel => "cancel",
    }
}

text_enum! {
    ClaimStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub institution_name: Option<String>,
    pub address: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capacity: i32,
    pub description: Option<String>,
    pub annotation: Option<String>,
    pub parent_info: Option<String>,
    pub target_group: String,
    pub age_from: Option<i32>,
    pub age_to: Option<i32>,
    pub status: String,
    pub event_type: String,
    pub duration: Option<i32>,
    pub more_info_url: Option<String>,
    pub ztp_access: bool,
    pub parking_spaces: Option<i32>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub organizer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventDate {
    pub id: i64,
    pub event_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub capacity: i32,
    pub available_spots: i32,
    pub lock_time: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventDate {
    /// Start of the occurrence; dates and times are entered in Slovak local time
    pub fn starts_at(&self) -> DateTime<Utc> {
        local_to_utc(self.date.and_time(self.time))
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.lock_time
    }

    pub fn status(&self) -> EventDateStatus {
        self.status.parse().unwrap_or(EventDateStatus::Scheduled)
    }

    pub fn booked_seats(&self) -> i32 {
        self.capacity - self.available_spots
    }
}

/// Convert a wall-clock time in Bratislava to UTC, resolving DST gaps forward
pub fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match Bratislava.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&(naive - Duration::hours(1))),
    }
}

/// Lock instant for an occurrence starting at `starts_at`
pub fn lock_time_for(starts_at: DateTime<Utc>, hours_before: i64) -> DateTime<Utc> {
    starts_at - Duration::hours(hours_before)
}

/// Spots left after the capacity of an occurrence changes; booked seats are kept
pub fn recompute_available_spots(old_capacity: i32, available: i32, new_capacity: i32) -> i32 {
    (new_capacity - (old_capacity - available)).max(0)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attachment {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub path: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub attachment_type: String,
    pub created_at: DateTime<Utc>,
}

/// Event with its occurrences and attachments, as returned by detail endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWithDates {
    #[serde(flatten)]
    pub event: Event,
    pub event_dates: Vec<EventDate>,
    pub attachments: Vec<AttachmentView>,
}

/// Attachment with a signed download URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentView {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDateInput {
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentInput {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub attachment_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub institution_name: Option<String>,
    pub address: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capacity: i32,
    pub description: Option<String>,
    pub annotation: Option<String>,
    pub parent_info: Option<String>,
    pub target_group: TargetGroup,
    pub age_from: Option<i32>,
    pub age_to: Option<i32>,
    pub status: Option<EventStatus>,
    pub event_type: EventType,
    pub duration: Option<i32>,
    pub more_info_url: Option<String>,
    #[serde(default)]
    pub ztp_access: bool,
    pub parking_spaces: Option<i32>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub organizer_id: Option<i64>,
    pub event_dates: Vec<EventDateInput>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub institution_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capacity: Option<i32>,
    pub description: Option<String>,
    pub annotation: Option<String>,
    pub parent_info: Option<String>,
    pub target_group: Option<TargetGroup>,
    pub age_from: Option<i32>,
    pub age_to: Option<i32>,
    pub status: Option<EventStatus>,
    pub event_type: Option<EventType>,
    pub duration: Option<i32>,
    pub more_info_url: Option<String>,
    pub ztp_access: Option<bool>,
    pub parking_spaces: Option<i32>,
    pub region: Option<String>,
    pub district: Option<String>,
    /// New occurrences to add
    #[serde(default)]
    pub event_dates: Vec<EventDateInput>,
    /// New attachments to add
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
    /// When present, attachments not listed here are removed
    pub existing_attachment_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLockTimeRequest {
    pub event_date_id: i64,
    #[serde(default = "default_lock_hours")]
    pub hours_before: i64,
}

fn default_lock_hours() -> i64 {
    48
}

/// Extra query parameters accepted by the event listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSearchParams {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// "lat,lon"
    pub coordinates: Option<String>,
    /// Miles
    pub radius: Option<f64>,
    pub admin: Option<bool>,
}

impl EventSearchParams {
    /// Parsed centre point of a radius search
    pub fn center(&self) -> Option<(f64, f64)> {
        let raw = self.coordinates.as_deref()?;
        let (lat, lon) = raw.split_once(',')?;
        Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventClaim {
    pub id: i64,
    pub event_id: Option<i64>,
    pub organizer_id: i64,
    pub claim_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub reviewed_by: Option<i64>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClaimRequest {
    pub event_id: Option<i64>,
    pub claim_type: ClaimType,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClaimStatusRequest {
    pub new_status: ClaimStatus,
    pub review_note: Option<String>,
}

/// Accepts "HH:MM" as well as "HH:MM:SS"
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_change_keeps_booked_seats() {
        // 100 seats, 30 booked
        assert_eq!(recompute_available_spots(100, 70, 120), 90);
        assert_eq!(recompute_available_spots(100, 70, 50), 20);
        // shrinking below booked seats never goes negative
        assert_eq!(recompute_available_spots(100, 70, 10), 0);
    }

    #[test]
    fn test_date_status_transitions() {
        use EventDateStatus::*;
        assert!(CompletedUnpaid.can_transition_to(CompletedPaymentSent));
        assert!(CompletedPaymentSent.can_transition_to(Completed));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(CompletedUnpaid));
    }

    #[test]
    fn test_lock_time_uses_local_start() {
        let now = Utc::now();
        let date = EventDate {
            id: 1,
            event_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 8, 20).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            capacity: 100,
            available_spots: 100,
            lock_time: now,
            status: "scheduled".into(),
            created_at: now,
            updated_at: now,
        };
        // CEST is UTC+2
        assert_eq!(date.starts_at().to_rfc3339(), "2024-08-20T08:00:00+00:00");
        let lock = lock_time_for(date.starts_at(), 48);
        assert_eq!(lock.to_rfc3339(), "2024-08-18T08:00:00+00:00");
        assert_eq!(date.booked_seats(), 0);
    }

    #[test]
    fn test_search_center_parsing() {
        let params = EventSearchParams {
            coordinates: Some("48.1486, 17.1077".into()),
            ..Default::default()
        };
        assert_eq!(params.center(), Some((48.1486, 17.1077)));

        let params = EventSearchParams {
            coordinates: Some("nowhere".into()),
            ..Default::default()
        };
        assert_eq!(params.center(), None);
    }

    #[test]
    fn test_event_date_input_accepts_short_time() {
        let input: EventDateInput = serde_json::from_str(r#"{"date":"2024-08-20","time":"10:00"}"#).unwrap();
        assert_eq!(input.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert!(serde_json::from_str::<EventDateInput>(r#"{"date":"2024-08-20","time":"25:00"}"#).is_err());
    }
}
