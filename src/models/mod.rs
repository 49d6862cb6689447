//! Data models module
//!
//! This module contains all data structures used throughout the application.
//! Enumerated columns are stored as lower-case text; the enums below convert
//! to and from that representation.

/// Declares a text-backed enum with serde, `as_str`, `Display` and `FromStr`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn values() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::utils::errors::SchoolEventsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::utils::errors::SchoolEventsError::BadRequest(
                        format!("Invalid {} value: {}", stringify!($name), other)
                    )),
                }
            }
        }
    };
}

pub mod user;
pub mod event;
pub mod reservation;
pub mod notification;
pub mod report;

// Re-export commonly used models
pub use user::{
    User, UserRole, UserStatus, School, CreateUserRequest, UpdateUserRequest,
    RegisterSchoolRepresentativeRequest, CreateSchoolRequest,
};
pub use event::{
    Event, EventDate, Attachment, AttachmentView, EventWithDates, EventStatus, EventType, TargetGroup,
    EventDateStatus, CreateEventRequest, UpdateEventRequest, EventDateInput, AttachmentInput,
    SetLockTimeRequest, EventClaim, ClaimType, ClaimStatus, CreateClaimRequest,
    UpdateClaimStatusRequest, EventSearchParams, lock_time_for,
};
pub use reservation::{
    Reservation, ReservationStatus, CreateReservationRequest, UpdateReservationRequest,
    WaitingListEntry, WaitingListStatus, CreateWaitingListRequest, UpdateWaitingListRequest,
};
pub use notification::{
    Notification, NotificationType, NotificationStatus, CreateNotificationRequest,
    EmailLog, EmailStatus, EmailTemplate, Language, NewEmailLog,
};
pub use report::{
    Report, ReportType, ReportStatus, ReportFilters, GenerateReportRequest, StatisticsResponse,
    ChartData, AuditLog, NewAuditLog, ChangelogQuery,
};
