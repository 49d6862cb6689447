//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod user;
pub mod event;
pub mod event_date;
pub mod reservation;
pub mod notification;
pub mod report;
pub mod statistics;

// Re-export repositories
pub use user::{UserRepository, SchoolRepository, NewUser, UserChanges};
pub use event::EventRepository;
pub use event_date::EventDateRepository;
pub use reservation::{
    ReservationRepository, WaitingListRepository, NewReservation, ReservationChanges, ReservationRecipient,
};
pub use notification::{NotificationRepository, EmailLogRepository};
pub use report::{ReportRepository, AuditLogRepository};
pub use statistics::{StatisticsRepository, EventGrouping};
