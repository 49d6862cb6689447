//! Database module
//!
//! This module handles database connections, generic listing and repositories

pub mod connection;
pub mod filters;
pub mod repositories;
pub mod seed;
pub mod service;

// Re-export commonly used database components
pub use connection::{DatabasePool, PoolConfig, create_pool, create_lazy_pool, run_migrations, health_check};
pub use filters::{FilterSet, PageRequest, Pagination, TableSpec};
pub use repositories::{
    UserRepository, SchoolRepository, EventRepository, EventDateRepository, ReservationRepository,
    WaitingListRepository, NotificationRepository, EmailLogRepository, ReportRepository, AuditLogRepository,
    StatisticsRepository, NewUser, UserChanges, NewReservation, ReservationChanges, ReservationRecipient,
    EventGrouping,
};
pub use service::DatabaseService;
