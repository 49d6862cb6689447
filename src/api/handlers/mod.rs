//! Route handlers, one module per resource

pub mod auth;
pub mod docs;
pub mod events;
pub mod logs;
pub mod notifications;
pub mod reports;
pub mod reservations;
pub mod system;
pub mod users;
pub mod waiting_list;
