//! HTTP API
//!
//! axum router, response envelope, extractors and handlers.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod router;
pub mod state;

pub use error::{ApiForm, ApiJson, ApiPath, ApiQuery};
pub use extract::{CurrentUser, ListParams, MaybeUser};
pub use response::{ApiResult, Download, GenericResponse};
pub use router::create_router;
pub use state::AppState;
