use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::api::handlers::{
    auth, docs, events, logs, notifications, reports, reservations, system, users, waiting_list,
};
use crate::api::state::AppState;
use crate::middleware::{limit_requests, log_requests, require_docs_auth};

/// Routes below the API prefix
fn api_routes(state: &AppState) -> Router<AppState> {
    let login = Router::new()
        .route("/auth/login_user/", post(auth::login_user))
        .route_layer(from_fn_with_state(state.login_limiter.clone(), limit_requests));

    Router::new()
        .merge(login)
        .route("/auth/refresh_token", post(auth::refresh_token))
        .route("/health", get(system::service_health))
        // users
        .route("/user/", post(users::create_user).get(users::list_users))
        .route("/user/me", get(users::me))
        .route("/user/pending", get(users::list_pending))
        .route("/user/register", post(users::register))
        .route("/user/:id", get(users::get_user).put(users::update_user).delete(users::delete_user))
        .route("/user/:id/approve", put(users::approve_user))
        .route("/user/:id/reject", put(users::reject_user))
        // events
        .route("/event/", post(events::create_event).get(events::list_events))
        .route("/event/with-dates/", get(events::list_events_with_dates))
        .route("/event/export", post(events::export_events))
        .route("/event/claims", post(events::submit_claim))
        .route("/event/claims/pending", get(events::list_pending_claims))
        .route("/event/claims/:id", put(events::review_claim))
        .route("/event/event-date/lock-time", put(events::set_lock_time))
        .route("/event/organizer/:id/events", get(events::list_by_organizer))
        .route("/event/:id", get(events::get_event).put(events::update_event).delete(events::delete_event))
        .route("/event/:id/event-date/", get(events::get_event_date))
        .route("/event/:id/mark-as-paid", post(events::mark_as_paid))
        .route("/event/:id/mark-as-completed", post(events::mark_as_completed))
        // reservations
        .route(
            "/reservation/",
            post(reservations::create_reservation).get(reservations::list_reservations),
        )
        .route(
            "/reservation/:id",
            get(reservations::get_reservation)
                .put(reservations::update_reservation)
                .delete(reservations::delete_reservation),
        )
        .route("/reservation/:id/confirm/", put(reservations::confirm_reservation))
        .route("/reservation/:id/reject/", put(reservations::reject_reservation))
        .route("/reservation/:id/cancel/", put(reservations::cancel_reservation))
        .route("/reservation/code/:code", get(reservations::get_by_code))
        .route("/reservation/event/:id", get(reservations::list_by_event))
        .route("/reservation/user/:id", get(reservations::list_by_user))
        .route("/reservation/user/:id/event/:event_id", get(reservations::list_by_user_and_event))
        // waiting list
        .route("/waiting-list/", post(waiting_list::add_entry))
        .route(
            "/waiting-list/:id",
            get(waiting_list::queue_for_date)
                .put(waiting_list::update_entry)
                .delete(waiting_list::delete_entry),
        )
        .route("/waiting-list/:id/process", post(waiting_list::process))
        .route("/waiting-list/entry/:id", get(waiting_list::get_entry))
        .route("/waiting-list/user/:id", get(waiting_list::list_by_user))
        .route(
            "/waiting-list/by-event-date/:id/user/:user_id",
            get(waiting_list::list_by_date_and_user),
        )
        // notifications
        .route("/notification/", get(notifications::list_notifications))
        .route("/notification/:id/read", put(notifications::mark_read))
        .route("/notification/:id", axum::routing::delete(notifications::delete_notification))
        // statistics and reports
        .route("/statistics/statistics", post(reports::statistics))
        .route("/report/generate", post(reports::generate_report))
        .route("/report/", get(reports::list_reports))
        .route("/report/:id", get(reports::get_report).delete(reports::delete_report))
        .route("/report/:id/export", get(reports::export_report))
        // audit log
        .route("/log/", get(logs::list_logs))
        .route("/log/changelog", get(logs::changelog))
}

fn docs_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/docs", get(docs::swagger_ui))
        .route("/api/redoc", get(docs::redoc))
        .route("/api/openapi.json", get(docs::openapi_json))
        .route_layer(from_fn_with_state(state.docs_auth.clone(), require_docs_auth))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// The complete HTTP application
pub fn create_router(state: AppState) -> Router {
    let prefix = state.settings.app.api_prefix.clone();
    let cors = cors_layer(&state.settings.app.cors_origins);

    Router::new()
        .route("/health", get(system::health))
        .route("/files/*path", get(system::serve_file))
        .nest(&prefix, api_routes(&state))
        .merge(docs_routes(&state))
        .fallback(system::route_not_found)
        .layer(cors)
        .layer(from_fn(log_requests))
        .with_state(state)
}
