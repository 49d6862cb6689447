//! Test data builders

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Days, NaiveTime, Utc};
use fake::faker::name::en::FirstName;
use fake::Fake;
use school_events::{
    database::NewUser,
    models::{
        CreateEventRequest, CreateReservationRequest, CreateSchoolRequest, EventDateInput, EventType,
        EventWithDates, TargetGroup, User, UserRole, UserStatus,
    },
    services::auth::hash_password,
};

use super::test_context::TestContext;

pub const TEST_PASSWORD: &str = "Secret123!";

static NEXT_ICO: AtomicU32 = AtomicU32::new(10_000_000);

/// Insert an active user with `TEST_PASSWORD`
pub async fn create_user(ctx: &TestContext, email: &str, role: UserRole) -> User {
    create_user_with_status(ctx, email, role, UserStatus::Active).await
}

pub async fn create_user_with_status(ctx: &TestContext, email: &str, role: UserRole, status: UserStatus) -> User {
    let db = &ctx.services.db;
    let school_id = if role == UserRole::SchoolRepresentative {
        let mut tx = db.begin().await.expect("Failed to begin");
        let school = db
            .schools
            .create(&mut tx, sample_school(&NEXT_ICO.fetch_add(1, Ordering::Relaxed).to_string()))
            .await
            .expect("Failed to create school");
        tx.commit().await.expect("Failed to commit");
        Some(school.id)
    } else {
        None
    };

    let mut tx = db.begin().await.expect("Failed to begin");
    let user = db
        .users
        .create(
            &mut tx,
            NewUser {
                first_name: FirstName().fake(),
                last_name: role.as_str().to_string(),
                user_email: email.to_string(),
                password_hash: hash_password(TEST_PASSWORD).expect("Failed to hash password"),
                role,
                status,
                preferred_language: "sk".to_string(),
                phone_number: Some("+421900000000".to_string()),
                school_id,
                email_verified: true,
            },
        )
        .await
        .expect("Failed to create user");
    tx.commit().await.expect("Failed to commit");
    user
}

pub fn sample_school(ico: &str) -> CreateSchoolRequest {
    CreateSchoolRequest {
        name: format!("Test School {}", ico),
        ico: ico.to_string(),
        address: Some("Skolska 1".to_string()),
        city: Some("Bratislava".to_string()),
        psc: Some("81101".to_string()),
        district: None,
        region: None,
        number_of_students: Some(200),
        number_of_employees: Some(20),
    }
}

/// Event with a single date `days_ahead` days from today at 10:00
pub fn sample_event(title: &str, capacity: i32, days_ahead: u64) -> CreateEventRequest {
    let date = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(days_ahead))
        .expect("date in range");
    CreateEventRequest {
        title: title.to_string(),
        institution_name: Some("City Theatre".to_string()),
        address: "Main Square 1".to_string(),
        city: "Bratislava".to_string(),
        latitude: None,
        longitude: None,
        capacity,
        description: Some(format!("{} description", title)),
        annotation: None,
        parent_info: None,
        target_group: TargetGroup::All,
        age_from: Some(6),
        age_to: Some(15),
        status: None,
        event_type: EventType::Theater,
        duration: Some(90),
        more_info_url: None,
        ztp_access: true,
        parking_spaces: Some(10),
        region: None,
        district: None,
        organizer_id: None,
        event_dates: vec![EventDateInput { date, time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time") }],
        attachments: vec![],
    }
}

/// Create an event as the given admin or organizer
pub async fn create_event(ctx: &TestContext, actor_id: i64, title: &str, capacity: i32) -> EventWithDates {
    let actor = ctx.auth(actor_id).await;
    ctx.services
        .event_service
        .create_event(&actor, sample_event(title, capacity, 30))
        .await
        .expect("Failed to create event")
}

pub fn reservation_request(event: &EventWithDates, students: i32, teachers: i32) -> CreateReservationRequest {
    CreateReservationRequest {
        event_id: event.event.id,
        event_date_id: event.event_dates[0].id,
        user_id: None,
        number_of_students: students,
        number_of_teachers: teachers,
        special_requirements: None,
        contact_info: Some("teacher@school.sk".to_string()),
        comment: None,
    }
}
