//! Sample data for development and demos
//!
//! Every seed step checks for existing rows first, so running it twice
//! leaves the database unchanged.

use chrono::{Days, Local, NaiveDate, NaiveTime};
use clap::ValueEnum;
use tracing::info;

use crate::config::Settings;
use crate::database::repositories::{NewReservation, NewUser};
use crate::database::DatabaseService;
use crate::models::{
    CreateEventRequest, CreateSchoolRequest, CreateWaitingListRequest, Event, EventDate, EventDateInput, EventType,
    ReservationStatus, TargetGroup, UserRole, UserStatus,
};
use crate::services::{auth::hash_password, reservation::unique_reservation_code};
use crate::utils::errors::{Result, SchoolEventsError};

/// Data sets the seeder knows
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SeedTarget {
    All,
    Admin,
    Events,
    Users,
    Demo,
    Reservations,
}

fn invalid(what: &str) -> SchoolEventsError {
    SchoolEventsError::Internal(format!("invalid {}", what))
}

pub const SEED_PASSWORD: &str = "root";
pub const ADMIN_EMAILS: &[&str] = &["admin@admin.com", "test@test.com", "test1@test1.com"];

struct SampleEvent {
    title: &'static str,
    date: NaiveDate,
    time: NaiveTime,
    location: &'static str,
    capacity: i32,
    description: &'static str,
    event_type: EventType,
    target_group: TargetGroup,
}

struct SampleUser {
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    role: UserRole,
    school: Option<(&'static str, &'static str, &'static str)>,
}

const SAMPLE_USERS: &[SampleUser] = &[
    SampleUser {
        first_name: "Olivia",
        last_name: "Organizer",
        email: "organizer@example.com",
        role: UserRole::Organizer,
        school: None,
    },
    SampleUser {
        first_name: "Adam",
        last_name: "Analyst",
        email: "analyst@example.com",
        role: UserRole::Analyst,
        school: None,
    },
    SampleUser {
        first_name: "Jana",
        last_name: "Novakova",
        email: "school1@example.com",
        role: UserRole::SchoolRepresentative,
        school: Some(("Zakladna skola Hlboka", "00161001", "Bratislava")),
    },
    SampleUser {
        first_name: "Peter",
        last_name: "Horvath",
        email: "school2@example.com",
        role: UserRole::SchoolRepresentative,
        school: Some(("Gymnazium Jura Hronca", "00161002", "Bratislava")),
    },
];

/// Idempotent sample data loader
pub struct Seeder {
    db: DatabaseService,
    settings: Settings,
    password_hash: String,
}

impl Seeder {
    pub fn new(db: DatabaseService, settings: Settings) -> Result<Self> {
        Ok(Self { db, settings, password_hash: hash_password(SEED_PASSWORD)? })
    }

    pub async fn run(&self, target: SeedTarget) -> Result<()> {
        match target {
            SeedTarget::All => {
                self.seed_admin().await?;
                self.seed_users().await?;
                self.seed_events().await?;
                self.seed_demo().await?;
                self.seed_reservations().await?;
            }
            SeedTarget::Admin => self.seed_admin().await?,
            SeedTarget::Events => self.seed_events().await?,
            SeedTarget::Users => self.seed_users().await?,
            SeedTarget::Demo => self.seed_demo().await?,
            SeedTarget::Reservations => self.seed_reservations().await?,
        }
        Ok(())
    }

    async fn ensure_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        role: UserRole,
        school_id: Option<i64>,
    ) -> Result<i64> {
        if let Some(user) = self.db.users.find_by_email(email).await? {
            info!(email = %email, "User already present");
            return Ok(user.user_id);
        }
        let mut tx = self.db.begin().await?;
        let user = self
            .db
            .users
            .create(
                &mut tx,
                NewUser {
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    user_email: email.to_string(),
                    password_hash: self.password_hash.clone(),
                    role,
                    status: UserStatus::Active,
                    preferred_language: "sk".to_string(),
                    phone_number: None,
                    school_id,
                    email_verified: true,
                },
            )
            .await?;
        tx.commit().await?;
        info!(email = %email, role = %role.as_str(), "User created");
        Ok(user.user_id)
    }

    async fn seed_admin(&self) -> Result<()> {
        info!("Seeding admin users");
        let mut emails: Vec<String> = ADMIN_EMAILS.iter().map(|e| e.to_string()).collect();
        if let Some(admin_email) = self.settings.app.admin_email.as_deref() {
            let admin_email = admin_email.trim().to_lowercase();
            if !admin_email.is_empty() && !emails.contains(&admin_email) {
                emails.push(admin_email);
            }
        }
        for email in &emails {
            self.ensure_user("root", "root", email, UserRole::Admin, None).await?;
        }
        Ok(())
    }

    async fn seed_users(&self) -> Result<()> {
        info!("Seeding sample users");
        for sample in SAMPLE_USERS {
            let school_id = match sample.school {
                Some((name, ico, city)) => Some(self.ensure_school(name, ico, city).await?),
                None => None,
            };
            self.ensure_user(sample.first_name, sample.last_name, sample.email, sample.role, school_id)
                .await?;
        }
        Ok(())
    }

    async fn ensure_school(&self, name: &str, ico: &str, city: &str) -> Result<i64> {
        let mut tx = self.db.begin().await?;
        if let Some(school) = self.db.schools.find_by_ico(&mut tx, ico).await? {
            return Ok(school.id);
        }
        let school = self
            .db
            .schools
            .create(
                &mut tx,
                CreateSchoolRequest {
                    name: name.to_string(),
                    ico: ico.to_string(),
                    address: Some("Skolska 1".to_string()),
                    city: Some(city.to_string()),
                    psc: Some("81101".to_string()),
                    district: Some("Bratislava I".to_string()),
                    region: Some("Bratislavsky".to_string()),
                    number_of_students: Some(320),
                    number_of_employees: Some(35),
                },
            )
            .await?;
        tx.commit().await?;
        info!(school = %name, "School created");
        Ok(school.id)
    }

    async fn organizer_id(&self) -> Result<Option<i64>> {
        Ok(self.db.users.find_by_email("organizer@example.com").await?.map(|u| u.user_id))
    }

    /// Create the event with one date unless an event with the same title exists
    async fn ensure_event(&self, sample: &SampleEvent, organizer_id: Option<i64>) -> Result<Event> {
        if let Some(event) = self.db.events.find_by_title(sample.title).await? {
            info!(title = %sample.title, "Event already present");
            return Ok(event);
        }

        let request = CreateEventRequest {
            title: sample.title.to_string(),
            institution_name: None,
            address: sample.location.to_string(),
            city: "Bratislava".to_string(),
            latitude: None,
            longitude: None,
            capacity: sample.capacity,
            description: Some(sample.description.to_string()),
            annotation: None,
            parent_info: None,
            target_group: sample.target_group,
            age_from: None,
            age_to: None,
            status: None,
            event_type: sample.event_type,
            duration: Some(120),
            more_info_url: None,
            ztp_access: false,
            parking_spaces: None,
            region: None,
            district: None,
            organizer_id,
            event_dates: vec![EventDateInput { date: sample.date, time: sample.time }],
            attachments: vec![],
        };

        let mut tx = self.db.begin().await?;
        let event = self.db.events.create(&mut tx, &request, organizer_id).await?;
        for input in &request.event_dates {
            self.db
                .event_dates
                .create(&mut tx, event.id, event.capacity, input, self.settings.app.lock_hours_before)
                .await?;
        }
        tx.commit().await?;
        info!(title = %sample.title, event_id = event.id, "Event created");
        Ok(event)
    }

    async fn seed_events(&self) -> Result<()> {
        info!("Seeding sample events");
        let samples = [
            ("Event 1", (2024, 8, 20), (10, 0), "Location 1", 100, "Description 1"),
            ("Event 2", (2024, 8, 21), (14, 0), "Location 2", 150, "Description 2"),
            ("Event 3", (2024, 8, 22), (9, 0), "Location 3", 200, "Description 3"),
        ];
        let organizer_id = self.organizer_id().await?;
        for (title, (y, m, d), (hh, mm), location, capacity, description) in samples {
            let sample = SampleEvent {
                title,
                date: NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| invalid("sample date"))?,
                time: NaiveTime::from_hms_opt(hh, mm, 0).ok_or_else(|| invalid("sample time"))?,
                location,
                capacity,
                description,
                event_type: EventType::Other,
                target_group: TargetGroup::All,
            };
            self.ensure_event(&sample, organizer_id).await?;
        }
        Ok(())
    }

    fn demo_events() -> Result<Vec<SampleEvent>> {
        let today = Local::now().date_naive();
        let in_days = |days: u64| today.checked_add_days(Days::new(days)).ok_or_else(|| invalid("demo date"));
        let at = |hh: u32| NaiveTime::from_hms_opt(hh, 0, 0).ok_or_else(|| invalid("demo time"));
        Ok(vec![
            SampleEvent {
                title: "Demo: Spring Concert",
                date: in_days(7)?,
                time: at(10)?,
                location: "Reduta, Medena 3",
                capacity: 120,
                description: "Philharmonic concert for pupils",
                event_type: EventType::Concert,
                target_group: TargetGroup::ElementarySchool,
            },
            SampleEvent {
                title: "Demo: Theatre Workshop",
                date: in_days(14)?,
                time: at(9)?,
                location: "Divadlo Astorka, Namestie SNP 33",
                capacity: 30,
                description: "Hands-on acting workshop",
                event_type: EventType::Workshop,
                target_group: TargetGroup::HighSchool,
            },
            SampleEvent {
                title: "Demo: Modern Art Exhibition",
                date: in_days(21)?,
                time: at(13)?,
                location: "Kunsthalle, Namestie SNP 12",
                capacity: 60,
                description: "Guided tour through the current exhibition",
                event_type: EventType::Exhibition,
                target_group: TargetGroup::All,
            },
        ])
    }

    async fn seed_demo(&self) -> Result<()> {
        info!("Seeding demo events");
        let organizer_id = self.organizer_id().await?;
        for sample in Self::demo_events()? {
            self.ensure_event(&sample, organizer_id).await?;
        }
        Ok(())
    }

    async fn first_date(&self, title: &str) -> Result<Option<(Event, EventDate)>> {
        let Some(event) = self.db.events.find_by_title(title).await? else {
            return Ok(None);
        };
        let dates = self.db.event_dates.list_by_event(event.id).await?;
        Ok(dates.into_iter().next().map(|date| (event, date)))
    }

    /// Book seats on a date inside a transaction holding the date row lock
    async fn reserve(
        &self,
        event: &Event,
        event_date_id: i64,
        user_id: i64,
        students: i32,
        teachers: i32,
    ) -> Result<()> {
        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reservations WHERE user_id = $1 AND event_date_id = $2)",
        )
        .bind(user_id)
        .bind(event_date_id)
        .fetch_one(self.db.pool())
        .await?;
        if already {
            info!(user_id, event_date_id, "Reservation already present");
            return Ok(());
        }

        let mut tx = self.db.begin().await?;
        let date = self.db.event_dates.find_for_update(&mut tx, event_date_id).await?;
        let seats = students + teachers;
        if date.available_spots < seats {
            info!(event_date_id, seats, available = date.available_spots, "Not enough spots, skipping reservation");
            return Ok(());
        }
        let code = unique_reservation_code(&self.db, &mut tx).await?;
        let reservation = self
            .db
            .reservations
            .create(
                &mut tx,
                NewReservation {
                    event_id: event.id,
                    event_date_id,
                    user_id,
                    number_of_students: students,
                    number_of_teachers: teachers,
                    special_requirements: None,
                    contact_info: None,
                    comment: Some("Seeded reservation".to_string()),
                    status: ReservationStatus::Confirmed,
                    local_reservation_code: code,
                },
            )
            .await?;
        self.db.event_dates.adjust_spots(&mut tx, event_date_id, -seats).await?;
        tx.commit().await?;
        info!(reservation_id = reservation.id, code = %reservation.local_reservation_code, "Reservation created");
        Ok(())
    }

    async fn enqueue_waiting(&self, event_date_id: i64, user_id: i64, students: i32, teachers: i32) -> Result<()> {
        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM waiting_list WHERE user_id = $1 AND event_date_id = $2)",
        )
        .bind(user_id)
        .bind(event_date_id)
        .fetch_one(self.db.pool())
        .await?;
        if already {
            info!(user_id, event_date_id, "Waiting list entry already present");
            return Ok(());
        }

        let request = CreateWaitingListRequest {
            event_date_id,
            user_id: Some(user_id),
            number_of_students: students,
            number_of_teachers: teachers,
            special_requirements: None,
            contact_info: None,
        };
        let mut tx = self.db.begin().await?;
        let entry = self.db.waiting_list.create(&mut tx, user_id, &request).await?;
        tx.commit().await?;
        info!(entry_id = entry.id, event_date_id, "Waiting list entry created");
        Ok(())
    }

    async fn seed_reservations(&self) -> Result<()> {
        info!("Seeding reservations and waiting list");
        let mut representatives = Vec::new();
        for email in ["school1@example.com", "school2@example.com"] {
            match self.db.users.find_by_email(email).await? {
                Some(user) => representatives.push(user.user_id),
                None => {
                    info!(email = %email, "Representative missing; run `db users` first");
                    return Ok(());
                }
            }
        }
        let (first, second) = (representatives[0], representatives[1]);

        if let Some((event, date)) = self.first_date("Demo: Spring Concert").await? {
            self.reserve(&event, date.id, first, 40, 4).await?;
            self.reserve(&event, date.id, second, 25, 2).await?;
        }
        // The workshop is nearly booked out so the second school queues up
        if let Some((event, date)) = self.first_date("Demo: Theatre Workshop").await? {
            self.reserve(&event, date.id, first, 24, 2).await?;
            self.enqueue_waiting(date.id, second, 18, 2).await?;
        }
        if let Some((event, date)) = self.first_date("Demo: Modern Art Exhibition").await? {
            self.reserve(&event, date.id, second, 20, 2).await?;
        }
        Ok(())
    }
}
