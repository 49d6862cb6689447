//! Sample data loader

mod helpers;

use helpers::*;
use school_events::database::seed::{SeedTarget, Seeder, ADMIN_EMAILS};
use serial_test::serial;

const TABLES: &[&str] = &["users", "schools", "events", "event_dates", "reservations", "waiting_list"];

async fn counts(ctx: &TestContext) -> Vec<i64> {
    let mut counts = Vec::new();
    for table in TABLES {
        counts.push(ctx.database.count_records(table).await.unwrap());
    }
    counts
}

#[tokio::test]
#[serial]
async fn test_seed_all_is_idempotent() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let seeder = Seeder::new(ctx.services.db.clone(), ctx.settings.clone()).unwrap();

    seeder.run(SeedTarget::All).await.unwrap();
    let first = counts(&ctx).await;
    // 3 admins, organizer, analyst and two school representatives
    assert_eq!(first[0], ADMIN_EMAILS.len() as i64 + 4);
    assert_eq!(first[1], 2);
    assert_eq!(first[2], 6);
    assert_eq!(first[4], 4);
    assert_eq!(first[5], 1);

    seeder.run(SeedTarget::All).await.unwrap();
    assert_eq!(counts(&ctx).await, first);

    let db = &ctx.services.db;
    let concert = db.events.find_by_title("Demo: Spring Concert").await.unwrap().unwrap();
    let dates = db.event_dates.list_by_event(concert.id).await.unwrap();
    assert_eq!(dates[0].available_spots, 120 - 44 - 27);
}

#[tokio::test]
#[serial]
async fn test_reservations_need_seeded_users() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let seeder = Seeder::new(ctx.services.db.clone(), ctx.settings.clone()).unwrap();

    seeder.run(SeedTarget::Demo).await.unwrap();
    seeder.run(SeedTarget::Reservations).await.unwrap();
    assert_eq!(ctx.database.count_records("reservations").await.unwrap(), 0);
    assert_eq!(ctx.database.count_records("events").await.unwrap(), 3);
}
