//! Capacity changes and organizer claims

mod helpers;

use assert_matches::assert_matches;
use helpers::*;
use school_events::{
    models::{ClaimStatus, ClaimType, CreateClaimRequest, EventStatus, UpdateClaimStatusRequest, UpdateEventRequest, UserRole},
    SchoolEventsError,
};
use serde_json::json;
use serial_test::serial;

fn review(status: ClaimStatus) -> UpdateClaimStatusRequest {
    UpdateClaimStatusRequest { new_status: status, review_note: Some("checked".to_string()) }
}

#[tokio::test]
#[serial]
async fn test_capacity_change_keeps_booked_seats() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let admin = create_user(&ctx, "admin@admin.com", UserRole::Admin).await;
    let rep = create_user(&ctx, "rep@school.sk", UserRole::SchoolRepresentative).await;
    let event = create_event(&ctx, admin.user_id, "Nutcracker", 40).await;
    let date_id = event.event_dates[0].id;

    let rep_ctx = ctx.auth(rep.user_id).await;
    ctx.services
        .reservation_service
        .create_reservation(&rep_ctx, reservation_request(&event, 8, 2))
        .await
        .unwrap();

    let admin_ctx = ctx.auth(admin.user_id).await;
    let events = &ctx.services.event_service;
    let grow = UpdateEventRequest { capacity: Some(50), ..Default::default() };
    let updated = events.update_event(&admin_ctx, event.event.id, grow).await.unwrap();
    assert_eq!(updated.event.capacity, 50);
    assert_eq!(updated.event_dates[0].capacity, 50);
    assert_eq!(updated.event_dates[0].available_spots, 40);

    // shrinking below the booked seats closes the date instead of going negative
    let shrink = UpdateEventRequest { capacity: Some(5), ..Default::default() };
    events.update_event(&admin_ctx, event.event.id, shrink).await.unwrap();
    let date = events.get_event_date(date_id).await.unwrap();
    assert_eq!(date.capacity, 5);
    assert_eq!(date.available_spots, 0);

    // unrelated edits leave seat counts alone
    let rename = UpdateEventRequest { title: Some("The Nutcracker".to_string()), ..Default::default() };
    events.update_event(&admin_ctx, event.event.id, rename).await.unwrap();
    assert_eq!(events.get_event_date(date_id).await.unwrap().available_spots, 0);
}

#[tokio::test]
#[serial]
async fn test_approved_claims_are_applied() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let admin = create_user(&ctx, "admin@admin.com", UserRole::Admin).await;
    let organizer = create_user(&ctx, "organizer@theatre.sk", UserRole::Organizer).await;
    let event = create_event(&ctx, organizer.user_id, "Puppet show", 30).await;
    assert_eq!(event.event.organizer_id, Some(organizer.user_id));

    let org_ctx = ctx.auth(organizer.user_id).await;
    let admin_ctx = ctx.auth(admin.user_id).await;
    let events = &ctx.services.event_service;

    let update = events
        .submit_claim(
            &org_ctx,
            CreateClaimRequest { event_id: Some(event.event.id), claim_type: ClaimType::Update, payload: json!({"capacity": 60}) },
        )
        .await
        .unwrap();
    assert_eq!(update.status, ClaimStatus::Pending.as_str());

    let reviewed = events.review_claim(&admin_ctx, update.id, review(ClaimStatus::Approved)).await.unwrap();
    assert_eq!(reviewed.status, ClaimStatus::Approved.as_str());
    assert_eq!(reviewed.reviewed_by, Some(admin.user_id));
    let applied = events.get_event_with_dates(event.event.id).await.unwrap();
    assert_eq!(applied.event.capacity, 60);
    assert_eq!(applied.event_dates[0].available_spots, 60);

    let payload = serde_json::to_value(sample_event("Claimed concert", 80, 20)).unwrap();
    let create = events
        .submit_claim(&org_ctx, CreateClaimRequest { event_id: None, claim_type: ClaimType::Create, payload })
        .await
        .unwrap();
    let reviewed = events.review_claim(&admin_ctx, create.id, review(ClaimStatus::Approved)).await.unwrap();
    let created = events.get_event_with_dates(reviewed.event_id.unwrap()).await.unwrap();
    assert_eq!(created.event.title, "Claimed concert");
    assert_eq!(created.event.organizer_id, Some(organizer.user_id));
    assert_eq!(created.event_dates.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_rejected_claim_changes_nothing() {
    let Some(ctx) = TestContext::try_new().await else { return };
    let admin = create_user(&ctx, "admin@admin.com", UserRole::Admin).await;
    let organizer = create_user(&ctx, "organizer@theatre.sk", UserRole::Organizer).await;
    let other = create_user(&ctx, "other@theatre.sk", UserRole::Organizer).await;
    let event = create_event(&ctx, organizer.user_id, "Opera for kids", 30).await;

    let events = &ctx.services.event_service;
    let cancel = CreateClaimRequest { event_id: Some(event.event.id), claim_type: ClaimType::Cancel, payload: json!({}) };

    // only the owning organizer may ask
    let err = events.submit_claim(&ctx.auth(other.user_id).await, cancel.clone()).await.unwrap_err();
    assert_matches!(err, SchoolEventsError::PermissionDenied(_));

    let org_ctx = ctx.auth(organizer.user_id).await;
    let claim = events.submit_claim(&org_ctx, cancel).await.unwrap();

    // organizers cannot review their own claims
    let err = events.review_claim(&org_ctx, claim.id, review(ClaimStatus::Approved)).await.unwrap_err();
    assert_matches!(err, SchoolEventsError::PermissionDenied(_));

    let admin_ctx = ctx.auth(admin.user_id).await;
    let rejected = events.review_claim(&admin_ctx, claim.id, review(ClaimStatus::Rejected)).await.unwrap();
    assert_eq!(rejected.status, ClaimStatus::Rejected.as_str());
    assert_eq!(rejected.review_note.as_deref(), Some("checked"));
    assert_ne!(events.get_event(event.event.id).await.unwrap().status, EventStatus::Cancelled.as_str());

    let err = events.review_claim(&admin_ctx, claim.id, review(ClaimStatus::Approved)).await.unwrap_err();
    assert_matches!(err, SchoolEventsError::InvalidStateTransition { .. });
}
