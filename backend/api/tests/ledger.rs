//! Verification queue, notification feed, and the payment ledger.

mod common;

use common::{add_user, pool, NOW};
use foodaid_api::db;
use foodaid_api::models::{UserRole, VerificationStatus};

#[tokio::test]
async fn verification_queue_and_outcomes() {
    let pool = pool().await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "donor", UserRole::Donor, None).await;

    let pending = db::pending_users(&pool).await.unwrap();
    assert_eq!(pending.len(), 2);

    let rejected = db::set_verification(
        &pool,
        "ngo",
        VerificationStatus::Rejected,
        Some("Registration papers missing"),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(rejected.verification_status, VerificationStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("Registration papers missing")
    );

    // Approving afterwards clears the stored reason.
    let approved = db::set_verification(&pool, "ngo", VerificationStatus::Approved, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.verification_status, VerificationStatus::Approved);
    assert_eq!(approved.rejection_reason, None);

    assert_eq!(db::pending_users(&pool).await.unwrap().len(), 1);

    let missing = db::set_verification(&pool, "nobody", VerificationStatus::Approved, None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn approved_receivers_requires_location_and_approval() {
    let pool = pool().await;
    let here = foodaid_api::models::Coordinates {
        lat: -26.2,
        lng: 28.0,
    };
    add_user(&pool, "located", UserRole::Receiver, Some(here)).await;
    add_user(&pool, "unlocated", UserRole::Receiver, None).await;
    add_user(&pool, "donor", UserRole::Donor, Some(here)).await;

    for uid in ["located", "unlocated", "donor"] {
        db::set_verification(&pool, uid, VerificationStatus::Approved, None)
            .await
            .unwrap();
    }

    let receivers = db::approved_receivers(&pool).await.unwrap();
    let uids: Vec<&str> = receivers.iter().map(|u| u.uid.as_str()).collect();
    assert_eq!(uids, vec!["located"]);
}

#[tokio::test]
async fn notification_feed_is_owner_scoped_and_newest_first() {
    let pool = pool().await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "donor", UserRole::Donor, None).await;

    db::insert_notification(&pool, "ngo", "First", "first body", NOW)
        .await
        .unwrap();
    let second = db::insert_notification(&pool, "ngo", "Second", "second body", NOW + 5)
        .await
        .unwrap();
    db::insert_notification(&pool, "donor", "Other", "not for ngo", NOW + 10)
        .await
        .unwrap();

    let feed = db::notifications_for_user(&pool, "ngo").await.unwrap();
    let titles: Vec<&str> = feed.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Second", "First"]);
    assert!(feed.iter().all(|n| !n.read));

    // Another user cannot mark it; the owner can.
    assert_eq!(
        db::mark_notification_read(&pool, second.id, "donor")
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        db::mark_notification_read(&pool, second.id, "ngo")
            .await
            .unwrap(),
        1
    );
    let read_back = db::get_notification(&pool, second.id)
        .await
        .unwrap()
        .unwrap();
    assert!(read_back.read);
}

#[tokio::test]
async fn donation_ledger_is_idempotent_on_capture_id() {
    let pool = pool().await;

    let donation = db::NewDonation {
        capture_id: "CAP-1",
        order_id: Some("ORDER-1"),
        amount: 2500,
        currency: "usd",
        status: "COMPLETED",
        payer_email: Some("donor@test.org"),
        user_uid: None,
        payload: None,
        created_at: NOW,
    };

    assert!(db::insert_donation(&pool, &donation).await.unwrap());
    // Webhook redelivery of the same capture.
    assert!(!db::insert_donation(&pool, &donation).await.unwrap());

    let all = db::all_donations(&pool).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].amount, 2500);
}

#[tokio::test]
async fn finance_totals_group_by_currency() {
    let pool = pool().await;
    add_user(&pool, "ngo", UserRole::Receiver, None).await;
    add_user(&pool, "admin", UserRole::Admin, None).await;

    for (id, amount, currency) in [("CAP-1", 1000, "usd"), ("CAP-2", 500, "usd"), ("CAP-3", 700, "zar")] {
        db::insert_donation(
            &pool,
            &db::NewDonation {
                capture_id: id,
                order_id: None,
                amount,
                currency,
                status: "COMPLETED",
                payer_email: None,
                user_uid: None,
                payload: None,
                created_at: NOW,
            },
        )
        .await
        .unwrap();
    }

    db::insert_disbursement(
        &pool,
        &db::NewDisbursement {
            receiver_uid: "ngo",
            amount: 400,
            currency: "usd",
            reference: Some("EFT-77"),
            note: None,
            created_by: "admin",
            created_at: NOW,
        },
    )
    .await
    .unwrap();

    let mut donated = db::donation_totals(&pool).await.unwrap();
    donated.sort();
    assert_eq!(
        donated,
        vec![("usd".to_string(), 1500), ("zar".to_string(), 700)]
    );

    let disbursed = db::disbursement_totals(&pool).await.unwrap();
    assert_eq!(disbursed, vec![("usd".to_string(), 400)]);

    let listed = db::all_disbursements(&pool).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].reference.as_deref(), Some("EFT-77"));
}
