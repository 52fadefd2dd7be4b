mod common;

use pretty_assertions::assert_eq;

use common::{any_template, day, TestServices};
use outreach_scheduler::database::models::{
    AssigneeRef, Availability, CreateScheduleRequest, Gender,
};
use outreach_scheduler::error::AppError;

#[tokio::test]
async fn deleting_a_user_erases_their_footprint() {
    let services = TestServices::new().await.unwrap();
    let admin = services.create_admin("Giulia", Gender::Female).await;
    let marco = services.create_user("Marco", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;

    let entry = Availability::new(&anna.id, &any_template(), day("2025-06-02"));
    services.availabilities.insert(&entry).await.unwrap();

    let created = services
        .reconciliation
        .create_schedule(CreateScheduleRequest {
            shift: any_template(),
            date: day("2025-06-09"),
            assigned_users: vec![
                AssigneeRef {
                    user_id: marco.id.clone(),
                },
                AssigneeRef {
                    user_id: anna.id.clone(),
                },
            ],
        })
        .await
        .unwrap();
    services
        .chat
        .post_message(&created.schedule.id, &anna.id, "ciao")
        .await
        .unwrap();
    services.experiences.create(&anna.id, "Una bella mattinata").await.unwrap();
    services.messages.create(&anna.id, "ciao a tutti").await.unwrap();

    services.cascade.delete_user(&anna.id, &admin.id).await.unwrap();

    assert!(services.users.find_by_id(&anna.id).await.unwrap().is_none());
    assert!(services
        .availabilities
        .list_for_owner(&anna.id, None)
        .await
        .unwrap()
        .is_empty());
    assert!(services
        .notifications
        .list_for_user(&anna.id)
        .await
        .unwrap()
        .is_empty());
    assert!(services.experiences.list().await.unwrap().is_empty());
    assert!(services.messages.recent(50).await.unwrap().is_empty());

    // The schedule lost its only sister: still there, but degraded
    let schedule = services
        .schedules
        .find_by_id(&created.schedule.id)
        .await
        .unwrap()
        .expect("schedule survives with the brother on it");
    assert!(!schedule.is_confirmed);
    let assignees = services.schedules.assignees(&schedule.id).await.unwrap();
    assert_eq!(assignees.len(), 1);
    assert_eq!(assignees[0].user_id, marco.id);

    // Their chat messages are gone too
    let room = services
        .chat_rooms
        .find_by_schedule(&created.schedule.id)
        .await
        .unwrap()
        .unwrap();
    assert!(services.chat_rooms.messages(&room.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_the_sole_assignee_removes_the_schedule() {
    let services = TestServices::new().await.unwrap();
    let admin = services.create_admin("Giulia", Gender::Female).await;
    let marco = services.create_user("Marco", Gender::Male).await;

    let entry = Availability::new(&marco.id, &any_template(), day("2025-06-02"));
    let entry = services.availabilities.insert(&entry).await.unwrap();
    services
        .availabilities
        .set_status(&entry.id, outreach_scheduler::database::models::AvailabilityStatus::Confirmed)
        .await
        .unwrap();
    services.reconciliation.reconcile_confirm(&entry).await.unwrap();

    services.cascade.delete_user(&marco.id, &admin.id).await.unwrap();

    assert!(
        services
            .schedules
            .find_by_slot(&any_template(), day("2025-06-02"))
            .await
            .unwrap()
            .is_none(),
        "the emptied aggregate must be deleted"
    );
}

#[tokio::test]
async fn admins_cannot_delete_themselves() {
    let services = TestServices::new().await.unwrap();
    let admin = services.create_admin("Giulia", Gender::Female).await;

    let err = services
        .cascade
        .delete_user(&admin.id, &admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(services.users.find_by_id(&admin.id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_a_missing_user_is_not_found() {
    let services = TestServices::new().await.unwrap();
    let admin = services.create_admin("Giulia", Gender::Female).await;

    let err = services
        .cascade
        .delete_user("no-such-user", &admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
