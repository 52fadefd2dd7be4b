mod common;

use pretty_assertions::assert_eq;

use common::{any_template, day, saturday_templates, TestServices};
use outreach_scheduler::database::models::{
    AssigneeRef, Availability, AvailabilityStatus, CreateScheduleRequest, Gender,
};
use outreach_scheduler::error::AppError;

async fn confirmed_entry(
    services: &TestServices,
    user_id: &str,
    template: &outreach_scheduler::domain::ShiftTemplate,
    date: outreach_scheduler::domain::CalendarDay,
) -> Availability {
    let entry = Availability::new(user_id, template, date);
    services
        .availabilities
        .insert(&entry)
        .await
        .expect("insert availability");
    services
        .availabilities
        .set_status(&entry.id, AvailabilityStatus::Confirmed)
        .await
        .expect("set status")
        .expect("entry exists")
}

#[tokio::test]
async fn first_confirmation_creates_unconfirmed_aggregate() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;

    let template = any_template();
    let date = day("2025-06-02");
    let entry = confirmed_entry(&services, &marco.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&entry).await.unwrap();

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .expect("aggregate created");
    assert!(!schedule.is_confirmed, "one brother alone must not confirm");

    let assignees = services.schedules.assignees(&schedule.id).await.unwrap();
    assert_eq!(assignees.len(), 1);
    assert_eq!(assignees[0].user_id, marco.id);
}

#[tokio::test]
async fn second_confirmation_flips_aggregate_to_confirmed() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;

    let template = any_template();
    let date = day("2025-06-02");

    let first = confirmed_entry(&services, &marco.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&first).await.unwrap();
    let second = confirmed_entry(&services, &anna.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&second).await.unwrap();

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .expect("aggregate exists");
    assert!(schedule.is_confirmed);

    // Confirmation fan-out reaches every assignee
    let to_marco = services.notifications.list_for_user(&marco.id).await.unwrap();
    let to_anna = services.notifications.list_for_user(&anna.id).await.unwrap();
    assert!(to_marco.iter().any(|n| n.message.contains("confirmed")));
    assert!(to_anna.iter().any(|n| n.message.contains("confirmed")));
}

#[tokio::test]
async fn double_confirm_is_idempotent() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;

    let template = any_template();
    let date = day("2025-06-02");
    let entry = confirmed_entry(&services, &marco.id, &template, date).await;

    services.reconciliation.reconcile_confirm(&entry).await.unwrap();
    services.reconciliation.reconcile_confirm(&entry).await.unwrap();

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .expect("aggregate exists");
    let assignees = services.schedules.assignees(&schedule.id).await.unwrap();
    assert_eq!(assignees.len(), 1, "re-confirm must not duplicate the assignee");
}

#[tokio::test]
async fn retraction_degrades_confirmed_aggregate() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;

    let template = any_template();
    let date = day("2025-06-02");
    let first = confirmed_entry(&services, &marco.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&first).await.unwrap();
    let second = confirmed_entry(&services, &anna.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&second).await.unwrap();

    services.reconciliation.reconcile_retract(&second).await.unwrap();

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .expect("aggregate survives with one assignee");
    assert!(!schedule.is_confirmed, "losing the sister must degrade the aggregate");

    let assignees = services.schedules.assignees(&schedule.id).await.unwrap();
    assert_eq!(assignees.len(), 1);
    assert_eq!(assignees[0].user_id, marco.id);
}

#[tokio::test]
async fn retracting_last_assignee_deletes_aggregate() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;

    let template = any_template();
    let date = day("2025-06-02");
    let entry = confirmed_entry(&services, &marco.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&entry).await.unwrap();
    services.reconciliation.reconcile_retract(&entry).await.unwrap();

    assert!(
        services
            .schedules
            .find_by_slot(&template, date)
            .await
            .unwrap()
            .is_none(),
        "an emptied aggregate must disappear"
    );
}

#[tokio::test]
async fn retract_without_aggregate_is_a_noop() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;

    let entry = confirmed_entry(&services, &marco.id, &any_template(), day("2025-06-02")).await;
    // Never confirmed into an aggregate; retraction has nothing to unwind
    services.reconciliation.reconcile_retract(&entry).await.unwrap();
}

#[tokio::test]
async fn third_sister_overflows_the_cap() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;
    let sara = services.create_user("Sara", Gender::Female).await;
    let elena = services.create_user("Elena", Gender::Female).await;

    let template = any_template();
    let date = day("2025-06-02");
    for user in [&marco, &anna, &sara] {
        let entry = confirmed_entry(&services, &user.id, &template, date).await;
        services.reconciliation.reconcile_confirm(&entry).await.unwrap();
    }

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .unwrap();
    assert!(schedule.is_confirmed);

    let entry = confirmed_entry(&services, &elena.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&entry).await.unwrap();

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .unwrap();
    assert!(
        !schedule.is_confirmed,
        "a third sister must push the aggregate back to unconfirmed"
    );
}

#[tokio::test]
async fn same_day_slots_reconcile_independently() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;

    let (morning, midday) = saturday_templates();
    let date = day("2025-03-08");

    let entry = confirmed_entry(&services, &marco.id, &morning, date).await;
    services.reconciliation.reconcile_confirm(&entry).await.unwrap();

    assert!(services
        .schedules
        .find_by_slot(&morning, date)
        .await
        .unwrap()
        .is_some());
    assert!(
        services
            .schedules
            .find_by_slot(&midday, date)
            .await
            .unwrap()
            .is_none(),
        "the midday slot must not inherit the morning confirmation"
    );
}

#[tokio::test]
async fn concurrent_confirms_both_land() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;

    let template = any_template();
    let date = day("2025-06-02");
    let first = confirmed_entry(&services, &marco.id, &template, date).await;
    let second = confirmed_entry(&services, &anna.id, &template, date).await;

    let (a, b) = tokio::join!(
        services.reconciliation.reconcile_confirm(&first),
        services.reconciliation.reconcile_confirm(&second),
    );
    a.unwrap();
    b.unwrap();

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .expect("exactly one aggregate for the slot");
    let assignees = services.schedules.assignees(&schedule.id).await.unwrap();
    assert_eq!(assignees.len(), 2, "neither confirmation may be lost");
    assert!(schedule.is_confirmed);
}

#[tokio::test]
async fn confirm_delete_resubmit_round_trip() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;

    let template = any_template();
    let date = day("2025-06-02");

    let first = confirmed_entry(&services, &marco.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&first).await.unwrap();
    let second = confirmed_entry(&services, &anna.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&second).await.unwrap();

    services.reconciliation.reconcile_retract(&second).await.unwrap();
    services.availabilities.delete(&second.id).await.unwrap();

    let again = confirmed_entry(&services, &anna.id, &template, date).await;
    services.reconciliation.reconcile_confirm(&again).await.unwrap();

    let schedule = services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .unwrap();
    assert!(schedule.is_confirmed, "the round trip must land back at confirmed");
    assert_eq!(
        services.schedules.assignees(&schedule.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn admin_create_validates_roster_eagerly() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;

    let template = any_template();
    let date = day("2025-06-02");

    // No sister: rejected outright, no partial aggregate left behind
    let err = services
        .reconciliation
        .create_schedule(CreateScheduleRequest {
            shift: template.clone(),
            date,
            assigned_users: vec![AssigneeRef {
                user_id: marco.id.clone(),
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(services
        .schedules
        .find_by_slot(&template, date)
        .await
        .unwrap()
        .is_none());

    let created = services
        .reconciliation
        .create_schedule(CreateScheduleRequest {
            shift: template.clone(),
            date,
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
    assert!(created.schedule.is_confirmed);
    assert_eq!(created.assigned_users.len(), 2);

    // The slot is now taken
    let err = services
        .reconciliation
        .create_schedule(CreateScheduleRequest {
            shift: template,
            date,
            assigned_users: vec![
                AssigneeRef {
                    user_id: marco.id.clone(),
                },
                AssigneeRef { user_id: anna.id },
            ],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn admin_update_replaces_roster() {
    let services = TestServices::new().await.unwrap();
    let marco = services.create_user("Marco", Gender::Male).await;
    let luca = services.create_user("Luca", Gender::Male).await;
    let anna = services.create_user("Anna", Gender::Female).await;

    let created = services
        .reconciliation
        .create_schedule(CreateScheduleRequest {
            shift: any_template(),
            date: day("2025-06-02"),
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

    let updated = services
        .reconciliation
        .update_schedule(&created.schedule.id, &[luca.id.clone(), anna.id.clone()])
        .await
        .unwrap();

    let ids: Vec<&str> = updated
        .assigned_users
        .iter()
        .map(|a| a.user_id.as_str())
        .collect();
    assert!(ids.contains(&luca.id.as_str()));
    assert!(!ids.contains(&marco.id.as_str()));
    assert!(updated.schedule.is_confirmed);

    // An all-sister replacement is refused
    let err = services
        .reconciliation
        .update_schedule(&created.schedule.id, &[anna.id.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}
