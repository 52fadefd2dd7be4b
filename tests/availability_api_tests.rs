mod common;

use actix_web::{http::StatusCode, test, web, App};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{any_template, test_config, TestServices};
use outreach_scheduler::database::models::Gender;
use outreach_scheduler::handlers::availability;
use outreach_scheduler::AuthService;

macro_rules! availability_app {
    ($services:expr, $config:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($services.availabilities.clone()))
                .app_data(web::Data::new($services.users.clone()))
                .app_data(web::Data::new($services.reconciliation.clone()))
                .app_data(web::Data::new($config.clone()))
                .service(
                    web::scope("/api/availability")
                        .route("", web::post().to(availability::submit))
                        .route("/my", web::get().to(availability::my))
                        .route("/all", web::get().to(availability::all))
                        .route("/{id}/status", web::patch().to(availability::set_status))
                        .route("/{id}", web::delete().to(availability::remove)),
                ),
        )
        .await
    };
}

#[tokio::test]
async fn submit_rejects_slots_outside_the_catalog() {
    let services = TestServices::new().await.unwrap();
    let config = test_config();
    let app = availability_app!(services, config);

    let marco = services.create_user("Marco", Gender::Male).await;
    let token = AuthService::new(services.users.clone(), config.clone())
        .generate_token(&marco)
        .unwrap();

    let req = test::TestRequest::post()
        .uri("/api/availability")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "availabilities": [{
                "shift": {
                    "day": "monday",
                    "location": "Piazza Inventata",
                    "startTime": "09:00",
                    "endTime": "11:00"
                },
                "date": "2025-06-02"
            }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_then_list_own_entries() {
    let services = TestServices::new().await.unwrap();
    let config = test_config();
    let app = availability_app!(services, config);

    let marco = services.create_user("Marco", Gender::Male).await;
    let token = AuthService::new(services.users.clone(), config.clone())
        .generate_token(&marco)
        .unwrap();

    let template = any_template();
    let req = test::TestRequest::post()
        .uri("/api/availability")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "availabilities": [{
                "shift": {
                    "day": template.day.to_string(),
                    "location": template.location,
                    "startTime": template.start_time,
                    "endTime": template.end_time
                },
                // RFC3339 input must normalize to the plain day
                "date": "2025-06-02T08:30:00.000Z"
            }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/availability/my?month=6&year=2025")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["date"], "2025-06-02");
    assert_eq!(entries[0]["status"], "pending");
}

#[tokio::test]
async fn status_transitions_are_enforced() {
    let services = TestServices::new().await.unwrap();
    let config = test_config();
    let app = availability_app!(services, config);

    let admin = services.create_admin("Giulia", Gender::Female).await;
    let marco = services.create_user("Marco", Gender::Male).await;
    let auth = AuthService::new(services.users.clone(), config.clone());
    let admin_token = auth.generate_token(&admin).unwrap();
    let user_token = auth.generate_token(&marco).unwrap();

    let entry = outreach_scheduler::database::models::Availability::new(
        &marco.id,
        &any_template(),
        outreach_scheduler::domain::CalendarDay::normalize("2025-06-02").unwrap(),
    );
    services.availabilities.insert(&entry).await.unwrap();

    // Non-admins cannot confirm
    let req = test::TestRequest::patch()
        .uri(&format!("/api/availability/{}/status", entry.id))
        .insert_header(("Authorization", format!("Bearer {}", user_token)))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/availability/{}/status", entry.id))
        .insert_header(("Authorization", format!("Bearer {}", admin_token)))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Confirmation reconciles into an aggregate
    assert!(services
        .schedules
        .find_by_slot(&any_template(), common::day("2025-06-02"))
        .await
        .unwrap()
        .is_some());

    // Re-confirming is idempotent
    let req = test::TestRequest::patch()
        .uri(&format!("/api/availability/{}/status", entry.id))
        .insert_header(("Authorization", format!("Bearer {}", admin_token)))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Confirmed -> rejected is not a legal transition
    let req = test::TestRequest::patch()
        .uri(&format!("/api/availability/{}/status", entry.id))
        .insert_header(("Authorization", format!("Bearer {}", admin_token)))
        .set_json(json!({ "status": "rejected" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_confirmed_entry_unwinds_the_aggregate() {
    let services = TestServices::new().await.unwrap();
    let config = test_config();
    let app = availability_app!(services, config);

    let marco = services.create_user("Marco", Gender::Male).await;
    let other = services.create_user("Paolo", Gender::Male).await;
    let auth = AuthService::new(services.users.clone(), config.clone());
    let marco_token = auth.generate_token(&marco).unwrap();
    let other_token = auth.generate_token(&other).unwrap();

    let entry = outreach_scheduler::database::models::Availability::new(
        &marco.id,
        &any_template(),
        common::day("2025-06-02"),
    );
    services.availabilities.insert(&entry).await.unwrap();
    let entry = services
        .availabilities
        .set_status(
            &entry.id,
            outreach_scheduler::database::models::AvailabilityStatus::Confirmed,
        )
        .await
        .unwrap()
        .unwrap();
    services.reconciliation.reconcile_confirm(&entry).await.unwrap();

    // Someone else's entry is off limits
    let req = test::TestRequest::delete()
        .uri(&format!("/api/availability/{}", entry.id))
        .insert_header(("Authorization", format!("Bearer {}", other_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/availability/{}", entry.id))
        .insert_header(("Authorization", format!("Bearer {}", marco_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert!(services
        .availabilities
        .find_by_id(&entry.id)
        .await
        .unwrap()
        .is_none());
    assert!(
        services
            .schedules
            .find_by_slot(&any_template(), common::day("2025-06-02"))
            .await
            .unwrap()
            .is_none(),
        "marco was the only assignee, the aggregate must be gone"
    );
}
