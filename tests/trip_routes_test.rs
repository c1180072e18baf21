mod common;

use actix_web::{http::StatusCode, test};
use futures::future::join_all;
use serde_json::json;

use common::{add_activity, admin_bearer, bearer, email, send, trip_with_members, TestApp};

#[actix_rt::test]
async fn trips_are_visible_to_members_only() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let trip_id = trip_with_members(&app, "ana", &["ben"]).await;

    let req = test::TestRequest::get()
        .uri("/api/trips")
        .insert_header(bearer("ben"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["_id"], trip_id.as_str());
    assert_eq!(body["data"][0]["participant_ids"], json!(["ana", "ben"]));
    assert_eq!(body["data"][0]["invited_emails"], json!([]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/trips/{}", trip_id))
        .insert_header(bearer("eve"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let req = test::TestRequest::post()
        .uri(&format!("/api/trips/{}/join", trip_id))
        .insert_header(bearer("eve"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/trips/does-not-exist")
        .insert_header(bearer("ana"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn invalid_trips_are_rejected() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/trips")
        .insert_header(bearer("ana"))
        .set_json(json!({
            "name": "Backwards",
            "destination": "Porto",
            "start_date": "2026-06-07",
            "end_date": "2026-06-05",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let req = test::TestRequest::post()
        .uri("/api/trips")
        .insert_header(bearer("ana"))
        .set_json(json!({
            "name": "Bad invite",
            "destination": "Porto",
            "start_date": "2026-06-05",
            "end_date": "2026-06-07",
            "invited_emails": ["friend-at-example.com"],
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/trips")
        .insert_header(bearer("ana"))
        .set_json(json!({
            "name": "Forever",
            "destination": "Porto",
            "start_date": "2026-01-01",
            "end_date": "9999-12-31",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at most 90 days"));
}

#[actix_rt::test]
async fn malformed_requests_use_the_error_envelope() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri("/api/trips")
        .insert_header(bearer("ana"))
        .set_json(json!({
            "destination": "Porto",
            "start_date": "2026-06-05",
            "end_date": "2026-06-07",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("name"));

    let req = test::TestRequest::post()
        .uri("/api/trips")
        .insert_header(bearer("ana"))
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[actix_rt::test]
async fn invitations_report_duplicates_and_can_be_resent() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let trip_id = trip_with_members(&app, "ana", &[]).await;

    test_app.ai.push_text("Come to Lisbon with us!");
    let req = test::TestRequest::post()
        .uri(&format!("/api/trips/{}/invitations", trip_id))
        .insert_header(bearer("ana"))
        .set_json(json!({ "emails": ["Ben@Example.com", "ben@example.com", "cai@example.com"] }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        body["data"]["invited"],
        json!(["ben@example.com", "cai@example.com"])
    );
    assert_eq!(body["data"]["already_invited"], json!(["ben@example.com"]));

    let req = test::TestRequest::post()
        .uri(&format!("/api/trips/{}/invitations/resend", trip_id))
        .insert_header(bearer("ana"))
        .set_json(json!({ "email": "cai@example.com" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["resent_to"], "cai@example.com");

    let req = test::TestRequest::post()
        .uri(&format!("/api/trips/{}/invitations/resend", trip_id))
        .insert_header(bearer("ana"))
        .set_json(json!({ "email": "dan@example.com" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/api/trips/{}/join", trip_id))
        .insert_header(bearer("cai"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["invited_emails"], json!(["ben@example.com"]));
}

#[actix_rt::test]
async fn only_the_owner_deletes_and_removes_others() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let trip_id = trip_with_members(&app, "ana", &["ben", "cai"]).await;
    add_activity(&app, &trip_id, "ben", "Cooking class").await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/trips/{}/participants/cai", trip_id))
        .insert_header(bearer("ben"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Leaving is always allowed
    let req = test::TestRequest::delete()
        .uri(&format!("/api/trips/{}/participants/ben", trip_id))
        .insert_header(bearer("ben"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["participant_ids"], json!(["ana", "cai"]));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/trips/{}", trip_id))
        .insert_header(bearer("cai"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/trips/{}", trip_id))
        .insert_header(bearer("ana"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], trip_id.as_str());

    let req = test::TestRequest::get()
        .uri(&format!("/api/trips/{}/activities", trip_id))
        .insert_header(bearer("ana"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn activities_are_described_extracted_and_illustrated() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let trip_id = trip_with_members(&app, "ana", &[]).await;
    let activity_id = add_activity(&app, &trip_id, "ana", "Sintra palaces").await;

    test_app.ai.push_text("Fairytale palaces in the hills above Lisbon.");
    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/trips/{}/activities/{}/description",
            trip_id, activity_id
        ))
        .insert_header(bearer("ana"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        body["data"]["description"],
        "Fairytale palaces in the hills above Lisbon."
    );

    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/trips/{}/activities/{}/image",
            trip_id, activity_id
        ))
        .insert_header(bearer("ana"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("IMAGE_BUCKET"));

    let extract = |url: &str| {
        test::TestRequest::post()
            .uri(&format!("/api/trips/{}/activities/extract", trip_id))
            .insert_header(bearer("ana"))
            .set_json(json!({ "url": url }))
            .to_request()
    };
    let (status, _) = send(&app, extract("ftp://example.com/tour")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    test_app.ai.push_json(json!({
        "name": "Douro wine tasting",
        "location": "Pinhao",
        "duration_minutes": 240,
        "category": "food"
    }));
    let (status, body) = send(&app, extract("https://example.com/tours/douro")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Douro wine tasting");
    assert_eq!(body["data"]["source_url"], "https://example.com/tours/douro");
    assert_eq!(body["data"]["trip_id"], trip_id.as_str());
    assert_eq!(body["data"]["likes"], 0);
}

#[actix_rt::test]
async fn profiles_are_created_on_first_visit() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::put()
        .uri("/api/profile")
        .insert_header(bearer("ana"))
        .set_json(json!({ "bio": "Always packing snacks", "interests": ["food", "hiking"] }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ana@example.com");
    assert_eq!(body["data"]["bio"], "Always packing snacks");

    let req = test::TestRequest::get()
        .uri("/api/users/ana")
        .insert_header(bearer("ben"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["interests"], json!(["food", "hiking"]));
    assert!(body["data"].get("email").is_none());
}

#[actix_rt::test]
async fn clearing_shared_activities_requires_admin() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    test_app.ai.push_json(json!([
        { "name": "Ribeira walk", "location": "Ribeira", "duration_minutes": 90 }
    ]));
    let req = test::TestRequest::post()
        .uri("/api/locations/Porto/discover")
        .insert_header(bearer("ana"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri("/api/admin/activities?location=Porto")
        .insert_header(bearer("ana"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let req = test::TestRequest::delete()
        .uri("/api/admin/activities?location=Porto")
        .insert_header(admin_bearer("root"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], 1);

    let req = test::TestRequest::get()
        .uri("/api/locations/porto/activities")
        .insert_header(bearer("ana"))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"], json!([]));
}

#[actix_rt::test]
async fn health_reports_unconfigured_services() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["database"]["status"], "ok");
    assert_eq!(body["services"]["generative_ai"]["status"], "ok");
    assert_eq!(body["services"]["image_storage"]["status"], "not_configured");
}

#[actix_rt::test]
async fn simultaneous_joins_all_land() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let invitees: Vec<String> = (1..=6).map(|i| format!("guest{}", i)).collect();

    let req = test::TestRequest::post()
        .uri("/api/trips")
        .insert_header(bearer("ana"))
        .set_json(json!({
            "name": "Azores",
            "destination": "Ponta Delgada",
            "start_date": "2026-08-01",
            "end_date": "2026-08-04",
            "invited_emails": invitees.iter().map(|i| email(i)).collect::<Vec<_>>(),
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let trip_id = body["data"]["_id"].as_str().unwrap().to_string();

    let results = join_all(invitees.iter().map(|guest| {
        let req = test::TestRequest::post()
            .uri(&format!("/api/trips/{}/join", trip_id))
            .insert_header(bearer(guest))
            .to_request();
        send(&app, req)
    }))
    .await;
    assert!(results.iter().all(|(status, _)| *status == StatusCode::OK));

    let req = test::TestRequest::get()
        .uri(&format!("/api/trips/{}", trip_id))
        .insert_header(bearer("ana"))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"]["participant_ids"].as_array().unwrap().len(), 7);
    assert_eq!(body["data"]["invited_emails"], json!([]));
}
