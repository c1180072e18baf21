mod common;

use actix_web::{http::StatusCode, test};
use futures::future::join_all;
use serde_json::json;

use common::{add_activity, bearer, send, trip_with_members, vote, TestApp};

#[actix_rt::test]
async fn votes_are_recorded_changed_and_retracted() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let trip_id = trip_with_members(&app, "ana", &["ben", "cai"]).await;
    let activity_id = add_activity(&app, &trip_id, "ben", "Tram 28 ride").await;

    let (status, body) = vote(&app, &trip_id, &activity_id, "ana", true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["outcome"], "recorded");
    assert_eq!(body["data"]["activity"]["likes"], 1);
    assert_eq!(body["data"]["activity"]["votes"]["ana"], true);

    let (_, body) = vote(&app, &trip_id, &activity_id, "ana", true).await;
    assert_eq!(body["data"]["outcome"], "unchanged");
    assert_eq!(body["data"]["activity"]["likes"], 1);

    let (_, body) = vote(&app, &trip_id, &activity_id, "ana", false).await;
    assert_eq!(body["data"]["outcome"], "changed");
    assert_eq!(body["data"]["activity"]["likes"], 0);
    assert_eq!(body["data"]["activity"]["dislikes"], 1);

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/api/trips/{}/activities/{}/vote",
            trip_id, activity_id
        ))
        .insert_header(bearer("ana"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likes"], 0);
    assert_eq!(body["data"]["dislikes"], 0);
    assert_eq!(body["data"]["votes"], json!({}));
}

#[actix_rt::test]
async fn concurrent_votes_are_all_counted() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let members: Vec<String> = (1..=9).map(|i| format!("member{}", i)).collect();
    let member_refs: Vec<&str> = members.iter().map(String::as_str).collect();
    let trip_id = trip_with_members(&app, "owner", &member_refs).await;
    let activity_id = add_activity(&app, &trip_id, "owner", "Fado night").await;

    let mut voters = member_refs.clone();
    voters.push("owner");
    let results = join_all(
        voters
            .iter()
            .map(|voter| vote(&app, &trip_id, &activity_id, voter, true)),
    )
    .await;
    assert!(results.iter().all(|(status, _)| *status == StatusCode::OK));

    let req = test::TestRequest::get()
        .uri(&format!("/api/trips/{}/activities", trip_id))
        .insert_header(bearer("owner"))
        .to_request();
    let (_, body) = send(&app, req).await;
    let activity = &body["data"][0];
    assert_eq!(activity["likes"], 10);
    assert_eq!(activity["dislikes"], 0);
    assert_eq!(activity["votes"].as_object().unwrap().len(), 10);
}

#[actix_rt::test]
async fn outsiders_cannot_vote() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let trip_id = trip_with_members(&app, "ana", &[]).await;
    let activity_id = add_activity(&app, &trip_id, "ana", "Pasteis de Belem").await;

    let (status, body) = vote(&app, &trip_id, &activity_id, "mallory", true).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = vote(&app, &trip_id, "missing-activity", "ana", true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn voting_requires_a_token() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::put()
        .uri("/api/trips/t1/activities/a1/vote")
        .set_json(json!({ "liked": true }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Authentication required");
}

#[actix_rt::test]
async fn voting_on_a_shared_activity_adopts_it_into_the_trip() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let trip_id = trip_with_members(&app, "ana", &["ben"]).await;

    test_app.ai.push_json(json!([
        {
            "name": "Belem Tower",
            "location": "Belem",
            "duration_minutes": 60,
            "description": "A riverside fortress.",
            "category": "sightseeing"
        },
        {
            "name": "LX Factory",
            "location": "Alcantara",
            "duration_minutes": 120,
            "category": "shopping"
        }
    ]));
    let req = test::TestRequest::post()
        .uri("/api/locations/Lisbon/discover")
        .insert_header(bearer("ana"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let shared_id = body["data"][0]["_id"].as_str().unwrap().to_string();

    let (status, body) = vote(&app, &trip_id, &shared_id, "ana", true).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let copy = &body["data"]["activity"];
    assert_ne!(copy["_id"], shared_id.as_str());
    assert_eq!(copy["discovery_id"], shared_id.as_str());
    assert_eq!(copy["trip_id"], trip_id.as_str());
    assert_eq!(copy["likes"], 1);
    let copy_id = copy["_id"].as_str().unwrap().to_string();

    // A second voter reaching it through the shared id lands on the same copy
    let (_, body) = vote(&app, &trip_id, &shared_id, "ben", true).await;
    assert_eq!(body["data"]["activity"]["_id"], copy_id.as_str());
    assert_eq!(body["data"]["activity"]["likes"], 2);

    let req = test::TestRequest::get()
        .uri(&format!("/api/trips/{}/activities", trip_id))
        .insert_header(bearer("ben"))
        .to_request();
    let (_, body) = send(&app, req).await;
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|a| a["_id"] != shared_id.as_str()));

    let req = test::TestRequest::get()
        .uri("/api/locations/lisbon/activities")
        .insert_header(bearer("ben"))
        .to_request();
    let (_, body) = send(&app, req).await;
    let shared = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["_id"] == shared_id.as_str())
        .cloned()
        .unwrap();
    assert_eq!(shared["likes"], 0);
}
