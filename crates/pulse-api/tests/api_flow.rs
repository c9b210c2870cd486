use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use pulse_api::auth::hash_reset_token;
use pulse_api::{AppState, AppStateInner, router};
use pulse_db::Database;
use pulse_gateway::dispatcher::Dispatcher;
use pulse_insights::controller::{FeedbackListController, ResponseOutcome};
use pulse_insights::filter::{RatingBand, RatingFilter};
use pulse_types::api::FeedbackPage;
use pulse_types::events::GatewayEvent;

fn test_state() -> AppState {
    let db = Database::open_in_memory().unwrap();
    Arc::new(AppStateInner::new(db, "test-secret".into(), Dispatcher::new()))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": format!("{}@example.com", username),
            "password": "hunter2hunter2",
            "username": username,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn post_feedback(app: &Router, token: &str, rating: Option<f64>, subject: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/feedbacks",
        Some(token),
        Some(json!({
            "sender_email": "customer@shop.test",
            "subject": subject,
            "average_rating": rating,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn test_health_is_public() {
    let app = router(test_state());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = router(test_state());
    let (status, _) = send(&app, Method::GET, "/issues", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::GET, "/team", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_and_conflicts() {
    let app = router(test_state());

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "dana@example.com", "password": "short", "username": "dana" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "password");

    register(&app, "dana").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "other@example.com", "password": "hunter2hunter2", "username": "DANA" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["field"], "username");

    let (status, body) = send(&app, Method::GET, "/auth/username-available?username=Dana", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    let (_, body) = send(&app, Method::GET, "/auth/username-available?username=robin", None, None).await;
    assert_eq!(body["available"], true);
}

#[tokio::test]
async fn test_login_by_email() {
    let app = router(test_state());
    register(&app, "dana").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "DANA@example.com", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "dana");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "dana@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = body["token"].as_str().unwrap();
    let (status, _) = send(&app, Method::POST, "/auth/logout", Some(token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_feedback_query_driven_by_list_controller() {
    let state = test_state();
    let app = router(state.clone());
    let token = register(&app, "dana").await;

    for (rating, subject) in [(Some(4.4), "a"), (Some(4.5), "b"), (Some(4.6), "c"), (Some(3.9), "d"), (None, "e")] {
        post_feedback(&app, &token, rating, subject).await;
    }

    let mut list = FeedbackListController::new(1);
    list.set_rating(RatingFilter::Band(RatingBand::Four));
    let (ticket, query) = list.begin_request(&Utc::now());

    let (status, body) = send(
        &app,
        Method::POST,
        "/feedbacks/query",
        Some(&token),
        Some(serde_json::to_value(&query).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page: FeedbackPage = serde_json::from_value(body).unwrap();
    assert_eq!(page.count, Some(2));
    assert_eq!(page.rows.len(), 1);

    assert_eq!(list.apply_response(ticket, page), ResponseOutcome::Applied);
    assert_eq!(list.pagination().total_pages(), 2);
}

#[tokio::test]
async fn test_rows_scoped_to_owner() {
    let app = router(test_state());
    let dana = register(&app, "dana").await;
    let robin = register(&app, "robin").await;

    let row = post_feedback(&app, &dana, Some(2.0), "Slow checkout").await;
    let id = row["id"].as_str().unwrap();

    let (_, body) = send(&app, Method::POST, "/feedbacks/query", Some(&robin), Some(json!({ "count": true }))).await;
    assert_eq!(body["count"], 0);

    let uri = format!("/feedbacks/{}", id);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&robin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let processed = format!("/feedbacks/{}/processed", id);
    let (status, body) = send(&app, Method::POST, &processed, Some(&dana), None).await;
    assert_eq!(status, StatusCode::OK);
    let first = body["processed_at"].clone();
    assert!(!first.is_null());
    let (_, body) = send(&app, Method::POST, &processed, Some(&dana), None).await;
    assert_eq!(body["processed_at"], first);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&dana), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_feedback_rating_out_of_range_rejected() {
    let app = router(test_state());
    let token = register(&app, "dana").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/feedbacks",
        Some(&token),
        Some(json!({ "sender_email": "a@b.test", "average_rating": 7.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "average_rating");
}

#[tokio::test]
async fn test_inserts_are_broadcast() {
    let state = test_state();
    let app = router(state.clone());
    let mut rx = state.dispatcher.subscribe();

    let token = register(&app, "dana").await;
    assert!(matches!(rx.recv().await.unwrap(), GatewayEvent::MemberJoin { .. }));

    post_feedback(&app, &token, Some(1.0), "Broken").await;
    match rx.recv().await.unwrap() {
        GatewayEvent::FeedbackCreate { feedback, .. } => assert_eq!(feedback.subject.as_deref(), Some("Broken")),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_issue_lifecycle_survives_rename() {
    let app = router(test_state());
    let token = register(&app, "dana").await;

    let (status, issue) = send(&app, Method::POST, "/issues", Some(&token), Some(json!({ "issue_title": "Login" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/issues/{}", issue["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::POST, "/issues", Some(&token), Some(json!({ "issue_title": "  " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, Method::PUT, "/settings/profile", Some(&token), Some(json!({ "username": "dana_k" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "dana_k");

    let (status, body) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({ "issue_title": "Sign-in" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "dana_k");

    let (_, body) = send(&app, Method::GET, "/issues?limit=10", Some(&token), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["issue_title"], "Sign-in");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_conflict_and_roster() {
    let app = router(test_state());
    let dana = register(&app, "dana").await;
    register(&app, "robin").await;

    let (status, body) = send(&app, Method::PUT, "/settings/profile", Some(&dana), Some(json!({ "email": "robin@example.com" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["field"], "email");

    let (_, body) = send(&app, Method::GET, "/team", Some(&dana), None).await;
    let members = body["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|m| m.get("password").is_none()));
}

#[tokio::test]
async fn test_password_reset_is_single_use() {
    let state = test_state();
    let app = router(state.clone());
    register(&app, "dana").await;

    let (status, _) = send(&app, Method::POST, "/auth/reset-password", None, Some(json!({ "email": "nobody@example.com" }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, Method::POST, "/auth/reset-password", None, Some(json!({ "email": "dana@example.com" }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Mint a token we know; the real one only reaches the log.
    let user = state.db.get_user_by_email("dana@example.com").unwrap().unwrap();
    state
        .db
        .create_password_reset(&hash_reset_token("known-token"), &user.id, Utc::now() + Duration::minutes(5))
        .unwrap();

    let confirm = json!({ "token": "known-token", "new_password": "brand-new-pass" });
    let (status, _) = send(&app, Method::POST, "/auth/reset-password/confirm", None, Some(confirm.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, Method::POST, "/auth/reset-password/confirm", None, Some(confirm)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "token");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "dana@example.com", "password": "brand-new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_overview_buckets_in_caller_offset() {
    let app = router(test_state());
    let token = register(&app, "dana").await;
    for rating in [Some(5.0), Some(4.0), Some(1.0), None] {
        post_feedback(&app, &token, rating, "x").await;
    }
    send(&app, Method::POST, "/issues", Some(&token), Some(json!({ "issue_title": "Crash" }))).await;

    let (status, body) = send(&app, Method::GET, "/insights/overview?tz_offset_minutes=120", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["unread"], 4);
    assert_eq!(body["average_rating"], 3.3);
    assert_eq!(body["hourly"].as_array().unwrap().len(), 24);
    assert_eq!(body["weekly"].as_array().unwrap().len(), 7);
    assert_eq!(body["top_issues"][0]["title"], "Crash");

    let (status, _) = send(&app, Method::GET, "/insights/overview?tz_offset_minutes=100000", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
