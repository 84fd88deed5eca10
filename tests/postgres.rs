//! Runs the HTTP surface against PostgreSQL.
//!
//! Every test is skipped unless `DATABASE_URL` points at a database the
//! suite may write to:
//!
//!   DATABASE_URL=postgres://... cargo test --test postgres
//!
//! Records are tagged with a fresh uuid so repeated runs on one database do
//! not see each other's rows.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;
use uuid::Uuid;

use common::{create, send};
use lms_server::storage::postgres::{self, PgStorage};

async fn pg_app() -> Option<Router> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        }
    };
    let pool = postgres::connect(&url, 5).await.unwrap();
    let mut config = common::config();
    config.request_timeout = Duration::from_secs(10);
    Some(common::app_with(&config, Arc::new(PgStorage::new(pool))))
}

fn tag() -> String {
    Uuid::new_v4().simple().to_string()
}

#[tokio::test]
async fn every_entity_round_trips_through_returning() {
    let Some(app) = pg_app().await else { return };
    let tag = tag();

    let branch = create(&app, "branch", json!({ "name": format!("Branch {tag}"), "address": "Tashkent" })).await;
    let teacher = create(
        &app,
        "teacher",
        json!({
            "full_name": "Dilnoza", "email": "d@lms.uz", "age": 31, "status": "active",
            "login": format!("teacher-{tag}"), "password": "pw", "branch_id": branch
        }),
    )
    .await;
    let group = create(
        &app,
        "group",
        json!({ "name": "G1", "group_type": "evening", "teacher_id": teacher, "branch_id": branch }),
    )
    .await;
    let schedule = create(
        &app,
        "schedule",
        json!({
            "room": "101", "group_id": group, "teacher_id": teacher,
            "starts_at": "2026-09-01T09:00:00Z", "ends_at": "2026-09-01T10:30:00Z"
        }),
    )
    .await;
    let lesson = create(&app, "lesson", json!({ "theme": "Algebra", "group_id": group, "schedule_id": schedule })).await;
    let task = create(
        &app,
        "task",
        json!({ "label": "Homework", "score": 5, "lesson_id": lesson, "group_id": group, "deadline": "2026-09-08T00:00:00Z" }),
    )
    .await;
    let student = create(
        &app,
        "student",
        json!({
            "full_name": "Ana", "email": "a@lms.uz", "age": 19, "paid_sum": 1500.5, "status": "active",
            "login": format!("student-{tag}"), "password": "pw", "group_id": group
        }),
    )
    .await;
    let admin = create(
        &app,
        "admin",
        json!({ "full_name": "Boss", "email": "b@lms.uz", "age": 40, "status": "active", "login": format!("admin-{tag}"), "password": "pw" }),
    )
    .await;
    let payment = create(
        &app,
        "payment",
        json!({ "price": 0, "student_id": student, "branch_id": branch, "admin_id": admin }),
    )
    .await;

    let (_, body) = send(&app, Method::GET, &format!("/teacher/{teacher}"), None).await;
    assert_eq!(body["payload"]["age"], 31);
    assert_eq!(body["payload"]["branch_id"], branch.as_str());
    assert!(body["payload"].get("password").is_none());

    let (_, body) = send(&app, Method::GET, &format!("/schedule/{schedule}"), None).await;
    assert_eq!(body["payload"]["starts_at"], "2026-09-01T09:00:00Z");
    assert_eq!(body["payload"]["group_id"], group.as_str());

    let (_, body) = send(&app, Method::GET, &format!("/task/{task}"), None).await;
    assert_eq!(body["payload"]["score"], 5);
    assert_eq!(body["payload"]["lesson_id"], lesson.as_str());

    let (_, body) = send(&app, Method::GET, &format!("/student/{student}"), None).await;
    assert_eq!(body["payload"]["paid_sum"], 1500.5);
    assert_eq!(body["payload"]["group_id"], group.as_str());

    let (_, body) = send(&app, Method::GET, &format!("/payment/{payment}"), None).await;
    assert_eq!(body["payload"]["admin_id"], admin.as_str());
    assert!(body["payload"]["updated_at"].is_null());

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/group/{group}"),
        Some(json!({ "name": "G2", "group_type": "morning", "teacher_id": teacher, "branch_id": branch })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payload"]["name"], "G2");
    assert!(body["payload"]["updated_at"].is_string());
}

#[tokio::test]
async fn page_window_and_total_count() {
    let Some(app) = pg_app().await else { return };
    let tag = tag();
    for n in 0..25 {
        create(&app, "branch", json!({ "name": format!("{tag} {n:02}") })).await;
    }

    let (status, body) = send(&app, Method::GET, &format!("/branch?search={tag}&page=2&limit=10"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payload"]["count"], 25);
    let branches = body["payload"]["branches"].as_array().unwrap();
    assert_eq!(branches.len(), 10);
    assert_eq!(branches[0]["name"], format!("{tag} 10"));

    let (_, body) = send(&app, Method::GET, &format!("/branch?search={tag}&page=4&limit=10"), None).await;
    assert!(body["payload"]["branches"].as_array().unwrap().is_empty());
    assert_eq!(body["payload"]["count"], 25);
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let Some(app) = pg_app().await else { return };
    let tag = tag();
    create(&app, "branch", json!({ "name": format!("100% {tag}") })).await;
    create(&app, "branch", json!({ "name": format!("1000 {tag}") })).await;

    let (_, body) = send(&app, Method::GET, &format!("/branch?search=100%25%20{tag}"), None).await;
    assert_eq!(body["payload"]["count"], 1);
    assert_eq!(body["payload"]["branches"][0]["name"], format!("100% {tag}"));
}

#[tokio::test]
async fn concurrent_payments_all_reach_the_paid_sum() {
    let Some(app) = pg_app().await else { return };
    let student = create(&app, "student", json!({ "full_name": "Ana", "paid_sum": 50000 })).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let app = app.clone();
        let student = student.clone();
        handles.push(tokio::spawn(async move {
            send(&app, Method::POST, "/payment", Some(json!({ "price": 1000, "student_id": student }))).await
        }));
    }
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, body) = send(&app, Method::GET, &format!("/student/{student}"), None).await;
    assert_eq!(body["payload"]["paid_sum"], 70000.0);
}

#[tokio::test]
async fn rejected_payment_leaves_no_trace() {
    let Some(app) = pg_app().await else { return };
    let admin = create(&app, "admin", json!({ "full_name": "Boss" })).await;
    let ghost = Uuid::new_v4();

    let (status, _) = send(
        &app,
        Method::POST,
        "/payment",
        Some(json!({ "price": 10, "student_id": ghost, "admin_id": admin })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, &format!("/adminPay/{admin}"), None).await;
    assert!(body["payload"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_report_joins_admin_and_payments() {
    let Some(app) = pg_app().await else { return };
    let admin = create(&app, "admin", json!({ "full_name": "Boss", "age": 40 })).await;
    for price in [100, 200] {
        create(&app, "payment", json!({ "price": price, "admin_id": admin })).await;
    }

    let (status, body) = send(&app, Method::GET, &format!("/adminPay/{admin}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["payload"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row["admin"]["id"], admin.as_str());
        assert_eq!(row["admin"]["age"], 40);
        assert_eq!(row["payment"]["admin_id"], admin.as_str());
    }

    let (_, body) = send(&app, Method::GET, &format!("/adminPay/{}", Uuid::new_v4()), None).await;
    assert!(body["payload"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dangling_reference_is_refused_by_the_database() {
    let Some(app) = pg_app().await else { return };
    let (status, _) = send(
        &app,
        Method::POST,
        "/student",
        Some(json!({ "full_name": "Ana", "group_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(
        &app,
        Method::POST,
        "/payment",
        Some(json!({ "price": 5, "branch_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
