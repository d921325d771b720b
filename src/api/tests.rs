use std::{
    io::Write,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing_subscriber::fmt::MakeWriter;

use super::*;
use crate::{
    db::testing::{create_user, memory_database},
    stats::{InstructorStats, SqlStats},
    user::Role,
};

#[derive(Default)]
struct FakeStats {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl StatsSource for FakeStats {
    async fn get_instructor_stats(&self, _instructor_id: i64) -> Result<InstructorStats> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Fatal(anyhow::anyhow!(
                "connection to 10.0.0.7:5432 refused"
            )));
        }
        Ok(InstructorStats {
            total_courses: 7,
            ..Default::default()
        })
    }
}

/// Collects formatted log lines in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn app(database: SqlitePool, stats: Arc<dyn StatsSource>) -> Router {
    router(AppState::new(database, stats)).layer(SessionManagerLayer::new(MemoryStore::default()))
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: String,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        cookie,
        body: String::from_utf8_lossy(&bytes).to_string(),
    }
}

/// Log in a user created by `create_user` and return the session cookie.
async fn login_as(app: &Router, name: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/api/user/login",
        None,
        Some(json!({
            "email": format!("{}@example.com", name.to_lowercase()),
            "password": "correct horse",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    reply.cookie.expect("login sets a session cookie")
}

#[tokio::test]
async fn stats_requires_a_session() {
    let stats = Arc::new(FakeStats::default());
    let app = app(memory_database().await, stats.clone());

    let reply = send(&app, Method::GET, "/api/instructor/stats", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(stats.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stats_are_returned_as_json() {
    let database = memory_database().await;
    create_user(&database, "Grace", Role::Instructor).await;
    let stats = Arc::new(FakeStats::default());
    let app = app(database, stats.clone());
    let cookie = login_as(&app, "Grace").await;

    let reply = send(&app, Method::GET, "/api/instructor/stats", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["total_courses"], 7);
    assert_eq!(stats.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stats_failure_is_logged_but_not_returned() {
    let database = memory_database().await;
    create_user(&database, "Grace", Role::Instructor).await;
    let stats = Arc::new(FakeStats {
        fail: true,
        ..Default::default()
    });
    let app = app(database, stats.clone());
    let cookie = login_as(&app, "Grace").await;

    // current-thread runtime, so the handler logs through this subscriber
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let reply = send(&app, Method::GET, "/api/instructor/stats", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, "Internal Server Error");
    assert!(!reply.body.contains("10.0.0.7"));
    assert_eq!(stats.calls.load(Ordering::SeqCst), 1);

    let logged = logs.contents();
    assert!(logged.contains("ERROR"), "{logged}");
    assert!(logged.contains("Error fetching instructor stats"), "{logged}");
    assert!(logged.contains("connection to 10.0.0.7:5432 refused"), "{logged}");
}

#[tokio::test]
async fn wrong_password_does_not_start_a_session() {
    let database = memory_database().await;
    create_user(&database, "Grace", Role::Instructor).await;
    let app = app(database.clone(), Arc::new(SqlStats::new(database)));
    let reply = send(
        &app,
        Method::POST,
        "/api/user/login",
        None,
        Some(json!({ "email": "grace@example.com", "password": "nope" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.cookie.is_none());
}

#[tokio::test]
async fn students_cannot_create_courses() {
    let database = memory_database().await;
    create_user(&database, "Alice", Role::Student).await;
    let app = app(database.clone(), Arc::new(SqlStats::new(database)));
    let cookie = login_as(&app, "Alice").await;

    let reply = send(
        &app,
        Method::POST,
        "/api/courses",
        Some(&cookie),
        Some(json!({ "title": "Mine", "category": "cs", "level": "beginner", "price": 0.0 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn course_lifecycle_over_http() {
    let database = memory_database().await;
    create_user(&database, "Grace", Role::Instructor).await;
    create_user(&database, "Alice", Role::Student).await;
    let app = app(database.clone(), Arc::new(SqlStats::new(database)));
    let grace = login_as(&app, "Grace").await;
    let alice = login_as(&app, "Alice").await;

    let reply = send(
        &app,
        Method::POST,
        "/api/courses",
        Some(&grace),
        Some(json!({
            "title": "Rust",
            "description": "Ownership and borrowing",
            "category": "programming",
            "level": "beginner",
            "price": 20.0,
            "requirements": ["curiosity"],
            "outcomes": ["write safe code"],
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let course = reply.json();
    assert_eq!(course["status"], "draft");
    assert_eq!(course["requirements"], json!(["curiosity"]));
    let course_id = course["id"].as_i64().unwrap();

    // drafts are hidden from everyone but the owner
    let uri = format!("/api/courses/{course_id}");
    assert_eq!(send(&app, Method::GET, &uri, None, None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, Method::GET, &uri, Some(&grace), None).await.status, StatusCode::OK);

    let reply = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course_id}/sections"),
        Some(&grace),
        Some(json!({ "title": "Basics" })),
    )
    .await;
    let section_id = reply.json()["id"].as_i64().unwrap();

    for uri in [
        format!("/api/courses/{course_id}/sections"),
        format!("/api/sections/{section_id}/lessons"),
    ] {
        let reply = send(&app, Method::POST, &uri, Some(&grace), Some(json!({ "title": "" }))).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{uri}");
    }
    let mut lessons = Vec::new();
    for title in ["Hello", "Ownership"] {
        let reply = send(
            &app,
            Method::POST,
            &format!("/api/sections/{section_id}/lessons"),
            Some(&grace),
            Some(json!({ "title": title })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        lessons.push(reply.json()["id"].as_i64().unwrap());
    }

    let enroll = format!("/api/courses/{course_id}/enroll");
    let reply = send(&app, Method::POST, &enroll, Some(&alice), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course_id}/publish"),
        Some(&grace),
        None,
    )
    .await;
    assert_eq!(reply.json()["status"], "published");

    let reply = send(
        &app,
        Method::GET,
        "/api/courses?category=programming&level=beginner&min_price=10&max_price=30",
        None,
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let catalogue = reply.json();
    assert_eq!(catalogue["total_count"], 1);
    assert_eq!(catalogue["items"][0]["instructor_name"], "Grace");

    let reply = send(&app, Method::GET, "/api/courses?category=art", None, None).await;
    assert_eq!(reply.json()["total_count"], 0);

    assert_eq!(send(&app, Method::POST, &enroll, None, None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(send(&app, Method::POST, &enroll, Some(&alice), None).await.status, StatusCode::OK);
    assert_eq!(
        send(&app, Method::POST, &enroll, Some(&alice), None).await.status,
        StatusCode::CONFLICT
    );

    let progress = format!("/api/courses/{course_id}/progress");
    let reply = send(
        &app,
        Method::POST,
        &progress,
        Some(&alice),
        Some(json!({ "lesson_id": lessons[0], "progress": 100.0 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.json()["progress"], 50.0);
    assert_eq!(reply.json()["completed_lessons"], json!([lessons[0]]));

    let reply = send(
        &app,
        Method::POST,
        &progress,
        Some(&alice),
        Some(json!({ "lesson_id": lessons[1], "progress": 250.0 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course_id}/reviews"),
        Some(&alice),
        Some(json!({ "rating": 4, "comment": "clear and short" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(&app, Method::GET, "/api/enrollments", Some(&alice), None).await;
    assert_eq!(reply.json().as_array().unwrap().len(), 1);

    let reply = send(&app, Method::GET, "/api/instructor/courses", Some(&grace), None).await;
    let listing = reply.json();
    assert_eq!(listing["items"][0]["student_count"], 1);
    assert_eq!(listing["items"][0]["average_rating"], 4.0);

    let reply = send(&app, Method::GET, "/api/instructor/stats", Some(&grace), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let stats = reply.json();
    assert_eq!(stats["total_enrollments"], 1);
    assert_eq!(stats["revenue"], 20.0);

    let reply = send(&app, Method::POST, "/api/user/logout", Some(&alice), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        send(&app, Method::GET, "/api/user/me", Some(&alice), None).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[test]
fn openapi_lists_the_stats_route() {
    let json = get_openapi_json().unwrap();
    assert!(json.contains("/api/instructor/stats"));
    assert!(json.contains("/api/courses/{course_id}/enroll"));
}
