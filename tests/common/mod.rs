// tests/common/mod.rs

use exam_session::{
    config::{Config, SessionSettings},
    routes,
    state::AppState,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Spawns the app on a random port backed by an in-memory database.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app() -> String {
    let database_url = "sqlite::memory:".to_string();

    // 1. One connection that never expires: the in-memory database lives
    //    and dies with it.
    let options = SqliteConnectOptions::from_str(&database_url)
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory sqlite for testing");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        session: SessionSettings::default(),
    };

    let state = AppState { pool, config };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Unique exam identity so tests never share rows.
pub fn unique_identity(prefix: &str) -> String {
    format!("{}-{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Exam with three single-choice questions q1..q3.
pub fn exam_payload(identity: &str, duration_minutes: i64) -> serde_json::Value {
    serde_json::json!({
        "identity": identity,
        "title": "Ancient Architecture Basics",
        "duration_minutes": duration_minutes,
        "questions": [
            {"id": "q1", "kind": "single_choice", "prompt": "Which dynasty?", "choices": ["Ming", "Qing"]},
            {"id": "q2", "kind": "single_choice", "prompt": "Which roof?", "choices": ["Hip", "Gable"]},
            {"id": "q3", "kind": "single_choice", "prompt": "Which wood?", "choices": ["Fir", "Pine"]}
        ]
    })
}

pub async fn create_exam(client: &reqwest::Client, address: &str, payload: &serde_json::Value) {
    let response = client
        .post(format!("{}/api/exams", address))
        .json(payload)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
}
