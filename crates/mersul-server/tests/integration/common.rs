use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use mersul_core::testutil::{ManualClock, MockOrigin};
use mersul_core::{KnowledgeStore, ScrapeService, ServiceConfig};
use mersul_server::routes;
use mersul_server::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub origin: MockOrigin,
    pub clock: ManualClock,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

/// 00:30 on 10.03.2024 in Bucharest.
pub fn service_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-09T22:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Router over a mock origin and an empty store in a temp directory.
pub fn setup_test_app(origin: MockOrigin) -> TestApp {
    setup_with_public_url(origin, None)
}

pub fn setup_with_public_url(origin: MockOrigin, public_url: Option<&str>) -> TestApp {
    let db_dir = TempDir::new().expect("Failed to create temp dir");
    let store = KnowledgeStore::open(db_dir.path()).expect("Failed to open store");
    let clock = ManualClock::new(service_now());

    let service = ScrapeService::with_clock(
        origin.clone(),
        store,
        &ServiceConfig::default(),
        Arc::new(clock.clone()),
    );
    let state = Arc::new(AppState {
        service,
        public_url: public_url.map(String::from),
    });

    TestApp {
        router: routes::router(state),
        origin,
        clock,
        _db_dir: db_dir,
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
