use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::TimeDelta;
use tower::ServiceExt;

use mersul_core::AppError;
use mersul_core::testutil::{
    MockOrigin, itineraries_page, sample_itineraries_html, sample_station_html, sample_train_html,
};
use mersul_server::routes::LAST_FETCHED_HEADER;

use crate::integration::common::{json_body, setup_test_app, setup_with_public_url};

const NOT_RUNNING: &str = include_str!("../../../mersul-core/tests/fixtures/train_not_running.html");

fn train_origin() -> MockOrigin {
    MockOrigin::with_train_pages(vec![Ok(sample_train_html("1538", "10.03.2024"))])
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app(MockOrigin::new());

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["known_trains"], 0);
    assert_eq!(json["known_stations"], 0);
}

#[tokio::test]
async fn train_v2_returns_validated_document() {
    let app = setup_test_app(train_origin());

    let response = app.get("/v2/train/1538").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[LAST_FETCHED_HEADER],
        "2024-03-09T22:30:00Z"
    );

    let json = json_body(response).await;
    assert_eq!(json["$schema"], "http://localhost/v2/train/.schema.json");
    assert_eq!(json["rank"], "IR");
    assert_eq!(json["number"], "1538");
    assert_eq!(json["date"], "10.03.2024");
    assert_eq!(json["stations"][0]["name"], "Cluj Napoca");
    assert_eq!(
        json["stations"][2]["arrival"]["scheduleTime"],
        "2024-03-10T12:00:00+02:00"
    );

    assert_eq!(app.origin.requests(), vec!["train 1538 10.03.2024"]);
}

#[tokio::test]
async fn repeated_train_request_is_served_from_cache() {
    let app = setup_test_app(train_origin());

    assert_eq!(app.get("/v2/train/1538").await.status(), StatusCode::OK);
    app.clock.advance(TimeDelta::seconds(10));
    let response = app.get("/v2/train/1538").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[LAST_FETCHED_HEADER],
        "2024-03-09T22:30:00Z"
    );
    assert_eq!(app.origin.calls(), 1);
}

#[tokio::test]
async fn expired_entry_is_refetched() {
    let origin = train_origin();
    origin.push_train_page(Ok(sample_train_html("1538", "10.03.2024")));
    let app = setup_test_app(origin);

    assert_eq!(app.get("/v2/train/1538").await.status(), StatusCode::OK);
    app.clock.advance(TimeDelta::seconds(31));
    let response = app.get("/v2/train/1538").await;

    assert_eq!(
        response.headers()[LAST_FETCHED_HEADER],
        "2024-03-09T22:30:31Z"
    );
    assert_eq!(app.origin.calls(), 2);
}

#[tokio::test]
async fn use_yesterday_and_date_select_the_service_day() {
    let origin = MockOrigin::with_train_pages(vec![
        Ok(sample_train_html("1538", "09.03.2024")),
        Ok(sample_train_html("1538", "01.05.2024")),
    ]);
    let app = setup_test_app(origin);

    let response = app.get("/v2/train/1538?use_yesterday=Yes").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["date"], "09.03.2024");

    let response = app
        .get("/v2/train/1538?use_yesterday=1&date=2024-05-01T08:00:00%2B03:00")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["date"], "01.05.2024");

    assert_eq!(
        app.origin.requests(),
        vec!["train 1538 09.03.2024", "train 1538 01.05.2024"]
    );
}

#[tokio::test]
async fn train_v1_uses_clock_times_and_public_url() {
    let app = setup_with_public_url(train_origin(), Some("https://trenuri.example"));

    let response = app.get("/train/1538").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["$schema"], "https://trenuri.example/train/.schema.json");
    assert_eq!(json["stations"][0]["departure"]["scheduleTime"], "8:00");
    assert_eq!(json["stations"][1]["arrival"]["scheduleTime"], "9:10");
}

#[tokio::test]
async fn schema_url_follows_host_header() {
    let app = setup_test_app(train_origin());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/v2/train/1538")
                .header("host", "trenuri.local:5000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["$schema"], "http://trenuri.local:5000/v2/train/.schema.json");
}

#[tokio::test]
async fn train_listings() {
    let app = setup_test_app(train_origin());
    assert_eq!(json_body(app.get("/trains").await).await, serde_json::json!([]));

    assert_eq!(app.get("/v2/train/1538").await.status(), StatusCode::OK);

    let cached = json_body(app.get("/trains").await).await;
    assert_eq!(cached, serde_json::json!(["1538"]));

    let known = json_body(app.get("/v2/trains").await).await;
    assert_eq!(
        known,
        serde_json::json!([{"rank": "IR", "number": "1538", "company": "CFR Călători"}])
    );
}

#[tokio::test]
async fn station_v2_returns_boards() {
    let origin = MockOrigin::with_station_pages(vec![Ok(sample_station_html("Aiud", "10.03.2024"))]);
    let app = setup_test_app(origin);

    let response = app.get("/v2/station/Aiud").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(LAST_FETCHED_HEADER));

    let json = json_body(response).await;
    assert_eq!(json["$schema"], "http://localhost/v2/station/.schema.json");
    assert_eq!(json["stationName"], "Aiud");
    assert_eq!(json["departures"][0]["train"]["destination"], "Brașov");
    assert_eq!(json["arrivals"][0]["train"]["origin"], "Sibiu");
    assert_eq!(json["arrivals"][0]["status"]["platform"], "2");

    assert_eq!(app.origin.requests(), vec!["station aiud -"]);
}

#[tokio::test]
async fn station_listing_is_busiest_first() {
    let origin = MockOrigin::with_station_pages(vec![Ok(sample_station_html("Aiud", "10.03.2024"))]);
    let app = setup_test_app(origin);

    assert_eq!(
        app.get("/v2/station/aiud?date=2024-03-10").await.status(),
        StatusCode::OK
    );
    assert_eq!(app.origin.requests(), vec!["station aiud 10.03.2024"]);

    let stations = json_body(app.get("/v2/stations").await).await;
    assert_eq!(stations[0]["name"], "Aiud");
    assert_eq!(stations[0]["stoppedAtBy"], serde_json::json!(["1538", "3021"]));
    assert_eq!(stations.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn itineraries_v3_returns_validated_document() {
    let origin = MockOrigin::with_itinerary_pages(vec![Ok(sample_itineraries_html("12"))]);
    let app = setup_test_app(origin);

    let response = app
        .get("/v3/itineraries?from=Cluj%20Napoca&to=Bra%C8%99ov&date=2024-03-12")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[LAST_FETCHED_HEADER], "2024-03-09T22:30:00Z");

    let json = json_body(response).await;
    assert_eq!(json["$schema"], "http://localhost/v3/itineraries/.schema.json");
    assert_eq!(json["from"], "Cluj Napoca");
    assert_eq!(json["to"], "Brașov");
    assert_eq!(json["date"], "12.03.2024");
    assert_eq!(json["itineraries"].as_array().unwrap().len(), 2);
    assert_eq!(json["itineraries"][0]["trains"][0]["trainNumber"], "1538");
    assert_eq!(
        json["itineraries"][0]["trains"][0]["arrivalDate"],
        "2024-03-12T12:00:00+02:00"
    );

    assert_eq!(
        app.origin.requests(),
        vec!["itineraries cluj-napoca brasov 12.03.2024"]
    );

    let stations = json_body(app.get("/v2/stations").await).await;
    assert!(stations.as_array().unwrap().iter().any(|s| s["name"] == "Teiuș"));
}

#[tokio::test]
async fn itineraries_without_connection_return_404() {
    let origin = MockOrigin::with_itinerary_pages(vec![Ok(itineraries_page(None).to_fragment())]);
    let app = setup_test_app(origin);

    let response = app.get("/v3/itineraries?from=aiud&to=mangalia").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "no_itineraries");
    assert_eq!(app.origin.requests(), vec!["itineraries aiud mangalia 10.03.2024"]);
}

#[tokio::test]
async fn itineraries_require_both_stations() {
    let app = setup_test_app(MockOrigin::new());

    let response = app.get("/v3/itineraries?from=aiud").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.origin.calls(), 0);
}

#[tokio::test]
async fn train_not_running_returns_404() {
    let origin = MockOrigin::with_train_pages(vec![Ok(NOT_RUNNING.to_string())]);
    let app = setup_test_app(origin);

    let response = app.get("/v2/train/532").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = json_body(response).await;
    assert_eq!(json["error"], "train_not_running");
}

#[tokio::test]
async fn origin_failures_map_to_server_errors() {
    let origin = MockOrigin::with_train_pages(vec![
        Err(AppError::Fetch("HTTP 503".into())),
        Err(AppError::Timeout(30)),
        Ok("<p>Serviciu indisponibil</p>".into()),
    ]);
    let app = setup_test_app(origin);

    let response = app.get("/v2/train/1538").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "fetch_error");

    let response = app.get("/v2/train/1538").await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(response).await["error"], "timeout");

    let response = app.get("/v2/train/1538").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Nothing was cached, so every request reached the origin.
    assert_eq!(app.origin.calls(), 3);
}

#[tokio::test]
async fn schema_documents_are_served() {
    let app = setup_test_app(MockOrigin::new());

    for uri in [
        "/train/.schema.json",
        "/v2/train/.schema.json",
        "/v2/station/.schema.json",
        "/v3/itineraries/.schema.json",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(json_body(response).await["type"], "object", "{uri}");
    }
    assert_eq!(app.origin.calls(), 0);
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let app = setup_test_app(MockOrigin::new());

    let json = json_body(app.get("/api-docs/openapi.json").await).await;
    assert!(json["paths"]["/v2/train/{number}"].is_object());
    assert!(json["paths"]["/v2/station/{name}"].is_object());
    assert!(json["paths"]["/v3/itineraries"].is_object());
}
