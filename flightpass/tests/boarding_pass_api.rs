use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use image::{DynamicImage, ImageFormat};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use flightpass::flights::{Flight, FlightStore};

mod common;
use common::{
    encode, multipart_body, multipart_content_type, page_png, test_app, test_app_with, TestApp,
    API_KEY, PUBLIC_URL,
};

fn air_france() -> Flight {
    let mut flight = Flight::new("AF1234");
    flight.airline = Some("Air France".to_string());
    flight.departure_airport = Some("CDG".to_string());
    flight.arrival_airport = Some("JFK".to_string());
    flight
}

fn upload_request(uri: &str, file_name: Option<&str>, bytes: &[u8]) -> Request<Body> {
    let body = multipart_body(file_name, bytes);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"))
        .header(header::CONTENT_TYPE, multipart_content_type())
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn drain_background(app: &TestApp) {
    let tasks = app.state.pipeline.tasks();
    tasks.close();
    tasks.wait().await;
}

#[tokio::test]
async fn decode_reads_qr_and_finds_flight() {
    let app = test_app(None, vec![air_france()]);

    let response = send(
        &app,
        upload_request(
            "/api/v1/boarding-passes:decode",
            Some("pass.png"),
            &page_png(Some("AF1234")),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["code"], "AF1234");
    assert_eq!(json["data"]["source"], "symbol");
    assert_eq!(json["data"]["flight"]["airline"], "Air France");
    assert_eq!(json["data"]["flight"]["arrivalAirport"], "JFK");
}

#[tokio::test]
async fn decode_falls_back_to_ocr_text() {
    let app = test_app(Some(" lh 438\n"), vec![Flight::new("LH438")]);

    let response = send(
        &app,
        upload_request("/api/v1/boarding-passes:decode", None, &page_png(None)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["code"], "lh 438");
    assert_eq!(json["data"]["source"], "ocr");
    assert_eq!(json["data"]["flight"]["flightNumber"], "LH438");
}

#[tokio::test]
async fn decode_reads_pdf417_pass() {
    let app = test_app(None, vec![air_france()]);
    let png = encode(
        DynamicImage::ImageLuma8(common::pdf417_page("AF1234")),
        ImageFormat::Png,
    );

    let response = send(
        &app,
        upload_request("/api/v1/boarding-passes:decode", Some("pass.png"), &png),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["code"], "AF1234");
    assert_eq!(json["data"]["source"], "symbol");
    assert_eq!(json["data"]["flight"]["flightNumber"], "AF1234");
}

#[tokio::test]
async fn decode_of_unknown_code_has_null_flight() {
    let app = test_app(None, vec![]);

    let response = send(
        &app,
        upload_request(
            "/api/v1/boarding-passes:decode",
            None,
            &page_png(Some("KL1001")),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["code"], "KL1001");
    assert!(json["data"]["flight"].is_null());
}

#[tokio::test]
async fn decode_without_code_is_unprocessable() {
    let app = test_app(None, vec![air_france()]);

    let response = send(
        &app,
        upload_request("/api/v1/boarding-passes:decode", None, &page_png(None)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "unprocessable");
    assert_eq!(json["error"]["reason"], "no_code_found");
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn decode_of_garbage_is_unreadable_image() {
    let app = test_app(Some("AF1234"), vec![air_france()]);

    let response = send(
        &app,
        upload_request(
            "/api/v1/boarding-passes:decode",
            Some("pass.png"),
            b"definitely not an image",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["reason"], "unreadable_image");
}

#[tokio::test]
async fn decode_requires_api_key() {
    let app = test_app(None, vec![]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/boarding-passes:decode")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(multipart_body(None, &page_png(Some("AF1234")))))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_to_unknown_flight_is_not_found() {
    let app = test_app(None, vec![air_france()]);

    let response = send(
        &app,
        upload_request(
            "/api/v1/flights/ZZ9999/boarding-pass",
            Some("pass.png"),
            &page_png(Some("ZZ9999")),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "not_found");
    assert!(!app.dir.path().join("passes").exists());
}

#[tokio::test]
async fn upload_stores_pass_and_attaches_uri() {
    let app = test_app(None, vec![air_france()]);
    let jpeg = encode(
        DynamicImage::ImageLuma8(common::boarding_pass_page(Some("AF1234"))).to_rgb8().into(),
        ImageFormat::Jpeg,
    );

    let response = send(
        &app,
        upload_request("/api/v1/flights/af1234/boarding-pass", Some("scan.JPG"), &jpeg),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let expected_uri = format!("{PUBLIC_URL}/api/v1/flights/image/AF1234.jpg");
    assert_eq!(json["data"]["flightNumber"], "AF1234");
    assert_eq!(json["data"]["boardingPass"], expected_uri.as_str());
    assert_eq!(json["data"]["decode"]["code"], "AF1234");
    assert_eq!(json["data"]["decode"]["source"], "symbol");

    drain_background(&app).await;

    let flight = app.store.find_by_code("AF1234").await.unwrap().unwrap();
    assert_eq!(flight.boarding_pass.as_deref(), Some(expected_uri.as_str()));

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/flights/image/AF1234.jpg")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let stored = image::load_from_memory(&bytes).unwrap();
    assert_eq!((stored.width(), stored.height()), (640, 480));
}

#[tokio::test]
async fn upload_without_code_is_still_stored() {
    let app = test_app(None, vec![air_france()]);

    let response = send(
        &app,
        upload_request("/api/v1/flights/AF1234/boarding-pass", None, &page_png(None)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["decode"]["error"], "no_code_found");
    assert!(json["data"]["decode"].get("code").is_none());

    drain_background(&app).await;
    assert!(app.dir.path().join("passes").join("AF1234.png").exists());
}

#[tokio::test]
async fn upload_of_garbage_stores_nothing() {
    let app = test_app(None, vec![air_france()]);

    let response = send(
        &app,
        upload_request(
            "/api/v1/flights/AF1234/boarding-pass",
            Some("scan.png"),
            b"\x89PNG\r\n\x1a\ntruncated",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["reason"], "unreadable_image");

    drain_background(&app).await;
    assert!(!app.dir.path().join("passes").exists());
    let flight = app.store.find_by_code("AF1234").await.unwrap().unwrap();
    assert!(flight.boarding_pass.is_none());
}

#[tokio::test]
async fn missing_image_is_not_found() {
    let app = test_app(None, vec![]);

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/flights/image/LH438.png")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = test_app_with(None, vec![air_france()], |config| {
        config.server.max_upload_bytes = 1024;
    });

    let response = send(
        &app,
        upload_request(
            "/api/v1/boarding-passes:decode",
            Some("pass.png"),
            &page_png(Some("AF1234")),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn health_reports_ocr_and_region() {
    let app = test_app(None, vec![]);

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(
        json["data"]["region"],
        serde_json::json!({ "x": 20, "y": 20, "width": 360, "height": 80 })
    );
}
