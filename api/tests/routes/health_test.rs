use crate::helpers::{get, make_test_app, send};
use axum::http::StatusCode;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn health_check_returns_ok_json() {
    let (app, _) = make_test_app().await;

    let (status, json) = send(app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], "OK");
    assert_eq!(json["message"], "Health check passed");
}
