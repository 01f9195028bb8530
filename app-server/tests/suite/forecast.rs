use app_test_support::TestApp;
use logweb_app_server::forecast::MAX_DATA_POINTS;
use logweb_app_server::forecast::MAX_REQUEST_FORECAST_LEN;
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;

#[tokio::test]
async fn forecast_extends_the_series() {
    let app = TestApp::start().await;
    let request = json!({
        "algorithm": "LLT",
        "data": [1.0, 2.0, 3.1, 3.9, 5.2, 6.0, 7.1, 8.0, 9.2, 9.9],
        "forecast_len": 4,
        "confidence": 90
    });

    let response = app.send(app.post_json("/forecast", &request)).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["algorithm"], json!("LLT"));
    assert_eq!(body["fc"].as_array().map(Vec::len), Some(14));
    assert_eq!(body["first_forecast_index"], json!(2));
    assert_eq!(body["period"], Value::Null);
    assert_eq!(body["lower"][0], Value::Null);

    let last = 13;
    let low = body["lower"][last].as_f64().unwrap();
    let fc = body["fc"][last].as_f64().unwrap();
    let high = body["upper"][last].as_f64().unwrap();
    assert!(low < fc && fc < high, "{low} {fc} {high}");
    assert!(fc > 9.9, "trend should keep rising, got {fc}");
}

#[tokio::test]
async fn seasonal_forecast_reports_its_period() {
    let app = TestApp::start().await;
    let data: Vec<f64> = (0..24).map(|i| [1.0, 5.0, 9.0, 5.0][i % 4]).collect();
    let request = json!({"algorithm": "llp", "data": data, "forecast_len": 4, "period": 4});

    let response = app.send(app.post_json("/forecast", &request)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["period"], json!(4));
}

#[tokio::test]
async fn bad_input_is_a_bad_request() {
    let app = TestApp::start().await;
    let unknown = json!({"algorithm": "arima", "data": [1.0, 2.0, 3.0], "forecast_len": 1});
    let response = app.send(app.post_json("/forecast", &unknown)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["messages"][0]["text"],
        json!("unknown forecast algorithm: arima")
    );

    let short = json!({"algorithm": "LL", "data": [1.0], "forecast_len": 1});
    let response = app.send(app.post_json("/forecast", &short)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_requests_are_rejected_before_fitting() {
    let app = TestApp::start().await;
    let far = json!({"algorithm": "LLP", "data": [1.0, 2.0, 1.0, 2.0, 1.0, 2.0], "period": 2,
        "forecast_len": u64::MAX});
    let response = app.send(app.post_json("/forecast", &far)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["messages"][0]["text"],
        json!(format!(
            "forecast_len {} exceeds the limit of {MAX_REQUEST_FORECAST_LEN}",
            u64::MAX
        ))
    );

    let data = vec![1.0; MAX_DATA_POINTS + 1];
    let long = json!({"algorithm": "LL", "data": data, "forecast_len": 1});
    let response = app.send(app.post_json("/forecast", &long)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
