//! HTTP behaviour of the rail client against a mocked status endpoint.

use std::time::Duration;

use serde_json::json;
use trainlive_core::{domain::TrainNumber, errors::StatusError, status::TrainStatusClient};
use trainlive_rail::RailApiClient;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn train(n: &str) -> TrainNumber {
    TrainNumber::parse(n).unwrap()
}

fn client(server: &MockServer) -> RailApiClient {
    RailApiClient::new(format!("{}/api/train", server.uri()), Duration::from_secs(2)).unwrap()
}

fn live_status() -> serde_json::Value {
    json!({
        "success": true,
        "data": {
            "currentPosition": { "stationCode": "GAYA", "distanceFromOriginKm": 458.0 },
            "route": [
                { "stationCode": "DHN", "station_name": "Dhanbad Jn" },
                { "stationCode": "GAYA", "station_name": "Gaya Jn", "platformNumber": "1",
                  "scheduledArrivalTime": 1773480000, "actualArrivalTime": 1773486300 },
                { "stationCode": "DDU", "station_name": "Pt DD Upadhyaya Jn" }
            ]
        }
    })
}

#[tokio::test]
async fn fetch_sends_train_number_and_maps_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/train"))
        .and(query_param("trainNo", "12303"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live_status()))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client(&server).fetch(&train("12303")).await.unwrap();
    assert_eq!(snapshot.train_number, train("12303"));
    assert_eq!(snapshot.current_station(), "Gaya Jn");
    assert_eq!(snapshot.previous_station(), Some("Dhanbad Jn"));
    assert_eq!(snapshot.next_station(), Some("Pt DD Upadhyaya Jn"));
    assert!(snapshot.actual_time() > snapshot.scheduled_time());
}

#[tokio::test]
async fn unknown_train_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/train"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "message": "Invalid train number" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch(&train("11111")).await.unwrap_err();
    assert_eq!(err, StatusError::NotFound(train("11111")));
}

#[tokio::test]
async fn http_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).fetch(&train("22222")).await.unwrap_err();
    assert_eq!(err, StatusError::NotFound(train("22222")));
}

#[tokio::test]
async fn server_error_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server).fetch(&train("12303")).await.unwrap_err();
    match err {
        StatusError::UpstreamUnavailable(msg) => assert!(msg.contains("503"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server).fetch(&train("12303")).await.unwrap_err();
    assert!(matches!(err, StatusError::MalformedResponse(_)));
}

#[tokio::test]
async fn slow_upstream_times_out_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(live_status())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client =
        RailApiClient::new(format!("{}/api/train", server.uri()), Duration::from_millis(100))
            .unwrap();
    let err = client.fetch(&train("12303")).await.unwrap_err();
    assert!(matches!(err, StatusError::UpstreamUnavailable(_)));
}
