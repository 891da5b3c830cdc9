mod common;

use common::{pothole, sample_jpeg, test_app, test_app_with, TestApp};
use damage_reporter::build_router;
use damage_reporter::core::detection::{decode_data_url, decode_image, to_data_url};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(app.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, query: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws{}", addr, query))
        .await
        .unwrap();
    client
}

async fn exchange(client: &mut Client, message: Message) -> String {
    client.send(message).await.unwrap();
    loop {
        match client.next().await.unwrap().unwrap() {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

fn frame_payload(location: Value) -> Message {
    Message::Text(
        json!({
            "image": to_data_url(&sample_jpeg()),
            "location": location
        })
        .to_string(),
    )
}

#[tokio::test]
async fn test_websocket_frame_returns_visualized_image() {
    let app = test_app(pothole()).await;
    let addr = serve(&app).await;
    let mut client = connect(addr, "").await;

    let reply = exchange(&mut client, frame_payload(json!({"lat": -6.2, "lon": 106.8}))).await;
    assert!(reply.starts_with("data:image/jpeg;base64,"));
    let image = decode_image(&decode_data_url(&reply).unwrap()).unwrap();
    assert_eq!((image.width(), image.height()), (32, 32));

    let page = app.state.reports.list_reports(1, 10).await.unwrap();
    assert_eq!(page.total_reports, 1);
    let report = &page.reports[0];
    assert_eq!(report.damage_type, "pothole");
    assert!(report
        .photo_url
        .as_deref()
        .unwrap()
        .starts_with("/uploads/detected_frame_"));

    let gps_log = std::fs::read_to_string(app.state.upload_dir.join("ws_gps_log.txt")).unwrap();
    assert!(gps_log.contains("lat=-6.2, lon=106.8"));
}

#[tokio::test]
async fn test_websocket_json_mode_and_error_replies() {
    let app = test_app(pothole()).await;
    let addr = serve(&app).await;
    let mut client = connect(addr, "?mode=json").await;

    let reply: Value =
        serde_json::from_str(&exchange(&mut client, frame_payload(json!(null))).await).unwrap();
    assert_eq!(reply["label"], "pothole");
    assert_eq!(reply["detections"].as_array().unwrap().len(), 1);
    assert_eq!(reply["report_id"], Value::Null);

    let no_image = exchange(&mut client, Message::Text(json!({"image": ""}).to_string())).await;
    assert_eq!(no_image, json!({"error": "No image data in payload"}).to_string());

    let bad_json = exchange(&mut client, Message::Text("not json".to_string())).await;
    assert!(bad_json.contains("Error processing input: "));

    let bad_image = exchange(
        &mut client,
        Message::Text(json!({"image": "data:image/jpeg;base64,bm90IGFuIGltYWdl"}).to_string()),
    )
    .await;
    assert_eq!(bad_image, json!({"error": "Failed to decode image."}).to_string());

    // 錯誤之後連線仍可繼續使用
    let again: Value = serde_json::from_str(
        &exchange(&mut client, frame_payload(json!({"lat": 1.5, "lon": 2.5}))).await,
    )
    .unwrap();
    assert!(again["report_id"].as_i64().is_some());
}

#[tokio::test]
async fn test_websocket_binary_frame_uses_stored_location() {
    let app = test_app(pothole()).await;
    app.state.location.update(-7.25, 112.75).unwrap();
    let addr = serve(&app).await;
    let mut client = connect(addr, "?mode=json").await;

    let reply: Value =
        serde_json::from_str(&exchange(&mut client, Message::Binary(sample_jpeg())).await)
            .unwrap();
    let report_id = reply["report_id"].as_i64().unwrap();

    let report = app.state.reports.get_report(report_id).await.unwrap();
    assert_eq!((report.lat, report.lng), (-7.25, 112.75));
}

#[tokio::test]
async fn test_websocket_predictor_failure_is_reported() {
    let app = test_app_with(|predictor| {
        predictor.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/predict");
            then.status(500).body("model crashed");
        });
    })
    .await;
    let addr = serve(&app).await;
    let mut client = connect(addr, "").await;

    let reply: Value =
        serde_json::from_str(&exchange(&mut client, frame_payload(json!(null))).await).unwrap();
    assert!(reply["error"]
        .as_str()
        .unwrap()
        .starts_with("Error during detection/visualization: "));
}
