use super::*;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone)]
enum Reply {
    Json(serde_json::Value),
    Status(StatusCode, &'static str),
    Raw(&'static str),
    Stall(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReceivedPart {
    name: String,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct ServerState {
    reply: Reply,
    received: Arc<Mutex<Vec<ReceivedPart>>>,
}

async fn handle_process_lidar(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.received.lock().await.push(ReceivedPart {
            name,
            file_name,
            bytes,
        });
    }

    match state.reply {
        Reply::Json(value) => Json(value).into_response(),
        Reply::Status(status, body) => (status, body).into_response(),
        Reply::Raw(body) => (StatusCode::OK, body).into_response(),
        Reply::Stall(delay) => {
            tokio::time::sleep(delay).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn spawn_inference_server(reply: Reply) -> Result<(String, Arc<Mutex<Vec<ReceivedPart>>>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = ServerState {
        reply,
        received: received.clone(),
    };
    let app = Router::new()
        .route("/process_lidar", post(handle_process_lidar))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), received))
}

fn upload(name: &str) -> UploadRequest {
    UploadRequest {
        filename: name.to_string(),
        payload: vec![0x00, 0x00, 0x80, 0x3f, 0xff],
    }
}

fn scan_json() -> serde_json::Value {
    json!({
        "filename": "scan_001.bin",
        "original_points": 120000,
        "processed_points": 4096,
        "processing_latency_ms": 42,
        "prediction": "CAR",
        "confidence": "97.3%"
    })
}

#[tokio::test]
async fn posts_binary_as_multipart_file_part() {
    let (server_url, received) = spawn_inference_server(Reply::Json(scan_json()))
        .await
        .expect("spawn server");
    let client = HttpInferenceClient::new(format!("{server_url}/")).expect("client");

    let result = client
        .process_lidar(upload("scan_001.bin"))
        .await
        .expect("scan result");
    assert_eq!(result.prediction, "CAR");

    let parts = received.lock().await.clone();
    assert_eq!(
        parts,
        vec![ReceivedPart {
            name: "file".to_string(),
            file_name: Some("scan_001.bin".to_string()),
            bytes: vec![0x00, 0x00, 0x80, 0x3f, 0xff],
        }]
    );
}

#[tokio::test]
async fn endpoint_trims_trailing_slash() {
    let client = HttpInferenceClient::new("http://inference.local:8000/").expect("client");
    assert_eq!(client.endpoint(), "http://inference.local:8000/process_lidar");
}

#[tokio::test]
async fn non_success_status_is_service_error_with_detail() {
    let (server_url, _) = spawn_inference_server(Reply::Status(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"detail":"file field required"}"#,
    ))
    .await
    .expect("spawn server");
    let client = HttpInferenceClient::new(server_url).expect("client");

    let err = client
        .process_lidar(upload("broken.bin"))
        .await
        .expect_err("must fail");
    match err {
        InferenceError::Service { status, detail } => {
            assert_eq!(status, 422);
            assert_eq!(detail, "file field required");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_error_body_falls_back_to_status_reason() {
    let (server_url, _) =
        spawn_inference_server(Reply::Status(StatusCode::INTERNAL_SERVER_ERROR, ""))
            .await
            .expect("spawn server");
    let client = HttpInferenceClient::new(server_url).expect("client");

    let err = client
        .process_lidar(upload("broken.bin"))
        .await
        .expect_err("must fail");
    assert!(matches!(
        &err,
        InferenceError::Service { status: 500, detail } if detail == "Internal Server Error"
    ));

    let scan_error = ScanError::from(err);
    assert_eq!(scan_error.kind, ScanErrorKind::Service);
    assert!(scan_error.message.contains("Internal Server Error"));
}

#[tokio::test]
async fn error_body_with_success_status_is_service_error() {
    let (server_url, _) =
        spawn_inference_server(Reply::Json(json!({ "error": "cannot reshape array" })))
            .await
            .expect("spawn server");
    let client = HttpInferenceClient::new(server_url).expect("client");

    let err = client
        .process_lidar(upload("odd.bin"))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        InferenceError::Service { status: 200, ref detail } if detail == "cannot reshape array"
    ));
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let (server_url, _) = spawn_inference_server(Reply::Raw("not json at all"))
        .await
        .expect("spawn server");
    let client = HttpInferenceClient::new(server_url).expect("client");

    let err = client
        .process_lidar(upload("scan.bin"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, InferenceError::Decode { .. }));

    let scan_error = ScanError::from(err);
    assert_eq!(scan_error.kind, ScanErrorKind::Decode);
    assert!(scan_error
        .message
        .starts_with("Inference service returned an error"));
}

#[tokio::test]
async fn closed_port_is_unreachable_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = HttpInferenceClient::new(format!("http://{addr}")).expect("client");
    let err = client
        .process_lidar(upload("scan.bin"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, InferenceError::Unreachable { .. }), "{err:?}");

    let scan_error = ScanError::from(err);
    assert!(scan_error.is_transport());
    assert!(scan_error.message.contains("Could not reach"));
}

#[tokio::test]
async fn slow_service_times_out() {
    let (server_url, _) = spawn_inference_server(Reply::Stall(Duration::from_secs(5)))
        .await
        .expect("spawn server");
    let client =
        HttpInferenceClient::with_timeout(server_url, Duration::from_millis(200)).expect("client");

    let err = client
        .process_lidar(upload("scan.bin"))
        .await
        .expect_err("must time out");
    assert!(matches!(err, InferenceError::TimedOut { .. }), "{err:?}");
}
