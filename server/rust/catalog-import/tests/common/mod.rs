//! 統合テスト共通ヘルパー。

#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use k1s0_catalog_import_server::adapter::middleware::tenant::BRAND_ID_HEADER;
use k1s0_catalog_import_server::test_support::TestHarness;

/// 3行のうち1行が未登録の色 "Crimson" を参照する CSV。
pub const CRIMSON_CSV: &str = "product_name,sku,color_name,environment_score\n\
Linen Shirt,SKU-1,Black,80\n\
Wool Coat,SKU-2,Crimson,65\n\
Cotton Tee,SKU-3,Black,70\n";

/// レスポンスのステータスとボディ（JSON でなければ文字列）を返す。
pub async fn send(
    harness: &TestHarness,
    method: Method,
    uri: &str,
    brand_id: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = send_raw(harness, method, uri, brand_id, body).await;
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

pub async fn send_raw(
    harness: &TestHarness,
    method: Method,
    uri: &str,
    brand_id: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(brand_id) = brand_id {
        builder = builder.header(BRAND_ID_HEADER, brand_id.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = harness.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

/// ファイルを登録してインポートを開始し、ジョブ ID を返す。
pub async fn start_import(harness: &TestHarness, brand_id: Uuid, csv: &str) -> String {
    let file_id = Uuid::new_v4().to_string();
    harness.upload(brand_id, &file_id, csv.as_bytes().to_vec()).await;
    let (status, body) = send(
        harness,
        Method::POST,
        "/api/v1/imports",
        Some(brand_id),
        Some(serde_json::json!({ "file_id": file_id, "filename": "spring.csv" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    body["job_id"].as_str().unwrap().to_string()
}

/// ジョブが指定状態になるまでポーリングする。
pub async fn wait_for_status(
    harness: &TestHarness,
    brand_id: Uuid,
    job_id: &str,
    expected: &str,
) -> Value {
    let uri = format!("/api/v1/imports/{job_id}");
    for _ in 0..250 {
        let (status, body) = send(harness, Method::GET, &uri, Some(brand_id), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == expected {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} did not reach {expected}");
}
