//! REST API 統合テスト（インメモリ構成）。

mod common;

use std::collections::BTreeSet;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{send, send_raw, start_import, wait_for_status, CRIMSON_CSV};
use k1s0_catalog_import_server::domain::value_object::EntityType;
use k1s0_catalog_import_server::test_support::TestHarness;

// ---------------------------------------------------------------------------
// Health / Readiness / Tenant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_healthz_and_readyz() {
    let harness = TestHarness::new();
    let (status, _) = send(&harness, Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&harness, Method::GET, "/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_brand_header_is_rejected() {
    let harness = TestHarness::new();
    let uri = format!("/api/v1/imports/{}", Uuid::new_v4());
    let (status, body) = send(&harness, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "CATALOG_IMPORT_TENANT_REQUIRED");
}

#[tokio::test]
async fn test_job_is_invisible_to_other_brand() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    harness.seed_entity(brand_id, EntityType::Color, "Black").await;
    let job_id = start_import(&harness, brand_id, CRIMSON_CSV).await;

    let uri = format!("/api/v1/imports/{job_id}");
    let (status, body) = send(&harness, Method::GET, &uri, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CATALOG_IMPORT_NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Precheck
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_validate_reports_unsupported_format() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    harness.upload(brand_id, "f-1", b"a,b\n1,2\n".to_vec()).await;

    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/imports/validate",
        Some(brand_id),
        Some(json!({ "file_id": "f-1", "filename": "catalog.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(!body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_import_rejects_missing_file() {
    let harness = TestHarness::new();
    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/imports",
        Some(Uuid::new_v4()),
        Some(json!({ "file_id": "missing", "filename": "spring.csv" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CATALOG_IMPORT_VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Staging / resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_xlsx_upload_is_validated() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in ["product_name", "sku"].into_iter().enumerate() {
        sheet.write_string(0, u16::try_from(col).unwrap(), header).unwrap();
    }
    for (row, sku) in ["SKU-1", "SKU-2", "SKU-3"].into_iter().enumerate() {
        let row = u32::try_from(row + 1).unwrap();
        sheet.write_string(row, 0, format!("Item {row}")).unwrap();
        sheet.write_string(row, 1, sku).unwrap();
    }
    let file_id = Uuid::new_v4().to_string();
    harness
        .upload(brand_id, &file_id, workbook.save_to_buffer().unwrap())
        .await;

    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/imports",
        Some(brand_id),
        Some(json!({ "file_id": file_id, "filename": "spring.xlsx" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let job = wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;
    assert_eq!(job["total_rows"], 3);
}

#[tokio::test]
async fn test_define_value_resolves_unmapped_row() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    harness.seed_entity(brand_id, EntityType::Color, "Black").await;
    let job_id = start_import(&harness, brand_id, CRIMSON_CSV).await;
    let job = wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;
    assert_eq!(job["total_rows"], 3);

    let unmapped_uri = format!("/api/v1/imports/{job_id}/unmapped-values");
    let (status, body) = send(&harness, Method::GET, &unmapped_uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["entity_type"], "COLOR");
    assert_eq!(body["items"][0]["raw_value"], "Crimson");
    assert_eq!(body["items"][0]["affected_row_count"], 1);

    let staging_uri = format!("/api/v1/imports/{job_id}/staging?limit=100&offset=0");
    let (_, body) = send(&harness, Method::GET, &staging_uri, Some(brand_id), None).await;
    let statuses: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["resolution_status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["RESOLVED", "UNMAPPED", "RESOLVED"]);

    // 未解決行が残っている間は承認できない
    let approve_uri = format!("/api/v1/imports/{job_id}/approve");
    let (status, _) = send(&harness, Method::POST, &approve_uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let job = wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;
    assert_eq!(job["status"], "VALIDATED");

    let define_uri = format!("/api/v1/imports/{job_id}/values/define");
    let (status, body) = send(
        &harness,
        Method::POST,
        &define_uri,
        Some(brand_id),
        Some(json!({
            "entity_type": "COLOR",
            "raw_value": "Crimson",
            "source_column": "color_name",
            "entity_data": { "entity_type": "COLOR", "name": "Crimson", "hex": "#DC143C" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updated_rows"], 1);

    let (_, body) = send(&harness, Method::GET, &unmapped_uri, Some(brand_id), None).await;
    assert_eq!(body["total"], 0);
    let (_, body) = send(&harness, Method::GET, &staging_uri, Some(brand_id), None).await;
    assert_eq!(body["items"][1]["resolution_status"], "RESOLVED");

    let (status, _) = send(&harness, Method::POST, &approve_uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job = wait_for_status(&harness, brand_id, &job_id, "COMPLETED").await;
    assert_eq!(job["created_rows"], 3);
    assert_eq!(job["failed_rows"], 0);
    assert_eq!(harness.products.product_count(brand_id).await, 3);
}

#[tokio::test]
async fn test_map_to_existing_taxonomy_entry() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    let outerwear = harness
        .seed_taxonomy(EntityType::Category, "Outerwear & Jackets")
        .await;
    let csv = "product_name,sku,category_name\nWool Coat,SKU-1,Outerwear\n";
    let job_id = start_import(&harness, brand_id, csv).await;
    wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;

    let uri = format!("/api/v1/imports/{job_id}/values/map-to-existing");
    let (status, body) = send(
        &harness,
        Method::POST,
        &uri,
        Some(brand_id),
        Some(json!({
            "entity_type": "CATEGORY",
            "raw_value": "Outerwear",
            "source_column": "category_name",
            "entity_id": outerwear
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["entity_id"], outerwear.to_string());
}

#[tokio::test]
async fn test_defining_category_is_unsupported() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    let csv = "product_name,sku,category_name\nWool Coat,SKU-1,Outerwear\n";
    let job_id = start_import(&harness, brand_id, csv).await;
    wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;

    let uri = format!("/api/v1/imports/{job_id}/values/define");
    let (status, _) = send(
        &harness,
        Method::POST,
        &uri,
        Some(brand_id),
        Some(json!({
            "entity_type": "CATEGORY",
            "raw_value": "Outerwear",
            "source_column": "category_name",
            "entity_data": { "entity_type": "CATEGORY", "id": Uuid::new_v4() }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_staging_pages_are_disjoint_and_ordered() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    let mut csv = String::from("product_name,sku\n");
    for i in 1..=5 {
        csv.push_str(&format!("Item {i},SKU-{i}\n"));
    }
    let job_id = start_import(&harness, brand_id, &csv).await;
    wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;

    let mut seen = Vec::new();
    for offset in [0, 2, 4] {
        let uri = format!("/api/v1/imports/{job_id}/staging?limit=2&offset={offset}");
        let (status, body) = send(&harness, Method::GET, &uri, Some(brand_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 5);
        assert_eq!(body["has_more"], offset < 4);
        for row in body["items"].as_array().unwrap() {
            seen.push(row["row_index"].as_i64().unwrap());
        }
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(seen.iter().collect::<BTreeSet<_>>().len(), 5);
}

#[tokio::test]
async fn test_invalid_page_parameters_are_rejected() {
    let harness = TestHarness::new();
    let uri = format!("/api/v1/imports/{}/staging?limit=0", Uuid::new_v4());
    let (status, _) = send(&harness, Method::GET, &uri, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Errors / export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_blocked_rows_are_reported_and_exported() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    harness.seed_entity(brand_id, EntityType::Color, "Black").await;
    let csv = "product_name,sku,color_name,environment_score\n\
Linen Shirt,SKU-1,Black,80\n\
Bad Hat,SKU-2,Black,150\n";
    let job_id = start_import(&harness, brand_id, csv).await;
    wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;

    let errors_uri = format!("/api/v1/imports/{job_id}/errors");
    let (status, body) = send(&harness, Method::GET, &errors_uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["row_index"], 2);
    assert_eq!(body["items"][0]["field"], "environment_score");
    assert_eq!(body["items"][0]["phase"], "VALIDATION");

    let approve_uri = format!("/api/v1/imports/{job_id}/approve");
    let (status, _) = send(&harness, Method::POST, &approve_uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let export_uri = format!("/api/v1/imports/{job_id}/failed-rows/export?format=csv");
    let (status, bytes) = send_raw(&harness, Method::GET, &export_uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("product_name,sku,color_name,environment_score,error_reasons")
    );
    assert!(lines.next().unwrap().starts_with("Bad Hat,SKU-2,Black,150,environment_score:"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_unknown_export_format_is_rejected() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    harness.seed_entity(brand_id, EntityType::Color, "Black").await;
    let job_id = start_import(&harness, brand_id, CRIMSON_CSV).await;
    let uri = format!("/api/v1/imports/{job_id}/failed-rows/export?format=pdf");
    let (status, _) = send(&harness, Method::GET, &uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancel_is_idempotent_and_purges_staging() {
    let harness = TestHarness::new();
    let brand_id = Uuid::new_v4();
    harness.seed_entity(brand_id, EntityType::Color, "Black").await;
    let job_id = start_import(&harness, brand_id, CRIMSON_CSV).await;
    wait_for_status(&harness, brand_id, &job_id, "VALIDATED").await;

    let uri = format!("/api/v1/imports/{job_id}/cancel");
    let (status, body) = send(&harness, Method::POST, &uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = send(&harness, Method::POST, &uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let job_uuid = Uuid::parse_str(&job_id).unwrap();
    assert_eq!(harness.staging.row_count(job_uuid).await, 0);

    let approve_uri = format!("/api/v1/imports/{job_id}/approve");
    let (status, _) = send(&harness, Method::POST, &approve_uri, Some(brand_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
