use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::adapter::handler::AppState;

/// リクエストごとに HTTP メトリクスを記録する。パスはルート定義のテンプレートで集計する。
pub async fn track_http_metrics(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();
    state
        .metrics
        .record_http_request(&method, &path, &status, duration);
    tracing::debug!(
        http.method = %method,
        http.path = %path,
        http.status_code = %status,
        duration_secs = duration,
        "request completed"
    );
    response
}
