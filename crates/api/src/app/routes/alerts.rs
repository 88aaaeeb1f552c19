use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use agrisk_alerts::{Alert, SendRequest};
use agrisk_core::AlertId;
use agrisk_infra::error::EngineResult;
use agrisk_infra::services::PageRequest;

use crate::app::extract::{ApiJson, ApiQuery, OptionalJson};
use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_alerts))
        .route("/refresh", post(refresh_alerts))
        .route("/:id", get(get_alert))
        .route("/:id/send", post(send_alert))
        .route("/:id/notifications", get(alert_notifications))
        .route("/:id/acknowledge", post(acknowledge_alert))
        .route("/:id/resolve", post(resolve_alert))
        .route("/:id/dismiss", post(dismiss_alert))
}

fn parse_alert_id(id: &str) -> Result<AlertId, axum::response::Response> {
    id.parse().map_err(errors::domain_error_to_response)
}

/// GET /admin/alerts?farmId=X&status=NEW&type=INVENTORY_EXPIRED&page=0&size=50
pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<dto::AlertListQuery>,
) -> axum::response::Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let page = match PageRequest::new(query.page, query.size) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().list_alerts(filter, page).await {
        Ok(alerts) => (StatusCode::OK, Json(alerts)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let alert_id = match parse_alert_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    alert_response(services.engine().get_alert(alert_id).await)
}

/// POST /admin/alerts/refresh  body: `{ "windowDays": 30 }` (optional; an empty body uses the defaults)
///
/// Scans every farm; per-farm failures are reported in the body, not as an error status.
pub async fn refresh_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    OptionalJson(body): OptionalJson<dto::RefreshRequest>,
) -> axum::response::Response {
    let window_days = body.and_then(|b| b.window_days);

    match services.engine().refresh(window_days).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /admin/alerts/:id/send  body: `{ "channel", "recipientMode", "recipientFarmerIds"? }`
pub async fn send_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SendAlertRequest>,
) -> axum::response::Response {
    let alert_id = match parse_alert_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request = match body
        .recipient_ids()
        .and_then(|ids| SendRequest::parse(&body.channel, &body.recipient_mode, ids))
    {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    alert_response(services.engine().send_alert(alert_id, request).await)
}

pub async fn alert_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let alert_id = match parse_alert_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine().notifications_for_alert(alert_id).await {
        Ok(notifications) => (StatusCode::OK, Json(notifications)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn acknowledge_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match parse_alert_id(&id) {
        Ok(alert_id) => alert_response(services.engine().acknowledge_alert(alert_id).await),
        Err(resp) => resp,
    }
}

pub async fn resolve_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match parse_alert_id(&id) {
        Ok(alert_id) => alert_response(services.engine().resolve_alert(alert_id).await),
        Err(resp) => resp,
    }
}

pub async fn dismiss_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match parse_alert_id(&id) {
        Ok(alert_id) => alert_response(services.engine().dismiss_alert(alert_id).await),
        Err(resp) => resp,
    }
}

fn alert_response(result: EngineResult<Alert>) -> axum::response::Response {
    match result {
        Ok(alert) => (StatusCode::OK, Json(alert)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
