use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use agrisk_core::FarmId;
use agrisk_infra::services::PageRequest;
use agrisk_inventory::RiskFilter;

use crate::app::extract::ApiQuery;
use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/risk/summary", get(risk_summary))
        .route("/risk/lots", get(risk_lots))
        .route("/on-hand", get(on_hand))
        .route("/on-hand/locations", get(on_hand_by_location))
}

/// GET /admin/inventory/risk/summary?windowDays=30&includeExpiring=true&topN=5
pub async fn risk_summary(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<dto::RiskSummaryQuery>,
) -> axum::response::Response {
    match services
        .engine()
        .risk_summary(query.window_days, query.include_expiring, query.top_n)
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/inventory/risk/lots?farmId=X&status=EXPIRING&windowDays=30&page=0&size=50
///
/// `status` defaults to RISK (expired or expiring).
pub async fn risk_lots(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<dto::RiskLotsQuery>,
) -> axum::response::Response {
    let farm_id: Option<FarmId> = match dto::parse_opt(query.farm_id.as_deref()) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let filter: RiskFilter = match dto::parse_opt(query.status.as_deref()) {
        Ok(v) => v.unwrap_or(RiskFilter::Risk),
        Err(e) => return errors::domain_error_to_response(e),
    };
    let page = match PageRequest::new(query.page, query.size) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .engine()
        .list_risk_lots(farm_id, filter, query.window_days, page)
        .await
    {
        Ok(lots) => (StatusCode::OK, Json(lots)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/inventory/on-hand?farmId=X&q=seed
pub async fn on_hand(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<dto::OnHandQuery>,
) -> axum::response::Response {
    let farm_id: Option<FarmId> = match dto::parse_opt(query.farm_id.as_deref()) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    match services.engine().list_on_hand_lots_with_detail(farm_id, q).await {
        Ok(lots) => (StatusCode::OK, Json(lots)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// GET /admin/inventory/on-hand/locations?farmId=X
pub async fn on_hand_by_location(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<dto::OnHandQuery>,
) -> axum::response::Response {
    let farm_id: Option<FarmId> = match dto::parse_opt(query.farm_id.as_deref()) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().list_on_hand_by_location(farm_id).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
