use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use agrisk_core::{NotificationId, UserId};
use agrisk_infra::services::PageRequest;

use crate::app::extract::ApiQuery;
use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:id/notifications", get(list_notifications))
        .route("/:id/notifications/:nid/read", post(mark_read))
}

/// GET /users/:id/notifications?unreadOnly=true&page=0&size=50
pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<dto::NotificationsQuery>,
) -> axum::response::Response {
    let user_id: UserId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let page = match PageRequest::new(query.page, query.size) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .engine()
        .notifications_for_user(user_id, query.unread_only.unwrap_or(false), page)
        .await
    {
        Ok(inbox) => (StatusCode::OK, Json(inbox)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// POST /users/:id/notifications/:nid/read
pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, nid)): Path<(String, String)>,
) -> axum::response::Response {
    let user_id: UserId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let notification_id: NotificationId = match nid.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .engine()
        .mark_notification_read(notification_id, user_id)
        .await
    {
        Ok(notification) => (StatusCode::OK, Json(notification)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
