use axum::{extract::State, Extension};

use crate::auth::AuthUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::{Json, Path};
use crate::models::Notification;

/// `GET /notifications` - the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Notification>>> {
    let conn = state.db.get()?;
    let notifications = queries::list_notifications_for_user(&conn, &auth.user_id)?;
    Ok(Json(notifications))
}

#[derive(Debug, serde::Serialize)]
pub struct MarkReadResponse {
    pub marked: bool,
}

/// `POST /notifications/{id}/read` - mark one of the caller's
/// notifications as read.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(notification_id): Path<String>,
) -> Result<Json<MarkReadResponse>> {
    let conn = state.db.get()?;

    if !queries::mark_notification_read(&conn, &notification_id, &auth.user_id)? {
        return Err(AppError::NotFound(msg::NOTIFICATION_NOT_FOUND.into()));
    }

    Ok(Json(MarkReadResponse { marked: true }))
}
