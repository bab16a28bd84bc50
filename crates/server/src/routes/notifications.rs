use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{DispatchKind, NotificationDispatch, NotificationsResponse, PushKind, PushPayload, StatusResponse};

use super::auth::AuthUser;
use crate::{db::Database, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct OutboxQuery {
    #[serde(default)]
    pub after: Option<i64>,
}

fn dispatch_title(kind: DispatchKind) -> &'static str {
    match kind {
        DispatchKind::NewRequest => "New Ride Request",
        DispatchKind::Accept => "Request Accepted",
        DispatchKind::Reject => "Request Rejected",
        DispatchKind::Cancel => "Request Cancelled",
    }
}

/// Queue one push per recipient. Delivery to devices happens outside this
/// server; clients poll the outbox.
pub async fn deliver(db: &Database, recipients: &[i64], payload: &PushPayload) -> anyhow::Result<()> {
    for user_id in recipients {
        let id = db.push_notification(*user_id, payload).await?;
        tracing::debug!("Queued {} notification {} for user {}", payload.kind, id, user_id);
    }
    Ok(())
}

/// Tell everyone holding a live request that a ride changed
pub async fn notify_ride_update(db: &Database, ride_id: i64, recipients: &[i64], body: String) -> anyhow::Result<()> {
    if recipients.is_empty() {
        return Ok(());
    }
    let mut payload = PushPayload::new(PushKind::RideUpdate, body);
    payload.ride_id = Some(ride_id);
    payload.title = Some("Ride Update".to_string());
    deliver(db, recipients, &payload).await?;
    tracing::info!("Ride {} update sent to {} requester(s)", ride_id, recipients.len());
    Ok(())
}

/// Fan a request transition out to the ride owner and the requester
/// POST /notifications/send
pub async fn send(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(dispatch): Json<NotificationDispatch>,
) -> Result<Json<StatusResponse>, AppError> {
    let request = state
        .db
        .get_request(dispatch.request_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))?;
    if auth.user_id != request.ride_owner_id && auth.user_id != request.requester_id {
        return Err(AppError::Forbidden(
            "You are not part of this request".to_string(),
        ));
    }

    let title = dispatch_title(dispatch.kind);
    let kind = dispatch.kind.push_kind();
    let for_user = |body: &str| {
        let mut payload = PushPayload::new(kind, body);
        payload.request_id = Some(request.request_id);
        payload.ride_id = Some(request.ride_id);
        payload.title = Some(title.to_string());
        payload
    };

    deliver(&state.db, &[request.ride_owner_id], &for_user(&dispatch.rider_message)).await?;
    deliver(&state.db, &[request.requester_id], &for_user(&dispatch.requester_message)).await?;

    tracing::info!("Dispatched {:?} for request {}", dispatch.kind, request.request_id);
    Ok(Json(StatusResponse::ok_with("Notification sent")))
}

/// GET /notifications/:user_id?after=
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Query(query): Query<OutboxQuery>,
) -> Result<Json<NotificationsResponse>, AppError> {
    auth.ensure_self(user_id)?;
    let rows = state
        .db
        .notifications_after(user_id, query.after.unwrap_or(0))
        .await?;

    Ok(Json(NotificationsResponse {
        success: true,
        notifications: rows.into_iter().map(PushPayload::from).collect(),
    }))
}
