use axum::{
    extract::{Path, State},
    Json,
};
use shared::{
    CancelRequestBody, CheckRequestResponse, RequestStatus, RequestsResponse, RideRequest,
    SendRequestBody, SendRequestResponse, StatusResponse, UpdateRequestBody,
};

use super::auth::AuthUser;
use crate::{
    db::{ride_status, RequestRow},
    error::AppError,
    state::AppState,
};

const DUPLICATE_REQUEST: &str = "You have already sent a request for this ride.";

async fn load_request(state: &AppState, request_id: i64) -> Result<(RequestRow, RequestStatus), AppError> {
    let request = state
        .db
        .get_request(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))?;
    let status: RequestStatus = request
        .status
        .parse()
        .map_err(AppError::Internal)?;
    Ok((request, status))
}

/// Ask to join a ride. At most one pending request per (ride, requester).
/// POST /rides/sendRequest
pub async fn send_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut body): Json<SendRequestBody>,
) -> Result<Json<SendRequestResponse>, AppError> {
    auth.ensure_self(body.requester_id)?;
    if body.message.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Please write a message to the captain.".to_string(),
        ));
    }

    let ride = state
        .db
        .get_ride(body.ride_id)
        .await?
        .filter(|r| r.status == ride_status::ACTIVE)
        .ok_or_else(|| AppError::NotFound("This ride is no longer available".to_string()))?;
    if ride.user_id == auth.user_id {
        return Err(AppError::BadRequest(
            "You cannot request your own ride.".to_string(),
        ));
    }

    // The stored route is the ride's, whatever the client sent
    body.pickup_point = ride.pickup_point;
    body.dropoff_point = ride.dropoff_point;
    body.time_slot = ride.time_slot;

    let request_id = state
        .db
        .create_request(&body, ride.user_id)
        .await?
        .ok_or_else(|| AppError::Conflict(DUPLICATE_REQUEST.to_string()))?;

    tracing::info!(
        "User {} requested ride {} (request {})",
        body.requester_id,
        body.ride_id,
        request_id
    );
    Ok(Json(SendRequestResponse {
        success: true,
        request_id: Some(request_id),
        message: Some("Request sent successfully".to_string()),
    }))
}

/// GET /rides/checkRequest/:ride_id/:user_id
pub async fn check_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((ride_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<CheckRequestResponse>, AppError> {
    auth.ensure_self(user_id)?;
    let exists = state.db.pending_request_exists(ride_id, user_id).await?;
    Ok(Json(CheckRequestResponse { exists }))
}

/// Requests the user sent and requests on rides they own
/// GET /rides/getRequests/:user_id
pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<RequestsResponse>, AppError> {
    auth.ensure_self(user_id)?;
    let requests = state
        .db
        .list_requests_for_user(user_id)
        .await?
        .into_iter()
        .map(RideRequest::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(RequestsResponse {
        success: true,
        requests,
    }))
}

/// Ride owner accepts or rejects a pending request
/// POST /rides/updateRequest
pub async fn update_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateRequestBody>,
) -> Result<Json<StatusResponse>, AppError> {
    if !matches!(body.status, RequestStatus::Accepted | RequestStatus::Rejected) {
        return Err(AppError::BadRequest(
            "Status must be accepted or rejected".to_string(),
        ));
    }

    let (request, current) = load_request(&state, body.request_id).await?;
    if request.ride_owner_id != auth.user_id {
        return Err(AppError::Forbidden(
            "Only the ride owner can respond to this request".to_string(),
        ));
    }
    let next = current.transition(body.status)?;

    let moved = if next == RequestStatus::Accepted {
        state.db.accept_request(request.request_id).await?
    } else {
        state
            .db
            .transition_request(request.request_id, current, next)
            .await?
    };
    if !moved {
        let (_, now) = load_request(&state, request.request_id).await?;
        if now != RequestStatus::Pending {
            return Err(AppError::Conflict(
                "This request was updated by someone else".to_string(),
            ));
        }
        return Err(match state.db.get_ride(request.ride_id).await? {
            Some(_) => AppError::Conflict("This ride is already full".to_string()),
            None => AppError::Conflict("This ride has been deleted".to_string()),
        });
    }

    tracing::info!("Request {} is now {}", request.request_id, next);
    Ok(Json(StatusResponse::ok_with(format!("Request {}", next))))
}

/// Requester withdraws a pending request
/// POST /rides/cancelRequest
pub async fn cancel_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CancelRequestBody>,
) -> Result<Json<StatusResponse>, AppError> {
    let (request, current) = load_request(&state, body.request_id).await?;
    if request.requester_id != auth.user_id {
        return Err(AppError::Forbidden(
            "Only the requester can cancel this request".to_string(),
        ));
    }
    let next = current.transition(RequestStatus::Cancelled)?;

    if !state
        .db
        .transition_request(request.request_id, current, next)
        .await?
    {
        return Err(AppError::Conflict(
            "This request was updated by someone else".to_string(),
        ));
    }

    tracing::info!("Request {} cancelled by its requester", request.request_id);
    Ok(Json(StatusResponse::ok_with("Request cancelled")))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn request_body(ride_id: i64, requester: i64, owner: i64) -> Value {
        json!({
            "rideId": ride_id, "requesterId": requester, "message": "Room for one?",
            "rideOwnerId": owner, "pickup_point": "Elsewhere",
            "dropoff_point": "Nowhere", "time_slot": "01:00 AM",
        })
    }

    #[tokio::test]
    async fn test_one_pending_request_per_rider() {
        let app = TestApp::new().await;
        let (owner, owner_token, _, ride_id) = app.captain_with_ride("3001111111", "ABC-123").await;
        let (rider, rider_token) = app.register("3002222222", "Rider").await;

        let check = format!("/rides/checkRequest/{}/{}", ride_id, rider);
        let (_, body) = app.get(&check, Some(&rider_token)).await;
        assert_eq!(body["exists"], json!(false));

        let (status, body) = app
            .post("/rides/sendRequest", Some(&rider_token), request_body(ride_id, rider, owner))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let request_id = body["requestId"].as_i64().unwrap();

        let (_, body) = app.get(&check, Some(&rider_token)).await;
        assert_eq!(body["exists"], json!(true));

        let (status, body) = app
            .post("/rides/sendRequest", Some(&rider_token), request_body(ride_id, rider, owner))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], json!("You have already sent a request for this ride."));

        // Route is snapshotted from the ride, visible to both sides
        let (_, body) = app
            .get(&format!("/rides/getRequests/{}", owner), Some(&owner_token))
            .await;
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["request_id"], json!(request_id));
        assert_eq!(requests[0]["pickup_point"], json!("Gulshan"));
        assert_eq!(requests[0]["requester_name"], json!("Rider"));
        assert_eq!(requests[0]["status"], json!("pending"));

        // Cancelled requests free the slot for a new one
        let (status, _) = app
            .post("/rides/cancelRequest", Some(&rider_token), json!({ "requestId": request_id }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .post("/rides/sendRequest", Some(&rider_token), request_body(ride_id, rider, owner))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_send_request_rejections() {
        let app = TestApp::new().await;
        let (owner, owner_token, _, ride_id) = app.captain_with_ride("3001111111", "ABC-123").await;
        let (rider, rider_token) = app.register("3002222222", "Rider").await;

        // Own ride
        let (status, _) = app
            .post("/rides/sendRequest", Some(&owner_token), request_body(ride_id, owner, owner))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Acting for someone else
        let (status, _) = app
            .post("/rides/sendRequest", Some(&owner_token), request_body(ride_id, rider, owner))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Missing ride
        let (status, _) = app
            .post("/rides/sendRequest", Some(&rider_token), request_body(9999, rider, owner))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Empty message
        let mut body = request_body(ride_id, rider, owner);
        body["message"] = json!("   ");
        let (status, _) = app.post("/rides/sendRequest", Some(&rider_token), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // No token
        let (status, _) = app
            .post("/rides/sendRequest", None, request_body(ride_id, rider, owner))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_only_owner_responds() {
        let app = TestApp::new().await;
        let (owner, owner_token, _, ride_id) = app.captain_with_ride("3001111111", "ABC-123").await;
        let (rider, rider_token) = app.register("3002222222", "Rider").await;

        let (_, body) = app
            .post("/rides/sendRequest", Some(&rider_token), request_body(ride_id, rider, owner))
            .await;
        let request_id = body["requestId"].as_i64().unwrap();

        let (status, _) = app
            .post(
                "/rides/updateRequest",
                Some(&rider_token),
                json!({ "requestId": request_id, "status": "accepted" }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .post(
                "/rides/updateRequest",
                Some(&owner_token),
                json!({ "requestId": request_id, "status": "cancelled" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(
                "/rides/updateRequest",
                Some(&owner_token),
                json!({ "requestId": request_id, "status": "accepted" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        // Terminal states stay terminal
        let (status, body) = app
            .post(
                "/rides/updateRequest",
                Some(&owner_token),
                json!({ "requestId": request_id, "status": "rejected" }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], json!("Request is already accepted"));

        let (status, _) = app
            .post("/rides/cancelRequest", Some(&rider_token), json!({ "requestId": request_id }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_seats_limit_acceptances() {
        let app = TestApp::new().await;
        // The test ride offers a single seat
        let (owner, owner_token, _, ride_id) = app.captain_with_ride("3001111111", "ABC-123").await;
        let (first, first_token) = app.register("3002222222", "First").await;
        let (second, second_token) = app.register("3003333333", "Second").await;

        let (_, body) = app
            .post("/rides/sendRequest", Some(&first_token), request_body(ride_id, first, owner))
            .await;
        let first_request = body["requestId"].as_i64().unwrap();
        let (_, body) = app
            .post("/rides/sendRequest", Some(&second_token), request_body(ride_id, second, owner))
            .await;
        let second_request = body["requestId"].as_i64().unwrap();

        let accept = |id: i64| json!({ "requestId": id, "status": "accepted" });
        let (status, _) = app
            .post("/rides/updateRequest", Some(&owner_token), accept(first_request))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .post("/rides/updateRequest", Some(&owner_token), accept(second_request))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], json!("This ride is already full"));

        // Rejecting is still possible
        let (status, _) = app
            .post(
                "/rides/updateRequest",
                Some(&owner_token),
                json!({ "requestId": second_request, "status": "rejected" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_only_requester_cancels() {
        let app = TestApp::new().await;
        let (owner, owner_token, _, ride_id) = app.captain_with_ride("3001111111", "ABC-123").await;
        let (rider, rider_token) = app.register("3002222222", "Rider").await;

        let (_, body) = app
            .post("/rides/sendRequest", Some(&rider_token), request_body(ride_id, rider, owner))
            .await;
        let request_id = body["requestId"].as_i64().unwrap();

        let (status, _) = app
            .post("/rides/cancelRequest", Some(&owner_token), json!({ "requestId": request_id }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .post("/rides/cancelRequest", Some(&rider_token), json!({ "requestId": request_id }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app
            .get(&format!("/rides/getRequests/{}", rider), Some(&rider_token))
            .await;
        assert_eq!(body["requests"][0]["status"], json!("cancelled"));
    }
}
