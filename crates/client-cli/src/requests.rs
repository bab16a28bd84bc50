//! Ride request lifecycle: send, respond, cancel.
//!
//! Every transition mutates the request first and only then dispatches the
//! notification. A failed notification is logged and reported in the outcome;
//! the status change stays.

use shared::{
    Decision, DispatchKind, NotificationDispatch, RequestStatus, Ride, RideRequest,
    SendRequestBody,
};

use crate::api::RequestApi;
use crate::error::{ClientError, Result};
use crate::session::Session;

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub request_id: i64,
    pub status: RequestStatus,
    /// Whether both parties were notified
    pub notified: bool,
}

pub struct RequestLifecycle<'a, B: RequestApi + ?Sized> {
    backend: &'a B,
    session: &'a Session,
}

impl<'a, B: RequestApi + ?Sized> RequestLifecycle<'a, B> {
    pub fn new(backend: &'a B, session: &'a Session) -> Self {
        Self { backend, session }
    }

    /// Ask to join `ride` as the signed-in user
    pub async fn send(&self, ride: &Ride, message: &str) -> Result<TransitionOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::Validation(
                "Please enter a message for your request".to_string(),
            ));
        }

        let requester_id = self.session.user_id;
        match self.backend.check_request(ride.ride_id, requester_id).await {
            Ok(true) => return Err(ClientError::DuplicateRequest),
            Ok(false) => {}
            // The backend rejects duplicates on its own
            Err(e) => tracing::warn!("Error checking existing request: {}", e),
        }

        let body = SendRequestBody {
            ride_id: ride.ride_id,
            requester_id,
            message: message.to_string(),
            ride_owner_id: ride.user_id,
            pickup_point: ride.pickup_point.clone(),
            dropoff_point: ride.dropoff_point.clone(),
            time_slot: ride.time_slot.clone(),
        };
        let resp = match self.backend.send_request(&body).await {
            Ok(resp) => resp,
            Err(ClientError::Server {
                status: Some(409), ..
            }) => return Err(ClientError::DuplicateRequest),
            Err(e) => return Err(e),
        };
        let request_id = match resp.request_id {
            Some(id) if resp.success => id,
            _ => {
                return Err(ClientError::server(
                    resp.message
                        .unwrap_or_else(|| "Failed to send request".to_string()),
                ))
            }
        };
        tracing::info!("Sent request {} for ride {}", request_id, ride.ride_id);

        let notified = self
            .notify(NotificationDispatch {
                request_id,
                rider_message: "You have received a new ride request from a passenger".to_string(),
                requester_message: format!("Your ride request has been sent to {}", ride.full_name),
                kind: DispatchKind::NewRequest,
            })
            .await;

        Ok(TransitionOutcome {
            request_id,
            status: RequestStatus::Pending,
            notified,
        })
    }

    /// Requests the signed-in user made or received, newest first
    pub async fn list(&self) -> Result<Vec<RideRequest>> {
        let mut requests = self.backend.list_requests(self.session.user_id).await?;
        requests.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.request_id.cmp(&a.request_id))
        });
        Ok(requests)
    }

    async fn find(&self, request_id: i64) -> Result<RideRequest> {
        self.backend
            .list_requests(self.session.user_id)
            .await?
            .into_iter()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| ClientError::NotFound(format!("Request {} not found", request_id)))
    }

    /// Accept or reject a pending request on one of the user's rides
    pub async fn respond(&self, request_id: i64, decision: Decision) -> Result<TransitionOutcome> {
        let request = self.find(request_id).await?;
        if request.ride_owner_id != self.session.user_id {
            return Err(ClientError::NotAllowed(
                "Only the ride owner can respond to this request".to_string(),
            ));
        }
        let status = request.status.transition(decision.status())?;

        let resp = self.backend.update_request(request_id, status).await?;
        if !resp.success {
            return Err(ClientError::server(
                resp.message.unwrap_or_else(|| "Operation failed".to_string()),
            ));
        }
        tracing::info!("Request {} {}", request_id, status);

        let verb = status.as_str();
        let notified = self
            .notify(NotificationDispatch {
                request_id,
                rider_message: format!("You have {} a ride request", verb),
                requester_message: format!("Your ride request has been {}", verb),
                kind: decision.into(),
            })
            .await;

        Ok(TransitionOutcome {
            request_id,
            status,
            notified,
        })
    }

    /// Withdraw one of the user's own pending requests
    pub async fn cancel(&self, request_id: i64) -> Result<TransitionOutcome> {
        let request = self.find(request_id).await?;
        if request.requester_id != self.session.user_id {
            return Err(ClientError::NotAllowed(
                "Only the requester can cancel this request".to_string(),
            ));
        }
        let status = request.status.transition(RequestStatus::Cancelled)?;

        let resp = self.backend.cancel_request(request_id).await?;
        if !resp.success {
            return Err(ClientError::server(
                resp.message
                    .unwrap_or_else(|| "Failed to cancel request".to_string()),
            ));
        }
        tracing::info!("Request {} cancelled", request_id);

        let notified = self
            .notify(NotificationDispatch {
                request_id,
                rider_message: "A rider has cancelled their request".to_string(),
                requester_message: "You have cancelled your ride request".to_string(),
                kind: DispatchKind::Cancel,
            })
            .await;

        Ok(TransitionOutcome {
            request_id,
            status,
            notified,
        })
    }

    async fn notify(&self, dispatch: NotificationDispatch) -> bool {
        match self.backend.dispatch_notification(&dispatch).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Request {} updated but notification failed: {}",
                    dispatch.request_id,
                    e
                );
                false
            }
        }
    }
}
