use serde::{Deserialize, Serialize};

use crate::models::{Decision, RequestStatus, Ride, RideRequest, Vehicle, VehicleType};

// ============================================================================
// Generic envelopes
// ============================================================================

/// Response shape shared by every mutating endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// First registration step: phone + email, answers with the new user id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub phone_number: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub phone_number: String,
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsRequest {
    pub phone_number: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Phone number or email
    pub phone_number: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expo_push_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    pub token: String,
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
}

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImageResponse {
    #[serde(default)]
    pub profile_image: Option<String>,
}

// ============================================================================
// Rides & vehicles
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RidesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rides: Option<Vec<Ride>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RideResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ride: Option<Ride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRide {
    #[serde(deserialize_with = "crate::de::id")]
    pub vehicle_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
    pub pickup_point: String,
    pub dropoff_point: String,
    pub passengers: i64,
    /// "hh:mm AM/PM"
    pub ride_time: String,
    /// "YYYY-MM-DD"
    pub ride_date: String,
    pub price: f64,
    #[serde(default)]
    pub ac_enabled: bool,
    #[serde(default)]
    pub quiet_ride: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideUpdate {
    #[serde(deserialize_with = "crate::de::id")]
    pub ride_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub vehicle_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
    pub pickup_point: String,
    pub dropoff_point: String,
    pub passengers: i64,
    pub time_slot: String,
    pub ride_date: String,
    pub price: f64,
    #[serde(default)]
    pub ac_enabled: bool,
    #[serde(default)]
    pub quiet_ride: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRideRequest {
    #[serde(deserialize_with = "crate::de::id")]
    pub id: i64,
}

/// Re-post a previous ride with one of the owner's vehicles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRideRequest {
    #[serde(deserialize_with = "crate::de::id")]
    pub ride_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub vehicle_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehiclesResponse {
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicle {
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
    pub vehicle_type: VehicleType,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub whatsapp_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Ride requests
// ============================================================================

/// Passenger -> backend: ask to join a ride. Carries a snapshot of the route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestBody {
    #[serde(deserialize_with = "crate::de::id")]
    pub ride_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub requester_id: i64,
    pub message: String,
    #[serde(deserialize_with = "crate::de::id")]
    pub ride_owner_id: i64,
    #[serde(rename = "pickup_point")]
    pub pickup_point: String,
    #[serde(rename = "dropoff_point")]
    pub dropoff_point: String,
    #[serde(rename = "time_slot")]
    pub time_slot: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "crate::de::opt_id")]
    pub request_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckRequestResponse {
    #[serde(default)]
    pub exists: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub requests: Vec<RideRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestBody {
    #[serde(deserialize_with = "crate::de::id")]
    pub request_id: i64,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequestBody {
    #[serde(deserialize_with = "crate::de::id")]
    pub request_id: i64,
}

// ============================================================================
// Notifications
// ============================================================================

/// What happened, as told to the notification dispatch endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    NewRequest,
    Accept,
    Reject,
    Cancel,
}

impl DispatchKind {
    /// The push type the recipients receive for this event
    pub fn push_kind(&self) -> PushKind {
        match self {
            DispatchKind::NewRequest => PushKind::NewRequest,
            DispatchKind::Accept | DispatchKind::Reject | DispatchKind::Cancel => {
                PushKind::RequestUpdate
            }
        }
    }
}

impl From<Decision> for DispatchKind {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => DispatchKind::Accept,
            Decision::Reject => DispatchKind::Reject,
        }
    }
}

/// Client -> backend: notify both parties of a request transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDispatch {
    #[serde(deserialize_with = "crate::de::id")]
    pub request_id: i64,
    /// Text for the ride owner
    pub rider_message: String,
    /// Text for the passenger who made the request
    pub requester_message: String,
    #[serde(rename = "type")]
    pub kind: DispatchKind,
}

/// Push types the app knows how to route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    NewRequest,
    RequestUpdate,
    RideUpdate,
}

impl PushKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushKind::NewRequest => "new_request",
            PushKind::RequestUpdate => "request_update",
            PushKind::RideUpdate => "ride_update",
        }
    }

    pub fn from_type(value: &str) -> Option<Self> {
        match value {
            "new_request" => Some(PushKind::NewRequest),
            "request_update" => Some(PushKind::RequestUpdate),
            "ride_update" => Some(PushKind::RideUpdate),
            _ => None,
        }
    }
}

/// Push notification body delivered to a device. `type` is kept as a raw
/// string so unknown kinds survive deserialization and can be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    #[serde(default, deserialize_with = "crate::de::opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "crate::de::opt_id", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
    #[serde(default, deserialize_with = "crate::de::opt_id", skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl PushPayload {
    pub fn new(kind: PushKind, body: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.as_str().to_string(),
            request_id: None,
            ride_id: None,
            title: None,
            body: body.into(),
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub notifications: Vec<PushPayload>,
}

// ============================================================================
// Tests
// ============================================================================
