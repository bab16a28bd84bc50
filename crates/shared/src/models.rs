use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Roles
// ============================================================================

/// The mode a user is currently operating in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Offers rides
    Captain,
    /// Requests to join rides
    Passenger,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Captain => "Captain",
            Role::Passenger => "Passenger",
        }
    }

    /// Parse a persisted role value. Only the exact stored spellings count.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "Captain" => Some(Role::Captain),
            "Passenger" => Some(Role::Passenger),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Role::Captain => Role::Passenger,
            Role::Passenger => Role::Captain,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected captain or passenger)")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "captain" => Ok(Role::Captain),
            "passenger" => Ok(Role::Passenger),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

// ============================================================================
// Rides
// ============================================================================

/// A driver-offered trip as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    #[serde(deserialize_with = "crate::de::id")]
    pub ride_id: i64,
    /// Owner (captain) of the ride
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "crate::de::opt_id")]
    pub vehicle_id: Option<i64>,
    pub pickup_point: String,
    pub dropoff_point: String,
    #[serde(deserialize_with = "crate::de::id")]
    pub passengers: i64,
    /// Localized "hh:mm AM/PM"
    pub time_slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ride_date: Option<String>,
    #[serde(deserialize_with = "crate::de::decimal")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub full_name: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub whatsapp_number: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub vehicle_model: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub vehicle_plate: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub vehicle_type: String,
    #[serde(default, deserialize_with = "crate::de::flag")]
    pub ac_enabled: bool,
    #[serde(default, deserialize_with = "crate::de::flag")]
    pub quiet_ride: bool,
    /// Relative path of the owner's profile image; empty when unknown
    #[serde(default, deserialize_with = "crate::de::string")]
    pub profile_image: String,
}

// ============================================================================
// Ride requests
// ============================================================================

/// Lifecycle state of a ride request. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Validate a transition out of this state
    pub fn transition(self, to: RequestStatus) -> Result<RequestStatus, InvalidTransition> {
        match (self, to) {
            (RequestStatus::Pending, RequestStatus::Accepted)
            | (RequestStatus::Pending, RequestStatus::Rejected)
            | (RequestStatus::Pending, RequestStatus::Cancelled) => Ok(to),
            _ => Err(InvalidTransition { from: self, to }),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            "cancelled" | "canceled" => Ok(RequestStatus::Cancelled),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request is {from}, cannot become {to}")]
pub struct InvalidTransition {
    pub from: RequestStatus,
    pub to: RequestStatus,
}

/// Ride owner's answer to a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
        }
    }

    pub fn status(&self) -> RequestStatus {
        match self {
            Decision::Accept => RequestStatus::Accepted,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

/// A passenger's application to join a ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    #[serde(deserialize_with = "crate::de::id")]
    pub request_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub ride_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub requester_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub ride_owner_id: i64,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub requester_name: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub message: String,
    pub status: RequestStatus,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub pickup_point: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub dropoff_point: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub time_slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// ============================================================================
// Vehicles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleType {
    Car,
    Bike,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "Car",
            VehicleType::Bike => "Bike",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Car" => Ok(VehicleType::Car),
            "Bike" => Ok(VehicleType::Bike),
            _ => Err("Vehicle type must be either \"Car\" or \"Bike\".".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(deserialize_with = "crate::de::id")]
    pub vehicle_id: i64,
    #[serde(deserialize_with = "crate::de::id")]
    pub user_id: i64,
    pub vehicle_type: VehicleType,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub whatsapp_number: String,
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Badge {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Badge {
    /// Unknown badge names fall back to Bronze
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "silver" => Badge::Silver,
            "gold" => Badge::Gold,
            "platinum" => Badge::Platinum,
            _ => Badge::Bronze,
        }
    }
}

fn lenient_badge<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Badge, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|b| Badge::parse_lenient(&b))
        .unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    #[serde(default)]
    pub total_rides: i64,
    #[serde(default, alias = "moneyEarned")]
    pub money_saved: f64,
    #[serde(default)]
    pub trees_planted: i64,
}

/// User profile as shown on the menu and profile screens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default = "default_profile_name")]
    pub name: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub bio: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub email: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub phone: String,
    #[serde(default, deserialize_with = "crate::de::string")]
    pub profile_image: String,
    #[serde(default)]
    pub stats: ProfileStats,
    #[serde(default, deserialize_with = "lenient_badge")]
    pub badge: Badge,
    #[serde(default)]
    pub rating: f64,
}

fn default_profile_name() -> String {
    "User".to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
            bio: String::new(),
            email: String::new(),
            phone: String::new(),
            profile_image: String::new(),
            stats: ProfileStats::default(),
            badge: Badge::Bronze,
            rating: 0.0,
        }
    }
}

/// Join a server-relative image path onto the server's base URL
pub fn image_url(base_url: &str, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    }
    Some(format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_stored_is_exact() {
        assert_eq!(Role::from_stored("Captain"), Some(Role::Captain));
        assert_eq!(Role::from_stored("Passenger"), Some(Role::Passenger));
        assert_eq!(Role::from_stored("captain"), None);
        assert_eq!(Role::from_stored(""), None);
    }

    #[test]
    fn test_role_from_str_is_case_insensitive() {
        assert_eq!("CAPTAIN".parse::<Role>().unwrap(), Role::Captain);
        assert_eq!(" passenger ".parse::<Role>().unwrap(), Role::Passenger);
        assert!("driver".parse::<Role>().is_err());
        assert_eq!(Role::Captain.toggled(), Role::Passenger);
    }

    #[test]
    fn test_ride_deserializes_loose_backend_types() {
        let json = r#"{
            "ride_id": 12,
            "user_id": "3",
            "vehicle_id": 4,
            "pickup_point": "Gulshan",
            "dropoff_point": "Saddar",
            "passengers": 3,
            "time_slot": "08:30 AM",
            "price": "250.00",
            "status": "active",
            "full_name": "Ali",
            "whatsapp_number": null,
            "vehicle_model": "Civic",
            "vehicle_plate": "ABC-123",
            "vehicle_type": "Car",
            "ac_enabled": 1,
            "quiet_ride": 0
        }"#;
        let ride: Ride = serde_json::from_str(json).unwrap();
        assert_eq!(ride.user_id, 3);
        assert!((ride.price - 250.0).abs() < f64::EPSILON);
        assert!(ride.ac_enabled);
        assert!(!ride.quiet_ride);
        assert_eq!(ride.whatsapp_number, "");
        assert_eq!(ride.profile_image, "");
    }

    #[test]
    fn test_request_status_transitions() {
        let pending = RequestStatus::Pending;
        assert_eq!(pending.transition(RequestStatus::Accepted), Ok(RequestStatus::Accepted));
        assert_eq!(pending.transition(RequestStatus::Cancelled), Ok(RequestStatus::Cancelled));
        assert!(pending.transition(RequestStatus::Pending).is_err());

        for terminal in [RequestStatus::Accepted, RequestStatus::Rejected, RequestStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for to in [RequestStatus::Accepted, RequestStatus::Rejected, RequestStatus::Cancelled] {
                assert!(terminal.transition(to).is_err());
            }
        }
    }

    #[test]
    fn test_request_status_serialization() {
        assert_eq!(serde_json::to_string(&RequestStatus::Cancelled).unwrap(), "\"cancelled\"");
        let status: RequestStatus = serde_json::from_str("\"accepted\"").unwrap();
        assert_eq!(status, RequestStatus::Accepted);
        assert_eq!("canceled".parse::<RequestStatus>().unwrap(), RequestStatus::Cancelled);
    }

    #[test]
    fn test_decision_maps_to_status() {
        assert_eq!(Decision::Accept.status(), RequestStatus::Accepted);
        assert_eq!(Decision::Reject.status(), RequestStatus::Rejected);
    }

    #[test]
    fn test_vehicle_type_parse() {
        assert_eq!("Car".parse::<VehicleType>().unwrap(), VehicleType::Car);
        assert!("Truck".parse::<VehicleType>().is_err());
    }

    #[test]
    fn test_profile_defaults_and_aliases() {
        let profile: Profile = serde_json::from_str(
            r#"{"stats":{"totalRides":5,"moneyEarned":120.5},"badge":"gold","rating":4.5}"#,
        )
        .unwrap();
        assert_eq!(profile.name, "User");
        assert_eq!(profile.stats.total_rides, 5);
        assert!((profile.stats.money_saved - 120.5).abs() < f64::EPSILON);
        assert_eq!(profile.badge, Badge::Gold);

        let profile: Profile = serde_json::from_str(r#"{"badge":"Diamond"}"#).unwrap();
        assert_eq!(profile.badge, Badge::Bronze);
    }

    #[test]
    fn test_image_url() {
        assert_eq!(image_url("http://host:8080/", ""), None);
        assert_eq!(
            image_url("http://host:8080/", "/uploads/a.jpg").as_deref(),
            Some("http://host:8080/uploads/a.jpg")
        );
        assert_eq!(
            image_url("http://host", "https://cdn/x.png").as_deref(),
            Some("https://cdn/x.png")
        );
    }
}
