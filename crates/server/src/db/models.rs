use anyhow::{anyhow, Result};
use shared::{Badge, PushPayload, Ride, RideRequest, Vehicle, VehicleType};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub phone_number: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub verified: bool,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub push_token: Option<String>,
    pub rating: f64,
    pub badge: String,
    pub created_at: Option<String>,
}

impl User {
    /// Registration is finished once a password has been set
    pub fn is_registered(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn badge(&self) -> Badge {
        Badge::parse_lenient(&self.badge)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VehicleRow {
    pub vehicle_id: i64,
    pub user_id: i64,
    pub vehicle_type: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub whatsapp_number: String,
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = anyhow::Error;

    fn try_from(row: VehicleRow) -> Result<Self> {
        Ok(Vehicle {
            vehicle_id: row.vehicle_id,
            user_id: row.user_id,
            vehicle_type: row.vehicle_type.parse::<VehicleType>().map_err(|e| anyhow!(e))?,
            vehicle_model: row.vehicle_model,
            vehicle_plate: row.vehicle_plate,
            whatsapp_number: row.whatsapp_number,
        })
    }
}

/// Ride joined with its owner and vehicle
#[derive(Debug, Clone, FromRow)]
pub struct RideRow {
    pub ride_id: i64,
    pub user_id: i64,
    pub vehicle_id: Option<i64>,
    pub pickup_point: String,
    pub dropoff_point: String,
    pub passengers: i64,
    pub time_slot: String,
    pub ride_date: Option<String>,
    pub price: f64,
    pub status: String,
    pub ac_enabled: bool,
    pub quiet_ride: bool,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
    pub whatsapp_number: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_plate: Option<String>,
    pub vehicle_type: Option<String>,
}

impl From<RideRow> for Ride {
    fn from(row: RideRow) -> Self {
        Ride {
            ride_id: row.ride_id,
            user_id: row.user_id,
            vehicle_id: row.vehicle_id,
            pickup_point: row.pickup_point,
            dropoff_point: row.dropoff_point,
            passengers: row.passengers,
            time_slot: row.time_slot,
            ride_date: row.ride_date,
            price: row.price,
            status: Some(row.status),
            full_name: row.full_name.unwrap_or_default(),
            whatsapp_number: row.whatsapp_number.unwrap_or_default(),
            vehicle_model: row.vehicle_model.unwrap_or_default(),
            vehicle_plate: row.vehicle_plate.unwrap_or_default(),
            vehicle_type: row.vehicle_type.unwrap_or_default(),
            ac_enabled: row.ac_enabled,
            quiet_ride: row.quiet_ride,
            profile_image: row.profile_image.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    pub request_id: i64,
    pub ride_id: i64,
    pub requester_id: i64,
    pub ride_owner_id: i64,
    pub requester_name: Option<String>,
    pub message: String,
    pub status: String,
    pub pickup_point: String,
    pub dropoff_point: String,
    pub time_slot: String,
    pub created_at: Option<String>,
}

impl TryFrom<RequestRow> for RideRequest {
    type Error = anyhow::Error;

    fn try_from(row: RequestRow) -> Result<Self> {
        Ok(RideRequest {
            request_id: row.request_id,
            ride_id: row.ride_id,
            requester_id: row.requester_id,
            ride_owner_id: row.ride_owner_id,
            requester_name: row.requester_name.unwrap_or_default(),
            message: row.message,
            status: row.status.parse().map_err(|e: String| anyhow!(e))?,
            pickup_point: row.pickup_point,
            dropoff_point: row.dropoff_point,
            time_slot: row.time_slot,
            created_at: row.created_at,
        })
    }
}

/// One outbox entry
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub request_id: Option<i64>,
    pub ride_id: Option<i64>,
    pub title: Option<String>,
    pub body: String,
    pub created_at: Option<String>,
}

impl From<NotificationRow> for PushPayload {
    fn from(row: NotificationRow) -> Self {
        PushPayload {
            id: Some(row.id),
            kind: row.kind,
            request_id: row.request_id,
            ride_id: row.ride_id,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

/// Figures shown on the profile screen
#[derive(Debug, Clone, Default, FromRow)]
pub struct UserStats {
    pub rides_offered: i64,
    pub rides_joined: i64,
    pub money_saved: f64,
}
