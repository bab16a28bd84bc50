use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use shared::{
    is_valid_plate, DeleteRideRequest, NewRide, NewVehicle, PostRideRequest, Ride, RideResponse,
    RideUpdate, RidesResponse, StatusResponse, TimeSlot, Vehicle, VehicleResponse, VehiclesResponse,
};

use super::auth::AuthUser;
use super::notifications::notify_ride_update;
use crate::{
    db::{ride_status, RideRow},
    error::AppError,
    state::AppState,
};

/// Seats a single ride may offer
const MAX_PASSENGERS: i64 = 8;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PreviousQuery {
    pub user_id: i64,
    pub vehicle_id: i64,
}

fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn rides_response(rows: Vec<RideRow>) -> Json<RidesResponse> {
    Json(RidesResponse {
        success: true,
        rides: Some(rows.into_iter().map(Ride::from).collect()),
        message: None,
    })
}

/// Shared checks for a new or edited ride. Returns the normalized time slot.
fn validate_ride(
    pickup: &str,
    dropoff: &str,
    passengers: i64,
    time: &str,
    date: &str,
    price: f64,
) -> Result<String, AppError> {
    if pickup.trim().is_empty() || dropoff.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Pickup and drop-off points are required.".to_string(),
        ));
    }
    if !(1..=MAX_PASSENGERS).contains(&passengers) {
        return Err(AppError::BadRequest(format!(
            "Passengers must be between 1 and {}.",
            MAX_PASSENGERS
        )));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::BadRequest("Please enter a valid price.".to_string()));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Ride date must be YYYY-MM-DD.".to_string()))?;
    let slot: TimeSlot = time
        .parse()
        .map_err(|_| AppError::BadRequest("Ride time must look like 08:30 AM.".to_string()))?;
    Ok(slot.to_string())
}

/// The caller must own the vehicle they list a ride with
async fn ensure_vehicle_owner(state: &AppState, vehicle_id: i64, user_id: i64) -> Result<(), AppError> {
    match state.db.get_vehicle(vehicle_id).await? {
        Some(vehicle) if vehicle.user_id == user_id => Ok(()),
        Some(_) => Err(AppError::Forbidden(
            "This vehicle belongs to another account".to_string(),
        )),
        None => Err(AppError::NotFound("Vehicle not found".to_string())),
    }
}

/// A live ride owned by the caller
async fn owned_ride(state: &AppState, ride_id: i64, user_id: i64, action: &str) -> Result<RideRow, AppError> {
    let ride = state
        .db
        .get_ride(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;
    if ride.user_id != user_id {
        return Err(AppError::Forbidden(format!(
            "Only the ride owner can {} this ride",
            action
        )));
    }
    Ok(ride)
}

// ============================================================================
// Rides
// ============================================================================

/// Open rides from today on. Time-of-day filtering is left to the client.
/// GET /rides/getRides
pub async fn open_rides(State(state): State<AppState>) -> Result<Json<RidesResponse>, AppError> {
    let rows = state.db.list_open_rides(&today()).await?;
    Ok(rides_response(rows))
}

/// GET /rides/check?user_id=
pub async fn my_rides(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserQuery>,
) -> Result<Json<RidesResponse>, AppError> {
    auth.ensure_self(query.user_id)?;
    let rows = state.db.list_active_rides_for_user(query.user_id).await?;
    Ok(rides_response(rows))
}

/// GET /rides/ride/:id
pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<i64>,
) -> Result<Json<RideResponse>, AppError> {
    let ride = state
        .db
        .get_ride(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    Ok(Json(RideResponse {
        success: true,
        ride: Some(ride.into()),
        message: None,
    }))
}

/// POST /rides/ride/add
pub async fn add_ride(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut ride): Json<NewRide>,
) -> Result<Json<RideResponse>, AppError> {
    auth.ensure_self(ride.user_id)?;
    ride.ride_time = validate_ride(
        &ride.pickup_point,
        &ride.dropoff_point,
        ride.passengers,
        &ride.ride_time,
        &ride.ride_date,
        ride.price,
    )?;
    ensure_vehicle_owner(&state, ride.vehicle_id, ride.user_id).await?;

    let ride_id = state.db.create_ride(&ride, ride_status::ACTIVE).await?;
    let created = state
        .db
        .get_ride(ride_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("ride {} vanished after insert", ride_id)))?;

    tracing::info!("User {} listed ride {}", ride.user_id, ride_id);
    Ok(Json(RideResponse {
        success: true,
        ride: Some(created.into()),
        message: Some("Ride added successfully.".to_string()),
    }))
}

/// Edit a ride, then tell its requesters
/// PUT /rides/ride/update
pub async fn update_ride(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut update): Json<RideUpdate>,
) -> Result<Json<StatusResponse>, AppError> {
    auth.ensure_self(update.user_id)?;
    let ride = owned_ride(&state, update.ride_id, auth.user_id, "edit").await?;
    update.time_slot = validate_ride(
        &update.pickup_point,
        &update.dropoff_point,
        update.passengers,
        &update.time_slot,
        &update.ride_date,
        update.price,
    )?;
    ensure_vehicle_owner(&state, update.vehicle_id, auth.user_id).await?;

    if !state.db.update_ride(&update).await? {
        return Err(AppError::NotFound("Ride not found".to_string()));
    }

    let recipients = state.db.interested_requesters(ride.ride_id).await?;
    notify_ride_update(
        &state.db,
        ride.ride_id,
        &recipients,
        format!(
            "Your ride from {} to {} has been updated. It now leaves at {} on {}.",
            update.pickup_point, update.dropoff_point, update.time_slot, update.ride_date
        ),
    )
    .await?;

    tracing::info!("Ride {} updated by its owner", ride.ride_id);
    Ok(Json(StatusResponse::ok_with("Ride updated successfully!")))
}

/// Withdraw a ride. Pending requests are cancelled and every requester is told.
/// POST /rides/deleteRide
pub async fn delete_ride(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<DeleteRideRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let ride = owned_ride(&state, req.id, auth.user_id, "delete").await?;

    let recipients = state.db.interested_requesters(ride.ride_id).await?;
    let cancelled = state.db.delete_ride(ride.ride_id).await?;

    notify_ride_update(
        &state.db,
        ride.ride_id,
        &recipients,
        format!(
            "The ride from {} to {} at {} has been cancelled by the captain.",
            ride.pickup_point, ride.dropoff_point, ride.time_slot
        ),
    )
    .await?;

    tracing::info!(
        "Ride {} deleted, {} pending request(s) cancelled",
        ride.ride_id,
        cancelled
    );
    Ok(Json(StatusResponse::ok_with("Ride deleted successfully.")))
}

/// GET /rides/ride/prev?user_id=&vehicle_id=
pub async fn previous_rides(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PreviousQuery>,
) -> Result<Json<RidesResponse>, AppError> {
    auth.ensure_self(query.user_id)?;
    let rows = state
        .db
        .previous_rides(query.user_id, query.vehicle_id)
        .await?;
    Ok(rides_response(rows))
}

/// List a copy of an earlier ride for today
/// POST /rides/ride/post
pub async fn post_ride(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PostRideRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    auth.ensure_self(req.user_id)?;
    let template = owned_ride(&state, req.ride_id, auth.user_id, "post").await?;
    ensure_vehicle_owner(&state, req.vehicle_id, auth.user_id).await?;

    let ride_id = state
        .db
        .repost_ride(template.ride_id, req.vehicle_id, &today())
        .await?;

    tracing::info!("Ride {} reposted as {}", template.ride_id, ride_id);
    Ok(Json(StatusResponse::ok_with("Ride successfully posted!")))
}

// ============================================================================
// Vehicles
// ============================================================================

/// GET /rides/vehicles?user_id=
pub async fn vehicles(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserQuery>,
) -> Result<Json<VehiclesResponse>, AppError> {
    auth.ensure_self(query.user_id)?;
    let vehicles = state
        .db
        .list_vehicles(query.user_id)
        .await?
        .into_iter()
        .map(Vehicle::try_from)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(VehiclesResponse { vehicles }))
}

/// A plate may be registered once. Re-adding your own plate answers 400 with
/// a "Duplicate entry" message; someone else's plate answers 409.
/// POST /rides/vehicles/add
pub async fn add_vehicle(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut vehicle): Json<NewVehicle>,
) -> Result<Json<VehicleResponse>, AppError> {
    auth.ensure_self(vehicle.user_id)?;
    vehicle.vehicle_model = vehicle.vehicle_model.trim().to_string();
    vehicle.vehicle_plate = vehicle.vehicle_plate.trim().to_string();
    vehicle.whatsapp_number = vehicle.whatsapp_number.trim().to_string();
    if vehicle.vehicle_model.is_empty() || vehicle.whatsapp_number.is_empty() {
        return Err(AppError::BadRequest("Please fill out all fields.".to_string()));
    }
    if !is_valid_plate(&vehicle.vehicle_plate) {
        return Err(AppError::BadRequest("Please enter a valid plate number.".to_string()));
    }

    if let Some(existing) = state.db.get_vehicle_by_plate(&vehicle.vehicle_plate).await? {
        return Err(if existing.user_id == vehicle.user_id {
            AppError::BadRequest(format!(
                "Error: Duplicate entry '{}' for your vehicles",
                existing.vehicle_plate
            ))
        } else {
            AppError::Conflict("This plate is registered to another account.".to_string())
        });
    }

    let vehicle_id = state.db.create_vehicle(&vehicle).await?;
    let created = state
        .db
        .get_vehicle(vehicle_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("vehicle {} vanished after insert", vehicle_id)))?;

    tracing::info!("User {} added vehicle {}", vehicle.user_id, vehicle.vehicle_plate);
    Ok(Json(VehicleResponse {
        success: true,
        vehicle: Some(Vehicle::try_from(created)?),
        message: None,
    }))
}

// ============================================================================
// Tests
// ============================================================================
