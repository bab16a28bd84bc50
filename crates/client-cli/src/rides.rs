//! Captain-side ride and vehicle management.

use chrono::NaiveDate;
use shared::{
    is_valid_plate, NewRide, NewVehicle, PostRideRequest, Ride, RideUpdate, StatusResponse,
    TimeSlot, Vehicle, VehicleType,
};

use crate::api::{rides_or_error, HttpBackend};
use crate::error::{ClientError, Result};
use crate::session::Session;

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Clone)]
pub struct VehicleForm {
    pub vehicle_type: String,
    pub model: String,
    pub plate: String,
    pub whatsapp: String,
}

impl VehicleForm {
    pub fn validate(&self, user_id: i64) -> Result<NewVehicle> {
        let fields = [&self.vehicle_type, &self.model, &self.plate, &self.whatsapp];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ClientError::Validation("Please fill out all fields.".to_string()));
        }
        let vehicle_type: VehicleType = self
            .vehicle_type
            .trim()
            .parse()
            .map_err(ClientError::Validation)?;
        let plate = self.plate.trim();
        if !is_valid_plate(plate) {
            return Err(ClientError::Validation(
                "Please enter a valid plate number.".to_string(),
            ));
        }

        Ok(NewVehicle {
            user_id,
            vehicle_type,
            vehicle_model: self.model.trim().to_string(),
            vehicle_plate: plate.to_string(),
            whatsapp_number: self.whatsapp.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RideForm {
    pub vehicle_id: i64,
    pub pickup_point: String,
    pub dropoff_point: String,
    pub passengers: i64,
    pub time: String,
    pub date: NaiveDate,
    pub price: f64,
    pub ac_enabled: bool,
    pub quiet_ride: bool,
}

impl RideForm {
    /// Checks the form and returns the time slot normalized to "hh:mm AM/PM"
    fn validate(&self) -> Result<String> {
        if self.pickup_point.trim().is_empty() || self.dropoff_point.trim().is_empty() {
            return Err(ClientError::Validation(
                "Please fill out all fields including date and time.".to_string(),
            ));
        }
        if self.passengers < 1 {
            return Err(ClientError::Validation(
                "A ride needs at least one seat.".to_string(),
            ));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ClientError::Validation("Please enter a valid price.".to_string()));
        }
        let slot = TimeSlot::parse(&self.time)
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        Ok(slot.to_string())
    }

    pub fn new_ride(&self, user_id: i64) -> Result<NewRide> {
        let ride_time = self.validate()?;
        Ok(NewRide {
            vehicle_id: self.vehicle_id,
            user_id,
            pickup_point: self.pickup_point.trim().to_string(),
            dropoff_point: self.dropoff_point.trim().to_string(),
            passengers: self.passengers,
            ride_time,
            ride_date: self.date.format("%Y-%m-%d").to_string(),
            price: self.price,
            ac_enabled: self.ac_enabled,
            quiet_ride: self.quiet_ride,
        })
    }

    pub fn update(&self, ride_id: i64, user_id: i64) -> Result<RideUpdate> {
        let time_slot = self.validate()?;
        Ok(RideUpdate {
            ride_id,
            vehicle_id: self.vehicle_id,
            user_id,
            pickup_point: self.pickup_point.trim().to_string(),
            dropoff_point: self.dropoff_point.trim().to_string(),
            passengers: self.passengers,
            time_slot,
            ride_date: self.date.format("%Y-%m-%d").to_string(),
            price: self.price,
            ac_enabled: self.ac_enabled,
            quiet_ride: self.quiet_ride,
        })
    }
}

/// User-facing text for a rejected vehicle insert
pub fn duplicate_vehicle_message(server_message: &str) -> &'static str {
    if server_message.starts_with("Error: Duplicate entry") {
        "This vehicle already exists for your account."
    } else {
        "This vehicle already exists for someone's account."
    }
}

fn ensure(resp: StatusResponse, fallback: &str) -> Result<()> {
    if resp.success {
        Ok(())
    } else {
        Err(ClientError::server(
            resp.message.unwrap_or_else(|| fallback.to_string()),
        ))
    }
}

// ============================================================================
// Desk
// ============================================================================

pub struct CaptainDesk<'a> {
    backend: &'a HttpBackend,
    session: &'a Session,
}

impl<'a> CaptainDesk<'a> {
    pub fn new(backend: &'a HttpBackend, session: &'a Session) -> Self {
        Self { backend, session }
    }

    pub async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        self.backend.vehicles(self.session.user_id).await
    }

    pub async fn add_vehicle(&self, form: &VehicleForm) -> Result<Vehicle> {
        let vehicle = form.validate(self.session.user_id)?;
        let resp = match self.backend.add_vehicle(&vehicle).await {
            Ok(resp) => resp,
            Err(ClientError::Server {
                status: Some(status),
                message,
            }) if status == 409
                || (status == 400 && message.starts_with("Error: Duplicate entry")) =>
            {
                return Err(ClientError::Server {
                    status: Some(status),
                    message: format!("Duplicate Vehicle: {}", duplicate_vehicle_message(&message)),
                })
            }
            Err(e) => return Err(e),
        };
        match resp.vehicle {
            Some(vehicle) if resp.success => {
                tracing::info!("Added vehicle {}", vehicle.vehicle_plate);
                Ok(vehicle)
            }
            _ => Err(ClientError::server(
                resp.message
                    .unwrap_or_else(|| "Failed to add vehicle.".to_string()),
            )),
        }
    }

    pub async fn my_rides(&self) -> Result<Vec<Ride>> {
        let resp = self.backend.my_rides(self.session.user_id).await?;
        rides_or_error(resp, "Failed to fetch rides.")
    }

    pub async fn ride(&self, ride_id: i64) -> Result<Ride> {
        let resp = self.backend.ride(ride_id).await?;
        match resp.ride {
            Some(ride) if resp.success => Ok(ride),
            _ => Err(ClientError::NotFound(
                resp.message
                    .unwrap_or_else(|| "Failed to fetch ride details.".to_string()),
            )),
        }
    }

    pub async fn add_ride(&self, form: &RideForm) -> Result<Option<Ride>> {
        let ride = form.new_ride(self.session.user_id)?;
        let resp = self.backend.add_ride(&ride).await?;
        if !resp.success {
            return Err(ClientError::server(
                resp.message
                    .unwrap_or_else(|| "Failed to add ride. Please try again.".to_string()),
            ));
        }
        Ok(resp.ride)
    }

    pub async fn update_ride(&self, ride_id: i64, form: &RideForm) -> Result<()> {
        let update = form.update(ride_id, self.session.user_id)?;
        let resp = self.backend.update_ride(&update).await?;
        ensure(resp, "Failed to update the ride.")
    }

    pub async fn delete_ride(&self, ride_id: i64) -> Result<()> {
        let resp = self.backend.delete_ride(ride_id).await?;
        ensure(resp, "Failed to delete ride.")
    }

    pub async fn previous_rides(&self, vehicle_id: i64) -> Result<Vec<Ride>> {
        let resp = self
            .backend
            .previous_rides(self.session.user_id, vehicle_id)
            .await?;
        rides_or_error(resp, "No Rides Found")
    }

    /// Re-post an earlier ride with the chosen vehicle
    pub async fn post_ride(&self, ride_id: i64, vehicle_id: i64) -> Result<()> {
        let req = PostRideRequest {
            ride_id,
            user_id: self.session.user_id,
            vehicle_id,
        };
        let resp = self.backend.post_ride(&req).await?;
        ensure(resp, "Failed to post the ride.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle_form(kind: &str, plate: &str) -> VehicleForm {
        VehicleForm {
            vehicle_type: kind.to_string(),
            model: "Honda CD70".to_string(),
            plate: plate.to_string(),
            whatsapp: "3001234567".to_string(),
        }
    }

    fn ride_form(time: &str) -> RideForm {
        RideForm {
            vehicle_id: 3,
            pickup_point: "North Nazimabad".to_string(),
            dropoff_point: "MAJU".to_string(),
            passengers: 2,
            time: time.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            price: 180.0,
            ac_enabled: false,
            quiet_ride: true,
        }
    }

    #[test]
    fn test_vehicle_validation() {
        let vehicle = vehicle_form("Bike", " KHI-42 ").validate(9).unwrap();
        assert_eq!(vehicle.vehicle_type, VehicleType::Bike);
        assert_eq!(vehicle.vehicle_plate, "KHI-42");

        let err = vehicle_form("Truck", "KHI-42").validate(9).unwrap_err();
        assert_eq!(err.to_string(), "Vehicle type must be either \"Car\" or \"Bike\".");

        let err = vehicle_form("Car", "KHI 42").validate(9).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid plate number.");

        let err = vehicle_form("Car", "").validate(9).unwrap_err();
        assert_eq!(err.to_string(), "Please fill out all fields.");
    }

    #[test]
    fn test_ride_form_normalizes_time() {
        let ride = ride_form("7:05pm").new_ride(9).unwrap();
        assert_eq!(ride.ride_time, "07:05 PM");
        assert_eq!(ride.ride_date, "2024-06-01");
        assert_eq!(ride.user_id, 9);

        let update = ride_form("08:00 AM").update(4, 9).unwrap();
        assert_eq!(update.ride_id, 4);
        assert_eq!(update.time_slot, "08:00 AM");
    }

    #[test]
    fn test_ride_form_rejects_bad_input() {
        assert!(ride_form("late").new_ride(9).is_err());

        let mut form = ride_form("08:00 AM");
        form.passengers = 0;
        assert!(form.new_ride(9).is_err());

        let mut form = ride_form("08:00 AM");
        form.pickup_point = " ".to_string();
        assert!(form.new_ride(9).is_err());

        let mut form = ride_form("08:00 AM");
        form.price = -1.0;
        assert!(form.new_ride(9).is_err());
    }

    #[test]
    fn test_duplicate_vehicle_message() {
        assert_eq!(
            duplicate_vehicle_message("Error: Duplicate entry 'KHI-42'"),
            "This vehicle already exists for your account."
        );
        assert_eq!(
            duplicate_vehicle_message("Plate belongs to another account"),
            "This vehicle already exists for someone's account."
        );
    }
}
