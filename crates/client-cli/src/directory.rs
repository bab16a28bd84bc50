//! Open ride listing for passengers.

use chrono::{Duration, NaiveDateTime};
use futures::future::join_all;
use shared::{Ride, TimeSlot};

use crate::api::{rides_or_error, ProfileApi, RideSource};
use crate::error::Result;

/// Rides departing later today, or within `grace` of having departed, sorted
/// by time of day. Owner images are fetched concurrently and a failed image
/// fetch leaves the field empty.
pub async fn list_open_rides<B>(backend: &B, now: NaiveDateTime, grace: Duration) -> Result<Vec<Ride>>
where
    B: RideSource + ProfileApi + ?Sized,
{
    let resp = backend.fetch_rides().await?;
    let mut rides = rides_or_error(resp, "No rides found.")?;
    tracing::debug!("Fetched {} rides", rides.len());

    let images = join_all(rides.iter().map(|ride| backend.profile_image(ride.user_id))).await;
    for (ride, image) in rides.iter_mut().zip(images) {
        ride.profile_image = match image {
            Ok(path) => path.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Profile image for user {} unavailable: {}", ride.user_id, e);
                String::new()
            }
        };
    }

    Ok(filter_and_sort(rides, now, grace))
}

/// Drop rides more than `grace` in the past and order the rest by departure.
/// Slots are read as times on `now`'s date.
pub fn filter_and_sort(rides: Vec<Ride>, now: NaiveDateTime, grace: Duration) -> Vec<Ride> {
    let cutoff = now.checked_sub_signed(grace).unwrap_or(NaiveDateTime::MIN);
    let today = now.date();

    let mut open: Vec<(TimeSlot, Ride)> = rides
        .into_iter()
        .filter_map(|ride| match TimeSlot::parse(&ride.time_slot) {
            Ok(slot) => Some((slot, ride)),
            Err(e) => {
                tracing::warn!("Skipping ride {}: {}", ride.ride_id, e);
                None
            }
        })
        .filter(|(slot, _)| slot.on(today) >= cutoff)
        .collect();

    open.sort_by_key(|(slot, _)| *slot);
    open.into_iter().map(|(_, ride)| ride).collect()
}
