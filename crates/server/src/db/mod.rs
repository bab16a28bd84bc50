use anyhow::Result;
use shared::{NewRide, NewVehicle, ProfileUpdate, PushPayload, RequestStatus, RideUpdate, SendRequestBody};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

mod models;

pub use models::*;

/// Ride lifecycle as stored in `rides.status`
pub mod ride_status {
    /// Listed in the open ride directory
    pub const ACTIVE: &str = "active";
    pub const DELETED: &str = "deleted";
}

const RIDE_SELECT: &str = r#"
    SELECT r.ride_id, r.user_id, r.vehicle_id, r.pickup_point, r.dropoff_point,
           r.passengers, r.time_slot, r.ride_date, r.price, r.status,
           r.ac_enabled, r.quiet_ride,
           u.full_name, u.profile_image,
           v.whatsapp_number, v.vehicle_model, v.vehicle_plate, v.vehicle_type
    FROM rides r
    JOIN users u ON u.id = r.user_id
    LEFT JOIN vehicles v ON v.vehicle_id = r.vehicle_id
"#;

const REQUEST_SELECT: &str = r#"
    SELECT q.request_id, q.ride_id, q.requester_id, q.ride_owner_id,
           u.full_name AS requester_name, q.message, q.status,
           q.pickup_point, q.dropoff_point, q.time_slot, q.created_at
    FROM ride_requests q
    LEFT JOIN users u ON u.id = q.requester_id
"#;

const USER_COLUMNS: &str = "id, phone_number, email, full_name, password_hash, verified, bio, \
     profile_image, push_token, rating, badge, created_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. One connection, since every sqlite
    /// memory connection is its own database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone_number TEXT UNIQUE NOT NULL,
                email TEXT NOT NULL,
                full_name TEXT,
                password_hash TEXT,
                verified INTEGER NOT NULL DEFAULT 0,
                bio TEXT,
                profile_image TEXT,
                push_token TEXT,
                rating REAL NOT NULL DEFAULT 0,
                badge TEXT NOT NULL DEFAULT 'Bronze',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vehicles (
                vehicle_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                vehicle_type TEXT NOT NULL,
                vehicle_model TEXT NOT NULL,
                vehicle_plate TEXT NOT NULL UNIQUE COLLATE NOCASE,
                whatsapp_number TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rides (
                ride_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                vehicle_id INTEGER REFERENCES vehicles(vehicle_id),
                pickup_point TEXT NOT NULL,
                dropoff_point TEXT NOT NULL,
                passengers INTEGER NOT NULL,
                time_slot TEXT NOT NULL,
                ride_date TEXT,
                price REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                ac_enabled INTEGER NOT NULL DEFAULT 0,
                quiet_ride INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ride_requests (
                request_id INTEGER PRIMARY KEY AUTOINCREMENT,
                ride_id INTEGER NOT NULL REFERENCES rides(ride_id),
                requester_id INTEGER NOT NULL REFERENCES users(id),
                ride_owner_id INTEGER NOT NULL REFERENCES users(id),
                message TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                pickup_point TEXT NOT NULL,
                dropoff_point TEXT NOT NULL,
                time_slot TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // At most one pending request per (ride, requester). Terminal rows don't count.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_ride_requests_one_pending
            ON ride_requests(ride_id, requester_id)
            WHERE status = 'pending'
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                kind TEXT NOT NULL,
                request_id INTEGER,
                ride_id INTEGER,
                title TEXT,
                body TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, id)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn create_user(&self, phone_number: &str, email: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO users (phone_number, email) VALUES (?, ?)")
            .bind(phone_number)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE phone_number = ?",
            USER_COLUMNS
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower(?) AND password_hash IS NOT NULL",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Restarting registration may change the address the code goes to
    pub async fn update_contact_email(&self, id: i64, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET email = ?, verified = 0 WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_verified(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET verified = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn complete_registration(&self, id: i64, full_name: &str, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET full_name = ?, password_hash = ? WHERE id = ?")
            .bind(full_name)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_push_token(&self, id: i64, token: &str) -> Result<()> {
        sqlx::query("UPDATE users SET push_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Apply the fields present in `update`. Returns false for an unknown user.
    pub async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                full_name = COALESCE(?, full_name),
                bio = COALESCE(?, bio),
                email = COALESCE(?, email),
                phone_number = COALESCE(?, phone_number)
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.bio)
        .bind(&update.email)
        .bind(&update.phone)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_profile_image(&self, id: i64, path: &str) -> Result<()> {
        sqlx::query("UPDATE users SET profile_image = ? WHERE id = ?")
            .bind(path)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn user_stats(&self, id: i64) -> Result<UserStats> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM rides
                    WHERE user_id = ?1 AND status != 'deleted') AS rides_offered,
                (SELECT COUNT(*) FROM ride_requests
                    WHERE requester_id = ?1 AND status = 'accepted') AS rides_joined,
                (SELECT CAST(COALESCE(SUM(r.price), 0) AS REAL)
                    FROM ride_requests q JOIN rides r ON r.ride_id = q.ride_id
                    WHERE q.requester_id = ?1 AND q.status = 'accepted') AS money_saved
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    // ========================================================================
    // Vehicles
    // ========================================================================

    pub async fn list_vehicles(&self, user_id: i64) -> Result<Vec<VehicleRow>> {
        let vehicles = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT vehicle_id, user_id, vehicle_type, vehicle_model, vehicle_plate, whatsapp_number
            FROM vehicles WHERE user_id = ? ORDER BY vehicle_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(vehicles)
    }

    pub async fn get_vehicle(&self, vehicle_id: i64) -> Result<Option<VehicleRow>> {
        let vehicle = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT vehicle_id, user_id, vehicle_type, vehicle_model, vehicle_plate, whatsapp_number
            FROM vehicles WHERE vehicle_id = ?
            "#,
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vehicle)
    }

    pub async fn get_vehicle_by_plate(&self, plate: &str) -> Result<Option<VehicleRow>> {
        let vehicle = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT vehicle_id, user_id, vehicle_type, vehicle_model, vehicle_plate, whatsapp_number
            FROM vehicles WHERE vehicle_plate = ? COLLATE NOCASE
            "#,
        )
        .bind(plate)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vehicle)
    }

    pub async fn create_vehicle(&self, vehicle: &NewVehicle) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO vehicles (user_id, vehicle_type, vehicle_model, vehicle_plate, whatsapp_number)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(vehicle.user_id)
        .bind(vehicle.vehicle_type.as_str())
        .bind(&vehicle.vehicle_model)
        .bind(&vehicle.vehicle_plate)
        .bind(&vehicle.whatsapp_number)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    // ========================================================================
    // Rides
    // ========================================================================

    /// Listed rides dated `today` or later (undated rides are always listed)
    pub async fn list_open_rides(&self, today: &str) -> Result<Vec<RideRow>> {
        let rides = sqlx::query_as::<_, RideRow>(&format!(
            "{} WHERE r.status = ? AND (r.ride_date IS NULL OR r.ride_date >= ?) ORDER BY r.ride_id",
            RIDE_SELECT
        ))
        .bind(ride_status::ACTIVE)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rides)
    }

    pub async fn list_active_rides_for_user(&self, user_id: i64) -> Result<Vec<RideRow>> {
        let rides = sqlx::query_as::<_, RideRow>(&format!(
            "{} WHERE r.user_id = ? AND r.status = ? ORDER BY r.ride_id",
            RIDE_SELECT
        ))
        .bind(user_id)
        .bind(ride_status::ACTIVE)
        .fetch_all(&self.pool)
        .await?;
        Ok(rides)
    }

    /// Every ride a captain has listed with one vehicle, newest first
    pub async fn previous_rides(&self, user_id: i64, vehicle_id: i64) -> Result<Vec<RideRow>> {
        let rides = sqlx::query_as::<_, RideRow>(&format!(
            "{} WHERE r.user_id = ? AND r.vehicle_id = ? AND r.status != ? ORDER BY r.ride_id DESC",
            RIDE_SELECT
        ))
        .bind(user_id)
        .bind(vehicle_id)
        .bind(ride_status::DELETED)
        .fetch_all(&self.pool)
        .await?;
        Ok(rides)
    }

    /// A ride that has not been deleted
    pub async fn get_ride(&self, ride_id: i64) -> Result<Option<RideRow>> {
        let ride = sqlx::query_as::<_, RideRow>(&format!(
            "{} WHERE r.ride_id = ? AND r.status != ?",
            RIDE_SELECT
        ))
        .bind(ride_id)
        .bind(ride_status::DELETED)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ride)
    }

    pub async fn create_ride(&self, ride: &NewRide, status: &str) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO rides (user_id, vehicle_id, pickup_point, dropoff_point, passengers,
                               time_slot, ride_date, price, status, ac_enabled, quiet_ride)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ride.user_id)
        .bind(ride.vehicle_id)
        .bind(&ride.pickup_point)
        .bind(&ride.dropoff_point)
        .bind(ride.passengers)
        .bind(&ride.ride_time)
        .bind(&ride.ride_date)
        .bind(ride.price)
        .bind(status)
        .bind(ride.ac_enabled)
        .bind(ride.quiet_ride)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update_ride(&self, ride: &RideUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE rides SET
                vehicle_id = ?, pickup_point = ?, dropoff_point = ?, passengers = ?,
                time_slot = ?, ride_date = ?, price = ?, ac_enabled = ?, quiet_ride = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE ride_id = ? AND status != 'deleted'
            "#,
        )
        .bind(ride.vehicle_id)
        .bind(&ride.pickup_point)
        .bind(&ride.dropoff_point)
        .bind(ride.passengers)
        .bind(&ride.time_slot)
        .bind(&ride.ride_date)
        .bind(ride.price)
        .bind(ride.ac_enabled)
        .bind(ride.quiet_ride)
        .bind(ride.ride_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a ride and cancel its pending requests in one transaction.
    /// Returns how many requests were cancelled.
    pub async fn delete_ride(&self, ride_id: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE rides SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE ride_id = ?")
            .bind(ride_status::DELETED)
            .bind(ride_id)
            .execute(&mut *tx)
            .await?;

        let cancelled = sqlx::query(
            "UPDATE ride_requests SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP WHERE ride_id = ? AND status = 'pending'",
        )
        .bind(ride_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(cancelled.rows_affected())
    }

    /// List a copy of an earlier ride for `ride_date` with the given vehicle
    pub async fn repost_ride(&self, template_id: i64, vehicle_id: i64, ride_date: &str) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO rides (user_id, vehicle_id, pickup_point, dropoff_point, passengers,
                               time_slot, ride_date, price, status, ac_enabled, quiet_ride)
            SELECT user_id, ?, pickup_point, dropoff_point, passengers,
                   time_slot, ?, price, ?, ac_enabled, quiet_ride
            FROM rides WHERE ride_id = ?
            "#,
        )
        .bind(vehicle_id)
        .bind(ride_date)
        .bind(ride_status::ACTIVE)
        .bind(template_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    // ========================================================================
    // Ride requests
    // ========================================================================

    /// Insert a pending request. `None` means the requester already has a
    /// pending request for this ride.
    pub async fn create_request(&self, body: &SendRequestBody, ride_owner_id: i64) -> Result<Option<i64>> {
        let result = sqlx::query(
            r#"
            INSERT INTO ride_requests (ride_id, requester_id, ride_owner_id, message,
                                       status, pickup_point, dropoff_point, time_slot)
            VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(body.ride_id)
        .bind(body.requester_id)
        .bind(ride_owner_id)
        .bind(&body.message)
        .bind(&body.pickup_point)
        .bind(&body.dropoff_point)
        .bind(&body.time_slot)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(Some(done.last_insert_rowid())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn pending_request_exists(&self, ride_id: i64, requester_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ride_requests WHERE ride_id = ? AND requester_id = ? AND status = 'pending'",
        )
        .bind(ride_id)
        .bind(requester_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn get_request(&self, request_id: i64) -> Result<Option<RequestRow>> {
        let request = sqlx::query_as::<_, RequestRow>(&format!(
            "{} WHERE q.request_id = ?",
            REQUEST_SELECT
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    /// Requests the user made or received, newest first
    pub async fn list_requests_for_user(&self, user_id: i64) -> Result<Vec<RequestRow>> {
        let requests = sqlx::query_as::<_, RequestRow>(&format!(
            "{} WHERE q.requester_id = ?1 OR q.ride_owner_id = ?1 ORDER BY q.created_at DESC, q.request_id DESC",
            REQUEST_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// Move a request out of `from`. Returns false if it was no longer in
    /// `from`, e.g. a concurrent cancel won.
    pub async fn transition_request(&self, request_id: i64, from: RequestStatus, to: RequestStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE ride_requests SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE request_id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(request_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Accept a pending request if its live ride still has a free seat. The
    /// seat count is checked inside the UPDATE so concurrent accepts cannot
    /// overbook. Returns false if the request was not pending, the ride is
    /// deleted, or the ride is full.
    pub async fn accept_request(&self, request_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ride_requests SET status = 'accepted', updated_at = CURRENT_TIMESTAMP
            WHERE request_id = ?1 AND status = 'pending'
              AND (SELECT COUNT(*) FROM ride_requests q
                   WHERE q.ride_id = ride_requests.ride_id AND q.status = 'accepted')
                < (SELECT r.passengers FROM rides r
                   WHERE r.ride_id = ride_requests.ride_id AND r.status != 'deleted')
            "#,
        )
        .bind(request_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Users holding a pending or accepted request for the ride
    pub async fn interested_requesters(&self, ride_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT requester_id FROM ride_requests
            WHERE ride_id = ? AND status IN ('pending', 'accepted')
            ORDER BY requester_id
            "#,
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    // ========================================================================
    // Notification outbox
    // ========================================================================

    pub async fn push_notification(&self, user_id: i64, payload: &PushPayload) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO notifications (user_id, kind, request_id, ride_id, title, body) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&payload.kind)
        .bind(payload.request_id)
        .bind(payload.ride_id)
        .bind(&payload.title)
        .bind(&payload.body)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Outbox entries for a user with an id greater than `after`, oldest first
    pub async fn notifications_after(&self, user_id: i64, after: i64) -> Result<Vec<NotificationRow>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, kind, request_id, ride_id, title, body, created_at
            FROM notifications WHERE user_id = ? AND id > ? ORDER BY id
            "#,
        )
        .bind(user_id)
        .bind(after)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
