use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::storage::UPLOADS_ROUTE;

mod auth;
mod health;
mod images;
mod notifications;
mod requests;
mod rides;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Multipart framing on top of the largest accepted image
    let upload_limit = state.config.uploads.max_image_bytes + 64 * 1024;

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Registration and login
        .route("/auth/savePhoneNumber", post(auth::save_phone_number))
        .route("/auth/verifycode", post(auth::verify_code))
        .route("/auth/saveDetails", post(auth::save_details))
        .route("/auth/login", post(auth::login))
        .route("/auth/users/:id", get(auth::get_user).put(auth::update_user))
        // Profile images
        .route("/images/user/:id/profile-image", get(images::profile_image))
        .route(
            "/images/upload/:id",
            post(images::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest_service(UPLOADS_ROUTE, ServeDir::new(state.storage.base_path()))
        // Rides and vehicles
        .route("/rides/getRides", get(rides::open_rides))
        .route("/rides/check", get(rides::my_rides))
        .route("/rides/ride/add", post(rides::add_ride))
        .route("/rides/ride/update", put(rides::update_ride))
        .route("/rides/ride/prev", get(rides::previous_rides))
        .route("/rides/ride/post", post(rides::post_ride))
        .route("/rides/ride/:id", get(rides::get_ride))
        .route("/rides/deleteRide", post(rides::delete_ride))
        .route("/rides/vehicles", get(rides::vehicles))
        .route("/rides/vehicles/add", post(rides::add_vehicle))
        // Ride requests
        .route("/rides/sendRequest", post(requests::send_request))
        .route("/rides/checkRequest/:ride_id/:user_id", get(requests::check_request))
        .route("/rides/getRequests/:user_id", get(requests::list_requests))
        .route("/rides/updateRequest", post(requests::update_request))
        .route("/rides/cancelRequest", post(requests::cancel_request))
        // Notification outbox
        .route("/notifications/send", post(notifications::send))
        .route("/notifications/:user_id", get(notifications::list))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Test harness
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{config::Config, db::Database, state::AppState};

    pub struct TestApp {
        pub state: AppState,
        _uploads: tempfile::TempDir,
    }

    impl TestApp {
        pub async fn new() -> Self {
            let uploads = tempfile::tempdir().unwrap();
            let mut config = Config::default();
            config.uploads.dir = uploads.path().to_string_lossy().into_owned();
            config.registration.allowed_email_domains = vec!["@maju.edu.pk".to_string()];
            let db = Database::in_memory().await.unwrap();
            Self {
                state: AppState::new(db, config),
                _uploads: uploads,
            }
        }

        pub fn router(&self) -> Router {
            super::create_router(self.state.clone())
        }

        pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            self.call(Method::GET, uri, token, None).await
        }

        pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, uri, token, Some(body)).await
        }

        /// Walk the three registration steps; returns (user_id, token)
        pub async fn register(&self, phone: &str, name: &str) -> (i64, String) {
            let email = format!("u{}@maju.edu.pk", phone);
            let (status, body) = self
                .post(
                    "/auth/savePhoneNumber",
                    None,
                    json!({ "phoneNumber": phone, "email": email }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);

            let code = self
                .state
                .verification_codes
                .get(phone)
                .map(|c| c.code.clone())
                .unwrap();
            let (status, _) = self
                .post(
                    "/auth/verifycode",
                    None,
                    json!({ "phoneNumber": phone, "email": email, "code": code }),
                )
                .await;
            assert_eq!(status, StatusCode::OK);

            let (status, body) = self
                .post(
                    "/auth/saveDetails",
                    None,
                    json!({ "phoneNumber": phone, "fullName": name, "password": "secret123" }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            (
                body["user_id"].as_i64().unwrap(),
                body["token"].as_str().unwrap().to_string(),
            )
        }

        /// A captain with one vehicle and one listed ride; returns (user_id, token, vehicle_id, ride_id)
        pub async fn captain_with_ride(&self, phone: &str, plate: &str) -> (i64, String, i64, i64) {
            let (user_id, token) = self.register(phone, "Captain").await;
            let (status, body) = self
                .post(
                    "/rides/vehicles/add",
                    Some(&token),
                    json!({
                        "user_id": user_id,
                        "vehicle_type": "Car",
                        "vehicle_model": "Civic",
                        "vehicle_plate": plate,
                        "whatsapp_number": phone,
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            let vehicle_id = body["vehicle"]["vehicle_id"].as_i64().unwrap();

            let (status, body) = self
                .post(
                    "/rides/ride/add",
                    Some(&token),
                    json!({
                        "vehicle_id": vehicle_id,
                        "user_id": user_id,
                        "pickup_point": "Gulshan",
                        "dropoff_point": "Saddar",
                        "passengers": 1,
                        "ride_time": "08:30 AM",
                        "ride_date": "2099-01-01",
                        "price": 250.0,
                        "ac_enabled": true,
                        "quiet_ride": false,
                    }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            let ride_id = body["ride"]["ride_id"].as_i64().unwrap();
            (user_id, token, vehicle_id, ride_id)
        }
    }
}
