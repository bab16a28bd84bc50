//! HTTP client for the rides backend.
//!
//! The traits are the seams the directory, request lifecycle and profile
//! components depend on; `HttpBackend` implements them over reqwest and also
//! carries the thin CRUD calls used directly by commands.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    AuthResponse, CancelRequestBody, CheckRequestResponse, ContactRequest, ContactResponse,
    DeleteRideRequest, DetailsRequest, LoginRequest, NewRide, NewVehicle, NotificationDispatch,
    NotificationsResponse, PostRideRequest, Profile, ProfileImageResponse, ProfileUpdate,
    PushPayload, RequestStatus, RequestsResponse, Ride, RideRequest, RideResponse, RideUpdate,
    RidesResponse, SendRequestBody, SendRequestResponse, StatusResponse, UpdateRequestBody,
    Vehicle, VehicleResponse, VehiclesResponse, VerifyCodeRequest,
};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Source of the open ride listing
#[async_trait]
pub trait RideSource: Send + Sync {
    async fn fetch_rides(&self) -> Result<RidesResponse>;
}

/// Profile reads and writes
#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn fetch_profile(&self, user_id: i64) -> Result<Profile>;
    /// Relative image path, `None` when the user has no image
    async fn profile_image(&self, user_id: i64) -> Result<Option<String>>;
    async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<()>;
    async fn upload_image(&self, user_id: i64, file_name: String, bytes: Vec<u8>) -> Result<String>;
}

/// Ride request endpoints plus the notification side channel
#[async_trait]
pub trait RequestApi: Send + Sync {
    async fn check_request(&self, ride_id: i64, requester_id: i64) -> Result<bool>;
    async fn send_request(&self, body: &SendRequestBody) -> Result<SendRequestResponse>;
    async fn list_requests(&self, user_id: i64) -> Result<Vec<RideRequest>>;
    async fn update_request(&self, request_id: i64, status: RequestStatus) -> Result<StatusResponse>;
    async fn cancel_request(&self, request_id: i64) -> Result<StatusResponse>;
    async fn dispatch_notification(&self, dispatch: &NotificationDispatch) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a bearer token to every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let resp = builder.send().await?;
        Self::read(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Self::send(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        Self::send(self.request(Method::POST, path).json(body)).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        Self::send(self.request(Method::PUT, path).json(body)).await
    }

    /// Decode a success body, or turn an error body into `ClientError::Server`
    async fn read<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let fallback = status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
        let message = match resp.json::<StatusResponse>().await {
            Ok(body) => body.message.unwrap_or(fallback),
            Err(_) => fallback,
        };
        tracing::debug!("Backend answered {}: {}", status, message);
        Err(ClientError::Server {
            status: Some(status.as_u16()),
            message,
        })
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    pub async fn save_contact(&self, req: &ContactRequest) -> Result<ContactResponse> {
        self.post("/auth/savePhoneNumber", req).await
    }

    pub async fn verify_code(&self, req: &VerifyCodeRequest) -> Result<StatusResponse> {
        self.post("/auth/verifycode", req).await
    }

    pub async fn save_details(&self, req: &DetailsRequest) -> Result<AuthResponse> {
        self.post("/auth/saveDetails", req).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse> {
        self.post("/auth/login", req).await
    }

    // ------------------------------------------------------------------------
    // Captain rides & vehicles
    // ------------------------------------------------------------------------

    pub async fn vehicles(&self, user_id: i64) -> Result<Vec<Vehicle>> {
        let resp: VehiclesResponse = self
            .get(&format!("/rides/vehicles?user_id={}", user_id))
            .await?;
        Ok(resp.vehicles)
    }

    pub async fn add_vehicle(&self, vehicle: &NewVehicle) -> Result<VehicleResponse> {
        self.post("/rides/vehicles/add", vehicle).await
    }

    pub async fn my_rides(&self, user_id: i64) -> Result<RidesResponse> {
        self.get(&format!("/rides/check?user_id={}", user_id)).await
    }

    pub async fn ride(&self, ride_id: i64) -> Result<RideResponse> {
        self.get(&format!("/rides/ride/{}", ride_id)).await
    }

    pub async fn add_ride(&self, ride: &NewRide) -> Result<RideResponse> {
        self.post("/rides/ride/add", ride).await
    }

    pub async fn update_ride(&self, ride: &RideUpdate) -> Result<StatusResponse> {
        self.put("/rides/ride/update", ride).await
    }

    pub async fn delete_ride(&self, ride_id: i64) -> Result<StatusResponse> {
        self.post("/rides/deleteRide", &DeleteRideRequest { id: ride_id })
            .await
    }

    pub async fn previous_rides(&self, user_id: i64, vehicle_id: i64) -> Result<RidesResponse> {
        self.get(&format!(
            "/rides/ride/prev?user_id={}&vehicle_id={}",
            user_id, vehicle_id
        ))
        .await
    }

    pub async fn post_ride(&self, req: &PostRideRequest) -> Result<StatusResponse> {
        self.post("/rides/ride/post", req).await
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    /// Pushes delivered to `user_id` with an id greater than `after`
    pub async fn notifications(&self, user_id: i64, after: Option<i64>) -> Result<Vec<PushPayload>> {
        let path = match after {
            Some(after) => format!("/notifications/{}?after={}", user_id, after),
            None => format!("/notifications/{}", user_id),
        };
        let resp: NotificationsResponse = self.get(&path).await?;
        Ok(resp.notifications)
    }
}

#[async_trait]
impl RideSource for HttpBackend {
    async fn fetch_rides(&self) -> Result<RidesResponse> {
        self.get("/rides/getRides").await
    }
}

#[async_trait]
impl ProfileApi for HttpBackend {
    async fn fetch_profile(&self, user_id: i64) -> Result<Profile> {
        self.get(&format!("/auth/users/{}", user_id)).await
    }

    async fn profile_image(&self, user_id: i64) -> Result<Option<String>> {
        let resp: ProfileImageResponse = self
            .get(&format!("/images/user/{}/profile-image", user_id))
            .await?;
        Ok(resp.profile_image.filter(|p| !p.is_empty()))
    }

    async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<()> {
        let _: StatusResponse = self.put(&format!("/auth/users/{}", user_id), update).await?;
        Ok(())
    }

    async fn upload_image(&self, user_id: i64, file_name: String, bytes: Vec<u8>) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("profileImage", part);
        let resp: ProfileImageResponse = Self::send(
            self.request(Method::POST, &format!("/images/upload/{}", user_id))
                .multipart(form),
        )
        .await?;
        resp.profile_image
            .ok_or_else(|| ClientError::server("Failed to upload profile image"))
    }
}

#[async_trait]
impl RequestApi for HttpBackend {
    async fn check_request(&self, ride_id: i64, requester_id: i64) -> Result<bool> {
        let resp: CheckRequestResponse = self
            .get(&format!("/rides/checkRequest/{}/{}", ride_id, requester_id))
            .await?;
        Ok(resp.exists)
    }

    async fn send_request(&self, body: &SendRequestBody) -> Result<SendRequestResponse> {
        self.post("/rides/sendRequest", body).await
    }

    async fn list_requests(&self, user_id: i64) -> Result<Vec<RideRequest>> {
        let resp: RequestsResponse = self
            .get(&format!("/rides/getRequests/{}", user_id))
            .await?;
        Ok(resp.requests)
    }

    async fn update_request(&self, request_id: i64, status: RequestStatus) -> Result<StatusResponse> {
        self.post(
            "/rides/updateRequest",
            &UpdateRequestBody { request_id, status },
        )
        .await
    }

    async fn cancel_request(&self, request_id: i64) -> Result<StatusResponse> {
        self.post("/rides/cancelRequest", &CancelRequestBody { request_id })
            .await
    }

    async fn dispatch_notification(&self, dispatch: &NotificationDispatch) -> Result<()> {
        let resp: StatusResponse = self.post("/notifications/send", dispatch).await?;
        if !resp.success {
            return Err(ClientError::server(
                resp.message
                    .unwrap_or_else(|| "Notification was not sent".to_string()),
            ));
        }
        Ok(())
    }
}

/// Helper for list endpoints that report `success: false` instead of an error status
pub fn rides_or_error(resp: RidesResponse, fallback: &str) -> Result<Vec<Ride>> {
    match resp.rides {
        Some(rides) if resp.success => Ok(rides),
        _ => Err(ClientError::server(
            resp.message.unwrap_or_else(|| fallback.to_string()),
        )),
    }
}
