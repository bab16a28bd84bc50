use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::validation::{normalize_identifier, validate_code, validate_email, validate_phone};
use shared::{
    AuthResponse, ContactRequest, ContactResponse, DetailsRequest, LoginRequest, Profile,
    ProfileStats, ProfileUpdate, StatusResponse, VerifyCodeRequest,
};

use crate::{
    error::AppError,
    mail,
    state::{AppState, CodeState},
};

/// Offered-or-joined rides per virtual tree
const RIDES_PER_TREE: i64 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
}

// ============================================================================
// Bearer auth
// ============================================================================

/// The caller, taken from a valid `Authorization: Bearer` token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
}

impl AuthUser {
    /// Reject callers acting on someone else's account
    pub fn ensure_self(&self, user_id: i64) -> Result<(), AppError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You can only access your own account".to_string(),
            ))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::AuthError("Please log in to continue".to_string()))?;

        let claims = verify_token(bearer.token(), &state.config.auth.jwt_secret)?;
        let user_id = claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;
        Ok(AuthUser { user_id })
    }
}

fn generate_token(user_id: i64, auth_config: &crate::config::AuthConfig) -> Result<String, AppError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::AuthError("Your session has expired. Please log in again.".to_string())
    })
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

// ============================================================================
// Registration
// ============================================================================

/// Step one: remember phone + email and mail a 6-digit code
/// POST /auth/savePhoneNumber
pub async fn save_phone_number(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, AppError> {
    let phone = req.phone_number.trim();
    let email = req.email.trim().to_lowercase();
    validate_phone(phone).map_err(AppError::BadRequest)?;
    validate_email(&email, &state.config.registration.allowed_email_domains)
        .map_err(AppError::BadRequest)?;

    let existing = state.db.get_user_by_phone(phone).await?;
    if existing.as_ref().is_some_and(|u| u.is_registered()) {
        return Err(AppError::Conflict(
            "This phone number is already registered. Please log in.".to_string(),
        ));
    }
    if let Some(owner) = state.db.get_user_by_email(&email).await? {
        if existing.as_ref().map(|u| u.id) != Some(owner.id) {
            return Err(AppError::Conflict(
                "This email is already registered.".to_string(),
            ));
        }
    }

    let user_id = match existing {
        Some(user) => {
            if user.email != email {
                state.db.update_contact_email(user.id, &email).await?;
            }
            user.id
        }
        None => state.db.create_user(phone, &email).await?,
    };

    let expiry = state.config.auth.code_expiry_minutes;
    let code = generate_code();
    state.verification_codes.retain(|_, v| v.expires_at > Utc::now());
    state.verification_codes.insert(
        phone.to_string(),
        CodeState {
            code: code.clone(),
            email: email.clone(),
            expires_at: Utc::now() + Duration::minutes(expiry),
        },
    );

    if let Err(e) = mail::send_verification_code(&state.config.smtp, &email, &code, expiry).await {
        tracing::error!("Failed to send verification email to {}: {}", email, e);
        state.verification_codes.remove(phone);
        return Err(AppError::Internal(format!("verification email failed: {}", e)));
    }

    tracing::info!("Registration started for user {}", user_id);
    Ok(Json(ContactResponse {
        success: true,
        user_id,
        message: Some("A verification code has been sent to your email.".to_string()),
    }))
}

/// POST /auth/verifycode
pub async fn verify_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let phone = req.phone_number.trim();
    validate_code(req.code.trim()).map_err(AppError::BadRequest)?;

    state.verification_codes.retain(|_, v| v.expires_at > Utc::now());

    let pending = state.verification_codes.get(phone).ok_or_else(|| {
        AppError::BadRequest("Your code has expired. Please request a new one.".to_string())
    })?;
    if pending.code != req.code.trim() || !pending.email.eq_ignore_ascii_case(req.email.trim()) {
        return Err(AppError::BadRequest(
            "Invalid code. Please try again.".to_string(),
        ));
    }
    drop(pending); // Release the lock before making DB calls

    let user = state
        .db
        .get_user_by_phone(phone)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    state.db.mark_verified(user.id).await?;
    state.verification_codes.remove(phone);

    tracing::info!("User {} verified their email", user.id);
    Ok(Json(StatusResponse::ok_with("Verification successful")))
}

/// Step three: name + password; answers with a session token
/// POST /auth/saveDetails
pub async fn save_details(
    State(state): State<AppState>,
    Json(req): Json<DetailsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Please enter your full name.".to_string()));
    }
    if req.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let user = state
        .db
        .get_user_by_phone(req.phone_number.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if !user.verified {
        return Err(AppError::Forbidden(
            "Please verify your email before completing registration.".to_string(),
        ));
    }
    if user.is_registered() {
        return Err(AppError::Conflict(
            "Registration is already complete. Please log in.".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    state
        .db
        .complete_registration(user.id, full_name, &password_hash)
        .await?;

    let token = generate_token(user.id, &state.config.auth)?;
    tracing::info!("Registration completed for user {}", user.id);

    Ok(Json(AuthResponse {
        success: true,
        token,
        user_id: user.id,
    }))
}

/// Login with a phone number or an email address
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::AuthError("Invalid credentials.".to_string());

    let identifier = normalize_identifier(&req.phone_number);
    let user = if identifier.contains('@') {
        state.db.get_user_by_email(&identifier).await?
    } else {
        state.db.get_user_by_phone(&identifier).await?
    };
    let user = user.ok_or_else(invalid)?;
    let stored_hash = user.password_hash.as_deref().ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    if let Some(push_token) = req.expo_push_token.as_deref().filter(|t| !t.is_empty()) {
        state.db.set_push_token(user.id, push_token).await?;
    }

    let token = generate_token(user.id, &state.config.auth)?;
    tracing::info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        success: true,
        token,
        user_id: user.id,
    }))
}

// ============================================================================
// Profiles
// ============================================================================

/// GET /auth/users/:id
/// Contact details are only included for the account owner.
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Profile>, AppError> {
    let user = state
        .db
        .get_user_by_id(user_id)
        .await?
        .filter(|u| u.is_registered())
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let stats = state.db.user_stats(user_id).await?;
    let total_rides = stats.rides_offered + stats.rides_joined;
    let is_self = auth.user_id == user_id;

    Ok(Json(Profile {
        name: user.full_name.clone().unwrap_or_else(|| "User".to_string()),
        bio: user.bio.clone().unwrap_or_default(),
        email: if is_self { user.email.clone() } else { String::new() },
        phone: if is_self { user.phone_number.clone() } else { String::new() },
        profile_image: user.profile_image.clone().unwrap_or_default(),
        stats: ProfileStats {
            total_rides,
            money_saved: stats.money_saved,
            trees_planted: total_rides / RIDES_PER_TREE,
        },
        badge: user.badge(),
        rating: user.rating,
    }))
}

/// PUT /auth/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Json(mut update): Json<ProfileUpdate>,
) -> Result<Json<StatusResponse>, AppError> {
    auth.ensure_self(user_id)?;
    if update.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    if let Some(name) = update.name.as_deref() {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Name cannot be empty".to_string()));
        }
    }
    if let Some(email) = update.email.as_mut() {
        *email = email.trim().to_lowercase();
        validate_email(email, &state.config.registration.allowed_email_domains)
            .map_err(AppError::BadRequest)?;
        if let Some(owner) = state.db.get_user_by_email(email).await? {
            if owner.id != user_id {
                return Err(AppError::Conflict("This email is already registered.".to_string()));
            }
        }
    }
    if let Some(phone) = update.phone.as_mut() {
        *phone = normalize_identifier(phone);
        validate_phone(phone).map_err(AppError::BadRequest)?;
        if let Some(owner) = state.db.get_user_by_phone(phone).await? {
            if owner.id != user_id {
                return Err(AppError::Conflict(
                    "This phone number is already registered.".to_string(),
                ));
            }
        }
    }

    if !state.db.update_profile(user_id, &update).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!("User {} updated their profile", user_id);
    Ok(Json(StatusResponse::ok_with("Profile updated successfully")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[test]
    fn test_token_roundtrip_and_tamper() {
        let config = crate::config::Config::default();
        let token = generate_token(42, &config.auth).unwrap();
        let claims = verify_token(&token, &config.auth.jwt_secret).unwrap();
        assert_eq!(claims.sub, "42");
        assert!(verify_token(&token, "another-secret").is_err());
    }

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert!(validate_code(&code).is_ok(), "{}", code);
        }
    }

    #[tokio::test]
    async fn test_registration_and_login() {
        let app = TestApp::new().await;
        let (user_id, _) = app.register("3001234567", "Ali").await;

        // By phone, with the national prefix
        let (status, body) = app
            .post(
                "/auth/login",
                None,
                json!({ "phoneNumber": "03001234567", "password": "secret123", "expoPushToken": "ExponentPushToken[abc]" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"].as_i64(), Some(user_id));
        let user = app.state.db.get_user_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.push_token.as_deref(), Some("ExponentPushToken[abc]"));

        // By email, any casing
        let (status, _) = app
            .post(
                "/auth/login",
                None,
                json!({ "phoneNumber": "U3001234567@MAJU.edu.pk", "password": "secret123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .post(
                "/auth/login",
                None,
                json!({ "phoneNumber": "3001234567", "password": "wrong" }),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Invalid credentials."));
    }

    #[tokio::test]
    async fn test_registration_rejects_bad_contact() {
        let app = TestApp::new().await;

        let (status, body) = app
            .post(
                "/auth/savePhoneNumber",
                None,
                json!({ "phoneNumber": "3001234567", "email": "ali@gmail.com" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Please use an email address from @maju.edu.pk"));

        app.register("3001234567", "Ali").await;
        let (status, _) = app
            .post(
                "/auth/savePhoneNumber",
                None,
                json!({ "phoneNumber": "3001234567", "email": "other@maju.edu.pk" }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_wrong_code_and_unverified_details() {
        let app = TestApp::new().await;
        app.post(
            "/auth/savePhoneNumber",
            None,
            json!({ "phoneNumber": "3009999999", "email": "sara@maju.edu.pk" }),
        )
        .await;

        let real = app.state.verification_codes.get("3009999999").unwrap().code.clone();
        let wrong = if real == "000000" { "111111" } else { "000000" };
        let (status, body) = app
            .post(
                "/auth/verifycode",
                None,
                json!({ "phoneNumber": "3009999999", "email": "sara@maju.edu.pk", "code": wrong }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Invalid code. Please try again."));

        let (status, _) = app
            .post(
                "/auth/saveDetails",
                None,
                json!({ "phoneNumber": "3009999999", "fullName": "Sara", "password": "secret123" }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_expired_code() {
        let app = TestApp::new().await;
        app.post(
            "/auth/savePhoneNumber",
            None,
            json!({ "phoneNumber": "3009999999", "email": "sara@maju.edu.pk" }),
        )
        .await;
        let code = {
            let mut entry = app.state.verification_codes.get_mut("3009999999").unwrap();
            entry.expires_at = Utc::now() - Duration::seconds(1);
            entry.code.clone()
        };

        let (status, body) = app
            .post(
                "/auth/verifycode",
                None,
                json!({ "phoneNumber": "3009999999", "email": "sara@maju.edu.pk", "code": code }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Your code has expired. Please request a new one."));
    }

    #[tokio::test]
    async fn test_profile_read_and_update() {
        let app = TestApp::new().await;
        let (ali, ali_token) = app.register("3001234567", "Ali").await;
        let (_, sara_token) = app.register("3007654321", "Sara").await;

        let (status, body) = app.get(&format!("/auth/users/{}", ali), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));

        let (status, body) = app
            .call(
                Method::PUT,
                &format!("/auth/users/{}", ali),
                Some(&ali_token),
                Some(json!({ "bio": "Daily commuter" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (_, body) = app.get(&format!("/auth/users/{}", ali), Some(&ali_token)).await;
        assert_eq!(body["name"], json!("Ali"));
        assert_eq!(body["bio"], json!("Daily commuter"));
        assert_eq!(body["phone"], json!("3001234567"));
        assert_eq!(body["badge"], json!("Bronze"));

        // Other users see the profile without contact details
        let (_, body) = app.get(&format!("/auth/users/{}", ali), Some(&sara_token)).await;
        assert_eq!(body["name"], json!("Ali"));
        assert_eq!(body["phone"], json!(""));

        let (status, _) = app
            .call(
                Method::PUT,
                &format!("/auth/users/{}", ali),
                Some(&sara_token),
                Some(json!({ "bio": "hacked" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(Method::PUT, &format!("/auth/users/{}", ali), Some(&ali_token), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Nothing to update"));
    }
}
