use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use shared::ProfileImageResponse;

use super::auth::AuthUser;
use crate::{error::AppError, state::AppState};

/// Multipart field the client sends the picture in
const IMAGE_FIELD: &str = "profileImage";

/// GET /images/user/:id/profile-image
pub async fn profile_image(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<ProfileImageResponse>, AppError> {
    let user = state
        .db
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ProfileImageResponse {
        profile_image: user.profile_image.filter(|p| !p.is_empty()),
    }))
}

/// POST /images/upload/:id
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ProfileImageResponse>, AppError> {
    auth.ensure_self(user_id)?;

    let max_bytes = state.config.uploads.max_image_bytes;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("profile.jpg").to_string();
        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(AppError::BadRequest(
                    "Only image files can be uploaded".to_string(),
                ));
            }
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
        if data.is_empty() {
            return Err(AppError::BadRequest("The uploaded image is empty".to_string()));
        }
        if data.len() > max_bytes {
            return Err(AppError::BadRequest(format!(
                "Image exceeds the {} MB limit",
                max_bytes / (1024 * 1024)
            )));
        }

        let previous = state
            .db
            .get_user_by_id(user_id)
            .await?
            .and_then(|u| u.profile_image);
        let path = state
            .storage
            .save_profile_image(user_id, &file_name, &data)
            .await?;
        state.db.set_profile_image(user_id, &path).await?;

        if let Some(previous) = previous {
            if let Err(e) = state.storage.remove(&previous).await {
                tracing::warn!("Failed to remove old profile image {}: {}", previous, e);
            }
        }

        tracing::info!("User {} uploaded a profile image ({} bytes)", user_id, data.len());
        return Ok(Json(ProfileImageResponse {
            profile_image: Some(path),
        }));
    }

    Err(AppError::BadRequest("No image uploaded".to_string()))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::TestApp;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn multipart_request(uri: &str, token: &str, field: &str, content_type: &str) -> Request<Body> {
        let boundary = "chalo-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"profile_1.jpg\"\r\nContent-Type: {ct}\r\n\r\nJPEGDATA\r\n--{b}--\r\n",
            b = boundary,
            f = field,
            ct = content_type,
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_upload_then_read_path() {
        let app = TestApp::new().await;
        let (user_id, token) = app.register("3001234567", "Ali").await;

        let (_, body) = app
            .get(&format!("/images/user/{}/profile-image", user_id), None)
            .await;
        assert_eq!(body["profileImage"], Value::Null);

        let uri = format!("/images/upload/{}", user_id);
        let (status, body) = send(&app, multipart_request(&uri, &token, "profileImage", "image/jpeg")).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let path = body["profileImage"].as_str().unwrap().to_string();
        assert!(path.starts_with("/uploads/profile_"));

        let (_, body) = app
            .get(&format!("/images/user/{}/profile-image", user_id), None)
            .await;
        assert_eq!(body["profileImage"], json!(path));

        // The stored file is served statically
        let (status, _) = app.get(&path, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let app = TestApp::new().await;
        let (user_id, token) = app.register("3001234567", "Ali").await;
        let (_, other_token) = app.register("3007654321", "Sara").await;
        let uri = format!("/images/upload/{}", user_id);

        let (status, _) = send(&app, multipart_request(&uri, &other_token, "profileImage", "image/jpeg")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, multipart_request(&uri, &token, "avatar", "image/jpeg")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("No image uploaded"));

        let (status, _) = send(&app, multipart_request(&uri, &token, "profileImage", "text/plain")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
