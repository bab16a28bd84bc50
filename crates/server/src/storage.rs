use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Public URL prefix the upload directory is served under
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Profile images on local disk
#[derive(Clone)]
pub struct ImageStorage {
    base_path: PathBuf,
}

impl ImageStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Store an uploaded image and return its server-relative path.
    /// Each upload gets a fresh name so cached copies of the old image go stale.
    pub async fn save_profile_image(&self, user_id: i64, original_name: &str, data: &[u8]) -> Result<String> {
        self.ensure_dirs().await?;

        let extension = image_extension(original_name);
        let file_name = format!("profile_{}_{}.{}", user_id, Uuid::new_v4().simple(), extension);
        fs::write(self.base_path.join(&file_name), data).await?;

        Ok(format!("{}/{}", UPLOADS_ROUTE, file_name))
    }

    /// Remove a previously stored image. Paths outside the upload route are ignored.
    pub async fn remove(&self, public_path: &str) -> Result<()> {
        let Some(file_name) = public_path
            .strip_prefix(UPLOADS_ROUTE)
            .map(|p| p.trim_start_matches('/'))
        else {
            return Ok(());
        };
        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            return Ok(());
        }

        let path = self.base_path.join(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Lowercased extension of an uploaded file name, limited to common image types
pub fn image_extension(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "png",
        Some("webp") => "webp",
        Some("gif") => "gif",
        _ => "jpg",
    }
}
