use std::path::Path;

use shared::{Profile, ProfileUpdate};

use crate::api::ProfileApi;
use crate::error::{ClientError, Result};
use crate::session::SessionStore;
use crate::store::keys;

/// Where a loaded profile came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Network,
    Cache,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile {
    pub profile: Profile,
    pub source: ProfileSource,
}

/// Profile reads with a local cache, plus edits and image upload
pub struct ProfileService<'a, B: ProfileApi + ?Sized> {
    backend: &'a B,
    sessions: &'a SessionStore,
}

impl<'a, B: ProfileApi + ?Sized> ProfileService<'a, B> {
    pub fn new(backend: &'a B, sessions: &'a SessionStore) -> Self {
        Self { backend, sessions }
    }

    fn cached(&self) -> Option<Profile> {
        let raw = match self.sessions.kv().get(keys::PROFILE) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Could not read cached profile: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached profile: {}", e);
                None
            }
        }
    }

    fn cache(&self, profile: &Profile) {
        let stored = serde_json::to_string(profile)
            .map_err(ClientError::from)
            .and_then(|json| self.sessions.kv().set(keys::PROFILE, &json));
        if let Err(e) = stored {
            tracing::warn!("Could not cache profile: {}", e);
        }
    }

    /// Never fails: network, then cache, then defaults
    pub async fn load(&self) -> LoadedProfile {
        let user_id = match self.sessions.user_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::info!("User ID not found in storage");
                return LoadedProfile {
                    profile: Profile::default(),
                    source: ProfileSource::Default,
                };
            }
            Err(e) => {
                tracing::warn!("Could not read user id: {}", e);
                return self.fallback();
            }
        };

        let (profile, image) = tokio::join!(
            self.backend.fetch_profile(user_id),
            self.backend.profile_image(user_id)
        );

        match profile {
            Ok(mut profile) => {
                profile.profile_image = match image {
                    Ok(path) => path.unwrap_or_default(),
                    Err(e) => {
                        tracing::warn!("Profile image unavailable: {}", e);
                        String::new()
                    }
                };
                self.cache(&profile);
                LoadedProfile {
                    profile,
                    source: ProfileSource::Network,
                }
            }
            Err(e) => {
                tracing::error!("Error fetching profile data: {}", e);
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> LoadedProfile {
        match self.cached() {
            Some(profile) => LoadedProfile {
                profile,
                source: ProfileSource::Cache,
            },
            None => LoadedProfile {
                profile: Profile::default(),
                source: ProfileSource::Default,
            },
        }
    }

    fn require_user(&self) -> Result<i64> {
        self.sessions
            .user_id()?
            .ok_or_else(ClientError::missing_session)
    }

    pub async fn update(&self, update: &ProfileUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(ClientError::Validation("Nothing to update".to_string()));
        }
        let user_id = self.require_user()?;
        self.backend.update_profile(user_id, update).await?;

        if let Some(mut profile) = self.cached() {
            if let Some(name) = &update.name {
                profile.name = name.clone();
            }
            if let Some(bio) = &update.bio {
                profile.bio = bio.clone();
            }
            if let Some(email) = &update.email {
                profile.email = email.clone();
            }
            if let Some(phone) = &update.phone {
                profile.phone = phone.clone();
            }
            self.cache(&profile);
        }
        Ok(())
    }

    /// Upload a local image file and return its server path
    pub async fn upload_image(&self, path: &Path) -> Result<String> {
        let user_id = self.require_user()?;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ClientError::PermissionDenied(format!(
                    "cannot read {}",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let image = self
            .backend
            .upload_image(user_id, format!("profile_{}.jpg", user_id), bytes)
            .await?;
        tracing::info!("Uploaded profile image for user {}", user_id);

        if let Some(mut profile) = self.cached() {
            profile.profile_image = image.clone();
            self.cache(&profile);
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;
    use async_trait::async_trait;
    use shared::Badge;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProfiles {
        offline: bool,
        image_broken: bool,
        updates: Mutex<Vec<ProfileUpdate>>,
    }

    #[async_trait]
    impl ProfileApi for FakeProfiles {
        async fn fetch_profile(&self, _user_id: i64) -> Result<Profile> {
            if self.offline {
                return Err(ClientError::server("Failed to load profile data"));
            }
            Ok(Profile {
                name: "Hina".to_string(),
                badge: Badge::Silver,
                rating: 4.8,
                ..Profile::default()
            })
        }

        async fn profile_image(&self, user_id: i64) -> Result<Option<String>> {
            if self.offline || self.image_broken {
                return Err(ClientError::server("no image"));
            }
            Ok(Some(format!("uploads/profile_{}.jpg", user_id)))
        }

        async fn update_profile(&self, _user_id: i64, update: &ProfileUpdate) -> Result<()> {
            self.updates.lock().unwrap().push(update.clone());
            Ok(())
        }

        async fn upload_image(&self, _user_id: i64, file_name: String, bytes: Vec<u8>) -> Result<String> {
            assert!(!bytes.is_empty());
            Ok(format!("uploads/{}", file_name))
        }
    }

    fn sessions(user_id: Option<i64>) -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(KvStore::open(dir.path().join("storage.json")));
        if let Some(id) = user_id {
            store.kv().set(keys::USER_ID, &id.to_string()).unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_load_without_user_is_default() {
        let (_dir, sessions) = sessions(None);
        let backend = FakeProfiles::default();
        let loaded = ProfileService::new(&backend, &sessions).load().await;
        assert_eq!(loaded.source, ProfileSource::Default);
        assert_eq!(loaded.profile.name, "User");
        assert_eq!(loaded.profile.badge, Badge::Bronze);
    }

    #[tokio::test]
    async fn test_load_caches_then_falls_back() {
        let (_dir, sessions) = sessions(Some(5));
        let online = FakeProfiles::default();
        let loaded = ProfileService::new(&online, &sessions).load().await;
        assert_eq!(loaded.source, ProfileSource::Network);
        assert_eq!(loaded.profile.profile_image, "uploads/profile_5.jpg");

        let offline = FakeProfiles {
            offline: true,
            ..Default::default()
        };
        let loaded = ProfileService::new(&offline, &sessions).load().await;
        assert_eq!(loaded.source, ProfileSource::Cache);
        assert_eq!(loaded.profile.name, "Hina");
    }

    #[tokio::test]
    async fn test_load_offline_without_cache_is_default() {
        let (_dir, sessions) = sessions(Some(5));
        let offline = FakeProfiles {
            offline: true,
            ..Default::default()
        };
        let loaded = ProfileService::new(&offline, &sessions).load().await;
        assert_eq!(loaded.source, ProfileSource::Default);
        assert_eq!(loaded.profile, Profile::default());
    }

    #[tokio::test]
    async fn test_image_failure_keeps_profile() {
        let (_dir, sessions) = sessions(Some(5));
        let backend = FakeProfiles {
            image_broken: true,
            ..Default::default()
        };
        let loaded = ProfileService::new(&backend, &sessions).load().await;
        assert_eq!(loaded.source, ProfileSource::Network);
        assert_eq!(loaded.profile.profile_image, "");
    }

    #[tokio::test]
    async fn test_update_patches_cache() {
        let (_dir, sessions) = sessions(Some(5));
        let backend = FakeProfiles::default();
        let service = ProfileService::new(&backend, &sessions);
        service.load().await;

        let update = ProfileUpdate {
            bio: Some("Commuting daily".to_string()),
            ..Default::default()
        };
        service.update(&update).await.unwrap();
        assert_eq!(backend.updates.lock().unwrap().len(), 1);
        assert_eq!(service.cached().unwrap().bio, "Commuting daily");

        let err = service.update(&ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_image_patches_cache() {
        let (dir, sessions) = sessions(Some(5));
        let backend = FakeProfiles::default();
        let service = ProfileService::new(&backend, &sessions);
        service.load().await;

        let file = dir.path().join("me.jpg");
        std::fs::write(&file, [0xFF, 0xD8, 0xFF]).unwrap();
        let path = service.upload_image(&file).await.unwrap();
        assert_eq!(path, "uploads/profile_5.jpg");
        assert_eq!(service.cached().unwrap().profile_image, path);
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_storage_error() {
        let (dir, sessions) = sessions(Some(5));
        let backend = FakeProfiles::default();
        let err = ProfileService::new(&backend, &sessions)
            .upload_image(&dir.path().join("missing.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));
    }
}
