use shared::Role;

use crate::error::{ClientError, Result};
use crate::screen::Screen;
use crate::store::{keys, KvStore};

/// Who is signed in and in which mode
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub role: Option<Role>,
}

/// First screen for the given persisted state
pub fn initial_screen(token: Option<&str>, role: Option<Role>) -> Screen {
    match (token, role) {
        (Some(t), Some(_)) if !t.is_empty() => Screen::Menu,
        (Some(t), None) if !t.is_empty() => Screen::Selection,
        _ => Screen::Home,
    }
}

/// Session persistence on top of local key-value storage
#[derive(Debug, Clone)]
pub struct SessionStore {
    kv: KvStore,
}

impl SessionStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    fn role(&self) -> Result<Option<Role>> {
        Ok(self.kv.get(keys::ROLE)?.as_deref().and_then(Role::from_stored))
    }

    pub fn user_id(&self) -> Result<Option<i64>> {
        Ok(self
            .kv
            .get(keys::USER_ID)?
            .and_then(|id| id.trim().parse().ok()))
    }

    /// Full session, or `None` when token or user id is missing
    pub fn load(&self) -> Result<Option<Session>> {
        let token = match self.kv.get(keys::TOKEN)? {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(None),
        };
        let Some(user_id) = self.user_id()? else {
            return Ok(None);
        };
        Ok(Some(Session {
            token,
            user_id,
            role: self.role()?,
        }))
    }

    /// Session for a protected command
    pub fn require(&self) -> Result<Session> {
        self.load()?.ok_or_else(ClientError::missing_session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let user_id = session.user_id.to_string();
        let mut entries = vec![(keys::TOKEN, session.token.as_str()), (keys::USER_ID, user_id.as_str())];
        if let Some(role) = session.role {
            entries.push((keys::ROLE, role.as_str()));
        }
        self.kv.multi_set(&entries)
    }

    pub fn set_role(&self, role: Role) -> Result<()> {
        self.kv.set(keys::ROLE, role.as_str())
    }

    /// Logout: wipes all local state, not just the session keys
    pub fn clear(&self) -> Result<()> {
        self.kv.clear()
    }

    /// Screen to open at startup. Storage errors fall back to Home.
    pub fn initial_screen(&self) -> Screen {
        let token = match self.kv.get(keys::TOKEN) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Error checking token or role: {}", e);
                return Screen::Home;
            }
        };
        let role = self.role().unwrap_or_else(|e| {
            tracing::error!("Error checking token or role: {}", e);
            None
        });
        initial_screen(token.as_deref(), role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_sessions() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(KvStore::open(dir.path().join("storage.json")));
        (dir, store)
    }

    #[test]
    fn test_initial_screen_rules() {
        assert_eq!(initial_screen(Some("tok"), Some(Role::Captain)), Screen::Menu);
        assert_eq!(initial_screen(Some("tok"), Some(Role::Passenger)), Screen::Menu);
        assert_eq!(initial_screen(Some("tok"), None), Screen::Selection);
        assert_eq!(initial_screen(None, Some(Role::Captain)), Screen::Home);
        assert_eq!(initial_screen(Some(""), Some(Role::Captain)), Screen::Home);
        assert_eq!(initial_screen(None, None), Screen::Home);
    }

    #[test]
    fn test_captain_with_token_opens_menu() {
        let (_dir, sessions) = temp_sessions();
        sessions.kv().set(keys::TOKEN, "tok").unwrap();
        sessions.kv().set(keys::ROLE, "Captain").unwrap();
        assert_eq!(sessions.initial_screen(), Screen::Menu);
    }

    #[test]
    fn test_unrecognized_role_opens_selection() {
        let (_dir, sessions) = temp_sessions();
        sessions.kv().set(keys::TOKEN, "tok").unwrap();
        sessions.kv().set(keys::ROLE, "captain").unwrap();
        assert_eq!(sessions.initial_screen(), Screen::Selection);
    }

    #[test]
    fn test_save_load_clear() {
        let (_dir, sessions) = temp_sessions();
        assert_eq!(sessions.load().unwrap(), None);
        assert!(sessions.require().unwrap_err().requires_login());

        let session = Session {
            token: "jwt".to_string(),
            user_id: 42,
            role: Some(Role::Passenger),
        };
        sessions.save(&session).unwrap();
        assert_eq!(sessions.load().unwrap(), Some(session));

        sessions.set_role(Role::Captain).unwrap();
        assert_eq!(sessions.require().unwrap().role, Some(Role::Captain));

        sessions.clear().unwrap();
        assert_eq!(sessions.load().unwrap(), None);
        assert_eq!(sessions.initial_screen(), Screen::Home);
    }

    #[test]
    fn test_token_without_user_id_is_not_a_session() {
        let (_dir, sessions) = temp_sessions();
        sessions.kv().set(keys::TOKEN, "jwt").unwrap();
        assert_eq!(sessions.load().unwrap(), None);
        assert_eq!(sessions.initial_screen(), Screen::Selection);
    }
}
