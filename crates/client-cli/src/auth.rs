//! Account flow: registration (contact, code, details), login and logout.

use shared::validation::{normalize_identifier, validate_code, validate_email, validate_phone};
use shared::{ContactRequest, DetailsRequest, LoginRequest, VerifyCodeRequest};

use crate::api::HttpBackend;
use crate::error::{ClientError, Result};
use crate::screen::Screen;
use crate::session::{initial_screen, Session, SessionStore};
use crate::store::keys;

pub struct AccountClient<'a> {
    backend: &'a HttpBackend,
    sessions: &'a SessionStore,
}

impl<'a> AccountClient<'a> {
    pub fn new(backend: &'a HttpBackend, sessions: &'a SessionStore) -> Self {
        Self { backend, sessions }
    }

    /// Start registration. The backend sends a 6-digit code to the email.
    pub async fn register_contact(&self, phone: &str, email: &str, allowed_domains: &[String]) -> Result<i64> {
        let phone = phone.trim();
        let email = email.trim();
        if phone.is_empty() || email.is_empty() {
            return Err(ClientError::Validation(
                "Please enter both phone number and email".to_string(),
            ));
        }
        validate_phone(phone).map_err(ClientError::Validation)?;
        validate_email(email, allowed_domains).map_err(ClientError::Validation)?;

        let resp = self
            .backend
            .save_contact(&ContactRequest {
                phone_number: phone.to_string(),
                email: email.to_string(),
            })
            .await?;
        if !resp.success {
            return Err(ClientError::server(resp.message.unwrap_or_else(|| {
                "Failed to save information. Please try again.".to_string()
            })));
        }

        let user_id = resp.user_id.to_string();
        self.sessions.kv().multi_set(&[
            (keys::PHONE_NUMBER, phone),
            (keys::EMAIL, email),
            (keys::USER_ID, user_id.as_str()),
        ])?;
        tracing::info!("Registration started for user {}", resp.user_id);
        Ok(resp.user_id)
    }

    pub async fn verify_code(&self, code: &str) -> Result<()> {
        let code = code.trim();
        validate_code(code).map_err(ClientError::Validation)?;

        let kv = self.sessions.kv();
        let (Some(phone_number), Some(email)) = (kv.get(keys::PHONE_NUMBER)?, kv.get(keys::EMAIL)?) else {
            return Err(ClientError::MissingSession(
                "User information not found. Please try again.".to_string(),
            ));
        };

        let resp = self
            .backend
            .verify_code(&VerifyCodeRequest {
                phone_number,
                email,
                code: code.to_string(),
            })
            .await?;
        if !resp.success {
            return Err(ClientError::server(
                resp.message
                    .unwrap_or_else(|| "Invalid code. Please try again.".to_string()),
            ));
        }
        Ok(())
    }

    /// Finish registration; the user is signed in afterwards
    pub async fn complete_details(&self, full_name: &str, password: &str, confirm: &str) -> Result<Session> {
        if full_name.trim().is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(ClientError::Validation(
                "Please fill out all the fields.".to_string(),
            ));
        }
        if password != confirm {
            return Err(ClientError::Validation(
                "Passwords do not match. Please try again.".to_string(),
            ));
        }
        let Some(phone_number) = self.sessions.kv().get(keys::PHONE_NUMBER)? else {
            return Err(ClientError::MissingSession(
                "Phone number not found. Please try again.".to_string(),
            ));
        };

        let resp = self
            .backend
            .save_details(&DetailsRequest {
                phone_number,
                full_name: full_name.trim().to_string(),
                password: password.to_string(),
            })
            .await?;
        if !resp.success {
            return Err(ClientError::server("Failed to save details."));
        }

        let session = Session {
            token: resp.token,
            user_id: resp.user_id,
            role: None,
        };
        self.sessions.save(&session)?;
        tracing::info!("Registration completed for user {}", session.user_id);
        Ok(session)
    }

    /// Sign in with a phone number or email. Returns the screen to open next.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Screen> {
        if identifier.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Phone number/email and password are required.".to_string(),
            ));
        }

        let kv = self.sessions.kv();
        let resp = self
            .backend
            .login(&LoginRequest {
                phone_number: normalize_identifier(identifier),
                password: password.to_string(),
                expo_push_token: kv.get(keys::PUSH_TOKEN)?,
            })
            .await?;
        if !resp.success {
            return Err(ClientError::server("Invalid credentials."));
        }

        let stored_role = kv.get(keys::ROLE)?;
        let session = Session {
            token: resp.token,
            user_id: resp.user_id,
            role: stored_role.as_deref().and_then(shared::Role::from_stored),
        };
        self.sessions.save(&session)?;
        kv.set(keys::IDENTIFIER, identifier.trim())?;
        tracing::info!("Logged in as user {}", session.user_id);

        Ok(initial_screen(Some(&session.token), session.role))
    }

    pub fn logout(&self) -> Result<()> {
        self.sessions.clear()?;
        tracing::info!("Logged out, local storage cleared");
        Ok(())
    }
}
