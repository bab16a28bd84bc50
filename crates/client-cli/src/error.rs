use shared::InvalidTransition;

/// Everything a client operation can fail with. Each variant renders as the
/// message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The backend could not be reached or the response was unreadable
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a business error
    #[error("{message}")]
    Server { status: Option<u16>, message: String },

    /// Local session state is missing; the user has to log in again
    #[error("{0}")]
    MissingSession(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Validation(String),

    #[error("You have already sent a request for this ride.")]
    DuplicateRequest,

    #[error("{0}")]
    NotAllowed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request state: {0}")]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Local storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Corrupt data: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn server(message: impl Into<String>) -> Self {
        ClientError::Server {
            status: None,
            message: message.into(),
        }
    }

    pub fn missing_session() -> Self {
        ClientError::MissingSession("You are not logged in. Please log in first.".to_string())
    }

    /// Whether the user should be sent back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::MissingSession(_))
            || matches!(self, ClientError::Server { status: Some(401), .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
