//! Domain errors carried inside `anyhow::Error` and mapped to HTTP statuses by the api layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MomentumError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not signed in to Google")]
    Unauthorized,

    #[error("Google API error ({status}): {body}")]
    Google { status: u16, body: String },
}

impl MomentumError {
    pub fn not_found(what: impl Into<String>) -> Self {
        MomentumError::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        MomentumError::InvalidInput(msg.into())
    }
}
