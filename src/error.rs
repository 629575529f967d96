//! Error types for the try-on workflow.
//!
//! Every variant carries a message suitable for direct display to the
//! user; backend response bodies are passed through verbatim.

use thiserror::Error;

use crate::api::ApiError;

/// Login and identity failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not logged in: complete the login flow first")]
    NotLoggedIn,

    /// The redirect URL handed back had no `#token=` fragment
    #[error("callback URL carries no login token")]
    MissingCallbackToken,

    /// The "who am I" response had none of the expected identity fields
    #[error("login succeeded but the profile is missing identity fields")]
    MalformedProfile,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A photo upload rejected locally or by the backend
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("not logged in: complete the login flow first")]
    NotLoggedIn,

    #[error("selected file is empty")]
    EmptyFile,

    #[error("unsupported file type {mime}: expected an image")]
    NotAnImage { mime: String },

    /// Byte payloads crossing a UI boundary arrive base64-encoded
    #[error("invalid base64 payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// Only one upload per photo kind may run at a time
    #[error("another {kind} upload is still in progress")]
    InProgress { kind: &'static str },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A try-on generation that failed or could not be issued
#[derive(Debug, Error)]
pub enum TryOnError {
    #[error("not logged in: complete the login flow first")]
    NotLoggedIn,

    #[error("no person photo selected")]
    NoPersonSelected,

    #[error("no garment photo selected")]
    NoGarmentSelected,

    /// Duplicate-submission guard: one generation at a time per session
    #[error("a generation is already running")]
    Busy,

    #[error("no result appeared after {attempts} polling attempts")]
    ResultNotReady { attempts: u32 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A photo deletion rejected by the backend
#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("not logged in: complete the login flow first")]
    NotLoggedIn,

    /// The backend restricts deletion to administrators
    #[error("deletion rejected, admin rights required: {body}")]
    Forbidden { body: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}
