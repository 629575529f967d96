//! Data models and structures used throughout the application

use serde::{Deserialize, Serialize};

/// The two kinds of photo the try-on backend distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoKind {
    Person,
    Garment,
}

impl PhotoKind {
    /// Path segment used by the upload and delete endpoints
    pub fn path_segment(&self) -> &'static str {
        match self {
            PhotoKind::Person => "person",
            PhotoKind::Garment => "cloth",
        }
    }

    /// Path segment used by the listing endpoints
    pub fn listing_segment(&self) -> &'static str {
        match self {
            PhotoKind::Person => "persons",
            PhotoKind::Garment => "my-clothes",
        }
    }

    /// Human-readable label for log and error messages
    pub fn label(&self) -> &'static str {
        match self {
            PhotoKind::Person => "person",
            PhotoKind::Garment => "garment",
        }
    }
}

/// Authenticated user profile returned by the "who am I" endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub credits: Option<i64>,
}

impl UserProfile {
    /// Display identity, falling back email, then username, then name
    pub fn display_name(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .or(self.name.as_deref())
    }
}

/// Response from a photo upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: i64,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Photo record returned by the image listing endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePhoto {
    pub id: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub fitting_type: Option<String>,
}

/// Body of a try-on generation request
#[derive(Debug, Clone, Serialize)]
pub struct TryOnRequest {
    pub user_id: i64,
    pub person_photo_id: i64,
    pub cloth_photo_id: i64,
}

/// Response from a try-on generation request
#[derive(Debug, Clone, Deserialize)]
pub struct TryOnReceipt {
    #[serde(default)]
    pub result_filename: Option<String>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub result_id: Option<i64>,
}

/// Result record returned by the results listing and lookup endpoints.
/// Different backend versions carry the image URL under different keys.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub result_filename: Option<String>,
}

impl ResultRecord {
    /// First usable image URL, checking the known key variants in order
    pub fn any_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or(self.url.as_deref())
            .or(self.result_url.as_deref())
    }
}

/// A photo the user has uploaded, available for re-selection
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedPhoto {
    /// Server-assigned identifier
    pub id: i64,
    /// Displayable image reference (local path or remote URL)
    pub preview: String,
}

/// A completed try-on kept in the local history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub person_preview: String,
    pub garment_preview: String,
    pub result_filename: String,
    pub result_url: String,
    pub created_at: String,
}
