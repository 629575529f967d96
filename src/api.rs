//! REST API client for the try-on backend.
//!
//! Wraps the backend HTTP endpoints (identity lookup, photo upload and
//! deletion, try-on generation, result retrieval) using [`reqwest`].
//! The workflow engine talks to the backend exclusively through the
//! [`TryOnBackend`] trait so tests can substitute an in-memory fake;
//! [`TryOnApi`] is the production implementation.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::models::{
    PhotoKind, RemotePhoto, ResultRecord, TryOnReceipt, TryOnRequest, UploadReceipt, UserProfile,
};

/// Errors from the backend REST layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("backend error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body, passed through for user display.
        body: String,
    },

    /// Local file I/O failed while saving a download.
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status code, when this error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Backend operations the try-on workflow depends on.
///
/// Every method is a single network round trip: no retries, no caching,
/// no local state mutation. Callers own all state transitions based on
/// the returned results.
#[async_trait]
pub trait TryOnBackend: Send + Sync {
    /// `GET /users/me` with the given bearer token.
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ApiError>;

    /// `POST /upload/{person|cloth}` as a multipart form (field `file`).
    async fn upload_photo(
        &self,
        kind: PhotoKind,
        filename: &str,
        bytes: Vec<u8>,
        mime: &str,
        token: &str,
    ) -> Result<UploadReceipt, ApiError>;

    /// `GET /images/{persons|my-clothes}` for the caller's uploads.
    async fn list_photos(&self, kind: PhotoKind, token: &str) -> Result<Vec<RemotePhoto>, ApiError>;

    /// `GET /images/shop-clothes`, unauthenticated catalog listing.
    async fn shop_clothes(&self) -> Result<Vec<RemotePhoto>, ApiError>;

    /// `DELETE /admin/photos/{person|cloth}/{id}`.
    async fn delete_photo(&self, kind: PhotoKind, id: i64, token: &str) -> Result<(), ApiError>;

    /// `POST /tryon` with the three required identifiers.
    async fn request_tryon(
        &self,
        request: &TryOnRequest,
        token: &str,
    ) -> Result<TryOnReceipt, ApiError>;

    /// `GET /results/{user_id}`, newest first. Used by the polling fallback.
    async fn list_results(&self, user_id: i64, token: &str) -> Result<Vec<ResultRecord>, ApiError>;

    /// `GET /results/{user_id}/{result_id}`.
    async fn get_result(
        &self,
        user_id: i64,
        result_id: i64,
        token: &str,
    ) -> Result<ResultRecord, ApiError>;

    /// Plain GET of an absolute image URL, returning the raw bytes.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError>;

    /// Display URL for a result image filename. Pure URL composition.
    fn result_image_url(&self, filename: &str) -> String;
}

/// HTTP client for a single try-on backend instance.
pub struct TryOnApi {
    client: reqwest::Client,
    base_url: String,
}

impl TryOnApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `https://api.example.com`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Browser URL that starts the external OAuth login flow. The
    /// backend redirects back to `redirect_uri` with a `#token=` fragment.
    pub fn login_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}/auth/google/login?redirect_uri={}",
            self.base_url,
            urlencoding::encode(redirect_uri)
        )
    }

    /// Download an image to a local file, streaming it chunk by chunk.
    pub async fn download_to_file(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        Ok(())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl TryOnBackend for TryOnApi {
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let response = self
            .client
            .get(format!("{}/users/me", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn upload_photo(
        &self,
        kind: PhotoKind,
        filename: &str,
        bytes: Vec<u8>,
        mime: &str,
        token: &str,
    ) -> Result<UploadReceipt, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!(
                "{}/upload/{}",
                self.base_url,
                kind.path_segment()
            ))
            .header("Authorization", format!("Bearer {}", token))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn list_photos(&self, kind: PhotoKind, token: &str) -> Result<Vec<RemotePhoto>, ApiError> {
        let response = self
            .client
            .get(format!(
                "{}/images/{}",
                self.base_url,
                kind.listing_segment()
            ))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn shop_clothes(&self) -> Result<Vec<RemotePhoto>, ApiError> {
        let response = self
            .client
            .get(format!("{}/images/shop-clothes", self.base_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn delete_photo(&self, kind: PhotoKind, id: i64, token: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!(
                "{}/admin/photos/{}/{}",
                self.base_url,
                kind.path_segment(),
                id
            ))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn request_tryon(
        &self,
        request: &TryOnRequest,
        token: &str,
    ) -> Result<TryOnReceipt, ApiError> {
        let response = self
            .client
            .post(format!("{}/tryon", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn list_results(&self, user_id: i64, token: &str) -> Result<Vec<ResultRecord>, ApiError> {
        let response = self
            .client
            .get(format!("{}/results/{}", self.base_url, user_id))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn get_result(
        &self,
        user_id: i64,
        result_id: i64,
        token: &str,
    ) -> Result<ResultRecord, ApiError> {
        let response = self
            .client
            .get(format!(
                "{}/results/{}/{}",
                self.base_url, user_id, result_id
            ))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn result_image_url(&self, filename: &str) -> String {
        format!("{}/results/image/{}", self.base_url, filename)
    }
}
