//! The try-on studio: wires the session, the two wardrobes, the local
//! history, and the backend into one workflow engine.
//!
//! `generate()` is the heart: it refuses until a token and both photo
//! selections are present, issues exactly one generation request,
//! derives a display URL from the response (polling the results
//! listing as a bounded fallback), and prepends a history entry. An
//! atomic in-flight flag refuses overlapping generations regardless of
//! which workflow variant triggered them.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};

use crate::api::{ApiError, TryOnBackend};
use crate::db::HistoryStore;
use crate::error::{AuthError, DeletionError, TryOnError, UploadError};
use crate::history::HistoryLog;
use crate::image;
use crate::models::{HistoryEntry, PhotoKind, TryOnRequest, UploadedPhoto, UserProfile};
use crate::session::{extract_callback_token, SessionStore};
use crate::shop::{Cart, CatalogGarment};
use crate::wardrobe::Wardrobe;

/// Poll fallback defaults: up to 10 attempts, 1 second apart
const DEFAULT_POLL_ATTEMPTS: u32 = 10;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Workflow engine for one client session
pub struct Studio {
    backend: Arc<dyn TryOnBackend>,
    session: SessionStore,
    persons: Wardrobe,
    garments: Wardrobe,
    history: HistoryLog,
    cart: Cart,
    store: Mutex<Option<HistoryStore>>,
    in_flight: AtomicBool,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl Studio {
    pub fn new(backend: Arc<dyn TryOnBackend>, session: SessionStore) -> Self {
        Self {
            backend,
            session,
            persons: Wardrobe::new(PhotoKind::Person),
            garments: Wardrobe::new(PhotoKind::Garment),
            history: HistoryLog::new(),
            cart: Cart::new(),
            store: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Attaches a SQLite store and restores the history it holds
    pub fn with_history_store(mut self, store: HistoryStore) -> Self {
        match store.load() {
            Ok(entries) => {
                if !entries.is_empty() {
                    info!("[studio] Restored {} history entries", entries.len());
                }
                self.history = HistoryLog::from_entries(entries);
            }
            Err(e) => warn!("[studio] Could not restore history: {}", e),
        }
        *self.store.lock().unwrap() = Some(store);
        self
    }

    /// Overrides the result-discovery poll tuning
    pub fn with_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Wardrobe for one photo kind
    pub fn wardrobe(&self, kind: PhotoKind) -> &Wardrobe {
        match kind {
            PhotoKind::Person => &self.persons,
            PhotoKind::Garment => &self.garments,
        }
    }

    /// Whether a generation is currently in flight
    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    // ---- authentication ----

    /// Completes the OAuth flow from the full callback URL. Returns the
    /// profile and the URL with its token fragment stripped.
    pub async fn login_from_callback(&self, url: &str) -> Result<(UserProfile, String), AuthError> {
        let (token, stripped) =
            extract_callback_token(url).ok_or(AuthError::MissingCallbackToken)?;
        let profile = self.login_with_token(token).await?;
        Ok((profile, stripped))
    }

    /// Exchanges a bearer token for a profile and stores the session.
    /// A profile without any identity field is rejected as malformed
    /// and nothing is stored.
    pub async fn login_with_token(&self, token: String) -> Result<UserProfile, AuthError> {
        let profile = self.backend.fetch_profile(&token).await?;
        if profile.display_name().is_none() {
            return Err(AuthError::MalformedProfile);
        }
        self.session.log_in(token, profile.clone());
        Ok(profile)
    }

    pub fn log_out(&self) {
        self.session.log_out();
    }

    // ---- wardrobe operations ----

    /// Reconciles both Available lists with the backend's listings.
    /// A no-op when logged out.
    pub async fn refresh_wardrobes(&self) -> Result<(), ApiError> {
        let token = match self.session.token() {
            Some(token) => token,
            None => return Ok(()),
        };
        let persons = self.backend.list_photos(PhotoKind::Person, &token).await?;
        self.persons.reconcile(persons);
        let garments = self.backend.list_photos(PhotoKind::Garment, &token).await?;
        self.garments.reconcile(garments);
        Ok(())
    }

    /// Validates, normalizes, and uploads a photo, selecting the result
    pub async fn upload_photo(
        &self,
        kind: PhotoKind,
        filename: &str,
        bytes: Vec<u8>,
        preview: Option<String>,
    ) -> Result<UploadedPhoto, UploadError> {
        let token = self.session.token().ok_or(UploadError::NotLoggedIn)?;
        image::validate(filename, &bytes)?;
        let prepared = image::normalize_to_jpeg(filename, bytes);
        self.wardrobe(kind)
            .upload(self.backend.as_ref(), &token, prepared, preview)
            .await
    }

    /// Uploads a photo read from a local file
    pub async fn upload_photo_from_path(
        &self,
        kind: PhotoKind,
        path: &Path,
    ) -> Result<UploadedPhoto, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(ApiError::from)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jpg".to_string());
        let preview = path.display().to_string();
        self.upload_photo(kind, &filename, bytes, Some(preview))
            .await
    }

    /// Uploads a photo handed over as a base64 payload, the shape UI
    /// boundaries deliver file contents in
    pub async fn upload_photo_base64(
        &self,
        kind: PhotoKind,
        filename: &str,
        data_base64: &str,
    ) -> Result<UploadedPhoto, UploadError> {
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data_base64)?;
        self.upload_photo(kind, filename, bytes, None).await
    }

    /// Selects an already-available photo, no network involved
    pub fn select_photo(&self, kind: PhotoKind, id: i64) -> bool {
        self.wardrobe(kind).select(id)
    }

    /// Deletes a photo backend-first; local state changes only when the
    /// backend accepted
    pub async fn delete_photo(&self, kind: PhotoKind, id: i64) -> Result<bool, DeletionError> {
        let token = self.session.token().ok_or(DeletionError::NotLoggedIn)?;
        self.wardrobe(kind)
            .delete(self.backend.as_ref(), &token, id)
            .await
    }

    /// Fetches a catalog garment's image and re-uploads it to obtain a
    /// server-side garment id, then selects it. A failure anywhere
    /// leaves the garment selection untouched.
    pub async fn import_catalog_garment(
        &self,
        garment: &CatalogGarment,
    ) -> Result<UploadedPhoto, UploadError> {
        if self.session.token().is_none() {
            return Err(UploadError::NotLoggedIn);
        }
        info!("[catalog] Importing garment {} for fitting", garment.id);
        let bytes = self.backend.fetch_image(&garment.image_url).await?;
        let filename = filename_from_url(&garment.image_url);
        self.upload_photo(
            PhotoKind::Garment,
            &filename,
            bytes,
            Some(garment.image_url.clone()),
        )
        .await
    }

    // ---- generation ----

    /// Runs one try-on generation with the current selections.
    ///
    /// Preconditions (checked before any network call): a session token,
    /// a selected person photo, and a selected garment photo. At most
    /// one generation runs at a time; overlapping calls get `Busy`.
    pub async fn generate(&self) -> Result<HistoryEntry, TryOnError> {
        let token = self.session.token().ok_or(TryOnError::NotLoggedIn)?;
        let user_id = self.session.user_id().ok_or(TryOnError::NotLoggedIn)?;
        let person = self
            .persons
            .selected_photo()
            .ok_or(TryOnError::NoPersonSelected)?;
        let garment = self
            .garments
            .selected_photo()
            .ok_or(TryOnError::NoGarmentSelected)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TryOnError::Busy);
        }

        let result = self
            .run_generation(&token, user_id, &person, &garment)
            .await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_generation(
        &self,
        token: &str,
        user_id: i64,
        person: &UploadedPhoto,
        garment: &UploadedPhoto,
    ) -> Result<HistoryEntry, TryOnError> {
        let request = TryOnRequest {
            user_id,
            person_photo_id: person.id,
            cloth_photo_id: garment.id,
        };
        info!(
            "[generate] Requesting try-on: person {} + garment {}",
            person.id, garment.id
        );

        let receipt = self.backend.request_tryon(&request, token).await?;

        let (filename, url) = match (receipt.result_url, receipt.result_filename) {
            (Some(url), filename) => {
                let filename = filename.unwrap_or_else(|| filename_from_url(&url));
                (filename, url)
            }
            (None, Some(filename)) => {
                let url = self.backend.result_image_url(&filename);
                (filename, url)
            }
            (None, None) => {
                info!("[generate] Response carried no result yet, polling for it");
                self.poll_for_result(token, user_id, receipt.result_id)
                    .await?
            }
        };

        let entry = self
            .history
            .record(&person.preview, &garment.preview, &filename, &url);
        self.persist_history_entry(&entry);
        info!("[generate] Result ready: {}", url);
        Ok(entry)
    }

    /// Bounded result discovery: checks the results listing (or the
    /// specific result, when the response carried an id) once per
    /// attempt, sleeping between attempts. Gives up after the last one.
    async fn poll_for_result(
        &self,
        token: &str,
        user_id: i64,
        result_id: Option<i64>,
    ) -> Result<(String, String), TryOnError> {
        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let record = match result_id {
                Some(result_id) => self
                    .backend
                    .get_result(user_id, result_id, token)
                    .await
                    .map(Some),
                None => self.backend.list_results(user_id, token).await.map(|mut r| {
                    if r.is_empty() {
                        None
                    } else {
                        Some(r.remove(0))
                    }
                }),
            };

            match record {
                Ok(Some(record)) => {
                    if let Some(url) = record.any_url() {
                        let filename = record
                            .result_filename
                            .clone()
                            .unwrap_or_else(|| filename_from_url(url));
                        return Ok((filename, url.to_string()));
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("[generate] Poll attempt {} failed: {}", attempt, e),
            }
        }
        Err(TryOnError::ResultNotReady {
            attempts: self.poll_attempts,
        })
    }

    // ---- history ----

    /// Removes a history entry locally and from the attached store.
    /// Removing an already-removed id is a no-op.
    pub fn remove_history(&self, id: i64) -> bool {
        let removed = self.history.remove(id);
        if removed {
            if let Some(store) = self.store.lock().unwrap().as_ref() {
                if let Err(e) = store.delete(id) {
                    warn!("[history] Could not delete persisted entry {}: {}", id, e);
                }
            }
        }
        removed
    }

    /// Write-through of a fresh entry; store failures only warn because
    /// persistence must never fail a completed generation
    fn persist_history_entry(&self, entry: &HistoryEntry) {
        if let Some(store) = self.store.lock().unwrap().as_ref() {
            if let Err(e) = store.insert(entry) {
                warn!("[history] Could not persist entry {}: {}", entry.id, e);
            }
        }
    }
}

/// Last path segment of a URL, query and fragment stripped
fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("result")
        .to_string()
}
