//! Per-kind upload and selection state.
//!
//! Each photo kind (person, garment) owns an Available list of
//! previously uploaded photos plus a Selected pointer into it. The
//! pointer stores only the server id; the photo payload lives in the
//! list, so the preview shown and the id sent to the backend cannot
//! diverge. All transitions happen through the methods here; the
//! orchestration layer only reads the currently selected ids.

use std::sync::Mutex;

use log::info;

use crate::api::TryOnBackend;
use crate::error::{DeletionError, UploadError};
use crate::image::PreparedUpload;
use crate::models::{PhotoKind, RemotePhoto, UploadedPhoto};

/// Selection status for one photo kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Nothing chosen yet
    Empty,
    /// An upload is in flight; selection settles when it does
    Uploading,
    /// Server id of the chosen Available item
    Selected(i64),
}

struct Inner {
    selection: Selection,
    /// Selection to restore when an in-flight upload fails
    prior: Selection,
    available: Vec<UploadedPhoto>,
}

/// Upload/selection state machine for one photo kind
pub struct Wardrobe {
    kind: PhotoKind,
    inner: Mutex<Inner>,
}

impl Wardrobe {
    pub fn new(kind: PhotoKind) -> Self {
        Self {
            kind,
            inner: Mutex::new(Inner {
                selection: Selection::Empty,
                prior: Selection::Empty,
                available: Vec::new(),
            }),
        }
    }

    pub fn kind(&self) -> PhotoKind {
        self.kind
    }

    pub fn selection(&self) -> Selection {
        self.inner.lock().unwrap().selection
    }

    /// Server id of the selected photo, if one is selected
    pub fn selected_id(&self) -> Option<i64> {
        match self.selection() {
            Selection::Selected(id) => Some(id),
            _ => None,
        }
    }

    /// The selected photo resolved against the Available list
    pub fn selected_photo(&self) -> Option<UploadedPhoto> {
        let inner = self.inner.lock().unwrap();
        match inner.selection {
            Selection::Selected(id) => inner.available.iter().find(|p| p.id == id).cloned(),
            _ => None,
        }
    }

    /// Snapshot of the Available list, newest first
    pub fn available(&self) -> Vec<UploadedPhoto> {
        self.inner.lock().unwrap().available.clone()
    }

    /// Selects a photo already in the Available list, without any
    /// network traffic. Returns false (and changes nothing) when the id
    /// is absent or an upload is in flight.
    pub fn select(&self, id: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.selection == Selection::Uploading {
            return false;
        }
        if !inner.available.iter().any(|p| p.id == id) {
            return false;
        }
        inner.selection = Selection::Selected(id);
        true
    }

    /// Uploads a prepared payload and selects the resulting photo.
    ///
    /// While the request is in flight the kind sits in `Uploading` and
    /// further uploads for it are refused. On failure the previous
    /// selection is restored and the Available list is untouched.
    pub async fn upload(
        &self,
        backend: &dyn TryOnBackend,
        token: &str,
        prepared: PreparedUpload,
        preview: Option<String>,
    ) -> Result<UploadedPhoto, UploadError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.selection == Selection::Uploading {
                return Err(UploadError::InProgress {
                    kind: self.kind.label(),
                });
            }
            inner.prior = inner.selection;
            inner.selection = Selection::Uploading;
        }

        let filename = prepared.filename.clone();
        let result = backend
            .upload_photo(
                self.kind,
                &prepared.filename,
                prepared.bytes,
                &prepared.mime,
                token,
            )
            .await;

        let mut inner = self.inner.lock().unwrap();
        match result {
            Ok(receipt) => {
                let preview = preview
                    .or(receipt.url)
                    .unwrap_or_else(|| filename.clone());
                let photo = UploadedPhoto {
                    id: receipt.id,
                    preview,
                };
                inner.available.insert(0, photo.clone());
                inner.selection = Selection::Selected(photo.id);
                info!(
                    "[wardrobe] Uploaded {} photo {} as id {}",
                    self.kind.label(),
                    filename,
                    photo.id
                );
                Ok(photo)
            }
            Err(e) => {
                // The prior selection may have been deleted meanwhile
                inner.selection = match inner.prior {
                    Selection::Selected(id)
                        if !inner.available.iter().any(|p| p.id == id) =>
                    {
                        Selection::Empty
                    }
                    prior => prior,
                };
                Err(e.into())
            }
        }
    }

    /// Deletes a photo, backend first. Local state changes only after
    /// the backend accepts; a 403 surfaces as an admin-rights error.
    /// Returns whether the photo was present locally.
    pub async fn delete(
        &self,
        backend: &dyn TryOnBackend,
        token: &str,
        id: i64,
    ) -> Result<bool, DeletionError> {
        backend
            .delete_photo(self.kind, id, token)
            .await
            .map_err(|e| match e.status_code() {
                Some(403) => DeletionError::Forbidden {
                    body: e.to_string(),
                },
                _ => DeletionError::Api(e),
            })?;

        let mut inner = self.inner.lock().unwrap();
        let before = inner.available.len();
        inner.available.retain(|p| p.id != id);
        if inner.selection == Selection::Selected(id) {
            inner.selection = Selection::Empty;
        }
        info!("[wardrobe] Deleted {} photo {}", self.kind.label(), id);
        Ok(inner.available.len() != before)
    }

    /// Replaces the Available list with the backend's listing, keeping
    /// the Selected pointer only when its id survived
    pub fn reconcile(&self, photos: Vec<RemotePhoto>) {
        let mut inner = self.inner.lock().unwrap();
        inner.available = photos
            .into_iter()
            .map(|p| UploadedPhoto {
                id: p.id,
                preview: p.image_url.unwrap_or_default(),
            })
            .collect();
        if let Selection::Selected(id) = inner.selection {
            if !inner.available.iter().any(|p| p.id == id) {
                inner.selection = Selection::Empty;
            }
        }
    }
}
