//! FitLab virtual try-on client engine.
//!
//! Provides the full client-side workflow for a remote try-on backend:
//! OAuth callback handling and session persistence, photo upload with
//! JPEG normalization, per-kind photo selection, shop catalog and cart,
//! try-on generation with a bounded result-discovery poll, and a local
//! history mirrored into SQLite. The UI layer on top only renders
//! state and forwards intents; everything here runs headless.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod image;
pub mod models;
pub mod paths;
pub mod session;
pub mod shop;
pub mod studio;
pub mod wardrobe;

pub use api::{ApiError, TryOnApi, TryOnBackend};
pub use config::EngineConfig;
pub use error::{AuthError, DeletionError, TryOnError, UploadError};
pub use models::{HistoryEntry, PhotoKind, UploadedPhoto, UserProfile};
pub use session::SessionStore;
pub use shop::{Cart, CatalogGarment, GarmentCategory};
pub use studio::Studio;
pub use wardrobe::{Selection, Wardrobe};
