//! Shop catalog retrieval and the local fitting cart.
//!
//! The catalog is backend-resident; the cart is not. No cart endpoint
//! exists, so cart contents and fitted markers live only in this
//! client and reset with it.

use std::sync::Mutex;

use crate::api::{ApiError, TryOnBackend};
use crate::models::RemotePhoto;

/// Display category for a catalog garment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarmentCategory {
    Tops,
    Bottoms,
    Shoes,
    Accessories,
}

impl GarmentCategory {
    pub const ALL: [GarmentCategory; 4] = [
        GarmentCategory::Tops,
        GarmentCategory::Bottoms,
        GarmentCategory::Shoes,
        GarmentCategory::Accessories,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GarmentCategory::Tops => "Tops",
            GarmentCategory::Bottoms => "Bottoms",
            GarmentCategory::Shoes => "Shoes",
            GarmentCategory::Accessories => "Accessories",
        }
    }

    /// Maps a backend fitting type onto a display category. Unknown
    /// and missing types land in Tops, the backend's dominant kind.
    pub fn from_fitting_type(fitting_type: Option<&str>) -> Self {
        let ft = match fitting_type {
            Some(ft) => ft.to_ascii_lowercase(),
            None => return GarmentCategory::Tops,
        };
        if ft.contains("lower") || ft.contains("bottom") {
            GarmentCategory::Bottoms
        } else if ft.contains("shoe") {
            GarmentCategory::Shoes
        } else if ft.contains("bag") || ft.contains("hat") || ft.contains("accessor") {
            GarmentCategory::Accessories
        } else {
            GarmentCategory::Tops
        }
    }
}

/// A catalog garment with its derived display category
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogGarment {
    pub id: i64,
    pub image_url: String,
    pub category: GarmentCategory,
}

/// Fetches the shop catalog and tags each garment with its category.
/// Records without an image URL cannot be shown or fitted, so they are
/// skipped.
pub async fn fetch_catalog(backend: &dyn TryOnBackend) -> Result<Vec<CatalogGarment>, ApiError> {
    let photos = backend.shop_clothes().await?;
    Ok(photos.into_iter().filter_map(to_catalog_garment).collect())
}

fn to_catalog_garment(photo: RemotePhoto) -> Option<CatalogGarment> {
    let image_url = photo.image_url?;
    Some(CatalogGarment {
        id: photo.id,
        category: GarmentCategory::from_fitting_type(photo.fitting_type.as_deref()),
        image_url,
    })
}

/// One cart line: a catalog garment plus whether it has been tried on
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub garment: CatalogGarment,
    pub fitted: bool,
}

/// Client-local cart of catalog garments picked for fitting
pub struct Cart {
    items: Mutex<Vec<CartItem>>,
}

impl Cart {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Adds a garment unless it is already in the cart. Returns whether
    /// anything was added.
    pub fn add(&self, garment: CatalogGarment) -> bool {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|i| i.garment.id == garment.id) {
            return false;
        }
        items.push(CartItem {
            garment,
            fitted: false,
        });
        true
    }

    /// Removes a garment by id; removing an absent id is a no-op
    pub fn remove(&self, id: i64) -> bool {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|i| i.garment.id != id);
        items.len() != before
    }

    /// Marks a cart line as tried on. Returns false when the id is not
    /// in the cart.
    pub fn mark_fitted(&self, id: i64) -> bool {
        let mut items = self.items.lock().unwrap();
        match items.iter_mut().find(|i| i.garment.id == id) {
            Some(item) => {
                item.fitted = true;
                true
            }
            None => false,
        }
    }

    /// Looks up a cart line by garment id
    pub fn get(&self, id: i64) -> Option<CartItem> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.garment.id == id)
            .cloned()
    }

    /// Snapshot of the cart in insertion order
    pub fn items(&self) -> Vec<CartItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the cart, fitted markers included
    pub fn clear(&self) {
        self.items.lock().unwrap().clear();
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}
