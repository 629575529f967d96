//! FitLab command line client.
//!
//! Drives the try-on engine end to end: login, photo upload and
//! selection, generation, history, shop catalog, and cart. State that
//! must survive between invocations (session, photo selection, cart)
//! lives as small JSON files in the app data directory; uploaded photo
//! lists are rehydrated from the backend on every run.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use fitlab::config::{load_config, save_config};
use fitlab::db::HistoryStore;
use fitlab::paths;
use fitlab::session::SessionStore;
use fitlab::shop::{self, CatalogGarment, GarmentCategory};
use fitlab::{PhotoKind, Studio, TryOnApi};

#[derive(Parser)]
#[command(name = "fitlab", version, about = "FitLab virtual try-on client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the backend base URL for this invocation only
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the OAuth login URL, or finish logging in
    Login {
        /// Callback URL carrying the #token= fragment
        #[arg(long)]
        callback: Option<String>,

        /// Bearer token, if already extracted from the callback
        #[arg(long)]
        token: Option<String>,
    },

    /// Clear the stored session
    Logout {
        /// Also wipe history, selections, and configuration
        #[arg(long)]
        wipe: bool,
    },

    /// Show the logged-in user
    Me,

    /// Upload a photo and select it
    Upload {
        kind: KindArg,
        /// Image file to upload
        file: PathBuf,
    },

    /// List uploaded photos available for selection
    Photos { kind: KindArg },

    /// Select an already-uploaded photo by id
    Select { kind: KindArg, id: i64 },

    /// Delete an uploaded photo
    Delete { kind: KindArg, id: i64 },

    /// Generate a try-on from the current selections
    Generate {
        /// Download the result image to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show the local try-on history, or remove an entry
    History {
        /// Remove the entry with this id
        #[arg(long)]
        remove: Option<i64>,
    },

    /// Browse the shop catalog
    Shop {
        /// Show a single category (tops, bottoms, shoes, accessories)
        #[arg(long)]
        category: Option<String>,
    },

    /// Manage the fitting cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },

    /// Show or update the engine configuration
    Config {
        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        redirect_uri: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Put a catalog garment in the cart
    Add { garment_id: i64 },

    /// Take a garment out of the cart
    Remove { garment_id: i64 },

    /// Empty the cart
    Clear,

    /// List cart contents
    List,

    /// Import a cart garment as a fitting and generate a try-on
    Try { garment_id: i64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Person,
    Garment,
}

impl From<KindArg> for PhotoKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Person => PhotoKind::Person,
            KindArg::Garment => PhotoKind::Garment,
        }
    }
}

/// Photo selection persisted between invocations
#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedSelection {
    person: Option<i64>,
    garment: Option<i64>,
}

/// Cart line persisted between invocations; the garment itself is
/// looked up in the catalog again on load
#[derive(Debug, Serialize, Deserialize)]
struct SavedCartItem {
    id: i64,
    fitted: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {}", e);
            fitlab::EngineConfig::default()
        }
    };
    if let Some(api_url) = &cli.api_url {
        config.base_url = api_url.clone();
    }

    let api = Arc::new(TryOnApi::new(&config.base_url));
    let session = match paths::get_session_path() {
        Ok(path) => SessionStore::open(path),
        Err(e) => {
            eprintln!("Warning: {}", e);
            SessionStore::in_memory()
        }
    };

    let mut studio = Studio::new(api.clone(), session).with_poll(
        config.poll_attempts,
        Duration::from_millis(config.poll_interval_ms),
    );
    match HistoryStore::open_default() {
        Ok(store) => studio = studio.with_history_store(store),
        Err(e) => eprintln!("Warning: history persistence unavailable: {}", e),
    }

    match cli.command {
        Commands::Login { callback, token } => cmd_login(&studio, &api, &config, callback, token).await,
        Commands::Logout { wipe } => cmd_logout(&studio, wipe),
        Commands::Me => cmd_me(&studio),
        Commands::Upload { kind, file } => cmd_upload(&studio, kind.into(), &file).await,
        Commands::Photos { kind } => cmd_photos(&studio, kind.into()).await,
        Commands::Select { kind, id } => cmd_select(&studio, kind.into(), id).await,
        Commands::Delete { kind, id } => cmd_delete(&studio, kind.into(), id).await,
        Commands::Generate { out } => cmd_generate(&studio, &api, out).await,
        Commands::History { remove } => cmd_history(&studio, remove),
        Commands::Shop { category } => cmd_shop(&api, category).await,
        Commands::Cart { action } => cmd_cart(&studio, &api, action).await,
        Commands::Config {
            base_url,
            redirect_uri,
        } => cmd_config(config, base_url, redirect_uri),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Rehydrates the wardrobes from the backend and applies the persisted
/// selection, dropping pointers whose photos no longer exist
async fn prepare_wardrobes(studio: &Studio) {
    if let Err(e) = studio.refresh_wardrobes().await {
        eprintln!("Warning: could not load uploaded photos: {}", e);
    }
    let saved = load_selection();
    if let Some(id) = saved.person {
        studio.select_photo(PhotoKind::Person, id);
    }
    if let Some(id) = saved.garment {
        studio.select_photo(PhotoKind::Garment, id);
    }
}

fn load_selection() -> SavedSelection {
    let path = match paths::get_selection_path() {
        Ok(path) => path,
        Err(_) => return SavedSelection::default(),
    };
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

fn save_selection(studio: &Studio) {
    let saved = SavedSelection {
        person: studio.wardrobe(PhotoKind::Person).selected_id(),
        garment: studio.wardrobe(PhotoKind::Garment).selected_id(),
    };
    let path = match paths::get_selection_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Warning: {}", e);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(&saved) {
        Ok(content) => {
            if let Err(e) = std::fs::write(&path, content) {
                eprintln!("Warning: could not save selection: {}", e);
            }
        }
        Err(e) => eprintln!("Warning: could not save selection: {}", e),
    }
}

async fn cmd_login(
    studio: &Studio,
    api: &TryOnApi,
    config: &fitlab::EngineConfig,
    callback: Option<String>,
    token: Option<String>,
) {
    if callback.is_none() && token.is_none() {
        println!("Open this URL in a browser and log in:");
        println!("  {}", api.login_url(&config.redirect_uri));
        println!();
        println!("Then finish with:");
        println!("  fitlab login --callback '<redirected URL>'");
        return;
    }

    let profile = if let Some(url) = callback {
        match studio.login_from_callback(&url).await {
            Ok((profile, _stripped)) => profile,
            Err(e) => fail(e),
        }
    } else {
        match studio.login_with_token(token.unwrap_or_default()).await {
            Ok(profile) => profile,
            Err(e) => fail(e),
        }
    };

    println!(
        "Logged in as {} (user {}, {} credits)",
        profile.display_name().unwrap_or("<unnamed>"),
        profile.id,
        studio.session().credits()
    );
}

fn cmd_logout(studio: &Studio, wipe: bool) {
    studio.log_out();
    if wipe {
        match paths::clear_app_data() {
            Ok(()) => println!("Logged out; local data wiped."),
            Err(e) => fail(e),
        }
    } else {
        println!("Logged out.");
    }
}

fn cmd_me(studio: &Studio) {
    match studio.session().user() {
        Some(user) => {
            println!("User:    {}", user.display_name().unwrap_or("<unnamed>"));
            println!("Id:      {}", user.id);
            println!("Credits: {}", studio.session().credits());
        }
        None => println!("Not logged in."),
    }
}

async fn cmd_upload(studio: &Studio, kind: PhotoKind, file: &std::path::Path) {
    prepare_wardrobes(studio).await;
    match studio.upload_photo_from_path(kind, file).await {
        Ok(photo) => {
            save_selection(studio);
            println!("Uploaded and selected {} photo {}", kind.label(), photo.id);
        }
        Err(e) => fail(e),
    }
}

async fn cmd_photos(studio: &Studio, kind: PhotoKind) {
    prepare_wardrobes(studio).await;
    let wardrobe = studio.wardrobe(kind);
    let available = wardrobe.available();
    if available.is_empty() {
        println!("No {} photos uploaded yet.", kind.label());
        return;
    }
    let selected = wardrobe.selected_id();
    println!("{:<4} {:<10} Preview", "", "Id");
    for photo in available {
        let marker = if selected == Some(photo.id) { "*" } else { "" };
        println!("{:<4} {:<10} {}", marker, photo.id, photo.preview);
    }
}

async fn cmd_select(studio: &Studio, kind: PhotoKind, id: i64) {
    prepare_wardrobes(studio).await;
    if studio.select_photo(kind, id) {
        save_selection(studio);
        println!("Selected {} photo {}", kind.label(), id);
    } else {
        fail(format!(
            "no {} photo with id {} is available",
            kind.label(),
            id
        ));
    }
}

async fn cmd_delete(studio: &Studio, kind: PhotoKind, id: i64) {
    prepare_wardrobes(studio).await;
    match studio.delete_photo(kind, id).await {
        Ok(true) => {
            save_selection(studio);
            println!("Deleted {} photo {}", kind.label(), id);
        }
        Ok(false) => {
            save_selection(studio);
            println!("Backend deleted photo {}; it was not in the local list.", id);
        }
        Err(e) => fail(e),
    }
}

async fn cmd_generate(studio: &Studio, api: &TryOnApi, out: Option<PathBuf>) {
    prepare_wardrobes(studio).await;
    let entry = match studio.generate().await {
        Ok(entry) => entry,
        Err(e) => fail(e),
    };

    println!("Result ready: {}", entry.result_url);
    println!("History entry {} recorded.", entry.id);

    if let Some(out) = out {
        let dest = if out.is_dir() {
            out.join(&entry.result_filename)
        } else {
            out
        };
        match api.download_to_file(&entry.result_url, &dest).await {
            Ok(()) => println!("Saved to {}", dest.display()),
            Err(e) => fail(e),
        }
    }
}

fn cmd_history(studio: &Studio, remove: Option<i64>) {
    if let Some(id) = remove {
        if studio.remove_history(id) {
            println!("Removed history entry {}", id);
        } else {
            println!("No history entry {}", id);
        }
        return;
    }

    let entries = studio.history().entries();
    if entries.is_empty() {
        println!("No try-ons yet.");
        return;
    }
    println!("{:<15} {:<26} Result", "Id", "Created");
    for entry in entries {
        println!("{:<15} {:<26} {}", entry.id, entry.created_at, entry.result_url);
    }
}

fn parse_category(raw: &str) -> Option<GarmentCategory> {
    GarmentCategory::ALL
        .into_iter()
        .find(|c| c.label().eq_ignore_ascii_case(raw))
}

async fn cmd_shop(api: &TryOnApi, category: Option<String>) {
    let filter = match category.as_deref() {
        Some(raw) => match parse_category(raw) {
            Some(category) => Some(category),
            None => fail(format!(
                "unknown category {:?}; try tops, bottoms, shoes, or accessories",
                raw
            )),
        },
        None => None,
    };

    let catalog = match shop::fetch_catalog(api).await {
        Ok(catalog) => catalog,
        Err(e) => fail(e),
    };

    for category in GarmentCategory::ALL {
        if filter.is_some() && filter != Some(category) {
            continue;
        }
        let garments: Vec<&CatalogGarment> =
            catalog.iter().filter(|g| g.category == category).collect();
        if garments.is_empty() {
            continue;
        }
        println!("{}:", category.label());
        for garment in garments {
            println!("  {:<10} {}", garment.id, garment.image_url);
        }
    }
}

fn load_cart(studio: &Studio, catalog: &[CatalogGarment]) {
    let path = match paths::get_cart_path() {
        Ok(path) => path,
        Err(_) => return,
    };
    let saved: Vec<SavedCartItem> = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default();

    for item in saved {
        if let Some(garment) = catalog.iter().find(|g| g.id == item.id) {
            studio.cart().add(garment.clone());
            if item.fitted {
                studio.cart().mark_fitted(item.id);
            }
        }
    }
}

fn save_cart(studio: &Studio) {
    let saved: Vec<SavedCartItem> = studio
        .cart()
        .items()
        .into_iter()
        .map(|item| SavedCartItem {
            id: item.garment.id,
            fitted: item.fitted,
        })
        .collect();

    let path = match paths::get_cart_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Warning: {}", e);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(&saved) {
        Ok(content) => {
            if let Err(e) = std::fs::write(&path, content) {
                eprintln!("Warning: could not save cart: {}", e);
            }
        }
        Err(e) => eprintln!("Warning: could not save cart: {}", e),
    }
}

async fn cmd_cart(studio: &Studio, api: &TryOnApi, action: CartAction) {
    let catalog = match shop::fetch_catalog(api).await {
        Ok(catalog) => catalog,
        Err(e) => fail(e),
    };
    load_cart(studio, &catalog);

    match action {
        CartAction::Add { garment_id } => {
            let garment = match catalog.iter().find(|g| g.id == garment_id) {
                Some(garment) => garment.clone(),
                None => fail(format!("no catalog garment with id {}", garment_id)),
            };
            if studio.cart().add(garment) {
                save_cart(studio);
                println!("Added garment {} to the cart.", garment_id);
            } else {
                println!("Garment {} is already in the cart.", garment_id);
            }
        }
        CartAction::Remove { garment_id } => {
            if studio.cart().remove(garment_id) {
                save_cart(studio);
                println!("Removed garment {} from the cart.", garment_id);
            } else {
                println!("Garment {} is not in the cart.", garment_id);
            }
        }
        CartAction::Clear => {
            studio.cart().clear();
            save_cart(studio);
            println!("Cart cleared.");
        }
        CartAction::List => {
            let items = studio.cart().items();
            if items.is_empty() {
                println!("Cart is empty.");
                return;
            }
            println!("{:<10} {:<14} {:<8} Image", "Id", "Category", "Fitted");
            for item in items {
                println!(
                    "{:<10} {:<14} {:<8} {}",
                    item.garment.id,
                    item.garment.category.label(),
                    if item.fitted { "yes" } else { "no" },
                    item.garment.image_url
                );
            }
        }
        CartAction::Try { garment_id } => {
            let item = match studio.cart().get(garment_id) {
                Some(item) => item,
                None => fail(format!("garment {} is not in the cart", garment_id)),
            };

            prepare_wardrobes(studio).await;
            if let Err(e) = studio.import_catalog_garment(&item.garment).await {
                fail(e);
            }
            save_selection(studio);

            match studio.generate().await {
                Ok(entry) => {
                    studio.cart().mark_fitted(garment_id);
                    save_cart(studio);
                    println!("Result ready: {}", entry.result_url);
                    println!("History entry {} recorded.", entry.id);
                }
                Err(e) => fail(e),
            }
        }
    }
}

fn cmd_config(
    mut config: fitlab::EngineConfig,
    base_url: Option<String>,
    redirect_uri: Option<String>,
) {
    let changed = base_url.is_some() || redirect_uri.is_some();
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    if let Some(redirect_uri) = redirect_uri {
        config.redirect_uri = redirect_uri;
    }
    if changed {
        if let Err(e) = save_config(&config) {
            fail(e);
        }
    }
    println!("base_url:         {}", config.base_url);
    println!("redirect_uri:     {}", config.redirect_uri);
    println!("poll_attempts:    {}", config.poll_attempts);
    println!("poll_interval_ms: {}", config.poll_interval_ms);
}
